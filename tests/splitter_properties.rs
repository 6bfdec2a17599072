//! Property tests for the SQL script splitter.
//!
//! - No loss: concatenating the statements gives back the script, minus a
//!   blank tail
//! - Re-splitting any emitted statement yields exactly that statement

use proptest::prelude::*;

use crm_backend::sql::splitter::split;

// Scripts built from the characters the scanner actually reacts to, padded
// with ordinary SQL-ish text so statements have some body.
fn arb_script() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just(";".to_string()),
            Just("'".to_string()),
            Just("\"".to_string()),
            Just("\\".to_string()),
            Just("--".to_string()),
            Just("\n".to_string()),
            Just(" ".to_string()),
            "[a-zA-Z0-9_ (),=*]{1,8}",
            "[äöüß€]{1,2}",
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn split_loses_nothing(script in arb_script()) {
        let joined: String = split(&script).concat();

        prop_assert!(script.starts_with(&joined));
        prop_assert!(script[joined.len()..].trim().is_empty());
    }

    #[test]
    fn split_of_arbitrary_text_loses_nothing(script in any::<String>()) {
        let joined: String = split(&script).concat();

        prop_assert!(script.starts_with(&joined));
        prop_assert!(script[joined.len()..].trim().is_empty());
    }

    #[test]
    fn resplit_is_identity(script in arb_script()) {
        for statement in split(&script) {
            prop_assert_eq!(split(statement), vec![statement]);
        }
    }

    #[test]
    fn every_statement_but_the_last_is_terminated(script in arb_script()) {
        let statements = split(&script);
        if let Some((_, init)) = statements.split_last() {
            for statement in init {
                prop_assert!(statement.ends_with(';'));
            }
        }
    }
}
