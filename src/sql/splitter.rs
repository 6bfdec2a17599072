//! Lexical splitting of multi-statement SQL scripts.
//!
//! The scanner tracks only quoted literals: a `;` inside `'...'` or `"..."`
//! does not end a statement. It has no grammar and never fails. A quote
//! preceded by a backslash is treated as escaped; doubled quotes (`''`) are
//! seen as two toggles, which leaves the literal state unchanged overall.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Outside,
    Inside(char),
}

impl QuoteState {
    fn observe(self, ch: char, prev: Option<char>) -> Self {
        if !matches!(ch, '\'' | '"') || prev == Some('\\') {
            return self;
        }

        match self {
            QuoteState::Outside => QuoteState::Inside(ch),
            QuoteState::Inside(open) if open == ch => QuoteState::Outside,
            inside => inside,
        }
    }
}

/// Splits `script` into statements in source order.
///
/// Every returned slice except possibly the last ends with the `;` that
/// terminated it. A trailing remainder without terminator is returned as
/// is, unless it is blank.
pub fn split(script: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut state = QuoteState::Outside;
    let mut prev = None;
    let mut start = 0;

    for (i, ch) in script.char_indices() {
        state = state.observe(ch, prev);

        if ch == ';' && state == QuoteState::Outside {
            statements.push(&script[start..=i]);
            start = i + 1;
        }

        prev = Some(ch);
    }

    let rest = &script[start..];
    if !rest.trim().is_empty() {
        statements.push(rest);
    }

    statements
}

/// Whether a split statement should be sent to the database.
///
/// Blank statements and statements whose trimmed text starts with `--` are
/// skipped by the importer.
pub fn is_executable(statement: &str) -> bool {
    let trimmed = statement.trim();
    !trimmed.is_empty() && !trimmed.starts_with("--")
}

pub fn executable_statements(script: &str) -> Vec<&str> {
    split(script)
        .into_iter()
        .filter(|statement| is_executable(statement))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_inside_literal() {
        let script = "INSERT INTO t VALUES ('a;b');";
        assert_eq!(split(script), vec![script]);
    }

    #[test]
    fn test_plain_statements_keep_leading_whitespace() {
        assert_eq!(split("SELECT 1; SELECT 2;"), vec!["SELECT 1;", " SELECT 2;"]);
    }

    #[test]
    fn test_trailing_statement_without_terminator() {
        assert_eq!(split("SELECT 1"), vec!["SELECT 1"]);
        assert_eq!(split("SELECT 1; SELECT 2"), vec!["SELECT 1;", " SELECT 2"]);
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split("").is_empty());
        assert!(split("   \n\t").is_empty());
        assert_eq!(split("SELECT 1;\n  "), vec!["SELECT 1;"]);
    }

    #[test]
    fn test_other_quote_is_data() {
        let script = r#"SELECT '"' FROM t;"#;
        assert_eq!(split(script), vec![script]);

        let script = r#"SELECT "it's" FROM t; SELECT 2;"#;
        assert_eq!(split(script), vec![r#"SELECT "it's" FROM t;"#, " SELECT 2;"]);
    }

    #[test]
    fn test_consecutive_terminators() {
        assert_eq!(split("A;;B;"), vec!["A;", ";", "B;"]);
    }

    #[test]
    fn test_backslash_escaped_quote_does_not_toggle() {
        let script = r"INSERT INTO t VALUES ('it\'s; fine'); SELECT 1;";
        assert_eq!(
            split(script),
            vec![r"INSERT INTO t VALUES ('it\'s; fine');", " SELECT 1;"]
        );
    }

    #[test]
    fn test_doubled_quote_toggles_twice() {
        let script = "SELECT 'it''s;ok'; SELECT 2;";
        assert_eq!(split(script), vec!["SELECT 'it''s;ok';", " SELECT 2;"]);

        // the doubled quote closes and reopens the literal
        let script = "SELECT 'a'';b';";
        assert_eq!(split(script), vec![script]);
    }

    #[test]
    fn test_unterminated_literal_swallows_rest() {
        let script = "SELECT 'open; SELECT 2;";
        assert_eq!(split(script), vec![script]);
    }

    #[test]
    fn test_comments_are_not_stripped() {
        let script = "-- header\nCREATE TABLE t (id int);\n-- trailing note";
        assert_eq!(
            split(script),
            vec!["-- header\nCREATE TABLE t (id int);", "\n-- trailing note"]
        );
    }

    #[test]
    fn test_multibyte_characters() {
        let script = "INSERT INTO firmen VALUES ('Müller; Söhne'); SELECT 'ß';";
        assert_eq!(
            split(script),
            vec!["INSERT INTO firmen VALUES ('Müller; Söhne');", " SELECT 'ß';"]
        );
    }

    #[test]
    fn test_is_executable() {
        assert!(is_executable("SELECT 1;"));
        assert!(is_executable(";"));
        assert!(!is_executable("   "));
        assert!(!is_executable("\n  -- only a comment"));
        assert!(is_executable("/* block */ SELECT 1;"));
    }

    #[test]
    fn test_executable_statements_filters_in_order() {
        let script = "CREATE TABLE a (id int);\n-- note\n;  ;INSERT INTO a VALUES (1);\n-- end";
        assert_eq!(
            executable_statements(script),
            vec!["CREATE TABLE a (id int);", "  ;", "INSERT INTO a VALUES (1);"]
        );
    }
}
