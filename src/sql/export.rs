//! Rendering of a plain-SQL database dump.
//!
//! The output is meant to be fed back through the importer, so section
//! headers use block comments (a statement starting with `--` is skipped on
//! import) and string literals never contain a backslash.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Rows beyond this count are not exported per table.
pub const EXPORT_ROW_LIMIT: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub default: Option<String>,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TableDump {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Name as it may appear inside a `/* */` header. The splitter does not
/// know about comments, so quotes, terminators and backslashes are dropped
/// along with anything that could close the comment early.
fn comment_label(name: &str) -> String {
    name.replace("*/", "")
        .chars()
        .filter(|ch| !matches!(ch, '\'' | '"' | ';' | '\\'))
        .collect()
}

fn quote_text(text: &str) -> String {
    text.split('\\')
        .map(|part| format!("'{}'", part.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(" || chr(92) || ")
}

pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => quote_text(text),
        Value::Array(_) | Value::Object(_) => quote_text(&value.to_string()),
    }
}

pub fn render_create_table(table: &TableDump) -> String {
    let mut definitions: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let mut definition = format!("  {} {}", quote_ident(&column.name), column.data_type);
            if let Some(default) = column.default.as_deref().filter(|d| !d.trim().is_empty()) {
                definition.push_str(" DEFAULT ");
                definition.push_str(default);
            }
            if !column.nullable {
                definition.push_str(" NOT NULL");
            }
            definition
        })
        .collect();

    if !table.primary_key.is_empty() {
        let key = table
            .primary_key
            .iter()
            .map(|column| quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        definitions.push(format!("  PRIMARY KEY ({key})"));
    }

    format!(
        "CREATE TABLE {} (\n{}\n);\n",
        quote_ident(&table.name),
        definitions.join(",\n")
    )
}

pub fn render_insert(table: &str, row: &Map<String, Value>) -> String {
    let columns = row
        .keys()
        .map(|key| quote_ident(key))
        .collect::<Vec<_>>()
        .join(", ");
    let values = row
        .values()
        .map(render_literal)
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({columns}) VALUES ({values});\n", quote_ident(table))
}

pub fn render_table(table: &TableDump) -> String {
    let mut out = String::new();
    let label = comment_label(&table.name);
    out.push_str(&format!("/* Table: {label} */\n"));
    out.push_str(&format!(
        "DROP TABLE IF EXISTS {} CASCADE;\n",
        quote_ident(&table.name)
    ));
    out.push_str(&render_create_table(table));
    out.push('\n');

    if !table.rows.is_empty() {
        out.push_str(&format!("/* Data for table: {label} */\n"));
        for row in &table.rows {
            out.push_str(&render_insert(&table.name, row));
        }
        out.push('\n');
    }

    out
}

pub fn render_dump(tables: &[TableDump], created_at: DateTime<Utc>) -> String {
    let mut out = format!(
        "/* Database export created on {} */\n\n",
        created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    );
    for table in tables.iter().filter(|table| !table.columns.is_empty()) {
        out.push_str(&render_table(table));
    }
    out
}

pub fn export_file_name(created_at: DateTime<Utc>) -> String {
    format!("database_export_{}.sql", created_at.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::sql::splitter::executable_statements;

    fn companies_table() -> TableDump {
        let mut row = Map::new();
        row.insert("id".into(), json!(1));
        row.insert("name".into(), json!("O'Brien; Partner"));
        row.insert("active".into(), json!(true));
        row.insert("notes".into(), Value::Null);

        TableDump {
            name: "companies".into(),
            columns: vec![
                ColumnDef {
                    name: "id".into(),
                    data_type: "integer".into(),
                    default: Some("nextval('companies_id_seq'::regclass)".into()),
                    nullable: false,
                },
                ColumnDef {
                    name: "name".into(),
                    data_type: "text".into(),
                    default: None,
                    nullable: false,
                },
                ColumnDef {
                    name: "active".into(),
                    data_type: "boolean".into(),
                    default: Some("true".into()),
                    nullable: true,
                },
                ColumnDef {
                    name: "notes".into(),
                    data_type: "text".into(),
                    default: None,
                    nullable: true,
                },
            ],
            primary_key: vec!["id".into()],
            rows: vec![row],
        }
    }

    #[test]
    fn test_render_literal() {
        assert_eq!(render_literal(&Value::Null), "NULL");
        assert_eq!(render_literal(&json!(false)), "FALSE");
        assert_eq!(render_literal(&json!(12.5)), "12.5");
        assert_eq!(render_literal(&json!("it's")), "'it''s'");
        assert_eq!(render_literal(&json!({"k": "v"})), r#"'{"k":"v"}'"#);
    }

    #[test]
    fn test_backslash_rendered_without_escape() {
        assert_eq!(render_literal(&json!(r"C:\tmp")), "'C:' || chr(92) || 'tmp'");
        assert_eq!(render_literal(&json!(r"end\")), "'end' || chr(92) || ''");
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_create_table_rendering() {
        let sql = render_create_table(&companies_table());
        assert_eq!(
            sql,
            "CREATE TABLE \"companies\" (\n  \"id\" integer DEFAULT nextval('companies_id_seq'::regclass) NOT NULL,\n  \"name\" text NOT NULL,\n  \"active\" boolean DEFAULT true,\n  \"notes\" text,\n  PRIMARY KEY (\"id\")\n);\n"
        );
    }

    #[test]
    fn test_dump_reimports_every_statement() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let dump = render_dump(&[companies_table()], created_at);

        let statements = executable_statements(&dump);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("DROP TABLE IF EXISTS \"companies\" CASCADE;"));
        assert!(statements[1].contains("CREATE TABLE \"companies\""));
        assert!(statements[2].contains(
            "(\"active\", \"id\", \"name\", \"notes\") VALUES (TRUE, 1, 'O''Brien; Partner', NULL);"
        ));
    }

    #[test]
    fn test_awkward_table_names_keep_statements_intact() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        for name in ["o'brien", "semi;colon", "dq\"name", "end*/x", r"back\slash"] {
            let table = TableDump {
                name: name.into(),
                ..companies_table()
            };
            let dump = render_dump(&[table], created_at);

            let statements = executable_statements(&dump);
            assert_eq!(statements.len(), 3, "{name}");
            let quoted = quote_ident(name);
            assert!(statements[0].contains(&format!("DROP TABLE IF EXISTS {quoted} CASCADE;")));
            assert!(statements[1].contains(&format!("CREATE TABLE {quoted}")));
            assert!(statements[2].contains(&format!("INSERT INTO {quoted}")));
        }
    }

    #[test]
    fn test_comment_label_strips_lexical_characters() {
        assert_eq!(comment_label("o'brien"), "obrien");
        assert_eq!(comment_label("a;b\"c*/d"), "abcd");
        assert_eq!(comment_label("companies"), "companies");
    }

    #[test]
    fn test_tables_without_columns_are_skipped() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let empty = TableDump {
            name: "ghost".into(),
            ..TableDump::default()
        };
        let dump = render_dump(&[empty], created_at);
        assert!(!dump.contains("ghost"));
        assert!(dump.starts_with("/* Database export created on 2024-03-01T12:00:00.000Z */"));
    }

    #[test]
    fn test_export_file_name() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap();
        assert_eq!(export_file_name(created_at), "database_export_2024-03-01.sql");
    }
}
