//! Script rendering and statement recovery.
//!
//! A dump script is ordered text: metadata comment lines, a transactional
//! preamble, one block per table (drop + recreate + one INSERT per row), and
//! a transactional postamble. Table blocks are order-dependent (they are
//! replayed in the order they were written), and the drop/recreate prefix
//! makes a script idempotent when replayed from scratch.
//!
//! All value escaping is delegated to the store's own primitive
//! ([`crate::store::quote_literal`]); nothing in this module substitutes
//! strings into literals by hand.

use std::fmt::Write as _;

use chrono::NaiveDateTime;

use crate::store::{quote_ident, quote_literal, Value};

/// Statements that open every script: referential-integrity checks off,
/// autocommit off, one transaction around everything that follows.
pub const PREAMBLE: &str =
    "SET FOREIGN_KEY_CHECKS = 0;\nSET AUTOCOMMIT = 0;\nSTART TRANSACTION;\n";

/// Statements that close every script: checks back on, commit.
pub const POSTAMBLE: &str = "SET FOREIGN_KEY_CHECKS = 1;\nCOMMIT;\n";

/// Renders the metadata comment lines at the top of a script.
///
/// The description is free text supplied by the operator; embedded CR/LF are
/// collapsed to single spaces so the text cannot escape its comment line and
/// be replayed as a statement.
pub fn render_header(description: &str, created_at: NaiveDateTime) -> String {
    let description = description
        .replace('\r', " ")
        .replace('\n', " ");
    let mut out = String::new();
    let _ = writeln!(out, "-- workhub backup");
    let _ = writeln!(out, "-- description: {}", description);
    let _ = writeln!(out, "-- created: {}", created_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "-- engine: workhub-store {}", env!("CARGO_PKG_VERSION"));
    out
}

/// Renders the schema part of one table block: drop-if-exists followed by
/// the store's authoritative create statement.
///
/// ## Arguments
/// * `table` - Table name (quoted here, not by the caller)
/// * `create_statement` - DDL text as rendered by the store itself
pub fn render_schema_block(table: &str, create_statement: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {};\n{};\n",
        quote_ident(table),
        create_statement.trim_end().trim_end_matches(';')
    )
}

/// Renders the data part of one table block: exactly one INSERT statement
/// per row, values in column order.
///
/// NULL renders as the bare keyword; every other scalar goes through the
/// engine's escaping primitive. Rows whose length does not match the column
/// list cannot be represented and abort the dump.
pub fn render_data_block(
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> anyhow::Result<String> {
    let ident = quote_ident(table);
    let col_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let col_list = col_list.join(", ");

    let mut out = String::new();
    for row in rows {
        if row.len() != columns.len() {
            anyhow::bail!(
                "Row in table {} has {} values for {} columns",
                table,
                row.len(),
                columns.len()
            );
        }
        let values: Vec<String> = row.iter().map(quote_literal).collect();
        let _ = writeln!(
            out,
            "INSERT INTO {} ({}) VALUES ({});",
            ident,
            col_list,
            values.join(", ")
        );
    }
    Ok(out)
}

/// Splits a script into individual statements.
///
/// This is not a naive terminator split: the scanner tracks single-quoted
/// literals (where `''` is an escaped quote) and double-quoted identifiers
/// (where `""` is an escaped quote), and strips `--` line comments outside
/// both, so a `;`, a newline, or a `--` inside a dumped value or a table
/// name can never corrupt statement framing. Blank statements are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = script.chars().peekable();
    let mut in_string = false;
    let mut in_ident = false;

    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if c == '\'' {
                // A doubled quote stays inside the literal.
                if chars.peek() == Some(&'\'') {
                    current.push(chars.next().unwrap());
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        if in_ident {
            current.push(c);
            if c == '"' {
                // Same doubling rule as literals.
                if chars.peek() == Some(&'"') {
                    current.push(chars.next().unwrap());
                } else {
                    in_ident = false;
                }
            }
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                current.push(c);
            }
            '"' => {
                in_ident = true;
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                // Line comment: discard up to (but not past) the newline.
                for n in chars.by_ref() {
                    if n == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            ';' => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    // Tolerate a missing terminator on the final statement.
    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_block_drops_then_recreates() {
        let block = render_schema_block("t", "CREATE TABLE \"t\" (\"id\" INT)");
        assert_eq!(
            block,
            "DROP TABLE IF EXISTS \"t\";\nCREATE TABLE \"t\" (\"id\" INT);\n"
        );
    }

    #[test]
    fn data_block_emits_one_insert_per_row() {
        let rows = vec![
            vec![Value::Int(1), Value::Text("a".into())],
            vec![Value::Int(2), Value::Null],
        ];
        let block =
            render_data_block("t", &["id".to_string(), "name".to_string()], &rows).unwrap();
        assert_eq!(
            block,
            "INSERT INTO \"t\" (\"id\", \"name\") VALUES (1, 'a');\n\
             INSERT INTO \"t\" (\"id\", \"name\") VALUES (2, NULL);\n"
        );
    }

    #[test]
    fn data_block_rejects_ragged_rows() {
        let rows = vec![vec![Value::Int(1)]];
        assert!(render_data_block("t", &["a".to_string(), "b".to_string()], &rows).is_err());
    }

    #[test]
    fn header_collapses_newlines_in_description() {
        let header = render_header("line one\nDROP TABLE \"t\";\r\nend", chrono::NaiveDateTime::default());
        assert!(header.contains("-- description: line one DROP TABLE \"t\";  end"));
        // Each header line is still a comment.
        for line in header.lines() {
            assert!(line.starts_with("--"), "not a comment: {line}");
        }
    }

    #[test]
    fn split_respects_quoted_terminators() {
        let script = "INSERT INTO \"t\" (\"v\") VALUES ('a;b');\nINSERT INTO \"t\" (\"v\") VALUES ('it''s; fine');";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO \"t\" (\"v\") VALUES ('a;b')");
        assert_eq!(stmts[1], "INSERT INTO \"t\" (\"v\") VALUES ('it''s; fine')");
    }

    #[test]
    fn split_respects_quoted_identifiers() {
        let script = "DROP TABLE IF EXISTS \"it's\";\n\
                      CREATE TABLE \"a;b\" (\"id\" INT);\n\
                      INSERT INTO \"x\"\"--y\" (\"v\") VALUES (1);";
        let stmts = split_statements(script);
        assert_eq!(stmts, vec![
            "DROP TABLE IF EXISTS \"it's\"".to_string(),
            "CREATE TABLE \"a;b\" (\"id\" INT)".to_string(),
            "INSERT INTO \"x\"\"--y\" (\"v\") VALUES (1)".to_string(),
        ]);
    }

    #[test]
    fn split_strips_comments_outside_strings() {
        let script = "-- header; with semicolon\nCOMMIT;\nINSERT INTO \"t\" (\"v\") VALUES ('-- not a comment');";
        let stmts = split_statements(script);
        assert_eq!(stmts, vec![
            "COMMIT".to_string(),
            "INSERT INTO \"t\" (\"v\") VALUES ('-- not a comment')".to_string(),
        ]);
    }

    #[test]
    fn split_handles_newlines_inside_literals() {
        let script = "INSERT INTO \"t\" (\"v\") VALUES ('multi\nline');";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].contains("multi\nline"));
    }

    #[test]
    fn split_drops_blank_statements_and_tolerates_missing_final_terminator() {
        let stmts = split_statements(";;\nCOMMIT\n");
        assert_eq!(stmts, vec!["COMMIT".to_string()]);
    }
}
