use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlparser::ast::*;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::info;

use super::{Column, ColumnType, ReadView, Store, TableSchema, Value};

/// One table: its schema plus all rows in storage order.
///
/// Rows are positional: `rows[i][j]` is the value of column
/// `schema.columns[j]` in the i-th row.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
struct Table {
    schema: TableSchema,
    rows: Vec<Vec<Value>>,
}

/// The complete store state. Tables are kept in a `BTreeMap` so that
/// enumeration order is stable across runs, which keeps dump scripts
/// deterministic for identical content.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
struct StoreState {
    tables: BTreeMap<String, Table>,
}

/// An in-memory relational store with optional JSON-file persistence.
///
/// This is the concrete store behind the backup engine: the operator CLI
/// opens one against a state file, and the tests construct throwaway
/// in-memory instances. All state lives behind a single `RwLock`, which is
/// also what gives `execute_in_transaction` its isolation: a replay holds
/// the write lock from first statement to commit.
///
/// ## Persistence
/// When opened with a path, the whole state is persisted as pretty-printed
/// JSON after every committed transaction and reloaded on open. The file is
/// human-readable by design, like the catalog file of a small database.
///
/// ## Transactions
/// `execute_in_transaction` applies statements to a scratch copy of the
/// state and swaps it in only when every statement has succeeded. A failure
/// discards the scratch copy, so the visible state never reflects a partial
/// replay.
pub struct MemoryStore {
    /// Current state (thread-safe)
    state: RwLock<StoreState>,
    /// File path for persistence (None = purely in-memory)
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Creates an empty store with no persistence. Used by tests and for
    /// dry-run replays.
    pub fn in_memory() -> Self {
        Self { state: RwLock::new(StoreState::default()), path: None }
    }

    /// Opens a persistent store from a JSON state file, creating an empty
    /// one if the file does not exist yet.
    ///
    /// ## Arguments
    /// * `path` - State file location (e.g., "./data/store.json")
    ///
    /// ## Returns
    /// * `Ok(MemoryStore)` - Loaded or newly created store
    /// * `Err(_)` - File I/O or JSON parsing errors
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path: PathBuf = path.into();
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let state = StoreState::default();
            fs::write(&path, serde_json::to_vec_pretty(&state)?)?;
            state
        };
        info!(path = %path.display(), tables = state.tables.len(), "store opened");
        Ok(Self { state: RwLock::new(state), path: Some(path) })
    }

    /// Writes the current state to disk as pretty-printed JSON.
    /// No-op for purely in-memory stores.
    fn persist(&self, state: &StoreState) -> Result<()> {
        if let Some(path) = &self.path {
            fs::write(path, serde_json::to_vec_pretty(state)?)?;
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    type View = MemoryView;

    async fn read_view(&self) -> Result<MemoryView> {
        // One clone under one read guard: every table in the view reflects
        // the same instant.
        let state = self.state.read().clone();
        Ok(MemoryView { state })
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
        let mut guard = self.state.write();
        let mut scratch = guard.clone();
        for (i, stmt) in statements.iter().enumerate() {
            apply_statement(&mut scratch, stmt)
                .with_context(|| format!("statement {}: {}", i + 1, compact(stmt)))?;
        }
        self.persist(&scratch)?;
        *guard = scratch;
        Ok(())
    }
}

/// A consistent snapshot of the store taken by `MemoryStore::read_view`.
pub struct MemoryView {
    state: StoreState,
}

impl ReadView for MemoryView {
    fn list_tables(&self) -> Vec<String> {
        self.state.tables.keys().cloned().collect()
    }

    fn get_create_statement(&self, table: &str) -> Result<String> {
        let t = self.lookup(table)?;
        let cols: Vec<String> = t
            .schema
            .columns
            .iter()
            .map(|c| format!("{} {}", super::quote_ident(&c.name), c.col_type.sql_keyword()))
            .collect();
        Ok(format!("CREATE TABLE {} ({})", super::quote_ident(table), cols.join(", ")))
    }

    fn stream_rows(&self, table: &str) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        let t = self.lookup(table)?;
        let columns = t.schema.columns.iter().map(|c| c.name.clone()).collect();
        Ok((columns, t.rows.clone()))
    }
}

impl MemoryView {
    fn lookup(&self, table: &str) -> Result<&Table> {
        self.state.tables.get(table).ok_or_else(|| anyhow!("Unknown table {}", table))
    }
}

/// Collapses a statement to one short line for error messages.
fn compact(stmt: &str) -> String {
    let line = stmt.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() > 120 {
        let mut short: String = line.chars().take(120).collect();
        short.push('…');
        short
    } else {
        line
    }
}

/// WHERE clause predicate over positional rows.
/// Supports the same equality/AND subset the SQL front-end accepts.
#[derive(Clone, Debug)]
enum Predicate {
    /// Equality comparison: column = value
    Eq(String, Value),
    /// Logical AND of two predicates
    And(Box<Predicate>, Box<Predicate>),
}

/// Parses and applies a single SQL statement to the given state.
///
/// This is the statement executor behind `execute_in_transaction`. It
/// handles the complete pipeline from statement text to state mutation:
///
/// 1. **Parsing**: `sqlparser` with `GenericDialect` produces the AST
/// 2. **Validation**: exactly one statement, supported operation
/// 3. **Application**: mutate the scratch state
///
/// ## Supported statements
/// - `CREATE TABLE name (col INT|TEXT, ...)`
/// - `DROP TABLE [IF EXISTS] name[, ...]`
/// - `INSERT INTO table [(cols)] VALUES (...), ...` with integer, string,
///   and NULL literals
/// - `DELETE FROM table [WHERE col = literal [AND ...]]`
/// - `SET ...`, `START TRANSACTION`, `COMMIT`: accepted as no-ops, because
///   dump scripts carry their own transactional preamble/postamble while the
///   store wraps the whole replay in its own transaction anyway
fn apply_statement(state: &mut StoreState, sql: &str) -> Result<()> {
    let dialect = GenericDialect {};
    let mut ast = Parser::parse_sql(&dialect, sql)?;
    if ast.len() != 1 {
        return Err(anyhow!("Only one statement at a time is supported"));
    }
    let stmt = ast.pop().unwrap();

    match stmt {
        // CREATE TABLE foo (id INT, name TEXT);
        Statement::CreateTable { name, columns, .. } => {
            let tname = name.0.last().unwrap().value.clone();
            if state.tables.contains_key(&tname) {
                return Err(anyhow!("Table {} already exists", tname));
            }
            let mut cols: Vec<Column> = Vec::new();
            for c in columns {
                let cname = c.name.value;
                let col_type = match c.data_type {
                    DataType::Int(_) | DataType::Integer(_) => ColumnType::Int,
                    DataType::Text | DataType::Varchar(_) | DataType::Char(_) => ColumnType::Text,
                    _ => return Err(anyhow!("Unsupported type for column {}", cname)),
                };
                cols.push(Column { name: cname, col_type });
            }
            let schema = TableSchema { name: tname.clone(), columns: cols };
            state.tables.insert(tname, Table { schema, rows: Vec::new() });
            Ok(())
        }

        // DROP TABLE IF EXISTS foo;
        Statement::Drop { object_type, if_exists, names, .. } => {
            if object_type != ObjectType::Table {
                return Err(anyhow!("Only DROP TABLE is supported"));
            }
            for name in names {
                let tname = name.0.last().unwrap().value.clone();
                if state.tables.remove(&tname).is_none() && !if_exists {
                    return Err(anyhow!("Unknown table {}", tname));
                }
            }
            Ok(())
        }

        // INSERT INTO foo (id, name) VALUES (1,'Ada'),(2,NULL);
        Statement::Insert { table_name, columns, source, .. } => {
            let tname = table_name.0.last().unwrap().value.clone();
            let table = state
                .tables
                .get_mut(&tname)
                .ok_or_else(|| anyhow!("Unknown table {}", tname))?;

            // Target column order: explicit list, or schema order.
            let target: Vec<String> = if columns.is_empty() {
                table.schema.columns.iter().map(|c| c.name.clone()).collect()
            } else {
                columns.iter().map(|c| c.value.clone()).collect()
            };

            let query = source.ok_or_else(|| anyhow!("INSERT requires a source"))?;
            let values = match query.body.as_ref() {
                SetExpr::Values(values) => values,
                _ => return Err(anyhow!("INSERT supports VALUES only")),
            };

            for row in &values.rows {
                if row.len() != target.len() {
                    return Err(anyhow!("Column count mismatch"));
                }
                // Build the positional row in schema order; unnamed columns
                // default to NULL.
                let mut out = vec![Value::Null; table.schema.columns.len()];
                for (expr, col) in row.iter().zip(&target) {
                    let idx = table
                        .schema
                        .columns
                        .iter()
                        .position(|c| &c.name == col)
                        .ok_or_else(|| anyhow!("Unknown column {} in table {}", col, tname))?;
                    let v = literal_value(expr)?;
                    check_type(&table.schema.columns[idx], &v)?;
                    out[idx] = v;
                }
                table.rows.push(out);
            }
            Ok(())
        }

        // DELETE FROM foo [WHERE col = literal [AND ...]];
        Statement::Delete { from, selection, .. } => {
            if from.len() != 1 {
                return Err(anyhow!("Only single table DELETE supported"));
            }
            let tname = match &from[0].relation {
                TableFactor::Table { name, .. } => name.0.last().unwrap().value.clone(),
                _ => return Err(anyhow!("Unsupported DELETE FROM target")),
            };
            let pred = match selection {
                None => None,
                Some(expr) => convert_expr(expr)?,
            };
            let table = state
                .tables
                .get_mut(&tname)
                .ok_or_else(|| anyhow!("Unknown table {}", tname))?;
            let schema = table.schema.clone();
            table.rows.retain(|r| !matches_pred(&schema, r, pred.as_ref()));
            Ok(())
        }

        // Script preamble/postamble: harmless inside our own transaction.
        Statement::SetVariable { .. } | Statement::StartTransaction { .. } | Statement::Commit { .. } => {
            Ok(())
        }

        _ => Err(anyhow!("Unsupported statement")),
    }
}

/// Converts a literal expression from the AST into a store value.
fn literal_value(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Value(sqlparser::ast::Value::Number(n, _)) => Ok(Value::Int(n.parse::<i64>()?)),
        Expr::Value(sqlparser::ast::Value::SingleQuotedString(s)) => Ok(Value::Text(s.clone())),
        Expr::Value(sqlparser::ast::Value::Null) => Ok(Value::Null),
        Expr::UnaryOp { op: UnaryOperator::Minus, expr } => match literal_value(expr)? {
            Value::Int(n) => Ok(Value::Int(-n)),
            _ => Err(anyhow!("Unsupported literal in VALUES")),
        },
        _ => Err(anyhow!("Unsupported literal in VALUES")),
    }
}

/// Rejects values whose type does not match the column. NULL fits anywhere.
fn check_type(column: &Column, value: &Value) -> Result<()> {
    let ok = matches!(
        (&column.col_type, value),
        (ColumnType::Int, Value::Int(_))
            | (ColumnType::Text, Value::Text(_))
            | (_, Value::Null)
    );
    if ok {
        Ok(())
    } else {
        Err(anyhow!("Type mismatch for column {}", column.name))
    }
}

/// Converts a WHERE expression AST into a predicate.
/// Only `column = literal` and AND chains thereof are supported.
fn convert_expr(expr: Expr) -> Result<Option<Predicate>> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::Eq => {
                let (col, val) = match (*left, *right) {
                    (Expr::Identifier(id), rhs) => (id.value, literal_value(&rhs)?),
                    _ => return Err(anyhow!("Only col = literal supported")),
                };
                Ok(Some(Predicate::Eq(col, val)))
            }
            BinaryOperator::And => {
                let l = convert_expr(*left)?;
                let r = convert_expr(*right)?;
                Ok(match (l, r) {
                    (Some(lp), Some(rp)) => Some(Predicate::And(Box::new(lp), Box::new(rp))),
                    (Some(p), None) | (None, Some(p)) => Some(p),
                    _ => None,
                })
            }
            _ => Err(anyhow!("Only = and AND supported in WHERE")),
        },
        _ => Err(anyhow!("Unsupported WHERE expression")),
    }
}

/// Evaluates a predicate against one positional row.
fn matches_pred(schema: &TableSchema, row: &[Value], pred: Option<&Predicate>) -> bool {
    match pred {
        None => true,
        Some(Predicate::Eq(col, val)) => schema
            .columns
            .iter()
            .position(|c| &c.name == col)
            .map(|i| &row[i] == val)
            .unwrap_or(false),
        Some(Predicate::And(l, r)) => {
            matches_pred(schema, row, Some(l)) && matches_pred(schema, row, Some(r))
        }
    }
}
