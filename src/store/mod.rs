use anyhow::Result;
use serde::{Deserialize, Serialize};

mod memory;

pub use memory::{MemoryStore, MemoryView};

/// Represents a scalar value that can be stored in the database.
///
/// Supports integers, text strings, and SQL NULL. The NULL variant exists
/// because dump scripts must distinguish "no value" from an empty string
/// when a row is serialized and later replayed.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Value {
    /// 64-bit signed integer value
    Int(i64),
    /// UTF-8 text string value
    Text(String),
    /// SQL NULL marker
    Null,
}

/// Enumeration of supported column data types in the store.
///
/// Each type maps to a corresponding `Value` variant:
/// - `ColumnType::Int` ↔ `Value::Int(i64)`
/// - `ColumnType::Text` ↔ `Value::Text(String)`
///
/// `Value::Null` is permitted in any column.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum ColumnType {
    /// 64-bit signed integer type (SQL INT/INTEGER)
    Int,
    /// Variable-length UTF-8 string type (SQL TEXT/VARCHAR)
    Text,
}

impl ColumnType {
    /// SQL keyword used when the store renders its own CREATE TABLE text.
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            ColumnType::Int => "INT",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Definition of a single column within a table.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Column {
    /// Column name (must be unique within a table)
    pub name: String,
    /// Data type for values stored in this column
    pub col_type: ColumnType,
}

/// Schema definition for a table.
///
/// The order of columns in the `columns` vector determines INSERT VALUES
/// column matching, the internal positional row layout, and the column order
/// emitted into dump scripts.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct TableSchema {
    /// Table name (unique within the store)
    pub name: String,
    /// Ordered list of column definitions
    pub columns: Vec<Column>,
}

/// Quotes a scalar value as a SQL literal.
///
/// This is the engine's escaping primitive: every value that leaves the
/// store as script text goes through here and nowhere else. Text values are
/// wrapped in single quotes with embedded quotes doubled, which is exactly
/// the form the statement parser unescapes on replay. Integers render as
/// bare digits and NULL as the bare keyword.
///
/// ## Example
/// ```rust
/// use workhub_backup::store::{quote_literal, Value};
/// assert_eq!(quote_literal(&Value::Text("it's".into())), "'it''s'");
/// assert_eq!(quote_literal(&Value::Int(7)), "7");
/// assert_eq!(quote_literal(&Value::Null), "NULL");
/// ```
pub fn quote_literal(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Null => "NULL".to_string(),
    }
}

/// Quotes an identifier (table or column name) for use in statement text.
///
/// Uses ANSI double-quote delimiters with embedded double quotes doubled.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A consistent, read-only view over the store's tables.
///
/// A view is captured at one instant: every table read through the same view
/// reflects the same state, so a multi-table dump cannot observe one table
/// before a change and another table after it.
pub trait ReadView {
    /// Returns all table names in a stable (sorted) order.
    fn list_tables(&self) -> Vec<String>;

    /// Returns the store's own authoritative CREATE TABLE statement for the
    /// named table. The text is rendered by the store from its live schema,
    /// never reconstructed by callers, so it cannot drift from the truth.
    fn get_create_statement(&self, table: &str) -> Result<String>;

    /// Returns the column names (in schema order) and all rows (in storage
    /// order, values positionally matching the columns) for the named table.
    fn stream_rows(&self, table: &str) -> Result<(Vec<String>, Vec<Vec<Value>>)>;
}

/// Capabilities the backup engine consumes from a store.
///
/// The handle is injected explicitly into every component that needs it;
/// there is no ambient global store. This is what lets the tests substitute
/// an in-memory store for the real one.
///
/// ## Contract
/// - `read_view` captures one consistent snapshot for dump generation.
/// - `execute_in_transaction` replays statements atomically: either every
///   statement applies and the result becomes visible, or none do and the
///   error names the statement that failed.
pub trait Store {
    /// The view type produced by `read_view`.
    type View: ReadView;

    /// Captures a consistent read-only view of the current state.
    fn read_view(&self) -> impl std::future::Future<Output = Result<Self::View>> + Send;

    /// Executes the given statements inside one store-native transaction.
    ///
    /// On any statement failure the whole transaction is rolled back and the
    /// returned error carries the failing statement's position and detail.
    fn execute_in_transaction(
        &self,
        statements: &[String],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
