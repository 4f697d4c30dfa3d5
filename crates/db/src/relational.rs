//! The relational collaborator: the four primitives the record store needs
//! from a storage engine, plus the row, predicate and schema types they
//! exchange.
//!
//! Backends convert rows into plain [`Row`] values as they are read, so
//! nothing handed back to callers depends on a live connection.

use std::collections::BTreeMap;

use async_trait::async_trait;
use labbook_core::types::Timestamp;

use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Cells and rows
// ---------------------------------------------------------------------------

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Integer(i64),
    Timestamp(Timestamp),
    Json(serde_json::Value),
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Integer(n)
    }
}

impl From<Timestamp> for Cell {
    fn from(t: Timestamp) -> Self {
        Cell::Timestamp(t)
    }
}

impl From<Option<Timestamp>> for Cell {
    fn from(t: Option<Timestamp>) -> Self {
        t.map_or(Cell::Null, Cell::Timestamp)
    }
}

impl From<serde_json::Value> for Cell {
    fn from(v: serde_json::Value) -> Self {
        Cell::Json(v)
    }
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

static NULL: Cell = Cell::Null;

/// A row as a column-name → value map. Absent columns read as NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(BTreeMap<String, Cell>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Row::set`].
    pub fn with(mut self, column: &str, cell: impl Into<Cell>) -> Self {
        self.set(column, cell);
        self
    }

    pub fn set(&mut self, column: &str, cell: impl Into<Cell>) {
        self.0.insert(column.to_string(), cell.into());
    }

    pub fn get(&self, column: &str) -> &Cell {
        self.0.get(column).unwrap_or(&NULL)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.0.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn text(&self, column: &str) -> StoreResult<&str> {
        match self.get(column) {
            Cell::Text(s) => Ok(s),
            other => Err(mistyped(column, "text", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> StoreResult<Timestamp> {
        match self.get(column) {
            Cell::Timestamp(t) => Ok(*t),
            other => Err(mistyped(column, "a timestamp", other)),
        }
    }

    pub fn optional_timestamp(&self, column: &str) -> StoreResult<Option<Timestamp>> {
        match self.get(column) {
            Cell::Null => Ok(None),
            Cell::Timestamp(t) => Ok(Some(*t)),
            other => Err(mistyped(column, "a timestamp or NULL", other)),
        }
    }

    pub fn json(&self, column: &str) -> StoreResult<&serde_json::Value> {
        match self.get(column) {
            Cell::Json(v) => Ok(v),
            other => Err(mistyped(column, "JSON", other)),
        }
    }
}

fn mistyped(column: &str, expected: &str, found: &Cell) -> StoreError {
    StoreError::Schema(format!("column {column} should hold {expected}, found {found:?}"))
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// One condition of a [`Predicate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Eq(String, Cell),
    IsNull(String),
}

impl Clause {
    pub fn column(&self) -> &str {
        match self {
            Clause::Eq(column, _) | Clause::IsNull(column) => column,
        }
    }
}

/// A conjunction of clauses. The empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    /// Require `column = cell`. Comparing with NULL means `column IS NULL`.
    pub fn eq(mut self, column: &str, cell: impl Into<Cell>) -> Self {
        let cell = cell.into();
        if cell.is_null() {
            return self.is_null(column);
        }
        self.clauses.push(Clause::Eq(column.to_string(), cell));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.clauses.push(Clause::IsNull(column.to_string()));
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(column, cell) => row.get(column) == cell,
            Clause::IsNull(column) => row.get(column).is_null(),
        })
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Timestamp,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    pub fn nullable(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

/// `columns` of this table reference `referenced` of table `references`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub columns: Vec<&'static str>,
    pub references: &'static str,
    pub referenced: Vec<&'static str>,
}

/// Uniqueness of `column` among rows where `null_column` IS NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialUnique {
    pub column: &'static str,
    pub null_column: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<&'static str>,
    pub foreign_key: Option<ForeignKey>,
    pub partial_unique: Option<PartialUnique>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Fail unless `name` is one of this table's columns.
    pub fn require_column(&self, name: &str) -> StoreResult<&ColumnDef> {
        self.column(name).ok_or_else(|| {
            StoreError::Schema(format!("table {} has no column {name}", self.name))
        })
    }

    /// Check every column a predicate mentions.
    pub fn check_predicate(&self, predicate: &Predicate) -> StoreResult<()> {
        for clause in predicate.clauses() {
            self.require_column(clause.column())?;
        }
        Ok(())
    }

    /// Check a row written to this table: known columns only, required
    /// columns present and non-NULL.
    pub fn check_row(&self, row: &Row) -> StoreResult<()> {
        for (name, _) in row.columns() {
            self.require_column(name)?;
        }
        for column in self.columns.iter().filter(|c| !c.nullable) {
            if row.get(column.name).is_null() {
                return Err(StoreError::Constraint(format!(
                    "{}.{} may not be NULL",
                    self.name, column.name
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// The storage engine behind the record store.
///
/// Every call runs in its own transaction or lock scope and releases it
/// before returning, on success and on error.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Create a table if it does not exist yet.
    async fn create_table(&self, schema: &TableSchema) -> StoreResult<()>;

    /// Insert rows into one or more tables, all or nothing.
    async fn insert_all(&self, rows: &[(&str, Row)]) -> StoreResult<()>;

    async fn insert(&self, table: &str, row: Row) -> StoreResult<()> {
        self.insert_all(&[(table, row)]).await
    }

    /// Rows of `table` matching `predicate`, in backend order.
    async fn query(&self, table: &str, predicate: &Predicate) -> StoreResult<Vec<Row>>;

    /// Assign `set` on every matching row, returning how many rows changed.
    async fn update(
        &self,
        table: &str,
        predicate: &Predicate,
        set: &[(&str, Cell)],
    ) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_matches_conjunction() {
        let row = Row::new().with("uid", "a").with("archived_at", Cell::Null);
        assert!(Predicate::all().matches(&row));
        assert!(Predicate::all().eq("uid", "a").is_null("archived_at").matches(&row));
        assert!(!Predicate::all().eq("uid", "b").matches(&row));
        assert!(Predicate::all().is_null("missing").matches(&row));
    }

    #[test]
    fn eq_null_becomes_is_null() {
        let predicate = Predicate::all().eq("archived_at", Cell::Null);
        assert_eq!(predicate.clauses(), &[Clause::IsNull("archived_at".into())]);
    }

    #[test]
    fn check_row_rejects_unknown_and_missing_columns() {
        let schema = TableSchema {
            name: "t",
            columns: vec![
                ColumnDef::required("uid", ColumnType::Text),
                ColumnDef::nullable("archived_at", ColumnType::Timestamp),
            ],
            primary_key: vec!["uid"],
            foreign_key: None,
            partial_unique: None,
        };
        assert!(schema.check_row(&Row::new().with("uid", "a")).is_ok());
        assert!(matches!(
            schema.check_row(&Row::new().with("uid", "a").with("bogus", "x")),
            Err(StoreError::Schema(_))
        ));
        assert!(matches!(
            schema.check_row(&Row::new()),
            Err(StoreError::Constraint(_))
        ));
    }
}
