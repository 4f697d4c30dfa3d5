//! SQLite backend built on sqlx.
//!
//! Timestamps are stored as fixed-width RFC 3339 text in UTC so that text
//! equality matches instant equality. JSON payloads are stored as text.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labbook_core::error::CoreError;
use labbook_core::types::Timestamp;
use parking_lot::RwLock;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row as _, Sqlite};

use crate::error::{StoreError, StoreResult};
use crate::relational::{Cell, Clause, ColumnType, Predicate, RelationalStore, Row, TableSchema};
use crate::DbPool;

const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Relational backend over a SQLite connection pool.
///
/// Table schemas are registered by `create_table` and used to validate
/// column names and to decode stored text back into typed cells.
pub struct SqliteStore {
    pool: DbPool,
    schemas: RwLock<HashMap<String, TableSchema>>,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn schema(&self, table: &str) -> StoreResult<TableSchema> {
        self.schemas
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::Schema(format!("no such table {table}")))
    }
}

// ---------------------------------------------------------------------------
// SQL rendering
// ---------------------------------------------------------------------------

fn create_table_sql(schema: &TableSchema) -> String {
    let mut parts: Vec<String> = schema
        .columns
        .iter()
        .map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("{} TEXT{null}", c.name)
        })
        .collect();
    parts.push(format!("PRIMARY KEY ({})", schema.primary_key.join(", ")));
    if let Some(fk) = &schema.foreign_key {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            fk.columns.join(", "),
            fk.references,
            fk.referenced.join(", ")
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        schema.name,
        parts.join(", ")
    )
}

fn partial_unique_sql(schema: &TableSchema) -> Option<String> {
    schema.partial_unique.map(|unique| {
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_{table}_active ON {table} ({column}) WHERE {null} IS NULL",
            table = schema.name,
            column = unique.column,
            null = unique.null_column
        )
    })
}

/// `WHERE ...` for `predicate`, or an empty string when it matches all rows.
fn where_sql(predicate: &Predicate) -> String {
    if predicate.clauses().is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = predicate
        .clauses()
        .iter()
        .map(|clause| match clause {
            Clause::Eq(column, _) => format!("{column} = ?"),
            Clause::IsNull(column) => format!("{column} IS NULL"),
        })
        .collect();
    format!(" WHERE {}", conditions.join(" AND "))
}

fn format_stored(t: &Timestamp) -> String {
    t.format(STORED_TIMESTAMP_FORMAT).to_string()
}

fn parse_stored(column: &str, raw: &str) -> StoreResult<Timestamp> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Schema(format!("column {column} holds invalid timestamp {raw:?}: {e}")))
}

fn bind_cell<'q>(query: SqliteQuery<'q>, cell: &Cell) -> SqliteQuery<'q> {
    match cell {
        Cell::Null => query.bind(None::<String>),
        Cell::Text(s) => query.bind(s.clone()),
        Cell::Integer(n) => query.bind(*n),
        Cell::Timestamp(t) => query.bind(format_stored(t)),
        Cell::Json(v) => query.bind(v.to_string()),
    }
}

fn bind_predicate<'q>(mut query: SqliteQuery<'q>, predicate: &Predicate) -> SqliteQuery<'q> {
    for clause in predicate.clauses() {
        if let Clause::Eq(_, cell) = clause {
            query = bind_cell(query, cell);
        }
    }
    query
}

fn decode_row(schema: &TableSchema, row: &SqliteRow) -> StoreResult<Row> {
    let mut decoded = Row::new();
    for column in &schema.columns {
        let raw: Option<String> = row.try_get(column.name)?;
        let cell = match (raw, column.ty) {
            (None, _) => Cell::Null,
            (Some(text), ColumnType::Text) => Cell::Text(text),
            (Some(text), ColumnType::Timestamp) => Cell::Timestamp(parse_stored(column.name, &text)?),
            (Some(text), ColumnType::Json) => {
                Cell::Json(serde_json::from_str(&text).map_err(CoreError::from)?)
            }
        };
        decoded.set(column.name, cell);
    }
    Ok(decoded)
}

/// Map constraint failures reported by SQLite onto [`StoreError::Constraint`].
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() {
            return StoreError::Constraint(db.message().to_string());
        }
    }
    StoreError::Database(err)
}

// ---------------------------------------------------------------------------
// RelationalStore
// ---------------------------------------------------------------------------

#[async_trait]
impl RelationalStore for SqliteStore {
    async fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&create_table_sql(schema))
            .execute(&mut *tx)
            .await?;
        if let Some(index) = partial_unique_sql(schema) {
            sqlx::query(&index).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        self.schemas
            .write()
            .insert(schema.name.to_string(), schema.clone());
        tracing::debug!(table = schema.name, "SQLite table ready");
        Ok(())
    }

    async fn insert_all(&self, rows: &[(&str, Row)]) -> StoreResult<()> {
        let mut statements = Vec::with_capacity(rows.len());
        for (table, row) in rows {
            let schema = self.schema(table)?;
            schema.check_row(row)?;
            let columns: Vec<&str> = row.columns().map(|(name, _)| name).collect();
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            );
            statements.push((sql, row));
        }

        let mut tx = self.pool.begin().await?;
        for (sql, row) in &statements {
            let mut query = sqlx::query(sql);
            for (_, cell) in row.columns() {
                query = bind_cell(query, cell);
            }
            query.execute(&mut *tx).await.map_err(classify)?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, table: &str, predicate: &Predicate) -> StoreResult<Vec<Row>> {
        let schema = self.schema(table)?;
        schema.check_predicate(predicate)?;

        let columns: Vec<&str> = schema.columns.iter().map(|c| c.name).collect();
        let sql = format!(
            "SELECT {} FROM {table}{} ORDER BY rowid",
            columns.join(", "),
            where_sql(predicate)
        );

        let mut tx = self.pool.begin().await?;
        let fetched = bind_predicate(sqlx::query(&sql), predicate)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        fetched.iter().map(|row| decode_row(&schema, row)).collect()
    }

    async fn update(
        &self,
        table: &str,
        predicate: &Predicate,
        set: &[(&str, Cell)],
    ) -> StoreResult<u64> {
        let schema = self.schema(table)?;
        schema.check_predicate(predicate)?;
        for (column, cell) in set {
            let def = schema.require_column(column)?;
            if cell.is_null() && !def.nullable {
                return Err(StoreError::Constraint(format!(
                    "{table}.{column} may not be NULL"
                )));
            }
        }
        if set.is_empty() {
            return Ok(0);
        }

        let assignments: Vec<String> = set.iter().map(|(column, _)| format!("{column} = ?")).collect();
        let sql = format!(
            "UPDATE {table} SET {}{}",
            assignments.join(", "),
            where_sql(predicate)
        );

        let mut tx = self.pool.begin().await?;
        let mut query = sqlx::query(&sql);
        for (_, cell) in set {
            query = bind_cell(query, cell);
        }
        let result = bind_predicate(query, predicate)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use labbook_core::kind::EntityKind;

    use super::*;
    use crate::record_store::CreatePolicy;
    use crate::schema::table_schema;

    #[test]
    fn child_table_ddl_carries_foreign_key() {
        let sql = create_table_sql(&table_schema(EntityKind::Child, CreatePolicy::AppendOnly));
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS child_records ("));
        assert!(sql.contains("archived_at TEXT,"));
        assert!(sql.contains("PRIMARY KEY (uid, created_at)"));
        assert!(sql.contains(
            "FOREIGN KEY (parent_uid, parent_created_at) REFERENCES parent_records (uid, created_at)"
        ));
    }

    #[test]
    fn active_index_only_under_reject_policy() {
        assert!(partial_unique_sql(&table_schema(EntityKind::Flat, CreatePolicy::AppendOnly)).is_none());
        assert_eq!(
            partial_unique_sql(&table_schema(EntityKind::Flat, CreatePolicy::RejectActive)).unwrap(),
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_flat_records_active ON flat_records (uid) WHERE archived_at IS NULL"
        );
    }

    #[test]
    fn where_clause_uses_placeholders() {
        assert_eq!(where_sql(&Predicate::all()), "");
        let predicate = Predicate::all().eq("uid", "a").is_null("archived_at");
        assert_eq!(where_sql(&predicate), " WHERE uid = ? AND archived_at IS NULL");
    }

    #[test]
    fn stored_timestamps_are_fixed_width_and_round_trip() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_stored(&whole), "2024-01-02T03:04:05.000000000Z");
        let precise = whole + chrono::Duration::nanoseconds(123_456_789);
        assert_eq!(parse_stored("t", &format_stored(&precise)).unwrap(), precise);
    }
}
