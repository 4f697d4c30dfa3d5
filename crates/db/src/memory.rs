//! Process-local backend keeping every table in a mutex-guarded map.
//!
//! Enforces the same constraints as the SQL backend (primary key, foreign
//! key and active-row uniqueness) so the record store behaves identically
//! on both.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::relational::{Cell, Predicate, RelationalStore, Row, TableSchema};

#[derive(Debug)]
struct MemTable {
    schema: TableSchema,
    rows: Vec<Row>,
}

/// Why `row` may not coexist with `other` in a table with `schema`, if it
/// may not.
fn conflict(schema: &TableSchema, row: &Row, other: &Row) -> Option<StoreError> {
    if schema.primary_key.iter().all(|c| row.get(c) == other.get(c)) {
        let key: Vec<&Cell> = schema.primary_key.iter().map(|c| row.get(c)).collect();
        return Some(StoreError::Constraint(format!(
            "duplicate primary key {key:?} in {}",
            schema.name
        )));
    }
    if let Some(unique) = schema.partial_unique {
        let both_active =
            row.get(unique.null_column).is_null() && other.get(unique.null_column).is_null();
        if both_active && row.get(unique.column) == other.get(unique.column) {
            return Some(StoreError::Constraint(format!(
                "{}.{} must be unique among rows with {} NULL",
                schema.name, unique.column, unique.null_column
            )));
        }
    }
    None
}

fn check_unique<'a>(
    schema: &TableSchema,
    row: &Row,
    others: impl IntoIterator<Item = &'a Row>,
) -> StoreResult<()> {
    match others.into_iter().find_map(|other| conflict(schema, row, other)) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Relational backend living entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, MemTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held by `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, |t| t.rows.len())
    }
}

fn missing_table(name: &str) -> StoreError {
    StoreError::Schema(format!("no such table {name}"))
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        if let Some(fk) = &schema.foreign_key {
            if !tables.contains_key(fk.references) {
                return Err(missing_table(fk.references));
            }
        }
        tables
            .entry(schema.name.to_string())
            .or_insert_with(|| MemTable {
                schema: schema.clone(),
                rows: Vec::new(),
            });
        tracing::debug!(table = schema.name, "Memory table ready");
        Ok(())
    }

    async fn insert_all(&self, rows: &[(&str, Row)]) -> StoreResult<()> {
        let mut tables = self.tables.lock();

        // Every row is checked against stored rows and the rows accepted
        // before it in this batch; nothing is written until all pass.
        for (i, (table, row)) in rows.iter().enumerate() {
            let target = tables.get(*table).ok_or_else(|| missing_table(table))?;
            let schema = &target.schema;
            schema.check_row(row)?;

            let earlier = rows[..i]
                .iter()
                .filter(|(t, _)| t == table)
                .map(|(_, r)| r);
            check_unique(schema, row, target.rows.iter().chain(earlier))?;

            if let Some(fk) = &schema.foreign_key {
                let referenced = tables
                    .get(fk.references)
                    .ok_or_else(|| missing_table(fk.references))?;
                let earlier_refs = rows[..i]
                    .iter()
                    .filter(|(t, _)| *t == fk.references)
                    .map(|(_, r)| r);
                let found = referenced.rows.iter().chain(earlier_refs).any(|candidate| {
                    fk.columns
                        .iter()
                        .zip(&fk.referenced)
                        .all(|(col, ref_col)| row.get(col) == candidate.get(ref_col))
                });
                if !found {
                    let key: Vec<&Cell> = fk.columns.iter().map(|c| row.get(c)).collect();
                    return Err(StoreError::Constraint(format!(
                        "{table} row references missing {} row {key:?}",
                        fk.references
                    )));
                }
            }
        }

        for (table, row) in rows {
            if let Some(target) = tables.get_mut(*table) {
                target.rows.push(row.clone());
            }
        }
        Ok(())
    }

    async fn query(&self, table: &str, predicate: &Predicate) -> StoreResult<Vec<Row>> {
        let tables = self.tables.lock();
        let stored = tables.get(table).ok_or_else(|| missing_table(table))?;
        stored.schema.check_predicate(predicate)?;
        Ok(stored
            .rows
            .iter()
            .filter(|row| predicate.matches(row))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        table: &str,
        predicate: &Predicate,
        set: &[(&str, Cell)],
    ) -> StoreResult<u64> {
        let mut tables = self.tables.lock();
        let stored = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        stored.schema.check_predicate(predicate)?;

        let mut changes: Vec<(usize, Row)> = Vec::new();
        for (i, row) in stored.rows.iter().enumerate() {
            if !predicate.matches(row) {
                continue;
            }
            let mut updated = row.clone();
            for (column, cell) in set {
                updated.set(column, cell.clone());
            }
            stored.schema.check_row(&updated)?;
            changes.push((i, updated));
        }

        // Updated rows must not clash with untouched rows or with each other.
        for (pos, (_, updated)) in changes.iter().enumerate() {
            let untouched = stored
                .rows
                .iter()
                .enumerate()
                .filter(|(j, _)| changes.binary_search_by_key(j, |(k, _)| *k).is_err())
                .map(|(_, r)| r);
            let other_updates = changes
                .iter()
                .enumerate()
                .filter(|(k, _)| *k != pos)
                .map(|(_, (_, r))| r);
            check_unique(&stored.schema, updated, untouched.chain(other_updates))?;
        }

        let changed = changes.len() as u64;
        for (i, updated) in changes {
            stored.rows[i] = updated;
        }
        Ok(changed)
    }
}
