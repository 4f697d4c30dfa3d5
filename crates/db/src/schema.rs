//! Record tables for each entity kind.
//!
//! Every record table holds `uid`, `data`, `created_at` and `archived_at`,
//! keyed by `(uid, created_at)` so successive versions of one uid coexist.
//! Child tables add `parent_uid` and `parent_created_at`, pointing at the
//! exact parent version they were written with.

use labbook_core::kind::EntityKind;

use crate::record_store::CreatePolicy;
use crate::relational::{ColumnDef, ColumnType, ForeignKey, PartialUnique, TableSchema};

pub const UID: &str = "uid";
pub const DATA: &str = "data";
pub const CREATED_AT: &str = "created_at";
pub const ARCHIVED_AT: &str = "archived_at";
pub const PARENT_UID: &str = "parent_uid";
pub const PARENT_CREATED_AT: &str = "parent_created_at";

/// Schema of the table backing `kind`.
///
/// Under [`CreatePolicy::RejectActive`], tables of directly created kinds
/// also allow only one active row per uid.
pub fn table_schema(kind: EntityKind, policy: CreatePolicy) -> TableSchema {
    let mut columns = vec![
        ColumnDef::required(UID, ColumnType::Text),
        ColumnDef::required(DATA, ColumnType::Json),
        ColumnDef::required(CREATED_AT, ColumnType::Timestamp),
        ColumnDef::nullable(ARCHIVED_AT, ColumnType::Timestamp),
    ];

    let foreign_key = kind.parent_kind().map(|parent| {
        columns.push(ColumnDef::required(PARENT_UID, ColumnType::Text));
        columns.push(ColumnDef::required(PARENT_CREATED_AT, ColumnType::Timestamp));
        ForeignKey {
            columns: vec![PARENT_UID, PARENT_CREATED_AT],
            references: parent.table(),
            referenced: vec![UID, CREATED_AT],
        }
    });

    let partial_unique = (policy == CreatePolicy::RejectActive && kind.parent_kind().is_none())
        .then_some(PartialUnique {
            column: UID,
            null_column: ARCHIVED_AT,
        });

    TableSchema {
        name: kind.table(),
        columns,
        primary_key: vec![UID, CREATED_AT],
        foreign_key,
        partial_unique,
    }
}
