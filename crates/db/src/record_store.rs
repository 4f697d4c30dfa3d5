//! Append-only, versioned persistence of entities with soft archival.
//!
//! Each uid moves through `NONE → ACTIVE → ARCHIVED → ACTIVE …`. `create`
//! always inserts a new row and `archive` only stamps `archived_at`, so
//! every earlier version is kept as history.

use chrono::Utc;
use labbook_core::codec::{self, Document};
use labbook_core::entity::into_document;
use labbook_core::error::CoreError;
use labbook_core::kind::{EntityKind, RootEntity, Storable, ALL_KINDS};
use labbook_core::types::Timestamp;
use labbook_core::validation::validate_entity;

use crate::error::StoreResult;
use crate::relational::{Cell, Predicate, RelationalStore, Row};
use crate::schema::{self, ARCHIVED_AT, CREATED_AT, DATA, PARENT_CREATED_AT, PARENT_UID, UID};

/// What `create` does when the uid already has an active version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreatePolicy {
    /// Insert regardless; callers archive first if they want one active row.
    #[default]
    AppendOnly,
    /// Refuse with an integrity error, backed by a partial unique index.
    RejectActive,
}

/// Provides create / get / archive operations for every storable kind.
pub struct RecordStore<S> {
    backend: S,
    policy: CreatePolicy,
}

impl<S: RelationalStore> RecordStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_policy(backend, CreatePolicy::default())
    }

    pub fn with_policy(backend: S, policy: CreatePolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn policy(&self) -> CreatePolicy {
        self.policy
    }

    /// Create the tables for every known entity kind.
    pub async fn bootstrap(&self) -> StoreResult<()> {
        for kind in ALL_KINDS {
            self.backend
                .create_table(&schema::table_schema(*kind, self.policy))
                .await?;
        }
        tracing::info!(policy = ?self.policy, "Record tables ready");
        Ok(())
    }

    // -- Writes --------------------------------------------------------------

    /// Insert a new version of `entity` created at `when`.
    ///
    /// Composite entities store their own row with children in reference
    /// form plus one row per child, all sharing `created_at = when` and
    /// written atomically.
    pub async fn create<E: RootEntity>(&self, entity: &E, when: Timestamp) -> StoreResult<()> {
        let kind = E::KIND;
        let uid = entity.uid();
        validate_entity(entity, kind.as_str())?;

        if self.policy == CreatePolicy::RejectActive && self.exists::<E>(uid, false).await? {
            tracing::warn!(%kind, uid, "Create refused: active version exists");
            return Err(CoreError::Integrity(format!(
                "{kind} {uid} already has an active version; archive it first"
            ))
            .into());
        }

        let mut rows = vec![(kind.table(), record_row(uid, &entity.stored_dict()?, when)?)];

        let children = entity.owned_children()?;
        let child_count = children.len();
        if let Some(child_kind) = kind.child_kind() {
            for (child_uid, doc) in children {
                let row = record_row(&child_uid, &doc, when)?
                    .with(PARENT_UID, uid)
                    .with(PARENT_CREATED_AT, when);
                rows.push((child_kind.table(), row));
            }
        } else if child_count > 0 {
            return Err(CoreError::Integrity(format!("{kind} entities cannot own children")).into());
        }

        self.backend.insert_all(&rows).await?;
        tracing::debug!(%kind, uid, children = child_count, %when, "Record created");
        Ok(())
    }

    /// [`RecordStore::create`] at the current time, returning that time.
    pub async fn create_now<E: RootEntity>(&self, entity: &E) -> StoreResult<Timestamp> {
        let when = Utc::now();
        self.create(entity, when).await?;
        Ok(when)
    }

    /// Mark the active version of `uid` as archived at `when`.
    ///
    /// Exactly one active row must exist. Children are left untouched.
    pub async fn archive<E: Storable>(&self, uid: &str, when: Timestamp) -> StoreResult<Timestamp> {
        let kind = E::KIND;
        let active = self
            .backend
            .query(kind.table(), &uid_filter(uid, false))
            .await?;
        if active.len() != 1 {
            tracing::warn!(%kind, uid, active = active.len(), "Archive refused");
            return Err(CoreError::Integrity(format!(
                "archiving {kind} {uid} requires exactly one active version, found {}",
                active.len()
            ))
            .into());
        }

        let created_at = active[0].timestamp(CREATED_AT)?;
        let target = Predicate::all()
            .eq(UID, uid)
            .eq(CREATED_AT, created_at)
            .is_null(ARCHIVED_AT);
        let updated = self
            .backend
            .update(kind.table(), &target, &[(ARCHIVED_AT, Cell::Timestamp(when))])
            .await?;
        if updated != 1 {
            return Err(CoreError::Integrity(format!(
                "archiving {kind} {uid} changed {updated} rows"
            ))
            .into());
        }

        tracing::debug!(%kind, uid, %when, "Record archived");
        Ok(when)
    }

    /// [`RecordStore::archive`] at the current time.
    pub async fn archive_now<E: Storable>(&self, uid: &str) -> StoreResult<Timestamp> {
        self.archive::<E>(uid, Utc::now()).await
    }

    // -- Reads ---------------------------------------------------------------

    /// Load the single version of `uid`.
    ///
    /// Only the active version is considered unless `archived` is set, in
    /// which case archived versions are included too. Zero matches is a
    /// not-found error, several is an integrity error.
    pub async fn get<E: Storable>(&self, uid: &str, archived: bool) -> StoreResult<E> {
        let kind = E::KIND;
        let rows = self
            .backend
            .query(kind.table(), &uid_filter(uid, archived))
            .await?;
        let row = exactly_one(kind, uid, rows)?;
        self.restore(&row).await
    }

    /// Every stored row of the kind, active or not, each decoded on its own.
    pub async fn get_all<E: Storable>(&self) -> StoreResult<Vec<E>> {
        let rows = self.backend.query(E::KIND.table(), &Predicate::all()).await?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            entities.push(self.restore(row).await?);
        }
        Ok(entities)
    }

    /// Whether `uid` has a version under the same filter [`RecordStore::get`] uses.
    pub async fn exists<E: Storable>(&self, uid: &str, archived: bool) -> StoreResult<bool> {
        let rows = self
            .backend
            .query(E::KIND.table(), &uid_filter(uid, archived))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn restore<E: Storable>(&self, row: &Row) -> StoreResult<E> {
        let doc = row_document(row)?;

        let mut children = Vec::new();
        if let Some(child_kind) = E::KIND.child_kind() {
            let filter = Predicate::all()
                .eq(PARENT_UID, row.text(UID)?)
                .eq(PARENT_CREATED_AT, row.timestamp(CREATED_AT)?);
            for child_row in self.backend.query(child_kind.table(), &filter).await? {
                children.push(row_document(&child_row)?);
            }
        }

        Ok(E::restore(&doc, &children)?)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn uid_filter(uid: &str, archived: bool) -> Predicate {
    let filter = Predicate::all().eq(UID, uid);
    if archived {
        filter
    } else {
        filter.is_null(ARCHIVED_AT)
    }
}

fn record_row(uid: &str, doc: &Document, when: Timestamp) -> StoreResult<Row> {
    let data = serde_json::Value::Object(codec::encode_document(doc)?);
    Ok(Row::new()
        .with(UID, uid)
        .with(DATA, data)
        .with(CREATED_AT, when)
        .with(ARCHIVED_AT, Cell::Null))
}

fn row_document(row: &Row) -> StoreResult<Document> {
    let value = codec::decode(row.json(DATA)?)?;
    Ok(into_document(value)?)
}

fn exactly_one(kind: EntityKind, uid: &str, mut rows: Vec<Row>) -> StoreResult<Row> {
    match rows.len() {
        0 => Err(CoreError::NotFound {
            kind,
            uid: uid.to_string(),
        }
        .into()),
        1 => Ok(rows.swap_remove(0)),
        n => {
            tracing::warn!(%kind, uid, matches = n, "Expected a single record");
            Err(CoreError::Integrity(format!("{n} records of {kind} match uid {uid}")).into())
        }
    }
}
