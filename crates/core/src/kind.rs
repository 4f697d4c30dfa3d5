//! Closed set of persisted entity kinds and the storage capability traits.

use std::fmt;

use validator::Validate;

use crate::codec::Document;
use crate::entity::Encodable;
use crate::error::CoreError;

/// Every entity kind the record store knows how to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Flat,
    Child,
    Parent,
    Experiment,
}

/// All kinds, parents before the children that reference them.
pub const ALL_KINDS: &[EntityKind] = &[
    EntityKind::Flat,
    EntityKind::Parent,
    EntityKind::Child,
    EntityKind::Experiment,
];

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Flat => "flat",
            EntityKind::Child => "child",
            EntityKind::Parent => "parent",
            EntityKind::Experiment => "experiment",
        }
    }

    /// Table holding this kind's records.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Flat => "flat_records",
            EntityKind::Child => "child_records",
            EntityKind::Parent => "parent_records",
            EntityKind::Experiment => "experiments",
        }
    }

    /// The kind whose rows this kind owns, if any.
    pub fn child_kind(self) -> Option<EntityKind> {
        match self {
            EntityKind::Parent => Some(EntityKind::Child),
            _ => None,
        }
    }

    /// The kind owning rows of this kind, if any.
    pub fn parent_kind(self) -> Option<EntityKind> {
        match self {
            EntityKind::Child => Some(EntityKind::Parent),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity the record store can read back and archive.
///
/// The provided methods cover flat kinds; composite kinds override them to
/// split children into their own rows and reattach them on read.
pub trait Storable: Encodable + Validate + Send + Sync {
    const KIND: EntityKind;

    /// Payload for this entity's own row.
    fn stored_dict(&self) -> Result<Document, CoreError> {
        self.to_dict()
    }

    /// `(uid, payload)` of each child row written with this entity.
    fn owned_children(&self) -> Result<Vec<(String, Document)>, CoreError> {
        Ok(Vec::new())
    }

    /// Rebuild the entity from its row payload and its child rows' payloads.
    fn restore(src: &Document, _children: &[Document]) -> Result<Self, CoreError> {
        Self::from_dict(src)
    }
}

/// A storable entity that may be created directly. Child kinds are only
/// written through their parent and do not implement this.
pub trait RootEntity: Storable {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_distinct() {
        let mut tables: Vec<_> = ALL_KINDS.iter().map(|k| k.table()).collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), ALL_KINDS.len());
    }

    #[test]
    fn parents_precede_their_children() {
        for (i, kind) in ALL_KINDS.iter().enumerate() {
            if let Some(parent) = kind.parent_kind() {
                let parent_pos = ALL_KINDS.iter().position(|k| *k == parent).unwrap();
                assert!(parent_pos < i, "{parent} must come before {kind}");
                assert_eq!(parent.child_kind(), Some(*kind));
            }
        }
    }
}
