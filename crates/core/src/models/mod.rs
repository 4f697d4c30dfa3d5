//! Concrete entity kinds.
//!
//! Each submodule contains:
//! - The entity struct with its `validator` rules
//! - Hand-written `Encodable` (and `Composite` where it owns children)
//! - Its `Storable` binding to an [`EntityKind`](crate::kind::EntityKind)

pub mod child;
pub mod experiment;
pub mod flat;
pub mod parent;

pub use child::ChildRecord;
pub use experiment::{Details, DetailsKind, Experiment};
pub use flat::FlatRecord;
pub use parent::ParentRecord;
