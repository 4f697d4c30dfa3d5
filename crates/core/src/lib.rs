//! Domain layer: the JSON codec, entity capability traits, entity kinds and
//! the concrete entities persisted by `labbook-db`.

pub mod codec;
pub mod entity;
pub mod error;
pub mod kind;
pub mod models;
pub mod types;
pub mod validation;
