use crate::kind::EntityKind;

/// Domain-level failures raised by the codec, the entity model and the
/// record store built on top of them.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A value has no JSON representation.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Stored or transported JSON does not describe a valid value.
    #[error("Decoding failed: {0}")]
    Decoding(String),

    #[error("Entity not found: {kind} with uid {uid}")]
    NotFound { kind: EntityKind, uid: String },

    /// More rows matched than the operation allows, or no active row exists
    /// where one is required.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// A child reference could not be resolved against the supplied pool.
    #[error("Lookup failed: no child with uid {uid}")]
    Lookup { uid: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Decoding(err.to_string())
    }
}
