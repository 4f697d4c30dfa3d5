use labbook_core::error::CoreError;

/// Errors raised by the relational backends and the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain-level error from `labbook_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A primary-key, foreign-key or uniqueness constraint was violated.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A table or column the backend does not know, or a row of the wrong shape.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
