/// Bookkeeping timestamps (`created_at`, `archived_at`) are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Timestamps carried inside entity payloads are naive, as written by the caller.
pub type EntityTime = chrono::NaiveDateTime;
