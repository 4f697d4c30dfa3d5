use crate::error::{StoreError, StoreResult};
use crate::record_store::CreatePolicy;

/// Database configuration loaded from environment variables.
///
/// All fields have defaults suitable for local experiments: an in-memory
/// SQLite database that disappears with the process.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite connection URL (default: `sqlite::memory:`).
    pub database_url: String,
    /// Pool size for file-backed databases (default: `5`). In-memory
    /// databases always use a single connection.
    pub max_connections: u32,
    /// Behaviour of `create` when an active version exists.
    pub create_policy: CreatePolicy,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            max_connections: 5,
            create_policy: CreatePolicy::AppendOnly,
        }
    }
}

impl DbConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default           |
    /// |-------------------------|-------------------|
    /// | `DATABASE_URL`          | `sqlite::memory:` |
    /// | `DB_MAX_CONNECTIONS`    | `5`               |
    /// | `LABBOOK_REJECT_ACTIVE` | `false`           |
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                StoreError::Config(format!("DB_MAX_CONNECTIONS must be a valid u32, got {raw:?}"))
            })?,
            None => defaults.max_connections,
        };
        if max_connections == 0 {
            return Err(StoreError::Config("DB_MAX_CONNECTIONS must be at least 1".into()));
        }

        let create_policy = match lookup("LABBOOK_REJECT_ACTIVE").as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => CreatePolicy::AppendOnly,
            Some("1") | Some("true") => CreatePolicy::RejectActive,
            Some(other) => {
                return Err(StoreError::Config(format!(
                    "LABBOOK_REJECT_ACTIVE must be true or false, got {other:?}"
                )))
            }
        };

        Ok(Self {
            database_url,
            max_connections,
            create_policy,
        })
    }

    /// Whether the URL names a process-local in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = DbConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.create_policy, CreatePolicy::AppendOnly);
        assert!(config.is_in_memory());
    }

    #[test]
    fn overrides_are_read() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://labbook.db"),
            ("DB_MAX_CONNECTIONS", "2"),
            ("LABBOOK_REJECT_ACTIVE", "true"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite://labbook.db");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.create_policy, CreatePolicy::RejectActive);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert_matches!(
            DbConfig::from_lookup(lookup(&[("DB_MAX_CONNECTIONS", "many")])),
            Err(StoreError::Config(_))
        );
        assert_matches!(
            DbConfig::from_lookup(lookup(&[("DB_MAX_CONNECTIONS", "0")])),
            Err(StoreError::Config(_))
        );
        assert_matches!(
            DbConfig::from_lookup(lookup(&[("LABBOOK_REJECT_ACTIVE", "maybe")])),
            Err(StoreError::Config(_))
        );
    }
}
