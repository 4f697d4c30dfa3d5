//! Shared fixtures for the record store integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, TimeZone, Utc};
use labbook_core::models::{ChildRecord, ParentRecord};
use labbook_core::types::{EntityTime, Timestamp};
use labbook_db::{CreatePolicy, DbConfig, MemoryStore, RecordStore, SqliteStore};

pub async fn memory_store(policy: CreatePolicy) -> RecordStore<MemoryStore> {
    let store = RecordStore::with_policy(MemoryStore::new(), policy);
    store.bootstrap().await.unwrap();
    store
}

pub async fn sqlite_store(policy: CreatePolicy) -> RecordStore<SqliteStore> {
    let config = DbConfig {
        create_policy: policy,
        ..DbConfig::default()
    };
    labbook_db::open_sqlite_store(&config).await.unwrap()
}

/// A bookkeeping instant `secs` seconds after a fixed base.
pub fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn entity_time(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> EntityTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

pub fn family(parent_uid: &str, name: &str) -> ParentRecord {
    ParentRecord::new(
        parent_uid,
        name,
        [
            ChildRecord::new("child01", entity_time(2019, 1, 2, 3, 4, 5)),
            ChildRecord::new("child02", entity_time(2020, 6, 7, 8, 9, 0)),
        ],
    )
}
