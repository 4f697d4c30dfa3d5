//! The tutorial scenarios, runnable against any record store.
//!
//! Each scenario archives whatever active versions an earlier run left
//! behind before creating its own, so the demo can be repeated against a
//! persistent database.

use anyhow::Context;
use chrono::NaiveDate;
use labbook_core::codec::{Document, Value};
use labbook_core::entity::Encodable;
use labbook_core::kind::Storable;
use labbook_core::models::{ChildRecord, Details, Experiment, FlatRecord, ParentRecord};
use labbook_db::{RecordStore, RelationalStore};

/// Run every scenario, returning the lines to print.
pub async fn run<S: RelationalStore>(store: &RecordStore<S>) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    flat_lifecycle(store, &mut out).await?;
    parent_with_children(store, &mut out).await?;
    experiments(store, &mut out).await?;
    Ok(out)
}

fn show(out: &mut Vec<String>, label: &str, entity: &impl Encodable) -> anyhow::Result<()> {
    out.push(format!("{label}: {}", entity.to_json_string()?));
    Ok(())
}

/// Archive the active version of `uid`, if there is one.
async fn supersede<E: Storable, S: RelationalStore>(
    store: &RecordStore<S>,
    uid: &str,
) -> anyhow::Result<()> {
    if store.exists::<E>(uid, false).await? {
        store
            .archive_now::<E>(uid)
            .await
            .with_context(|| format!("Failed to archive {} {uid}", E::KIND))?;
    }
    Ok(())
}

async fn flat_lifecycle<S: RelationalStore>(
    store: &RecordStore<S>,
    out: &mut Vec<String>,
) -> anyhow::Result<()> {
    supersede::<FlatRecord, _>(store, "flat01").await?;
    store.create_now(&FlatRecord::new("flat01", "flat", 3)).await?;
    show(out, "flat", &store.get::<FlatRecord>("flat01", false).await?)?;
    out.push(format!(
        "exists flat01={} nonexistent={}",
        store.exists::<FlatRecord>("flat01", false).await?,
        store.exists::<FlatRecord>("nonexistent", false).await?
    ));

    store.archive_now::<FlatRecord>("flat01").await?;
    store.create_now(&FlatRecord::new("flat01", "flat", 5)).await?;
    show(out, "flat (new version)", &store.get::<FlatRecord>("flat01", false).await?)?;
    out.push(format!(
        "flat01 versions stored: {}",
        store.get_all::<FlatRecord>().await?.len()
    ));
    Ok(())
}

async fn parent_with_children<S: RelationalStore>(
    store: &RecordStore<S>,
    out: &mut Vec<String>,
) -> anyhow::Result<()> {
    let first = NaiveDate::from_ymd_opt(2019, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .context("invalid child timestamp")?;
    let second = NaiveDate::from_ymd_opt(2020, 6, 7)
        .and_then(|d| d.and_hms_opt(8, 9, 0))
        .context("invalid child timestamp")?;
    let parent = ParentRecord::new(
        "parent01",
        "parent",
        [
            ChildRecord::new("child01", first),
            ChildRecord::new("child02", second),
        ],
    );

    // Archiving a parent leaves its children active, so retire them too.
    supersede::<ParentRecord, _>(store, "parent01").await?;
    for child in ["child01", "child02"] {
        supersede::<ChildRecord, _>(store, child).await?;
    }

    store.create_now(&parent).await?;
    show(out, "parent", &store.get::<ParentRecord>("parent01", false).await?)?;
    show(out, "child", &store.get::<ChildRecord>("child01", false).await?)?;
    Ok(())
}

async fn experiments<S: RelationalStore>(
    store: &RecordStore<S>,
    out: &mut Vec<String>,
) -> anyhow::Result<()> {
    let all = [
        Experiment::new(
            "exp01",
            "with text",
            Details::Text {
                text: "text content".into(),
            },
        ),
        Experiment::new("exp02", "with number", Details::Number { number: 1234 }),
        Experiment::new(
            "exp03",
            "with dictionary",
            Details::Dictionary(Document::from([("k".to_string(), Value::Int(0))])),
        ),
    ];
    for exp in &all {
        supersede::<Experiment, _>(store, &exp.uid).await?;
        store.create_now(exp).await?;
        show(out, "experiment", &store.get::<Experiment>(&exp.uid, false).await?)?;
    }
    Ok(())
}
