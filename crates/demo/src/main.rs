use anyhow::Context;
use labbook_db::DbConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labbook_demo=debug,labbook_db=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DbConfig::from_env().context("Invalid database configuration")?;
    let store = labbook_db::open_sqlite_store(&config)
        .await
        .with_context(|| format!("Failed to open {}", config.database_url))?;
    tracing::info!(url = %config.database_url, policy = ?config.create_policy, "Record store ready");

    for line in labbook_demo::run(&store).await? {
        println!("{line}");
    }

    tracing::info!("Demo finished");
    Ok(())
}
