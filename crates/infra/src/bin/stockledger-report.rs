//! Print the analytics report of the organization a user belongs to.
//!
//! Usage: `stockledger-report <user-id>` with `DATABASE_URL` set.

use std::sync::Arc;

use anyhow::{Context, bail};

use stockledger_core::{SystemClock, UserId};
use stockledger_infra::{Engine, EngineConfig, PostgresStore, Resolution};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let user_id: UserId = std::env::args()
        .nth(1)
        .context("usage: stockledger-report <user-id>")?
        .parse()
        .context("user id must be a UUID")?;

    let config = EngineConfig::from_env();
    let Some(database_url) = config.database_url.as_deref() else {
        bail!("DATABASE_URL must be set");
    };

    let store = PostgresStore::connect(database_url, config.db_max_connections)
        .await
        .context("failed to connect to Postgres")?;
    store.ensure_schema().await.context("failed to prepare schema")?;

    let engine = Engine::new(Arc::new(store), Arc::new(SystemClock), &config);

    let ctx = match engine.resolver.resolve(user_id).await? {
        Resolution::Resolved(ctx) => ctx,
        Resolution::NoTenant => bail!("user {user_id} does not belong to an organization"),
    };
    tracing::info!(tenant_id = %ctx.tenant_id(), "building report");

    let report = engine.analytics.report(&ctx).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
