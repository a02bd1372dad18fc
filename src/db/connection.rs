use sea_orm::DatabaseConnection;
use tracing::info;

use super::providers::{DbProviders, default_registry, redact_url};
use crate::config::DatabaseConfig;

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    connect_with(&default_registry()?, cfg).await
}

/// Opens the pool through the matching backend and brings the schema up to
/// date with the entities.
pub async fn connect_with(
    providers: &DbProviders,
    cfg: &DatabaseConfig,
) -> anyhow::Result<DatabaseConnection> {
    let provider = providers.provider_for_url(&cfg.url)?;
    info!(backend = %provider.id(), url = %redact_url(&cfg.url), "connecting to database");

    let db = provider.connect(cfg).await?;
    provider.post_connect(&db).await?;
    sync_schema(&db).await?;
    Ok(db)
}

pub async fn sync_schema(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("syncing database schema from entities");
    db.get_schema_registry("tg_agent_bot::db::entities::*")
        .sync(db)
        .await?;
    Ok(())
}
