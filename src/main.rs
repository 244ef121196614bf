use anyhow::Context;
use std::sync::Arc;

use dualdeck::config::AppConfig;
use dualdeck::opener::BrowserOpener;
use dualdeck::players::NoEmbeddedPlayer;
use dualdeck::storage::{Persistence, SqliteStore};
use dualdeck::Dashboard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let store = SqliteStore::open(&config.database_path)
        .await
        .with_context(|| format!("failed to open {:?}", config.database_path))?;

    let dashboard = Dashboard::connect(
        &config,
        Persistence::new(Arc::new(store)),
        Arc::new(NoEmbeddedPlayer),
        Arc::new(BrowserOpener),
    )?;

    let playlists = dashboard.get_unified_playlists().await?;
    log::info!("Found {} playlists", playlists.len());
    println!("{}", serde_json::to_string_pretty(&playlists)?);

    Ok(())
}
