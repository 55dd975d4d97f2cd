//! Database module - AppState and record operations
//!
//! - `store` - keyed record store over SQLite
//! - `locks` - per-record write serialization
//! - `agent` - agent registration, login bookkeeping, activation
//! - `quote` - quote lifecycle and document attachment
//! - `lead` - lead intake and status tracking
//! - `files` - uploads and the files a quote owns on disk

mod agent;
pub mod files;
pub mod locks;
mod lead;
mod quote;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::documents::DocumentRenderer;
use crate::metrics::RenderMetrics;

use self::locks::RecordLocks;
use self::store::{Collection, RecordStore, SqliteRecordStore};

pub const AGENTS: &str = "agents";
pub const QUOTES: &str = "quotes";
pub const LEADS: &str = "leads";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub agents: Collection,
    pub quotes: Collection,
    pub leads: Collection,
    pub locks: Arc<RecordLocks>,
    pub renderer: Arc<DocumentRenderer>,
    pub metrics: Arc<RenderMetrics>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        ensure_database_dir(&config.database_url)?;
        let store: Arc<dyn RecordStore> =
            Arc::new(SqliteRecordStore::connect(&config.database_url).await?);
        let renderer = DocumentRenderer::new(&config.render);
        Self::with_parts(config, store, renderer).await
    }

    /// Assemble state from an already-open store and a configured renderer.
    pub async fn with_parts(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        renderer: DocumentRenderer,
    ) -> anyhow::Result<Self> {
        let agents = Collection::open(store.clone(), AGENTS).await?;
        let quotes = Collection::open(store.clone(), QUOTES).await?;
        let leads = Collection::open(store.clone(), LEADS).await?;

        std::fs::create_dir_all(renderer.output_dir())?;
        log::info!(
            "Record store ready; documents go to {}",
            renderer.output_dir().display()
        );

        Ok(AppState {
            store,
            agents,
            quotes,
            leads,
            locks: Arc::new(RecordLocks::new()),
            renderer: Arc::new(renderer),
            metrics: Arc::new(RenderMetrics::new()?),
            config: Arc::new(config),
        })
    }
}

/// SQLite creates the file but not its parent directory.
fn ensure_database_dir(database_url: &str) -> std::io::Result<()> {
    if database_url.contains(":memory:") {
        return Ok(());
    }
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
