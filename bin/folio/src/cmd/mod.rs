//! Command implementations.

pub mod build;
pub mod query;
pub mod routes;
pub mod serve;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use color_eyre::eyre::{Result, WrapErr};
use folio_content::ContentStore;
use folio_core::Config;
use folio_generator::{FileRenderer, RenderContext};

/// Load and validate the configuration, applying `FOLIO__*` overrides.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let config = Config::load_with_env(config_path)
        .wrap_err_with(|| format!("Failed to load configuration from {}", config_path.display()))?;
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}

/// Index the contents directory into a fresh store.
pub async fn prepare_store(config: &Config, root: &Path) -> Result<Arc<ContentStore>> {
    let store = Arc::new(ContentStore::new());
    let contents = config.contents_path(root);
    let indexed = Arc::clone(&store);
    tokio::task::spawn_blocking(move || indexed.prepare(&contents))
        .await
        .wrap_err("Content indexing task failed")?
        .wrap_err("Failed to index content")?;
    Ok(store)
}

/// The default renderer over `store`.
pub fn file_renderer(config: &Config, root: &Path, store: Arc<ContentStore>) -> Arc<FileRenderer> {
    Arc::new(FileRenderer::new(RenderContext::new(
        config.clone(),
        root,
        store,
    )))
}

/// Absolute form of the source root.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    root.canonicalize()
        .wrap_err_with(|| format!("Source root not found: {}", root.display()))
}
