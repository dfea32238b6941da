//! Build orchestration.
//!
//! Coordinates one full site build: public copy, content indexing, batched
//! rendering, asset hashing, batched writes, ledger and sitemap.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use folio_content::ContentStore;
use folio_core::{Config, CoreError, ResourceType, Route};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    assets::{AssetError, AssetMap, Document},
    ledger::{LedgerEntry, LedgerError, ResourceLedger},
    public::copy_public,
    render::{RenderOptions, Renderer},
    routes::{discover_routes, expand_route, normalize_routes},
    sitemap::SitemapGenerator,
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Content indexing error.
    #[error("content error: {0}")]
    Content(#[from] CoreError),

    /// Asset error.
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),

    /// Ledger persistence error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build statistics.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of public files copied.
    pub public_files: usize,

    /// Number of routes attempted.
    pub routes: usize,

    /// Number of pages written.
    pub pages: usize,

    /// Number of routes dropped after a render error.
    pub failed: usize,

    /// Number of assets rendered and hashed.
    pub assets: usize,

    /// Number of render batches.
    pub batches: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Site builder that orchestrates the build process.
pub struct Builder {
    config: Config,
    root: PathBuf,
    output_dir: PathBuf,
    store: Arc<ContentStore>,
    ledger: Arc<ResourceLedger>,
    renderer: Arc<dyn Renderer>,
}

impl Builder {
    /// Create a new builder.
    ///
    /// The renderer should read from the same store passed to
    /// [`Builder::with_store`] so it sees the freshly indexed content.
    #[must_use]
    pub fn new(
        config: Config,
        root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            config,
            root: root.into(),
            output_dir: output_dir.into(),
            store: Arc::new(ContentStore::new()),
            ledger: Arc::new(ResourceLedger::new()),
            renderer,
        }
    }

    /// Use a shared content store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<ContentStore>) -> Self {
        self.store = store;
        self
    }

    /// Use a shared resource ledger.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<ResourceLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.ledger
    }

    /// Execute the full build process.
    pub async fn build(&self) -> Result<BuildStats> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        info!(
            root = %self.root.display(),
            output = %self.output_dir.display(),
            "starting build"
        );

        // 1. Copy public files
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let public = self.config.public_path(&self.root);
        let dest = self.output_dir.clone();
        stats.public_files =
            tokio::task::spawn_blocking(move || copy_public(&public, &dest)).await??;

        // 2. Index content
        let store = Arc::clone(&self.store);
        let contents = self.config.contents_path(&self.root);
        tokio::task::spawn_blocking(move || store.prepare(&contents)).await??;

        // 3. Invalidate the previous ledger
        self.ledger.clear();

        // 4. Collect routes
        let routes = self.collect_routes()?;
        stats.routes = routes.len();

        // 5. Render in batches
        let mut documents = Vec::new();
        let mut assets = AssetMap::new(&self.config);
        let batch_size = self.config.build.batch_size.max(1);

        for batch in routes.chunks(batch_size) {
            stats.batches += 1;
            debug!(batch = stats.batches, size = batch.len(), "rendering batch");

            let options = RenderOptions::default();
            let results = join_all(batch.iter().map(|route| self.renderer.render(route, &options))).await;

            for (route, result) in batch.iter().zip(results) {
                if result.is_error() {
                    warn!(
                        route = %route,
                        status = ?result.error_status,
                        error = result.error_message.as_deref().unwrap_or("unknown error"),
                        "render failed, skipping route"
                    );
                    stats.failed += 1;
                    continue;
                }

                let is_html = result.is_html();
                let document = Document {
                    route: route.clone(),
                    resource_type: result
                        .resource_type
                        .unwrap_or_else(|| ResourceType::from_route(route)),
                    content: String::from_utf8_lossy(&result.content).into_owned(),
                };
                if is_html {
                    assets.track(documents.len(), &document.content);
                }
                documents.push(document);
            }
        }

        // 6. Render, hash and write assets
        let asset_dest = self
            .config
            .build
            .write_assets
            .then_some(self.output_dir.as_path());
        let rendered = assets
            .render(self.renderer.as_ref(), &mut documents, asset_dest)
            .await?;
        stats.assets = rendered.len();
        self.ledger.insert_many(
            rendered
                .iter()
                .map(|a| LedgerEntry::new(&a.hashed_route, a.resource_type, a.hash.clone())),
        );

        // 7. Write pages in batches
        for batch in documents.chunks(batch_size) {
            let writes = batch.iter().map(|doc| self.write_document(doc));
            for written in join_all(writes).await {
                written?;
            }
            self.ledger.insert_many(
                batch
                    .iter()
                    .map(|doc| LedgerEntry::new(&doc.route, doc.resource_type, "")),
            );
            stats.pages += batch.len();
        }

        // 8. Sitemap
        if self.config.build.sitemap {
            self.generate_sitemap().await?;
        }

        if !self.config.build.ledger.is_empty() {
            self.ledger.save(&self.root.join(&self.config.build.ledger))?;
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            pages = stats.pages,
            failed = stats.failed,
            assets = stats.assets,
            public_files = stats.public_files,
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(stats)
    }

    /// Discovered page routes followed by configured routes, deduplicated.
    ///
    /// Configured routes are normalized and expanded against the content
    /// store, so call this after the store is prepared.
    pub fn collect_routes(&self) -> Result<Vec<String>> {
        let pages = self.config.pages_path(&self.root);
        let extensions = &self.config.build.page_extensions;
        let discovered = discover_routes(&pages, extensions)?;
        let configured = normalize_routes(&self.config.build.routes)
            .iter()
            .flat_map(|route| expand_route(route, &self.store))
            .collect::<Vec<_>>();

        let mut seen = HashSet::new();
        let routes: Vec<String> = discovered
            .into_iter()
            .chain(configured)
            .filter(|route| seen.insert(Route::new(route.as_str()).output_path(extensions)))
            .collect();

        debug!(count = routes.len(), "collected routes");
        Ok(routes)
    }

    async fn write_document(&self, document: &Document) -> std::io::Result<()> {
        let route = Route::new(document.route.as_str());
        let path = self
            .output_dir
            .join(route.output_path(&self.config.build.page_extensions));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, document.content.as_bytes()).await?;
        debug!(path = %path.display(), "wrote page");
        Ok(())
    }

    async fn generate_sitemap(&self) -> Result<()> {
        let entries = self.ledger.list_by_type(ResourceType::Html);
        let xml = SitemapGenerator::new(&self.config.site.base_url).generate(&entries);
        let path = self.output_dir.join("sitemap.xml");
        tokio::fs::write(&path, xml).await?;
        debug!(path = %path.display(), urls = entries.len(), "wrote sitemap");
        Ok(())
    }
}

/// Output directory for a build rooted at `root`.
pub fn output_dir(config: &Config, root: &Path) -> PathBuf {
    root.join(&config.build.output_dir)
}
