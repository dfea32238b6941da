//! Site configuration management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for Folio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings.
    pub site: SiteConfig,

    /// Source directory layout.
    #[serde(default)]
    pub dirs: DirsConfig,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings.
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title.
    pub title: String,

    /// Base URL for the site (e.g., "https://example.com").
    pub base_url: String,
}

/// Source tree layout, relative to the source root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirsConfig {
    /// Files copied verbatim to the output.
    #[serde(default = "default_public_dir")]
    pub public: String,

    /// Page templates.
    #[serde(default = "default_pages_dir")]
    pub pages: String,

    /// Structured content files indexed into the content store.
    #[serde(default = "default_contents_dir")]
    pub contents: String,

    #[serde(default = "default_css_dir")]
    pub css: String,

    #[serde(default = "default_js_dir")]
    pub js: String,

    #[serde(default = "default_images_dir")]
    pub images: String,

    #[serde(default = "default_media_dir")]
    pub media: String,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Output directory for generated site.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Number of routes rendered or written concurrently.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Whether to emit `sitemap.xml`.
    #[serde(default = "default_true")]
    pub sitemap: bool,

    /// Whether hashed assets are written to the output directory.
    #[serde(default = "default_true")]
    pub write_assets: bool,

    /// Extensions of files under the pages directory that become routes.
    #[serde(default = "default_page_extensions")]
    pub page_extensions: Vec<String>,

    /// Explicit routes; `{table.field}` placeholders expand against content.
    #[serde(default)]
    pub routes: Vec<String>,

    /// Location of the persisted resource ledger, relative to the source root.
    #[serde(default = "default_ledger_path")]
    pub ledger: String,
}

/// Development server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Quiet period before queued file changes are flushed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

// Default value functions
fn default_public_dir() -> String {
    "public".to_string()
}

fn default_pages_dir() -> String {
    "pages".to_string()
}

fn default_contents_dir() -> String {
    "contents".to_string()
}

fn default_css_dir() -> String {
    "css".to_string()
}

fn default_js_dir() -> String {
    "js".to_string()
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_page_extensions() -> Vec<String> {
    ["html", "xml", "txt", "json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ledger_path() -> String {
    ".folio/ledger.json".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_debounce_ms() -> u64 {
    200
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            public: default_public_dir(),
            pages: default_pages_dir(),
            contents: default_contents_dir(),
            css: default_css_dir(),
            js: default_js_dir(),
            images: default_images_dir(),
            media: default_media_dir(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            batch_size: default_batch_size(),
            sitemap: true,
            write_assets: true,
            page_extensions: default_page_extensions(),
            routes: Vec::new(),
            ledger: default_ledger_path(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Config {
    /// Create a configuration with default layout for the given site.
    pub fn new(title: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            site: SiteConfig {
                title: title.into(),
                base_url: base_url.into(),
            },
            dirs: DirsConfig::default(),
            build: BuildConfig::default(),
            serve: ServeConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `FOLIO__SECTION__KEY` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("FOLIO").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.site.title.is_empty() {
            return Err(CoreError::config("site.title cannot be empty"));
        }

        if self.site.base_url.is_empty() {
            return Err(CoreError::config("site.base_url cannot be empty"));
        }

        if self.build.batch_size == 0 {
            return Err(CoreError::config("build.batch_size must be at least 1"));
        }

        if self.site.base_url.ends_with('/') {
            tracing::warn!("site.base_url should not have a trailing slash");
        }

        Ok(())
    }

    /// Directory holding page templates below `root`.
    pub fn pages_path(&self, root: &Path) -> PathBuf {
        root.join(&self.dirs.pages)
    }

    /// Directory holding content files below `root`.
    pub fn contents_path(&self, root: &Path) -> PathBuf {
        root.join(&self.dirs.contents)
    }

    /// Directory copied verbatim to the output.
    pub fn public_path(&self, root: &Path) -> PathBuf {
        root.join(&self.dirs.public)
    }

    /// The configured asset directories, in lookup order.
    pub fn asset_dirs(&self) -> [&str; 4] {
        [
            self.dirs.js.as_str(),
            self.dirs.css.as_str(),
            self.dirs.images.as_str(),
            self.dirs.media.as_str(),
        ]
    }
}
