//! Folio Generator Library
//!
//! Static site generation engine for Folio.
//!
//! # Modules
//!
//! - [`routes`] - Route discovery and request resolution
//! - [`template`] - Placeholder interpolation for page templates
//! - [`render`] - The renderer contract and the default file renderer
//! - [`assets`] - Asset tracking, content hashing and reference rewriting
//! - [`ledger`] - Persisted record of produced routes
//! - [`public`] - Verbatim copy of the public directory
//! - [`sitemap`] - XML sitemap generation
//! - [`build`] - Build orchestration

pub mod assets;
pub mod build;
pub mod ledger;
pub mod public;
pub mod render;
pub mod routes;
pub mod sitemap;
pub mod template;

pub use assets::{AssetMap, Document, hash_content, route_with_content_hash};
pub use build::{BuildStats, Builder};
pub use ledger::{LedgerEntry, ResourceLedger};
pub use render::{FileRenderer, RenderContext, RenderOptions, RenderResult, Renderer};
pub use routes::{Resource, RouteParams, discover_routes, find_resource, get_route_params};
pub use sitemap::SitemapGenerator;
pub use template::{Template, TemplateContext};
