//! The renderer contract and the default file-template renderer.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use folio_content::ContentStore;
use folio_core::{Config, ResourceType};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::{
    routes::{find_resource, get_route_params},
    template::{Template, TemplateContext},
};

/// Extra input for a single render call.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Rendered HTML of every document referencing the asset being rendered.
    pub used_by: Vec<String>,
}

/// Outcome of rendering one route.
///
/// Failures are carried in `error_status`/`error_message` rather than as an
/// `Err`, so a failed route can be logged and dropped without aborting a
/// build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderResult {
    pub route: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
    pub resource_type: Option<ResourceType>,
    pub error_status: Option<u16>,
    pub error_message: Option<String>,
}

impl RenderResult {
    /// A successful render.
    pub fn ok(route: impl Into<String>, resource_type: ResourceType, content: Vec<u8>) -> Self {
        Self {
            route: route.into(),
            content_type: Some(resource_type.content_type().to_string()),
            content,
            resource_type: Some(resource_type),
            ..Self::default()
        }
    }

    /// A failed render with an HTTP-style status.
    pub fn error(route: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            error_status: Some(status),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_status.is_some()
    }

    /// Whether the output is an HTML document.
    pub fn is_html(&self) -> bool {
        !self.is_error()
            && (self.resource_type == Some(ResourceType::Html)
                || self
                    .content_type
                    .as_deref()
                    .is_some_and(|ct| ct.starts_with("text/html")))
    }
}

/// Produces the bytes for a route.
///
/// Implementations may run templates in isolated workers; callers never
/// share mutable state with them.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, route: &str, options: &RenderOptions) -> RenderResult;
}

/// Everything a [`FileRenderer`] needs, built once and reused for every
/// request.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub config: Config,
    /// Source root the configured directories are relative to.
    pub root: PathBuf,
    pub store: Arc<ContentStore>,
}

impl RenderContext {
    pub fn new(config: Config, root: impl Into<PathBuf>, store: Arc<ContentStore>) -> Self {
        Self {
            config,
            root: root.into(),
            store,
        }
    }

    /// Bootstrap from a serialized content index, as an isolated worker does.
    pub fn from_snapshot(
        config: Config,
        root: impl Into<PathBuf>,
        snapshot: &[u8],
    ) -> folio_core::Result<Self> {
        let store = ContentStore::from_snapshot(snapshot)?;
        Ok(Self::new(config, root, Arc::new(store)))
    }

    fn pages_path(&self) -> PathBuf {
        self.config.pages_path(&self.root)
    }
}

/// Renders pages by interpolating templates from the pages directory and
/// returns asset files unchanged.
///
/// Templates see `path`, `segments`, `params.<name>`, `site.title`,
/// `site.base_url` and `content.<table>...`.
#[derive(Debug, Clone)]
pub struct FileRenderer {
    context: RenderContext,
}

impl FileRenderer {
    pub fn new(context: RenderContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    fn render_template(&self, route: &str, template: &str, source: String) -> RenderResult {
        let params = get_route_params(route, template);
        let site = &self.context.config.site;

        let mut context = TemplateContext::new().with_store(&self.context.store);
        context.insert("path", params.path.clone());
        context.insert("segments", json!(params.segments));
        context.insert("params", json!(params.params));
        context.insert("site", json!({"title": site.title, "base_url": site.base_url}));

        let resource_type = ResourceType::from_route(template);
        match Template::new(template, source).render(&context) {
            Ok(output) => RenderResult::ok(route, resource_type, output.into_bytes()),
            Err(e) => RenderResult::error(route, 500, format!("{template}: {e}")),
        }
    }
}

fn is_template(path: &Path, pages: &Path, resource_type: ResourceType) -> bool {
    path.starts_with(pages)
        && matches!(
            resource_type,
            ResourceType::Html | ResourceType::Xml | ResourceType::Txt | ResourceType::Json
        )
}

#[async_trait]
impl Renderer for FileRenderer {
    async fn render(&self, route: &str, _options: &RenderOptions) -> RenderResult {
        let ctx = &self.context;
        let Some(resource) = find_resource(&ctx.root, &ctx.config, route) else {
            return RenderResult::error(route, 404, format!("no resource for {route}"));
        };

        debug!(route, template = %resource.template, "rendering");

        let bytes = match tokio::fs::read(&resource.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return RenderResult::error(
                    route,
                    500,
                    format!("failed to read {}: {e}", resource.path.display()),
                );
            }
        };

        if !is_template(&resource.path, &ctx.pages_path(), resource.resource_type) {
            return RenderResult::ok(route, resource.resource_type, bytes);
        }

        match String::from_utf8(bytes) {
            Ok(source) => self.render_template(route, &resource.template, source),
            Err(e) => RenderResult::error(route, 500, format!("{}: {e}", resource.template)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, fs};

    use tempfile::TempDir;

    use super::*;

    fn renderer(dir: &TempDir) -> FileRenderer {
        let store = ContentStore::new();
        store.replace(BTreeMap::from([(
            "posts".to_string(),
            vec![json!({"slug": "hello", "title": "Hello"})],
        )]));
        let config = Config::new("Folio", "https://example.com");
        FileRenderer::new(RenderContext::new(config, dir.path(), Arc::new(store)))
    }

    fn write(dir: &TempDir, rel: &str, body: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_render_page_template() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "pages/index.html",
            "<h1>{{ site.title }}</h1><p>{{ content.posts.title }}</p>",
        );

        let result = renderer(&dir).render("/", &RenderOptions::default()).await;

        assert!(result.is_html());
        assert_eq!(
            String::from_utf8(result.content).unwrap(),
            "<h1>Folio</h1><p>Hello</p>"
        );
    }

    #[tokio::test]
    async fn test_render_dynamic_params() {
        let dir = TempDir::new().unwrap();
        write(&dir, "pages/blog/_slug_.html", "slug={{ params.slug }}");

        let result = renderer(&dir)
            .render("/blog/a/b", &RenderOptions::default())
            .await;

        assert_eq!(String::from_utf8(result.content).unwrap(), "slug=a/b");
    }

    #[tokio::test]
    async fn test_render_asset_verbatim() {
        let dir = TempDir::new().unwrap();
        write(&dir, "css/main.css", "body { content: \"{{ x }}\"; }");

        let result = renderer(&dir)
            .render("/css/main.css", &RenderOptions::default())
            .await;

        assert!(!result.is_error());
        assert_eq!(result.resource_type, Some(ResourceType::Css));
        assert_eq!(result.content, b"body { content: \"{{ x }}\"; }");
    }

    #[tokio::test]
    async fn test_render_missing_route() {
        let dir = TempDir::new().unwrap();
        let result = renderer(&dir)
            .render("/nope", &RenderOptions::default())
            .await;

        assert_eq!(result.error_status, Some(404));
        assert!(!result.is_html());
    }

    #[tokio::test]
    async fn test_render_template_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "pages/broken.html", "{{ missing }}");

        let result = renderer(&dir)
            .render("/broken", &RenderOptions::default())
            .await;

        assert_eq!(result.error_status, Some(500));
        assert!(result.error_message.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_context_from_snapshot() {
        let dir = TempDir::new().unwrap();
        write(&dir, "pages/index.html", "{{ content.posts.slug }}");

        let snapshot = renderer(&dir).context().store.snapshot().unwrap();
        let config = Config::new("Folio", "https://example.com");
        let context = RenderContext::from_snapshot(config, dir.path(), &snapshot).unwrap();

        let result = FileRenderer::new(context)
            .render("/", &RenderOptions::default())
            .await;
        assert_eq!(result.content, b"hello");
    }
}
