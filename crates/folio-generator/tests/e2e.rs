//! End-to-end tests for Folio.
//!
//! These tests build small source trees on disk and run them through the
//! public copy, content indexing and full build pipeline.

use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use folio_content::{ContentStore, QueryOptions};
use folio_core::{Config, ResourceType};
use folio_generator::{
    Builder, FileRenderer, RenderContext, RenderOptions, RenderResult, Renderer, find_resource,
    hash_content, public::copy_public,
};
use parking_lot::Mutex;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn config() -> Config {
    Config::new("Folio Test", "https://example.com")
}

fn file_builder(root: &Path, config: Config) -> Builder {
    let store = Arc::new(ContentStore::new());
    let context = RenderContext::new(config.clone(), root, Arc::clone(&store));
    Builder::new(
        config,
        root,
        root.join("dist"),
        Arc::new(FileRenderer::new(context)),
    )
    .with_store(store)
}

#[cfg(unix)]
#[test]
fn test_public_copy_follows_symlinks_and_skips_dot_files() {
    let site = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();

    let public = site.path().join("public");
    write(&public, "robots.txt", "User-agent: *");
    write(&public, "path_a/a.txt", "a");
    write(&public, ".foo", "hidden");
    write(outside.path(), "target.txt", "linked content");
    std::os::unix::fs::symlink(outside.path().join("target.txt"), public.join("symlink.txt"))
        .unwrap();

    copy_public(&public, dest.path()).unwrap();

    assert!(dest.path().join("robots.txt").exists());
    assert!(dest.path().join("path_a/a.txt").exists());
    assert_eq!(
        fs::read_to_string(dest.path().join("symlink.txt")).unwrap(),
        "linked content"
    );
    assert!(!dest.path().join(".foo").exists());
}

#[test]
fn test_content_table_from_json_file() {
    let site = TempDir::new().unwrap();
    write(
        site.path(),
        "contents/posts.json",
        r#"[{"slug": "first", "title": "First"}, {"slug": "second", "title": "Second"}]"#,
    );

    let store = ContentStore::new();
    store.prepare(&site.path().join("contents")).unwrap();

    let posts = store.query("posts", &QueryOptions::default());
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["slug"], "first");
    assert_eq!(posts[1]["slug"], "second");
}

#[test]
fn test_resolution_precedence() {
    let site = TempDir::new().unwrap();
    let config = config();
    write(site.path(), "pages/guide.html", "exact");
    write(site.path(), "pages/guide/index.html", "index");
    write(site.path(), "pages/_page_.html", "dynamic");

    let resolve = |path: &str| find_resource(site.path(), &config, path).map(|r| r.template);

    assert_eq!(resolve("/guide").as_deref(), Some("guide.html"));
    fs::remove_file(site.path().join("pages/guide.html")).unwrap();
    assert_eq!(resolve("/guide").as_deref(), Some("guide/index.html"));
    fs::remove_file(site.path().join("pages/guide/index.html")).unwrap();
    assert_eq!(resolve("/guide").as_deref(), Some("_page_.html"));
}

#[test]
fn test_dynamic_template_ancestor_traversal() {
    let site = TempDir::new().unwrap();
    write(site.path(), "pages/blogs/_title_.html", "{{ params.title }}");

    let resource = find_resource(site.path(), &config(), "/blogs/2023/11/03/test-post").unwrap();
    assert_eq!(resource.path, site.path().join("pages/blogs/_title_.html"));
}

/// Records how many renders are in flight whenever one starts.
#[derive(Default)]
struct CountingRenderer {
    in_flight: AtomicUsize,
    starts: Mutex<Vec<usize>>,
}

#[async_trait]
impl Renderer for CountingRenderer {
    async fn render(&self, route: &str, _options: &RenderOptions) -> RenderResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.starts.lock().push(now);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        RenderResult::ok(route, ResourceType::Html, b"<p>ok</p>".to_vec())
    }
}

#[tokio::test]
async fn test_batch_boundary() {
    let site = TempDir::new().unwrap();
    for i in 0..7 {
        write(site.path(), &format!("pages/page{i}.html"), "x");
    }

    let mut config = config();
    config.build.batch_size = 3;
    config.build.sitemap = false;

    let renderer = Arc::new(CountingRenderer::default());
    let builder = Builder::new(
        config,
        site.path(),
        site.path().join("dist"),
        Arc::clone(&renderer) as Arc<dyn Renderer>,
    );

    let stats = builder.build().await.unwrap();

    assert_eq!(stats.batches, 3);
    assert_eq!(stats.pages, 7);
    assert_eq!(*renderer.starts.lock(), vec![1, 2, 3, 1, 2, 3, 1]);
}

#[tokio::test]
async fn test_full_build() {
    let site = TempDir::new().unwrap();
    let root = site.path();

    write(root, "public/robots.txt", "User-agent: *");
    write(
        root,
        "contents/posts.json",
        r#"[{"slug": "hello", "title": "Hello"}, {"slug": "bye", "title": "Bye"}]"#,
    );
    write(
        root,
        "pages/index.html",
        r#"<html><head><link rel="stylesheet" href="/css/main.css"></head><body><script src="/js/app.js"></script></body></html>"#,
    );
    write(
        root,
        "pages/about.html",
        r#"<link rel="stylesheet" href="/css/main.css"><img src="https://cdn.example.com/x.png">"#,
    );
    write(root, "pages/blog/_slug_.html", "<h1>{{ params.slug }}</h1>");
    write(root, "css/main.css", "body { margin: 0 }");
    write(root, "js/app.js", "console.log('hi')");

    let mut config = config();
    config.build.routes = vec![
        "/blog/{posts.slug}".to_string(),
        "/missing".to_string(),
    ];

    let builder = file_builder(root, config);
    let stats = builder.build().await.unwrap();
    let dist = root.join("dist");

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pages, 4);
    assert_eq!(stats.assets, 2);
    assert!(dist.join("robots.txt").exists());
    assert!(!dist.join("missing/index.html").exists());
    assert_eq!(
        fs::read_to_string(dist.join("blog/hello/index.html")).unwrap(),
        "<h1>hello</h1>"
    );

    let css_hash = hash_content(b"body { margin: 0 }");
    let hashed_css = format!("/css/main.{css_hash}.css");
    assert!(dist.join(hashed_css.trim_start_matches('/')).exists());

    let index = fs::read_to_string(dist.join("index.html")).unwrap();
    let about = fs::read_to_string(dist.join("about.html")).unwrap();
    assert!(index.contains(&hashed_css));
    assert!(about.contains(&hashed_css));
    assert!(about.contains("https://cdn.example.com/x.png"));
    assert!(!index.contains(r#"src="/js/app.js""#));

    let ledger = builder.ledger();
    let css_entry = ledger.get(&hashed_css).unwrap();
    assert_eq!(css_entry.resource_type, ResourceType::Css);
    assert_eq!(css_entry.hash, css_hash);
    assert_eq!(ledger.get("index.html").unwrap().hash, "");
    assert!(ledger.get("missing").is_none());

    let sitemap = fs::read_to_string(dist.join("sitemap.xml")).unwrap();
    assert!(sitemap.contains("<loc>https://example.com/blog/bye</loc>"));
    assert!(sitemap.contains("<loc>https://example.com/about.html</loc>"));
    assert!(!sitemap.contains("main."));
}

#[tokio::test]
async fn test_rebuild_clears_ledger() {
    let site = TempDir::new().unwrap();
    write(site.path(), "pages/old.html", "old");

    let builder = file_builder(site.path(), config());
    builder.build().await.unwrap();
    assert!(builder.ledger().get("old.html").is_some());

    fs::remove_file(site.path().join("pages/old.html")).unwrap();
    write(site.path(), "pages/new.html", "new");
    builder.build().await.unwrap();

    assert!(builder.ledger().get("old.html").is_none());
    assert!(builder.ledger().get("new.html").is_some());
}

#[tokio::test]
async fn test_malformed_content_aborts_build() {
    let site = TempDir::new().unwrap();
    write(site.path(), "pages/index.html", "home");
    write(site.path(), "contents/broken.json", "{ nope");

    let result = file_builder(site.path(), config()).build().await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("broken.json"));
    assert!(!site.path().join("dist/index.html").exists());
}
