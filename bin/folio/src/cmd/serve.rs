//! Serve command - development server with on-demand rendering

use std::{
    collections::BTreeSet,
    future::IntoFuture,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use color_eyre::eyre::{Result, WrapErr};
use folio_content::ContentStore;
use folio_core::Config;
use folio_generator::ResourceLedger;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{net::TcpListener, sync::mpsc};

use super::{file_renderer, load_config, prepare_store, resolve_root};
use crate::{
    debounce::debounce,
    server::{ServerState, create_router},
};

/// Run the serve command.
///
/// Pages are rendered per request. File changes are debounced; a change
/// under the contents directory re-indexes the store before clients reload.
pub async fn run(config_path: &Path, root: &Path, port: Option<u16>) -> Result<()> {
    let config = load_config(config_path)?;
    let root = resolve_root(root)?;
    let port = port.unwrap_or(config.serve.port);
    tracing::info!(?root, port, "Starting dev server");

    let store = prepare_store(&config, &root).await?;

    let persisted = ledger_path(&config, &root);
    let ledger = match &persisted {
        Some(path) => ResourceLedger::load(path).wrap_err("Failed to load ledger")?,
        None => ResourceLedger::new(),
    };
    let ledger = Arc::new(ledger);

    let renderer = file_renderer(&config, &root, Arc::clone(&store));
    let state = Arc::new(ServerState::new(
        config.clone(),
        &root,
        renderer,
        Arc::clone(&ledger),
    ));

    // Setup file watcher
    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| {
            if let Ok(event) = res
                && matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                )
            {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
        },
        notify::Config::default(),
    )
    .wrap_err("Failed to create file watcher")?;

    let watched = [
        config.dirs.pages.as_str(),
        config.dirs.contents.as_str(),
        config.dirs.public.as_str(),
    ]
    .into_iter()
    .chain(config.asset_dirs());
    for dir in watched {
        let path = root.join(dir);
        if path.exists() {
            watcher
                .watch(&path, RecursiveMode::Recursive)
                .wrap_err_with(|| format!("Failed to watch {}", path.display()))?;
            tracing::debug!(path = %path.display(), "Watching directory");
        }
    }

    // Coalesce change events
    let contents = config.contents_path(&root);
    let reload_state = Arc::clone(&state);
    tokio::spawn(debounce(
        rx,
        Duration::from_millis(config.serve.debounce_ms),
        move |paths| {
            let store = Arc::clone(&store);
            let state = Arc::clone(&reload_state);
            let contents = contents.clone();
            async move { on_change(paths, &contents, store, &state).await }
        },
    ));

    let app = create_router(state);
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

    println!();
    println!("  Dev server running at http://{addr}");
    println!("  Press Ctrl+C to stop");
    println!();

    // Keep watcher alive
    let _watcher = watcher;

    tokio::select! {
        served = axum::serve(listener, app).into_future() => served.wrap_err("Server error")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    if let Some(path) = &persisted {
        ledger.save(path).wrap_err("Failed to save ledger")?;
        tracing::info!(entries = ledger.len(), "Saved ledger");
    }

    Ok(())
}

/// Where the ledger persists, or `None` when persistence is disabled.
fn ledger_path(config: &Config, root: &Path) -> Option<PathBuf> {
    (!config.build.ledger.is_empty()).then(|| root.join(&config.build.ledger))
}

/// Handle one flushed batch of changed paths.
async fn on_change(
    paths: BTreeSet<PathBuf>,
    contents: &Path,
    store: Arc<ContentStore>,
    state: &ServerState,
) {
    tracing::info!(count = paths.len(), "Files changed");

    if paths.iter().any(|p| p.starts_with(contents)) {
        let contents = contents.to_path_buf();
        let indexed = tokio::task::spawn_blocking(move || store.prepare(&contents)).await;
        match indexed {
            Ok(Ok(())) => tracing::info!("Content re-indexed"),
            Ok(Err(e)) => {
                tracing::error!("Re-index failed, keeping previous content: {e}");
                eprintln!("  ✗ Content error: {e}");
                return;
            }
            Err(e) => {
                tracing::error!("Re-index task failed: {e}");
                return;
            }
        }
    }

    state.notify_reload();
}

#[cfg(test)]
mod tests {
    use std::fs;

    use folio_generator::{FileRenderer, RenderContext};
    use tempfile::TempDir;

    use super::*;

    fn setup(dir: &TempDir) -> (Arc<ContentStore>, ServerState) {
        let config = Config::new("Dev", "http://localhost:3000");
        let store = Arc::new(ContentStore::new());
        let context = RenderContext::new(config.clone(), dir.path(), Arc::clone(&store));
        let state = ServerState::new(
            config,
            dir.path(),
            Arc::new(FileRenderer::new(context)),
            Arc::new(ResourceLedger::new()),
        );
        (store, state)
    }

    #[tokio::test]
    async fn test_content_change_reindexes_and_reloads() {
        let dir = TempDir::new().unwrap();
        let contents = dir.path().join("contents");
        fs::create_dir_all(&contents).unwrap();
        fs::write(contents.join("posts.json"), r#"[{"a":1},{"a":2}]"#).unwrap();

        let (store, state) = setup(&dir);
        let mut reloads = state.reload_tx.subscribe();

        let changed = BTreeSet::from([contents.join("posts.json")]);
        on_change(changed, &contents, Arc::clone(&store), &state).await;

        assert_eq!(store.count("posts", &Default::default()), 2);
        assert!(reloads.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_bad_content_keeps_index_and_skips_reload() {
        let dir = TempDir::new().unwrap();
        let contents = dir.path().join("contents");
        fs::create_dir_all(&contents).unwrap();
        fs::write(contents.join("posts.json"), r#"[{"a":1}]"#).unwrap();

        let (store, state) = setup(&dir);
        store.prepare(&contents).unwrap();
        fs::write(contents.join("posts.json"), "{ broken").unwrap();
        let mut reloads = state.reload_tx.subscribe();

        let changed = BTreeSet::from([contents.join("posts.json")]);
        on_change(changed, &contents, Arc::clone(&store), &state).await;

        assert_eq!(store.count("posts", &Default::default()), 1);
        assert!(reloads.try_recv().is_err());
    }

    #[test]
    fn test_empty_ledger_path_disables_persistence() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new("Dev", "http://localhost:3000");
        assert_eq!(
            ledger_path(&config, dir.path()),
            Some(dir.path().join(".folio/ledger.json"))
        );

        config.build.ledger = String::new();
        assert_eq!(ledger_path(&config, dir.path()), None);
    }

    #[tokio::test]
    async fn test_page_change_only_reloads() {
        let dir = TempDir::new().unwrap();
        let (store, state) = setup(&dir);
        let mut reloads = state.reload_tx.subscribe();

        let changed = BTreeSet::from([dir.path().join("pages/index.html")]);
        on_change(changed, &dir.path().join("contents"), store, &state).await;

        assert!(reloads.try_recv().is_ok());
    }
}
