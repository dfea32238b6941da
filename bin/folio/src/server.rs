//! Development server with on-demand rendering and live reload.

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::State,
    handler::Handler,
    http::{StatusCode, Uri, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use folio_core::{Config, ResourceType};
use folio_generator::{
    LedgerEntry, RenderOptions, Renderer, ResourceLedger, find_resource,
};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tower_http::services::ServeDir;
use tracing::{debug, warn};

/// Live reload message type.
#[derive(Debug, Clone)]
pub enum ReloadMessage {
    /// Full page reload.
    Reload,
}

/// State shared by every request handler.
pub struct ServerState {
    /// Broadcast channel for live reload events.
    pub reload_tx: broadcast::Sender<ReloadMessage>,
    pub config: Config,
    /// Source root the configured directories are relative to.
    pub root: PathBuf,
    pub renderer: Arc<dyn Renderer>,
    pub ledger: Arc<ResourceLedger>,
}

impl ServerState {
    /// Create a new server state.
    pub fn new(
        config: Config,
        root: impl Into<PathBuf>,
        renderer: Arc<dyn Renderer>,
        ledger: Arc<ResourceLedger>,
    ) -> Self {
        let (reload_tx, _) = broadcast::channel(16);
        Self {
            reload_tx,
            config,
            root: root.into(),
            renderer,
            ledger,
        }
    }

    /// Send a reload notification to all connected clients.
    pub fn notify_reload(&self) {
        let _ = self.reload_tx.send(ReloadMessage::Reload);
    }
}

/// Create the development server router.
///
/// Files under the public directory are served as is; every other path is
/// resolved and rendered on demand.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let public = state.config.public_path(&state.root);
    let render = render_handler.with_state(Arc::clone(&state));

    Router::new()
        .route("/__livereload", get(livereload_handler))
        .fallback_service(ServeDir::new(public).fallback(render))
        .with_state(state)
}

async fn render_handler(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    render_path(&state, uri.path()).await
}

/// Resolve and render one request path.
pub async fn render_path(state: &ServerState, path: &str) -> Response {
    if find_resource(&state.root, &state.config, path).is_none() {
        debug!(path, "no resource");
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let result = state.renderer.render(path, &RenderOptions::default()).await;
    if let Some(status) = result.error_status {
        let message = result.error_message.unwrap_or_default();
        warn!(path, status, error = %message, "render failed");
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, message).into_response();
    }

    let resource_type = result
        .resource_type
        .unwrap_or_else(|| ResourceType::from_route(path));
    state
        .ledger
        .upsert(LedgerEntry::new(path, resource_type, ""));

    let is_html = result.is_html();
    let content_type = result
        .content_type
        .unwrap_or_else(|| resource_type.content_type().to_string());
    let body = if is_html {
        inject_livereload(result.content)
    } else {
        result.content
    };

    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// Server-Sent Events handler for live reload.
async fn livereload_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.reload_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(ReloadMessage::Reload) => Some(Ok(Event::default().data("reload"))),
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// Add the live reload client before `</body>`, or at the end when there is
/// no body tag.
fn inject_livereload(body: Vec<u8>) -> Vec<u8> {
    let html = match String::from_utf8(body) {
        Ok(html) => html,
        Err(e) => return e.into_bytes(),
    };
    if html.contains("__livereload") {
        return html.into_bytes();
    }

    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + LIVERELOAD_SCRIPT.len());
            out.push_str(&html[..pos]);
            out.push_str(LIVERELOAD_SCRIPT);
            out.push_str(&html[pos..]);
            out.into_bytes()
        }
        None => (html + LIVERELOAD_SCRIPT).into_bytes(),
    }
}

/// JavaScript snippet to inject for live reload.
pub const LIVERELOAD_SCRIPT: &str = r#"
<script>
(function() {
    const source = new EventSource('/__livereload');
    source.onmessage = function(event) {
        if (event.data === 'reload') {
            window.location.reload();
        }
    };
    source.onerror = function() {
        console.log('[livereload] Connection lost, retrying...');
    };
})();
</script>
"#;
