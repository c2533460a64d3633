use std::path::Path;
use std::sync::Arc;

use ac_core::policy::PreferenceUpdate;
use ac_harness::shutdown::ShutdownSignal;
use ac_telemetry::metrics::{MetricsCollector, SUBSCRIBERS};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::broadcaster::Broadcaster;
use crate::origin::check_origin;

/// Shared state for all HTTP/WS handlers.
#[derive(Clone)]
pub struct BridgeState {
    pub broadcaster: Arc<Broadcaster>,
    pub metrics: Arc<MetricsCollector>,
    pub shutdown: ShutdownSignal,
    pub allowed_origins: Arc<Vec<String>>,
}

impl BridgeState {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        metrics: Arc<MetricsCollector>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            broadcaster,
            metrics,
            shutdown,
            allowed_origins: Arc::new(Vec::new()),
        }
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Arc::new(origins);
        self
    }
}

/// Build the router: `/ws`, `/api/state`, `/metrics`, and the static
/// frontend as fallback when a directory is given.
pub fn router(state: BridgeState, frontend_dir: Option<&Path>) -> Router {
    let allowed = state.allowed_origins.clone();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &axum::http::request::Parts| {
                let mut headers = HeaderMap::new();
                headers.insert(header::ORIGIN, origin.clone());
                check_origin(&headers, &allowed).is_ok()
            },
        ))
        .allow_methods([Method::GET]);

    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/state", get(get_state))
        .route("/metrics", get(get_metrics));

    if let Some(dir) = frontend_dir {
        info!(dir = %dir.display(), "serving frontend");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

/// Serve until `shutdown` fires. Open WebSocket sessions close themselves on
/// the same signal so graceful shutdown does not wait on them.
pub async fn serve(listener: TcpListener, app: Router, shutdown: ShutdownSignal) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "notification channel listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_state(State(state): State<BridgeState>) -> impl IntoResponse {
    Json(state.broadcaster.state())
}

async fn get_metrics(State(state): State<BridgeState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}

/// WebSocket GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<BridgeState>,
    headers: HeaderMap,
) -> Response {
    if let Err(status) = check_origin(&headers, &state.allowed_origins) {
        return status.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: BridgeState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let rx = state.broadcaster.bus().subscribe();
    state.metrics.add_gauge(SUBSCRIBERS, 1);
    info!(
        subscribers = state.broadcaster.bus().subscriber_count(),
        "subscriber connected"
    );

    // Every connect refreshes all subscribers, the new one included.
    state.broadcaster.broadcast().await;

    loop {
        tokio::select! {
            result = rx.recv_async() => {
                let Ok(note) = result else { break };
                let json = match serde_json::to_string(&*note) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "failed to encode notification");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_inbound(&state, text.as_str()).await,
                    Some(Ok(Message::Binary(_))) => warn!("discarding binary message"),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }

            _ = state.shutdown.wait() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.metrics.add_gauge(SUBSCRIBERS, -1);
    debug!("subscriber disconnected");
}

async fn handle_inbound(state: &BridgeState, text: &str) {
    match serde_json::from_str::<PreferenceUpdate>(text) {
        Ok(update) => state.broadcaster.apply_preference(update).await,
        Err(e) => {
            let preview: String = text.chars().take(200).collect();
            warn!(error = %e, message = %preview, "discarding malformed preference message");
        }
    }
}
