//! Connection handlers for the Parlor server.
//!
//! This module owns the connection lifecycle: accept, frame dispatch into
//! the core engine, event fan-in back to the socket, and disconnect
//! cleanup. Core errors never tear down the loop; they are logged and the
//! offending frame is dropped.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::wire::ClientFrame;
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parlor_core::{Engine, EngineError, Event};
use parlor_store::{MemoryStore, RedisStore, StateStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The core engine.
    pub engine: Engine,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, config: Config) -> Self {
        Self {
            engine: Engine::new(store),
            config,
        }
    }
}

/// Build the store provider named by the configuration.
async fn build_store(config: &Config) -> Result<Arc<dyn StateStore>> {
    match config.store.provider.as_str() {
        "redis" => {
            let store =
                RedisStore::connect(&config.store.redis_url, config.store.key_prefix.clone())
                    .await?;
            Ok(Arc::new(store))
        }
        "memory" => {
            info!("Using in-memory state store");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => anyhow::bail!("Unknown store provider: '{other}'. Supported: memory, redis"),
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the store cannot be reached or the listener fails
/// to bind.
pub async fn run_server(config: Config) -> Result<()> {
    let store = build_store(&config).await?;
    let state = Arc::new(AppState::new(store, config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Parlor server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Spawn a task forwarding a broadcast receiver into the connection's
/// fan-in channel. Lagged receivers skip ahead rather than disconnect.
fn spawn_forwarder(
    mut rx: broadcast::Receiver<Arc<Event>>,
    tx: mpsc::UnboundedSender<Arc<Event>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    })
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    // Generate connection ID
    let connection_id = format!(
        "conn_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    );

    debug!(connection = %connection_id, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Fan-in channel merging global and room events for this connection
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Arc<Event>>();

    // Every connection hears global events from the start; the room
    // forwarder is added once the connection binds.
    let mut forwarders = vec![spawn_forwarder(
        state.engine.subscribe_global(),
        event_tx.clone(),
    )];

    loop {
        tokio::select! {
            biased;

            // Deliver events to the client
            Some(event) = event_rx.recv() => {
                match serde_json::to_string(&*event) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(connection = %connection_id, error = %e, "Event serialization failed");
                        metrics::record_error("serialize");
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > state.config.limits.max_message_size {
                            warn!(connection = %connection_id, size = text.len(), "Oversized frame dropped");
                            metrics::record_error("oversized");
                            continue;
                        }
                        handle_text_frame(&text, &connection_id, &state, &event_tx, &mut forwarders).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Clients are expected to send text; tolerate UTF-8 binary.
                        if let Ok(text) = String::from_utf8(data) {
                            handle_text_frame(&text, &connection_id, &state, &event_tx, &mut forwarders).await;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: stop event forwarding
    for handle in forwarders {
        handle.abort();
    }

    // Cleanup: run the Leave transition. Idempotent, and a no-op for
    // connections that never bound.
    match state.engine.disconnect(&connection_id).await {
        Ok(true) => metrics::record_presence_transition("leave"),
        Ok(false) => {}
        Err(e) => {
            error!(connection = %connection_id, error = %e, "Disconnect cleanup failed");
            metrics::record_error("disconnect");
        }
    }

    let _ = sender.close().await;
    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Parse and dispatch one inbound text frame.
async fn handle_text_frame(
    text: &str,
    connection_id: &str,
    state: &Arc<AppState>,
    event_tx: &mpsc::UnboundedSender<Arc<Event>>,
    forwarders: &mut Vec<tokio::task::JoinHandle<()>>,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(connection = %connection_id, error = %e, "Unparseable frame dropped");
            metrics::record_error("parse");
            return;
        }
    };

    if let Err(e) = handle_frame(&frame, connection_id, state, event_tx, forwarders).await {
        match e {
            EngineError::UnboundConnection(_) => {
                // Events before set-nickname are product noise, not faults.
                debug!(connection = %connection_id, error = %e, "Frame from unbound connection dropped");
            }
            EngineError::AlreadyBound(_) => {
                warn!(connection = %connection_id, error = %e, "Conflicting re-bind rejected");
                metrics::record_error("rebind");
            }
            EngineError::Store(_) => {
                // The transition aborted before any broadcast; the client
                // may retry the event.
                error!(connection = %connection_id, error = %e, "Store failure processing frame");
                metrics::record_error("store");
            }
        }
    }
}

/// Dispatch a decoded frame into the engine.
async fn handle_frame(
    frame: &ClientFrame,
    connection_id: &str,
    state: &Arc<AppState>,
    event_tx: &mpsc::UnboundedSender<Arc<Event>>,
    forwarders: &mut Vec<tokio::task::JoinHandle<()>>,
) -> Result<(), EngineError> {
    match frame {
        ClientFrame::SetNickname { username, room_id } => {
            metrics::record_frame("set_nickname");

            if room_id.is_empty() || room_id.len() > state.config.limits.max_room_id_length {
                debug!(connection = %connection_id, room = %room_id, "Invalid room id dropped");
                metrics::record_error("room_id");
                return Ok(());
            }

            if let Some(outcome) = state
                .engine
                .set_nickname(connection_id, username, room_id)
                .await?
            {
                forwarders.push(spawn_forwarder(outcome.receiver, event_tx.clone()));
                if outcome.joined {
                    metrics::record_presence_transition("join");
                }
                debug!(connection = %connection_id, username = %username, room = %room_id, "Bound");
            }
        }

        ClientFrame::Message { text } => {
            metrics::record_frame("message");

            let recipients = state.engine.chat_message(connection_id, text)?;
            if recipients > 0 {
                metrics::record_message();
            }
            debug!(connection = %connection_id, recipients, "Message handled");
        }

        ClientFrame::SetStatus { status } => {
            metrics::record_frame("set_status");

            state.engine.set_status(connection_id, status).await?;
        }
    }

    Ok(())
}
