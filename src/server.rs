//! HTTP surface of the relay
//!
//! Serves the static pages, the health probe and both signaling transports on
//! one listener:
//!
//! - `GET /server`, `GET /mobile` - the two client pages
//! - `GET /health` - `{"status": "ok", "connections": N}`
//! - `GET /signal` - WebSocket upgrade
//! - `POST /signal/poll` - open a polling session, returns `{"sid": "<uuid>"}`
//! - `GET /signal/poll?sid=` - wait for frames, returns a JSON array
//! - `POST /signal/poll?sid=` - send one envelope or an array of them
//! - `DELETE /signal/poll?sid=` - close the polling session
//!
//! Every route answers cross-origin requests from anywhere.

use std::{future::Future, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::ServerConfig,
    error::PollError,
    model::payload::Frame,
    relay::Relay,
    transport::{polling::PollSessions, websocket, SignalHandler},
    util::lan_addresses,
};

#[derive(Clone)]
pub struct AppState {
    relay: Arc<Relay>,
    polls: Arc<PollSessions>,
    config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> AppState {
        let relay = Arc::new(Relay::new());
        let polls = Arc::new(PollSessions::new(relay.clone(), config.liveness));
        AppState {
            relay,
            polls,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub connections: usize,
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    sid: Option<String>,
}

impl SessionQuery {
    fn sid(&self) -> Result<Uuid, PollError> {
        self.sid
            .as_deref()
            .and_then(|sid| sid.parse().ok())
            .ok_or(PollError::UnknownSession)
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = match self {
            PollError::UnknownSession | PollError::InvalidFrame(_) => StatusCode::BAD_REQUEST,
            PollError::Relay(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let public = state.config.public_dir.clone();

    Router::new()
        .route("/health", get(health))
        .route("/signal", get(websocket_upgrade))
        .route(
            "/signal/poll",
            get(poll).post(push_or_open).delete(close_session),
        )
        .route_service("/server", ServeFile::new(public.join("server.html")))
        .route_service("/mobile", ServeFile::new(public.join("mobile.html")))
        .fallback_service(ServeDir::new(public))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::new(config);
    let reaper = state.polls.spawn_reaper();

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await;

    reaper.abort();
    served?;
    Ok(())
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.addr).await?;
    let addr = listener.local_addr()?;

    info!("Server running on:");
    if addr.ip().is_unspecified() {
        for ip in lan_addresses() {
            info!("  http://{}:{}", ip, addr.port());
        }
    }
    info!("  http://{}", addr);
    info!("Access points:");
    info!("  Mobile page: http://<server-ip>:{}/mobile", addr.port());
    info!("  Server page: http://<server-ip>:{}/server", addr.port());

    serve(listener, config, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
    })
    .await
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        connections: state.relay.connections(),
    })
}

async fn websocket_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let handler: Arc<dyn SignalHandler> = state.relay.clone();
    let liveness = state.config.liveness;
    ws.on_upgrade(move |socket| websocket::serve_socket(socket, handler, liveness))
}

async fn poll(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Vec<Frame>>, PollError> {
    Ok(Json(state.polls.poll(query.sid()?).await?))
}

async fn push_or_open(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> Result<Response, PollError> {
    if query.sid.is_none() {
        let sid = state.polls.open()?;
        return Ok(Json(json!({ "sid": sid.to_string() })).into_response());
    }

    state.polls.push_text(query.sid()?, &body).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn close_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<StatusCode, PollError> {
    state.polls.close(query.sid()?).await?;
    Ok(StatusCode::NO_CONTENT)
}
