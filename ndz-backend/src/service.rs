//! HTTP interface
//!
//! - `GET /sightings`: current sightings (query)
//! - `GET /sightings/snapshot`: current snapshot including its generation
//! - `GET /sightings/stream`: server-sent events, one `sightings` event per
//!   completed cycle, starting with the current state
//! - `POST /sightings/publish`: re-send the current state to all streams
//! - `GET /health`, `GET /stats`

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use ndz_common::{Sighting, SightingSnapshot};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::engine::CycleStats;
use crate::error::{NdzError, Result};
use crate::publisher::Publisher;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    publisher: Publisher,
    stats: Arc<RwLock<CycleStats>>,
}

impl AppState {
    pub fn new(publisher: Publisher, stats: Arc<RwLock<CycleStats>>) -> Self {
        Self { publisher, stats }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    service: &'static str,
    version: &'static str,
    generation: u64,
    sightings: usize,
    subscribers: usize,
    #[serde(flatten)]
    cycles: CycleStats,
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.publisher.current();
    let cycles = state.stats.read().await.clone();
    Json(StatsResponse {
        service: "ndz-backend",
        version: env!("CARGO_PKG_VERSION"),
        generation: snapshot.generation,
        sightings: snapshot.sightings.len(),
        subscribers: state.publisher.subscriber_count(),
        cycles,
    })
}

async fn list_sightings(State(state): State<AppState>) -> Json<Vec<Sighting>> {
    Json(state.publisher.current().sightings.clone())
}

async fn get_snapshot(State(state): State<AppState>) -> Json<SightingSnapshot> {
    Json(state.publisher.current().as_ref().clone())
}

async fn publish_now(State(state): State<AppState>) -> StatusCode {
    tracing::debug!("Explicit publish requested");
    state.publisher.republish();
    StatusCode::ACCEPTED
}

fn sightings_event(snapshot: &SightingSnapshot) -> Option<Event> {
    match Event::default()
        .event("sightings")
        .id(snapshot.generation.to_string())
        .json_data(&snapshot.sightings)
    {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!("Failed to encode snapshot {}: {}", snapshot.generation, e);
            None
        }
    }
}

async fn stream_sightings(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::debug!(
        "Push subscriber connected ({} active)",
        state.publisher.subscriber_count() + 1
    );

    let stream = state
        .publisher
        .subscribe()
        .filter_map(|snapshot| sightings_event(&snapshot))
        .map(Ok::<_, Infallible>);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    match origin {
        Some(origin) => {
            let origin: HeaderValue = origin
                .parse()
                .map_err(|_| NdzError::config(format!("invalid CORS origin '{}'", origin)))?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any))
        }
        None => Ok(CorsLayer::permissive()),
    }
}

/// Build the application routes
pub fn router(state: AppState, server: &ServerConfig) -> Result<Router> {
    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/sightings", get(list_sightings))
        .route("/sightings/snapshot", get(get_snapshot))
        .route("/sightings/stream", get(stream_sightings))
        .route("/sightings/publish", post(publish_now))
        .with_state(state);

    if let Some(dir) = &server.static_dir {
        tracing::info!("Serving UI bundle from {}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    Ok(app
        .layer(cors_layer(server.cors_origin.as_deref())?)
        .layer(TraceLayer::new_for_http()))
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    state: AppState,
    server: &ServerConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state, server)?;
    let addr = server.server_address();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
