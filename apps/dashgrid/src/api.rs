//! # HTTP API
//!
//! axum server exposing one dashboard. It is the remote endpoint that
//! [`crate::sync::SyncedStorage`] talks to, and a small editing API.
//!
//! | Method | Path | Purpose |
//! | --- | --- | --- |
//! | GET | `/health` | liveness, never authenticated |
//! | GET | `/dashboard` | current document (404 if none) |
//! | PUT | `/dashboard` | replace the document; 409 if the stored one is newer |
//! | POST | `/widgets` | add a widget at the first free position |
//! | DELETE | `/widgets/{id}` | remove a widget |
//! | POST | `/compact` | pull widgets up into free space |
//! | GET | `/export` | binary envelope, base64, with checksum |
//!
//! When an API key is configured every route but `/health` requires
//! `Authorization: Bearer <key>`.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::now;
use crate::storage::BoxedStore;
use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashgrid_core::formats::{checksum, encode_binary, from_json};
use dashgrid_core::{
    DashboardError, DashboardService, DashboardState, Rect, Size, WidgetId, WidgetKind,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// =============================================================================
// STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<BoxedStore>>,
    columns: u32,
    api_key: Option<Arc<str>>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl AppState {
    pub fn new(store: BoxedStore, config: &Config) -> Self {
        let limiter = NonZeroU32::new(config.rate_limit)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self {
            store: Arc::new(Mutex::new(store)),
            columns: config.columns,
            api_key: config.api_key.as_deref().map(Arc::from),
            limiter,
        }
    }
}

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddWidgetRequest {
    pub kind: WidgetKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub h: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddWidgetResponse {
    pub id: WidgetId,
    pub rect: Rect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactResponse {
    pub moved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub format: String,
    pub data: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResponse {
    pub accepted: bool,
    pub revision: u64,
}

// =============================================================================
// ERRORS
// =============================================================================

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Dashboard(e) => match e {
                DashboardError::WidgetNotFound(_) => StatusCode::NOT_FOUND,
                DashboardError::Collision { .. } => StatusCode::CONFLICT,
                DashboardError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::StaleWrite => StatusCode::CONFLICT,
            AppError::NotInitialized => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the router with auth, rate limiting, CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(get_dashboard).put(put_dashboard))
        .route("/widgets", post(add_widget))
        .route("/widgets/{id}", delete(remove_widget))
        .route("/compact", post(compact))
        .route("/export", get(export))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(state.clone(), rate_limit)),
        )
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &Config, store: BoxedStore) -> AppResult<()> {
    let app = router(AppState::new(store, config));
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        dashboard = %config.dashboard,
        auth = config.api_key.is_some(),
        "dashgrid server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("dashgrid server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing or invalid API key" })),
        )
            .into_response()
    }
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "rate limit exceeded" })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardState>> {
    let store = state.store.lock().await;
    store.load()?.map(Json).ok_or(AppError::NotInitialized)
}

/// Accept the incoming document unless the stored one is newer.
///
/// On conflict the stored document is returned with 409 so the client can
/// adopt it without a second round trip.
async fn put_dashboard(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    // 409 is reserved for stale writes; a broken document is always a 400.
    let incoming =
        from_json(&body).map_err(|e| DashboardError::InvalidFormat(e.to_string()))?;
    let mut store = state.store.lock().await;

    if let Some(current) = store.load()? {
        if current != incoming && !incoming.is_newer_than(&current) {
            info!(
                stored = current.revision,
                incoming = incoming.revision,
                "rejected stale write"
            );
            return Ok((StatusCode::CONFLICT, Json(current)).into_response());
        }
    }

    store.save(&incoming)?;
    Ok(Json(PutResponse {
        accepted: true,
        revision: incoming.revision,
    })
    .into_response())
}

async fn add_widget(
    State(state): State<AppState>,
    Json(req): Json<AddWidgetRequest>,
) -> AppResult<(StatusCode, Json<AddWidgetResponse>)> {
    let mut store = state.store.lock().await;
    let mut service = match store.load()? {
        Some(doc) => DashboardService::from_state(doc)?,
        None => DashboardService::new(state.columns)?,
    };

    let size = match (req.w, req.h) {
        (None, None) => None,
        (w, h) => {
            let default = req.kind.default_size();
            Some(Size::new(w.unwrap_or(default.w), h.unwrap_or(default.h)))
        }
    };
    let id = service.add_widget(req.kind, req.title.as_deref(), size, now())?;
    store.save(service.state())?;

    let rect = service
        .state()
        .widget(id)
        .map(|w| w.rect)
        .ok_or(DashboardError::WidgetNotFound(id))?;
    Ok((StatusCode::CREATED, Json(AddWidgetResponse { id, rect })))
}

async fn remove_widget(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> AppResult<StatusCode> {
    let mut store = state.store.lock().await;
    let doc = store.load()?.ok_or(AppError::NotInitialized)?;
    let mut service = DashboardService::from_state(doc)?;
    service.remove_widget(WidgetId(id), now())?;
    store.save(service.state())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn compact(State(state): State<AppState>) -> AppResult<Json<CompactResponse>> {
    let mut store = state.store.lock().await;
    let doc = store.load()?.ok_or(AppError::NotInitialized)?;
    let mut service = DashboardService::from_state(doc)?;
    let moved = service.compact(now());
    if moved > 0 {
        store.save(service.state())?;
    }
    Ok(Json(CompactResponse { moved }))
}

async fn export(State(state): State<AppState>) -> AppResult<Json<ExportResponse>> {
    let store = state.store.lock().await;
    let doc = store.load()?.ok_or(AppError::NotInitialized)?;
    let bytes = encode_binary(&doc)?;
    Ok(Json(ExportResponse {
        format: "dgrd".to_string(),
        checksum: checksum(&bytes),
        data: BASE64.encode(&bytes),
    }))
}
