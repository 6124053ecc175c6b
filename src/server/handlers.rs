use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::NamespaceConfig;
use crate::monitor::{
    ActionKind, ActionOutcome, BulkAction, BulkOutcome, MonitoringStats, PodAction, PodRecord,
};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::server::ws::push_channel;

/// Prefix shared by every REST route
pub const API_PREFIX: &str = "/api/cluster";

/// Standard success envelope
#[derive(Debug, Serialize)]
struct DataResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    data: T,
}

impl<T> DataResponse<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct PodsResponse {
    success: bool,
    data: Vec<PodRecord>,
    stats: MonitoringStats,
    connected: bool,
}

#[derive(Debug, Serialize)]
struct NamespacePodsResponse {
    success: bool,
    data: Vec<PodRecord>,
    namespace: String,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    success: bool,
    data: MonitoringStats,
    connected: bool,
}

/// Body of the bulk shorthand routes
#[derive(Debug, Deserialize)]
pub struct NamespaceList {
    pub namespaces: Vec<String>,
}

// ============================================================================
// Reads
// ============================================================================

async fn list_pods(State(state): State<AppState>) -> impl IntoResponse {
    let monitor = &state.monitor;
    Json(PodsResponse {
        success: true,
        data: monitor.all_pods(),
        stats: monitor.stats(),
        connected: monitor.is_connected(),
    })
}

async fn list_namespace_pods(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> impl IntoResponse {
    Json(NamespacePodsResponse {
        success: true,
        data: state.monitor.pods_in_namespace(&namespace),
        namespace,
    })
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        success: true,
        data: state.monitor.stats(),
        connected: state.monitor.is_connected(),
    })
}

async fn list_namespaces(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse::new(state.monitor.namespaces()))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.health())
}

// ============================================================================
// Writes
// ============================================================================

async fn update_namespaces(
    State(state): State<AppState>,
    payload: Result<Json<Vec<NamespaceConfig>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(namespaces) = payload?;
    state.monitor.update_namespaces(namespaces.clone())?;
    Ok(Json(
        DataResponse::new(namespaces).with_message("Namespaces updated successfully"),
    ))
}

async fn execute_action(
    State(state): State<AppState>,
    payload: Result<Json<PodAction>, JsonRejection>,
) -> Result<Json<DataResponse<ActionOutcome>>, ApiError> {
    let Json(action) = payload?;
    run_action(&state, action).await
}

async fn namespace_action(
    State(state): State<AppState>,
    Path((action, namespace)): Path<(String, String)>,
) -> Result<Json<DataResponse<ActionOutcome>>, ApiError> {
    let action: ActionKind = action.parse().map_err(ApiError::BadRequest)?;
    run_action(&state, PodAction::new(action, namespace)).await
}

/// An attempted action that did not succeed is rejected with its message
async fn run_action(
    state: &AppState,
    action: PodAction,
) -> Result<Json<DataResponse<ActionOutcome>>, ApiError> {
    let outcome = state.monitor.execute_action(action).await?;
    if !outcome.success {
        return Err(ApiError::Rejected(outcome.message));
    }
    Ok(Json(DataResponse::new(outcome)))
}

async fn execute_bulk(
    State(state): State<AppState>,
    payload: Result<Json<BulkAction>, JsonRejection>,
) -> Result<Json<BulkOutcome>, ApiError> {
    let Json(bulk) = payload?;
    Ok(Json(state.monitor.execute_bulk(bulk).await))
}

async fn bulk_shorthand(
    State(state): State<AppState>,
    Path(action): Path<String>,
    payload: Result<Json<NamespaceList>, JsonRejection>,
) -> Result<Json<BulkOutcome>, ApiError> {
    let action: ActionKind = action.parse().map_err(ApiError::BadRequest)?;
    let Json(list) = payload?;
    Ok(Json(
        state.monitor.bulk_namespaces(action, list.namespaces).await,
    ))
}

/// Create the Axum router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/pods", get(list_pods))
        .route("/pods/{namespace}", get(list_namespace_pods))
        .route("/stats", get(stats))
        .route("/namespaces", get(list_namespaces).post(update_namespaces))
        .route("/action", post(execute_action))
        .route("/action/bulk", post(execute_bulk))
        .route("/action/bulk/{action}", post(bulk_shorthand))
        .route("/action/{action}/{namespace}", post(namespace_action))
        .route("/health", get(health));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/ws", get(push_channel))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
