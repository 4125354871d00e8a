use crate::command::Command;
use crate::data::ResultQuery;
use crate::error::HarvesterError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{debug, info, warn};

use super::server::ServerState;

/// Handler for health check endpoint
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let initialized = state.data_manager.is_initialized();
    let status = if initialized {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if initialized { "healthy" } else { "unavailable" },
        "backend": state.data_manager.backend(),
        "accepting_commands": !state.commands.is_closed(),
        "timestamp": chrono::Utc::now(),
    });

    (status, Json(body))
}

/// Handler for stored results, filtered by `task` and `limit`
pub async fn results_handler(
    State(state): State<ServerState>,
    Query(query): Query<ResultQuery>,
) -> impl IntoResponse {
    debug!("Results query: {:?}", query);

    match state.data_manager.query(&query).await {
        Ok(results) => (StatusCode::OK, Json(json!(results))),
        Err(e @ HarvesterError::NotInitialized { .. }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e) => {
            warn!("Results query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// Handler that enqueues a control command
pub async fn command_handler(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let command = match name.parse::<Command>() {
        Ok(command) => command,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
        }
    };

    match state.commands.try_push(command) {
        Ok(()) => {
            info!("Queued {} from HTTP request", command);
            (
                StatusCode::ACCEPTED,
                Json(json!({ "queued": command.to_string() })),
            )
        }
        Err(e) => {
            warn!("Rejected {} from HTTP request: {}", command, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
