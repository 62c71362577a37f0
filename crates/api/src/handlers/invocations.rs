//! Manual invocation and status endpoints.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use dispatch::{
    DispatchError, ExecutionInstance, InstanceStatus, InvocationRequest, StatusUpdate,
    TrackerError, TriggerReason,
};

use crate::AppState;

/// Query parameter carrying the causal parent instance id.
const PARENT_PARAMETER: &str = "parent";

#[derive(serde::Serialize)]
pub struct BeginRunResult {
    pub instance: Uuid,
}

#[derive(serde::Serialize)]
pub struct InstanceStatusResult {
    pub status: InstanceStatus,
    /// Incrementally updated console output location.
    pub output_url: Option<String>,
    // For failures.
    pub exception_type: Option<String>,
    pub exception_message: Option<String>,
}

/// Execute the given function. Query parameters become named bindings; the
/// body is the list of prerequisite instance ids.
pub async fn run(
    Path(func): Path<String>,
    Query(mut params): Query<BTreeMap<String, String>>,
    State(state): State<AppState>,
    Json(prereqs): Json<Vec<Uuid>>,
) -> Result<(StatusCode, Json<BeginRunResult>), (StatusCode, String)> {
    let function = match state.registry.lookup(&func).await {
        Ok(Some(f)) => f,
        Ok(None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Function not found. Do you need to add it to the index? '{func}'"),
            ))
        }
        Err(e) => return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    let parent = match params.remove(PARENT_PARAMETER) {
        Some(raw) => match raw.parse::<Uuid>() {
            Ok(id) => Some(id),
            Err(_) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    format!("invalid parent instance id '{raw}'"),
                ))
            }
        },
        None => None,
    };

    let request = InvocationRequest::build(
        &function,
        params,
        prereqs.into_iter().collect(),
        TriggerReason::invoked(parent),
    )
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // Queue could be an hour deep; dispatch returns as soon as the enqueue
    // and the status record are in place.
    match state.dispatcher.dispatch(request).await {
        Ok(instance) => Ok((
            StatusCode::ACCEPTED,
            Json(BeginRunResult {
                instance: instance.id,
            }),
        )),
        // No instance identifier on failure: there is no record behind it.
        Err(DispatchError::QueueUnavailable(msg)) => Err((StatusCode::SERVICE_UNAVAILABLE, msg)),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

pub async fn status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<InstanceStatusResult>, StatusCode> {
    match state.tracker.get(id).await {
        Ok(Some(instance)) => Ok(Json(InstanceStatusResult {
            status: instance.status,
            output_url: instance.output_url,
            exception_type: instance
                .exception
                .as_ref()
                .map(|e| e.exception_type.clone()),
            exception_message: instance.exception.map(|e| e.message),
        })),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Worker callback: apply a partial status update.
pub async fn update_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<ExecutionInstance>, (StatusCode, String)> {
    match state.tracker.update(id, update).await {
        Ok(instance) => Ok(Json(instance)),
        Err(e @ TrackerError::NotFound { .. }) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(
            e @ (TrackerError::InvalidTransition { .. }
            | TrackerError::Terminal { .. }
            | TrackerError::ExceptionOutsideFailure { .. }),
        ) => {
            // A worker violated the state machine; make it visible.
            tracing::error!(%id, error = %e, "rejected status update");
            Err((StatusCode::CONFLICT, e.to_string()))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
