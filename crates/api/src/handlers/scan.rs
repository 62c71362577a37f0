//! On-demand blob scan endpoint.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use engine::Trigger;

use crate::AppState;

#[derive(serde::Deserialize)]
pub struct ScanQuery {
    /// Function whose blob trigger should be evaluated now.
    pub func: String,
}

/// Run one evaluation pass for a single function's blob trigger and return
/// the instance ids it dispatched.
pub async fn scan(
    Query(query): Query<ScanQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Uuid>>, (StatusCode, String)> {
    let subscription = state
        .subscriptions
        .iter()
        .find(|s| s.function_id == query.func && matches!(s.trigger, Trigger::Blob { .. }))
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("no blob trigger registered for function '{}'", query.func),
            )
        })?;

    let dispatched = state
        .pump
        .run_pass(std::slice::from_ref(subscription))
        .await;
    Ok(Json(dispatched.into_iter().map(|i| i.id).collect()))
}
