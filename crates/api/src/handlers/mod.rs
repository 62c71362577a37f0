pub mod invocations;
pub mod scan;

use axum::http::StatusCode;

/// Lets tooling verify they have a valid service URL.
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}
