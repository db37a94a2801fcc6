use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use nbbang_notify::RunStatus;
use nbbang_types::events::PostCreated;

use crate::AppState;

/// "Post created" trigger. Runs the notifier to completion and returns its
/// report. A failed run answers 503 so the caller's retry policy can kick in,
/// and so does a run cut short by the deadline, with the report as body. The
/// notification ledger keeps retries from notifying anyone twice.
pub async fn post_created(
    State(state): State<AppState>,
    Json(event): Json<PostCreated>,
) -> Result<Response, StatusCode> {
    let report = state.notifier.run(&event).await.map_err(|e| {
        error!(post_id = %event.id, error = %e, "Keyword notification run failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    if report.status == RunStatus::DeadlineExceeded {
        warn!(post_id = %event.id, dropped = report.dropped, "Keyword notification run hit its deadline");
        return Ok((StatusCode::SERVICE_UNAVAILABLE, Json(report)).into_response());
    }

    Ok(Json(report).into_response())
}
