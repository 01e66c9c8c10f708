//! Webhook delivery handler.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{State, rejection::FormRejection},
    http::{Method, StatusCode},
};
use tracing::debug;

use crate::error::AppError;
use crate::metrics::names;
use crate::middleware::RequestId;
use crate::mirror::MirrorServer;

/// Accepts a push notification and enqueues an update of the repository.
///
/// Responds 202 once the task is queued; the update itself runs later. The
/// enqueue waits while every worker slot is taken.
pub async fn webhook_handler(
    State(server): State<Arc<MirrorServer>>,
    method: Method,
    Extension(request_id): Extension<RequestId>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Result<StatusCode, AppError> {
    let admission = server.admit()?;

    if method != Method::POST {
        return Err(AppError::BadRequest("only POST is allowed".to_string()));
    }

    server
        .observability()
        .inc_counter(names::HOOKS_RECEIVED, &[]);

    let request_id = request_id.into_inner();

    let Form(form) = form.map_err(|e| {
        debug!(request_id = %request_id, "failed to parse form: {e}");
        AppError::BadRequest(format!("bad request: {e}"))
    })?;

    let payload = form
        .get("payload")
        .filter(|payload| !payload.is_empty())
        .ok_or_else(|| {
            debug!(request_id = %request_id, "no payload in form");
            AppError::BadRequest("no payload in form".to_string())
        })?;

    let key = server.webhooks().parse_hook_payload(payload).map_err(|e| {
        debug!(request_id = %request_id, "failed to parse hook payload: {e}");
        AppError::BadRequest(format!("bad request: {e}"))
    })?;

    let (task, sender) = server.task_for(&key, &request_id, &admission)?;
    server
        .observability()
        .inc_counter(names::HOOKS_ACCEPTED, &[("origin", key.clone())]);

    debug!(request_id = %request_id, "enqueueing update of {key}");
    sender
        .enqueue(task)
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    Ok(StatusCode::ACCEPTED)
}
