//! Relay endpoint handler.
//!
//! Authenticates the inbound hook, resolves the downstream function from the
//! payload and forwards the payload under the retry policy. The response to
//! the sender is decided only after the forward has finished.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use super::AppState;
use crate::forward::{DisconnectPolicy, ForwardError, ForwardOutcome, ForwardTarget};
use crate::routing::{RouteError, route};
use crate::webhooks::{HookError, parse_hook};

/// How a delivery ended, from the sender's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Accepted,
    AuthenticationFailed,
    MalformedRequest,
    ForwardingFailed,
}

impl DeliveryOutcome {
    pub fn status_code(self) -> StatusCode {
        match self {
            DeliveryOutcome::Accepted => StatusCode::OK,
            DeliveryOutcome::AuthenticationFailed | DeliveryOutcome::MalformedRequest => {
                StatusCode::BAD_REQUEST
            }
            DeliveryOutcome::ForwardingFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DeliveryOutcome {
    fn into_response(self) -> Response {
        // The body is always an empty JSON object; details stay in the log.
        (self.status_code(), Json(json!({}))).into_response()
    }
}

/// Errors that end a delivery without a successful forward.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    /// The spawned forwarding task panicked or was cancelled.
    #[error("forwarding task failed: {0}")]
    Task(#[from] JoinError),
}

impl RelayError {
    pub fn outcome(&self) -> DeliveryOutcome {
        match self {
            RelayError::Hook(HookError::AuthenticationFailed) => {
                DeliveryOutcome::AuthenticationFailed
            }
            RelayError::Hook(HookError::MissingHeader(_) | HookError::BodyRead(_)) => {
                DeliveryOutcome::MalformedRequest
            }
            RelayError::Route(RouteError::InvalidPayload(_) | RouteError::MissingRepositoryName) => {
                DeliveryOutcome::MalformedRequest
            }
            RelayError::Route(RouteError::UnknownRoute(_)) => DeliveryOutcome::ForwardingFailed,
            RelayError::Forward(_) | RelayError::Task(_) => DeliveryOutcome::ForwardingFailed,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let outcome = self.outcome();
        warn!(error = %self, status = %outcome.status_code(), "Delivery rejected");
        outcome.into_response()
    }
}

/// Relay handler.
///
/// # Response
///
/// Always `application/json` with body `{}`:
///
/// - 200 OK: the downstream answered 2xx
/// - 400 Bad Request: missing header, bad signature, or (strict) bad payload
/// - 500 Internal Server Error: forwarding failed or no route
pub async fn relay_handler(
    State(app_state): State<AppState>,
    request: Request,
) -> Result<DeliveryOutcome, RelayError> {
    let (parts, body) = request.into_parts();

    let hook = parse_hook(
        app_state.secret(),
        &parts.headers,
        body,
        app_state.max_body_bytes(),
    )
    .await?;

    debug!(
        delivery_id = %hook.delivery(),
        event_type = %hook.event(),
        bytes = hook.payload().len(),
        "Received hook"
    );

    let function = route(hook.payload(), app_state.routes(), app_state.routing())?;
    let target = ForwardTarget::new(app_state.endpoint_base(), function);

    info!(
        delivery_id = %hook.delivery(),
        event_type = %hook.event(),
        function = %target.function(),
        "Forwarding hook"
    );

    let delivery_id = hook.delivery().clone();
    let payload = hook.into_payload();

    let outcome = match app_state.on_disconnect() {
        DisconnectPolicy::CompleteRetries => {
            let forwarder = app_state.forwarder().clone();
            tokio::spawn(async move { forwarder.forward(&target, payload).await }).await?
        }
        DisconnectPolicy::Abandon => app_state.forwarder().forward(&target, payload).await,
    };

    if let ForwardOutcome::Delivered(delivery) = &outcome {
        info!(
            delivery_id = %delivery_id,
            status = %delivery.status,
            attempts = delivery.attempts,
            "Hook delivered"
        );
    }

    outcome.into_result()?;
    Ok(DeliveryOutcome::Accepted)
}
