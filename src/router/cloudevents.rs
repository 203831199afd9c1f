//! CloudEvents v0.1 webhook.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};

use super::{Params, authorize, observe, trigger_build};
use crate::AppState;
use crate::cloudevents;
use crate::dispatch;
use crate::error::Result;
use crate::telemetry::Outcome;
use crate::validation::{self, Classification};

pub const PROVIDER: &str = "cloudevents";

/// Handler for `POST /cloudevents/v0.1/{project}/{token}`.
///
/// Answers with the decoded envelope, exactly as handed to the build store.
pub async fn handler(
    State(state): State<AppState>,
    Path(params): Path<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    observe(PROVIDER, handle(&state, &params, &headers, &body).await)
}

async fn handle(
    state: &AppState,
    params: &Params,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(Outcome, Response)> {
    // Validation requests still use the Event Grid schema.
    match validation::classify(body) {
        Classification::Handshake(event) => {
            let ack =
                validation::respond(&event)?.with_key(state.config.validation_key);
            tracing::debug!(code = %ack.code, "sent validation response");
            return Ok((Outcome::Validated, ack.into_response()));
        },
        Classification::Malformed(err) => return Err(err),
        Classification::NormalEvent => (),
    }

    let envelope = cloudevents::decode(headers, body)?;
    tracing::debug!(
        event_id = %envelope.event_id,
        event_type = %envelope.event_type,
        "received cloud event"
    );

    let project = authorize(state, params).await?;
    let trigger = dispatch::to_trigger(&envelope, PROVIDER)?;
    let echo = trigger.payload.clone();
    trigger_build(state, &project, trigger).await?;

    tracing::debug!(project_id = %project.id, "created build");

    Ok((
        Outcome::Triggered,
        (
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            echo,
        )
            .into_response(),
    ))
}
