//! Event Grid webhook.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use super::{Message, Params, authorize, observe, trigger_build};
use crate::AppState;
use crate::dispatch;
use crate::error::Result;
use crate::eventgrid;
use crate::telemetry::Outcome;
use crate::validation;

pub const PROVIDER: &str = "eventgrid";

/// Handler for `POST /eventgrid/{project}[/{token}]`.
pub async fn handler(
    State(state): State<AppState>,
    Path(params): Path<Params>,
    body: Bytes,
) -> Result<Response> {
    observe(PROVIDER, handle(&state, &params, &body).await)
}

async fn handle(
    state: &AppState,
    params: &Params,
    body: &[u8],
) -> Result<(Outcome, Response)> {
    let event = eventgrid::decode(body)?;
    tracing::debug!(
        event_id = %event.id,
        event_type = %event.event_type,
        "received event grid event"
    );

    // Event Grid expects the handshake answered before anything else.
    if event.is_validation() {
        let ack = validation::respond(&event)?.with_key(state.config.validation_key);
        tracing::debug!(code = %ack.code, "sent validation response");
        return Ok((Outcome::Validated, ack.into_response()));
    }

    let project = authorize(state, params).await?;
    let trigger = dispatch::to_trigger(&event, PROVIDER)?;
    trigger_build(state, &project, trigger).await?;

    tracing::debug!(project_id = %project.id, "created build");

    Ok((Outcome::Triggered, Json(Message::new("OK")).into_response()))
}
