//! HTTP routes.
pub mod cloudevents;
pub mod eventgrid;
pub mod status;

use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::dispatch::{Revision, TriggerRequest};
use crate::error::{GatewayError, Result};
use crate::store::Project;
use crate::telemetry::{self, Outcome};

/// Path parameters shared by event routes.
#[derive(Debug, Deserialize)]
pub struct Params {
    pub project: String,
    pub token: Option<String>,
}

/// Plain status body.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

/// Look up the project and check the path token against its secret.
///
/// Projects without a token secret accept any caller.
async fn authorize(state: &AppState, params: &Params) -> Result<Project> {
    let project = state.projects.project(&params.project).await?;

    if let Some(expected) = project.secret(&state.config.token_secret) {
        if params.token.as_deref() != Some(expected) {
            tracing::debug!(project_id = %project.id, "token does not match project");
            return Err(GatewayError::Forbidden);
        }
    }

    Ok(project)
}

/// Hand a trigger to the build store, targeting the configured ref.
async fn trigger_build(
    state: &AppState,
    project: &Project,
    trigger: TriggerRequest,
) -> Result<()> {
    let trigger = trigger.with_revision(Revision::latest(&state.config.default_ref));

    state
        .builds
        .create_build(&project.id, trigger)
        .await
        .map_err(|err| GatewayError::Downstream {
            details: format!("cannot create build for `{}`", project.id),
            source: Some(Box::new(err)),
        })
}

/// Count the outcome of a handled event.
fn observe(
    provider: &'static str,
    result: Result<(Outcome, Response)>,
) -> Result<Response> {
    match result {
        Ok((outcome, response)) => {
            telemetry::record_event(provider, outcome);
            Ok(response)
        },
        Err(err) => {
            let outcome = if err.is_server_error() {
                Outcome::Failed
            } else {
                Outcome::Rejected
            };
            tracing::debug!(provider, error = %err, "event rejected");
            telemetry::record_event(provider, outcome);
            Err(err)
        },
    }
}
