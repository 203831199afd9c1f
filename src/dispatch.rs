//! Shape decoded events into build triggers.

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use crate::envelope::CanonicalEnvelope;
use crate::error::{GatewayError, Result};
use crate::eventgrid::EventGridEvent;

pub const DEFAULT_REF: &str = "master";
/// No commit tracking at this layer, builds target the branch head.
pub const LATEST_COMMIT: &str = "HEAD";

/// Events that can be routed to a build.
pub trait Routable {
    /// Routing kind of the event.
    fn kind(&self) -> &str;
}

impl Routable for EventGridEvent {
    fn kind(&self) -> &str {
        &self.event_type
    }
}

impl Routable for CanonicalEnvelope {
    fn kind(&self) -> &str {
        &self.event_type
    }
}

/// Revision a build runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub commit: String,
}

impl Revision {
    /// Head of `git_ref`.
    pub fn latest(git_ref: impl Into<String>) -> Self {
        Self {
            git_ref: git_ref.into(),
            commit: LATEST_COMMIT.to_owned(),
        }
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::latest(DEFAULT_REF)
    }
}

/// Everything the build store needs to start a build.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRequest {
    pub kind: String,
    pub provider: String,
    /// The whole event, JSON encoded.
    pub payload: Bytes,
    pub revision: Revision,
}

impl TriggerRequest {
    /// Update `revision` of [`TriggerRequest`].
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }
}

/// Build a trigger carrying the full event as payload.
pub fn to_trigger<E>(event: &E, provider: &str) -> Result<TriggerRequest>
where
    E: Routable + Serialize,
{
    let payload = serde_json::to_vec(event).map_err(GatewayError::Serialization)?;

    Ok(TriggerRequest {
        kind: event.kind().to_owned(),
        provider: provider.to_owned(),
        payload: Bytes::from(payload),
        revision: Revision::default(),
    })
}
