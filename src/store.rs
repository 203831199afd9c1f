//! Ports to the project registry and the build store.
//!
//! Both collaborators live outside the gateway. Routes only see these
//! traits, so any registry or build backend can be injected.
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dispatch::TriggerRequest;

/// Errors reported by a collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("project `{0}` not found")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Project registered on the build system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Named secrets, e.g. the gateway token.
    #[serde(default, skip_serializing)]
    pub secrets: HashMap<String, String>,
}

impl Project {
    /// Create a new [`Project`] without secrets.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secrets: HashMap::new(),
        }
    }

    /// Update `secrets` of [`Project`].
    pub fn with_secret(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Get a secret, empty values count as unset.
    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets
            .get(name)
            .map(String::as_str)
            .filter(|secret| !secret.is_empty())
    }
}

/// Port for project lookups.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Find a project by ID.
    async fn project(&self, id: &str) -> Result<Project, StoreError>;
}

/// Port for build creation.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Create a build for `project_id`.
    async fn create_build(
        &self,
        project_id: &str,
        trigger: TriggerRequest,
    ) -> Result<(), StoreError>;
}
