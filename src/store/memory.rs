//! In-memory store, for local runs and tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BuildStore, Project, ProjectStore, StoreError};
use crate::dispatch::TriggerRequest;

/// Build recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Build {
    pub project_id: String,
    pub trigger: TriggerRequest,
}

/// Builds kept by [`MemoryStore::new`].
pub const DEFAULT_BUILD_HISTORY: usize = 1024;

/// Read-only project registry with a bounded build history.
///
/// Once `history` builds are stored, each new build evicts the oldest one.
#[derive(Debug)]
pub struct MemoryStore {
    projects: HashMap<String, Project>,
    builds: RwLock<VecDeque<Build>>,
    history: usize,
}

impl MemoryStore {
    /// Create a store seeded with `projects`.
    pub fn new(projects: impl IntoIterator<Item = Project>) -> Self {
        Self {
            projects: projects
                .into_iter()
                .map(|project| (project.id.clone(), project))
                .collect(),
            builds: RwLock::default(),
            history: DEFAULT_BUILD_HISTORY,
        }
    }

    /// Update how many builds are kept. `0` keeps none.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    /// Builds still held, oldest first.
    pub async fn builds(&self) -> Vec<Build> {
        self.builds.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn project(&self, id: &str) -> Result<Project, StoreError> {
        self.projects
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }
}

#[async_trait]
impl BuildStore for MemoryStore {
    async fn create_build(
        &self,
        project_id: &str,
        trigger: TriggerRequest,
    ) -> Result<(), StoreError> {
        if !self.projects.contains_key(project_id) {
            return Err(StoreError::NotFound(project_id.to_owned()));
        }

        tracing::info!(
            project_id,
            kind = %trigger.kind,
            provider = %trigger.provider,
            "build created"
        );

        if self.history == 0 {
            return Ok(());
        }

        let mut builds = self.builds.write().await;
        while builds.len() >= self.history {
            builds.pop_front();
        }
        builds.push_back(Build {
            project_id: project_id.to_owned(),
            trigger,
        });
        Ok(())
    }
}
