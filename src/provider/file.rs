//! File-backed providers: import definitions or replay outcomes produced by
//! an external harness as JSON arrays.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ExecutionProvider, GenerationProvider, ProviderError};
use crate::model::{ProjectType, TestDefinition, TestOutcome};

async fn load_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ProviderError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| ProviderError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Generation provider reading a JSON array of [`TestDefinition`]s.
#[derive(Debug, Clone)]
pub struct DefinitionFile {
    path: PathBuf,
}

impl DefinitionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GenerationProvider for DefinitionFile {
    async fn generate(
        &self,
        project_id: &str,
        project_type: ProjectType,
    ) -> Result<Vec<TestDefinition>, ProviderError> {
        let defs: Vec<TestDefinition> = load_array(&self.path).await?;
        debug!(%project_id, kind = %project_type, path = %self.path.display(), count = defs.len(), "loaded definitions");
        Ok(defs)
    }
}

/// Execution provider replaying a JSON array of [`TestOutcome`]s.
#[derive(Debug, Clone)]
pub struct OutcomeFile {
    path: PathBuf,
}

impl OutcomeFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExecutionProvider for OutcomeFile {
    async fn execute_all(&self, project_id: &str) -> Result<Vec<TestOutcome>, ProviderError> {
        let outcomes: Vec<TestOutcome> = load_array(&self.path).await?;
        debug!(%project_id, path = %self.path.display(), count = outcomes.len(), "loaded outcomes");
        Ok(outcomes)
    }

    async fn execute_one(&self, project_id: &str, test_id: &str) -> Result<TestOutcome, ProviderError> {
        self.execute_all(project_id)
            .await?
            .into_iter()
            .find(|o| o.id == test_id)
            .ok_or_else(|| ProviderError::TestNotFound {
                test_id: test_id.to_string(),
            })
    }
}
