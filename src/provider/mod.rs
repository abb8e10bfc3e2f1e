//! Collaborator interfaces: test generation and test execution.
//!
//! The orchestrator only talks to these traits, so deterministic fakes can
//! stand in for real providers in tests.

pub mod file;
pub mod templates;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ProjectType, TestDefinition, TestOutcome};

pub use self::file::{DefinitionFile, OutcomeFile};
pub use self::templates::TemplateGenerator;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider failed: {0}")]
    Failed(String),

    #[error("test {test_id} not known to provider")]
    TestNotFound { test_id: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Produces test definitions for a project.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        project_id: &str,
        project_type: ProjectType,
    ) -> Result<Vec<TestDefinition>, ProviderError>;
}

/// Runs tests against the legacy and new implementations.
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    /// Execute every test of the project.
    async fn execute_all(&self, project_id: &str) -> Result<Vec<TestOutcome>, ProviderError>;

    /// Execute a single test.
    async fn execute_one(&self, project_id: &str, test_id: &str) -> Result<TestOutcome, ProviderError>;
}

/// Stand-in for a collaborator that is not configured. Every call fails
/// with [`ProviderError::Unavailable`].
#[derive(Debug, Clone)]
pub struct Unavailable {
    what: &'static str,
}

impl Unavailable {
    pub fn new(what: &'static str) -> Self {
        Self { what }
    }

    fn error(&self) -> ProviderError {
        ProviderError::Unavailable(format!("no {} provider configured", self.what))
    }
}

#[async_trait]
impl GenerationProvider for Unavailable {
    async fn generate(&self, _project_id: &str, _project_type: ProjectType) -> Result<Vec<TestDefinition>, ProviderError> {
        Err(self.error())
    }
}

#[async_trait]
impl ExecutionProvider for Unavailable {
    async fn execute_all(&self, _project_id: &str) -> Result<Vec<TestOutcome>, ProviderError> {
        Err(self.error())
    }

    async fn execute_one(&self, _project_id: &str, _test_id: &str) -> Result<TestOutcome, ProviderError> {
        Err(self.error())
    }
}
