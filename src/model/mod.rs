//! Data model shared by the stores, the providers and the orchestrator.
//!
//! Field names serialize in camelCase so the on-disk JSON matches the
//! layout other tools in the migration workflow already read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Kind of program being migrated. Drives which tests a generator proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "API")]
    Api,
    Web,
    Terminal,
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectType::Api => write!(f, "API"),
            ProjectType::Web => write!(f, "Web"),
            ProjectType::Terminal => write!(f, "Terminal"),
        }
    }
}

impl std::str::FromStr for ProjectType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(ProjectType::Api),
            "web" => Ok(ProjectType::Web),
            "terminal" => Ok(ProjectType::Terminal),
            other => Err(ValidationError::UnknownProjectType(other.to_string())),
        }
    }
}

/// A legacy/new pair under verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub legacy_path: String,
    pub new_path: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened: Option<DateTime<Utc>>,
}

/// Form data for creating a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub legacy_path: String,
    pub new_path: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("project name must not be empty")]
    EmptyName,

    #[error("{which} path must not be empty")]
    EmptyPath { which: &'static str },

    #[error("{which} path not found: {path}")]
    PathMissing { which: &'static str, path: String },

    #[error("{which} path is not a directory: {path}")]
    NotADirectory { which: &'static str, path: String },

    #[error("unknown project type '{0}' (expected API, Web or Terminal)")]
    UnknownProjectType(String),
}

impl NewProject {
    /// Check the required form fields. Does not touch the filesystem.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.legacy_path.trim().is_empty() {
            return Err(ValidationError::EmptyPath { which: "legacy" });
        }
        if self.new_path.trim().is_empty() {
            return Err(ValidationError::EmptyPath { which: "new" });
        }
        Ok(())
    }

    /// Materialize a project with a fresh id and creation timestamp.
    pub fn into_project(self) -> Project {
        Project {
            id: Uuid::new_v4().to_string(),
            name: self.name.trim().to_string(),
            project_type: self.project_type,
            legacy_path: self.legacy_path,
            new_path: self.new_path,
            created_at: Utc::now(),
            last_opened: None,
        }
    }
}

impl Project {
    /// Verify both implementation paths exist and are directories.
    pub fn validate_paths(&self) -> Result<(), ValidationError> {
        for (which, path) in [("legacy", &self.legacy_path), ("new", &self.new_path)] {
            let p = std::path::Path::new(path);
            if !p.exists() {
                return Err(ValidationError::PathMissing { which, path: path.clone() });
            }
            if !p.is_dir() {
                return Err(ValidationError::NotADirectory { which, path: path.clone() });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Full generated test content for one test id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub full_code: String,
}

/// Lifecycle state of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Pending => write!(f, "pending"),
            TestStatus::Running => write!(f, "running"),
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status summary for one test id, independent of its definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_output: Option<String>,
}

impl TestRecord {
    /// A fresh `pending` record for a newly generated definition.
    pub fn pending_from(def: &TestDefinition) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            description: def.description.clone(),
            status: TestStatus::Pending,
            execution_time: None,
            legacy_output: None,
            new_output: None,
        }
    }

    /// Merge only the fields present in `patch`.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(t) = patch.execution_time {
            self.execution_time = Some(t);
        }
        if let Some(out) = &patch.legacy_output {
            self.legacy_output = Some(out.clone());
        }
        if let Some(out) = &patch.new_output {
            self.new_output = Some(out.clone());
        }
    }
}

/// Partial update to a [`TestRecord`]. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_output: Option<String>,
}

/// Terminal verdict an execution provider can report for a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Passed,
    Failed,
}

impl From<OutcomeStatus> for TestStatus {
    fn from(s: OutcomeStatus) -> Self {
        match s {
            OutcomeStatus::Passed => TestStatus::Passed,
            OutcomeStatus::Failed => TestStatus::Failed,
        }
    }
}

/// Result of executing one test against both implementations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub id: String,
    pub status: OutcomeStatus,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub execution_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_output: Option<String>,
}

/// Harnesses written in JS report `executionTime` as any number. Accept
/// floats (rounded) and `null`; negatives clamp to zero.
fn lenient_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(match value {
        Some(ms) if ms.is_finite() && ms > 0.0 => ms.round().min(u64::MAX as f64) as u64,
        _ => 0,
    })
}

impl TestOutcome {
    pub fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            status: Some(self.status.into()),
            execution_time: Some(self.execution_time),
            legacy_output: self.legacy_output.clone(),
            new_output: self.new_output.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Passed,
    Failed,
}

/// Immutable aggregate snapshot of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub executed_at: DateTime<Utc>,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub total_execution_time: u64,
    pub status: ExecutionStatus,
}

impl Execution {
    /// Aggregate a batch of outcomes into a new execution entry.
    ///
    /// `passed_tests + failed_tests == total_tests` holds by construction
    /// since every outcome is either passed or failed.
    pub fn from_outcomes(project_id: &str, project_name: &str, outcomes: &[TestOutcome]) -> Self {
        let passed_tests = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Passed)
            .count();
        let failed_tests = outcomes.len() - passed_tests;
        let total_execution_time = outcomes
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.execution_time));

        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            project_name: project_name.to_string(),
            executed_at: Utc::now(),
            total_tests: outcomes.len(),
            passed_tests,
            failed_tests,
            total_execution_time,
            status: if failed_tests > 0 {
                ExecutionStatus::Failed
            } else {
                ExecutionStatus::Passed
            },
        }
    }
}

/// Per-project run log, most recent first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHistory {
    pub project_id: String,
    #[serde(default)]
    pub executions: Vec<Execution>,
}

impl ExecutionHistory {
    pub fn empty(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            executions: Vec::new(),
        }
    }

    /// Prepend `execution` and drop the oldest entries beyond `cap`.
    pub fn push_front_capped(&mut self, execution: Execution, cap: usize) {
        self.executions.insert(0, execution);
        self.executions.truncate(cap);
    }
}

/// An execution joined with the project's current test records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(flatten)]
    pub execution: Execution,
    pub test_results: Vec<TestRecord>,
}
