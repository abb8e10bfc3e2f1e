//! Bounded per-project execution history (`executions-{projectId}.json`).
//!
//! Entries are kept newest first. Appending past the cap evicts the oldest
//! entry (FIFO by insertion, never by access).

use tracing::{info, warn};

use super::{read_json, remove_file, write_json, DataDir, StorageError};
use crate::model::{Execution, ExecutionHistory, TestOutcome};

const PREFIX: &str = "executions";

/// Default number of executions retained per project.
pub const DEFAULT_HISTORY_CAP: usize = 50;

#[derive(Debug, Clone)]
pub struct ExecutionHistoryStore {
    dir: DataDir,
    cap: usize,
}

impl ExecutionHistoryStore {
    /// A cap of zero is raised to one so the latest run is always kept.
    pub fn new(dir: DataDir, cap: usize) -> Self {
        if cap == 0 {
            warn!("history cap of 0 requested, keeping 1 execution per project");
        }
        Self { dir, cap: cap.max(1) }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    async fn load(&self, project_id: &str) -> ExecutionHistory {
        let history = match self.dir.project_file(PREFIX, project_id) {
            Ok(path) => read_json::<ExecutionHistory>(&path).await,
            Err(e) => {
                warn!(%project_id, error = %e, "rejecting history lookup");
                None
            }
        };
        history.unwrap_or_else(|| ExecutionHistory::empty(project_id))
    }

    /// Aggregate `outcomes` into a new execution, prepend it and trim the
    /// log to the cap. Returns the stored execution.
    pub async fn append(
        &self,
        project_id: &str,
        project_name: &str,
        outcomes: &[TestOutcome],
    ) -> Result<Execution, StorageError> {
        let execution = Execution::from_outcomes(project_id, project_name, outcomes);

        let _guard = self.dir.lock(project_id).await;
        let path = self.dir.project_file(PREFIX, project_id)?;
        let mut history = self.load(project_id).await;
        history.project_id = project_id.to_string();

        let before = history.executions.len();
        history.push_front_capped(execution.clone(), self.cap);
        let evicted = (before + 1).saturating_sub(history.executions.len());

        write_json(&path, &history).await?;
        info!(
            %project_id,
            execution_id = %execution.id,
            total = execution.total_tests,
            passed = execution.passed_tests,
            failed = execution.failed_tests,
            evicted,
            "recorded execution"
        );
        Ok(execution)
    }

    /// Executions for a project, newest first.
    pub async fn list_by_project(&self, project_id: &str) -> Vec<Execution> {
        self.load(project_id).await.executions
    }

    pub async fn get_by_id(&self, project_id: &str, execution_id: &str) -> Option<Execution> {
        self.load(project_id)
            .await
            .executions
            .into_iter()
            .find(|e| e.id == execution_id)
    }

    pub async fn delete_all(&self, project_id: &str) -> Result<(), StorageError> {
        let _guard = self.dir.lock(project_id).await;
        let path = self.dir.project_file(PREFIX, project_id)?;
        if remove_file(&path).await? {
            info!(%project_id, "deleted execution history");
        }
        Ok(())
    }
}
