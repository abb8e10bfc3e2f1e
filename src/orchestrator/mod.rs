//! Test lifecycle orchestration.
//!
//! Drives `pending -> running -> {passed, failed}` for whole-project and
//! single-test runs, merges generated tests into the stores and records an
//! execution entry per full run.
//!
//! Failure policy: when a collaborator fails or times out during a run, the
//! persisted records are left as they were and no execution is recorded.
//! The returned [`RunReport`] carries the blanket "all failed" view and the
//! cause, so the caller can show it without it becoming history.

pub mod events;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::model::{
    Execution, ExecutionResult, Project, RecordPatch, TestOutcome, TestRecord, TestStatus,
};
use crate::provider::{ExecutionProvider, GenerationProvider, ProviderError};
use crate::storage::{ProjectLocks, Storage, StorageError};

pub use self::events::RunEvent;

const EVENT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A collaborator call that did not produce a result.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("project {0} not found")]
    ProjectNotFound(String),

    #[error("test {test_id} not found in project {project_id}")]
    TestNotFound { project_id: String, test_id: String },

    #[error("project {0} has no tests, generate tests first")]
    NoTests(String),

    #[error("test generation failed: {0}")]
    Generation(#[source] CollaboratorError),
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Definitions returned by the provider.
    pub generated: usize,
    /// Records newly inserted as `pending`.
    pub inserted: usize,
    /// All records of the project after the merge.
    pub tests: Vec<TestRecord>,
}

#[derive(Debug)]
pub struct RunReport {
    /// What the caller should display for the tests in scope.
    pub tests: Vec<TestRecord>,
    /// The execution appended to history, if any.
    pub execution: Option<Execution>,
    /// Why the run degraded to the blanket-failure view.
    pub failure: Option<CollaboratorError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub generation_timeout: Duration,
    pub execution_timeout: Duration,
    /// Append an execution entry for single-test runs too.
    pub record_single_runs: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            generation_timeout: cfg.providers.generation_timeout(),
            execution_timeout: cfg.providers.execution_timeout(),
            record_single_runs: cfg.history.record_single_runs,
        }
    }
}

async fn call<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(CollaboratorError::from),
        Err(_) => Err(CollaboratorError::Timeout {
            operation,
            after: limit,
        }),
    }
}

fn view_with(records: &[TestRecord], status: TestStatus, reset_time: bool) -> Vec<TestRecord> {
    records
        .iter()
        .cloned()
        .map(|mut r| {
            r.status = status;
            if reset_time {
                r.execution_time = Some(0);
            }
            r
        })
        .collect()
}

// ---------------------------------------------------------------------------
// TestOrchestrator
// ---------------------------------------------------------------------------

pub struct TestOrchestrator {
    storage: Storage,
    generator: Arc<dyn GenerationProvider>,
    executor: Arc<dyn ExecutionProvider>,
    settings: OrchestratorSettings,
    /// Serializes whole flows per project.
    flows: ProjectLocks,
    events: broadcast::Sender<RunEvent>,
}

impl TestOrchestrator {
    pub fn new(
        storage: Storage,
        generator: Arc<dyn GenerationProvider>,
        executor: Arc<dyn ExecutionProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            generator,
            executor,
            settings: OrchestratorSettings::default(),
            flows: ProjectLocks::new(),
            events,
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Receive run lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RunEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn project(&self, project_id: &str) -> Result<Project, OrchestratorError> {
        self.storage
            .projects
            .get(project_id)
            .await
            .ok_or_else(|| OrchestratorError::ProjectNotFound(project_id.to_string()))
    }

    // -- generation ---------------------------------------------------------

    /// Request definitions from the generator and merge them in.
    ///
    /// Nothing is written unless the generator succeeds.
    pub async fn generate(&self, project_id: &str) -> Result<GenerationReport, OrchestratorError> {
        let _flow = self.flows.acquire(project_id).await;
        let project = self.project(project_id).await?;

        info!(%project_id, kind = %project.project_type, "generating tests");
        let definitions = call(
            "test generation",
            self.settings.generation_timeout,
            self.generator.generate(project_id, project.project_type),
        )
        .await
        .map_err(|e| {
            warn!(%project_id, error = %e, "test generation failed, nothing written");
            OrchestratorError::Generation(e)
        })?;

        if definitions.is_empty() {
            warn!(%project_id, "generator returned no tests");
        }

        // Records first: a definition must never exist without its record.
        let inserted = self
            .storage
            .records
            .upsert_from_definitions(project_id, &definitions)
            .await?;
        self.storage.definitions.replace_all(project_id, &definitions).await?;

        Ok(GenerationReport {
            generated: definitions.len(),
            inserted,
            tests: self.storage.records.get_all(project_id).await,
        })
    }

    // -- runs ---------------------------------------------------------------

    /// Run every test of the project and record an execution entry.
    pub async fn run_all(&self, project_id: &str) -> Result<RunReport, OrchestratorError> {
        let _flow = self.flows.acquire(project_id).await;
        let project = self.project(project_id).await?;

        let records = self.storage.records.get_all(project_id).await;
        if records.is_empty() {
            return Err(OrchestratorError::NoTests(project_id.to_string()));
        }

        info!(%project_id, tests = records.len(), "running all tests");
        self.emit(RunEvent::Running {
            project_id: project_id.to_string(),
            tests: view_with(&records, TestStatus::Running, true),
        });

        let outcomes = match call(
            "test execution",
            self.settings.execution_timeout,
            self.executor.execute_all(project_id),
        )
        .await
        {
            Ok(outcomes) => outcomes,
            Err(failure) => return Ok(self.degrade(project_id, &records, failure)),
        };

        let patches: Vec<(&str, RecordPatch)> = outcomes
            .iter()
            .map(|o| (o.id.as_str(), o.to_patch()))
            .collect();
        self.storage
            .records
            .patch_many(project_id, patches.iter().map(|(id, p)| (*id, p)))
            .await?;

        let execution = self
            .storage
            .history
            .append(project_id, &project.name, &outcomes)
            .await?;

        let tests = self.storage.records.get_all(project_id).await;
        info!(
            %project_id,
            execution_id = %execution.id,
            passed = execution.passed_tests,
            failed = execution.failed_tests,
            "run complete"
        );
        self.emit(RunEvent::Completed {
            project_id: project_id.to_string(),
            execution_id: Some(execution.id.clone()),
            tests: tests.clone(),
        });

        Ok(RunReport {
            tests,
            execution: Some(execution),
            failure: None,
        })
    }

    /// Run one test. Records an execution entry only when
    /// `record_single_runs` is enabled.
    pub async fn run_single(&self, project_id: &str, test_id: &str) -> Result<RunReport, OrchestratorError> {
        let _flow = self.flows.acquire(project_id).await;
        let project = self.project(project_id).await?;

        let record = self
            .storage
            .records
            .get_by_id(project_id, test_id)
            .await
            .ok_or_else(|| OrchestratorError::TestNotFound {
                project_id: project_id.to_string(),
                test_id: test_id.to_string(),
            })?;
        let scope = std::slice::from_ref(&record);

        info!(%project_id, %test_id, "running single test");
        self.emit(RunEvent::Running {
            project_id: project_id.to_string(),
            tests: view_with(scope, TestStatus::Running, true),
        });

        let outcome = match call(
            "single test execution",
            self.settings.execution_timeout,
            self.executor.execute_one(project_id, test_id),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(failure) => return Ok(self.degrade(project_id, scope, failure)),
        };

        if outcome.id != test_id {
            warn!(%project_id, %test_id, returned = %outcome.id, "provider answered for another id, applying to the requested test");
        }
        self.storage
            .records
            .patch(project_id, test_id, &outcome.to_patch())
            .await?;

        let execution = if self.settings.record_single_runs {
            let single = TestOutcome {
                id: test_id.to_string(),
                ..outcome
            };
            Some(
                self.storage
                    .history
                    .append(project_id, &project.name, std::slice::from_ref(&single))
                    .await?,
            )
        } else {
            None
        };

        let tests: Vec<TestRecord> = self
            .storage
            .records
            .get_by_id(project_id, test_id)
            .await
            .into_iter()
            .collect();
        self.emit(RunEvent::Completed {
            project_id: project_id.to_string(),
            execution_id: execution.as_ref().map(|e| e.id.clone()),
            tests: tests.clone(),
        });

        Ok(RunReport {
            tests,
            execution,
            failure: None,
        })
    }

    fn degrade(&self, project_id: &str, records: &[TestRecord], failure: CollaboratorError) -> RunReport {
        warn!(%project_id, error = %failure, "test execution failed, stored results left unchanged");
        let tests = view_with(records, TestStatus::Failed, false);
        self.emit(RunEvent::Failed {
            project_id: project_id.to_string(),
            reason: failure.to_string(),
            tests: tests.clone(),
        });
        RunReport {
            tests,
            execution: None,
            failure: Some(failure),
        }
    }

    // -- queries ------------------------------------------------------------

    /// An execution joined with the project's current test records.
    pub async fn execution_result(&self, project_id: &str, execution_id: &str) -> Option<ExecutionResult> {
        let execution = self.storage.history.get_by_id(project_id, execution_id).await?;
        let test_results = self.storage.records.get_all(project_id).await;
        Some(ExecutionResult {
            execution,
            test_results,
        })
    }

    // -- deletion -----------------------------------------------------------

    /// Delete the project and every per-project file. Returns whether the
    /// project entry existed; leftover files are removed either way.
    pub async fn delete_project(&self, project_id: &str) -> Result<bool, OrchestratorError> {
        let flow = self.flows.acquire(project_id).await;
        let existed = self.storage.projects.delete(project_id).await?;
        futures::try_join!(
            self.storage.records.delete_all(project_id),
            self.storage.definitions.delete_all(project_id),
            self.storage.history.delete_all(project_id),
        )?;
        drop(flow);
        self.flows.release(project_id);
        self.storage.release_project(project_id);
        info!(%project_id, existed, "project deleted with its tests and history");
        Ok(existed)
    }

    /// Remove all records and definitions of a project.
    pub async fn delete_all_tests(&self, project_id: &str) -> Result<(), OrchestratorError> {
        let _flow = self.flows.acquire(project_id).await;
        futures::try_join!(
            self.storage.records.delete_all(project_id),
            self.storage.definitions.delete_all(project_id),
        )?;
        Ok(())
    }

    /// Remove one test from both stores. Returns whether either held it.
    pub async fn delete_test(&self, project_id: &str, test_id: &str) -> Result<bool, OrchestratorError> {
        let _flow = self.flows.acquire(project_id).await;
        let record = self.storage.records.delete(project_id, test_id).await?;
        let definition = self.storage.definitions.delete(project_id, test_id).await?;
        Ok(record || definition)
    }

    pub async fn delete_all_executions(&self, project_id: &str) -> Result<(), OrchestratorError> {
        let _flow = self.flows.acquire(project_id).await;
        self.storage.history.delete_all(project_id).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewProject, OutcomeStatus, ProjectType, TestDefinition};
    use crate::provider::Unavailable;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Scripted {
        generations: Mutex<VecDeque<Result<Vec<TestDefinition>, ProviderError>>>,
        runs: Mutex<VecDeque<Result<Vec<TestOutcome>, ProviderError>>>,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn generating(self, defs: Vec<TestDefinition>) -> Self {
            self.generations.lock().unwrap().push_back(Ok(defs));
            self
        }

        fn running(self, outcomes: Vec<TestOutcome>) -> Self {
            self.runs.lock().unwrap().push_back(Ok(outcomes));
            self
        }

        fn failing_run(self) -> Self {
            self.runs
                .lock()
                .unwrap()
                .push_back(Err(ProviderError::Failed("harness crashed".into())));
            self
        }
    }

    #[async_trait]
    impl GenerationProvider for Scripted {
        async fn generate(&self, _: &str, _: ProjectType) -> Result<Vec<TestDefinition>, ProviderError> {
            let next = self.generations.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(ProviderError::Failed("no script".into())))
        }
    }

    #[async_trait]
    impl ExecutionProvider for Scripted {
        async fn execute_all(&self, _: &str) -> Result<Vec<TestOutcome>, ProviderError> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let next = self.runs.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(ProviderError::Failed("no script".into())))
        }

        async fn execute_one(&self, project_id: &str, test_id: &str) -> Result<TestOutcome, ProviderError> {
            self.execute_all(project_id)
                .await?
                .into_iter()
                .find(|o| o.id == test_id)
                .ok_or_else(|| ProviderError::TestNotFound { test_id: test_id.into() })
        }
    }

    fn def(id: &str, code: &str) -> TestDefinition {
        TestDefinition {
            id: id.into(),
            name: format!("{id} name"),
            description: format!("{id} description"),
            full_code: code.into(),
        }
    }

    fn outcome(id: &str, status: OutcomeStatus, ms: u64) -> TestOutcome {
        TestOutcome {
            id: id.into(),
            status,
            execution_time: ms,
            legacy_output: Some("legacy".into()),
            new_output: Some("new".into()),
        }
    }

    async fn setup(script: Scripted) -> (tempfile::TempDir, TestOrchestrator, Project) {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = Storage::open(dir.path(), 50);
        let project = storage
            .projects
            .create(NewProject {
                name: "Calculator".into(),
                legacy_path: "/legacy".into(),
                new_path: "/new".into(),
                project_type: ProjectType::Terminal,
            })
            .await
            .unwrap();
        let script = Arc::new(script);
        let orch = TestOrchestrator::new(storage, script.clone(), script);
        (dir, orch, project)
    }

    #[tokio::test]
    async fn test_generate_merges_records() {
        let script = Scripted::default()
            .generating(vec![def("d1", "a"), def("d2", "b")])
            .generating(vec![def("d1", "a2"), def("d3", "c")]);
        let (_dir, orch, p) = setup(script).await;

        let first = orch.generate(&p.id).await.unwrap();
        assert_eq!((first.generated, first.inserted), (2, 2));

        orch.storage()
            .records
            .patch(&p.id, "d1", &RecordPatch { status: Some(TestStatus::Passed), ..Default::default() })
            .await
            .unwrap();

        let second = orch.generate(&p.id).await.unwrap();
        assert_eq!((second.generated, second.inserted), (2, 1));
        assert_eq!(second.tests.len(), 3);

        let d1 = orch.storage().records.get_by_id(&p.id, "d1").await.unwrap();
        assert_eq!(d1.status, TestStatus::Passed);
        let code = orch.storage().definitions.get_by_id(&p.id, "d1").await.unwrap();
        assert_eq!(code.full_code, "a2");
    }

    #[tokio::test]
    async fn test_generate_failure_writes_nothing() {
        let (dir, orch, p) = setup(Scripted::default()).await;
        let err = orch.generate(&p.id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Generation(_)));
        assert!(!dir.path().join(format!("tests-{}.json", p.id)).exists());
        assert!(!dir.path().join(format!("test-codes-{}.json", p.id)).exists());
    }

    #[tokio::test]
    async fn test_generate_record_write_failure_leaves_no_orphan_definitions() {
        let script = Scripted::default().generating(vec![def("d1", "a")]);
        let (dir, orch, p) = setup(script).await;

        // A non-empty directory where the record file belongs makes the write fail.
        let blocker = dir.path().join(format!("tests-{}.json", p.id));
        std::fs::create_dir_all(blocker.join("occupied")).unwrap();

        let err = orch.generate(&p.id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Storage(_)));
        assert!(orch.storage().definitions.get_all(&p.id).await.is_empty());
        assert!(!dir.path().join(format!("test-codes-{}.json", p.id)).exists());
    }

    #[tokio::test]
    async fn test_generate_unknown_project() {
        let (_dir, orch, _p) = setup(Scripted::default()).await;
        assert!(matches!(
            orch.generate("nope").await,
            Err(OrchestratorError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_all_updates_records_and_history() {
        let script = Scripted::default()
            .generating(vec![def("d1", "a"), def("d4", "b")])
            .running(vec![outcome("d1", OutcomeStatus::Passed, 80), outcome("d4", OutcomeStatus::Failed, 60)]);
        let (_dir, orch, p) = setup(script).await;
        orch.generate(&p.id).await.unwrap();

        let mut events = orch.subscribe();
        let report = orch.run_all(&p.id).await.unwrap();
        assert!(report.is_success());

        let exec = report.execution.unwrap();
        assert_eq!((exec.total_tests, exec.passed_tests, exec.failed_tests), (2, 1, 1));
        assert_eq!(exec.total_execution_time, 140);
        assert_eq!(exec.project_name, "Calculator");

        let d4 = orch.storage().records.get_by_id(&p.id, "d4").await.unwrap();
        assert_eq!(d4.status, TestStatus::Failed);
        assert_eq!(d4.execution_time, Some(60));
        assert_eq!(d4.new_output.as_deref(), Some("new"));

        let running = events.recv().await.unwrap();
        assert_eq!(running.project_id(), p.id);
        match running {
            RunEvent::Running { tests, .. } => {
                assert_eq!(tests.len(), 2);
                assert!(tests
                    .iter()
                    .all(|t| t.status == TestStatus::Running && t.execution_time == Some(0)));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events.recv().await.unwrap(), RunEvent::Completed { .. }));

        // The optimistic state never reached disk.
        assert!(orch
            .storage()
            .records
            .get_all(&p.id)
            .await
            .iter()
            .all(|r| r.status != TestStatus::Running));
    }

    #[tokio::test]
    async fn test_run_all_failure_leaves_records_untouched() {
        let script = Scripted::default()
            .generating(vec![def("d1", "a"), def("d2", "b")])
            .running(vec![outcome("d1", OutcomeStatus::Passed, 10)])
            .failing_run();
        let (_dir, orch, p) = setup(script).await;
        orch.generate(&p.id).await.unwrap();
        orch.run_all(&p.id).await.unwrap();

        let before = orch.storage().records.get_all(&p.id).await;
        let report = orch.run_all(&p.id).await.unwrap();

        assert!(!report.is_success());
        assert!(report.execution.is_none());
        assert!(report.tests.iter().all(|t| t.status == TestStatus::Failed));
        assert_eq!(orch.storage().records.get_all(&p.id).await, before);
        assert_eq!(orch.storage().history.list_by_project(&p.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_all_timeout_degrades() {
        let script = Scripted {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        }
        .generating(vec![def("d1", "a")])
        .running(vec![outcome("d1", OutcomeStatus::Passed, 1)]);
        let (_dir, orch, p) = setup(script).await;
        let orch = orch.with_settings(OrchestratorSettings {
            execution_timeout: Duration::from_millis(50),
            ..Default::default()
        });
        orch.generate(&p.id).await.unwrap();

        let report = orch.run_all(&p.id).await.unwrap();
        assert!(matches!(report.failure, Some(CollaboratorError::Timeout { .. })));
        let d1 = orch.storage().records.get_by_id(&p.id, "d1").await.unwrap();
        assert_eq!(d1.status, TestStatus::Pending);
    }

    #[tokio::test]
    async fn test_run_all_without_tests() {
        let (_dir, orch, p) = setup(Scripted::default()).await;
        assert!(matches!(orch.run_all(&p.id).await, Err(OrchestratorError::NoTests(_))));
    }

    #[tokio::test]
    async fn test_run_single_has_no_history_by_default() {
        let script = Scripted::default()
            .generating(vec![def("d1", "a"), def("d2", "b")])
            .running(vec![outcome("d2", OutcomeStatus::Passed, 33)]);
        let (_dir, orch, p) = setup(script).await;
        orch.generate(&p.id).await.unwrap();

        let report = orch.run_single(&p.id, "d2").await.unwrap();
        assert!(report.execution.is_none());
        assert_eq!(report.tests.len(), 1);
        assert_eq!(report.tests[0].status, TestStatus::Passed);
        assert_eq!(report.tests[0].execution_time, Some(33));

        let d1 = orch.storage().records.get_by_id(&p.id, "d1").await.unwrap();
        assert_eq!(d1.status, TestStatus::Pending);
        assert!(orch.storage().history.list_by_project(&p.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_run_single_records_history_when_enabled() {
        let script = Scripted::default()
            .generating(vec![def("d1", "a")])
            .running(vec![outcome("d1", OutcomeStatus::Failed, 9)]);
        let (_dir, orch, p) = setup(script).await;
        let orch = orch.with_settings(OrchestratorSettings {
            record_single_runs: true,
            ..Default::default()
        });
        orch.generate(&p.id).await.unwrap();

        let report = orch.run_single(&p.id, "d1").await.unwrap();
        let exec = report.execution.unwrap();
        assert_eq!(exec.total_tests, 1);
        assert_eq!(exec.failed_tests, 1);
        assert_eq!(orch.storage().history.list_by_project(&p.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_single_failure_and_missing() {
        let script = Scripted::default().generating(vec![def("d1", "a")]);
        let (_dir, orch, p) = setup(script).await;
        orch.generate(&p.id).await.unwrap();

        assert!(matches!(
            orch.run_single(&p.id, "ghost").await,
            Err(OrchestratorError::TestNotFound { .. })
        ));

        let report = orch.run_single(&p.id, "d1").await.unwrap();
        assert!(!report.is_success());
        assert_eq!(report.tests[0].status, TestStatus::Failed);
        let d1 = orch.storage().records.get_by_id(&p.id, "d1").await.unwrap();
        assert_eq!(d1.status, TestStatus::Pending);
    }

    #[tokio::test]
    async fn test_unavailable_executor() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = Storage::open(dir.path(), 50);
        let p = storage
            .projects
            .create(NewProject {
                name: "x".into(),
                legacy_path: "a".into(),
                new_path: "b".into(),
                project_type: ProjectType::Web,
            })
            .await
            .unwrap();
        let orch = TestOrchestrator::new(
            storage,
            Arc::new(crate::provider::TemplateGenerator::new()),
            Arc::new(Unavailable::new("execution")),
        );
        orch.generate(&p.id).await.unwrap();
        let report = orch.run_all(&p.id).await.unwrap();
        assert!(matches!(
            report.failure,
            Some(CollaboratorError::Provider(ProviderError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let script = Scripted::default()
            .generating(vec![def("d1", "a")])
            .running(vec![outcome("d1", OutcomeStatus::Passed, 1)]);
        let (dir, orch, p) = setup(script).await;
        orch.generate(&p.id).await.unwrap();
        orch.run_all(&p.id).await.unwrap();

        assert!(orch.delete_project(&p.id).await.unwrap());
        assert!(orch.storage().projects.get(&p.id).await.is_none());
        assert!(orch.storage().records.get_all(&p.id).await.is_empty());
        assert!(orch.storage().definitions.get_all(&p.id).await.is_empty());
        assert!(orch.storage().history.list_by_project(&p.id).await.is_empty());
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(&p.id))
            .count();
        assert_eq!(leftovers, 0);

        // Only the `projects.json` lock outlives the project.
        assert!(orch.flows.is_empty());
        assert_eq!(orch.storage().tracked_locks(), 1);
    }

    #[tokio::test]
    async fn test_delete_tests_and_executions() {
        let script = Scripted::default()
            .generating(vec![def("d1", "a"), def("d2", "b")])
            .running(vec![outcome("d1", OutcomeStatus::Passed, 1)]);
        let (_dir, orch, p) = setup(script).await;
        orch.generate(&p.id).await.unwrap();
        let exec = orch.run_all(&p.id).await.unwrap().execution.unwrap();

        let result = orch.execution_result(&p.id, &exec.id).await.unwrap();
        assert_eq!(result.execution.id, exec.id);
        assert_eq!(result.test_results.len(), 2);
        assert!(orch.execution_result(&p.id, "nope").await.is_none());

        assert!(orch.delete_test(&p.id, "d2").await.unwrap());
        assert!(!orch.delete_test(&p.id, "d2").await.unwrap());
        assert_eq!(orch.storage().records.get_all(&p.id).await.len(), 1);

        orch.delete_all_tests(&p.id).await.unwrap();
        assert!(orch.storage().records.get_all(&p.id).await.is_empty());
        assert!(orch.storage().definitions.get_all(&p.id).await.is_empty());
        // History survives test deletion.
        assert_eq!(orch.storage().history.list_by_project(&p.id).await.len(), 1);

        orch.delete_all_executions(&p.id).await.unwrap();
        assert!(orch.storage().history.list_by_project(&p.id).await.is_empty());
    }
}
