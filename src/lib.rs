//! twincheck -- behavioural equivalence testing for code migrations.
//!
//! A project pairs a legacy implementation with its rewrite. Generated test
//! definitions are run against both; per-test results and a bounded
//! execution history are persisted as JSON files under one data directory.

pub mod config;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod storage;

pub use config::AppConfig;
pub use orchestrator::{OrchestratorError, OrchestratorSettings, RunEvent, RunReport, TestOrchestrator};
pub use storage::{Storage, StorageError};

use std::sync::Arc;

use provider::{ExecutionProvider, GenerationProvider};

/// Open storage and build an orchestrator from resolved configuration.
pub fn orchestrator(
    cfg: &AppConfig,
    generator: Arc<dyn GenerationProvider>,
    executor: Arc<dyn ExecutionProvider>,
) -> TestOrchestrator {
    let storage = Storage::open(cfg.storage.data_dir.clone(), cfg.history.max_entries);
    TestOrchestrator::new(storage, generator, executor).with_settings(OrchestratorSettings::from(cfg))
}
