//! Per-project test definition store (`test-codes-{projectId}.json`).

use std::collections::BTreeMap;

use tracing::{info, warn};

use super::{read_json, remove_file, write_json, DataDir, StorageError};
use crate::model::TestDefinition;

const PREFIX: &str = "test-codes";

type DefinitionMap = BTreeMap<String, TestDefinition>;

#[derive(Debug, Clone)]
pub struct TestDefinitionStore {
    dir: DataDir,
}

impl TestDefinitionStore {
    pub fn new(dir: DataDir) -> Self {
        Self { dir }
    }

    async fn load(&self, project_id: &str) -> DefinitionMap {
        match self.dir.project_file(PREFIX, project_id) {
            Ok(path) => read_json(&path).await.unwrap_or_default(),
            Err(e) => {
                warn!(%project_id, error = %e, "rejecting definition lookup");
                DefinitionMap::new()
            }
        }
    }

    /// Replace the project's definition map with `definitions`.
    ///
    /// The file is rebuilt from the supplied set alone: code for ids that
    /// were stored before is overwritten, ids missing from the new set are
    /// dropped. Their records are not affected.
    pub async fn replace_all(&self, project_id: &str, definitions: &[TestDefinition]) -> Result<(), StorageError> {
        let _guard = self.dir.lock(project_id).await;
        let path = self.dir.project_file(PREFIX, project_id)?;

        let stored: DefinitionMap = definitions
            .iter()
            .map(|def| (def.id.clone(), def.clone()))
            .collect();

        write_json(&path, &stored).await?;
        info!(%project_id, written = stored.len(), "stored test definitions");
        Ok(())
    }

    pub async fn get_all(&self, project_id: &str) -> Vec<TestDefinition> {
        self.load(project_id).await.into_values().collect()
    }

    pub async fn get_by_id(&self, project_id: &str, id: &str) -> Option<TestDefinition> {
        self.load(project_id).await.remove(id)
    }

    /// Remove one definition. Returns whether it existed.
    pub async fn delete(&self, project_id: &str, id: &str) -> Result<bool, StorageError> {
        let _guard = self.dir.lock(project_id).await;
        let path = self.dir.project_file(PREFIX, project_id)?;
        let Some(mut stored) = read_json::<DefinitionMap>(&path).await else {
            return Ok(false);
        };
        let existed = stored.remove(id).is_some();
        if existed {
            write_json(&path, &stored).await?;
        }
        Ok(existed)
    }

    pub async fn delete_all(&self, project_id: &str) -> Result<(), StorageError> {
        let _guard = self.dir.lock(project_id).await;
        let path = self.dir.project_file(PREFIX, project_id)?;
        if remove_file(&path).await? {
            info!(%project_id, "deleted all test definitions");
        }
        Ok(())
    }
}
