//! Per-project test record store (`tests-{projectId}.json`).

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::{read_json, remove_file, write_json, DataDir, StorageError};
use crate::model::{RecordPatch, TestDefinition, TestRecord};

const PREFIX: &str = "tests";

type RecordMap = BTreeMap<String, TestRecord>;

#[derive(Debug, Clone)]
pub struct TestRecordStore {
    dir: DataDir,
}

impl TestRecordStore {
    pub fn new(dir: DataDir) -> Self {
        Self { dir }
    }

    async fn load(&self, project_id: &str) -> RecordMap {
        match self.dir.project_file(PREFIX, project_id) {
            Ok(path) => read_json(&path).await.unwrap_or_default(),
            Err(e) => {
                warn!(%project_id, error = %e, "rejecting record lookup");
                RecordMap::new()
            }
        }
    }

    async fn save(&self, project_id: &str, records: &RecordMap) -> Result<(), StorageError> {
        let path = self.dir.project_file(PREFIX, project_id)?;
        write_json(&path, records).await
    }

    /// Insert a `pending` record for every definition id not yet present.
    /// Existing records are left untouched so prior results survive
    /// regeneration. Returns the number of records inserted.
    pub async fn upsert_from_definitions(
        &self,
        project_id: &str,
        definitions: &[TestDefinition],
    ) -> Result<usize, StorageError> {
        let _guard = self.dir.lock(project_id).await;
        let mut records = self.load(project_id).await;

        let mut inserted = 0;
        for def in definitions {
            if !records.contains_key(&def.id) {
                records.insert(def.id.clone(), TestRecord::pending_from(def));
                inserted += 1;
            }
        }

        self.save(project_id, &records).await?;
        info!(
            %project_id,
            inserted,
            kept = definitions.len() - inserted,
            total = records.len(),
            "merged generated tests into records"
        );
        Ok(inserted)
    }

    /// All records for a project, in no particular order.
    pub async fn get_all(&self, project_id: &str) -> Vec<TestRecord> {
        self.load(project_id).await.into_values().collect()
    }

    pub async fn get_by_id(&self, project_id: &str, id: &str) -> Option<TestRecord> {
        self.load(project_id).await.remove(id)
    }

    /// Merge the supplied fields into an existing record. Unknown ids are
    /// skipped with a warning. Returns whether a record was updated.
    pub async fn patch(&self, project_id: &str, id: &str, patch: &RecordPatch) -> Result<bool, StorageError> {
        let patched = self
            .patch_many(project_id, std::iter::once((id, patch)))
            .await?;
        Ok(patched == 1)
    }

    /// Apply several patches in one locked read-modify-write cycle.
    /// Returns how many records were updated.
    pub async fn patch_many<'a, I>(&self, project_id: &str, patches: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = (&'a str, &'a RecordPatch)>,
    {
        let _guard = self.dir.lock(project_id).await;
        let mut records = self.load(project_id).await;

        let mut patched = 0;
        for (id, patch) in patches {
            match records.get_mut(id) {
                Some(record) => {
                    record.apply(patch);
                    patched += 1;
                }
                None => warn!(%project_id, test_id = %id, "test not found for updating"),
            }
        }

        if patched > 0 {
            self.save(project_id, &records).await?;
        }
        debug!(%project_id, patched, "patched test records");
        Ok(patched)
    }

    /// Remove a single record. Returns whether it existed.
    pub async fn delete(&self, project_id: &str, id: &str) -> Result<bool, StorageError> {
        let _guard = self.dir.lock(project_id).await;
        let path = self.dir.project_file(PREFIX, project_id)?;
        let Some(mut records) = read_json::<RecordMap>(&path).await else {
            return Ok(false);
        };
        let existed = records.remove(id).is_some();
        if existed {
            write_json(&path, &records).await?;
        }
        Ok(existed)
    }

    /// Remove the project's whole record file.
    pub async fn delete_all(&self, project_id: &str) -> Result<(), StorageError> {
        let _guard = self.dir.lock(project_id).await;
        let path = self.dir.project_file(PREFIX, project_id)?;
        if remove_file(&path).await? {
            info!(%project_id, "deleted all test records");
        }
        Ok(())
    }
}
