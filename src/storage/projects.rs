//! Project registry (`projects.json`).

use chrono::Utc;
use tracing::{info, warn};

use super::{read_json, write_json, DataDir, StorageError};
use crate::model::{NewProject, Project};

const FILE: &str = "projects.json";

#[derive(Debug, Clone)]
pub struct ProjectStore {
    dir: DataDir,
}

impl ProjectStore {
    pub fn new(dir: DataDir) -> Self {
        Self { dir }
    }

    /// All projects in creation order. A malformed file reads as empty.
    pub async fn list(&self) -> Vec<Project> {
        let path = self.dir.file(FILE);
        match read_json::<serde_json::Value>(&path).await {
            None => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<Project>(item) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        warn!(error = %e, "skipping malformed project entry");
                        None
                    }
                })
                .collect(),
            Some(_) => {
                warn!(path = %path.display(), "projects file is not an array, treating as empty");
                Vec::new()
            }
        }
    }

    async fn save(&self, projects: &[Project]) -> Result<(), StorageError> {
        write_json(&self.dir.file(FILE), projects).await
    }

    pub async fn get(&self, id: &str) -> Option<Project> {
        self.list().await.into_iter().find(|p| p.id == id)
    }

    /// Register a new project after checking the required form fields.
    /// Path existence is not checked here, see [`Project::validate_paths`].
    pub async fn create(&self, new: NewProject) -> Result<Project, StorageError> {
        new.validate()?;
        let project = new.into_project();

        let _guard = self.dir.lock(FILE).await;
        let mut projects = self.list().await;
        projects.push(project.clone());
        self.save(&projects).await?;

        info!(project_id = %project.id, name = %project.name, kind = %project.project_type, "created project");
        Ok(project)
    }

    /// Replace a stored project by id. Returns whether it existed.
    pub async fn update(&self, project: &Project) -> Result<bool, StorageError> {
        let _guard = self.dir.lock(FILE).await;
        let mut projects = self.list().await;
        let Some(slot) = projects.iter_mut().find(|p| p.id == project.id) else {
            return Ok(false);
        };
        *slot = project.clone();
        self.save(&projects).await?;
        Ok(true)
    }

    /// Stamp `lastOpened` with the current time and return the project.
    pub async fn open(&self, id: &str) -> Result<Option<Project>, StorageError> {
        let _guard = self.dir.lock(FILE).await;
        let mut projects = self.list().await;
        let Some(project) = projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        project.last_opened = Some(Utc::now());
        let opened = project.clone();
        self.save(&projects).await?;
        Ok(Some(opened))
    }

    /// Projects most recently opened first; never-opened projects follow,
    /// newest created first.
    pub async fn recent(&self, limit: usize) -> Vec<Project> {
        let mut projects = self.list().await;
        projects.sort_by(|a, b| {
            let ka = a.last_opened.unwrap_or(a.created_at);
            let kb = b.last_opened.unwrap_or(b.created_at);
            b.last_opened
                .is_some()
                .cmp(&a.last_opened.is_some())
                .then(kb.cmp(&ka))
        });
        projects.truncate(limit);
        projects
    }

    /// Remove the project entry only. Cascading to its per-project files is
    /// the orchestrator's job. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let _guard = self.dir.lock(FILE).await;
        let mut projects = self.list().await;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        if projects.len() == before {
            return Ok(false);
        }
        self.save(&projects).await?;
        info!(project_id = %id, "deleted project");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectType, ValidationError};

    fn new_project(name: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            legacy_path: "/legacy".to_string(),
            new_path: "/new".to_string(),
            project_type: ProjectType::Terminal,
        }
    }

    fn store() -> (tempfile::TempDir, ProjectStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ProjectStore::new(DataDir::new(dir.path()));
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let (_dir, store) = store();
        let a = store.create(new_project("a")).await.unwrap();
        let b = store.create(new_project("b")).await.unwrap();
        assert_ne!(a.id, b.id);

        let list = store.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "a");
        assert_eq!(store.get(&b.id).await, Some(b));
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields() {
        let (dir, store) = store();

        let blank_name = NewProject {
            name: "   ".to_string(),
            ..new_project("x")
        };
        assert!(matches!(
            store.create(blank_name).await,
            Err(StorageError::Invalid(ValidationError::EmptyName))
        ));

        let blank_path = NewProject {
            new_path: String::new(),
            ..new_project("x")
        };
        assert!(matches!(
            store.create(blank_path).await,
            Err(StorageError::Invalid(ValidationError::EmptyPath { which: "new" }))
        ));

        assert!(store.list().await.is_empty());
        assert!(!dir.path().join(FILE).exists());
    }

    #[tokio::test]
    async fn test_open_stamps_last_opened() {
        let (_dir, store) = store();
        let p = store.create(new_project("a")).await.unwrap();
        assert!(p.last_opened.is_none());

        let opened = store.open(&p.id).await.unwrap().unwrap();
        assert!(opened.last_opened.is_some());
        assert_eq!(opened.name, p.name);
        assert_eq!(opened.created_at, p.created_at);
        assert_eq!(store.get(&p.id).await.unwrap().last_opened, opened.last_opened);

        assert!(store.open("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_orders_opened_first() {
        let (_dir, store) = store();
        let a = store.create(new_project("a")).await.unwrap();
        let b = store.create(new_project("b")).await.unwrap();
        store.create(new_project("c")).await.unwrap();
        store.open(&a.id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.open(&b.id).await.unwrap();

        let recent = store.recent(10).await;
        let names: Vec<_> = recent.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(store.recent(1).await[0].id, b.id);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_dir, store) = store();
        let mut p = store.create(new_project("a")).await.unwrap();
        p.name = "renamed".to_string();
        assert!(store.update(&p).await.unwrap());
        assert_eq!(store.get(&p.id).await.unwrap().name, "renamed");

        assert!(store.delete(&p.id).await.unwrap());
        assert!(!store.delete(&p.id).await.unwrap());
        assert!(store.list().await.is_empty());
        assert!(!store.update(&p).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_array_file_reads_empty() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("projects.json"), r#"{"id": "x"}"#).unwrap();
        assert!(store.list().await.is_empty());

        // A fresh create overwrites the bad file.
        store.create(new_project("a")).await.unwrap();
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_entry_skipped() {
        let (dir, store) = store();
        let good = new_project("good").into_project();
        let raw = serde_json::json!([good, {"name": "no id"}]);
        std::fs::write(dir.path().join("projects.json"), raw.to_string()).unwrap();
        let list = store.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "good");
    }
}
