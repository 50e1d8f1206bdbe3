//! Supervised per-project memory registry

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use atelier_core::config::MemoryConfig;
use atelier_core::ProjectId;

use crate::context::context_for_generation;
use crate::domain::MemoryError;
use crate::store::ProjectMemory;

/// Registry of per-project memory collections
pub struct MemoryRegistry {
    base_dir: PathBuf,
    context_char_budget: usize,
    inner: RwLock<HashMap<ProjectId, Arc<Mutex<ProjectMemory>>>>,
}

impl MemoryRegistry {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            base_dir: config.directory.clone(),
            context_char_budget: config.context_char_budget,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Open a project's memory, creating the collection on first store
    pub async fn get_or_create(
        &self,
        project_id: &ProjectId,
    ) -> Result<Arc<Mutex<ProjectMemory>>, MemoryError> {
        {
            let map = self.inner.read().await;
            if let Some(memory) = map.get(project_id) {
                return Ok(Arc::clone(memory));
            }
        }

        let memory = ProjectMemory::open(project_id.clone(), &self.base_dir)?;
        let memory = Arc::new(Mutex::new(memory));

        let mut map = self.inner.write().await;
        Ok(Arc::clone(
            map.entry(project_id.clone()).or_insert(memory),
        ))
    }

    /// Assemble the generation context for a project.
    ///
    /// Empty when the project has no memory yet.
    pub async fn context_for_generation(
        &self,
        project_id: &ProjectId,
        new_spec: &str,
    ) -> Result<String, MemoryError> {
        let memory = self.get_or_create(project_id).await?;
        let guard = memory.lock().await;
        Ok(context_for_generation(
            &guard,
            new_spec,
            self.context_char_budget,
        ))
    }

    /// Delete a project's collection and forget it
    pub async fn delete_project(&self, project_id: &ProjectId) -> Result<(), MemoryError> {
        let removed = self.inner.write().await.remove(project_id);

        match removed {
            Some(memory) => {
                // Take the collection out of its lock to consume it
                match Arc::try_unwrap(memory) {
                    Ok(mutex) => mutex.into_inner().delete()?,
                    Err(shared) => {
                        // Another handle is live; delete through the lock
                        let guard = shared.lock().await;
                        let path = self.base_dir.join(format!("{}.json", project_id));
                        drop(guard);
                        if path.exists() {
                            std::fs::remove_file(&path).map_err(|source| MemoryError::Io {
                                path: path.display().to_string(),
                                source,
                            })?;
                        }
                    }
                }
            }
            None => {
                let path = self.base_dir.join(format!("{}.json", project_id));
                if path.exists() {
                    std::fs::remove_file(&path).map_err(|source| MemoryError::Io {
                        path: path.display().to_string(),
                        source,
                    })?;
                }
            }
        }

        info!(project_id = %project_id, "Deleted project memory");
        Ok(())
    }
}
