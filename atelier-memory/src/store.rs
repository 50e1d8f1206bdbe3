//! The per-project memory collection

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use atelier_core::ProjectId;

use crate::domain::{
    ConstraintSeverity, MemoryError, MemoryRecord, SearchHit, StoredRecord,
};
use crate::embedding::{cosine_similarity, embed};

/// A project's memory: append-only records with embeddings, persisted as
/// one JSON collection file.
pub struct ProjectMemory {
    project_id: ProjectId,
    records: Vec<StoredRecord>,
    path: PathBuf,
}

impl ProjectMemory {
    /// Open (or create) the collection for a project
    pub fn open(project_id: ProjectId, base_dir: &Path) -> Result<Self, MemoryError> {
        let path = base_dir.join(format!("{}.json", project_id));

        let records = if path.exists() {
            let json = std::fs::read_to_string(&path).map_err(|source| MemoryError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&json)?
        } else {
            Vec::new()
        };

        debug!(project_id = %project_id, records = records.len(), "Opened memory collection");
        Ok(Self {
            project_id,
            records,
            path,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store a code snippet
    pub fn store_code(
        &mut self,
        filepath: impl Into<String>,
        snippet: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<(), MemoryError> {
        self.store(MemoryRecord::Code {
            filepath: filepath.into(),
            language: language.into(),
            snippet: snippet.into(),
        })
    }

    /// Store a design decision
    pub fn store_decision(
        &mut self,
        title: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Result<(), MemoryError> {
        self.store(MemoryRecord::Decision {
            title: title.into(),
            reasoning: reasoning.into(),
            timestamp: Utc::now(),
        })
    }

    /// Store a user preference
    pub fn store_preference(
        &mut self,
        category: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MemoryError> {
        self.store(MemoryRecord::Preference {
            category: category.into(),
            key: key.into(),
            value: value.into(),
        })
    }

    /// Store a constraint
    pub fn store_constraint(
        &mut self,
        description: impl Into<String>,
        severity: ConstraintSeverity,
    ) -> Result<(), MemoryError> {
        self.store(MemoryRecord::Constraint {
            description: description.into(),
            severity,
        })
    }

    fn store(&mut self, record: MemoryRecord) -> Result<(), MemoryError> {
        let text = record.embedding_text();
        let id = self.record_id(record.kind(), &text);

        // Identical content dedupes
        if self.records.iter().any(|r| r.id == id) {
            debug!(project_id = %self.project_id, id = %id, "Record already stored");
            return Ok(());
        }

        self.records.push(StoredRecord {
            id,
            embedding: embed(&text),
            record,
            stored_at: Utc::now(),
        });

        self.persist()
    }

    fn record_id(&self, kind: &str, text: &str) -> String {
        let digest = Sha256::digest(format!("{}:{}:{}", self.project_id, kind, text).as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    fn persist(&self) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| MemoryError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let json = serde_json::to_string(&self.records)?;
        std::fs::write(&self.path, json).map_err(|source| MemoryError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn search_kind<F>(&self, query: &str, n: usize, filter: F) -> Vec<SearchHit>
    where
        F: Fn(&MemoryRecord) -> bool,
    {
        let query_embedding = embed(query);

        let mut hits: Vec<SearchHit> = self
            .records
            .iter()
            .filter(|stored| filter(&stored.record))
            .map(|stored| SearchHit {
                record: stored.record.clone(),
                score: cosine_similarity(&query_embedding, &stored.embedding),
                stored_at: stored.stored_at,
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(n);
        hits
    }

    /// Most similar code snippets, optionally restricted by language
    pub fn search_code(&self, query: &str, n: usize, language: Option<&str>) -> Vec<SearchHit> {
        self.search_kind(query, n, |record| match record {
            MemoryRecord::Code { language: l, .. } => {
                language.map(|wanted| l == wanted).unwrap_or(true)
            }
            _ => false,
        })
    }

    /// Most similar decisions
    pub fn search_decisions(&self, query: &str, n: usize) -> Vec<SearchHit> {
        self.search_kind(query, n, |r| matches!(r, MemoryRecord::Decision { .. }))
    }

    /// Most similar preferences
    pub fn search_preferences(&self, query: &str, n: usize) -> Vec<SearchHit> {
        self.search_kind(query, n, |r| matches!(r, MemoryRecord::Preference { .. }))
    }

    /// Most similar constraints
    pub fn search_constraints(&self, query: &str, n: usize) -> Vec<SearchHit> {
        self.search_kind(query, n, |r| matches!(r, MemoryRecord::Constraint { .. }))
    }

    /// Latest decisions, newest first
    pub fn recent_decisions(&self, n: usize) -> Vec<&StoredRecord> {
        let mut decisions: Vec<&StoredRecord> = self
            .records
            .iter()
            .filter(|r| matches!(r.record, MemoryRecord::Decision { .. }))
            .collect();
        decisions.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        decisions.truncate(n);
        decisions
    }

    /// Every stored constraint
    pub fn constraints(&self) -> Vec<&MemoryRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.record, MemoryRecord::Constraint { .. }))
            .map(|r| &r.record)
            .collect()
    }

    /// Remove the collection file (project deletion)
    pub fn delete(self) -> Result<(), MemoryError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|source| MemoryError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        info!(project_id = %self.project_id, "Deleted memory collection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(dir: &Path) -> ProjectMemory {
        ProjectMemory::open(ProjectId::from("mem-test"), dir).unwrap()
    }

    #[test]
    fn test_store_and_search_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut mem = memory(dir.path());

        mem.store_code("backend/main.py", "def list_todos(): return TODOS", "python")
            .unwrap();
        mem.store_code("frontend/src/App.jsx", "export default function App() {}", "javascript")
            .unwrap();

        let hits = mem.search_code("todo list endpoint", 5, None);
        assert_eq!(hits.len(), 2);
        assert!(matches!(hits[0].record, MemoryRecord::Code { .. }));

        let python_only = mem.search_code("todos", 5, Some("python"));
        assert_eq!(python_only.len(), 1);
    }

    #[test]
    fn test_identical_content_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let mut mem = memory(dir.path());

        mem.store_decision("Use FastAPI", "Best async support").unwrap();
        mem.store_decision("Use FastAPI", "Best async support").unwrap();
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn test_persistence_across_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut mem = memory(dir.path());
            mem.store_preference("frontend", "styling", "tailwind").unwrap();
        }

        let mem = memory(dir.path());
        assert_eq!(mem.len(), 1);
        let hits = mem.search_preferences("styling", 5);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_recent_decisions_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut mem = memory(dir.path());

        mem.store_decision("First", "a").unwrap();
        mem.store_decision("Second", "b").unwrap();

        let recent = mem.recent_decisions(10);
        assert_eq!(recent.len(), 2);
        match &recent[0].record {
            MemoryRecord::Decision { title, .. } => assert_eq!(title, "Second"),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut mem = memory(dir.path());
        mem.store_constraint("No external databases", ConstraintSeverity::Must)
            .unwrap();

        let path = dir.path().join("mem-test.json");
        assert!(path.exists());

        mem.delete().unwrap();
        assert!(!path.exists());
    }
}
