//! Memory domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How binding a constraint is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintSeverity {
    Must,
    Should,
    Prefer,
}

/// A memory record kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryRecord {
    Code {
        filepath: String,
        language: String,
        snippet: String,
    },
    Decision {
        title: String,
        reasoning: String,
        timestamp: DateTime<Utc>,
    },
    Preference {
        category: String,
        key: String,
        value: String,
    },
    Constraint {
        description: String,
        severity: ConstraintSeverity,
    },
}

impl MemoryRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryRecord::Code { .. } => "code",
            MemoryRecord::Decision { .. } => "decision",
            MemoryRecord::Preference { .. } => "preference",
            MemoryRecord::Constraint { .. } => "constraint",
        }
    }

    /// Short text representation fed to the embedding encoder
    pub fn embedding_text(&self) -> String {
        const SNIPPET_CAP: usize = 2048;

        match self {
            MemoryRecord::Code {
                filepath,
                language,
                snippet,
            } => {
                let head = if snippet.len() > SNIPPET_CAP {
                    let end = (0..=SNIPPET_CAP)
                        .rev()
                        .find(|i| snippet.is_char_boundary(*i))
                        .unwrap_or(0);
                    &snippet[..end]
                } else {
                    snippet.as_str()
                };
                format!("{} :: {} :: {}", filepath, language, head)
            }
            MemoryRecord::Decision {
                title, reasoning, ..
            } => format!("{}\n{}", title, reasoning),
            MemoryRecord::Preference {
                category,
                key,
                value,
            } => format!("{}: {} = {}", category, key, value),
            MemoryRecord::Constraint { description, .. } => description.clone(),
        }
    }
}

/// A stored record with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Content-hash id; identical content dedupes
    pub id: String,
    pub record: MemoryRecord,
    pub embedding: Vec<f32>,
    pub stored_at: DateTime<Utc>,
}

/// A search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: MemoryRecord,
    /// Cosine similarity against the query
    pub score: f32,
    pub stored_at: DateTime<Utc>,
}

/// Memory operation error
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Collection serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_embedding_text_caps_snippet() {
        let record = MemoryRecord::Code {
            filepath: "backend/main.py".to_string(),
            language: "python".to_string(),
            snippet: "x".repeat(10_000),
        };
        let text = record.embedding_text();
        assert!(text.len() < 2200);
        assert!(text.starts_with("backend/main.py :: python :: "));
    }

    #[test]
    fn test_kind_tags() {
        let record = MemoryRecord::Preference {
            category: "frontend".to_string(),
            key: "styling".to_string(),
            value: "tailwind".to_string(),
        };
        assert_eq!(record.kind(), "preference");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "preference");
    }
}
