//! The project manifest: the authoritative plan for one generation
//!
//! The Core agent produces a manifest; validation rejects, never coerces.
//! Invalid plans fall back to [`ProjectManifest::fallback`], which covers
//! the required file set and keeps the pipeline moving.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use atelier_llm::{ResponseParser, TaskType};

/// Files every accepted manifest must plan for
pub const REQUIRED_FILES: &[&str] = &[
    "backend/main.py",
    "backend/requirements.txt",
    "frontend/src/App.jsx",
    "frontend/package.json",
    "frontend/index.html",
    "frontend/vite.config.js",
    "frontend/src/main.jsx",
];

/// Closed set of supported application shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Crud,
    Ecommerce,
    Dashboard,
    Social,
    Todo,
    Blog,
    Auth,
    Booking,
    Api,
}

impl AppType {
    /// Infer an app type from free-text description keywords
    pub fn infer(description: &str) -> Self {
        let text = description.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));

        if mentions(&["todo", "task list", "checklist"]) {
            AppType::Todo
        } else if mentions(&["blog", "article", "post"]) {
            AppType::Blog
        } else if mentions(&["shop", "store", "cart", "ecommerce", "product"]) {
            AppType::Ecommerce
        } else if mentions(&["dashboard", "analytics", "chart", "metric"]) {
            AppType::Dashboard
        } else if mentions(&["social", "chat", "follow", "friend", "feed"]) {
            AppType::Social
        } else if mentions(&["booking", "reservation", "appointment", "schedule"]) {
            AppType::Booking
        } else if mentions(&["login", "signup", "auth"]) {
            AppType::Auth
        } else if mentions(&["api only", "rest api", "json api"]) {
            AppType::Api
        } else {
            AppType::Crud
        }
    }
}

/// Agent roles a manifest can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentRole {
    Core,
    Arch,
    Backend,
    Uix,
    Debug,
    Quality,
    Test,
    Edit,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Core => "CORE",
            AgentRole::Arch => "ARCH",
            AgentRole::Backend => "BACKEND",
            AgentRole::Uix => "UIX",
            AgentRole::Debug => "DEBUG",
            AgentRole::Quality => "QUALITY",
            AgentRole::Test => "TEST",
            AgentRole::Edit => "EDIT",
        }
    }

    /// The task type the router is asked for when this agent runs
    pub fn task(&self) -> TaskType {
        match self {
            AgentRole::Core | AgentRole::Arch => TaskType::Reasoning,
            AgentRole::Uix => TaskType::UiText,
            _ => TaskType::Code,
        }
    }
}

/// Chosen technology per concern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechStack {
    pub backend: String,
    pub frontend: String,
    pub styling: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl Default for TechStack {
    fn default() -> Self {
        Self {
            backend: "fastapi".to_string(),
            frontend: "react".to_string(),
            styling: "css".to_string(),
            database: None,
            auth: None,
        }
    }
}

/// A planned data model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataModel {
    pub name: String,
    /// field name -> type description
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// A planned API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// A file the pipeline will generate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSpec {
    pub path: String,
    #[serde(default)]
    pub purpose: String,
}

/// The authoritative generation plan, immutable once accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub analysis: String,
    pub app_type: AppType,
    pub features: Vec<String>,
    #[serde(default)]
    pub tech_stack: TechStack,
    #[serde(default)]
    pub models: Vec<DataModel>,
    #[serde(default)]
    pub endpoints: Vec<ApiEndpoint>,
    pub files_to_generate: Vec<FileSpec>,
    #[serde(default)]
    pub integrations: Vec<String>,
    #[serde(default)]
    pub agents_needed: Vec<AgentRole>,
    #[serde(default)]
    pub priority: String,
}

/// Outcome of parsing an LLM reply into a manifest
#[derive(Debug)]
pub enum ManifestParse {
    Ok(Box<ProjectManifest>),
    /// No JSON surfaced; a second attempt may succeed
    Retry(String),
    /// JSON surfaced but violates the schema; do not coerce
    Invalid(String),
}

impl ProjectManifest {
    /// Validate the schema invariants. Rejects, never repairs.
    pub fn validate(&self) -> Result<(), String> {
        if self.features.is_empty() {
            return Err("features must be non-empty".to_string());
        }

        for model in &self.models {
            if !model.name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
                return Err(format!("model name must start uppercase: {}", model.name));
            }
        }

        for endpoint in &self.endpoints {
            if !endpoint.path.starts_with('/') {
                return Err(format!("endpoint path must start with '/': {}", endpoint.path));
            }
        }

        for required in REQUIRED_FILES {
            if !self.files_to_generate.iter().any(|f| f.path == *required) {
                return Err(format!("files_to_generate missing required file: {}", required));
            }
        }

        Ok(())
    }

    /// Parse an LLM reply into a validated manifest
    pub fn parse_response(response: &str) -> ManifestParse {
        let value: serde_json::Value = match ResponseParser::parse_json(response) {
            Ok(value) => value,
            Err(e) => return ManifestParse::Retry(e.to_string()),
        };

        let manifest: ProjectManifest = match serde_json::from_value(value) {
            Ok(manifest) => manifest,
            Err(e) => return ManifestParse::Invalid(e.to_string()),
        };

        match manifest.validate() {
            Ok(()) => ManifestParse::Ok(Box::new(manifest)),
            Err(e) => ManifestParse::Invalid(e),
        }
    }

    /// The default manifest used when the Core agent cannot produce a valid
    /// plan. Keyed by project name and raw description.
    pub fn fallback(project_name: &str, description: &str) -> Self {
        let app_type = AppType::infer(description);

        let features = match app_type {
            AppType::Todo => vec![
                "Add todo items".to_string(),
                "Mark todos as complete".to_string(),
                "Delete todos".to_string(),
                "Filter todos by status".to_string(),
            ],
            _ => vec![
                "Create and list items".to_string(),
                "Update and delete items".to_string(),
                "Responsive single-page UI".to_string(),
                "Health check endpoint".to_string(),
            ],
        };

        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), "int".to_string());
        fields.insert("title".to_string(), "str".to_string());
        fields.insert("description".to_string(), "Optional[str]".to_string());
        fields.insert("created_at".to_string(), "datetime".to_string());

        let endpoints = vec![
            ApiEndpoint {
                path: "/items".to_string(),
                method: "GET".to_string(),
                description: "List all items".to_string(),
                request: None,
                response: Some("List[Item]".to_string()),
            },
            ApiEndpoint {
                path: "/items".to_string(),
                method: "POST".to_string(),
                description: "Create an item".to_string(),
                request: Some("ItemCreate".to_string()),
                response: Some("Item".to_string()),
            },
            ApiEndpoint {
                path: "/items/{item_id}".to_string(),
                method: "DELETE".to_string(),
                description: "Delete an item".to_string(),
                request: None,
                response: None,
            },
            ApiEndpoint {
                path: "/health".to_string(),
                method: "GET".to_string(),
                description: "Health check".to_string(),
                request: None,
                response: None,
            },
        ];

        let files_to_generate = REQUIRED_FILES
            .iter()
            .map(|path| FileSpec {
                path: path.to_string(),
                purpose: String::new(),
            })
            .collect();

        Self {
            analysis: format!("{}: {}", project_name, description),
            app_type,
            features,
            tech_stack: TechStack::default(),
            models: vec![DataModel {
                name: "Item".to_string(),
                fields,
            }],
            endpoints,
            files_to_generate,
            integrations: Vec::new(),
            agents_needed: vec![
                AgentRole::Arch,
                AgentRole::Backend,
                AgentRole::Uix,
                AgentRole::Test,
                AgentRole::Quality,
            ],
            priority: "Working CRUD flow end to end".to_string(),
        }
    }
}
