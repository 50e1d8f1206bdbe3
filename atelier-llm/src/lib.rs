pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::parser::ResponseParser;
pub use infrastructure::providers::{providers_from_config, GeminiProvider, OpenAiCompatProvider};
pub use infrastructure::router::{ModelRouter, ProviderStats, RouterStats, TaskType};
