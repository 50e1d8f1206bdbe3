pub mod edit;
pub mod generate;

pub use generate::Orchestrator;
