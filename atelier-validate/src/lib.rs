//! Atelier Validate - parallel static checks over generated file sets
//!
//! A plugin registry of [`Validator`]s runs applicable checks concurrently
//! with per-validator timeouts and merges their findings into one
//! deterministic report. Bundled validators (Python/JS syntax, JSON
//! structure) need no external tooling; the rest activate only when their
//! binary is on PATH. A pytest-based [`TestRunner`] adjunct executes
//! generated test files in an isolated directory.

pub mod domain;
pub mod pipeline;
pub mod test_runner;
pub mod validators;

pub use domain::{
    PipelineReport, Severity, TestRunResult, ValidationIssue, ValidationResult,
};
pub use pipeline::ValidationPipeline;
pub use test_runner::TestRunner;
pub use validators::Validator;
