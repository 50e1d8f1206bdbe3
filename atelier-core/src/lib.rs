//! Atelier Core - Foundation crate for the Atelier generation engine
//!
//! Shared functionality used across all Atelier modules:
//!
//! - [`config`] — Strongly-typed configuration with TOML and environment variable support
//! - [`domain`] — Shared identifiers and value objects
//! - [`logging`] — Structured logging with tracing
//!
//! # Configuration
//!
//! ```rust,ignore
//! use atelier_core::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `ATELIER__` prefix with double underscore
//! separators:
//!
//! ```bash
//! ATELIER__PREVIEW__PORT_RANGE_START=8100
//! ATELIER__LLM__GEMINI_API_KEY=...
//! ```

pub mod config;
pub mod domain;
pub mod logging;

pub use config::Config;
pub use domain::ProjectId;
pub use logging::init_tracing;
