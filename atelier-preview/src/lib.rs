//! Atelier Preview - ephemeral container sandbox with live reload
//!
//! A preview is a short-lived Docker container serving the current state of
//! a project: detected by file signature, built from a synthesized
//! Dockerfile, bound to a host port from a configured range, capped on
//! memory and CPU, and reaped after a hard expiry or an idle window. The
//! [`WatcherRegistry`] turns VFS commits into rebuilds and broadcast reload
//! events.
//!
//! Docker is driven through the `docker` CLI; when the daemon is absent the
//! whole subsystem reports unavailable and callers surface that upstream.

pub mod docker;
pub mod domain;
pub mod manager;
pub mod ports;
pub mod watcher;

pub use domain::{PreviewError, PreviewStatus, PreviewSummary, ProjectType};
pub use manager::PreviewManager;
pub use watcher::{Rebuilder, ReloadEvent, WatcherRegistry};
