//! Atelier VFS - in-memory versioned file tree
//!
//! Every generated project lives in a [`VirtualFileSystem`]: a working tree
//! of [`FileNode`]s plus an append-only list of immutable [`Commit`]
//! snapshots with git-like rollback, branching, and diffing. State is
//! in-memory; optional JSON snapshots survive process restarts with stable
//! commit ids.
//!
//! The [`VfsRegistry`] is the single supervised owner of per-project
//! instances; holding a project's mutex across `write_file` and `commit` is
//! the advisory lock that totally orders commits.

pub mod domain;
pub mod registry;
pub mod snapshot;
pub mod vfs;

pub use domain::{Commit, DiffEntry, FileNode, FileStatus, HistoryEntry, VfsError, VfsStatus};
pub use registry::VfsRegistry;
pub use snapshot::VfsSnapshot;
pub use vfs::VirtualFileSystem;
