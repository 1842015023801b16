use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub type DiffResult<T> = std::result::Result<T, DiffError>;

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("diff backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("git exited with status {status}: {stderr}")]
    Git { status: i32, stderr: String },

    #[error("unknown snapshot reference: {0}")]
    UnknownSnapshot(String),

    #[error("{0}")]
    Other(String),
}

/// How the diff backend classified a file change. Unlike
/// [`crate::ChangeType`], renames are preserved here so the provider can
/// match path signals against both names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// One changed file between a snapshot and the current working tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDiff {
    /// Path after the change (the new name for renames).
    pub path: String,
    /// Pre-rename path, present only for renames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub kind: DiffKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// Versioned-snapshot diff service consumed by the diff evidence provider.
///
/// Implementations live outside the core (a git subprocess wrapper ships in
/// `evidence-diff`); the provider treats every error as "no evidence".
#[async_trait]
pub trait SnapshotDiff: Send + Sync {
    /// Full structured diff of the working tree against `snapshot`.
    async fn diff_full(&self, snapshot: &str) -> DiffResult<Vec<FileDiff>>;

    /// Cheap probe used for availability checks; returns the raw patch text.
    async fn patch(&self, snapshot: &str) -> DiffResult<String>;
}
