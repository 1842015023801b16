//! In-memory [`SnapshotDiff`] backend for tests.

use async_trait::async_trait;
use evidence_protocol::{DiffError, DiffResult, FileDiff, SnapshotDiff};
use std::collections::HashMap;

/// Serves a fixed file list per known snapshot; unknown snapshots error, and
/// [`StaticDiff::failing`] errors on every call to exercise degradation
/// paths.
#[derive(Debug, Default)]
pub struct StaticDiff {
    snapshots: HashMap<String, Vec<FileDiff>>,
    failing: bool,
}

impl StaticDiff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            snapshots: HashMap::new(),
            failing: true,
        }
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: impl Into<String>, files: Vec<FileDiff>) -> Self {
        self.snapshots.insert(snapshot.into(), files);
        self
    }
}

#[async_trait]
impl SnapshotDiff for StaticDiff {
    async fn diff_full(&self, snapshot: &str) -> DiffResult<Vec<FileDiff>> {
        if self.failing {
            return Err(DiffError::Other("diff backend offline".to_string()));
        }
        self.snapshots
            .get(snapshot)
            .cloned()
            .ok_or_else(|| DiffError::UnknownSnapshot(snapshot.to_string()))
    }

    async fn patch(&self, snapshot: &str) -> DiffResult<String> {
        if self.failing {
            return Err(DiffError::Other("diff backend offline".to_string()));
        }
        if self.snapshots.contains_key(snapshot) {
            Ok(String::new())
        } else {
            Err(DiffError::UnknownSnapshot(snapshot.to_string()))
        }
    }
}
