use async_trait::async_trait;
use evidence_protocol::{DiffError, DiffKind, DiffResult, FileDiff, SnapshotDiff};
use std::path::PathBuf;
use tokio::time::{timeout, Duration};

// Diff retrieval must stay cheap and bounded: large repos can make git slow,
// and unbounded file reads would blow the caller's token budget anyway.
const GIT_DIFF_TIMEOUT: Duration = Duration::from_millis(2_000);
const GIT_SHOW_TIMEOUT: Duration = Duration::from_millis(1_000);
const DEFAULT_MAX_FILES: usize = 200;
const DEFAULT_MAX_FILE_BYTES: usize = 256 * 1024;

/// [`SnapshotDiff`] backed by the `git` binary, diffing the working tree
/// against a snapshot (commit hash, ref, or tree-ish).
pub struct GitSnapshotDiff {
    repo_root: PathBuf,
    max_files: usize,
    max_file_bytes: usize,
}

impl GitSnapshotDiff {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, max_files: usize, max_file_bytes: usize) -> Self {
        self.max_files = max_files;
        self.max_file_bytes = max_file_bytes;
        self
    }

    async fn run_git(&self, args: &[&str], deadline: Duration) -> DiffResult<Vec<u8>> {
        let output = timeout(
            deadline,
            tokio::process::Command::new("git")
                .arg("-C")
                .arg(&self.repo_root)
                .args(args)
                .output(),
        )
        .await
        .map_err(|_| DiffError::Timeout(deadline))??;

        if !output.status.success() {
            return Err(DiffError::Git {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn accept_bytes(&self, bytes: &[u8]) -> bool {
        // NUL bytes mean binary content; skip rather than feed garbage to
        // token estimation.
        bytes.len() <= self.max_file_bytes && !bytes.contains(&0)
    }

    async fn read_worktree_file(&self, rel_path: &str) -> Option<String> {
        let path = self.repo_root.join(rel_path);
        let bytes = tokio::fs::read(&path).await.ok()?;
        self.accept_bytes(&bytes)
            .then(|| String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn read_snapshot_file(&self, snapshot: &str, rel_path: &str) -> Option<String> {
        let spec = format!("{snapshot}:{rel_path}");
        let bytes = self
            .run_git(&["show", spec.as_str()], GIT_SHOW_TIMEOUT)
            .await
            .ok()?;
        self.accept_bytes(&bytes)
            .then(|| String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn validate_snapshot(snapshot: &str) -> DiffResult<&str> {
    let snapshot = snapshot.trim();
    if snapshot.is_empty() {
        return Err(DiffError::UnknownSnapshot("<empty>".to_string()));
    }
    Ok(snapshot)
}

struct NameStatusEntry {
    status: u8,
    path: String,
    old_path: Option<String>,
}

/// Parse `git diff --name-status -z` output. Rename/copy records carry two
/// paths: `R100\0old\0new\0`.
fn parse_name_status(raw: &[u8]) -> Vec<NameStatusEntry> {
    let tokens: Vec<&[u8]> = raw.split(|b| *b == 0).filter(|t| !t.is_empty()).collect();
    let mut entries = Vec::new();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let Some(&status) = tokens[idx].first() else {
            idx += 1;
            continue;
        };
        idx += 1;
        if idx >= tokens.len() {
            break;
        }
        let path1 = String::from_utf8_lossy(tokens[idx]).into_owned();
        idx += 1;

        if status == b'R' || status == b'C' {
            if idx >= tokens.len() {
                break;
            }
            let path2 = String::from_utf8_lossy(tokens[idx]).into_owned();
            idx += 1;
            entries.push(NameStatusEntry {
                status,
                path: path2,
                old_path: Some(path1),
            });
        } else {
            entries.push(NameStatusEntry {
                status,
                path: path1,
                old_path: None,
            });
        }
    }
    entries
}

#[async_trait]
impl SnapshotDiff for GitSnapshotDiff {
    async fn diff_full(&self, snapshot: &str) -> DiffResult<Vec<FileDiff>> {
        let snapshot = validate_snapshot(snapshot)?;
        let raw = self
            .run_git(&["diff", "--name-status", "-z", snapshot], GIT_DIFF_TIMEOUT)
            .await?;
        let entries = parse_name_status(&raw);
        if entries.len() > self.max_files {
            log::warn!(
                "diff against {snapshot} touches {} files, keeping first {}",
                entries.len(),
                self.max_files
            );
        }

        let mut diffs = Vec::new();
        for entry in entries.into_iter().take(self.max_files) {
            let diff = match entry.status {
                b'A' | b'C' => FileDiff {
                    after: self.read_worktree_file(&entry.path).await,
                    path: entry.path,
                    old_path: None,
                    kind: DiffKind::Added,
                    before: None,
                },
                b'D' => FileDiff {
                    before: self.read_snapshot_file(snapshot, &entry.path).await,
                    path: entry.path,
                    old_path: None,
                    kind: DiffKind::Deleted,
                    after: None,
                },
                b'R' => FileDiff {
                    before: match entry.old_path.as_deref() {
                        Some(old) => self.read_snapshot_file(snapshot, old).await,
                        None => None,
                    },
                    after: self.read_worktree_file(&entry.path).await,
                    path: entry.path,
                    old_path: entry.old_path,
                    kind: DiffKind::Renamed,
                },
                // M plus the rarer statuses (T type change, U unmerged) all
                // reduce to "content differs".
                _ => FileDiff {
                    before: self.read_snapshot_file(snapshot, &entry.path).await,
                    after: self.read_worktree_file(&entry.path).await,
                    path: entry.path,
                    old_path: None,
                    kind: DiffKind::Modified,
                },
            };
            diffs.push(diff);
        }
        Ok(diffs)
    }

    async fn patch(&self, snapshot: &str) -> DiffResult<String> {
        let snapshot = validate_snapshot(snapshot)?;
        let raw = self.run_git(&["diff", snapshot], GIT_DIFF_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::parse_name_status;

    #[test]
    fn parses_plain_statuses() {
        let raw = b"M\0src/a.rs\0A\0src/b.rs\0D\0src/c.rs\0";
        let entries = parse_name_status(raw);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].status, b'M');
        assert_eq!(entries[0].path, "src/a.rs");
        assert!(entries[0].old_path.is_none());
    }

    #[test]
    fn parses_rename_records_with_both_paths() {
        let raw = b"R100\0src/old.rs\0src/new.rs\0M\0src/x.rs\0";
        let entries = parse_name_status(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, b'R');
        assert_eq!(entries[0].path, "src/new.rs");
        assert_eq!(entries[0].old_path.as_deref(), Some("src/old.rs"));
        assert_eq!(entries[1].path, "src/x.rs");
    }

    #[test]
    fn truncated_output_does_not_panic() {
        let raw = b"R100\0src/old.rs\0";
        let entries = parse_name_status(raw);
        assert!(entries.is_empty());
    }
}
