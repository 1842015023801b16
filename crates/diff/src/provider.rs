use async_trait::async_trait;
use evidence_protocol::{
    estimate_tokens, normalize_rel_path, trim_to_budget, ChangeType, DiffKind, Evidence,
    EvidenceMetadata, EvidenceProvider, FileDiff, PathFilter, ProviderKind, QueryOptions, Signal,
    SignalKind, SnapshotDiff,
};
use std::sync::{Arc, RwLock};

/// Recent edits are the most trustworthy context source, so the diff provider
/// carries the highest static weight.
pub const DIFF_BASE_WEIGHT: f32 = 100.0;

/// Evidence provider over a versioned-snapshot diff service.
///
/// The only mutable state is the snapshot reference all queries diff against;
/// it is a last-writer-wins pointer safe to update while queries are in
/// flight. Every failure path degrades to an empty result.
pub struct DiffEvidenceProvider {
    backend: Arc<dyn SnapshotDiff>,
    snapshot: RwLock<Option<String>>,
}

impl DiffEvidenceProvider {
    pub fn new(backend: Arc<dyn SnapshotDiff>) -> Self {
        Self {
            backend,
            snapshot: RwLock::new(None),
        }
    }

    pub fn with_snapshot(backend: Arc<dyn SnapshotDiff>, snapshot: impl Into<String>) -> Self {
        let provider = Self::new(backend);
        provider.set_snapshot_hash(snapshot);
        provider
    }

    /// Update the reference point all future queries diff against. The hash
    /// is not validated here; `is_available` is the validation path.
    pub fn set_snapshot_hash(&self, snapshot: impl Into<String>) {
        let value = Some(snapshot.into());
        match self.snapshot.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    #[must_use]
    pub fn snapshot_hash(&self) -> Option<String> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn evidence_for_file(&self, file: FileDiff, signals: &[Signal]) -> Option<Evidence> {
        let content = match file.kind {
            DiffKind::Deleted => file.before.as_deref(),
            _ => file.after.as_deref().or(file.before.as_deref()),
        }
        .unwrap_or("");

        let normalized_path = normalize_rel_path(&file.path);
        let normalized_old = file.old_path.as_deref().map(normalize_rel_path);

        let matched: Vec<Signal> = signals
            .iter()
            .filter(|signal| match signal.kind {
                SignalKind::Path => {
                    signal.matches_path(&normalized_path)
                        || normalized_old
                            .as_deref()
                            .is_some_and(|old| signal.matches_path(old))
                }
                SignalKind::Symbol | SignalKind::ErrorToken => signal.matches_content(content),
            })
            .cloned()
            .collect();

        // Signals are an optional filter: with none supplied every changed
        // file qualifies; with any supplied, at least one must match.
        if !signals.is_empty() && matched.is_empty() {
            return None;
        }

        let line_count = content.lines().count().max(1) as u32;
        let matched_signals = if matched.is_empty() {
            signals.to_vec()
        } else {
            matched
        };

        Some(Evidence {
            id: format!("diff:{}", file.path),
            provider: ProviderKind::Diff,
            path: file.path,
            range: (1, line_count),
            tokens: estimate_tokens(content),
            base_score: DIFF_BASE_WEIGHT,
            matched_signals,
            metadata: EvidenceMetadata {
                change_type: Some(match file.kind {
                    DiffKind::Added => ChangeType::Added,
                    DiffKind::Deleted => ChangeType::Deleted,
                    DiffKind::Modified | DiffKind::Renamed => ChangeType::Modified,
                }),
                ..EvidenceMetadata::default()
            },
            content: content.to_string(),
        })
    }
}

#[async_trait]
impl EvidenceProvider for DiffEvidenceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Diff
    }

    fn name(&self) -> &str {
        "diff"
    }

    fn base_weight(&self) -> f32 {
        DIFF_BASE_WEIGHT
    }

    async fn is_available(&self) -> bool {
        let Some(snapshot) = self.snapshot_hash() else {
            return false;
        };
        match self.backend.patch(&snapshot).await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("diff backend probe failed for {snapshot}: {e}");
                false
            }
        }
    }

    async fn query(&self, signals: &[Signal], options: &QueryOptions) -> Vec<Evidence> {
        let Some(snapshot) = self.snapshot_hash() else {
            log::debug!("diff provider queried without a snapshot reference");
            return Vec::new();
        };

        let files = match self.backend.diff_full(&snapshot).await {
            Ok(files) => files,
            Err(e) => {
                log::warn!("diff backend failed for {snapshot}: {e}");
                return Vec::new();
            }
        };
        log::debug!("diff against {snapshot}: {} changed files", files.len());

        let filter = PathFilter::new(&options.include_patterns, &options.exclude_patterns);
        let mut results: Vec<Evidence> = files
            .into_iter()
            .filter(|file| filter.allows(&file.path))
            .filter_map(|file| self.evidence_for_file(file, signals))
            .collect();

        if let Some(max_results) = options.max_results {
            results.truncate(max_results);
        }
        if let Some(max_tokens) = options.max_tokens {
            results = trim_to_budget(results, max_tokens);
        }
        results
    }
}
