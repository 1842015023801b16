//! Shared data model for the evidence retrieval engine: signals, evidence
//! records, the provider contract, the snapshot-diff service interface, and
//! the token-budget rule every provider applies.

mod budget;
mod diff;
mod evidence;
mod options;
mod path_filters;
mod provider;
mod signal;

pub use budget::trim_to_budget;
pub use diff::{DiffError, DiffKind, DiffResult, FileDiff, SnapshotDiff};
pub use evidence::{estimate_tokens, ChangeType, Evidence, EvidenceMetadata};
pub use options::QueryOptions;
pub use path_filters::{normalize_rel_path, PathFilter};
pub use provider::{EvidenceProvider, ProviderKind};
pub use signal::{Signal, SignalKind};
