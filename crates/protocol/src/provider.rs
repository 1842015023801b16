use crate::evidence::Evidence;
use crate::options::QueryOptions;
use crate::signal::Signal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of evidence source types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Diff,
    Lsp,
    Search,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Diff, ProviderKind::Lsp, ProviderKind::Search];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Diff => "diff",
            ProviderKind::Lsp => "lsp",
            ProviderKind::Search => "search",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evidence source (diff, lsp, or search).
///
/// Providers are queried concurrently and must degrade instead of failing:
/// both `is_available` and `query` swallow backend errors, returning `false`
/// or an empty list. Implementations are stateless apart from narrow,
/// provider-local pointers (e.g. the diff provider's snapshot reference).
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &str;

    /// Static trust score stamped onto every evidence record this provider
    /// emits; recent-edit sources rank highest.
    fn base_weight(&self) -> f32;

    /// Lightweight probe of the backing service. Never errors.
    async fn is_available(&self) -> bool;

    /// Fetch evidence matching `signals`, bounded by `options`. An empty
    /// signal list means "no filter" (every candidate is eligible). Never
    /// errors; failures degrade to an empty result.
    async fn query(&self, signals: &[Signal], options: &QueryOptions) -> Vec<Evidence>;
}
