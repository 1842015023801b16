use crate::provider::ProviderKind;
use crate::signal::Signal;
use serde::{Deserialize, Serialize};

/// How a file changed relative to the reference snapshot. Renames are
/// reported as [`ChangeType::Modified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    /// Call-stack depth for stack-trace-sourced evidence; depth 0 is the
    /// innermost frame. Drives the reranker's exponential decay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_depth: Option<u32>,
    /// Set by LSP-backed providers when the excerpt is a usage site rather
    /// than a definition.
    #[serde(default)]
    pub is_reference: bool,
}

/// A scored, bounded excerpt of code/context eligible for prompt inclusion.
///
/// Created fresh per query cycle; owned by the orchestrator once the provider
/// returns it, never persisted across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub provider: ProviderKind,
    pub path: String,
    /// Inclusive 1-based line range.
    pub range: (u32, u32),
    pub content: String,
    pub tokens: usize,
    /// The emitting provider's static base weight.
    pub base_score: f32,
    pub matched_signals: Vec<Signal>,
    #[serde(default)]
    pub metadata: EvidenceMetadata,
}

/// Rough token estimate: one token per four bytes of content, rounded up.
#[must_use]
pub fn estimate_tokens(content: &str) -> usize {
    content.len().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
