use crate::path_filters::normalize_rel_path;
use serde::{Deserialize, Serialize};

/// Kind of fact a [`Signal`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// A file path mentioned in the conversation or the environment.
    Path,
    /// A symbol (function/type/method) name.
    Symbol,
    /// A token lifted from an error message or stack trace.
    ErrorToken,
}

/// A typed fact extracted once per retrieval cycle.
///
/// Signals are immutable after construction and shared by reference across
/// concurrent provider queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub value: String,
    /// Provenance tag, e.g. `"conversation"` or `"stack_trace"`.
    pub source: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Signal {
    pub fn new(
        kind: SignalKind,
        value: impl Into<String>,
        source: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            source: source.into(),
            confidence,
            metadata: None,
        }
    }

    pub fn path(value: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(SignalKind::Path, value, source, 1.0)
    }

    pub fn symbol(value: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(SignalKind::Symbol, value, source, 1.0)
    }

    pub fn error_token(value: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(SignalKind::ErrorToken, value, source, 1.0)
    }

    /// Whether this path signal matches `path`.
    ///
    /// `path` must already be slash-normalized and lowercased (see
    /// [`normalize_rel_path`]). A match is an exact path, a `/<value>` suffix,
    /// or a substring hit anywhere in the path. Non-path signals never match.
    #[must_use]
    pub fn matches_path(&self, path: &str) -> bool {
        if self.kind != SignalKind::Path {
            return false;
        }
        let needle = normalize_rel_path(&self.value);
        if needle.is_empty() {
            return false;
        }
        path == needle || path.ends_with(&format!("/{needle}")) || path.contains(&needle)
    }

    /// Whether this signal matches file `content`.
    ///
    /// Symbols require a word-boundary hit (case-sensitive, identifiers are);
    /// error tokens match as a case-insensitive substring. Path signals never
    /// match content.
    #[must_use]
    pub fn matches_content(&self, content: &str) -> bool {
        match self.kind {
            SignalKind::Path => false,
            SignalKind::Symbol => contains_word(content, self.value.trim()),
            SignalKind::ErrorToken => {
                let needle = self.value.trim().to_lowercase();
                !needle.is_empty() && content.to_lowercase().contains(&needle)
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Substring search where the hit must not be flanked by identifier
/// characters, so `ms` does not match inside `streams`.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_word_char(c));
        let after_ok = haystack[end..].chars().next().is_none_or(|c| !is_word_char(c));
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_signal_matches_suffix_and_substring() {
        let signal = Signal::path("auth.ts", "conversation");
        assert!(signal.matches_path("src/auth.ts"));
        assert!(signal.matches_path("auth.ts"));
        assert!(!signal.matches_path("src/login.ts"));

        let nested = Signal::path("api/handlers.rs", "conversation");
        assert!(nested.matches_path("crates/server/src/api/handlers.rs"));
    }

    #[test]
    fn path_signal_is_case_insensitive() {
        let signal = Signal::path("Auth.TS", "conversation");
        assert!(signal.matches_path("src/auth.ts"));
    }

    #[test]
    fn symbol_signal_requires_word_boundary() {
        let signal = Signal::symbol("parse", "conversation");
        assert!(signal.matches_content("fn parse(input: &str) {}"));
        assert!(signal.matches_content("call parse()"));
        assert!(!signal.matches_content("fn reparse_all() {}"));
        assert!(!signal.matches_content("let parser = Parser::new();"));
    }

    #[test]
    fn error_token_signal_matches_substring_case_insensitive() {
        let signal = Signal::error_token("TypeError", "stack_trace");
        assert!(signal.matches_content("caught typeerror: x is undefined"));
        assert!(signal.matches_content("TypeErrorHandler::install()"));
        assert!(!signal.matches_content("no errors here"));
    }

    #[test]
    fn path_signal_never_matches_content() {
        let signal = Signal::path("auth.ts", "conversation");
        assert!(!signal.matches_content("auth.ts is mentioned here"));
    }
}
