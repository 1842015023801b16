use globset::{GlobBuilder, GlobMatcher};

/// Normalize a repo-relative path for matching: forward slashes, lowercase,
/// no leading `./` or surrounding slashes.
#[must_use]
pub fn normalize_rel_path(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/").to_lowercase();
    while let Some(stripped) = value.strip_prefix("./") {
        value = stripped.to_string();
    }
    value.trim_matches('/').to_string()
}

/// Compiled include/exclude filter for candidate file paths.
///
/// Patterns match against normalized paths (see [`normalize_rel_path`]), so
/// matching is case-insensitive. A pattern containing `*` is a glob whose `*`
/// spans path separators; anything else matches as a plain substring anywhere
/// in the path. Excludes win over includes.
#[derive(Debug, Default)]
pub struct PathFilter {
    include: Vec<PatternMatcher>,
    exclude: Vec<PatternMatcher>,
}

#[derive(Debug)]
enum PatternMatcher {
    Substring(String),
    Glob(GlobMatcher),
}

impl PatternMatcher {
    fn compile(raw: &str) -> Option<Self> {
        let normalized = normalize_rel_path(raw);
        if normalized.is_empty() {
            return None;
        }
        if normalized.contains('*') {
            let glob = GlobBuilder::new(&normalized).build().ok()?;
            return Some(Self::Glob(glob.compile_matcher()));
        }
        Some(Self::Substring(normalized))
    }

    fn is_match(&self, normalized_path: &str) -> bool {
        match self {
            Self::Substring(needle) => normalized_path.contains(needle.as_str()),
            Self::Glob(glob) => glob.is_match(normalized_path),
        }
    }
}

impl PathFilter {
    #[must_use]
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: include
                .iter()
                .filter_map(|p| PatternMatcher::compile(p))
                .collect(),
            exclude: exclude
                .iter()
                .filter_map(|p| PatternMatcher::compile(p))
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Whether `path` survives the filter. `path` is normalized internally.
    #[must_use]
    pub fn allows(&self, path: &str) -> bool {
        let path = normalize_rel_path(path);
        if !self.include.is_empty() && !self.include.iter().any(|m| m.is_match(&path)) {
            return false;
        }
        !self.exclude.iter().any(|m| m.is_match(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[&str], exclude: &[&str]) -> PathFilter {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        PathFilter::new(&include, &exclude)
    }

    #[test]
    fn substring_patterns_match_anywhere() {
        let f = filter(&["auth"], &[]);
        assert!(f.allows("src/auth/mod.rs"));
        assert!(f.allows("src/oauth_client.rs"));
        assert!(!f.allows("src/billing.rs"));
    }

    #[test]
    fn star_spans_path_separators() {
        let f = filter(&["src/*.ts"], &[]);
        assert!(f.allows("src/auth.ts"));
        assert!(f.allows("src/api/handlers.ts"));
        assert!(!f.allows("lib/auth.ts"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let f = filter(&["SRC/*.TS"], &[]);
        assert!(f.allows("src/Auth.ts"));
    }

    #[test]
    fn excludes_win_over_includes() {
        let f = filter(&["src"], &["*.test.*"]);
        assert!(f.allows("src/auth.ts"));
        assert!(!f.allows("src/auth.test.ts"));
    }

    #[test]
    fn empty_patterns_are_ignored() {
        let f = filter(&["", "  ", "./"], &[""]);
        assert!(f.is_empty());
        assert!(f.allows("anything/at/all.rs"));
    }

    #[test]
    fn backslash_paths_are_normalized() {
        let f = filter(&["src/auth"], &[]);
        assert!(f.allows("src\\auth\\mod.rs"));
    }
}
