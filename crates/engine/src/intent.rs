use crate::error::{EngineError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The classified purpose of a task. `Unknown` is both the default and a
/// valid terminal classification, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskIntent {
    Debug,
    Implement,
    Test,
    Refactor,
    Explore,
    Review,
    Unknown,
}

impl TaskIntent {
    /// Classification candidates in tie-break order: the earlier intent wins
    /// an exact confidence tie.
    pub const CANDIDATES: [TaskIntent; 6] = [
        TaskIntent::Debug,
        TaskIntent::Implement,
        TaskIntent::Test,
        TaskIntent::Refactor,
        TaskIntent::Explore,
        TaskIntent::Review,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskIntent::Debug => "debug",
            TaskIntent::Implement => "implement",
            TaskIntent::Test => "test",
            TaskIntent::Refactor => "refactor",
            TaskIntent::Explore => "explore",
            TaskIntent::Review => "review",
            TaskIntent::Unknown => "unknown",
        }
    }

    const fn keywords(self) -> &'static [&'static str] {
        match self {
            TaskIntent::Debug => &[
                "debug", "fix", "bug", "error", "crash", "broken", "fail", "failing", "failure",
                "exception", "panic", "traceback", "stacktrace", "regression", "npe",
            ],
            TaskIntent::Implement => &[
                "implement", "add", "create", "build", "write", "feature", "support", "integrate",
                "introduce", "wire",
            ],
            TaskIntent::Test => &[
                "test", "tests", "testing", "spec", "coverage", "assert", "mock", "fixture",
                "flaky",
            ],
            TaskIntent::Refactor => &[
                "refactor", "cleanup", "simplify", "rename", "restructure", "extract", "dedupe",
                "untangle", "modernize",
            ],
            TaskIntent::Explore => &[
                "explore", "understand", "explain", "how", "what", "where", "why", "overview",
                "architecture", "walkthrough",
            ],
            TaskIntent::Review => &[
                "review", "audit", "verify", "inspect", "critique", "approve", "lgtm",
            ],
            TaskIntent::Unknown => &[],
        }
    }
}

impl fmt::Display for TaskIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Situational flags accompanying the task text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskContext {
    /// An error is visible in the current session (terminal, diagnostics).
    pub error_present: bool,
    /// The active file is a test file.
    pub test_file: bool,
    /// Recently touched files, most recent first.
    pub recent_files: Vec<String>,
}

/// Outcome of one classification call.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: TaskIntent,
    pub confidence: f32,
    /// Matched keyword tokens (lowercase) plus `context:<flag>` labels for
    /// applied situational boosts.
    pub signals: Vec<String>,
    /// Runner-up intent, reported only for ambiguous input.
    pub secondary_intent: Option<TaskIntent>,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            intent: TaskIntent::Unknown,
            confidence: 0.0,
            signals: Vec::new(),
            secondary_intent: None,
        }
    }
}

const DEFAULT_MIN_CONFIDENCE: f32 = 0.2;

// Each situational flag contributes one keyword-point worth of score,
// spread over the text's token count like any other match.
const CONTEXT_BOOST_POINTS: f32 = 1.0;

// Runner-up must reach this share of the winner's score to be reported.
const SECONDARY_INTENT_RATIO: f32 = 0.7;

static TEST_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\.test\.|\.spec\.|_test\.|(^|/)test_|(^|/)tests?/)").expect("valid regex")
});

/// Deterministic, rule-based task-intent classifier.
///
/// Pure and stateless apart from the configured confidence floor: the same
/// input always yields the same output.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    min_confidence: f32,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct IntentScore {
    points: f32,
    matched_tokens: Vec<String>,
}

impl IntentClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_confidence(min_confidence: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&min_confidence) || min_confidence.is_nan() {
            return Err(EngineError::InvalidClassifierConfig(format!(
                "min_confidence must be within [0, 1], got {min_confidence}"
            )));
        }
        Ok(Self { min_confidence })
    }

    /// Classify free text alone.
    #[must_use]
    pub fn classify(&self, text: &str) -> Classification {
        self.classify_with_context(text, &TaskContext::default())
    }

    /// Classify free text plus situational flags. Boosts stack: every applied
    /// flag adds score to its intent and records a `context:<flag>` signal.
    #[must_use]
    pub fn classify_with_context(&self, text: &str, context: &TaskContext) -> Classification {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Classification::unknown();
        }
        let token_count = tokens.len() as f32;

        let mut scores: Vec<(TaskIntent, IntentScore)> = TaskIntent::CANDIDATES
            .iter()
            .map(|&intent| (intent, score_keywords(intent, &tokens)))
            .collect();

        let mut context_signals = Vec::new();
        if context.error_present {
            boost_intent(&mut scores, &mut context_signals, TaskIntent::Debug, "errorPresent");
        }
        if context.test_file {
            boost_intent(&mut scores, &mut context_signals, TaskIntent::Test, "testFile");
        }
        if context
            .recent_files
            .iter()
            .any(|path| TEST_FILE_PATTERN.is_match(path))
        {
            boost_intent(
                &mut scores,
                &mut context_signals,
                TaskIntent::Test,
                "recentTestFiles",
            );
        }

        // An intent is eligible once a keyword or a situational boost hit it;
        // the winner is picked by confidence, ties by declaration order.
        let mut winner: Option<(TaskIntent, f32, usize)> = None;
        let mut runner_up: Option<(TaskIntent, f32)> = None;
        for (idx, (intent, score)) in scores.iter().enumerate() {
            if score.points <= 0.0 {
                continue;
            }
            let confidence = (score.points / token_count).min(1.0);
            match winner {
                Some((_, best, _)) if confidence <= best => {
                    if runner_up.is_none_or(|(_, second)| confidence > second) {
                        runner_up = Some((*intent, confidence));
                    }
                }
                _ => {
                    if let Some((prev_intent, prev_conf, _)) = winner {
                        runner_up = Some((prev_intent, prev_conf));
                    }
                    winner = Some((*intent, confidence, idx));
                }
            }
        }

        let Some((intent, confidence, idx)) = winner else {
            return Classification {
                signals: context_signals,
                ..Classification::unknown()
            };
        };
        if confidence < self.min_confidence {
            return Classification {
                signals: context_signals,
                ..Classification::unknown()
            };
        }

        let mut signals = scores[idx].1.matched_tokens.clone();
        signals.extend(context_signals);

        let secondary_intent = runner_up
            .filter(|(_, second)| *second >= confidence * SECONDARY_INTENT_RATIO)
            .map(|(runner, _)| runner);

        Classification {
            intent,
            confidence,
            signals,
            secondary_intent,
        }
    }
}

fn boost_intent(
    scores: &mut [(TaskIntent, IntentScore)],
    signals: &mut Vec<String>,
    intent: TaskIntent,
    label: &str,
) {
    if let Some((_, score)) = scores.iter_mut().find(|(i, _)| *i == intent) {
        score.points += CONTEXT_BOOST_POINTS;
        signals.push(format!("context:{label}"));
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_ascii_alphanumeric())
                .to_string()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

fn score_keywords(intent: TaskIntent, tokens: &[String]) -> IntentScore {
    let mut score = IntentScore::default();
    for token in tokens {
        // Best match per token: an exact keyword hit is a full point, a
        // keyword buried inside a longer token ("crashes" contains "crash")
        // is half.
        let mut best = 0.0f32;
        for keyword in intent.keywords() {
            if token == keyword {
                best = 1.0;
                break;
            }
            if token.contains(keyword) {
                best = best.max(0.5);
            }
        }
        if best > 0.0 {
            score.points += best;
            score.matched_tokens.push(token.clone());
        }
    }
    score
}
