use crate::error::{EngineError, Result};
use crate::intent::TaskIntent;
use crate::weights::{RerankerWeights, WeightModifiers};
use anyhow::Context;
use evidence_protocol::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

/// Budget ratio sets must sum to 1 within this tolerance.
pub const RATIO_TOLERANCE: f32 = 0.1;

/// Fraction of the total token budget allotted to each provider type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetRatios {
    pub diff: f32,
    pub lsp: f32,
    pub search: f32,
}

impl BudgetRatios {
    #[must_use]
    pub const fn new(diff: f32, lsp: f32, search: f32) -> Self {
        Self { diff, lsp, search }
    }

    #[must_use]
    pub fn ratio_for(&self, kind: ProviderKind) -> f32 {
        match kind {
            ProviderKind::Diff => self.diff,
            ProviderKind::Lsp => self.lsp,
            ProviderKind::Search => self.search,
        }
    }

    #[must_use]
    pub fn sum(&self) -> f32 {
        self.diff + self.lsp + self.search
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if [self.diff, self.lsp, self.search]
            .iter()
            .any(|r| !r.is_finite() || *r < 0.0 || *r > 1.0)
        {
            return Err(format!("ratios must be within [0, 1]: {self:?}"));
        }
        if (self.sum() - 1.0).abs() > RATIO_TOLERANCE {
            return Err(format!("ratios must sum to 1 ± {RATIO_TOLERANCE}: {self:?}"));
        }
        Ok(())
    }
}

/// The intent-specific budget/weight/priority configuration governing one
/// retrieval cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentStrategy {
    pub budget_ratios: BudgetRatios,
    pub weight_modifiers: WeightModifiers,
    /// Provider types in query-dispatch order.
    pub provider_priority: Vec<ProviderKind>,
    /// Hints for extra context sections the prompt assembler may want.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_context: Vec<String>,
}

/// Caller-supplied strategy override. Merging is field-level: each present
/// field replaces the default's field wholesale, never interleaved within it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartialStrategy {
    #[serde(default)]
    pub budget_ratios: Option<BudgetRatios>,
    #[serde(default)]
    pub weight_modifiers: Option<WeightModifiers>,
    #[serde(default)]
    pub provider_priority: Option<Vec<ProviderKind>>,
    #[serde(default)]
    pub additional_context: Option<Vec<String>>,
}

impl PartialStrategy {
    fn overlay(&self, base: &IntentStrategy) -> IntentStrategy {
        IntentStrategy {
            budget_ratios: self.budget_ratios.unwrap_or(base.budget_ratios),
            weight_modifiers: self
                .weight_modifiers
                .clone()
                .unwrap_or_else(|| base.weight_modifiers.clone()),
            provider_priority: self
                .provider_priority
                .clone()
                .unwrap_or_else(|| base.provider_priority.clone()),
            additional_context: self
                .additional_context
                .clone()
                .unwrap_or_else(|| base.additional_context.clone()),
        }
    }
}

/// Rolling outcome statistics for one intent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub sample_count: u64,
    pub success_rate: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct FeedbackState {
    samples: u64,
    successes: u64,
}

impl FeedbackState {
    fn record(&self) -> FeedbackRecord {
        FeedbackRecord {
            sample_count: self.samples,
            success_rate: if self.samples == 0 {
                0.0
            } else {
                self.successes as f32 / self.samples as f32
            },
        }
    }
}

/// Task outcome reported back after a retrieval cycle.
#[derive(Debug, Clone, Default)]
pub struct StrategyFeedback {
    pub success: bool,
    /// Optional live strategy adjustment, applied field-level for the
    /// lifetime of the provider instance.
    pub adjustments: Option<PartialStrategy>,
}

fn default_strategy(intent: TaskIntent) -> IntentStrategy {
    use ProviderKind::{Diff, Lsp, Search};
    match intent {
        // Debugging leans on recent edits and stack frames.
        TaskIntent::Debug => IntentStrategy {
            budget_ratios: BudgetRatios::new(0.5, 0.3, 0.2),
            weight_modifiers: WeightModifiers {
                diff: Some(150.0),
                stack_frame: Some(120.0),
                ..WeightModifiers::default()
            },
            provider_priority: vec![Diff, Lsp, Search],
            additional_context: vec!["error_logs".to_string(), "recent_changes".to_string()],
        },
        // New code wants definitions and call sites first.
        TaskIntent::Implement => IntentStrategy {
            budget_ratios: BudgetRatios::new(0.3, 0.45, 0.25),
            weight_modifiers: WeightModifiers {
                definition: Some(130.0),
                reference: Some(110.0),
                ..WeightModifiers::default()
            },
            provider_priority: vec![Lsp, Diff, Search],
            additional_context: vec!["related_definitions".to_string()],
        },
        TaskIntent::Test => IntentStrategy {
            budget_ratios: BudgetRatios::new(0.35, 0.25, 0.4),
            weight_modifiers: WeightModifiers {
                keyword: Some(110.0),
                ..WeightModifiers::default()
            },
            provider_priority: vec![Diff, Search, Lsp],
            additional_context: vec!["test_files".to_string()],
        },
        // Refactors need every usage site more than they need fresh diffs.
        TaskIntent::Refactor => IntentStrategy {
            budget_ratios: BudgetRatios::new(0.25, 0.45, 0.3),
            weight_modifiers: WeightModifiers {
                reference: Some(140.0),
                definition: Some(120.0),
                ..WeightModifiers::default()
            },
            provider_priority: vec![Lsp, Search, Diff],
            additional_context: vec!["references".to_string()],
        },
        TaskIntent::Explore => IntentStrategy {
            budget_ratios: BudgetRatios::new(0.15, 0.35, 0.5),
            weight_modifiers: WeightModifiers {
                keyword: Some(130.0),
                ..WeightModifiers::default()
            },
            provider_priority: vec![Search, Lsp, Diff],
            additional_context: Vec::new(),
        },
        // Reviews are about what changed.
        TaskIntent::Review => IntentStrategy {
            budget_ratios: BudgetRatios::new(0.6, 0.2, 0.2),
            weight_modifiers: WeightModifiers {
                diff: Some(160.0),
                ..WeightModifiers::default()
            },
            provider_priority: vec![Diff, Lsp, Search],
            additional_context: vec!["recent_changes".to_string()],
        },
        TaskIntent::Unknown => IntentStrategy {
            budget_ratios: BudgetRatios::new(0.34, 0.33, 0.33),
            weight_modifiers: WeightModifiers::default(),
            provider_priority: vec![Diff, Lsp, Search],
            additional_context: Vec::new(),
        },
    }
}

const ALL_INTENTS: [TaskIntent; 7] = [
    TaskIntent::Debug,
    TaskIntent::Implement,
    TaskIntent::Test,
    TaskIntent::Refactor,
    TaskIntent::Explore,
    TaskIntent::Review,
    TaskIntent::Unknown,
];

/// Maps classified intents to retrieval strategies and adapts them through
/// outcome feedback.
///
/// All mutable state is owned by the instance (no globals): the live
/// per-intent strategies and the per-intent feedback records, each behind its
/// own lock since they are independent fields.
pub struct StrategyProvider {
    live: RwLock<HashMap<TaskIntent, IntentStrategy>>,
    feedback: Mutex<HashMap<TaskIntent, FeedbackState>>,
}

impl Default for StrategyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyProvider {
    /// Built-in defaults for every intent.
    #[must_use]
    pub fn new() -> Self {
        let live = ALL_INTENTS
            .iter()
            .map(|&intent| (intent, default_strategy(intent)))
            .collect();
        Self {
            live: RwLock::new(live),
            feedback: Mutex::new(HashMap::new()),
        }
    }

    /// Defaults overlaid with caller-supplied partial strategies, merged
    /// field-level per intent. Rejects overrides whose budget ratios fall
    /// outside tolerance.
    pub fn with_overrides(overrides: HashMap<TaskIntent, PartialStrategy>) -> Result<Self> {
        let provider = Self::new();
        {
            let mut live = write_lock(&provider.live);
            for (intent, partial) in overrides {
                let merged = partial.overlay(&default_strategy(intent));
                merged.budget_ratios.validate().map_err(|reason| {
                    EngineError::InvalidStrategy {
                        intent: intent.to_string(),
                        reason,
                    }
                })?;
                live.insert(intent, merged);
            }
        }
        Ok(provider)
    }

    /// Parse a JSON document of per-intent partial strategies, e.g.
    /// `{"debug": {"budget_ratios": {"diff": 0.7, "lsp": 0.2, "search": 0.1}}}`.
    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let overrides: HashMap<TaskIntent, PartialStrategy> =
            serde_json::from_slice(bytes).context("failed to parse strategy overrides")?;
        Self::with_overrides(overrides).context("invalid strategy overrides")
    }

    /// The live (merged, possibly feedback-adjusted) strategy for `intent`.
    #[must_use]
    pub fn get_strategy(&self, intent: TaskIntent) -> IntentStrategy {
        read_lock(&self.live)
            .get(&intent)
            .cloned()
            .unwrap_or_else(|| default_strategy(intent))
    }

    #[must_use]
    pub fn get_budget_ratios(&self, intent: TaskIntent) -> BudgetRatios {
        self.get_strategy(intent).budget_ratios
    }

    /// Overlay `intent`'s weight modifiers onto `base`, returning a fresh
    /// record; `base` is never mutated.
    #[must_use]
    pub fn apply_weight_modifiers(
        &self,
        base: &RerankerWeights,
        intent: TaskIntent,
    ) -> RerankerWeights {
        self.get_strategy(intent).weight_modifiers.apply(base)
    }

    /// Record a task outcome for `intent` and apply any live adjustments.
    pub fn update_strategy(&self, intent: TaskIntent, feedback: StrategyFeedback) {
        {
            let mut records = lock(&self.feedback);
            let state = records.entry(intent).or_default();
            state.samples += 1;
            if feedback.success {
                state.successes += 1;
            }
        }

        let Some(adjustments) = feedback.adjustments else {
            return;
        };
        if let Some(ratios) = &adjustments.budget_ratios {
            if let Err(reason) = ratios.validate() {
                log::warn!("ignoring strategy adjustment for {intent}: {reason}");
                return;
            }
        }
        let mut live = write_lock(&self.live);
        let current = live
            .entry(intent)
            .or_insert_with(|| default_strategy(intent));
        *current = adjustments.overlay(current);
        log::debug!("applied live strategy adjustment for {intent}");
    }

    /// `None` until the first `update_strategy` call for `intent`.
    #[must_use]
    pub fn get_feedback_stats(&self, intent: TaskIntent) -> Option<FeedbackRecord> {
        lock(&self.feedback).get(&intent).map(FeedbackState::record)
    }

    /// Drop all feedback and live overrides, restoring built-in defaults.
    /// Intended for test isolation.
    pub fn reset(&self) {
        lock(&self.feedback).clear();
        let mut live = write_lock(&self.live);
        *live = ALL_INTENTS
            .iter()
            .map(|&intent| (intent, default_strategy(intent)))
            .collect();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
