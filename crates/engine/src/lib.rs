//! Intent-aware evidence ranking: classify the task, pick a strategy, fan out
//! to evidence providers under per-provider budgets and deadlines, and return
//! one budget-trimmed, score-ordered evidence list.

mod error;
mod intent;
mod orchestrator;
mod strategy;
mod weights;

pub use error::{EngineError, Result};
pub use intent::{Classification, IntentClassifier, TaskContext, TaskIntent};
pub use orchestrator::{EvidenceOrchestrator, RetrievalOutcome};
pub use strategy::{
    BudgetRatios, FeedbackRecord, IntentStrategy, PartialStrategy, StrategyFeedback,
    StrategyProvider, RATIO_TOLERANCE,
};
pub use weights::{RerankerWeights, WeightModifiers};
