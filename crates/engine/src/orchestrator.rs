use crate::intent::{Classification, IntentClassifier, TaskContext, TaskIntent};
use crate::strategy::{IntentStrategy, StrategyFeedback, StrategyProvider};
use crate::weights::RerankerWeights;
use evidence_protocol::{
    trim_to_budget, Evidence, EvidenceProvider, ProviderKind, QueryOptions, Signal,
};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(2);

// Small additive reward per matched signal, sized against base scores of
// ~100 times weights of ~100.
const SIGNAL_MATCH_BONUS: f32 = 5.0;

/// Result of one evidence-retrieval cycle.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    /// Budget-trimmed evidence, composite score descending.
    pub evidence: Vec<Evidence>,
    pub classification: Classification,
    /// The strategy that governed this cycle, including `additional_context`
    /// hints for the prompt assembler.
    pub strategy: IntentStrategy,
}

/// Single entry point tying classifier, strategy, and providers into one
/// ranked, budget-constrained evidence list.
///
/// Each cycle is a bounded fan-out/fan-in: every available provider is
/// queried concurrently under its own deadline, so a slow backend cannot
/// stall the rest. Dropping the returned future aborts in-flight queries.
pub struct EvidenceOrchestrator {
    classifier: IntentClassifier,
    strategy: Arc<StrategyProvider>,
    providers: Vec<Arc<dyn EvidenceProvider>>,
    provider_timeout: Duration,
}

impl EvidenceOrchestrator {
    pub fn new(strategy: Arc<StrategyProvider>, providers: Vec<Arc<dyn EvidenceProvider>>) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            strategy,
            providers,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }

    /// Run one retrieval cycle.
    ///
    /// Individual provider failures or timeouts contribute no evidence; a
    /// fully failed cycle returns an empty list, a valid degraded outcome.
    pub async fn retrieve(
        &self,
        task: &str,
        context: &TaskContext,
        signals: &[Signal],
        total_budget: usize,
        base_weights: &RerankerWeights,
    ) -> RetrievalOutcome {
        let classification = self.classifier.classify_with_context(task, context);
        let strategy = self.strategy.get_strategy(classification.intent);
        let weights = self
            .strategy
            .apply_weight_modifiers(base_weights, classification.intent);
        log::debug!(
            "retrieval cycle: intent={} confidence={:.2} budget={total_budget}",
            classification.intent,
            classification.confidence
        );

        let shared_signals: Arc<Vec<Signal>> = Arc::new(signals.to_vec());
        let mut join = JoinSet::new();
        for (order, provider) in self.ordered_providers(&strategy).into_iter().enumerate() {
            let ratio = strategy.budget_ratios.ratio_for(provider.kind());
            let sub_budget = (total_budget as f32 * ratio).floor() as usize;
            if sub_budget == 0 {
                // Static split: a zero share means this provider sits the
                // cycle out; nothing is reallocated.
                log::debug!("provider {} has no budget share, skipping", provider.name());
                continue;
            }

            let options = QueryOptions::default().with_max_tokens(sub_budget);
            let signals = Arc::clone(&shared_signals);
            let deadline = self.provider_timeout;
            join.spawn(async move {
                let batch = timeout(deadline, async {
                    if !provider.is_available().await {
                        log::debug!("provider {} unavailable", provider.name());
                        return Vec::new();
                    }
                    provider.query(&signals, &options).await
                })
                .await
                .unwrap_or_else(|_| {
                    log::warn!(
                        "provider {} timed out after {deadline:?}",
                        provider.name()
                    );
                    Vec::new()
                });
                (order, batch)
            });
        }

        let mut batches: Vec<(usize, Vec<Evidence>)> = Vec::new();
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok(batch) => batches.push(batch),
                Err(e) => log::warn!("provider task failed: {e}"),
            }
        }
        // Merge in dispatch (priority) order so the global trim favors
        // higher-priority providers.
        batches.sort_by_key(|(order, _)| *order);
        let merged: Vec<Evidence> = batches.into_iter().flat_map(|(_, batch)| batch).collect();

        let trimmed = trim_to_budget(merged, total_budget);
        let mut scored: Vec<(f32, Evidence)> = trimmed
            .into_iter()
            .map(|evidence| (composite_score(&evidence, &weights), evidence))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let evidence: Vec<Evidence> = scored.into_iter().map(|(_, evidence)| evidence).collect();
        log::info!(
            "retrieval cycle complete: intent={} evidence={}",
            classification.intent,
            evidence.len()
        );
        RetrievalOutcome {
            evidence,
            classification,
            strategy,
        }
    }

    /// Report the task's eventual outcome back into the strategy feedback
    /// loop.
    pub fn report_outcome(&self, intent: TaskIntent, feedback: StrategyFeedback) {
        self.strategy.update_strategy(intent, feedback);
    }

    /// Providers sorted by the strategy's priority list; kinds the strategy
    /// does not mention keep their registration order at the back.
    fn ordered_providers(&self, strategy: &IntentStrategy) -> Vec<Arc<dyn EvidenceProvider>> {
        let rank = |kind: ProviderKind| {
            strategy
                .provider_priority
                .iter()
                .position(|&p| p == kind)
                .unwrap_or(strategy.provider_priority.len())
        };
        let mut ordered: Vec<Arc<dyn EvidenceProvider>> = self.providers.clone();
        ordered.sort_by_key(|provider| rank(provider.kind()));
        ordered
    }
}

/// Base score times the effective weight dimension for the provider type,
/// exponentially decayed for stack-trace-sourced evidence, plus a small
/// bonus per matched signal.
fn composite_score(evidence: &Evidence, weights: &RerankerWeights) -> f32 {
    let dimension = if evidence.metadata.stack_depth.is_some() {
        weights.stack_frame
    } else {
        match evidence.provider {
            ProviderKind::Diff => weights.diff,
            ProviderKind::Lsp => {
                if evidence.metadata.is_reference {
                    weights.reference
                } else {
                    weights.definition
                }
            }
            ProviderKind::Search => weights.keyword,
        }
    };

    let mut score = evidence.base_score * dimension;
    if let Some(depth) = evidence.metadata.stack_depth {
        let decay = (1.0 - weights.stack_depth_decay).clamp(0.0, 1.0);
        score *= decay.powi(depth.min(64) as i32);
    }
    score + SIGNAL_MATCH_BONUS * evidence.matched_signals.len() as f32
}
