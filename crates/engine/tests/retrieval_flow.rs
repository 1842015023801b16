use async_trait::async_trait;
use evidence_diff::testing::StaticDiff;
use evidence_diff::DiffEvidenceProvider;
use evidence_engine::{
    EvidenceOrchestrator, IntentClassifier, RerankerWeights, StrategyFeedback, StrategyProvider,
    TaskContext, TaskIntent,
};
use evidence_protocol::{
    estimate_tokens, DiffKind, Evidence, EvidenceMetadata, EvidenceProvider, FileDiff,
    ProviderKind, QueryOptions, Signal,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Stub provider with configurable kind, latency, and canned evidence.
struct StubProvider {
    kind: ProviderKind,
    name: &'static str,
    base_weight: f32,
    items: Vec<Evidence>,
    delay: Option<Duration>,
    available: bool,
    queries: AtomicUsize,
    seen_budget: AtomicUsize,
}

impl StubProvider {
    fn new(kind: ProviderKind, name: &'static str, base_weight: f32) -> Self {
        Self {
            kind,
            name,
            base_weight,
            items: Vec::new(),
            delay: None,
            available: true,
            queries: AtomicUsize::new(0),
            seen_budget: AtomicUsize::new(0),
        }
    }

    fn with_items(mut self, items: Vec<Evidence>) -> Self {
        self.items = items;
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

#[async_trait]
impl EvidenceProvider for StubProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.name
    }

    fn base_weight(&self) -> f32 {
        self.base_weight
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn query(&self, _signals: &[Signal], options: &QueryOptions) -> Vec<Evidence> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.seen_budget
            .store(options.max_tokens.unwrap_or(0), Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.items.clone()
    }
}

fn make_evidence(
    kind: ProviderKind,
    base_weight: f32,
    id: &str,
    tokens: usize,
    matched: usize,
) -> Evidence {
    Evidence {
        id: id.to_string(),
        provider: kind,
        path: format!("src/{id}.rs"),
        range: (1, 10),
        content: "x".repeat(tokens * 4),
        tokens,
        base_score: base_weight,
        matched_signals: (0..matched)
            .map(|i| Signal::symbol(format!("sym{i}"), "test"))
            .collect(),
        metadata: EvidenceMetadata::default(),
    }
}

fn weights() -> RerankerWeights {
    RerankerWeights::default()
}

#[tokio::test]
async fn evidence_is_gathered_from_all_providers_and_ranked() {
    let diff = Arc::new(
        StubProvider::new(ProviderKind::Diff, "diff", 100.0)
            .with_items(vec![make_evidence(ProviderKind::Diff, 100.0, "recent", 50, 1)]),
    );
    let lsp = Arc::new(
        StubProvider::new(ProviderKind::Lsp, "lsp", 80.0)
            .with_items(vec![make_evidence(ProviderKind::Lsp, 80.0, "definition", 50, 0)]),
    );

    let orchestrator = EvidenceOrchestrator::new(
        Arc::new(StrategyProvider::new()),
        vec![diff.clone(), lsp.clone()],
    );
    let outcome = orchestrator
        .retrieve(
            "fix the crash in the session handler",
            &TaskContext::default(),
            &[],
            4_000,
            &weights(),
        )
        .await;

    assert_eq!(outcome.classification.intent, TaskIntent::Debug);
    assert_eq!(outcome.evidence.len(), 2);
    // Debug strategy raises the diff weight, so diff evidence ranks first.
    assert_eq!(outcome.evidence[0].provider, ProviderKind::Diff);
    assert_eq!(diff.queries.load(Ordering::SeqCst), 1);
    assert_eq!(lsp.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn budget_is_split_per_strategy_ratios() {
    let diff = Arc::new(StubProvider::new(ProviderKind::Diff, "diff", 100.0));
    let lsp = Arc::new(StubProvider::new(ProviderKind::Lsp, "lsp", 80.0));
    let search = Arc::new(StubProvider::new(ProviderKind::Search, "search", 60.0));

    let orchestrator = EvidenceOrchestrator::new(
        Arc::new(StrategyProvider::new()),
        vec![diff.clone(), lsp.clone(), search.clone()],
    );
    orchestrator
        .retrieve(
            "fix the broken error handling",
            &TaskContext::default(),
            &[],
            1_000,
            &weights(),
        )
        .await;

    // Debug ratios are 0.5 / 0.3 / 0.2 of the 1000-token budget.
    assert_eq!(diff.seen_budget.load(Ordering::SeqCst), 500);
    assert_eq!(lsp.seen_budget.load(Ordering::SeqCst), 300);
    assert_eq!(search.seen_budget.load(Ordering::SeqCst), 200);
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out_without_blocking_the_rest() {
    let fast = Arc::new(
        StubProvider::new(ProviderKind::Diff, "diff", 100.0)
            .with_items(vec![make_evidence(ProviderKind::Diff, 100.0, "fast", 10, 0)]),
    );
    let slow = Arc::new(
        StubProvider::new(ProviderKind::Search, "search", 60.0)
            .with_items(vec![make_evidence(ProviderKind::Search, 60.0, "slow", 10, 0)])
            .with_delay(Duration::from_secs(60)),
    );

    let orchestrator = EvidenceOrchestrator::new(
        Arc::new(StrategyProvider::new()),
        vec![fast.clone(), slow.clone()],
    )
    .with_provider_timeout(Duration::from_millis(100));

    let outcome = orchestrator
        .retrieve(
            "fix the bug",
            &TaskContext::default(),
            &[],
            1_000,
            &weights(),
        )
        .await;

    assert_eq!(outcome.evidence.len(), 1);
    assert_eq!(outcome.evidence[0].id, "fast");
}

#[tokio::test]
async fn unavailable_provider_contributes_nothing() {
    let up = Arc::new(
        StubProvider::new(ProviderKind::Diff, "diff", 100.0)
            .with_items(vec![make_evidence(ProviderKind::Diff, 100.0, "alive", 10, 0)]),
    );
    let down = Arc::new(
        StubProvider::new(ProviderKind::Lsp, "lsp", 80.0)
            .with_items(vec![make_evidence(ProviderKind::Lsp, 80.0, "dead", 10, 0)])
            .unavailable(),
    );

    let orchestrator =
        EvidenceOrchestrator::new(Arc::new(StrategyProvider::new()), vec![up, down.clone()]);
    let outcome = orchestrator
        .retrieve(
            "fix the bug",
            &TaskContext::default(),
            &[],
            1_000,
            &weights(),
        )
        .await;

    assert_eq!(outcome.evidence.len(), 1);
    assert_eq!(outcome.evidence[0].id, "alive");
    // is_available returned false, so query was never issued.
    assert_eq!(down.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn total_provider_failure_yields_an_empty_list() {
    let a = Arc::new(StubProvider::new(ProviderKind::Diff, "diff", 100.0).unavailable());
    let b = Arc::new(StubProvider::new(ProviderKind::Search, "search", 60.0).unavailable());

    let orchestrator = EvidenceOrchestrator::new(Arc::new(StrategyProvider::new()), vec![a, b]);
    let outcome = orchestrator
        .retrieve(
            "fix the bug",
            &TaskContext::default(),
            &[],
            1_000,
            &weights(),
        )
        .await;
    assert!(outcome.evidence.is_empty());
}

#[tokio::test]
async fn feedback_round_trip_reaches_the_strategy_provider() {
    let strategy = Arc::new(StrategyProvider::new());
    let orchestrator = EvidenceOrchestrator::new(strategy.clone(), Vec::new());

    let outcome = orchestrator
        .retrieve(
            "fix the flaky auth bug",
            &TaskContext::default(),
            &[],
            1_000,
            &weights(),
        )
        .await;
    let intent = outcome.classification.intent;

    for success in [true, true, false] {
        orchestrator.report_outcome(
            intent,
            StrategyFeedback {
                success,
                adjustments: None,
            },
        );
    }

    let stats = strategy.get_feedback_stats(intent).expect("stats");
    assert_eq!(stats.sample_count, 3);
    assert!((stats.success_rate - 2.0 / 3.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn diff_provider_plugs_into_the_orchestrator() {
    let backend = Arc::new(StaticDiff::new().with_snapshot(
        "head~1",
        vec![FileDiff {
            path: "src/session.rs".to_string(),
            old_path: None,
            kind: DiffKind::Modified,
            before: Some("fn refresh() {}".to_string()),
            after: Some("fn refresh() { renew() }".to_string()),
        }],
    ));
    let provider = Arc::new(DiffEvidenceProvider::with_snapshot(backend, "head~1"));

    let classifier = IntentClassifier::with_min_confidence(0.1).expect("valid config");
    let orchestrator =
        EvidenceOrchestrator::new(Arc::new(StrategyProvider::new()), vec![provider])
            .with_classifier(classifier);

    let signals = vec![Signal::symbol("refresh", "conversation")];
    let outcome = orchestrator
        .retrieve(
            "fix the session refresh error",
            &TaskContext {
                error_present: true,
                ..TaskContext::default()
            },
            &signals,
            2_000,
            &weights(),
        )
        .await;

    assert_eq!(outcome.classification.intent, TaskIntent::Debug);
    assert!(outcome
        .classification
        .signals
        .contains(&"context:errorPresent".to_string()));
    assert_eq!(outcome.evidence.len(), 1);
    let evidence = &outcome.evidence[0];
    assert_eq!(evidence.path, "src/session.rs");
    assert_eq!(evidence.tokens, estimate_tokens(&evidence.content));
    assert_eq!(evidence.matched_signals, signals);
}
