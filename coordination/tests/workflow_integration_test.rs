//! Integration tests for the phased six-hat workflow
//!
//! Drives `PhaseEngine` end to end with scripted generators and providers:
//! budget accounting, cache reuse across runs, failure injection, phase
//! ordering, and the streaming event sequence.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hat_coordination::search::types::ProviderRecord;
use hat_coordination::workflow::events::PhaseTag;
use hat_coordination::{
    ChatMessage, DegradationLevel, GenerationError, Hat, PhaseEngine, ProviderError,
    QueryAnalyzer, SearchProvider, TextGenerator, WorkflowConfig, WorkflowEvent, WorkflowPhase,
    WorkflowRequest,
};
use mockall::mock;
use tokio::sync::Notify;

// ── Fakes ─────────────────────────────────────────────────────────────────────

mock! {
    pub Provider {}

    #[async_trait]
    impl SearchProvider for Provider {
        async fn search(
            &self,
            query: &str,
            max_results: usize,
        ) -> Result<Vec<ProviderRecord>, ProviderError>;
    }
}

fn record_for(query: &str) -> Vec<ProviderRecord> {
    vec![ProviderRecord {
        title: Some(format!("About {query}")),
        url: Some("https://example.org/a".into()),
        content: Some(format!("Background material on {query}.")),
        score: Some(0.9),
    }]
}

/// Answers every query with one record and counts calls.
#[derive(Default)]
struct CountingProvider {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl SearchProvider for CountingProvider {
    async fn search(
        &self,
        query: &str,
        _max_results: usize,
    ) -> Result<Vec<ProviderRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Transport("connection refused".into()));
        }
        Ok(record_for(query))
    }
}

/// Answers every query immediately except `stall_on`, which never returns.
struct StallingProvider {
    stall_on: String,
}

#[async_trait]
impl SearchProvider for StallingProvider {
    async fn search(
        &self,
        query: &str,
        _max_results: usize,
    ) -> Result<Vec<ProviderRecord>, ProviderError> {
        if query == self.stall_on {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(record_for(query))
    }
}

fn hat_of(system: &str) -> Hat {
    Hat::ALL
        .into_iter()
        .find(|hat| system.starts_with(&format!("You are the {} Hat", hat.title())))
        .expect("system prompt names a hat")
}

/// Generator that identifies the hat from its system prompt and can be told
/// to fail, stall, or wait on a gate for particular hats.
#[derive(Default)]
struct ScriptedGenerator {
    log: Mutex<Vec<String>>,
    systems: Mutex<Vec<(Hat, String)>>,
    history_lens: Mutex<Vec<usize>>,
    fail: Vec<Hat>,
    stall: Vec<Hat>,
    gate: Option<(Hat, Arc<Notify>)>,
}

impl ScriptedGenerator {
    fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn position(&self, entry: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} not logged"))
    }

    fn system_for(&self, hat: Hat) -> String {
        self.systems
            .lock()
            .unwrap()
            .iter()
            .find(|(h, _)| *h == hat)
            .map(|(_, s)| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        system: &str,
        _user: &str,
        history: &[ChatMessage],
    ) -> Result<String, GenerationError> {
        let hat = hat_of(system);
        self.log.lock().unwrap().push(format!("start:{hat}"));
        self.systems.lock().unwrap().push((hat, system.to_string()));
        self.history_lens.lock().unwrap().push(history.len());

        if let Some((gated, notify)) = &self.gate {
            if *gated == hat {
                notify.notified().await;
            }
        }
        if self.stall.contains(&hat) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail.contains(&hat) {
            return Err(GenerationError::Inference("injected failure".into()));
        }

        self.log.lock().unwrap().push(format!("end:{hat}"));
        Ok(format!(
            "{} perspective: the main opportunity and the main risk.",
            hat.title()
        ))
    }
}

fn engine(
    config: WorkflowConfig,
    provider: Arc<dyn SearchProvider>,
    generator: Arc<ScriptedGenerator>,
) -> PhaseEngine {
    PhaseEngine::new(config, provider, generator).expect("valid config")
}

// ── Budget and lookups ────────────────────────────────────────────────────────

#[tokio::test]
async fn allocated_hats_each_trigger_one_provider_call() {
    let mut provider = MockProvider::new();
    provider
        .expect_search()
        .withf(|_, max| *max == 5)
        .times(4)
        .returning(|query, _| Ok(record_for(query)));
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(WorkflowConfig::default(), Arc::new(provider), generator);

    let result = engine.run("What is quantum computing?").await.unwrap();

    assert_eq!(result.stats.lookups_executed, 4);
    assert_eq!(result.stats.budget_remaining, 0);
    for hat in Hat::PARALLEL {
        assert!(result.output(hat).unwrap().search_used, "{hat} had no evidence");
    }
    // Quota exhausted by the initial wave; Green answers without a lookup.
    assert!(!result.phases_completed.contains(&WorkflowPhase::SearchingSequential));
    assert!(!result.output(Hat::Green).unwrap().search_used);
}

#[tokio::test]
async fn zero_budget_makes_no_provider_calls() {
    let mut provider = MockProvider::new();
    provider.expect_search().times(0);
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(
        WorkflowConfig::default().with_budget(0),
        Arc::new(provider),
        generator,
    );

    let result = engine.run("Should I start a business?").await.unwrap();

    assert_eq!(result.stats.lookups_executed, 0);
    assert!(result.analysis.allocation.is_empty());
    assert_eq!(result.outputs.len(), 6);
    assert!(result.outputs.values().all(|o| o.level == DegradationLevel::Full));
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn provider_calls_never_exceed_budget() {
    for budget in 0..=6 {
        let provider = Arc::new(CountingProvider::default());
        let generator = Arc::new(ScriptedGenerator::default());
        let engine = engine(
            WorkflowConfig::default().with_budget(budget),
            provider.clone(),
            generator,
        );

        let result = engine
            .run("How can my startup compare funding options and reduce risk?")
            .await
            .unwrap();

        let calls = provider.calls.load(Ordering::SeqCst);
        assert!(calls <= budget, "budget {budget}: {calls} calls");
        assert_eq!(result.stats.lookups_executed as usize, calls);
        assert_eq!(result.stats.budget_remaining, budget - calls);
    }
}

#[tokio::test]
async fn second_run_reuses_cache_and_spends_quota_on_green() {
    let provider = Arc::new(CountingProvider::default());
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(WorkflowConfig::default(), provider.clone(), generator);

    let first = engine.run("What is quantum computing?").await.unwrap();
    assert_eq!(first.stats.lookups_executed, 4);

    let second = engine.run("What is quantum computing?").await.unwrap();
    assert_eq!(second.stats.cache_hits, 4);
    // Quota saved by the cache goes to the sequential lookup.
    assert_eq!(second.stats.lookups_executed, 1);
    assert!(second.phases_completed.contains(&WorkflowPhase::SearchingSequential));
    assert!(second.output(Hat::Green).unwrap().search_used);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 5);

    let totals = engine.orchestrator().statistics().totals;
    assert_eq!(totals.provider_calls, 5);
    assert_eq!(totals.cache_hits, 4);
}

#[tokio::test]
async fn blue_never_searches_even_with_spare_budget() {
    let provider = Arc::new(CountingProvider::default());
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(
        WorkflowConfig::default().with_budget(6),
        provider.clone(),
        generator.clone(),
    );

    let result = engine.run("What is quantum computing?").await.unwrap();

    assert!(provider.calls.load(Ordering::SeqCst) <= 5);
    assert!(!result.output(Hat::Blue).unwrap().search_used);
    assert!(!generator.system_for(Hat::Blue).contains("Search Results"));
}

// ── Failure injection ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_and_stalled_hats_become_placeholders() {
    let provider = Arc::new(CountingProvider::default());
    let generator = Arc::new(ScriptedGenerator {
        fail: vec![Hat::Red],
        stall: vec![Hat::Black],
        ..Default::default()
    });
    let engine = engine(WorkflowConfig::default(), provider, generator.clone());

    let result = engine.run("Should I start a business?").await.unwrap();

    assert_eq!(result.placeholders, vec![Hat::Red, Hat::Black]);
    assert_eq!(
        result.output(Hat::Red).unwrap().text,
        "Error: Unable to process Red Hat (Emotions) perspective."
    );
    assert!(result.errors.iter().any(|e| e.starts_with("Red hat failed:")));
    assert!(result
        .errors
        .iter()
        .any(|e| e.starts_with("Black hat failed: generation timed out")));

    // The run still completes and Blue sees the placeholders.
    assert_eq!(result.final_output, "Blue perspective: the main opportunity and the main risk.");
    assert!(generator
        .system_for(Hat::Blue)
        .contains("Error: Unable to process Black Hat (Risks) perspective."));
    assert_eq!(result.outputs.len(), 6);
}

#[tokio::test]
async fn provider_outage_degrades_to_partial_outputs() {
    let provider = Arc::new(CountingProvider {
        fail: true,
        ..Default::default()
    });
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(WorkflowConfig::default(), provider, generator);

    let result = engine.run("What is quantum computing?").await.unwrap();

    assert_eq!(result.stats.provider_failures, 4);
    // Failed lookups still consumed quota.
    assert_eq!(result.stats.budget_remaining, 0);
    for hat in Hat::PARALLEL {
        assert_eq!(result.output(hat).unwrap().level, DegradationLevel::Partial);
    }
    assert!(result.placeholders.is_empty());
    assert!(result.is_degraded());
}

#[tokio::test(start_paused = true)]
async fn one_stalled_lookup_leaves_the_other_hats_intact() {
    let query = "What is quantum computing?";
    let analysis = QueryAnalyzer::new(4).analyze(query).unwrap();
    let red_query = analysis.query_for(Hat::Red).expect("red is allocated").to_string();
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(
        WorkflowConfig::default(),
        Arc::new(StallingProvider { stall_on: red_query }),
        generator.clone(),
    );

    let result = engine.run(query).await.unwrap();

    assert_eq!(result.stats.provider_failures, 1);
    assert_eq!(result.stats.lookups_executed, 4);
    assert_eq!(result.stats.budget_remaining, 0);

    let red = result.output(Hat::Red).unwrap();
    assert_eq!(red.level, DegradationLevel::Partial);
    assert!(!red.search_used);
    for hat in [Hat::White, Hat::Yellow, Hat::Black] {
        let output = result.output(hat).unwrap();
        assert_eq!(output.level, DegradationLevel::Full, "{hat}");
        assert!(output.search_used, "{hat} lost its evidence");
    }

    // Synthesis cites only the evidence that arrived.
    let blue = generator.system_for(Hat::Blue);
    assert!(!blue.contains("**RED Hat Evidence:**"));
    assert!(blue.contains("**WHITE Hat Evidence:**"));
    assert_eq!(result.final_output, "Blue perspective: the main opportunity and the main risk.");
}

#[tokio::test]
async fn empty_lookup_results_do_not_count_as_evidence() {
    let mut provider = MockProvider::new();
    provider.expect_search().returning(|_, _| Ok(Vec::new()));
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(WorkflowConfig::default(), Arc::new(provider), generator.clone());

    let result = engine.run("What is quantum computing?").await.unwrap();

    for hat in Hat::PARALLEL {
        let output = result.output(hat).unwrap();
        assert!(!output.search_used, "{hat} reported evidence it never saw");
        assert!(!generator.system_for(hat).contains("Search Results"));
    }
}

#[tokio::test]
async fn empty_query_runs_degraded_without_lookups() {
    let mut provider = MockProvider::new();
    provider.expect_search().times(0);
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(WorkflowConfig::default(), Arc::new(provider), generator);

    let result = engine.run("   ").await.unwrap();

    assert!(result.errors[0].starts_with("Query analysis failed:"));
    assert!(result.analysis.allocation.is_empty());
    assert_eq!(result.outputs.len(), 6);
    assert_eq!(result.phases_completed.first(), Some(&WorkflowPhase::Analyzing));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let config = WorkflowConfig {
        max_parallel_hats: 0,
        ..Default::default()
    };
    let result = PhaseEngine::new(
        config,
        Arc::new(CountingProvider::default()),
        Arc::new(ScriptedGenerator::default()),
    );
    assert!(result.is_err());
}

// ── Ordering ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn green_waits_for_every_parallel_hat() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(ScriptedGenerator {
        gate: Some((Hat::Red, gate.clone())),
        ..Default::default()
    });
    let engine = engine(
        WorkflowConfig::default(),
        Arc::new(CountingProvider::default()),
        generator.clone(),
    );

    let run = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run("Should I start a business?").await }
    });

    // Wait until the other three parallel hats have finished.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let done = generator
                .events()
                .iter()
                .filter(|e| ["end:white", "end:yellow", "end:black"].contains(&e.as_str()))
                .count();
            if done == 3 {
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("parallel hats finish");

    assert!(!generator.events().contains(&"start:green".to_string()));
    gate.notify_one();

    let result = run.await.unwrap().unwrap();
    assert!(generator.position("end:red") < generator.position("start:green"));
    let aggregated = result.aggregated.as_ref().expect("aggregated context");
    assert_eq!(
        aggregated.parallel_responses[&Hat::Red],
        "Red perspective: the main opportunity and the main risk."
    );
    assert!(generator.position("end:green") < generator.position("start:blue"));
    assert_eq!(
        result.phases_completed.last(),
        Some(&WorkflowPhase::Synthesizing)
    );
}

#[tokio::test]
async fn green_prompt_carries_aggregated_perspectives() {
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(
        WorkflowConfig::default(),
        Arc::new(CountingProvider::default()),
        generator.clone(),
    );

    let result = engine.run("Should I start a business?").await.unwrap();

    let green = generator.system_for(Hat::Green);
    assert!(green.contains("## Aggregated Perspectives from Parallel Hats:"));
    assert!(green.contains("White perspective"));
    let aggregated = result.aggregated.expect("aggregated context");
    assert!(aggregated.key_themes.contains(&"opportunity".to_string()));
    assert!(aggregated.key_themes.contains(&"risk".to_string()));
}

#[tokio::test]
async fn prior_turns_reach_every_hat() {
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(
        WorkflowConfig::default(),
        Arc::new(CountingProvider::default()),
        generator.clone(),
    );
    let request = WorkflowRequest::new("And what about hiring?").with_history(vec![
        ChatMessage::user("Should I start a business?"),
        ChatMessage::assistant("It depends on your savings."),
    ]);

    engine.run_request(request).await.unwrap();

    let lens = generator.history_lens.lock().unwrap().clone();
    assert_eq!(lens.len(), 6);
    assert!(lens.iter().all(|&n| n == 2));
}

// ── Streaming ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_reports_each_phase_then_completes() {
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(
        WorkflowConfig::default(),
        Arc::new(CountingProvider::default()),
        generator,
    );

    let mut rx = engine.stream(WorkflowRequest::new("What is quantum computing?"));
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let steps: Vec<(PhaseTag, String)> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::Progress { tag, step, .. } => Some((*tag, step.clone())),
            _ => None,
        })
        .collect();

    assert_eq!(steps[0], (PhaseTag::Analysis, "query_analyzer".to_string()));
    assert_eq!(steps[1], (PhaseTag::Analysis, "search_orchestrator".to_string()));
    let parallel: BTreeSet<&str> = steps[2..6]
        .iter()
        .map(|(tag, step)| {
            assert_eq!(*tag, PhaseTag::Parallel);
            step.as_str()
        })
        .collect();
    assert_eq!(
        parallel,
        BTreeSet::from(["white_hat", "red_hat", "yellow_hat", "black_hat"])
    );
    assert_eq!(steps[6].1, "aggregator");
    assert_eq!(steps[steps.len() - 2].1, "green_hat");
    assert_eq!(steps[steps.len() - 1], (PhaseTag::Synthesis, "blue_hat".to_string()));

    let last = events.last().expect("events");
    assert!(last.is_terminal());
    match last {
        WorkflowEvent::Complete(result) => assert_eq!(result.outputs.len(), 6),
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[tokio::test]
async fn progress_state_grows_monotonically() {
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(
        WorkflowConfig::default(),
        Arc::new(CountingProvider::default()),
        generator,
    );

    let mut rx = engine.stream(WorkflowRequest::new("Should I start a business?"));
    let mut last_count = 0;
    while let Some(event) = rx.recv().await {
        if let WorkflowEvent::Progress { state, .. } = event {
            let count = state.outputs().len();
            assert!(count >= last_count);
            last_count = count;
        }
    }
    assert_eq!(last_count, 6);
}
