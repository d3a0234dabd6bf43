//! Phase engine: drives one query through the six-hat pipeline.
//!
//! ```text
//! Phase 0: Analyzing            QueryAnalyzer → priorities, lookup strings, allocation
//!          SearchingInitial     SearchSession::resolve_wave(allocated hats)
//!
//! Phase 1: ProcessingParallel   JoinSet::spawn(hat) × {White, Red, Yellow, Black}
//!                               join-all barrier
//!
//! Phase 2: Aggregating          AggregatedContext::build(parallel outputs, evidence)
//!          SearchingSequential  one lookup for Green, only if quota remains
//!          ProcessingSequential Green(aggregated context, evidence)
//!
//! Phase 3: Synthesizing         Blue(all perspectives, all evidence) → final output
//! ```
//!
//! ## Failure policy
//!
//! Lookup failures leave a hat without context. Generation failures and
//! panics become placeholder outputs. Analysis failure continues with an
//! empty analysis (no lookups). Only contract violations, a broken budget
//! invariant or an illegal phase transition, abort the run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::analysis::{QueryAnalysis, QueryAnalyzer, SearchPriority};
use crate::config::WorkflowConfig;
use crate::error::{CoordinationError, GenerationError};
use crate::hats::Hat;
use crate::prompts::PROMPT_VERSION;
use crate::resilience::HatOutput;
use crate::search::orchestrator::{SearchOrchestrator, SearchSession, SearchStats};
use crate::search::types::{SearchPhase, SearchProvider};
use crate::workflow::context::{system_prompt, AggregatedContext, SynthesisContext};
use crate::workflow::events::{PhaseTag, WorkflowEvent};
use crate::workflow::generation::{ChatMessage, TextGenerator};
use crate::workflow::state::{ProcessingStats, WorkflowRequest, WorkflowResult, WorkflowState};
use crate::workflow::state_machine::{StateMachine, WorkflowPhase};

/// Buffered progress events before the producer waits on the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 32;

// ── Event sink ────────────────────────────────────────────────────────────────

struct EventSink(Option<mpsc::Sender<WorkflowEvent>>);

impl EventSink {
    fn none() -> Self {
        Self(None)
    }

    async fn emit(&self, phase: WorkflowPhase, step: &str, state: &WorkflowState) {
        let Some(tx) = &self.0 else { return };
        let event = WorkflowEvent::Progress {
            tag: PhaseTag::for_phase(phase),
            step: step.to_string(),
            state: Box::new(state.clone()),
        };
        if tx.send(event).await.is_err() {
            debug!(step, "event receiver dropped");
        }
    }
}

// ── Hat job ───────────────────────────────────────────────────────────────────

/// Everything one hat's generation call needs, owned so it can be spawned.
struct HatJob {
    hat: Hat,
    system: String,
    user: String,
    history: Vec<ChatMessage>,
    search_used: bool,
    /// A lookup was planned for this hat but produced no context.
    missing_lookup: bool,
}

async fn run_hat(generator: &dyn TextGenerator, job: HatJob, timeout: Duration) -> HatOutput {
    let start = Instant::now();
    let outcome =
        tokio::time::timeout(timeout, generator.generate(&job.system, &job.user, &job.history))
            .await;
    let result = match outcome {
        Ok(Ok(text)) if text.trim().is_empty() => Err(GenerationError::EmptyResponse),
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(timeout)),
    };
    let elapsed = start.elapsed();

    match result {
        Ok(text) if job.missing_lookup => HatOutput::partial(
            job.hat,
            text,
            elapsed,
            "allocated lookup produced no results; answered without evidence",
        ),
        Ok(text) => HatOutput::full(job.hat, text, job.search_used, elapsed),
        Err(e) => {
            warn!(hat = %job.hat, error = %e, "hat generation failed");
            HatOutput::placeholder(job.hat, &e.to_string(), elapsed)
        }
    }
}

fn failure_message(output: &HatOutput) -> String {
    let reason = output
        .warnings
        .first()
        .map(String::as_str)
        .unwrap_or("unknown error");
    format!("{} hat failed: {reason}", output.hat.title())
}

// ── PhaseEngine ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PhaseEngine {
    config: Arc<WorkflowConfig>,
    analyzer: QueryAnalyzer,
    orchestrator: Arc<SearchOrchestrator>,
    generator: Arc<dyn TextGenerator>,
}

impl PhaseEngine {
    pub fn new(
        config: WorkflowConfig,
        provider: Arc<dyn SearchProvider>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self, CoordinationError> {
        config.validate()?;
        let orchestrator = Arc::new(SearchOrchestrator::new(provider, &config));
        Ok(Self {
            analyzer: QueryAnalyzer::new(config.lookup_budget),
            orchestrator,
            generator,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Shared lookup layer. The cache outlives individual runs.
    pub fn orchestrator(&self) -> &Arc<SearchOrchestrator> {
        &self.orchestrator
    }

    pub async fn run(&self, query: impl Into<String>) -> Result<WorkflowResult, CoordinationError> {
        self.run_request(WorkflowRequest::new(query)).await
    }

    pub async fn run_request(
        &self,
        request: WorkflowRequest,
    ) -> Result<WorkflowResult, CoordinationError> {
        self.execute(request, &EventSink::none()).await
    }

    /// Run in a background task, reporting progress as each phase and each
    /// hat completes. The last event is `Complete` or `Aborted`.
    pub fn stream(&self, request: WorkflowRequest) -> mpsc::Receiver<WorkflowEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let engine = self.clone();
        tokio::spawn(async move {
            let sink = EventSink(Some(tx.clone()));
            let last = match engine.execute(request, &sink).await {
                Ok(result) => WorkflowEvent::Complete(Box::new(result)),
                Err(e) => WorkflowEvent::Aborted {
                    error: e.to_string(),
                },
            };
            if tx.send(last).await.is_err() {
                debug!("event receiver dropped before completion");
            }
        });
        rx
    }

    async fn execute(
        &self,
        request: WorkflowRequest,
        events: &EventSink,
    ) -> Result<WorkflowResult, CoordinationError> {
        let started = Instant::now();
        let mut machine = StateMachine::new();
        let session = self.orchestrator.session();
        let mut state = WorkflowState::new(request);

        info!(run_id = %state.run_id, budget = self.config.lookup_budget, "workflow started");

        // ── Phase 0 ───────────────────────────────────────────────────────
        state = self.analyze(state)?;
        events.emit(WorkflowPhase::Analyzing, "query_analyzer", &state).await;
        machine.advance(WorkflowPhase::SearchingInitial, None)?;

        state = self.search_initial(state, &session).await;
        events.emit(WorkflowPhase::SearchingInitial, "search_orchestrator", &state).await;
        machine.advance(WorkflowPhase::ProcessingParallel, None)?;

        // ── Phase 1 ───────────────────────────────────────────────────────
        state = self.process_parallel(state, events).await;
        machine.advance(WorkflowPhase::Aggregating, Some("all parallel hats joined"))?;

        // ── Phase 2 ───────────────────────────────────────────────────────
        state = self.aggregate(state);
        events.emit(WorkflowPhase::Aggregating, "aggregator", &state).await;

        if self.should_search_sequential(&state, &session) {
            machine.advance(WorkflowPhase::SearchingSequential, None)?;
            state = self.search_sequential(state, &session).await;
            events.emit(WorkflowPhase::SearchingSequential, "sequential_search", &state).await;
            machine.advance(WorkflowPhase::ProcessingSequential, None)?;
        } else {
            machine.advance(
                WorkflowPhase::ProcessingSequential,
                Some("sequential lookup skipped"),
            )?;
        }

        state = self.process_creative(state).await;
        events.emit(WorkflowPhase::ProcessingSequential, "green_hat", &state).await;
        machine.advance(WorkflowPhase::Synthesizing, None)?;

        // ── Phase 3 ───────────────────────────────────────────────────────
        state = self.synthesize(state).await;
        events.emit(WorkflowPhase::Synthesizing, "blue_hat", &state).await;
        machine.advance(WorkflowPhase::Done, None)?;

        let remaining = session.remaining_budget();
        let search_stats = session.finish();
        self.build_result(state, &machine, search_stats, remaining, started)
    }

    // ── Steps ─────────────────────────────────────────────────────────────

    fn analyze(&self, mut state: WorkflowState) -> Result<WorkflowState, CoordinationError> {
        match self.analyzer.analyze(&state.query) {
            Ok(analysis) => {
                info!(
                    run_id = %state.run_id,
                    allocated = analysis.allocation.len(),
                    rationale = %analysis.rationale,
                    "query analyzed"
                );
                state.analysis = Some(analysis);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(run_id = %state.run_id, error = %e, "analysis failed, continuing without lookups");
                state.errors.push(format!("Query analysis failed: {e}"));
                state.analysis = Some(QueryAnalysis::empty(state.query.clone()));
            }
        }
        state.phases_completed.push(WorkflowPhase::Analyzing);
        Ok(state)
    }

    async fn search_initial(&self, mut state: WorkflowState, session: &SearchSession) -> WorkflowState {
        let requests = state
            .analysis
            .as_ref()
            .map(QueryAnalysis::initial_requests)
            .unwrap_or_default();

        state.initial_contexts = session.resolve_wave(&requests).await;

        info!(
            run_id = %state.run_id,
            requested = requests.len(),
            resolved = state.initial_contexts.len(),
            remaining_budget = session.remaining_budget(),
            "initial lookups resolved"
        );
        state.phases_completed.push(WorkflowPhase::SearchingInitial);
        state
    }

    async fn process_parallel(&self, mut state: WorkflowState, events: &EventSink) -> WorkflowState {
        let sem = Arc::new(Semaphore::new(self.config.max_parallel_hats));
        let timeout = self.config.generation_timeout();
        let mut join_set: JoinSet<HatOutput> = JoinSet::new();

        for hat in Hat::PARALLEL {
            let lookup = state.initial_contexts.get(&hat);
            let allocated = state.analysis.as_ref().is_some_and(|a| a.is_allocated(hat));
            let job = HatJob {
                hat,
                system: system_prompt(hat, &[], lookup),
                user: state.query.clone(),
                history: state.history.clone(),
                search_used: lookup.is_some_and(|c| !c.results.is_empty()),
                missing_lookup: allocated && lookup.is_none(),
            };
            let generator = Arc::clone(&self.generator);
            let sem = Arc::clone(&sem);

            join_set.spawn(async move {
                // The semaphore is never closed; a failed acquire just runs ungated.
                let _permit = sem.acquire().await.ok();
                run_hat(generator.as_ref(), job, timeout).await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(output) => {
                    debug!(hat = %output.hat, level = %output.level, elapsed_ms = output.elapsed_ms, "hat finished");
                    if output.is_placeholder() {
                        state.errors.push(failure_message(&output));
                    }
                    let step = format!("{}_hat", output.hat);
                    state.parallel_outputs.insert(output.hat, output);
                    events.emit(WorkflowPhase::ProcessingParallel, &step, &state).await;
                }
                Err(e) => warn!(error = %e, "hat task panicked"),
            }
        }

        // A panicked task leaves no output behind; fill its slot.
        for hat in Hat::PARALLEL {
            if !state.parallel_outputs.contains_key(&hat) {
                let output = HatOutput::placeholder(hat, "task panicked", Duration::ZERO);
                state.errors.push(failure_message(&output));
                state.parallel_outputs.insert(hat, output);
            }
        }

        state.phases_completed.push(WorkflowPhase::ProcessingParallel);
        state
    }

    fn aggregate(&self, mut state: WorkflowState) -> WorkflowState {
        let aggregated = AggregatedContext::build(&state.parallel_outputs, &state.initial_contexts);
        debug!(
            themes = aggregated.key_themes.len(),
            opportunities = aggregated.synthesis_opportunities.len(),
            "parallel outputs aggregated"
        );
        state.aggregated = Some(aggregated);
        state.phases_completed.push(WorkflowPhase::Aggregating);
        state
    }

    fn should_search_sequential(&self, state: &WorkflowState, session: &SearchSession) -> bool {
        let Some(analysis) = &state.analysis else {
            return false;
        };
        if state.initial_contexts.contains_key(&Hat::CREATIVE) {
            debug!("creative hat already has a lookup context from the initial wave");
            return false;
        }
        analysis.priority(Hat::CREATIVE) != SearchPriority::Never
            && analysis.query_for(Hat::CREATIVE).is_some()
            && session.remaining_budget() > 0
    }

    async fn search_sequential(&self, mut state: WorkflowState, session: &SearchSession) -> WorkflowState {
        let query = state
            .analysis
            .as_ref()
            .and_then(|a| a.query_for(Hat::CREATIVE))
            .map(String::from);
        if let Some(query) = query {
            state.sequential_context = session
                .resolve(Hat::CREATIVE, &query, SearchPhase::Sequential)
                .await;
        }
        state.phases_completed.push(WorkflowPhase::SearchingSequential);
        state
    }

    async fn process_creative(&self, mut state: WorkflowState) -> WorkflowState {
        let hat = Hat::CREATIVE;
        let sections: Vec<String> = state.aggregated.iter().map(AggregatedContext::render).collect();
        let lookup = state.creative_context();
        let expected_lookup = state.analysis.as_ref().is_some_and(|a| a.is_allocated(hat))
            || state.phases_completed.contains(&WorkflowPhase::SearchingSequential);

        let job = HatJob {
            hat,
            system: system_prompt(hat, &sections, lookup),
            user: state.query.clone(),
            history: state.history.clone(),
            search_used: lookup.is_some_and(|c| !c.results.is_empty()),
            missing_lookup: expected_lookup && lookup.is_none(),
        };
        let output = run_hat(self.generator.as_ref(), job, self.config.generation_timeout()).await;
        if output.is_placeholder() {
            state.errors.push(failure_message(&output));
        }
        state.creative_output = Some(output);
        state.phases_completed.push(WorkflowPhase::ProcessingSequential);
        state
    }

    async fn synthesize(&self, mut state: WorkflowState) -> WorkflowState {
        let hat = Hat::SYNTHESIS;
        let has_sequential = state.sequential_context.is_some();
        let contexts = state
            .initial_contexts
            .values()
            .filter(|c| !(has_sequential && c.hat == Hat::CREATIVE))
            .chain(state.sequential_context.iter());
        let synthesis = SynthesisContext::build(&state.outputs(), contexts);

        let job = HatJob {
            hat,
            system: system_prompt(hat, &[synthesis.render()], None),
            user: state.query.clone(),
            history: state.history.clone(),
            search_used: false,
            missing_lookup: false,
        };
        let output = run_hat(self.generator.as_ref(), job, self.config.generation_timeout()).await;
        if output.is_placeholder() {
            state.errors.push(failure_message(&output));
        }
        state.synthesis_output = Some(output);
        state.phases_completed.push(WorkflowPhase::Synthesizing);
        state
    }

    // ── Result ────────────────────────────────────────────────────────────

    fn build_result(
        &self,
        state: WorkflowState,
        machine: &StateMachine,
        search: SearchStats,
        budget_remaining: usize,
        started: Instant,
    ) -> Result<WorkflowResult, CoordinationError> {
        if search.provider_calls as usize > self.config.lookup_budget {
            return Err(CoordinationError::BudgetInvariant(format!(
                "{} provider calls executed for a budget of {}",
                search.provider_calls, self.config.lookup_budget
            )));
        }

        let outputs = state.outputs();
        let placeholders: Vec<Hat> = outputs
            .values()
            .filter(|o| o.is_placeholder())
            .map(|o| o.hat)
            .collect();
        let final_output = state
            .synthesis_output
            .as_ref()
            .map(|o| o.text.clone())
            .unwrap_or_else(|| Hat::SYNTHESIS.placeholder_text());

        let stats = ProcessingStats {
            lookup_budget: self.config.lookup_budget,
            lookups_executed: search.provider_calls,
            cache_hits: search.cache_hits,
            duplicates_prevented: search.duplicates_prevented,
            provider_failures: search.provider_failures,
            budget_remaining,
            phase_timings_ms: machine.phase_durations(),
            total_elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            run_id = %state.run_id,
            lookups = stats.lookups_executed,
            cache_hits = stats.cache_hits,
            duplicates = stats.duplicates_prevented,
            placeholders = placeholders.len(),
            errors = state.errors.len(),
            elapsed_ms = stats.total_elapsed_ms,
            phases = %machine.summary(),
            "workflow complete"
        );

        let analysis = state
            .analysis
            .unwrap_or_else(|| QueryAnalysis::empty(state.query.clone()));

        Ok(WorkflowResult {
            run_id: state.run_id,
            query: state.query,
            final_output,
            outputs,
            analysis,
            aggregated: state.aggregated,
            stats,
            errors: state.errors,
            placeholders,
            phases_completed: state.phases_completed,
            transitions: machine.transitions().to_vec(),
            prompt_version: PROMPT_VERSION.to_string(),
        })
    }
}
