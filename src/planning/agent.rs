//! PlanningAgent - drives one planning run from preferences to itinerary
//!
//! A run moves through `Collecting -> Generating -> Validating -> Complete`,
//! or ends in `Failed`. Tool gathering is best effort: failures are retried
//! with backoff and then recorded as gaps. Generation is strict: output is
//! decoded and validated, never repaired, with a bounded number of model
//! calls per run.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PlanningConfig;
use crate::domain::RunId;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient};
use crate::store::{AnalyticsEvent, AnalyticsSink};
use crate::tools::{ProviderReason, ToolArgs, ToolFailure, ToolKind, ToolOutcome, ToolRegistry, ToolRequest};

use super::bundle::{ContextBundle, ToolGap};
use super::error::PlanningError;
use super::itinerary::{self, Itinerary};
use super::preferences::PreferenceSet;
use super::prompt::PromptRenderer;

/// Share of the budget assumed for accommodation when filtering offers
const LODGING_BUDGET_SHARE: f64 = 0.4;

/// Default max tokens for a generation call
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Lifecycle of a planning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Collecting,
    Generating,
    Validating,
    Complete,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether the state machine permits moving to `to`
    pub fn can_transition_to(&self, to: RunState) -> bool {
        use RunState::*;
        match (self, to) {
            (Collecting, Generating) => true,
            (Generating, Validating) => true,
            // Regeneration after a model error or a rejected itinerary
            (Generating, Generating) | (Validating, Generating) => true,
            (Validating, Complete) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Mutable state of one run, owned by the agent task driving it
#[derive(Debug)]
pub struct PlanningRun {
    pub id: RunId,
    state: RunState,
    preferences: Arc<PreferenceSet>,
    bundle: ContextBundle,
    requested: Vec<ToolKind>,
    attempts: u32,
}

impl PlanningRun {
    pub fn new(id: RunId, preferences: Arc<PreferenceSet>) -> Self {
        Self {
            id,
            state: RunState::Collecting,
            bundle: ContextBundle::new(Arc::clone(&preferences)),
            preferences,
            requested: Vec::new(),
            attempts: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn bundle(&self) -> &ContextBundle {
        &self.bundle
    }

    /// Model calls made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn transition(&mut self, to: RunState) -> Result<(), PlanningError> {
        if !self.state.can_transition_to(to) {
            return Err(PlanningError::State { from: self.state, to });
        }
        debug!(run_id = %self.id, from = ?self.state, ?to, "PlanningRun::transition: called");
        self.state = to;
        Ok(())
    }

    /// Record requested tools that never answered before the run deadline
    fn mark_unresolved(&mut self) {
        let known: Vec<ToolKind> = self
            .bundle
            .tools()
            .into_iter()
            .chain(self.bundle.gaps().into_iter().map(|g| g.tool))
            .collect();
        for kind in self.requested.clone() {
            if !known.contains(&kind) {
                self.bundle.record_gap(
                    kind,
                    ToolFailure::new(ProviderReason::Timeout, "no response before the run deadline"),
                );
            }
        }
    }
}

/// Successful outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTrip {
    pub run_id: RunId,
    pub itinerary: Itinerary,
    pub preferences: PreferenceSet,
    /// Set when some requested tool contributed no data
    pub partial: bool,
    pub gaps: Vec<ToolGap>,
    pub tools_used: Vec<ToolKind>,
    pub attempts: u32,
    pub model: String,
}

/// Terminal failure of a run, with the gaps that contributed
#[derive(Debug, Error)]
#[error("planning run {run_id} failed while {last_state:?}: {error}")]
pub struct PlanFailure {
    pub run_id: RunId,
    #[source]
    pub error: PlanningError,
    pub gaps: Vec<ToolGap>,
    /// State the run was in when it failed
    pub last_state: RunState,
    pub attempts: u32,
}

/// Tools a preference set needs
///
/// Weather and lodging always; events only for trips of two days or more;
/// routing only when both ends of the journey are known.
pub fn select_tools(preferences: &PreferenceSet) -> Vec<ToolKind> {
    let mut kinds = vec![ToolKind::Weather, ToolKind::Lodging];
    if preferences.duration_days >= 2 {
        kinds.push(ToolKind::Events);
    }
    if preferences.known_origin().is_some() && preferences.known_destination().is_some() {
        kinds.push(ToolKind::Routing);
    }
    kinds
}

/// Arguments for one tool derived from the preferences
pub fn build_request(kind: ToolKind, preferences: &PreferenceSet) -> ToolRequest {
    let mut args = ToolArgs::new();
    if let Some(destination) = preferences.known_destination() {
        args.insert("destination".to_string(), Value::from(destination));
    }
    let start_date = preferences.start_date.map(|d| d.format("%Y-%m-%d").to_string());

    match kind {
        ToolKind::Weather => {
            if let Some(date) = start_date {
                args.insert("date".to_string(), Value::from(date));
            }
        }
        ToolKind::Lodging => {
            let nights = preferences.duration_days.saturating_sub(1).max(1);
            let nightly = preferences.budget.amount * LODGING_BUDGET_SHARE / f64::from(nights);
            args.insert("currency".to_string(), Value::from(preferences.budget.currency.clone()));
            args.insert("max_price_per_night".to_string(), Value::from(nightly));
            args.insert("nights".to_string(), Value::from(nights));
            args.insert("guests".to_string(), Value::from(preferences.group_size));
            if let Some(date) = start_date {
                args.insert("check_in".to_string(), Value::from(date));
            }
        }
        ToolKind::Events => {
            let tags: Vec<Value> = preferences.interests.iter().map(|t| Value::from(t.as_str())).collect();
            args.insert("interests".to_string(), Value::Array(tags));
            if let Some(date) = start_date {
                args.insert("from".to_string(), Value::from(date));
            }
        }
        ToolKind::Routing => {
            if let Some(origin) = preferences.known_origin() {
                args.insert("origin".to_string(), Value::from(origin));
            }
        }
    }

    ToolRequest::new(kind.name(), args)
}

/// Runs the planning state machine against a shared registry and model
pub struct PlanningAgent {
    registry: Arc<ToolRegistry>,
    llm: Arc<dyn LlmClient>,
    config: PlanningConfig,
    prompts: PromptRenderer,
    max_tokens: u32,
    analytics: Option<Arc<dyn AnalyticsSink>>,
}

impl PlanningAgent {
    pub fn new(registry: Arc<ToolRegistry>, llm: Arc<dyn LlmClient>, config: PlanningConfig) -> Self {
        let prompts = PromptRenderer::new(config.max_prompt_chars, config.max_items_per_tool);
        Self {
            registry,
            llm,
            config,
            prompts,
            max_tokens: DEFAULT_MAX_TOKENS,
            analytics: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    /// Run one planning pass for the given preferences
    pub async fn plan(&self, preferences: PreferenceSet) -> Result<PlannedTrip, PlanFailure> {
        let label = preferences.known_destination().unwrap_or("trip").to_string();
        let preferences = Arc::new(preferences);
        let mut run = PlanningRun::new(RunId::generate(&label), Arc::clone(&preferences));
        info!(run_id = %run.id, destination = %label, "plan: starting run");

        if let Err(e) = preferences.validate() {
            return Err(self.fail(run, e));
        }

        let deadline = self.config.run_timeout();
        match tokio::time::timeout(deadline, self.execute(&mut run)).await {
            Ok(Ok(itinerary)) => {
                if let Err(e) = run.transition(RunState::Complete) {
                    return Err(self.fail(run, e));
                }
                Ok(self.complete(run, itinerary))
            }
            Ok(Err(e)) => Err(self.fail(run, e)),
            Err(_) => {
                warn!(run_id = %run.id, state = ?run.state, ?deadline, "plan: run deadline reached");
                run.mark_unresolved();
                Err(self.fail(run, PlanningError::Timeout(deadline)))
            }
        }
    }

    async fn execute(&self, run: &mut PlanningRun) -> Result<Itinerary, PlanningError> {
        self.collect(run).await;
        self.generate(run).await
    }

    /// Gather tool data into the bundle, retrying transient failures
    async fn collect(&self, run: &mut PlanningRun) {
        let preferences = Arc::clone(&run.preferences);
        run.requested = select_tools(&preferences);
        info!(run_id = %run.id, tools = ?run.requested, "collect: requesting tools");

        let mut pending: Vec<ToolRequest> = run.requested.iter().map(|k| build_request(*k, &preferences)).collect();
        let mut round = 0u32;

        while !pending.is_empty() {
            let responses = self.registry.invoke_batch(pending.clone()).await;
            let mut retry = Vec::new();

            for (request, response) in pending.iter().zip(responses) {
                let Ok(kind) = request.tool.parse::<ToolKind>() else {
                    warn!(tool = %request.tool, "collect: response for unknown tool kind");
                    continue;
                };
                let failure = match response.outcome {
                    ToolOutcome::Ok(payload) if payload.kind() == kind => {
                        run.bundle.merge(payload);
                        continue;
                    }
                    ToolOutcome::Ok(payload) => {
                        warn!(run_id = %run.id, %kind, returned = %payload.kind(), "collect: payload kind mismatch");
                        ToolFailure::new(
                            ProviderReason::BadResponse,
                            format!("{} returned {} data", kind, payload.kind()),
                        )
                    }
                    ToolOutcome::Error(failure) => failure,
                };
                if failure.is_retryable() && round < self.config.max_tool_retries {
                    debug!(%kind, reason = %failure.reason, round, "collect: will retry");
                    retry.push(request.reissue());
                } else {
                    warn!(run_id = %run.id, %kind, reason = %failure.reason, "collect: recording gap");
                    run.bundle.record_gap(kind, failure);
                }
            }

            if retry.is_empty() {
                break;
            }
            round += 1;
            let delay = self.config.backoff(round);
            debug!(round, ?delay, retries = retry.len(), "collect: backing off");
            tokio::time::sleep(delay).await;
            pending = retry;
        }

        info!(
            run_id = %run.id,
            collected = run.bundle.len(),
            gaps = run.bundle.gaps().len(),
            "collect: done"
        );
    }

    /// Call the model and validate its output, regenerating within budget
    async fn generate(&self, run: &mut PlanningRun) -> Result<Itinerary, PlanningError> {
        let budget = self.config.max_generation_attempts.max(1);
        let mut previous_failure: Option<String> = None;
        let mut last_error = None;

        for _ in 0..budget {
            run.transition(RunState::Generating)?;
            let prompt = self.prompts.render(&run.bundle, previous_failure.as_deref())?;
            run.attempts += 1;
            debug!(run_id = %run.id, attempt = run.attempts, "generate: calling model");

            let request = CompletionRequest::single(prompt.system, prompt.user, self.max_tokens);
            let raw = match self.llm.complete(request).await.and_then(CompletionResponse::into_text) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        run_id = %run.id,
                        attempt = run.attempts,
                        code = e.code(),
                        transient = e.is_transient(),
                        error = %e,
                        "generate: model call failed"
                    );
                    last_error = Some(PlanningError::Model(e));
                    continue;
                }
            };

            run.transition(RunState::Validating)?;
            let checked = itinerary::decode(&raw)
                .and_then(|it| itinerary::validate(&it, &run.bundle, self.config.budget_tolerance).map(|()| it));
            match checked {
                Ok(itinerary) => return Ok(itinerary),
                Err(e) => {
                    warn!(run_id = %run.id, attempt = run.attempts, error = %e, "generate: itinerary rejected");
                    previous_failure = Some(e.to_string());
                    last_error = Some(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PlanningError::Prompt("no generation attempt was made".to_string())))
    }

    fn complete(&self, run: PlanningRun, itinerary: Itinerary) -> PlannedTrip {
        let gaps = run.bundle.gaps();
        let trip = PlannedTrip {
            run_id: run.id.clone(),
            partial: !gaps.is_empty(),
            gaps,
            tools_used: run.bundle.tools(),
            attempts: run.attempts,
            model: self.llm.model().to_string(),
            preferences: (*run.preferences).clone(),
            itinerary,
        };
        info!(
            run_id = %trip.run_id,
            days = trip.itinerary.days.len(),
            partial = trip.partial,
            attempts = trip.attempts,
            "plan: run complete"
        );
        self.emit(AnalyticsEvent::TripCreated {
            run_id: trip.run_id.clone(),
            destination: trip.itinerary.destination.clone(),
            total: trip.itinerary.total(),
            partial: trip.partial,
        });
        trip
    }

    fn fail(&self, mut run: PlanningRun, error: PlanningError) -> PlanFailure {
        let last_state = run.state;
        if run.transition(RunState::Failed).is_err() {
            debug!(run_id = %run.id, ?last_state, "fail: run already terminal");
        }
        warn!(run_id = %run.id, ?last_state, code = error.code(), error = %error, "plan: run failed");
        let gaps = run.bundle.gaps();
        self.emit(AnalyticsEvent::PlanFailed {
            run_id: run.id.clone(),
            error: error.code().to_string(),
            gaps: gaps.len(),
        });
        PlanFailure {
            run_id: run.id,
            error,
            gaps,
            last_state,
            attempts: run.attempts,
        }
    }

    fn emit(&self, event: AnalyticsEvent) {
        if let Some(sink) = &self.analytics {
            sink.record(event);
        }
    }

    /// Run deadline in effect
    pub fn run_timeout(&self) -> Duration {
        self.config.run_timeout()
    }
}
