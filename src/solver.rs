//! Iterative tool-using solver loops driven by a [`Broker`] (spec §4.5).
//!
//! Two variants:
//!
//! - [`ReactSolver`]: the explicit `Thinking → Deciding → {Acting, Thinking,
//!   Finishing, Failed}` state machine. Thinking (producing a thought and a
//!   refined plan) and Deciding (classifying the round as `PLAN`/`ACT`/
//!   `FINISH`) are realized as a single structured call per round — the
//!   model reasons through both in one turn rather than two round-trips —
//!   but the two phases remain logically distinct: the plan is recorded
//!   before the decision is branched on, exactly as the state diagram
//!   requires.
//! - [`SimpleSolver`]: loops plain generation and matches the response for
//!   a standalone, case-insensitive DONE/FAIL token.
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::broker::Broker;
use crate::chat_session::ChatSession;
use crate::config::SolverConfig;
use crate::error::CoreError;
use crate::message::{CompletionConfig, Message};
use crate::tool::ToolRegistry;

/// Result of running a solver to completion.
#[derive(Debug, Clone)]
pub enum SolverOutcome {
    /// The goal was reached; carries the final answer.
    Done(String),
    /// The solver gave up — either the model deliberately declared failure
    /// (`FINISH` is never reached), it asked for a tool that doesn't exist
    /// or passed it malformed arguments, or (for [`ReactSolver`]
    /// specifically, spec §4.5's `Deciding → Failed` transition) the
    /// iteration cap was exceeded while still acting. Carries the stated
    /// or synthesized reason.
    Failed(String),
    /// [`SimpleSolver`]-specific: the iteration cap was hit without a
    /// DONE/FAIL token ever appearing. Carries a synthesized summary
    /// produced by one last, unconditional call — never silence on
    /// exhaustion. [`ReactSolver`] has an explicit `Failed` transition for
    /// this case instead (spec §4.5) and never returns this variant.
    IterationsExhausted(String),
}

/// Shared goal-tracking shape across solver variants (spec §3). `iteration`
/// only advances on a completed Acting step (spec §4.5's `Acting → Deciding`
/// transition) — a round that merely refines the plan (`PLAN`) does not
/// count against the cap.
#[derive(Debug, Clone)]
pub struct GoalState {
    pub goal: String,
    pub iteration: usize,
    pub max_iterations: usize,
    pub solution: Option<String>,
    pub is_complete: bool,
}

impl GoalState {
    fn new(goal: impl Into<String>, max_iterations: usize) -> Self {
        GoalState {
            goal: goal.into(),
            iteration: 0,
            max_iterations,
            solution: None,
            is_complete: false,
        }
    }
}

/// One thought/action/observation triple recorded after an Acting step
/// (spec §4.5's "Context carried across iterations").
#[derive(Debug, Clone)]
pub struct HistoryStep {
    pub thought: String,
    pub action: String,
    pub observation: String,
}

/// The step-wise plan produced by Thinking and refined across rounds. May
/// be empty initially (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub steps: Vec<String>,
}

/// Explicit ReAct states (spec §4.5), tracked only for tracing/diagnostics
/// — the control flow itself is the `run` loop below, not a dispatch table
/// over this enum, since each state's transition logic differs too much
/// (argument validation in Deciding, a distinct summarizer call in
/// Finishing) to benefit from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SolverState {
    Thinking,
    Deciding,
    Acting,
    Finishing,
    Failed,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum DecisionKind {
    Plan,
    Act,
    Finish,
}

#[derive(Debug, Deserialize)]
struct ThinkAndDecide {
    thought: String,
    #[serde(default)]
    plan_steps: Vec<String>,
    decision: DecisionKind,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    tool_arguments: Option<Value>,
}

fn think_and_decide_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "thought": {"type": "string"},
            "plan_steps": {"type": "array", "items": {"type": "string"}},
            "decision": {"type": "string", "enum": ["plan", "act", "finish"]},
            "tool_name": {"type": "string"},
            "tool_arguments": {"type": "object"}
        },
        "required": ["thought", "decision"]
    })
}

/// Safety bound on Thinking/Deciding rounds that never reach Acting or
/// Finishing (e.g. a model stuck repeatedly choosing `PLAN`). Spec §4.5
/// only bounds the Acting-driven iteration counter explicitly; this guards
/// liveness for the case it leaves open, scaled generously off the
/// configured cap so it never fires before a well-behaved run would
/// naturally finish.
const MAX_PLANNING_ROUNDS_PER_ITERATION: usize = 4;

/// Explicit state-machine solver: Thinking produces a thought and refines
/// the plan, Deciding classifies the round as `PLAN | ACT | FINISH`, Acting
/// executes a validated tool call and records the observation, Finishing
/// makes one closing summarizer call. See the module docs for why Thinking
/// and Deciding share one gateway round-trip.
pub struct ReactSolver {
    broker: Arc<Broker>,
    tools: Arc<ToolRegistry>,
    config: SolverConfig,
}

impl ReactSolver {
    pub fn new(broker: Arc<Broker>, tools: Arc<ToolRegistry>, config: SolverConfig) -> Self {
        ReactSolver { broker, tools, config }
    }

    pub async fn run(
        &self,
        goal: &str,
        session: &mut ChatSession,
    ) -> Result<SolverOutcome, CoreError> {
        session.push(Message::user(goal));
        let config = CompletionConfig::default();

        let mut goal_state = GoalState::new(goal, self.config.max_iterations);
        let mut plan = Plan::default();
        let mut history: Vec<HistoryStep> = Vec::new();
        let mut state = SolverState::Thinking;
        let mut planning_rounds_this_iteration = 0usize;
        let mut failure_reason = String::new();

        loop {
            match state {
                SolverState::Thinking => {
                    planning_rounds_this_iteration += 1;
                    if planning_rounds_this_iteration > MAX_PLANNING_ROUNDS_PER_ITERATION {
                        failure_reason = format!(
                            "exceeded {MAX_PLANNING_ROUNDS_PER_ITERATION} planning rounds without acting or finishing"
                        );
                        state = SolverState::Failed;
                        continue;
                    }

                    let decision = self.think_and_decide(session, &plan, &history, &config).await?;
                    log::debug!("solver thought: {}", decision.thought);
                    session.push(Message::assistant(decision.thought.clone()));
                    if !decision.plan_steps.is_empty() {
                        plan.steps = decision.plan_steps.clone();
                    }

                    match decision.decision {
                        DecisionKind::Plan => {
                            state = SolverState::Thinking;
                        }
                        DecisionKind::Act => match self.validate_act(&decision).await {
                            Ok((tool_name, tool_arguments)) => {
                                state = SolverState::Acting;
                                self.act(session, &mut history, &decision.thought, &tool_name, tool_arguments)
                                    .await;
                                goal_state.iteration += 1;
                                planning_rounds_this_iteration = 0;
                                if goal_state.iteration >= goal_state.max_iterations {
                                    failure_reason = format!(
                                        "exceeded max iterations ({}); last observation: {}",
                                        goal_state.max_iterations,
                                        history.last().map(|h| h.observation.as_str()).unwrap_or(""),
                                    );
                                    state = SolverState::Failed;
                                } else {
                                    state = SolverState::Deciding;
                                }
                            }
                            Err(reason) => {
                                return Ok(SolverOutcome::Failed(reason));
                            }
                        },
                        DecisionKind::Finish => {
                            state = SolverState::Finishing;
                        }
                    }
                }
                SolverState::Deciding => {
                    // Acting already transitioned back into Thinking's
                    // combined think-and-decide call for the next round.
                    state = SolverState::Thinking;
                }
                SolverState::Acting => unreachable!("Acting is driven synchronously from Thinking"),
                SolverState::Finishing => {
                    let answer = self.finish(session, &config).await?;
                    goal_state.is_complete = true;
                    goal_state.solution = Some(answer.clone());
                    return Ok(SolverOutcome::Done(answer));
                }
                SolverState::Failed => {
                    return Ok(SolverOutcome::Failed(failure_reason));
                }
            }
        }
    }

    async fn think_and_decide(
        &self,
        session: &ChatSession,
        plan: &Plan,
        history: &[HistoryStep],
        config: &CompletionConfig,
    ) -> Result<ThinkAndDecide, CoreError> {
        let mut request = session.context();
        request.push(Message::user(render_scratchpad(plan, history)));

        let schema = think_and_decide_schema();
        let decision_value = tokio::time::timeout(
            self.config.call_timeout,
            self.broker.generate_object(&request, &schema, config),
        )
        .await
        .map_err(|_| CoreError::Timeout)??;

        serde_json::from_value(decision_value).map_err(|e| CoreError::InvalidResponse(e.to_string()))
    }

    /// Deciding → {Acting, Failed}: ACT requires a tool name resolving to
    /// one of the available tools and an argument object (spec §4.5).
    async fn validate_act(&self, decision: &ThinkAndDecide) -> Result<(String, Value), String> {
        let tool_name = decision
            .tool_name
            .clone()
            .ok_or_else(|| "ACT decision without a tool_name".to_string())?;
        if self.tools.get(&tool_name).await.is_none() {
            return Err(format!("ACT decision named unknown tool '{tool_name}'"));
        }
        let tool_arguments = match &decision.tool_arguments {
            Some(Value::Object(_)) => decision.tool_arguments.clone().unwrap(),
            Some(_) => return Err(format!("tool_arguments for '{tool_name}' must be a JSON object")),
            None => json!({}),
        };
        Ok((tool_name, tool_arguments))
    }

    /// Acting → Deciding: executes the validated tool call, appends the
    /// `{thought, action, observation}` triple to history, and feeds the
    /// observation back into the session so the next Thinking round sees
    /// it. Tool failures become observations rather than propagating —
    /// the loop continues (spec §4.5's failure semantics).
    async fn act(
        &self,
        session: &mut ChatSession,
        history: &mut Vec<HistoryStep>,
        thought: &str,
        tool_name: &str,
        tool_arguments: Value,
    ) {
        let outcome = self.tools.execute(tool_name, tool_arguments.clone()).await;
        let observation = match &outcome {
            Ok(result) if result.success => result.output.to_string(),
            Ok(result) => result
                .error
                .clone()
                .unwrap_or_else(|| "tool reported failure".to_string()),
            Err(err) => err.to_string(),
        };

        let action = format!("{tool_name}({tool_arguments})");
        session.push(Message::user(format!("Observation: {observation}")));
        history.push(HistoryStep {
            thought: thought.to_string(),
            action,
            observation,
        });
    }

    /// Finishing → terminal: a dedicated summarizer call distinct from
    /// [`SimpleSolver`]'s iteration-cap-exhaustion summary — this one fires
    /// on a deliberate FINISH decision, not on giving up.
    async fn finish(&self, session: &mut ChatSession, config: &CompletionConfig) -> Result<String, CoreError> {
        let mut request = session.context();
        request.push(Message::user(
            "You've decided the goal is complete. State your final answer to the user's goal.",
        ));
        let response = tokio::time::timeout(self.config.call_timeout, self.broker.generate(&request, config))
            .await
            .map_err(|_| CoreError::Timeout)??;
        session.push(response.clone());
        Ok(response.content.to_string())
    }
}

fn render_scratchpad(plan: &Plan, history: &[HistoryStep]) -> String {
    let mut out = String::new();
    if !plan.steps.is_empty() {
        out.push_str("Current plan:\n");
        for (i, step) in plan.steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step));
        }
    }
    if !history.is_empty() {
        out.push_str("History so far:\n");
        for (i, step) in history.iter().enumerate() {
            out.push_str(&format!(
                "{}. thought: {} | action: {} | observation: {}\n",
                i + 1,
                step.thought,
                step.action,
                step.observation
            ));
        }
    }
    out.push_str(
        "Decide PLAN (refine the plan and think again), ACT (invoke one tool), or FINISH \
         (the goal is complete).",
    );
    out
}

/// Word-boundary DONE/FAIL matching, case-insensitive. Deliberately
/// accepts false positives on phrases like "I am done trying" — see
/// spec/DESIGN.md; this is intended behavior, not a bug to fix.
pub struct SimpleSolver {
    broker: Arc<Broker>,
    config: SolverConfig,
    done_re: Regex,
    fail_re: Regex,
}

impl SimpleSolver {
    pub fn new(broker: Arc<Broker>, config: SolverConfig) -> Self {
        SimpleSolver {
            broker,
            config,
            done_re: Regex::new(r"(?i)\bdone\b").unwrap(),
            fail_re: Regex::new(r"(?i)\bfail\b").unwrap(),
        }
    }

    pub async fn run(
        &self,
        goal: &str,
        session: &mut ChatSession,
    ) -> Result<SolverOutcome, CoreError> {
        session.push(Message::user(goal));
        let config = CompletionConfig::default();

        for _ in 0..self.config.max_iterations {
            let response = tokio::time::timeout(
                self.config.call_timeout,
                self.broker.generate(&session.context(), &config),
            )
            .await
            .map_err(|_| CoreError::Timeout)??;

            let content = response.content.to_string();
            session.push(response);

            if self.fail_re.is_match(&content) {
                return Ok(SolverOutcome::Failed(content));
            }
            if self.done_re.is_match(&content) {
                return Ok(SolverOutcome::Done(content));
            }
        }

        let mut request = session.context();
        request.push(Message::user(
            "You've run out of iterations. Summarize the current state and your best answer so far.",
        ));
        let response = self.broker.generate(&request, &config).await?;
        Ok(SolverOutcome::IterationsExhausted(response.content.to_string()))
    }
}
