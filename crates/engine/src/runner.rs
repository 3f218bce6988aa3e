//! The Graph Runner: drives one compiled [`ExecutionPlan`] to a terminal
//! [`ExecutionStatus`], one node at a time.
//!
//! Dispatch is intentionally single-threaded — at most one node handler
//! runs at any instant for a given execution. Concurrency across
//! executions is the Supervisor's concern; within an execution, determinism
//! (replayable journals, deterministic tie-breaks in routing) matters more
//! than throughput.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kestrel_compiler::{BoundNode, ExecutionPlan};
use kestrel_core::{Clock, NodeId};
use kestrel_core::constants::{RETRY_BACKOFF_BASE, RETRY_BACKOFF_CAP, SYSTEM_MAX_LOOPS};
use kestrel_execution::{
    ExecutionContext, ExecutionState, ExecutionStatus, IdempotencyKey, JournalEntry, NodeAttempt,
    NodeOutput, ExecutionOutput,
};
use kestrel_node::{HandlerError, NodeContext, NodeResult};
use kestrel_workflow::{DependencyGraph, EdgeKind, ErrorPolicy, NodeState as WfNodeState};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::credentials::CredentialProvider;
use crate::error::EngineError;
use crate::hooks::{Decision, RunnerHooks};
use crate::outcome::NodeOutcome;
use crate::result::EngineOutcome;
use crate::template::{resolve_templates, TemplateContext};

/// Drives a single [`ExecutionPlan`] against one [`ExecutionContext`]/
/// [`ExecutionState`] pair.
pub struct GraphRunner {
    plan: Arc<ExecutionPlan>,
    hooks: Arc<dyn RunnerHooks>,
    credentials: Arc<dyn CredentialProvider>,
    clock: Arc<dyn Clock>,
}

/// Outcome of exhausting a node's attempt budget.
enum AttemptOutcome {
    Success(NodeResult),
    Exhausted(HandlerError),
    Cancelled,
}

impl GraphRunner {
    /// Construct a runner bound to a plan, a hook implementation, a
    /// credential source, and a clock.
    #[must_use]
    pub fn new(
        plan: Arc<ExecutionPlan>,
        hooks: Arc<dyn RunnerHooks>,
        credentials: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plan,
            hooks,
            credentials,
            clock,
        }
    }

    /// Drive `ctx`/`state` to a terminal status.
    ///
    /// `state.status` must already be [`ExecutionStatus::Running`] — the
    /// Supervisor owns the `Pending -> Running` transition, since it also
    /// owns deciding *when* a queued execution gets a turn.
    ///
    /// # Errors
    /// Returns [`EngineError`] if the workflow's structural graph cannot be
    /// built, if the plan is missing a binding for a scheduled node, or if
    /// a node-level state transition is rejected as invalid.
    pub async fn run(
        &self,
        ctx: &ExecutionContext,
        state: &mut ExecutionState,
        input: Value,
    ) -> Result<EngineOutcome, EngineError> {
        let graph = DependencyGraph::from_workflow(&ctx.workflow)?;
        let mut routing = Routing::new(&graph, &ctx.workflow);
        let mut journal = vec![JournalEntry::ExecutionStarted {
            timestamp: self.clock.now(),
        }];
        let mut visited: HashSet<NodeId> = HashSet::new();

        let mut queue: VecDeque<NodeId> = self.plan.entry_nodes.iter().copied().collect();
        routing.enqueued = queue.iter().copied().collect();

        let mut cancelled = false;
        let mut aborted = false;
        let mut failing_node_id: Option<NodeId> = None;
        let mut error_message: Option<String> = None;

        'drive: while let Some(node_id) = queue.pop_front() {
            routing.enqueued.remove(&node_id);

            if ctx.check_cancelled().is_err() {
                cancelled = true;
                break 'drive;
            }

            if self.hooks.before_node(ctx.execution_id, node_id).await == Decision::Abort {
                aborted = true;
                break 'drive;
            }

            journal.push(JournalEntry::NodeScheduled {
                timestamp: self.clock.now(),
                node_id,
            });

            let bound = self.plan.node(node_id)?;
            let node_input = resolve_node_input(node_id, &graph, ctx, &input);
            let raw_config = ctx
                .workflow
                .node(node_id)
                .map(|n| n.config.clone())
                .unwrap_or(Value::Null);
            let config = match self.resolve_config(&node_input, &raw_config, ctx) {
                Ok(c) => c,
                Err(err) => {
                    let handler_err = HandlerError::fatal(err.to_string());
                    journal.push(JournalEntry::NodeFailed {
                        timestamp: self.clock.now(),
                        node_id,
                        error: handler_err.to_string(),
                    });
                    match self
                        .decide_on_error(ctx.execution_id, &handler_err, node_id, &ctx.workflow.settings.error_policy, &self.plan)
                        .await
                    {
                        Ok(ErrorDecision::RouteError) => {
                            routing.route(node_id, "error", &ctx.workflow, state, &mut journal, self.clock.as_ref())?;
                            self.enqueue_ready(&mut routing, &mut queue);
                            continue 'drive;
                        }
                        Ok(ErrorDecision::Retry) => {
                            queue.push_front(node_id);
                            routing.enqueued.insert(node_id);
                            continue 'drive;
                        }
                        Ok(ErrorDecision::Fail) | Err(_) => {
                            failing_node_id = Some(node_id);
                            error_message = Some(handler_err.to_string());
                            break 'drive;
                        }
                    }
                }
            };

            let (outcome, attempts) = self
                .run_attempts(ctx, bound, node_id, &node_input, &config, &mut journal)
                .await;

            if attempts.len() > 1 {
                state.total_retries = state.total_retries.saturating_add(attempts.len() as u32 - 1);
            }

            match outcome {
                AttemptOutcome::Cancelled => {
                    cancelled = true;
                    break 'drive;
                }
                AttemptOutcome::Success(result) => {
                    let now = self.clock.now();
                    let duration = attempts.last().and_then(NodeAttempt::duration).and_then(|d| d.to_std().ok());

                    if let Some(&loop_node_id) = routing.body_to_loop.get(&node_id) {
                        ctx.accumulate_result(loop_node_id, Value::Object(result.data.clone()));
                    }

                    let effective_handle = routing.effective_handle(node_id, &result.output_handle, &ctx.workflow, &self.plan);
                    let publish_value = if effective_handle == "done" && self.plan.loop_carrying_node_ids.contains(&node_id) {
                        Value::Array(ctx.accumulated_results(node_id))
                    } else {
                        Value::Object(result.data.clone())
                    };

                    let node_output = NodeOutput::new(
                        ExecutionOutput::inline(publish_value),
                        WfNodeState::Completed,
                        now,
                        duration,
                    );
                    ctx.set_node_output(node_id, node_output.clone());
                    state.total_output_bytes = state.total_output_bytes.saturating_add(node_output.bytes);
                    record_dispatch(
                        state,
                        node_id,
                        &mut visited,
                        now,
                        attempts,
                        Some(node_output),
                        None,
                        WfNodeState::Completed,
                    )?;

                    journal.push(JournalEntry::NodeCompleted {
                        timestamp: now,
                        node_id,
                        output_bytes: result.approximate_size_bytes(),
                        output_handle: effective_handle.clone(),
                    });

                    let outcome = NodeOutcome::success(Value::Object(result.data.clone()), effective_handle.clone());
                    if self.hooks.after_node(ctx.execution_id, node_id, &outcome).await == Decision::Abort {
                        aborted = true;
                        break 'drive;
                    }

                    if let Err(err) = routing.route(node_id, &effective_handle, &ctx.workflow, state, &mut journal, self.clock.as_ref()) {
                        if matches!(err, EngineError::LoopLimitExceeded { .. }) {
                            failing_node_id = Some(node_id);
                            error_message = Some(err.to_string());
                            break 'drive;
                        }
                        return Err(err);
                    }
                    self.enqueue_ready(&mut routing, &mut queue);
                }
                AttemptOutcome::Exhausted(err) => {
                    let now = self.clock.now();
                    record_dispatch(
                        state,
                        node_id,
                        &mut visited,
                        now,
                        attempts,
                        None,
                        Some(err.to_string()),
                        WfNodeState::Failed,
                    )?;
                    journal.push(JournalEntry::NodeFailed {
                        timestamp: now,
                        node_id,
                        error: err.to_string(),
                    });

                    match self
                        .decide_on_error(ctx.execution_id, &err, node_id, &ctx.workflow.settings.error_policy, &self.plan)
                        .await
                    {
                        Ok(ErrorDecision::RouteError) => {
                            routing.route(node_id, "error", &ctx.workflow, state, &mut journal, self.clock.as_ref())?;
                            self.enqueue_ready(&mut routing, &mut queue);
                        }
                        Ok(ErrorDecision::Retry) => {
                            queue.push_front(node_id);
                            routing.enqueued.insert(node_id);
                        }
                        Ok(ErrorDecision::Fail) => {
                            failing_node_id = Some(node_id);
                            error_message = Some(err.to_string());
                            break 'drive;
                        }
                        Err(hook_err) => {
                            failing_node_id = Some(hook_err.0);
                            error_message = Some(hook_err.1);
                            break 'drive;
                        }
                    }
                }
            }
        }

        let final_status = if cancelled || ctx.cancellation.is_cancelled() {
            ExecutionStatus::Cancelled
        } else if aborted || failing_node_id.is_some() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };

        let now = self.clock.now();
        state.transition_status(final_status, now)?;

        if final_status == ExecutionStatus::Failed {
            journal.push(JournalEntry::ExecutionFailed {
                timestamp: now,
                failing_node_id,
                error: error_message.clone().unwrap_or_default(),
            });
        } else {
            journal.push(JournalEntry::ExecutionCompleted {
                timestamp: now,
                status: final_status,
            });
        }

        let output = assemble_output(&self.plan, ctx);

        Ok(EngineOutcome {
            status: final_status,
            output,
            failing_node_id,
            error_message,
            journal,
        })
    }

    fn resolve_config(
        &self,
        node_input: &Value,
        raw_config: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError> {
        let vars = ctx.all_variables();
        let outputs: HashMap<NodeId, Value> = ctx
            .all_node_outputs()
            .into_iter()
            .map(|(id, out)| (id, out.as_value().clone()))
            .collect();
        let template_ctx = TemplateContext {
            input: node_input,
            vars: &vars,
            outputs: &outputs,
        };
        resolve_templates(raw_config, &template_ctx)
    }

    /// Run up to `1 + bound.effective_max_retries` attempts of a node,
    /// racing each against its effective timeout and the execution's
    /// cancellation token, with cancellable exponential backoff between
    /// retryable failures.
    async fn run_attempts(
        &self,
        ctx: &ExecutionContext,
        bound: &BoundNode,
        node_id: NodeId,
        input: &Value,
        config: &Value,
        journal: &mut Vec<JournalEntry>,
    ) -> (AttemptOutcome, Vec<NodeAttempt>) {
        let max_attempts = 1 + bound.effective_max_retries;
        let mut records = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            if ctx.check_cancelled().is_err() {
                return (AttemptOutcome::Cancelled, records);
            }

            let started_at = self.clock.now();
            let idem_key = IdempotencyKey::generate(ctx.execution_id, node_id, attempt);
            journal.push(JournalEntry::NodeStarted {
                timestamp: started_at,
                node_id,
                attempt,
            });

            let node_ctx = NodeContext::new(ctx.execution_id, node_id, ctx.workflow.id)
                .with_cancellation(ctx.cancellation.clone())
                .with_credentials(self.credentials.credentials_for(node_id))
                .with_variables(ctx.variables_handle());

            let timeout_dur = Duration::from_millis(bound.effective_timeout_ms);
            let exec_future = bound.handler.execute(input.clone(), config.clone(), node_ctx);

            let attempt_result: Result<NodeResult, HandlerError> = tokio::select! {
                res = tokio::time::timeout(timeout_dur, exec_future) => match res {
                    Ok(inner) => inner,
                    Err(_) => Err(HandlerError::retryable(format!(
                        "node {node_id} attempt {attempt} timed out after {timeout_dur:?}"
                    ))),
                },
                () = ctx.cancellation.cancelled() => Err(HandlerError::Cancelled),
            };

            let mut record = NodeAttempt::new(attempt, idem_key, started_at);

            match attempt_result {
                Ok(result) => {
                    let completed_at = self.clock.now();
                    record.complete_success(
                        ExecutionOutput::inline(Value::Object(result.data.clone())),
                        result.approximate_size_bytes(),
                        completed_at,
                    );
                    records.push(record);
                    return (AttemptOutcome::Success(result), records);
                }
                Err(HandlerError::Cancelled) => {
                    record.complete_failure("cancelled", self.clock.now());
                    records.push(record);
                    return (AttemptOutcome::Cancelled, records);
                }
                Err(err) => {
                    record.complete_failure(err.to_string(), self.clock.now());
                    records.push(record);
                    attempt += 1;
                    if err.is_retryable() && attempt < max_attempts {
                        let backoff = err.backoff_hint().unwrap_or_else(|| compute_backoff(attempt));
                        journal.push(JournalEntry::NodeRetrying {
                            timestamp: self.clock.now(),
                            node_id,
                            attempt,
                        });
                        debug!(%node_id, attempt, ?backoff, "retrying node after backoff");
                        sleep_cancellable(backoff, &ctx.cancellation).await;
                        continue;
                    }
                    return (AttemptOutcome::Exhausted(err), records);
                }
            }
        }
    }

    /// Apply the `on_error` hook, then reconcile its decision against the
    /// workflow's partial-failure policy: `Abort` always fails; `Continue`
    /// routes through an `"error"` handle only when `error_policy` is
    /// `Continue` and the node declares one, otherwise it fails too.
    async fn decide_on_error(
        &self,
        execution_id: kestrel_core::ExecutionId,
        err: &HandlerError,
        node_id: NodeId,
        error_policy: &ErrorPolicy,
        plan: &ExecutionPlan,
    ) -> Result<ErrorDecision, (NodeId, String)> {
        match self.hooks.on_error(execution_id, node_id, err).await {
            Decision::Abort => Err((node_id, err.to_string())),
            Decision::Retry => Ok(ErrorDecision::Retry),
            Decision::Continue => {
                let has_error_route = !plan.next_nodes(node_id, "error").is_empty();
                if matches!(error_policy, ErrorPolicy::Continue) && has_error_route {
                    Ok(ErrorDecision::RouteError)
                } else {
                    Ok(ErrorDecision::Fail)
                }
            }
        }
    }

    fn enqueue_ready(&self, routing: &mut Routing, queue: &mut VecDeque<NodeId>) {
        for node_id in routing.drain_ready() {
            queue.push_back(node_id);
        }
    }
}

enum ErrorDecision {
    RouteError,
    Retry,
    Fail,
}

fn compute_backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let multiplier = 2u64.saturating_pow(exponent);
    let millis = (RETRY_BACKOFF_BASE.as_millis() as u64).saturating_mul(multiplier);
    Duration::from_millis(millis).min(RETRY_BACKOFF_CAP)
}

async fn sleep_cancellable(duration: Duration, token: &CancellationToken) {
    tokio::select! {
        () = tokio::time::sleep(duration) => {}
        () = token.cancelled() => {}
    }
}

/// Merge predecessor outputs into one node's resolved input: the
/// execution's top-level input for entry nodes, the single predecessor's
/// output for a linear chain, or an object keyed by node id for a join.
fn resolve_node_input(
    node_id: NodeId,
    graph: &DependencyGraph,
    ctx: &ExecutionContext,
    workflow_input: &Value,
) -> Value {
    let mut preds = graph.predecessors(node_id);
    if preds.is_empty() {
        return workflow_input.clone();
    }
    preds.sort_by_key(ToString::to_string);

    if preds.len() == 1 {
        return ctx
            .get_node_output(preds[0])
            .map(|o| o.as_value().clone())
            .unwrap_or(Value::Null);
    }

    let mut merged = Map::with_capacity(preds.len());
    for pred in preds {
        if let Some(output) = ctx.get_node_output(pred) {
            merged.insert(pred.to_string(), output.as_value().clone());
        }
    }
    Value::Object(merged)
}

/// Apply the Pending -> Ready -> Running -> (Completed|Failed) transition
/// sequence on a node's first dispatch; on later dispatches of a
/// loop-carrying node, append the attempt record without re-entering the
/// sequence (the node-level state machine models single-shot nodes and has
/// no re-entrant edge out of a terminal state).
fn record_dispatch(
    state: &mut ExecutionState,
    node_id: NodeId,
    visited: &mut HashSet<NodeId>,
    now: DateTime<Utc>,
    attempts: Vec<NodeAttempt>,
    output: Option<NodeOutput>,
    error_message: Option<String>,
    terminal: WfNodeState,
) -> Result<(), EngineError> {
    let first_visit = visited.insert(node_id);
    let Some(node_state) = state.node_state_mut(node_id) else {
        return Err(EngineError::NodeNotFound(node_id));
    };

    if first_visit {
        node_state.transition_to(WfNodeState::Ready, now)?;
        node_state.transition_to(WfNodeState::Running, now)?;
        node_state.transition_to(terminal, now)?;
    }

    node_state.attempts.extend(attempts);
    node_state.current_output = output;
    node_state.error_message = error_message;
    Ok(())
}

/// Per-execution routing state: join-gating (`resolved_preds`/`live_preds`),
/// the re-enqueue set, and loop-iteration counters. Kept separate from
/// [`GraphRunner::run`]'s body purely for readability.
struct Routing {
    preds: HashMap<NodeId, HashSet<NodeId>>,
    resolved_preds: HashMap<NodeId, HashSet<NodeId>>,
    live_preds: HashMap<NodeId, HashSet<NodeId>>,
    enqueued: HashSet<NodeId>,
    ready: Vec<NodeId>,
    loop_counters: HashMap<(NodeId, String), u64>,
    total_loop_iterations: u64,
    /// Maps a loop body's entry node to the loop node that owns it, derived
    /// once from the workflow's [`EdgeKind::LoopBody`] edges. Used to
    /// accumulate each iteration's output against the owning loop node.
    body_to_loop: HashMap<NodeId, NodeId>,
}

impl Routing {
    fn new(graph: &DependencyGraph, workflow: &kestrel_workflow::Workflow) -> Self {
        let mut preds = HashMap::new();
        for node_id in graph.node_ids() {
            preds.insert(node_id, graph.predecessors(node_id).into_iter().collect());
        }
        let mut body_to_loop = HashMap::new();
        for edge in &workflow.edges {
            if edge.kind == EdgeKind::LoopBody {
                body_to_loop.insert(edge.target_node_id, edge.source_node_id);
            }
        }
        Self {
            preds,
            resolved_preds: HashMap::new(),
            live_preds: HashMap::new(),
            enqueued: HashSet::new(),
            ready: Vec::new(),
            loop_counters: HashMap::new(),
            total_loop_iterations: 0,
            body_to_loop,
        }
    }

    /// The handle that should actually drive routing: forces `"done"` once
    /// `node_id`'s own `max_loop_count` has been reached on the
    /// [`EdgeKind::LoopBody`] branch it just published, independent of the
    /// global `SYSTEM_MAX_LOOPS` ceiling [`Self::reenter_loop`] enforces.
    /// Checked against the pre-increment count, so `max_loop_count: 0`
    /// forces `"done"` on the very first decision.
    fn effective_handle(
        &self,
        node_id: NodeId,
        handle: &str,
        workflow: &kestrel_workflow::Workflow,
        plan: &ExecutionPlan,
    ) -> String {
        let is_loop_branch = workflow
            .edges
            .iter()
            .any(|e| e.source_node_id == node_id && e.kind == EdgeKind::LoopBody && e.handle() == handle);
        if !is_loop_branch {
            return handle.to_string();
        }

        let max = plan.node(node_id).map(|b| b.max_loop_count).unwrap_or(SYSTEM_MAX_LOOPS);
        let count = self.loop_counters.get(&(node_id, handle.to_string())).copied().unwrap_or(0);
        if count >= max {
            "done".to_string()
        } else {
            handle.to_string()
        }
    }

    fn drain_ready(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.ready)
    }

    /// Route every outgoing edge of `node_id` given the handle it actually
    /// published. Back-edges tagged [`EdgeKind::LoopBody`] bypass join
    /// gating entirely and re-enqueue their target directly, bounded by
    /// `SYSTEM_MAX_LOOPS`; every other edge participates in predecessor
    /// gating with skip-propagation for branches that were not taken.
    fn route(
        &mut self,
        node_id: NodeId,
        handle: &str,
        workflow: &kestrel_workflow::Workflow,
        state: &mut ExecutionState,
        journal: &mut Vec<JournalEntry>,
        clock: &dyn Clock,
    ) -> Result<(), EngineError> {
        let edges: Vec<_> = workflow
            .edges
            .iter()
            .filter(|e| e.source_node_id == node_id)
            .cloned()
            .collect();

        for edge in edges {
            let taken = edge.handle() == handle;

            if taken && edge.kind == EdgeKind::LoopBody {
                self.reenter_loop(node_id, edge.target_node_id, handle)?;
                continue;
            }

            // A loop node's `LoopBody`/`LoopDone` edges are only decided on
            // its *final* dispatch (the round whose handle is actually
            // taken) — an untaken one mid-loop means "not yet", not "dead",
            // so it must not feed the ordinary join/skip-propagation below,
            // which assumes each edge's source completes exactly once.
            if !taken && matches!(edge.kind, EdgeKind::LoopBody | EdgeKind::LoopDone) {
                continue;
            }

            self.resolved_preds.entry(edge.target_node_id).or_default().insert(node_id);
            if taken {
                self.live_preds.entry(edge.target_node_id).or_default().insert(node_id);
            }
            self.settle(edge.target_node_id, workflow, state, journal, clock)?;
        }

        Ok(())
    }

    /// If every predecessor of `target` has now resolved, either enqueue it
    /// (if at least one resolved via a live edge) or mark it `Skipped` and
    /// recursively propagate the dead signal downstream.
    fn settle(
        &mut self,
        target: NodeId,
        workflow: &kestrel_workflow::Workflow,
        state: &mut ExecutionState,
        journal: &mut Vec<JournalEntry>,
        clock: &dyn Clock,
    ) -> Result<(), EngineError> {
        let total = self.preds.get(&target).map(HashSet::len).unwrap_or(0);
        let resolved = self.resolved_preds.get(&target).map(HashSet::len).unwrap_or(0);
        if resolved < total {
            return Ok(());
        }

        let is_live = self.live_preds.get(&target).is_some_and(|s| !s.is_empty());
        if is_live {
            if self.enqueued.insert(target) {
                self.ready.push(target);
            }
            return Ok(());
        }

        if self.enqueued.contains(&target) {
            return Ok(());
        }

        let now = clock.now();
        journal.push(JournalEntry::NodeSkipped {
            timestamp: now,
            node_id: target,
            reason: "no live incoming branch".to_string(),
        });
        if let Some(node_state) = state.node_state_mut(target) {
            if node_state.state == WfNodeState::Pending {
                node_state.transition_to(WfNodeState::Skipped, now)?;
            }
        }

        let downstream: Vec<_> = workflow
            .edges
            .iter()
            .filter(|e| e.source_node_id == target)
            .map(|e| e.target_node_id)
            .collect();
        for next in downstream {
            self.resolved_preds.entry(next).or_default().insert(target);
            self.settle(next, workflow, state, journal, clock)?;
        }
        Ok(())
    }

    /// Record one more iteration of `loop_node_id` and enqueue its body for
    /// re-entry. `loop_node_id` is the counter key (what `effective_handle`
    /// later checks against `max_loop_count`); `body_node_id` is what
    /// actually gets scheduled.
    fn reenter_loop(&mut self, loop_node_id: NodeId, body_node_id: NodeId, branch: &str) -> Result<(), EngineError> {
        let key = (loop_node_id, branch.to_string());
        *self.loop_counters.entry(key).or_insert(0) += 1;
        self.total_loop_iterations += 1;
        if self.total_loop_iterations > SYSTEM_MAX_LOOPS {
            warn!(%loop_node_id, total = self.total_loop_iterations, "loop limit exceeded");
            return Err(EngineError::LoopLimitExceeded { max: SYSTEM_MAX_LOOPS });
        }
        if self.enqueued.insert(body_node_id) {
            self.ready.push(body_node_id);
        }
        Ok(())
    }
}

/// Assemble the execution's terminal output from its exit nodes' recorded
/// outputs: `null` if none completed, the single value if one did, or an
/// object keyed by node id (ascending string order) if several did.
fn assemble_output(plan: &ExecutionPlan, ctx: &ExecutionContext) -> Value {
    let mut completed: Vec<(NodeId, Value)> = plan
        .exit_nodes
        .iter()
        .filter_map(|&id| ctx.get_node_output(id).map(|out| (id, out.as_value().clone())))
        .collect();
    completed.sort_by_key(|(id, _)| id.to_string());

    match completed.len() {
        0 => Value::Null,
        1 => completed.into_iter().next().unwrap().1,
        _ => {
            let mut merged = Map::with_capacity(completed.len());
            for (id, value) in completed {
                merged.insert(id.to_string(), value);
            }
            Value::Object(merged)
        }
    }
}
