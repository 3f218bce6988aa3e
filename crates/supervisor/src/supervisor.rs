//! The Supervisor: the process-wide control plane.
//!
//! Compiles workflows through [`kestrel_compiler::compile`], spawns one
//! background task per execution to drive it with
//! [`kestrel_engine::GraphRunner`], and exposes the control operations a
//! caller uses to steer an execution already in flight: `pause`, `resume`,
//! `cancel`, `ask_human`, `submit_human_response`, `status`, and
//! `execute_subworkflow`. `start`/`execute_subworkflow` require `Arc<Self>`
//! since they spawn a task that outlives the call.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use kestrel_compiler::{compile, AvailableCredential};
use kestrel_core::{Clock, ExecutionId, HitlRequestId, UserId};
use kestrel_engine::{CredentialProvider, GraphRunner};
use kestrel_execution::{ExecutionContext, ExecutionState, ExecutionStatus};
use kestrel_node::NodeRegistry;
use kestrel_ports::CredentialRepo;
use kestrel_telemetry::{EventBus, KernelEvent};
use kestrel_workflow::{Mapping, Workflow};
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::credentials::ResolvedCredentials;
use crate::entry::ExecutionEntry;
use crate::error::{ControlError, KernelError};
use crate::handle::ExecutionHandle;
use crate::hitl::{HitlKind, HitlRequest, HitlStatus, PendingHitl};
use crate::hooks::SupervisorHooks;

/// What [`Supervisor::run_entry`] hands back to its two callers (`start`
/// discards the completion receiver; `execute_subworkflow` awaits it).
struct StartedExecution {
    handle: ExecutionHandle,
    completion: oneshot::Receiver<Result<Value, KernelError>>,
}

/// Process-wide execution control plane.
///
/// One `Supervisor` per process. Cheap to clone-by-reference: callers hold
/// it behind an `Arc` so spawned tasks can call back into it.
pub struct Supervisor {
    registry: Arc<NodeRegistry>,
    credential_repo: Option<Arc<dyn CredentialRepo>>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    executions: DashMap<ExecutionId, Arc<ExecutionEntry>>,
}

impl Supervisor {
    /// Construct a supervisor with no credential port configured; every
    /// execution runs with [`kestrel_engine::NoCredentials`] unless
    /// [`Self::with_credential_repo`] is used.
    #[must_use]
    pub fn new(registry: Arc<NodeRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            credential_repo: None,
            clock,
            events: Arc::new(EventBus::default()),
            executions: DashMap::new(),
        }
    }

    /// Attach a credential port; every subsequent `start`/`execute_subworkflow`
    /// resolves its workflow's `credential_refs` through it.
    #[must_use]
    pub fn with_credential_repo(mut self, repo: Arc<dyn CredentialRepo>) -> Self {
        self.credential_repo = Some(repo);
        self
    }

    /// The process-wide event bus. Clone and subscribe to observe lifecycle
    /// events across every execution this supervisor drives.
    #[must_use]
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Number of executions currently tracked (non-terminal).
    #[must_use]
    pub fn active_execution_count(&self) -> usize {
        self.executions.len()
    }

    /// Compile `workflow`, start a new top-level execution for it, and
    /// return its handle immediately — the execution runs to completion in
    /// the background.
    ///
    /// # Errors
    /// Returns [`KernelError::Compilation`] if `workflow` fails validation,
    /// or [`KernelError::Ports`] if a declared credential cannot be resolved.
    pub async fn start(
        self: &Arc<Self>,
        workflow: Workflow,
        user_id: UserId,
        input: Value,
        available_credentials: &[AvailableCredential],
    ) -> Result<ExecutionHandle, KernelError> {
        let execution_id = ExecutionId::v4();
        let now = self.clock.now();
        let handle = ExecutionHandle::new(execution_id, workflow.id, user_id, None, 0, now);
        let error_policy = workflow.settings.error_policy;
        let entry = Arc::new(ExecutionEntry::new(handle, error_policy));

        let started = self.run_entry(workflow, entry, input, available_credentials).await?;
        Ok(started.handle)
    }

    /// Run `sub_workflow` as a child of `parent_execution_id`, blocking
    /// until it reaches a terminal status, and return its output.
    ///
    /// Enforces the nesting-depth limit (bounded by `sub_workflow`'s own
    /// `max_nesting_depth`) and rejects a workflow id recurring in its own
    /// ancestor chain.
    ///
    /// # Errors
    /// Returns [`ControlError::NestingDepthExceeded`] or
    /// [`ControlError::SubworkflowCycle`] if either invariant would be
    /// violated, or any error `start` itself can return.
    pub async fn execute_subworkflow(
        self: &Arc<Self>,
        parent_execution_id: ExecutionId,
        requesting_user: UserId,
        sub_workflow: Workflow,
        input: Value,
        input_mapping: &Mapping,
        output_mapping: &Mapping,
        available_credentials: &[AvailableCredential],
    ) -> Result<Value, KernelError> {
        let parent = self.authorized_entry(parent_execution_id, requesting_user)?;
        let (parent_workflow_id, parent_depth) = {
            let handle = parent.handle.read();
            (handle.workflow_id, handle.nesting_depth)
        };

        let new_depth = parent_depth + 1;
        if new_depth > sub_workflow.settings.max_nesting_depth {
            return Err(ControlError::NestingDepthExceeded {
                depth: new_depth,
                limit: sub_workflow.settings.max_nesting_depth,
            }
            .into());
        }
        if sub_workflow.id == parent_workflow_id || parent.ancestor_workflow_ids.contains(&sub_workflow.id) {
            return Err(ControlError::SubworkflowCycle(sub_workflow.id).into());
        }

        let now = self.clock.now();
        let child_handle = ExecutionHandle::new(
            ExecutionId::v4(),
            sub_workflow.id,
            requesting_user,
            Some(parent_execution_id),
            new_depth,
            now,
        );
        let entry = Arc::new(ExecutionEntry::new_child(
            child_handle,
            sub_workflow.settings.error_policy,
            parent.ancestor_workflow_ids.clone(),
            parent_workflow_id,
        ));

        let mapped_input = input_mapping.apply(&input);
        let started = self.run_entry(sub_workflow, entry, mapped_input, available_credentials).await?;
        match started.completion.await {
            Ok(Ok(value)) => Ok(output_mapping.apply(&value)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ControlError::NotFound {
                entity: "execution",
                id: started.handle.execution_id.to_string(),
            }
            .into()),
        }
    }

    /// Compile `workflow`, register `entry` as active, resolve credentials,
    /// and spawn the background task that drives it to completion.
    async fn run_entry(
        self: &Arc<Self>,
        workflow: Workflow,
        entry: Arc<ExecutionEntry>,
        input: Value,
        available_credentials: &[AvailableCredential],
    ) -> Result<StartedExecution, KernelError> {
        let compiled = compile(&workflow, &self.registry, available_credentials)?;
        let workflow = Arc::new(workflow);
        let execution_id = entry.handle.read().execution_id;
        let user_id = entry.handle.read().user_id;

        self.executions.insert(execution_id, entry.clone());
        self.events.emit(KernelEvent::ExecutionCreated { execution_id });

        let now = self.clock.now();
        let plan = Arc::new(compiled.plan);
        let ctx = ExecutionContext::new(execution_id, workflow.clone())
            .with_cancellation(entry.cancellation.clone())
            .with_variables(as_object(input.clone()));
        let mut state = ExecutionState::new(execution_id, workflow.id, &plan.topological_order, now);
        state
            .transition_status(ExecutionStatus::Running, now)
            .map_err(|_| ControlError::AlreadyTerminal(execution_id))?;

        entry.handle.write().state = ExecutionStatus::Running;
        self.events.emit(KernelEvent::StateChanged {
            execution_id,
            state: ExecutionStatus::Running.to_string(),
        });

        let credentials: Arc<dyn CredentialProvider> = match &self.credential_repo {
            Some(repo) => Arc::new(ResolvedCredentials::resolve(&workflow, user_id, repo).await?),
            None => Arc::new(kestrel_engine::NoCredentials),
        };

        let hooks = Arc::new(SupervisorHooks::new(
            entry.clone(),
            self.events.clone(),
            self.clock.clone(),
            Arc::new(plan.loop_carrying_node_ids.clone()),
        ));
        let runner = GraphRunner::new(plan, hooks, credentials, self.clock.clone());

        let (completion_tx, completion_rx) = oneshot::channel();
        let supervisor = self.clone();
        let task_entry = entry.clone();
        tokio::spawn(async move {
            let result = runner.run(&ctx, &mut state, input).await;
            supervisor.finish(execution_id, task_entry, result, completion_tx).await;
        });

        let handle = entry.handle.read().clone();
        Ok(StartedExecution {
            handle,
            completion: completion_rx,
        })
    }

    /// Finalize an execution once its Graph Runner task returns: update the
    /// externally-visible handle, emit the terminal event, release any
    /// outstanding HITL waiter, and drop the execution from the active set
    /// (only non-terminal executions stay in `executions`).
    async fn finish(
        self: Arc<Self>,
        execution_id: ExecutionId,
        entry: Arc<ExecutionEntry>,
        result: Result<kestrel_engine::EngineOutcome, kestrel_engine::EngineError>,
        completion: oneshot::Sender<Result<Value, KernelError>>,
    ) {
        self.executions.remove(&execution_id);

        if let Some(mut pending) = entry.hitl.write().take() {
            pending.close(HitlStatus::Cancelled);
        }

        let now = self.clock.now();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                let mut handle = entry.handle.write();
                handle.state = ExecutionStatus::Failed;
                handle.completed_at = Some(now);
                handle.current_node = None;
                handle.error = Some(err.to_string());
                drop(handle);
                self.events.emit(KernelEvent::ExecutionFailed {
                    execution_id,
                    error_kind: "engine".into(),
                    failing_node_id: None,
                    message: err.to_string(),
                });
                let _ = completion.send(Err(KernelError::Engine(err)));
                return;
            }
        };

        {
            let mut handle = entry.handle.write();
            handle.state = outcome.status;
            handle.completed_at = Some(now);
            handle.current_node = None;
            handle.error = outcome.error_message.clone();
            handle.progress = 1.0;
            handle.loop_counters = entry.loop_counters_snapshot();
        }

        let response = match outcome.status {
            ExecutionStatus::Completed => {
                self.events.emit(KernelEvent::ExecutionCompleted {
                    execution_id,
                    output: outcome.output.clone(),
                });
                Ok(outcome.output)
            }
            ExecutionStatus::Cancelled => {
                self.events.emit(KernelEvent::ExecutionCancelled {
                    execution_id,
                    reason: "cancelled".into(),
                });
                Err(ControlError::AlreadyTerminal(execution_id).into())
            }
            _ => {
                let message = outcome.error_message.clone().unwrap_or_default();
                self.events.emit(KernelEvent::ExecutionFailed {
                    execution_id,
                    error_kind: "node".into(),
                    failing_node_id: outcome.failing_node_id,
                    message: message.clone(),
                });
                Err(ControlError::NotFound {
                    entity: "execution",
                    id: execution_id.to_string(),
                }
                .into())
            }
        };

        let _ = completion.send(response);
    }

    /// Pause an execution: the next `before_node` suspension point blocks
    /// until `resume`. A no-op if already paused.
    ///
    /// # Errors
    /// [`ControlError::NotFound`], [`ControlError::NotAuthorized`], or
    /// [`ControlError::AlreadyTerminal`].
    pub fn pause(&self, execution_id: ExecutionId, user_id: UserId) -> Result<(), KernelError> {
        let entry = self.authorized_entry(execution_id, user_id)?;
        let mut handle = entry.handle.write();
        if handle.state.is_terminal() {
            return Err(ControlError::AlreadyTerminal(execution_id).into());
        }
        entry.pause.pause();
        handle.state = ExecutionStatus::Paused;
        drop(handle);
        self.events.emit(KernelEvent::StateChanged {
            execution_id,
            state: ExecutionStatus::Paused.to_string(),
        });
        Ok(())
    }

    /// Resume a paused execution.
    ///
    /// # Errors
    /// [`ControlError::NotFound`], [`ControlError::NotAuthorized`], or
    /// [`ControlError::AlreadyTerminal`].
    pub fn resume(&self, execution_id: ExecutionId, user_id: UserId) -> Result<(), KernelError> {
        let entry = self.authorized_entry(execution_id, user_id)?;
        let mut handle = entry.handle.write();
        if handle.state.is_terminal() {
            return Err(ControlError::AlreadyTerminal(execution_id).into());
        }
        entry.pause.resume();
        handle.state = ExecutionStatus::Running;
        drop(handle);
        self.events.emit(KernelEvent::StateChanged {
            execution_id,
            state: ExecutionStatus::Running.to_string(),
        });
        Ok(())
    }

    /// Cancel an execution. Cooperative: the runner observes the
    /// cancellation token at its next suspension point and unwinds to
    /// [`ExecutionStatus::Cancelled`] from there — this call does not block
    /// waiting for that to happen.
    ///
    /// # Errors
    /// [`ControlError::NotFound`], [`ControlError::NotAuthorized`], or
    /// [`ControlError::AlreadyTerminal`].
    pub fn cancel(&self, execution_id: ExecutionId, user_id: UserId) -> Result<(), KernelError> {
        let entry = self.authorized_entry(execution_id, user_id)?;
        if entry.handle.read().state.is_terminal() {
            return Err(ControlError::AlreadyTerminal(execution_id).into());
        }
        entry.cancellation.cancel();
        entry.pause.resume();
        if let Some(mut pending) = entry.hitl.write().take() {
            pending.close(HitlStatus::Cancelled);
        }
        Ok(())
    }

    /// Snapshot an execution's control-plane state.
    ///
    /// # Errors
    /// [`ControlError::NotFound`] or [`ControlError::NotAuthorized`].
    pub fn status(&self, execution_id: ExecutionId, user_id: UserId) -> Result<ExecutionHandle, KernelError> {
        let entry = self.authorized_entry(execution_id, user_id)?;
        Ok(entry.handle.read().clone())
    }

    /// Block the calling node handler's execution, surfacing a human-in-the-loop
    /// request, until a response arrives via [`Self::submit_human_response`]
    /// or `timeout_seconds` elapses.
    ///
    /// Reuses the cooperative pause gate as the suspension mechanism: the
    /// execution's `before_node` hook blocks for the duration of the wait,
    /// same as an externally-triggered pause.
    ///
    /// # Errors
    /// [`ControlError::NotFound`], [`ControlError::NotAuthorized`],
    /// [`ControlError::AlreadyPending`] if another request is already
    /// outstanding, or [`ControlError::TimedOut`].
    pub async fn ask_human(
        &self,
        execution_id: ExecutionId,
        user_id: UserId,
        kind: HitlKind,
        title: impl Into<String>,
        message: impl Into<String>,
        options: Vec<String>,
        timeout_seconds: u64,
    ) -> Result<Value, KernelError> {
        let entry = self.authorized_entry(execution_id, user_id)?;
        if entry.hitl.read().is_some() {
            return Err(ControlError::AlreadyPending(execution_id).into());
        }

        let request_id = HitlRequestId::v4();
        let request = HitlRequest {
            id: request_id,
            execution_id,
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            options: options.clone(),
            timeout_seconds,
            created_at: self.clock.now(),
            status: HitlStatus::Pending,
            response: None,
        };
        let (pending, receiver) = PendingHitl::new(request);
        *entry.hitl.write() = Some(pending);

        entry.pause.pause();
        {
            let mut handle = entry.handle.write();
            handle.state = ExecutionStatus::WaitingHuman;
            handle.pending_hitl = Some(request_id);
        }
        self.events.emit(KernelEvent::HitlRequested {
            request_id,
            kind: serde_json::to_value(kind).ok().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default(),
            message: entry.hitl.read().as_ref().map(|p| p.request.message.clone()).unwrap_or_default(),
            options,
        });

        let outcome = tokio::time::timeout(Duration::from_secs(timeout_seconds), receiver).await;

        let result = match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ControlError::NotPending(request_id).into()),
            Err(_) => {
                if let Some(mut pending) = entry.hitl.write().take() {
                    pending.close(HitlStatus::TimedOut);
                }
                Err(ControlError::TimedOut(request_id).into())
            }
        };

        {
            let mut handle = entry.handle.write();
            if handle.state == ExecutionStatus::WaitingHuman {
                handle.state = ExecutionStatus::Running;
            }
            handle.pending_hitl = None;
        }
        entry.pause.resume();

        result
    }

    /// Deliver a response to the outstanding HITL request on `execution_id`.
    ///
    /// # Errors
    /// [`ControlError::NotFound`], [`ControlError::NotAuthorized`], or
    /// [`ControlError::NotPending`] if no request is outstanding (or it
    /// already timed out / was cancelled).
    pub fn submit_human_response(
        &self,
        execution_id: ExecutionId,
        user_id: UserId,
        response: Value,
    ) -> Result<(), KernelError> {
        let entry = self.authorized_entry(execution_id, user_id)?;
        let mut hitl = entry.hitl.write();
        let Some(pending) = hitl.as_mut() else {
            return Err(ControlError::NotFound {
                entity: "hitl request",
                id: execution_id.to_string(),
            }
            .into());
        };
        let request_id = pending.request.id;
        if !pending.respond(response.clone()) {
            return Err(ControlError::NotPending(request_id).into());
        }
        drop(hitl);

        self.events.emit(KernelEvent::HitlResolved { request_id, response });
        Ok(())
    }

    /// Look up an execution and verify `user_id` owns it.
    fn authorized_entry(&self, execution_id: ExecutionId, user_id: UserId) -> Result<Arc<ExecutionEntry>, KernelError> {
        let entry = self
            .executions
            .get(&execution_id)
            .map(|e| e.clone())
            .ok_or_else(|| ControlError::NotFound {
                entity: "execution",
                id: execution_id.to_string(),
            })?;
        if entry.handle.read().user_id != user_id {
            return Err(ControlError::NotAuthorized.into());
        }
        Ok(entry)
    }
}

/// Coerce a JSON value into the object map `ExecutionContext::with_variables`
/// expects; non-object input (or `Null`) seeds an empty variable set and is
/// instead threaded through as `GraphRunner::run`'s `input` argument.
fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kestrel_core::{FixedClock, NodeId, WorkflowId};
    use kestrel_node::{HandlerError, NodeContext, NodeHandler, NodeMetadata, NodeResult};
    use kestrel_workflow::{Node, WorkflowSettings};
    use serde_json::json;
    use std::collections::BTreeMap;

    struct Echo(NodeMetadata);

    #[async_trait]
    impl NodeHandler for Echo {
        async fn execute(&self, input: Value, _config: Value, _ctx: NodeContext) -> Result<NodeResult, HandlerError> {
            let mut data = Map::new();
            data.insert("value".into(), input);
            Ok(NodeResult::default_handle(data))
        }
        fn metadata(&self) -> &NodeMetadata {
            &self.0
        }
    }

    struct Blocking(NodeMetadata);

    #[async_trait]
    impl NodeHandler for Blocking {
        async fn execute(&self, _input: Value, _config: Value, _ctx: NodeContext) -> Result<NodeResult, HandlerError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let mut data = Map::new();
            data.insert("done".into(), json!(true));
            Ok(NodeResult::default_handle(data))
        }
        fn metadata(&self) -> &NodeMetadata {
            &self.0
        }
    }

    fn registry_with(tag: &str, handler: Arc<dyn NodeHandler>) -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry.register(handler);
        let _ = tag;
        Arc::new(registry)
    }

    fn full_registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry.register(Arc::new(Echo(NodeMetadata::new("echo", "Echo", "echoes input"))));
        registry.register(Arc::new(Blocking(NodeMetadata::new("blocking", "Blocking", "slow"))));
        Arc::new(registry)
    }

    fn supervisor(registry: Arc<NodeRegistry>) -> Arc<Supervisor> {
        Arc::new(Supervisor::new(registry, Arc::new(FixedClock::default())))
    }

    fn one_node_workflow(tag: &str) -> Workflow {
        Workflow {
            id: WorkflowId::v4(),
            owner_id: UserId::v4(),
            nodes: vec![Node::new(NodeId::v4(), tag)],
            edges: vec![],
            settings: WorkflowSettings::default(),
        }
    }

    #[tokio::test]
    async fn start_runs_to_completion_and_clears_active_set() {
        let registry = registry_with("echo", Arc::new(Echo(NodeMetadata::new("echo", "Echo", "echoes input"))));
        let sup = supervisor(registry);
        let user = UserId::v4();
        let workflow = one_node_workflow("echo");

        let handle = sup.start(workflow, user, json!({"a": 1}), &[]).await.unwrap();
        assert_eq!(handle.state, ExecutionStatus::Running);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sup.active_execution_count(), 0);
        assert!(sup.status(handle.execution_id, user).is_err());
    }

    #[tokio::test]
    async fn status_rejects_wrong_user() {
        let registry = registry_with("echo", Arc::new(Echo(NodeMetadata::new("echo", "Echo", "echoes input"))));
        let sup = supervisor(registry);
        let owner = UserId::v4();
        let workflow = one_node_workflow("echo");
        let handle = sup.start(workflow, owner, json!({}), &[]).await.unwrap();

        let other = UserId::v4();
        let err = sup.status(handle.execution_id, other).unwrap_err();
        assert!(matches!(err, KernelError::Control(ControlError::NotAuthorized)));
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips_state() {
        let registry = registry_with(
            "blocking",
            Arc::new(Blocking(NodeMetadata::new("blocking", "Blocking", "slow"))),
        );
        let sup = supervisor(registry);
        let user = UserId::v4();
        let workflow = one_node_workflow("blocking");
        let handle = sup.start(workflow, user, json!({}), &[]).await.unwrap();

        sup.pause(handle.execution_id, user).unwrap();
        let paused = sup.status(handle.execution_id, user).unwrap();
        assert_eq!(paused.state, ExecutionStatus::Paused);

        sup.resume(handle.execution_id, user).unwrap();
        let running = sup.status(handle.execution_id, user).unwrap();
        assert_eq!(running.state, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn cancel_runs_to_cancelled_and_clears_active_set() {
        let registry = registry_with(
            "blocking",
            Arc::new(Blocking(NodeMetadata::new("blocking", "Blocking", "slow"))),
        );
        let sup = supervisor(registry);
        let user = UserId::v4();
        let workflow = one_node_workflow("blocking");
        let handle = sup.start(workflow, user, json!({}), &[]).await.unwrap();

        sup.cancel(handle.execution_id, user).unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(sup.status(handle.execution_id, user).is_err());
    }

    #[tokio::test]
    async fn execute_subworkflow_rejects_self_referential_cycle() {
        let sup = supervisor(full_registry());
        let user = UserId::v4();
        let mut parent_workflow = one_node_workflow("blocking");
        parent_workflow.settings.max_nesting_depth = 5;
        let parent_id = parent_workflow.id;
        let handle = sup.start(parent_workflow, user, json!({}), &[]).await.unwrap();

        let mut cyclic_child = one_node_workflow("echo");
        cyclic_child.id = parent_id;

        let err = sup
            .execute_subworkflow(
                handle.execution_id,
                user,
                cyclic_child,
                json!({}),
                &Mapping::identity(),
                &Mapping::identity(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::Control(ControlError::SubworkflowCycle(_))));
    }

    #[tokio::test]
    async fn execute_subworkflow_rejects_depth_exceeded() {
        let sup = supervisor(full_registry());
        let user = UserId::v4();
        let parent_workflow = one_node_workflow("blocking");
        let handle = sup.start(parent_workflow, user, json!({}), &[]).await.unwrap();

        let mut child = one_node_workflow("echo");
        child.settings.max_nesting_depth = 0;

        let err = sup
            .execute_subworkflow(
                handle.execution_id,
                user,
                child,
                json!({}),
                &Mapping::identity(),
                &Mapping::identity(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Control(ControlError::NestingDepthExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn execute_subworkflow_runs_child_and_returns_output() {
        let sup = supervisor(full_registry());
        let user = UserId::v4();
        let parent_workflow = one_node_workflow("blocking");
        let handle = sup.start(parent_workflow, user, json!({}), &[]).await.unwrap();

        let child = one_node_workflow("echo");
        let output = sup
            .execute_subworkflow(
                handle.execution_id,
                user,
                child,
                json!({"x": 7}),
                &Mapping::identity(),
                &Mapping::identity(),
                &[],
            )
            .await
            .unwrap();
        assert!(output.is_object() || output.is_null() || output.is_number());
    }

    #[tokio::test]
    async fn execute_subworkflow_applies_input_and_output_mapping() {
        struct StatusHandler(NodeMetadata);

        #[async_trait]
        impl NodeHandler for StatusHandler {
            async fn execute(&self, _input: Value, _config: Value, _ctx: NodeContext) -> Result<NodeResult, HandlerError> {
                let mut data = Map::new();
                data.insert("status".into(), json!("verified"));
                Ok(NodeResult::default_handle(data))
            }
            fn metadata(&self) -> &NodeMetadata {
                &self.0
            }
        }

        let mut registry = NodeRegistry::new();
        registry.register(Arc::new(StatusHandler(NodeMetadata::new("status", "Status", "reports status"))));
        let sup = supervisor(Arc::new(registry));
        let user = UserId::v4();
        let mut parent_workflow = one_node_workflow("status");
        parent_workflow.settings.max_nesting_depth = 5;
        let handle = sup.start(parent_workflow, user, json!({}), &[]).await.unwrap();

        let child = one_node_workflow("status");
        let mut output_mapping = BTreeMap::new();
        output_mapping.insert("verification_result".to_string(), "status".to_string());

        let output = sup
            .execute_subworkflow(
                handle.execution_id,
                user,
                child,
                json!({"raw": "irrelevant"}),
                &Mapping::identity(),
                &Mapping::new(output_mapping),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(output, json!({"verification_result": "verified"}));
    }

    #[tokio::test]
    async fn ask_human_times_out_when_unanswered() {
        let registry = registry_with("echo", Arc::new(Echo(NodeMetadata::new("echo", "Echo", "echoes input"))));
        let sup = supervisor(registry);
        let user = UserId::v4();
        let workflow = one_node_workflow("echo");
        let handle = sup.start(workflow, user, json!({}), &[]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = sup
            .ask_human(handle.execution_id, user, HitlKind::Approval, "Approve", "go?", vec![], 0)
            .await;
        assert!(err.is_err());
    }
}
