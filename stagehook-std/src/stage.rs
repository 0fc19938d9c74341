//! Execution of one stage's groups for one entity.
//!
//! Groups run strictly one after another. Inside a group every hook sees the
//! payload as it was when the group started, and the hooks run concurrently.
//! Once all of them have finished (or timed out), the group's results are
//! resolved in static order:
//!
//! 1. If any hook rejected and the stage honors rejects, the stage stops.
//!    The payload handed back is the one the group started with.
//! 2. Otherwise the updates are applied in static order and the returned
//!    module contexts are merged.

use crate::context::HookExecutionContext;
use crate::invoker::{self, Invocation};
use crate::outcome::{GroupExecutionOutcome, HookExecutionOutcome, StageExecutionOutcome};
use crate::pipeline;
use futures::future::join_all;
use stagehook_core::{
    DynHook, HookError, HookId, InvocationAction, InvocationContext, ModuleContext, Payload,
    PayloadUpdate, Stage,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A group whose hooks have been looked up in the registry.
pub struct ResolvedGroup<P> {
    /// Ceiling on each hook's runtime.
    pub timeout: Duration,
    /// Hooks in static order.
    pub hooks: Vec<(HookId, Arc<dyn DynHook<P>>)>,
}

/// The hook that stopped a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The first rejecting hook in static order.
    pub hook_id: HookId,
    /// The reason it gave.
    pub reason: String,
}

/// What a stage run hands back.
#[derive(Debug)]
pub struct StageExecutionResult<P> {
    /// The payload after the stage; the last good payload when rejected.
    pub payload: P,
    /// The stage's execution record.
    pub outcome: StageExecutionOutcome,
    /// Set when a hook rejected and the stage honored it.
    pub rejection: Option<Rejection>,
}

impl<P> StageExecutionResult<P> {
    /// A result for a stage without any planned hooks.
    pub fn bypassed(payload: P, entity: impl Into<String>) -> Self {
        Self {
            payload,
            outcome: StageExecutionOutcome {
                entity: entity.into(),
                groups: Vec::new(),
                execution_time: Duration::ZERO,
            },
            rejection: None,
        }
    }

    /// Whether the stage was rejected.
    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }
}

/// Runs the groups of one stage for one entity.
///
/// # Example
///
/// ```rust,ignore
/// let result = StageExecutor::new(Stage::Entrypoint, "http-request")
///     .with_groups(groups)
///     .execute(payload, &mut context)
///     .await;
/// ```
pub struct StageExecutor<P> {
    stage: Stage,
    entity: String,
    reject_allowed: bool,
    groups: Vec<ResolvedGroup<P>>,
}

impl<P: Payload> StageExecutor<P> {
    /// Creates an executor; rejects are honored as the stage dictates.
    pub fn new(stage: Stage, entity: impl Into<String>) -> Self {
        Self {
            stage,
            entity: entity.into(),
            reject_allowed: stage.is_reject_allowed(),
            groups: Vec::new(),
        }
    }

    /// Sets the groups to run.
    pub fn with_groups(mut self, groups: Vec<ResolvedGroup<P>>) -> Self {
        self.groups = groups;
        self
    }

    /// Runs every group against `payload`.
    pub async fn execute(
        self,
        payload: P,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<P> {
        let Self {
            stage,
            entity,
            reject_allowed,
            groups,
        } = self;

        let started = Instant::now();
        let mut payload = Arc::new(payload);
        let mut group_outcomes = Vec::with_capacity(groups.len());
        let mut rejection = None;

        for group in groups {
            let group_started = Instant::now();
            let request = &*context;
            let invocations = join_all(group.hooks.into_iter().map(|(hook_id, hook)| {
                let invocation_context =
                    invocation_context(stage, &entity, &hook_id, group.timeout, request);
                let budget = invocation_context.timeout();
                invoker::invoke(hook, hook_id, Arc::clone(&payload), invocation_context, budget)
            }))
            .await;

            let resolved = resolve_group(stage, &entity, reject_allowed, invocations);
            let mut outcomes = resolved.outcomes;

            if let Some(group_rejection) = resolved.rejection {
                debug!(
                    %stage,
                    entity = %entity,
                    hook = %group_rejection.hook_id,
                    reason = %group_rejection.reason,
                    "stage rejected"
                );
                group_outcomes.push(GroupExecutionOutcome {
                    hooks: outcomes,
                    execution_time: group_started.elapsed(),
                });
                rejection = Some(group_rejection);
                break;
            }

            let applied = pipeline::apply_updates(payload, resolved.updates);
            payload = applied.payload;
            for (index, err) in applied.failed {
                let outcome = &mut outcomes[index];
                warn!(%stage, hook = %outcome.hook_id, error = %err, "payload update failed");
                outcome.fail(HookError::UpdateFailed(err).to_string());
            }

            let module_contexts = context.module_contexts_mut();
            for (module_code, module_context) in resolved.module_contexts {
                module_contexts.merge(module_code, module_context);
            }

            group_outcomes.push(GroupExecutionOutcome {
                hooks: outcomes,
                execution_time: group_started.elapsed(),
            });
        }

        StageExecutionResult {
            payload: Arc::unwrap_or_clone(payload),
            outcome: StageExecutionOutcome {
                entity,
                groups: group_outcomes,
                execution_time: started.elapsed(),
            },
            rejection,
        }
    }
}

fn invocation_context(
    stage: Stage,
    entity: &str,
    hook_id: &HookId,
    timeout: Duration,
    context: &HookExecutionContext,
) -> InvocationContext {
    let module_code = hook_id.module_code.as_str();
    InvocationContext::new(stage, context.endpoint(), entity)
        .with_timeout(context.budget(timeout))
        .with_debug_enabled(context.debug_enabled())
        .with_account_config(context.account().module_config(module_code).cloned())
        .with_module_context(context.module_contexts().get(module_code).cloned())
}

struct ResolvedInvocations<P> {
    outcomes: Vec<HookExecutionOutcome>,
    updates: Vec<(usize, PayloadUpdate<P>)>,
    module_contexts: Vec<(String, ModuleContext)>,
    rejection: Option<Rejection>,
}

/// Turns raw invocations into outcomes, walking them in static order.
fn resolve_group<P: Payload>(
    stage: Stage,
    entity: &str,
    reject_allowed: bool,
    invocations: Vec<Invocation<P>>,
) -> ResolvedInvocations<P> {
    let mut resolved = ResolvedInvocations {
        outcomes: Vec::with_capacity(invocations.len()),
        updates: Vec::new(),
        module_contexts: Vec::new(),
        rejection: None,
    };

    for invocation in invocations {
        let Invocation {
            hook_id,
            execution_time,
            status,
            error,
            result,
        } = invocation;
        let mut outcome = HookExecutionOutcome::new(hook_id, execution_time, status);
        if let Some(error) = error {
            outcome.message = Some(error.to_string());
        }

        if let Some(result) = result {
            let (action, mut metadata) = result.into_parts();
            outcome.record_metadata(&mut metadata);
            outcome.action = Some(action.kind());
            if let Some(module_context) = metadata.module_context.take() {
                resolved
                    .module_contexts
                    .push((outcome.hook_id.module_code.clone(), module_context));
            }

            match action {
                InvocationAction::NoAction => {}
                InvocationAction::Update(update) => {
                    resolved.updates.push((resolved.outcomes.len(), update));
                }
                InvocationAction::Reject(reason) if reject_allowed => {
                    outcome.message = Some(reason.clone());
                    if resolved.rejection.is_none() {
                        resolved.rejection = Some(Rejection {
                            hook_id: outcome.hook_id.clone(),
                            reason,
                        });
                    }
                }
                InvocationAction::Reject(_) => {
                    warn!(
                        %stage,
                        entity,
                        hook = %outcome.hook_id,
                        "hook rejected at a stage that does not support rejection"
                    );
                    outcome.fail(HookError::RejectNotAllowed.to_string());
                }
            }
        }

        resolved.outcomes.push(outcome);
    }

    resolved
}
