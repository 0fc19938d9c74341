//! Execution records kept for every hook, group and stage.
//!
//! These records are collected regardless of debug mode; the debug gate only
//! applies when they are rendered by [`crate::trace`].

use serde::Serialize;
use stagehook_core::{ExecutionAction, HookId, InvocationMetadata, Stage, Tags};
use std::collections::BTreeMap;
use std::time::Duration;

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The hook returned a result that was honored.
    Success,
    /// The hook failed, panicked, or returned something that could not be honored.
    Failure,
    /// The hook exceeded its budget.
    Timeout,
}

/// The record of one hook invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct HookExecutionOutcome {
    /// The invoked hook.
    pub hook_id: HookId,
    /// Wall-clock time of the invocation.
    pub execution_time: Duration,
    /// How the invocation ended.
    pub status: ExecutionStatus,
    /// The honored action; `None` unless the status is success.
    pub action: Option<ExecutionAction>,
    /// Reject reason, hook message or failure description.
    pub message: Option<String>,
    /// Errors reported by the hook.
    pub errors: Vec<String>,
    /// Warnings reported by the hook.
    pub warnings: Vec<String>,
    /// Debug messages reported by the hook.
    pub debug_messages: Vec<String>,
    /// Analytics tags reported by the hook.
    pub analytics_tags: Option<Tags>,
}

impl HookExecutionOutcome {
    /// Creates an outcome without any hook-provided data.
    pub fn new(hook_id: HookId, execution_time: Duration, status: ExecutionStatus) -> Self {
        Self {
            hook_id,
            execution_time,
            status,
            action: None,
            message: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            debug_messages: Vec::new(),
            analytics_tags: None,
        }
    }

    /// Copies the hook-provided fields of a result into the outcome.
    pub(crate) fn record_metadata(&mut self, metadata: &mut InvocationMetadata) {
        self.message = metadata.message.take();
        self.errors = std::mem::take(&mut metadata.errors);
        self.warnings = std::mem::take(&mut metadata.warnings);
        self.debug_messages = std::mem::take(&mut metadata.debug_messages);
        self.analytics_tags = metadata.analytics_tags.take();
    }

    /// Downgrades the outcome to a failure with the given message.
    pub(crate) fn fail(&mut self, message: String) {
        self.status = ExecutionStatus::Failure;
        self.action = None;
        self.message = Some(message);
    }
}

/// The record of one execution group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupExecutionOutcome {
    /// Hook outcomes in the group's static order.
    pub hooks: Vec<HookExecutionOutcome>,
    /// Wall-clock time of the group.
    pub execution_time: Duration,
}

/// The record of one stage run for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StageExecutionOutcome {
    /// The entity the stage ran for.
    pub entity: String,
    /// Group outcomes in plan order.
    pub groups: Vec<GroupExecutionOutcome>,
    /// Wall-clock time of the stage.
    pub execution_time: Duration,
}

impl StageExecutionOutcome {
    /// Iterates every hook outcome of the stage in plan order.
    pub fn hooks(&self) -> impl Iterator<Item = &HookExecutionOutcome> {
        self.groups.iter().flat_map(|group| group.hooks.iter())
    }
}

/// Stage outcomes of a request, keyed by stage in lifecycle order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutcomes {
    stages: BTreeMap<Stage, Vec<StageExecutionOutcome>>,
}

impl StageOutcomes {
    /// Appends the outcome of a stage run.
    pub fn push(&mut self, stage: Stage, outcome: StageExecutionOutcome) {
        self.stages.entry(stage).or_default().push(outcome);
    }

    /// Appends everything recorded in `other`.
    pub fn extend(&mut self, other: StageOutcomes) {
        for (stage, outcomes) in other.stages {
            self.stages.entry(stage).or_default().extend(outcomes);
        }
    }

    /// Outcomes recorded for `stage`.
    pub fn get(&self, stage: Stage) -> &[StageExecutionOutcome] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates stages in lifecycle order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &[StageExecutionOutcome])> {
        self.stages
            .iter()
            .map(|(stage, outcomes)| (*stage, outcomes.as_slice()))
    }

    /// Iterates every hook outcome of the request.
    pub fn hooks(&self) -> impl Iterator<Item = &HookExecutionOutcome> {
        self.stages
            .values()
            .flatten()
            .flat_map(StageExecutionOutcome::hooks)
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
