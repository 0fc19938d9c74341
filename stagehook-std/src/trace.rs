//! Rendering of the execution record into the response's debug section.
//!
//! The rendered shape mirrors `ext.prebid.modules` of the auction response:
//!
//! ```json
//! {
//!   "errors":   {"module": {"hook": ["..."]}},
//!   "warnings": {"module": {"hook": ["..."]}},
//!   "trace": {
//!     "executiontimemillis": 12,
//!     "stages": [{
//!       "stage": "entrypoint",
//!       "executiontimemillis": 3,
//!       "outcomes": [{
//!         "entity": "http-request",
//!         "executiontimemillis": 3,
//!         "groups": [{
//!           "executiontimemillis": 3,
//!           "invocationresults": [{"hookid": {...}, "status": "success", "action": "update", ...}]
//!         }]
//!       }]
//!     }]
//!   }
//! }
//! ```

use crate::context::HookExecutionContext;
use crate::outcome::{
    ExecutionStatus, GroupExecutionOutcome, HookExecutionOutcome, StageExecutionOutcome,
};
use serde::Serialize;
use stagehook_core::{ExecutionAction, HookId, Stage, Tags};
use std::collections::BTreeMap;
use std::time::Duration;

/// Module code to hook code to messages.
pub type ModuleMessages = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// The hooks section of the response debug output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtModules {
    /// Errors reported by hooks.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: ModuleMessages,
    /// Warnings reported by hooks.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub warnings: ModuleMessages,
    /// The execution trace.
    pub trace: ExtModulesTrace,
}

/// The whole execution trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtModulesTrace {
    /// Sum of the stage times.
    #[serde(rename = "executiontimemillis")]
    pub execution_time_millis: u64,
    /// Stages in lifecycle order.
    pub stages: Vec<ExtModulesTraceStage>,
}

/// Trace of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtModulesTraceStage {
    /// The stage.
    pub stage: Stage,
    /// Sum of the outcome times.
    #[serde(rename = "executiontimemillis")]
    pub execution_time_millis: u64,
    /// One outcome per entity run.
    pub outcomes: Vec<ExtModulesTraceStageOutcome>,
}

/// Trace of one stage run for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtModulesTraceStageOutcome {
    /// The entity.
    pub entity: String,
    /// Wall-clock time of the run.
    #[serde(rename = "executiontimemillis")]
    pub execution_time_millis: u64,
    /// Groups in plan order.
    pub groups: Vec<ExtModulesTraceGroup>,
}

/// Trace of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtModulesTraceGroup {
    /// Wall-clock time of the group.
    #[serde(rename = "executiontimemillis")]
    pub execution_time_millis: u64,
    /// Invocations in static order.
    #[serde(rename = "invocationresults")]
    pub invocation_results: Vec<ExtModulesTraceInvocationResult>,
}

/// Trace of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtModulesTraceInvocationResult {
    /// The hook.
    #[serde(rename = "hookid")]
    pub hook_id: HookId,
    /// Wall-clock time of the invocation.
    #[serde(rename = "executiontimemillis")]
    pub execution_time_millis: u64,
    /// How it ended.
    pub status: ExecutionStatus,
    /// Message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Honored action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ExecutionAction>,
    /// Debug messages.
    #[serde(rename = "debugmessages", skip_serializing_if = "Vec::is_empty")]
    pub debug_messages: Vec<String>,
    /// Analytics tags.
    #[serde(rename = "analyticstags", skip_serializing_if = "Option::is_none")]
    pub analytics_tags: Option<Tags>,
}

/// Renders the execution record of a request.
pub fn collect(context: &HookExecutionContext) -> ExtModules {
    let mut errors = ModuleMessages::new();
    let mut warnings = ModuleMessages::new();
    for hook in context.stage_outcomes().hooks() {
        add_messages(&mut errors, &hook.hook_id, &hook.errors);
        add_messages(&mut warnings, &hook.hook_id, &hook.warnings);
    }

    let stages: Vec<_> = context
        .stage_outcomes()
        .iter()
        .map(|(stage, outcomes)| stage_trace(stage, outcomes))
        .collect();

    ExtModules {
        errors,
        warnings,
        trace: ExtModulesTrace {
            execution_time_millis: stages.iter().map(|stage| stage.execution_time_millis).sum(),
            stages,
        },
    }
}

/// Renders the execution record if the request runs in debug mode.
pub fn debug_output(context: &HookExecutionContext) -> Option<ExtModules> {
    context.debug_enabled().then(|| collect(context))
}

fn add_messages(target: &mut ModuleMessages, hook_id: &HookId, messages: &[String]) {
    if messages.is_empty() {
        return;
    }
    target
        .entry(hook_id.module_code.clone())
        .or_default()
        .entry(hook_id.hook_impl_code.clone())
        .or_default()
        .extend(messages.iter().cloned());
}

fn stage_trace(stage: Stage, outcomes: &[StageExecutionOutcome]) -> ExtModulesTraceStage {
    let outcomes: Vec<_> = outcomes.iter().map(stage_outcome_trace).collect();
    ExtModulesTraceStage {
        stage,
        execution_time_millis: outcomes
            .iter()
            .map(|outcome| outcome.execution_time_millis)
            .sum(),
        outcomes,
    }
}

fn stage_outcome_trace(outcome: &StageExecutionOutcome) -> ExtModulesTraceStageOutcome {
    ExtModulesTraceStageOutcome {
        entity: outcome.entity.clone(),
        execution_time_millis: millis(outcome.execution_time),
        groups: outcome.groups.iter().map(group_trace).collect(),
    }
}

fn group_trace(group: &GroupExecutionOutcome) -> ExtModulesTraceGroup {
    ExtModulesTraceGroup {
        execution_time_millis: millis(group.execution_time),
        invocation_results: group.hooks.iter().map(invocation_trace).collect(),
    }
}

fn invocation_trace(hook: &HookExecutionOutcome) -> ExtModulesTraceInvocationResult {
    ExtModulesTraceInvocationResult {
        hook_id: hook.hook_id.clone(),
        execution_time_millis: millis(hook.execution_time),
        status: hook.status,
        message: hook.message.clone(),
        action: hook.action,
        debug_messages: hook.debug_messages.clone(),
        analytics_tags: hook.analytics_tags.clone(),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
