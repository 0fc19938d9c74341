//! Per-request hook execution state.

use crate::module_context::ModuleContexts;
use crate::outcome::{StageExecutionOutcome, StageOutcomes};
use crate::plan::ExecutionPlan;
use serde::Deserialize;
use serde_json::Value;
use stagehook_core::{Endpoint, HookId, Stage, Tags};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The hooks section of an account's configuration.
///
/// ```json
/// {"id": "acc-1", "modules": {"ortb2-blocking": {"attributes": {"badv": {"blocked-adomain": ["a.com"]}}}}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccountHooksConfig {
    #[serde(default)]
    id: String,
    #[serde(default)]
    modules: HashMap<String, Arc<Value>>,
}

impl AccountHooksConfig {
    /// Creates an account configuration without module settings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            modules: HashMap::new(),
        }
    }

    /// The account id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets the configuration of one module.
    pub fn with_module(mut self, module_code: impl Into<String>, config: Value) -> Self {
        self.modules.insert(module_code.into(), Arc::new(config));
        self
    }

    /// The configuration of `module_code`, if the account has one.
    pub fn module_config(&self, module_code: &str) -> Option<&Arc<Value>> {
        self.modules.get(module_code)
    }
}

/// Everything the engine tracks for one request.
///
/// Created by the caller when the request arrives and threaded through every
/// stage. Bidder stages operate on [`fork`](Self::fork)s that are joined back
/// once the bidder is done.
#[derive(Debug, Clone)]
pub struct HookExecutionContext {
    endpoint: Endpoint,
    debug_enabled: bool,
    deadline: Option<Instant>,
    account: Arc<AccountHooksConfig>,
    plan: Arc<ExecutionPlan>,
    module_contexts: ModuleContexts,
    stage_outcomes: StageOutcomes,
}

impl HookExecutionContext {
    /// Creates a context with an empty plan, no account and no deadline.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            debug_enabled: false,
            deadline: None,
            account: Arc::default(),
            plan: Arc::default(),
            module_contexts: ModuleContexts::new(),
            stage_outcomes: StageOutcomes::default(),
        }
    }

    /// Sets whether the request runs in debug mode.
    pub fn with_debug_enabled(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// Sets the request deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the request deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets the account's hooks configuration.
    pub fn with_account(mut self, account: impl Into<Arc<AccountHooksConfig>>) -> Self {
        self.account = account.into();
        self
    }

    /// Sets the execution plan.
    pub fn with_plan(mut self, plan: impl Into<Arc<ExecutionPlan>>) -> Self {
        self.plan = plan.into();
        self
    }

    /// The endpoint serving the request.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Whether the request runs in debug mode.
    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }

    /// The account's hooks configuration.
    pub fn account(&self) -> &AccountHooksConfig {
        &self.account
    }

    /// The execution plan.
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Time left until the deadline; `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Budget of a hook in a group with ceiling `timeout`.
    pub fn budget(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => timeout.min(remaining),
            None => timeout,
        }
    }

    /// Module contexts written so far.
    pub fn module_contexts(&self) -> &ModuleContexts {
        &self.module_contexts
    }

    /// Mutable access to the module contexts.
    pub fn module_contexts_mut(&mut self) -> &mut ModuleContexts {
        &mut self.module_contexts
    }

    /// Stage outcomes recorded so far.
    pub fn stage_outcomes(&self) -> &StageOutcomes {
        &self.stage_outcomes
    }

    pub(crate) fn record(&mut self, stage: Stage, outcome: StageExecutionOutcome) {
        self.stage_outcomes.push(stage, outcome);
    }

    /// A branch for one bidder's stages.
    pub fn fork(&self) -> Self {
        Self {
            endpoint: self.endpoint,
            debug_enabled: self.debug_enabled,
            deadline: self.deadline,
            account: Arc::clone(&self.account),
            plan: Arc::clone(&self.plan),
            module_contexts: self.module_contexts.fork(),
            stage_outcomes: StageOutcomes::default(),
        }
    }

    /// Merges a branch back: its module context writes and stage outcomes.
    pub fn join(&mut self, branch: HookExecutionContext) {
        self.module_contexts.join(branch.module_contexts);
        self.stage_outcomes.extend(branch.stage_outcomes);
    }

    /// Analytics tags of every invocation, in execution order.
    pub fn analytics_tags(&self) -> impl Iterator<Item = (&HookId, &Tags)> {
        self.stage_outcomes.hooks().filter_map(|outcome| {
            outcome
                .analytics_tags
                .as_ref()
                .map(|tags| (&outcome.hook_id, tags))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{ExecutionStatus, GroupExecutionOutcome, HookExecutionOutcome};
    use serde_json::json;

    fn outcome(entity: &str) -> StageExecutionOutcome {
        StageExecutionOutcome {
            entity: entity.to_string(),
            groups: vec![GroupExecutionOutcome {
                hooks: vec![HookExecutionOutcome::new(
                    HookId::new("m", "h"),
                    Duration::from_millis(1),
                    ExecutionStatus::Success,
                )],
                execution_time: Duration::from_millis(1),
            }],
            execution_time: Duration::from_millis(1),
        }
    }

    #[test]
    fn reads_account_module_config() {
        let account: AccountHooksConfig =
            serde_json::from_value(json!({"id": "acc-1", "modules": {"m": {"enabled": true}}}))
                .unwrap();
        assert_eq!(account.id(), "acc-1");
        assert_eq!(
            account.module_config("m").map(|config| config.as_ref()),
            Some(&json!({"enabled": true}))
        );
        assert!(account.module_config("other").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn budget_is_capped_by_deadline() {
        let context =
            HookExecutionContext::new(Endpoint::Auction).with_timeout(Duration::from_millis(80));
        assert_eq!(context.budget(Duration::from_millis(100)), Duration::from_millis(80));
        assert_eq!(context.budget(Duration::from_millis(30)), Duration::from_millis(30));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(context.budget(Duration::from_millis(30)), Duration::ZERO);
    }

    #[test]
    fn join_appends_branch_outcomes() {
        let mut context = HookExecutionContext::new(Endpoint::Auction);
        let mut first = context.fork();
        let mut second = context.fork();
        first.record(Stage::BidderRequest, outcome("bidder1"));
        second.record(Stage::BidderRequest, outcome("bidder2"));

        context.join(first);
        context.join(second);

        let entities: Vec<_> = context
            .stage_outcomes()
            .get(Stage::BidderRequest)
            .iter()
            .map(|outcome| outcome.entity.as_str())
            .collect();
        assert_eq!(entities, vec!["bidder1", "bidder2"]);
    }
}
