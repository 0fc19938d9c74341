//! Hooks execution plan.
//!
//! The plan says, per endpoint and stage, which hooks run in which groups and
//! under which time ceiling. It is read from JSON:
//!
//! ```json
//! {
//!   "endpoints": {
//!     "/openrtb2/auction": {
//!       "stages": {
//!         "bidder-request": {
//!           "groups": [
//!             {
//!               "timeout": 50,
//!               "hook-sequence": [
//!                 {"module-code": "ortb2-blocking", "hook-impl-code": "ortb2-blocking-bidder-request"}
//!               ]
//!             }
//!           ]
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use stagehook_core::{Endpoint, HookId, PlanError, Stage};
use std::collections::HashMap;
use std::time::Duration;

static EMPTY_STAGE_PLAN: StageExecutionPlan = StageExecutionPlan { groups: Vec::new() };

/// Execution plan of every endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Per-endpoint plans.
    #[serde(default)]
    pub endpoints: HashMap<Endpoint, EndpointExecutionPlan>,
}

/// Execution plan of one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointExecutionPlan {
    /// Per-stage plans.
    #[serde(default)]
    pub stages: HashMap<Stage, StageExecutionPlan>,
}

/// Execution plan of one stage: groups run in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageExecutionPlan {
    /// Groups in execution order.
    #[serde(default)]
    pub groups: Vec<ExecutionGroup>,
}

/// Hooks that run concurrently under one time ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGroup {
    /// Ceiling on each hook's runtime, in milliseconds on the wire.
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Hooks in static order.
    #[serde(rename = "hook-sequence", default)]
    pub hook_sequence: Vec<HookId>,
}

impl ExecutionPlan {
    /// Parses a plan; a blank document is an empty plan.
    pub fn parse(json: &str) -> Result<Self, PlanError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Adds or replaces the plan of one stage.
    pub fn with_stage(mut self, endpoint: Endpoint, stage: Stage, plan: StageExecutionPlan) -> Self {
        self.endpoints
            .entry(endpoint)
            .or_default()
            .stages
            .insert(stage, plan);
        self
    }

    /// The plan of `stage` on `endpoint`; empty when not configured.
    pub fn stage_plan(&self, endpoint: Endpoint, stage: Stage) -> &StageExecutionPlan {
        self.endpoints
            .get(&endpoint)
            .and_then(|plan| plan.stages.get(&stage))
            .unwrap_or(&EMPTY_STAGE_PLAN)
    }

    /// Every planned hook with the stage it is planned for.
    pub fn hook_ids(&self) -> impl Iterator<Item = (Stage, &HookId)> {
        self.endpoints.values().flat_map(|endpoint| {
            endpoint.stages.iter().flat_map(|(stage, plan)| {
                plan.groups
                    .iter()
                    .flat_map(move |group| group.hook_sequence.iter().map(move |id| (*stage, id)))
            })
        })
    }
}

impl StageExecutionPlan {
    /// Creates a stage plan from its groups.
    pub fn new(groups: Vec<ExecutionGroup>) -> Self {
        Self { groups }
    }
}

impl ExecutionGroup {
    /// Creates a group.
    pub fn new(timeout: Duration, hook_sequence: Vec<HookId>) -> Self {
        Self {
            timeout,
            hook_sequence,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
