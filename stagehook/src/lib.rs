//! # stagehook - Staged Hook Execution for Bid Auctions
//!
//! `stagehook` lets independently developed modules observe, modify or reject
//! a bid request at fixed points of its lifecycle without knowing about each
//! other.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagehook::prelude::*;
//!
//! let registry = HookRegistry::<MyPayloads>::builder()
//!     .module(MyModule::default())
//!     .build();
//! let plan = ExecutionPlan::parse(&plan_json)?;
//! registry.validate(&plan)?;
//!
//! let orchestrator = RequestOrchestrator::new(HookStageExecutor::new(registry), my_auction);
//! let context = HookExecutionContext::new(Endpoint::Auction)
//!     .with_plan(plan)
//!     .with_timeout(Duration::from_millis(500));
//! let result = orchestrator.run(http_request, context).await?;
//! ```
//!
//! ## Execution Model
//!
//! - Groups of a stage run one after another; hooks inside a group run
//!   concurrently, each under the group's time ceiling.
//! - Updates are applied in the group's static order once the group is done.
//! - A reject at a request stage ends the request; at a bidder stage it drops
//!   the bidder; at a response stage it is recorded as a failure.
//! - The execution trace is only returned when the request runs in debug mode.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use stagehook_core::{
    // Stages
    AUCTION_REQUEST_ENTITY,
    AUCTION_RESPONSE_ENTITY,
    // Analytics
    Activity,
    ActivityResult,
    AppliedTo,
    // Error types
    AuctionError,
    BoxError,
    // Hook
    DynHook,
    Endpoint,
    ExecutionAction,
    HTTP_REQUEST_ENTITY,
    HTTP_RESPONSE_ENTITY,
    Hook,
    HookError,
    HookFuture,
    HookId,
    InvocationAction,
    InvocationContext,
    InvocationMetadata,
    InvocationResult,
    ModuleContext,
    // Payload
    Payload,
    PayloadUpdate,
    PlanError,
    Stage,
    StagePayloads,
    StageScope,
    Tags,
};

pub use stagehook_std::{
    auction::{Auction, LocalAuction},
    context::{AccountHooksConfig, HookExecutionContext},
    executor::HookStageExecutor,
    module_context::ModuleContexts,
    orchestrator::{AuctionOutcome, AuctionResult, RequestOrchestrator, RequestRejection},
    outcome::{
        ExecutionStatus, GroupExecutionOutcome, HookExecutionOutcome, StageExecutionOutcome,
        StageOutcomes,
    },
    plan::{EndpointExecutionPlan, ExecutionGroup, ExecutionPlan, StageExecutionPlan},
    registry::{HookRegistry, HookRegistryBuilder, Module, StageHook},
    stage::{Rejection, ResolvedGroup, StageExecutionResult, StageExecutor},
};

/// Debug output of the execution record.
pub mod trace {
    pub use stagehook_std::trace::{
        ExtModules, ExtModulesTrace, ExtModulesTraceGroup, ExtModulesTraceInvocationResult,
        ExtModulesTraceStage, ExtModulesTraceStageOutcome, ModuleMessages, collect, debug_output,
    };
}

/// Low-level building blocks of stage execution.
pub mod engine {
    pub use stagehook_std::invoker::{Invocation, invoke};
    pub use stagehook_std::pipeline::{Applied, apply_updates};
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use stagehook_std::testing::*;
}

/// Prelude module - common imports for Stagehook.
///
/// # Usage
///
/// ```rust,ignore
/// use stagehook::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Request flow
        AccountHooksConfig,
        Auction,
        // Errors
        BoxError,
        Endpoint,
        ExecutionPlan,
        // Core traits
        Hook,
        HookExecutionContext,
        HookId,
        HookRegistry,
        HookStageExecutor,
        InvocationContext,
        InvocationResult,
        Module,
        PayloadUpdate,
        RequestOrchestrator,
        Stage,
        StageHook,
        StagePayloads,
    };
}
