//! # stagehook-core
//!
//! Core contract between the Stagehook engine and hook modules.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! modules that only provide hooks and don't need the engine itself.
//!
//! # Building Blocks
//!
//! - [`Hook`] - a unit of module code attached to one [`Stage`]
//! - [`InvocationContext`] - what a hook may read about its call
//! - [`InvocationResult`] - what a hook hands back: an action plus metadata
//! - [`PayloadUpdate`] - a deferred payload transformation
//! - [`StagePayloads`] - the host's payload type for every stage
//! - [`Tags`] - analytics tags attached to a result
//!
//! # Error Types
//!
//! - [`HookError`] - Why an invocation did not succeed
//! - [`PlanError`] - Execution plan errors
//! - [`AuctionError`] - Errors raised around the stages

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod context;
mod error;
mod hook;
mod payload;
mod result;
mod stage;
mod tags;

// Re-exports
pub use context::{InvocationContext, ModuleContext};
pub use error::{AuctionError, BoxError, HookError, PlanError};
pub use hook::{DynHook, Hook, HookFuture};
pub use payload::{Payload, PayloadUpdate, StagePayloads};
pub use result::{ExecutionAction, InvocationAction, InvocationMetadata, InvocationResult};
pub use stage::{
    AUCTION_REQUEST_ENTITY, AUCTION_RESPONSE_ENTITY, Endpoint, HTTP_REQUEST_ENTITY,
    HTTP_RESPONSE_ENTITY, HookId, Stage, StageScope,
};
pub use tags::{Activity, ActivityResult, AppliedTo, Tags};
