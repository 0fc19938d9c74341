//! Error types for Stagehook.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`HookError`] - Why a single hook invocation did not succeed
//! - [`PlanError`] - Errors while loading or validating an execution plan
//! - [`AuctionError`] - Errors raised by the auction collaborator around the stages

use crate::stage::{HookId, Stage};
use std::time::Duration;
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while invoking a hook.
///
/// The `Display` text of each variant is what lands in the execution trace
/// as the invocation message.
#[derive(Error, Debug)]
pub enum HookError {
    /// The hook did not finish inside its budget.
    #[error("Timed out while executing action")]
    Timeout(Duration),

    /// The hook panicked during execution.
    #[error("Hook panicked: {0}")]
    Panic(String),

    /// The hook task was cancelled before it produced a result.
    #[error("Hook was cancelled")]
    Cancelled,

    /// The hook asked to reject at a stage that cannot be rejected.
    #[error("Rejection is not supported during this stage")]
    RejectNotAllowed,

    /// The payload update returned by the hook failed to apply.
    #[error("Payload update has thrown an exception: {0}")]
    UpdateFailed(#[source] BoxError),

    /// The hook itself reported a failure.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors in the hooks execution plan.
#[derive(Error, Debug)]
pub enum PlanError {
    /// The plan document is not valid JSON of the expected shape.
    #[error("Hooks execution plan could not be parsed")]
    Parse(#[from] serde_json::Error),

    /// The plan references a hook that is not registered for the stage.
    #[error("Hooks execution plan contains unknown or disabled hook: stage={stage}, hookId={hook_id}")]
    UnknownHook {
        /// Stage the hook was planned for.
        stage: Stage,
        /// The unresolved hook.
        hook_id: HookId,
    },
}

/// Errors raised by the auction around the hook stages.
///
/// Hook failures never surface here; only the non-hook steps of a request can
/// abort it.
#[derive(Error, Debug)]
pub enum AuctionError {
    /// The auction request could not be built from the entrypoint payload.
    #[error("auction request could not be built: {0}")]
    Request(#[source] BoxError),

    /// The auction response could not be assembled from the bidder responses.
    #[error("auction response could not be built: {0}")]
    Response(#[source] BoxError),

    /// The exitpoint payload could not be encoded.
    #[error("exitpoint could not be built: {0}")]
    Exitpoint(#[source] BoxError),
}

// Convenience conversions
impl From<BoxError> for HookError {
    fn from(err: BoxError) -> Self {
        HookError::Custom(err)
    }
}
