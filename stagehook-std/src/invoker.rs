//! Single hook invocation under a time budget.
//!
//! Every call runs on its own task so that a hook that overruns, panics or
//! never yields cannot hold up the request. When the budget runs out the task
//! is detached; whatever it produces afterwards is discarded.

use crate::outcome::ExecutionStatus;
use stagehook_core::{DynHook, HookError, HookId, InvocationContext, InvocationResult, Payload};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{Instrument, debug, warn};

/// The outcome of invoking one hook.
#[derive(Debug)]
pub struct Invocation<P> {
    /// The invoked hook.
    pub hook_id: HookId,
    /// Wall-clock time from start to result or timeout.
    pub execution_time: Duration,
    /// How the invocation ended.
    pub status: ExecutionStatus,
    /// Why the invocation did not succeed.
    pub error: Option<HookError>,
    /// The hook's result, present only on success.
    pub result: Option<InvocationResult<P>>,
}

impl<P> Invocation<P> {
    fn succeeded(hook_id: HookId, execution_time: Duration, result: InvocationResult<P>) -> Self {
        Self {
            hook_id,
            execution_time,
            status: ExecutionStatus::Success,
            error: None,
            result: Some(result),
        }
    }

    fn failed(hook_id: HookId, execution_time: Duration, error: HookError) -> Self {
        let status = match error {
            HookError::Timeout(_) => ExecutionStatus::Timeout,
            _ => ExecutionStatus::Failure,
        };
        Self {
            hook_id,
            execution_time,
            status,
            error: Some(error),
            result: None,
        }
    }
}

/// Invokes `hook` on `payload` and waits at most `budget` for its result.
///
/// A zero budget means the hook is not started at all and is reported as
/// timed out.
pub async fn invoke<P: Payload>(
    hook: Arc<dyn DynHook<P>>,
    hook_id: HookId,
    payload: Arc<P>,
    context: InvocationContext,
    budget: Duration,
) -> Invocation<P> {
    if budget.is_zero() {
        warn!(hook = %hook_id, stage = %context.stage(), "no time left, hook not started");
        return Invocation::failed(hook_id, Duration::ZERO, HookError::Timeout(budget));
    }

    let span = tracing::debug_span!(
        "hook",
        stage = %context.stage(),
        entity = context.entity(),
        module_code = %hook_id.module_code,
        hook_code = %hook_id.hook_impl_code,
    );
    let started = Instant::now();
    let task = tokio::spawn(
        async move { hook.call_dyn(payload.as_ref(), &context).await }.instrument(span),
    );

    // Dropping the handle on timeout detaches the task.
    let outcome = timeout(budget, task).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(Ok(result))) => {
            debug!(hook = %hook_id, action = ?result.action().kind(), ?elapsed, "hook succeeded");
            Invocation::succeeded(hook_id, elapsed, result)
        }
        Ok(Ok(Err(err))) => {
            warn!(hook = %hook_id, error = %err, "hook failed");
            Invocation::failed(hook_id, elapsed, HookError::Custom(err))
        }
        Ok(Err(join_err)) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            warn!(hook = %hook_id, panic = %message, "hook panicked");
            Invocation::failed(hook_id, elapsed, HookError::Panic(message))
        }
        Ok(Err(_)) => {
            warn!(hook = %hook_id, "hook task cancelled");
            Invocation::failed(hook_id, elapsed, HookError::Cancelled)
        }
        Err(_) => {
            warn!(hook = %hook_id, ?budget, "hook timed out");
            Invocation::failed(hook_id, elapsed, HookError::Timeout(budget))
        }
    }
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}
