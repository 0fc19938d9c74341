//! # Hooks
//!
//! A hook is a unit of module code registered for exactly one [`Stage`]. It
//! receives the stage payload and its [`InvocationContext`] and answers with
//! an [`InvocationResult`]: leave the payload alone, update it, or reject.
//!
//! Hooks never mutate the payload in place. Everything a hook wants to change
//! is described in its result and applied by the engine, which is what lets
//! the hooks of one group run concurrently.
//!
//! # Static vs Dynamic Dispatch
//!
//! [`Hook`] uses native `async fn` for zero-cost static dispatch.
//! Registries store hooks as [`DynHook`] trait objects.
//!
//! [`Stage`]: crate::Stage

use crate::context::InvocationContext;
use crate::error::BoxError;
use crate::payload::Payload;
use crate::result::InvocationResult;
use std::{future::Future, pin::Pin};

/// The boxed future returned by [`DynHook::call_dyn`].
pub type HookFuture<'a, P> =
    Pin<Box<dyn Future<Output = Result<InvocationResult<P>, BoxError>> + Send + 'a>>;

/// A module hook for payloads of type `P`.
///
/// Returning `Err` marks the invocation as failed; the payload is left
/// untouched and the request carries on.
///
/// # Example
///
/// ```rust,ignore
/// struct Uppercase;
///
/// impl Hook<String> for Uppercase {
///     fn code(&self) -> &str {
///         "uppercase"
///     }
///
///     async fn call(&self, _: &String, _: &InvocationContext) -> Result<InvocationResult<String>, BoxError> {
///         Ok(InvocationResult::update(PayloadUpdate::map(|s: &String| s.to_uppercase())))
///     }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Hook<{P}>`",
    label = "missing `Hook` implementation",
    note = "Hooks must implement `call` for the payload type `{P}` of their stage."
)]
pub trait Hook<P: Payload>: Send + Sync + 'static {
    /// Code of the hook, unique within its module.
    fn code(&self) -> &str;

    /// Inspects the payload and decides what to do with it.
    fn call(
        &self,
        payload: &P,
        context: &InvocationContext,
    ) -> impl Future<Output = Result<InvocationResult<P>, BoxError>> + Send;
}

/// Dynamic object-safe version of [`Hook`].
pub trait DynHook<P: Payload>: Send + Sync + 'static {
    /// Code of the hook (dynamic dispatch version).
    fn code_dyn(&self) -> &str;

    /// Invokes the hook (dynamic dispatch version).
    fn call_dyn<'a>(&'a self, payload: &'a P, context: &'a InvocationContext)
    -> HookFuture<'a, P>;
}

// Blanket implementation: Any type implementing Hook implements DynHook automatically.
impl<P: Payload, T: Hook<P>> DynHook<P> for T {
    fn code_dyn(&self) -> &str {
        self.code()
    }

    fn call_dyn<'a>(
        &'a self,
        payload: &'a P,
        context: &'a InvocationContext,
    ) -> HookFuture<'a, P> {
        Box::pin(self.call(payload, context))
    }
}
