//! What a hook hands back to the engine.

use crate::context::ModuleContext;
use crate::payload::{Payload, PayloadUpdate};
use crate::tags::Tags;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// The decision a hook made about the payload.
#[derive(Debug)]
pub enum InvocationAction<P> {
    /// Leave the payload as it is.
    NoAction,
    /// Replace the payload with the result of the update.
    Update(PayloadUpdate<P>),
    /// Stop the current scope of the request.
    Reject(String),
}

impl<P> InvocationAction<P> {
    /// The action without its data, as recorded in the trace.
    pub fn kind(&self) -> ExecutionAction {
        match self {
            InvocationAction::NoAction => ExecutionAction::NoAction,
            InvocationAction::Update(_) => ExecutionAction::Update,
            InvocationAction::Reject(_) => ExecutionAction::Reject,
        }
    }
}

/// Recorded kind of an [`InvocationAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionAction {
    /// The hook left the payload untouched.
    NoAction,
    /// The hook updated the payload.
    Update,
    /// The hook rejected.
    Reject,
}

/// The result of a successful hook invocation.
///
/// # Example
///
/// ```rust,ignore
/// InvocationResult::update(PayloadUpdate::map(|req: &Request| req.with_floor(1.0)))
///     .with_warnings(vec!["floor raised".into()])
///     .with_module_context(MyState::default())
/// ```
#[derive(Debug)]
pub struct InvocationResult<P> {
    action: InvocationAction<P>,
    metadata: InvocationMetadata,
}

/// Everything in an [`InvocationResult`] besides the action.
#[derive(Default)]
pub struct InvocationMetadata {
    /// Free-form message, e.g. the reject reason.
    pub message: Option<String>,
    /// Errors to surface in the debug output.
    pub errors: Vec<String>,
    /// Warnings to surface in the debug output.
    pub warnings: Vec<String>,
    /// Debug messages to surface in the debug output.
    pub debug_messages: Vec<String>,
    /// Analytics tags.
    pub analytics_tags: Option<Tags>,
    /// New module context for the hook's module.
    pub module_context: Option<ModuleContext>,
}

impl std::fmt::Debug for InvocationMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationMetadata")
            .field("message", &self.message)
            .field("errors", &self.errors)
            .field("warnings", &self.warnings)
            .field("debug_messages", &self.debug_messages)
            .field("analytics_tags", &self.analytics_tags)
            .field("module_context", &self.module_context.is_some())
            .finish()
    }
}

impl<P: Payload> InvocationResult<P> {
    /// A result that leaves the payload untouched.
    pub fn no_action() -> Self {
        Self::with_action(InvocationAction::NoAction)
    }

    /// A result that updates the payload.
    pub fn update(update: PayloadUpdate<P>) -> Self {
        Self::with_action(InvocationAction::Update(update))
    }

    /// A result that rejects with the given reason.
    pub fn reject(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut result = Self::with_action(InvocationAction::Reject(reason.clone()));
        result.metadata.message = Some(reason);
        result
    }

    fn with_action(action: InvocationAction<P>) -> Self {
        Self {
            action,
            metadata: InvocationMetadata::default(),
        }
    }

    /// Sets the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.metadata.message = Some(message.into());
        self
    }

    /// Sets the errors.
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.metadata.errors = errors;
        self
    }

    /// Appends one error.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.metadata.errors.push(error.into());
        self
    }

    /// Sets the warnings.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.metadata.warnings = warnings;
        self
    }

    /// Sets the debug messages.
    pub fn with_debug_messages(mut self, debug_messages: Vec<String>) -> Self {
        self.metadata.debug_messages = debug_messages;
        self
    }

    /// Sets the analytics tags.
    pub fn with_analytics_tags(mut self, tags: Tags) -> Self {
        self.metadata.analytics_tags = Some(tags);
        self
    }

    /// Sets the module context for the hook's module.
    pub fn with_module_context<C: Any + Send + Sync>(self, context: C) -> Self {
        self.with_shared_module_context(Arc::new(context))
    }

    /// Sets an already shared module context.
    pub fn with_shared_module_context(mut self, context: ModuleContext) -> Self {
        self.metadata.module_context = Some(context);
        self
    }

    /// The action.
    pub fn action(&self) -> &InvocationAction<P> {
        &self.action
    }

    /// The metadata.
    pub fn metadata(&self) -> &InvocationMetadata {
        &self.metadata
    }

    /// Splits the result into its action and metadata.
    pub fn into_parts(self) -> (InvocationAction<P>, InvocationMetadata) {
        (self.action, self.metadata)
    }
}
