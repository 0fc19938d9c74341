//! The read-only view a hook gets of its invocation.

use crate::stage::{Endpoint, Stage};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Opaque per-module state carried across stages of one request.
///
/// The engine never looks inside. Modules downcast it back to their own type.
pub type ModuleContext = Arc<dyn Any + Send + Sync>;

/// Everything a hook may know about the call it is serving.
#[derive(Clone)]
pub struct InvocationContext {
    stage: Stage,
    endpoint: Endpoint,
    entity: String,
    timeout: Duration,
    debug_enabled: bool,
    account_config: Option<Arc<Value>>,
    module_context: Option<ModuleContext>,
}

impl InvocationContext {
    /// Creates a context for a call at `stage` on behalf of `entity`.
    pub fn new(stage: Stage, endpoint: Endpoint, entity: impl Into<String>) -> Self {
        Self {
            stage,
            endpoint,
            entity: entity.into(),
            timeout: Duration::ZERO,
            debug_enabled: false,
            account_config: None,
            module_context: None,
        }
    }

    /// Sets the time budget of the call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether the request runs in debug mode.
    pub fn with_debug_enabled(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// Sets the account's configuration of the hook's module.
    pub fn with_account_config(mut self, config: Option<Arc<Value>>) -> Self {
        self.account_config = config;
        self
    }

    /// Sets the module context visible to the hook.
    pub fn with_module_context(mut self, context: Option<ModuleContext>) -> Self {
        self.module_context = context;
        self
    }

    /// The stage being executed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The endpoint serving the request.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// The entity the stage runs for: a bidder code at bidder stages.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The time budget granted to this call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the request runs in debug mode.
    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }

    /// The account's configuration of the hook's module, if any.
    pub fn account_config(&self) -> Option<&Value> {
        self.account_config.as_deref()
    }

    /// The module context as last written by this module.
    pub fn module_context(&self) -> Option<&ModuleContext> {
        self.module_context.as_ref()
    }

    /// The module context downcast to the module's own type.
    pub fn module_context_as<T: Any>(&self) -> Option<&T> {
        self.module_context
            .as_deref()
            .and_then(|context| context.downcast_ref::<T>())
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("stage", &self.stage)
            .field("endpoint", &self.endpoint)
            .field("entity", &self.entity)
            .field("timeout", &self.timeout)
            .field("debug_enabled", &self.debug_enabled)
            .field("account_config", &self.account_config)
            .field("module_context", &self.module_context.is_some())
            .finish()
    }
}
