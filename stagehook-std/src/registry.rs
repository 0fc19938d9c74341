//! Registry of hook implementations.
//!
//! Modules are registered once at startup. The resulting [`HookRegistry`] is
//! immutable and shared by every request; execution plans refer to its hooks
//! by [`HookId`].

use crate::plan::ExecutionPlan;
use stagehook_core::{DynHook, Hook, HookId, PlanError, Stage, StagePayloads};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A hook bound to the stage it serves.
pub enum StageHook<T: StagePayloads> {
    /// Entrypoint hook.
    Entrypoint(Arc<dyn DynHook<T::Entrypoint>>),
    /// Raw auction request hook.
    RawAuctionRequest(Arc<dyn DynHook<T::AuctionRequest>>),
    /// Processed auction request hook.
    ProcessedAuctionRequest(Arc<dyn DynHook<T::AuctionRequest>>),
    /// Bidder request hook.
    BidderRequest(Arc<dyn DynHook<T::BidderRequest>>),
    /// Raw bidder response hook.
    RawBidderResponse(Arc<dyn DynHook<T::BidderResponse>>),
    /// Processed bidder response hook.
    ProcessedBidderResponse(Arc<dyn DynHook<T::BidderResponse>>),
    /// Auction response hook.
    AuctionResponse(Arc<dyn DynHook<T::AuctionResponse>>),
    /// Exitpoint hook.
    Exitpoint(Arc<dyn DynHook<T::Exitpoint>>),
}

/// A named set of hooks.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a hook module for `{T}`",
    note = "Modules must list their hooks for the host's stage payloads."
)]
pub trait Module<T: StagePayloads>: Send + Sync + 'static {
    /// Code of the module, unique within a registry.
    fn code(&self) -> &str;

    /// Every hook the module provides.
    fn hooks(&self) -> Vec<StageHook<T>>;
}

/// Immutable lookup of hooks by id.
pub struct HookRegistry<T: StagePayloads> {
    hooks: HashMap<HookId, StageHook<T>>,
}

macro_rules! stage_hooks {
    ($($variant:ident => $ctor:ident, $getter:ident, $payload:ident;)*) => {
        impl<T: StagePayloads> StageHook<T> {
            $(
                #[doc = concat!("Binds a hook to the `", stringify!($variant), "` stage.")]
                pub fn $ctor(hook: impl Hook<T::$payload>) -> Self {
                    StageHook::$variant(Arc::new(hook))
                }
            )*

            /// The stage the hook serves.
            pub fn stage(&self) -> Stage {
                match self {
                    $(StageHook::$variant(_) => Stage::$variant,)*
                }
            }

            /// Code of the hook.
            pub fn code(&self) -> &str {
                match self {
                    $(StageHook::$variant(hook) => hook.code_dyn(),)*
                }
            }
        }

        impl<T: StagePayloads> Clone for StageHook<T> {
            fn clone(&self) -> Self {
                match self {
                    $(StageHook::$variant(hook) => StageHook::$variant(Arc::clone(hook)),)*
                }
            }
        }

        impl<T: StagePayloads> HookRegistry<T> {
            $(
                #[doc = concat!("Looks up a `", stringify!($variant), "` hook.")]
                pub fn $getter(&self, id: &HookId) -> Option<Arc<dyn DynHook<T::$payload>>> {
                    match self.hooks.get(id) {
                        Some(StageHook::$variant(hook)) => Some(Arc::clone(hook)),
                        _ => None,
                    }
                }
            )*
        }
    };
}

stage_hooks! {
    Entrypoint => entrypoint, entrypoint_hook, Entrypoint;
    RawAuctionRequest => raw_auction_request, raw_auction_request_hook, AuctionRequest;
    ProcessedAuctionRequest => processed_auction_request, processed_auction_request_hook, AuctionRequest;
    BidderRequest => bidder_request, bidder_request_hook, BidderRequest;
    RawBidderResponse => raw_bidder_response, raw_bidder_response_hook, BidderResponse;
    ProcessedBidderResponse => processed_bidder_response, processed_bidder_response_hook, BidderResponse;
    AuctionResponse => auction_response, auction_response_hook, AuctionResponse;
    Exitpoint => exitpoint, exitpoint_hook, Exitpoint;
}

impl<T: StagePayloads> HookRegistry<T> {
    /// Starts a registry.
    pub fn builder() -> HookRegistryBuilder<T> {
        HookRegistryBuilder::new()
    }

    /// Whether `id` is registered for `stage`.
    pub fn contains(&self, stage: Stage, id: &HookId) -> bool {
        self.hooks
            .get(id)
            .is_some_and(|hook| hook.stage() == stage)
    }

    /// Checks that every hook in `plan` is registered for its stage.
    pub fn validate(&self, plan: &ExecutionPlan) -> Result<(), PlanError> {
        let mut planned: Vec<_> = plan.hook_ids().collect();
        planned.sort();
        match planned
            .into_iter()
            .find(|(stage, id)| !self.contains(*stage, id))
        {
            Some((stage, id)) => Err(PlanError::UnknownHook {
                stage,
                hook_id: id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Builder for constructing a [`HookRegistry`].
pub struct HookRegistryBuilder<T: StagePayloads> {
    hooks: HashMap<HookId, StageHook<T>>,
}

impl<T: StagePayloads> Default for HookRegistryBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StagePayloads> HookRegistryBuilder<T> {
    /// Create a new empty registry builder.
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Register every hook of a module.
    pub fn module<M: Module<T>>(mut self, module: M) -> Self {
        for hook in module.hooks() {
            self = self.hook(module.code(), hook);
        }
        self
    }

    /// Register a single hook under `module_code`.
    pub fn hook(mut self, module_code: impl Into<String>, hook: StageHook<T>) -> Self {
        let id = HookId::new(module_code, hook.code());
        if self.hooks.insert(id.clone(), hook).is_some() {
            warn!(hook = %id, "hook registered twice, keeping the last registration");
        }
        self
    }

    /// Build the registry.
    pub fn build(self) -> HookRegistry<T> {
        HookRegistry { hooks: self.hooks }
    }
}
