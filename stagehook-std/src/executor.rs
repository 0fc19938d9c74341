//! Stage entry points used by the request flow.
//!
//! [`HookStageExecutor`] resolves the plan of a stage against the registry,
//! runs it with a [`StageExecutor`] and records the stage outcome into the
//! request's [`HookExecutionContext`].

use crate::context::HookExecutionContext;
use crate::registry::HookRegistry;
use crate::stage::{ResolvedGroup, StageExecutionResult, StageExecutor};
use stagehook_core::{
    AUCTION_REQUEST_ENTITY, AUCTION_RESPONSE_ENTITY, DynHook, HTTP_REQUEST_ENTITY,
    HTTP_RESPONSE_ENTITY, HookId, Payload, Stage, StagePayloads,
};
use std::sync::Arc;
use tracing::{trace, warn};

/// Runs the hooks of each stage for a request.
pub struct HookStageExecutor<T: StagePayloads> {
    registry: Arc<HookRegistry<T>>,
}

impl<T: StagePayloads> Clone for HookStageExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: StagePayloads> HookStageExecutor<T> {
    /// Creates an executor over a registry.
    pub fn new(registry: impl Into<Arc<HookRegistry<T>>>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    /// The registry hooks are resolved from.
    pub fn registry(&self) -> &HookRegistry<T> {
        &self.registry
    }

    /// Runs the entrypoint stage.
    pub async fn execute_entrypoint_stage(
        &self,
        payload: T::Entrypoint,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<T::Entrypoint> {
        self.execute(Stage::Entrypoint, HTTP_REQUEST_ENTITY, payload, context, |id| {
            self.registry.entrypoint_hook(id)
        })
        .await
    }

    /// Runs the raw auction request stage.
    pub async fn execute_raw_auction_request_stage(
        &self,
        payload: T::AuctionRequest,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<T::AuctionRequest> {
        self.execute(
            Stage::RawAuctionRequest,
            AUCTION_REQUEST_ENTITY,
            payload,
            context,
            |id| self.registry.raw_auction_request_hook(id),
        )
        .await
    }

    /// Runs the processed auction request stage.
    pub async fn execute_processed_auction_request_stage(
        &self,
        payload: T::AuctionRequest,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<T::AuctionRequest> {
        self.execute(
            Stage::ProcessedAuctionRequest,
            AUCTION_REQUEST_ENTITY,
            payload,
            context,
            |id| self.registry.processed_auction_request_hook(id),
        )
        .await
    }

    /// Runs the bidder request stage for one bidder.
    pub async fn execute_bidder_request_stage(
        &self,
        bidder: &str,
        payload: T::BidderRequest,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<T::BidderRequest> {
        self.execute(Stage::BidderRequest, bidder, payload, context, |id| {
            self.registry.bidder_request_hook(id)
        })
        .await
    }

    /// Runs the raw bidder response stage for one bidder.
    pub async fn execute_raw_bidder_response_stage(
        &self,
        bidder: &str,
        payload: T::BidderResponse,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<T::BidderResponse> {
        self.execute(Stage::RawBidderResponse, bidder, payload, context, |id| {
            self.registry.raw_bidder_response_hook(id)
        })
        .await
    }

    /// Runs the processed bidder response stage for one bidder.
    pub async fn execute_processed_bidder_response_stage(
        &self,
        bidder: &str,
        payload: T::BidderResponse,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<T::BidderResponse> {
        self.execute(
            Stage::ProcessedBidderResponse,
            bidder,
            payload,
            context,
            |id| self.registry.processed_bidder_response_hook(id),
        )
        .await
    }

    /// Runs the auction response stage.
    pub async fn execute_auction_response_stage(
        &self,
        payload: T::AuctionResponse,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<T::AuctionResponse> {
        self.execute(
            Stage::AuctionResponse,
            AUCTION_RESPONSE_ENTITY,
            payload,
            context,
            |id| self.registry.auction_response_hook(id),
        )
        .await
    }

    /// Runs the exitpoint stage.
    pub async fn execute_exitpoint_stage(
        &self,
        payload: T::Exitpoint,
        context: &mut HookExecutionContext,
    ) -> StageExecutionResult<T::Exitpoint> {
        self.execute(Stage::Exitpoint, HTTP_RESPONSE_ENTITY, payload, context, |id| {
            self.registry.exitpoint_hook(id)
        })
        .await
    }

    async fn execute<P, F>(
        &self,
        stage: Stage,
        entity: &str,
        payload: P,
        context: &mut HookExecutionContext,
        resolve: F,
    ) -> StageExecutionResult<P>
    where
        P: Payload,
        F: Fn(&HookId) -> Option<Arc<dyn DynHook<P>>>,
    {
        let groups: Vec<ResolvedGroup<P>> = context
            .plan()
            .stage_plan(context.endpoint(), stage)
            .groups
            .iter()
            .map(|group| ResolvedGroup {
                timeout: group.timeout,
                hooks: group
                    .hook_sequence
                    .iter()
                    .filter_map(|id| match resolve(id) {
                        Some(hook) => Some((id.clone(), hook)),
                        None => {
                            warn!(%stage, hook = %id, "planned hook is not registered, skipping");
                            None
                        }
                    })
                    .collect(),
            })
            .collect();

        if groups.is_empty() {
            trace!(%stage, entity, "no hooks planned");
            return StageExecutionResult::bypassed(payload, entity);
        }

        let result = StageExecutor::new(stage, entity)
            .with_groups(groups)
            .execute(payload, context)
            .await;
        context.record(stage, result.outcome.clone());
        result
    }
}
