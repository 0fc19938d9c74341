#![allow(dead_code)]

use stagehook::testing::{FnHook, HookOutput};
use stagehook::{
    Auction, BoxError, Endpoint, ExecutionGroup, ExecutionPlan, HookExecutionContext, HookId,
    InvocationContext, InvocationResult, PayloadUpdate, Stage, StageExecutionPlan, StagePayloads,
};
use stagehook_ortb2_blocking::{BidRequest, BidderBid};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MODULE: &str = "m";

// ============================================================================
// Plans
// ============================================================================

/// A group of module `m` hooks with a timeout in milliseconds.
pub fn group(timeout: u64, codes: &[&str]) -> ExecutionGroup {
    ExecutionGroup::new(
        Duration::from_millis(timeout),
        codes.iter().map(|code| HookId::new(MODULE, *code)).collect(),
    )
}

/// A plan for one stage of the auction endpoint.
pub fn plan(stage: Stage, groups: Vec<ExecutionGroup>) -> ExecutionPlan {
    add_stage(ExecutionPlan::default(), stage, groups)
}

pub fn add_stage(plan: ExecutionPlan, stage: Stage, groups: Vec<ExecutionGroup>) -> ExecutionPlan {
    plan.with_stage(Endpoint::Auction, stage, StageExecutionPlan::new(groups))
}

pub fn context(plan: ExecutionPlan) -> HookExecutionContext {
    HookExecutionContext::new(Endpoint::Auction).with_plan(plan)
}

// ============================================================================
// Hooks
// ============================================================================

/// A hook that appends `suffix` to a string payload.
pub fn appending(
    code: &str,
    suffix: &'static str,
) -> FnHook<impl Fn(&String, &InvocationContext) -> HookOutput<String> + Send + Sync + 'static> {
    FnHook::new(code, move |_: &String, _: &InvocationContext| -> HookOutput<String> {
        Ok(InvocationResult::update(PayloadUpdate::map(
            move |payload: &String| format!("{payload}{suffix}"),
        )))
    })
}

/// A hook that rejects with `reason`.
pub fn rejecting(
    code: &str,
    reason: &'static str,
) -> FnHook<impl Fn(&String, &InvocationContext) -> HookOutput<String> + Send + Sync + 'static> {
    FnHook::new(code, move |_: &String, _: &InvocationContext| -> HookOutput<String> {
        Ok(InvocationResult::reject(reason))
    })
}

// ============================================================================
// OpenRTB host
// ============================================================================

/// Stage payloads of a host speaking OpenRTB to its bidders.
pub struct OrtbPayloads;

impl StagePayloads for OrtbPayloads {
    type Entrypoint = String;
    type AuctionRequest = BidRequest;
    type BidderRequest = BidRequest;
    type BidderResponse = Vec<BidderBid>;
    type AuctionResponse = Vec<BidderBid>;
    type Exitpoint = String;
}

/// An auction whose bidders answer with canned bids.
///
/// The exitpoint is the comma separated ids of the winning bids.
#[derive(Clone, Default)]
pub struct OrtbAuction {
    bidders: Vec<String>,
    bids: HashMap<String, Vec<BidderBid>>,
    requests: Arc<Mutex<Vec<(String, BidRequest)>>>,
}

impl OrtbAuction {
    pub fn bidder(mut self, bidder: &str, bids: Vec<BidderBid>) -> Self {
        self.bidders.push(bidder.to_string());
        self.bids.insert(bidder.to_string(), bids);
        self
    }

    /// Requests the bidders received, in call order.
    pub fn requests(&self) -> Vec<(String, BidRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_for(&self, bidder: &str) -> Option<BidRequest> {
        self.requests()
            .into_iter()
            .find(|(called, _)| called == bidder)
            .map(|(_, request)| request)
    }
}

impl Auction<OrtbPayloads> for OrtbAuction {
    fn auction_request(&self, entrypoint: &String) -> Result<BidRequest, BoxError> {
        Ok(serde_json::from_str(entrypoint)?)
    }

    fn bidder_requests(&self, request: &BidRequest) -> Vec<(String, BidRequest)> {
        self.bidders
            .iter()
            .map(|bidder| (bidder.clone(), request.clone()))
            .collect()
    }

    async fn request_bids(
        &self,
        bidder: &str,
        request: BidRequest,
    ) -> Result<Vec<BidderBid>, BoxError> {
        self.requests
            .lock()
            .unwrap()
            .push((bidder.to_string(), request));
        Ok(self.bids.get(bidder).cloned().unwrap_or_default())
    }

    fn auction_response(
        &self,
        _request: &BidRequest,
        responses: Vec<(String, Vec<BidderBid>)>,
    ) -> Result<Vec<BidderBid>, BoxError> {
        Ok(responses.into_iter().flat_map(|(_, bids)| bids).collect())
    }

    fn exitpoint(&self, response: &Vec<BidderBid>) -> Result<String, BoxError> {
        Ok(response
            .iter()
            .map(|bid| bid.bid.id.as_str())
            .collect::<Vec<_>>()
            .join(","))
    }
}
