//! Drives one request through every stage.
//!
//! ```text
//! entrypoint -> raw-auction-request -> processed-auction-request
//!     -> per bidder, concurrently:
//!          bidder-request -> (call bidder) -> raw-bidder-response -> processed-bidder-response
//!     -> auction-response -> exitpoint
//! ```
//!
//! A reject at a request stage ends the request before any bidder is called.
//! A reject at a bidder stage removes that bidder only. Each bidder works on
//! its own fork of the request context; forks are joined back in bidder
//! declaration order once every bidder is done.

use crate::auction::Auction;
use crate::context::HookExecutionContext;
use crate::executor::HookStageExecutor;
use crate::stage::Rejection;
use crate::trace::{self, ExtModules};
use futures::future::join_all;
use stagehook_core::{AuctionError, HookId, Stage, StagePayloads, Tags};
use std::fmt;
use tracing::{debug, info, warn};

/// A request-level reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRejection {
    /// Stage at which the request was rejected.
    pub stage: Stage,
    /// The rejecting hook.
    pub hook_id: HookId,
    /// The reason it gave.
    pub reason: String,
}

/// How the request ended.
pub enum AuctionOutcome<T: StagePayloads> {
    /// Every stage ran; the exitpoint payload is the response.
    Completed(T::Exitpoint),
    /// A hook rejected the request.
    Rejected(RequestRejection),
}

impl<T: StagePayloads> fmt::Debug for AuctionOutcome<T>
where
    T::Exitpoint: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuctionOutcome::Completed(response) => {
                f.debug_tuple("Completed").field(response).finish()
            }
            AuctionOutcome::Rejected(rejection) => {
                f.debug_tuple("Rejected").field(rejection).finish()
            }
        }
    }
}

/// The outcome of a request with its execution record.
pub struct AuctionResult<T: StagePayloads> {
    /// How the request ended.
    pub outcome: AuctionOutcome<T>,
    /// The request context after the last executed stage.
    pub context: HookExecutionContext,
}

impl<T: StagePayloads> AuctionResult<T> {
    /// The rejection, if the request was rejected.
    pub fn rejection(&self) -> Option<&RequestRejection> {
        match &self.outcome {
            AuctionOutcome::Rejected(rejection) => Some(rejection),
            AuctionOutcome::Completed(_) => None,
        }
    }

    /// The response, if the request completed.
    pub fn response(&self) -> Option<&T::Exitpoint> {
        match &self.outcome {
            AuctionOutcome::Completed(response) => Some(response),
            AuctionOutcome::Rejected(_) => None,
        }
    }

    /// The trace for the response's debug section; `None` unless debug is on.
    pub fn debug_output(&self) -> Option<ExtModules> {
        trace::debug_output(&self.context)
    }

    /// Analytics tags of every invocation, regardless of debug mode.
    pub fn analytics_tags(&self) -> impl Iterator<Item = (&HookId, &Tags)> {
        self.context.analytics_tags()
    }
}

/// Runs the request flow around an [`Auction`].
pub struct RequestOrchestrator<T: StagePayloads, A> {
    executor: HookStageExecutor<T>,
    auction: A,
}

impl<T, A> RequestOrchestrator<T, A>
where
    T: StagePayloads,
    A: Auction<T> + Sync,
{
    /// Creates an orchestrator.
    pub fn new(executor: HookStageExecutor<T>, auction: A) -> Self {
        Self { executor, auction }
    }

    /// The auction collaborator.
    pub fn auction(&self) -> &A {
        &self.auction
    }

    /// Runs one request.
    ///
    /// Hook failures never surface as errors; only the auction's own steps
    /// can fail the request.
    pub async fn run(
        &self,
        payload: T::Entrypoint,
        mut context: HookExecutionContext,
    ) -> Result<AuctionResult<T>, AuctionError> {
        let entrypoint = self
            .executor
            .execute_entrypoint_stage(payload, &mut context)
            .await;
        if let Some(rejection) = entrypoint.rejection {
            return Ok(rejected(Stage::Entrypoint, rejection, context));
        }

        let request = self
            .auction
            .auction_request(&entrypoint.payload)
            .map_err(AuctionError::Request)?;
        let raw = self
            .executor
            .execute_raw_auction_request_stage(request, &mut context)
            .await;
        if let Some(rejection) = raw.rejection {
            return Ok(rejected(Stage::RawAuctionRequest, rejection, context));
        }

        let request = self
            .auction
            .process_auction_request(raw.payload)
            .map_err(AuctionError::Request)?;
        let processed = self
            .executor
            .execute_processed_auction_request_stage(request, &mut context)
            .await;
        if let Some(rejection) = processed.rejection {
            return Ok(rejected(Stage::ProcessedAuctionRequest, rejection, context));
        }

        let request = processed.payload;
        let responses = self.run_bidders(&request, &mut context).await;

        let response = self
            .auction
            .auction_response(&request, responses)
            .map_err(AuctionError::Response)?;
        let response = self
            .executor
            .execute_auction_response_stage(response, &mut context)
            .await
            .payload;

        let exitpoint = self
            .auction
            .exitpoint(&response)
            .map_err(AuctionError::Exitpoint)?;
        let exitpoint = self
            .executor
            .execute_exitpoint_stage(exitpoint, &mut context)
            .await
            .payload;

        Ok(AuctionResult {
            outcome: AuctionOutcome::Completed(exitpoint),
            context,
        })
    }

    async fn run_bidders(
        &self,
        request: &T::AuctionRequest,
        context: &mut HookExecutionContext,
    ) -> Vec<(String, T::BidderResponse)> {
        let parent = &*context;
        let runs = join_all(
            self.auction
                .bidder_requests(request)
                .into_iter()
                .map(|(bidder, bidder_request)| {
                    self.run_bidder(bidder, bidder_request, parent.fork())
                }),
        )
        .await;

        let mut responses = Vec::with_capacity(runs.len());
        for (bidder, branch, response) in runs {
            context.join(branch);
            if let Some(response) = response {
                responses.push((bidder, response));
            }
        }
        responses
    }

    async fn run_bidder(
        &self,
        bidder: String,
        request: T::BidderRequest,
        mut branch: HookExecutionContext,
    ) -> (String, HookExecutionContext, Option<T::BidderResponse>) {
        let response = self.bidder_stages(&bidder, request, &mut branch).await;
        (bidder, branch, response)
    }

    async fn bidder_stages(
        &self,
        bidder: &str,
        request: T::BidderRequest,
        branch: &mut HookExecutionContext,
    ) -> Option<T::BidderResponse> {
        let request = self
            .executor
            .execute_bidder_request_stage(bidder, request, branch)
            .await;
        if let Some(rejection) = request.rejection {
            dropped(bidder, Stage::BidderRequest, &rejection);
            return None;
        }

        let raw = match self.auction.request_bids(bidder, request.payload).await {
            Ok(response) => response,
            Err(err) => {
                warn!(bidder, error = %err, "bidder call failed, dropping bidder");
                return None;
            }
        };

        let raw = self
            .executor
            .execute_raw_bidder_response_stage(bidder, raw, branch)
            .await;
        if let Some(rejection) = raw.rejection {
            dropped(bidder, Stage::RawBidderResponse, &rejection);
            return None;
        }

        let response = self.auction.process_bidder_response(bidder, raw.payload);
        let processed = self
            .executor
            .execute_processed_bidder_response_stage(bidder, response, branch)
            .await;
        if let Some(rejection) = processed.rejection {
            dropped(bidder, Stage::ProcessedBidderResponse, &rejection);
            return None;
        }

        Some(processed.payload)
    }
}

fn rejected<T: StagePayloads>(
    stage: Stage,
    rejection: Rejection,
    context: HookExecutionContext,
) -> AuctionResult<T> {
    info!(
        %stage,
        hook = %rejection.hook_id,
        reason = %rejection.reason,
        "request rejected by hook"
    );
    AuctionResult {
        outcome: AuctionOutcome::Rejected(RequestRejection {
            stage,
            hook_id: rejection.hook_id,
            reason: rejection.reason,
        }),
        context,
    }
}

fn dropped(bidder: &str, stage: Stage, rejection: &Rejection) {
    debug!(
        bidder,
        %stage,
        hook = %rejection.hook_id,
        reason = %rejection.reason,
        "bidder rejected by hook"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ExecutionGroup, ExecutionPlan, StageExecutionPlan};
    use crate::registry::{HookRegistry, StageHook};
    use crate::testing::{FnHook, HookOutput, StubAuction, TestPayloads};
    use stagehook_core::{Endpoint, InvocationContext, InvocationResult};
    use std::time::Duration;

    fn rejecting_if(bidder: &'static str) -> StageHook<TestPayloads> {
        StageHook::bidder_request(FnHook::new(
            "gate",
            move |_: &String, context: &InvocationContext| -> HookOutput<String> {
                if context.entity() == bidder {
                    Ok(InvocationResult::reject("not today"))
                } else {
                    Ok(InvocationResult::no_action())
                }
            },
        ))
    }

    fn single(stage: Stage, hook_impl_code: &str) -> ExecutionPlan {
        ExecutionPlan::default().with_stage(
            Endpoint::Auction,
            stage,
            StageExecutionPlan::new(vec![ExecutionGroup::new(
                Duration::from_millis(100),
                vec![HookId::new("m", hook_impl_code)],
            )]),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn completes_without_hooks() {
        let orchestrator = RequestOrchestrator::new(
            HookStageExecutor::new(HookRegistry::<TestPayloads>::builder().build()),
            StubAuction::new(["a", "b"]),
        );

        let result = orchestrator
            .run(String::from("req"), HookExecutionContext::new(Endpoint::Auction))
            .await
            .unwrap();

        assert_eq!(result.response().map(String::as_str), Some("bid-a,bid-b"));
        assert!(result.debug_output().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn bidder_reject_removes_only_that_bidder() {
        let registry = HookRegistry::builder().hook("m", rejecting_if("b")).build();
        let auction = StubAuction::new(["a", "b", "c"]);
        let orchestrator = RequestOrchestrator::new(HookStageExecutor::new(registry), auction);

        let context = HookExecutionContext::new(Endpoint::Auction)
            .with_plan(single(Stage::BidderRequest, "gate"));
        let result = orchestrator.run(String::from("req"), context).await.unwrap();

        assert_eq!(result.response().map(String::as_str), Some("bid-a,bid-c"));
        let mut called = orchestrator.auction().bidder_calls();
        called.sort();
        assert_eq!(called, vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_bidder_is_dropped() {
        let orchestrator = RequestOrchestrator::new(
            HookStageExecutor::new(HookRegistry::<TestPayloads>::builder().build()),
            StubAuction::new(["a", "b"]).failing("a"),
        );

        let result = orchestrator
            .run(String::from("req"), HookExecutionContext::new(Endpoint::Auction))
            .await
            .unwrap();

        assert_eq!(result.response().map(String::as_str), Some("bid-b"));
    }
}
