//! The module's two hooks.
//!
//! The bidder-request hook writes the blocked attributes into the bidder's
//! request and remembers them in the module context. The raw-bidder-response
//! hook reads them back and drops the bids that violate them.

use crate::config::{AccountConfigReader, BlockedAttributes, InvalidAccountConfiguration};
use crate::openrtb::{BidRequest, BidderBid};
use crate::request::RequestUpdater;
use crate::response::{BidsBlocker, BlockingReport};
use stagehook_core::{
    Activity, BoxError, Hook, InvocationContext, InvocationResult, Payload, PayloadUpdate, Tags,
};
use std::collections::HashMap;
use tracing::debug;

/// Code of the bidder-request hook.
pub const BIDDER_REQUEST_HOOK_CODE: &str = "ortb2-blocking-bidder-request";
/// Code of the raw-bidder-response hook.
pub const RAW_BIDDER_RESPONSE_HOOK_CODE: &str = "ortb2-blocking-raw-bidder-response";

const ENFORCE_BLOCKING_ACTIVITY: &str = "enforce-blocking";
const SUCCESS_STATUS: &str = "success";

/// Blocked attributes per bidder, kept as the module context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockingContext {
    blocked: HashMap<String, BlockedAttributes>,
}

impl BlockingContext {
    /// Records the attributes blocked for `bidder`.
    pub fn with(mut self, bidder: impl Into<String>, blocked: BlockedAttributes) -> Self {
        self.blocked.insert(bidder.into(), blocked);
        self
    }

    /// Attributes blocked for `bidder`.
    pub fn blocked_attributes(&self, bidder: &str) -> Option<&BlockedAttributes> {
        self.blocked.get(bidder)
    }
}

/// Writes blocked attributes into the request sent to each bidder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ortb2BlockingBidderRequestHook;

impl Hook<BidRequest> for Ortb2BlockingBidderRequestHook {
    fn code(&self) -> &str {
        BIDDER_REQUEST_HOOK_CODE
    }

    async fn call(
        &self,
        request: &BidRequest,
        context: &InvocationContext,
    ) -> Result<InvocationResult<BidRequest>, BoxError> {
        let bidder = context.entity();
        let reader =
            AccountConfigReader::new(context.account_config(), bidder, context.debug_enabled());

        let resolved = match reader.blocked_attributes_for(request) {
            Ok(resolved) => resolved,
            Err(err) => return Ok(invalid_config(err, context)),
        };
        let Some(blocked) = resolved.value else {
            return Ok(InvocationResult::no_action().with_warnings(resolved.messages));
        };

        debug!(bidder, ?blocked, "blocking attributes in bidder request");
        let module_context = context
            .module_context_as::<BlockingContext>()
            .cloned()
            .unwrap_or_default()
            .with(bidder, blocked.clone());
        let updater = RequestUpdater::new(blocked);

        Ok(InvocationResult::update(PayloadUpdate::map(
            move |request: &BidRequest| updater.update(request),
        ))
        .with_warnings(resolved.messages)
        .with_module_context(module_context))
    }
}

/// Drops bids that carry attributes blocked in the bidder's request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ortb2BlockingRawBidderResponseHook;

impl Hook<Vec<BidderBid>> for Ortb2BlockingRawBidderResponseHook {
    fn code(&self) -> &str {
        RAW_BIDDER_RESPONSE_HOOK_CODE
    }

    async fn call(
        &self,
        bids: &Vec<BidderBid>,
        context: &InvocationContext,
    ) -> Result<InvocationResult<Vec<BidderBid>>, BoxError> {
        let bidder = context.entity();
        let blocked = context
            .module_context_as::<BlockingContext>()
            .and_then(|blocking| blocking.blocked_attributes(bidder));

        let BlockingReport {
            blocked,
            errors,
            warnings,
            debug_messages,
            analytics_results,
        } = BidsBlocker::new(bids, bidder)
            .with_account_config(context.account_config())
            .with_blocked_attributes(blocked)
            .with_debug_enabled(context.debug_enabled())
            .block();

        let result = if blocked.is_empty() {
            InvocationResult::no_action()
        } else {
            debug!(bidder, blocked = blocked.len(), "dropping blocked bids");
            InvocationResult::update(PayloadUpdate::map(move |bids: &Vec<BidderBid>| {
                bids.iter()
                    .enumerate()
                    .filter(|(index, _)| !blocked.contains(index))
                    .map(|(_, bid)| bid.clone())
                    .collect()
            }))
        };
        let result = result
            .with_errors(errors)
            .with_warnings(warnings)
            .with_debug_messages(debug_messages);

        if analytics_results.is_empty() {
            return Ok(result);
        }
        Ok(result.with_analytics_tags(Tags::new(vec![Activity::new(
            ENFORCE_BLOCKING_ACTIVITY,
            SUCCESS_STATUS,
            analytics_results,
        )])))
    }
}

fn invalid_config<P: Payload>(
    err: InvalidAccountConfiguration,
    context: &InvocationContext,
) -> InvocationResult<P> {
    debug!(bidder = context.entity(), error = %err, "invalid account configuration");
    if context.debug_enabled() {
        InvocationResult::no_action().with_error(err.to_string())
    } else {
        InvocationResult::no_action()
    }
}
