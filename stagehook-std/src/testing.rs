//! Testing utilities for Stagehook.
//!
//! This module provides utilities to make testing hooks and request flows easier.
//!
//! # Features
//!
//! - [`FnHook`]: A closure-backed hook with an optional delay that records its calls
//! - [`TestPayloads`]: A [`StagePayloads`] bundle over plain strings
//! - [`StubAuction`]: A scripted [`Auction`] that records bidder calls

use crate::auction::Auction;
use stagehook_core::{
    BoxError, Hook, InvocationContext, InvocationResult, Payload, StagePayloads,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a hook closure returns.
pub type HookOutput<P> = Result<InvocationResult<P>, BoxError>;

/// Hook body that leaves the payload untouched.
pub fn ok_no_action<P: Payload>(_payload: &P, _context: &InvocationContext) -> HookOutput<P> {
    Ok(InvocationResult::no_action())
}

// ============================================================================
// Call Log
// ============================================================================

/// Shared record of the contexts a hook was invoked with.
#[derive(Clone, Default)]
pub struct CallLog {
    contexts: Arc<Mutex<Vec<InvocationContext>>>,
}

impl CallLog {
    /// Get a clone of the recorded contexts.
    pub fn contexts(&self) -> Vec<InvocationContext> {
        self.contexts.lock().unwrap().clone()
    }

    /// Get the number of recorded calls.
    pub fn count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    fn record(&self, context: &InvocationContext) {
        self.contexts.lock().unwrap().push(context.clone());
    }
}

// ============================================================================
// Fn Hook
// ============================================================================

/// A hook backed by a closure.
///
/// # Example
///
/// ```rust,ignore
/// let hook = FnHook::new("append", |payload: &String, _: &InvocationContext| -> HookOutput<String> {
///     Ok(InvocationResult::update(PayloadUpdate::map(|s: &String| format!("{s}!"))))
/// })
/// .delayed(Duration::from_millis(20));
/// let calls = hook.calls();
///
/// // Register and run...
///
/// assert_eq!(calls.count(), 1);
/// ```
pub struct FnHook<F> {
    code: String,
    delay: Duration,
    calls: CallLog,
    func: F,
}

impl<F> FnHook<F> {
    /// Create a hook that runs `func` immediately.
    pub fn new(code: impl Into<String>, func: F) -> Self {
        Self {
            code: code.into(),
            delay: Duration::ZERO,
            calls: CallLog::default(),
            func,
        }
    }

    /// Sleep for `delay` before running the closure.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A handle on the calls made to this hook.
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

impl<P, F> Hook<P> for FnHook<F>
where
    P: Payload,
    F: Fn(&P, &InvocationContext) -> HookOutput<P> + Send + Sync + 'static,
{
    fn code(&self) -> &str {
        &self.code
    }

    async fn call(&self, payload: &P, context: &InvocationContext) -> HookOutput<P> {
        self.calls.record(context);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.func)(payload, context)
    }
}

// ============================================================================
// Test Payloads
// ============================================================================

/// Stage payloads for tests: requests are strings, responses are bid lists.
pub struct TestPayloads;

impl StagePayloads for TestPayloads {
    type Entrypoint = String;
    type AuctionRequest = String;
    type BidderRequest = String;
    type BidderResponse = Vec<String>;
    type AuctionResponse = Vec<String>;
    type Exitpoint = String;
}

// ============================================================================
// Stub Auction
// ============================================================================

/// A scripted auction over [`TestPayloads`].
///
/// - the auction request is the entrypoint body
/// - each bidder gets `"<request>|<bidder>"`
/// - each bidder answers with one bid `"bid-<bidder>"`
/// - the exitpoint joins the bids with commas
#[derive(Clone, Default)]
pub struct StubAuction {
    bidders: Vec<String>,
    failing: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubAuction {
    /// Create an auction over the given bidders, in declaration order.
    pub fn new<I, S>(bidders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bidders: bidders.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Make calls to `bidder` fail.
    pub fn failing(mut self, bidder: impl Into<String>) -> Self {
        self.failing.insert(bidder.into());
        self
    }

    /// Bidders that were called, in call order.
    pub fn bidder_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Auction<TestPayloads> for StubAuction {
    fn auction_request(&self, entrypoint: &String) -> Result<String, BoxError> {
        Ok(entrypoint.clone())
    }

    fn bidder_requests(&self, request: &String) -> Vec<(String, String)> {
        self.bidders
            .iter()
            .map(|bidder| (bidder.clone(), format!("{request}|{bidder}")))
            .collect()
    }

    async fn request_bids(&self, bidder: &str, _request: String) -> Result<Vec<String>, BoxError> {
        self.calls.lock().unwrap().push(bidder.to_string());
        if self.failing.contains(bidder) {
            return Err(format!("{bidder} unreachable").into());
        }
        Ok(vec![format!("bid-{bidder}")])
    }

    fn auction_response(
        &self,
        _request: &String,
        responses: Vec<(String, Vec<String>)>,
    ) -> Result<Vec<String>, BoxError> {
        Ok(responses.into_iter().flat_map(|(_, bids)| bids).collect())
    }

    fn exitpoint(&self, response: &Vec<String>) -> Result<String, BoxError> {
        Ok(response.join(","))
    }
}
