//! # stagehook-ortb2-blocking
//!
//! Enforces an account's OpenRTB 2 blocking rules around each bidder call.
//!
//! - At `bidder-request` the blocked advertiser domains (`badv`), categories
//!   (`bcat`), app bundles (`bapp`), banner types (`btype`) and banner
//!   attributes (`battr`) are resolved for the bidder and written into its
//!   request.
//! - At `raw-bidder-response` bids carrying any of those values are dropped,
//!   when the account asks for enforcement.
//!
//! The account configuration lives under the module code `ortb2-blocking`:
//!
//! ```json
//! {"attributes": {
//!     "badv": {
//!         "enforce-blocks": true,
//!         "blocked-adomain": ["a.com"],
//!         "action-overrides": {
//!             "blocked-adomain": [
//!                 {"conditions": {"bidders": ["bidder1"]}, "override": ["b.com"]}
//!             ]
//!         }
//!     }
//! }}
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub mod config;
pub mod hooks;
pub mod openrtb;
pub mod request;
pub mod response;

pub use config::{AccountConfigReader, BlockedAttributes, InvalidAccountConfiguration};
pub use hooks::{BlockingContext, Ortb2BlockingBidderRequestHook, Ortb2BlockingRawBidderResponseHook};
pub use openrtb::{BidRequest, BidType, BidderBid, MediaTypes};

use stagehook_core::StagePayloads;
use stagehook_std::registry::{Module, StageHook};

/// Code of the module.
pub const MODULE_CODE: &str = "ortb2-blocking";

/// The blocking module, for any host whose bidder stages carry OpenRTB
/// requests and bid lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ortb2BlockingModule;

impl<T> Module<T> for Ortb2BlockingModule
where
    T: StagePayloads<BidderRequest = BidRequest, BidderResponse = Vec<BidderBid>>,
{
    fn code(&self) -> &str {
        MODULE_CODE
    }

    fn hooks(&self) -> Vec<StageHook<T>> {
        vec![
            StageHook::bidder_request(Ortb2BlockingBidderRequestHook),
            StageHook::raw_bidder_response(Ortb2BlockingRawBidderResponseHook),
        ]
    }
}
