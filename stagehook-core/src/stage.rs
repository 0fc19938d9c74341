//! Stages, endpoints and hook identities.
//!
//! A request passes through a fixed sequence of [`Stage`]s. Each stage is
//! either request-scoped, bidder-scoped (runs once per bidder) or
//! response-scoped, which decides whether hooks may reject at that point.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique identifier of a hook implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HookId {
    /// Code of the module that owns the hook.
    #[serde(rename = "module-code")]
    pub module_code: String,
    /// Code of the hook inside its module.
    #[serde(rename = "hook-impl-code")]
    pub hook_impl_code: String,
}

impl HookId {
    /// Creates a hook id from its module and implementation codes.
    pub fn new(module_code: impl Into<String>, hook_impl_code: impl Into<String>) -> Self {
        Self {
            module_code: module_code.into(),
            hook_impl_code: hook_impl_code.into(),
        }
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module_code, self.hook_impl_code)
    }
}

/// A named point in the request lifecycle.
///
/// Variants are declared in lifecycle order, so `Ord` sorts stages the way a
/// request visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// The raw HTTP request, before any parsing.
    Entrypoint,
    /// The auction request as parsed.
    RawAuctionRequest,
    /// The auction request after enrichment.
    ProcessedAuctionRequest,
    /// The request about to be sent to one bidder.
    BidderRequest,
    /// The bids as returned by one bidder.
    RawBidderResponse,
    /// The bids of one bidder after validation.
    ProcessedBidderResponse,
    /// The assembled auction response.
    AuctionResponse,
    /// The encoded HTTP response.
    Exitpoint,
}

/// Which part of the request a stage operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageScope {
    /// Runs once per request; a reject ends the request.
    Request,
    /// Runs once per bidder; a reject removes that bidder.
    Bidder,
    /// Runs once per request after bidding; rejects are not honored.
    Response,
}

impl Stage {
    /// All stages in lifecycle order.
    pub const ALL: [Stage; 8] = [
        Stage::Entrypoint,
        Stage::RawAuctionRequest,
        Stage::ProcessedAuctionRequest,
        Stage::BidderRequest,
        Stage::RawBidderResponse,
        Stage::ProcessedBidderResponse,
        Stage::AuctionResponse,
        Stage::Exitpoint,
    ];

    /// The configuration name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Entrypoint => "entrypoint",
            Stage::RawAuctionRequest => "raw-auction-request",
            Stage::ProcessedAuctionRequest => "processed-auction-request",
            Stage::BidderRequest => "bidder-request",
            Stage::RawBidderResponse => "raw-bidder-response",
            Stage::ProcessedBidderResponse => "processed-bidder-response",
            Stage::AuctionResponse => "auction-response",
            Stage::Exitpoint => "exitpoint",
        }
    }

    /// The scope of the stage.
    pub fn scope(&self) -> StageScope {
        match self {
            Stage::Entrypoint | Stage::RawAuctionRequest | Stage::ProcessedAuctionRequest => {
                StageScope::Request
            }
            Stage::BidderRequest | Stage::RawBidderResponse | Stage::ProcessedBidderResponse => {
                StageScope::Bidder
            }
            Stage::AuctionResponse | Stage::Exitpoint => StageScope::Response,
        }
    }

    /// Whether a reject returned at this stage is honored.
    pub fn is_reject_allowed(&self) -> bool {
        self.scope() != StageScope::Response
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity label of the HTTP request at the entrypoint stage.
pub const HTTP_REQUEST_ENTITY: &str = "http-request";
/// Entity label of the auction request stages.
pub const AUCTION_REQUEST_ENTITY: &str = "auction-request";
/// Entity label of the auction response stage.
pub const AUCTION_RESPONSE_ENTITY: &str = "auction-response";
/// Entity label of the HTTP response at the exitpoint stage.
pub const HTTP_RESPONSE_ENTITY: &str = "http-response";

/// A request endpoint that carries its own execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    /// OpenRTB auction.
    #[serde(rename = "/openrtb2/auction")]
    Auction,
    /// AMP auction.
    #[serde(rename = "/openrtb2/amp")]
    Amp,
    /// Video auction.
    #[serde(rename = "/openrtb2/video")]
    Video,
}

impl Endpoint {
    /// The request path of the endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Auction => "/openrtb2/auction",
            Endpoint::Amp => "/openrtb2/amp",
            Endpoint::Video => "/openrtb2/video",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
