//! The auction steps that happen between hook stages.
//!
//! The engine does not know how requests are parsed, how bidders are called
//! or how responses are assembled. The host supplies those steps through
//! [`Auction`], and the orchestrator runs the hook stages around them.

use stagehook_core::{BoxError, StagePayloads};

/// Non-hook steps of a request, in the order the orchestrator calls them.
///
/// [`Auction`] is the `Send` variant used by the orchestrator.
#[trait_variant::make(Auction: Send)]
pub trait LocalAuction<T: StagePayloads> {
    /// Builds the auction request from the entrypoint payload.
    fn auction_request(&self, entrypoint: &T::Entrypoint) -> Result<T::AuctionRequest, BoxError>;

    /// Enriches the raw auction request.
    fn process_auction_request(
        &self,
        request: T::AuctionRequest,
    ) -> Result<T::AuctionRequest, BoxError> {
        Ok(request)
    }

    /// Splits the request into one request per bidder, in declaration order.
    fn bidder_requests(&self, request: &T::AuctionRequest) -> Vec<(String, T::BidderRequest)>;

    /// Calls one bidder.
    async fn request_bids(
        &self,
        bidder: &str,
        request: T::BidderRequest,
    ) -> Result<T::BidderResponse, BoxError>;

    /// Validates one bidder's raw response.
    fn process_bidder_response(
        &self,
        _bidder: &str,
        response: T::BidderResponse,
    ) -> T::BidderResponse {
        response
    }

    /// Assembles the auction response from the surviving bidders.
    fn auction_response(
        &self,
        request: &T::AuctionRequest,
        responses: Vec<(String, T::BidderResponse)>,
    ) -> Result<T::AuctionResponse, BoxError>;

    /// Encodes the HTTP response.
    fn exitpoint(&self, response: &T::AuctionResponse) -> Result<T::Exitpoint, BoxError>;
}
