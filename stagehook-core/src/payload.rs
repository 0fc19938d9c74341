//! Stage payloads and payload updates.

use crate::error::BoxError;
use std::fmt;

/// A marker trait for the values flowing through a stage.
///
/// Hooks only ever see a shared reference to the payload. Changes are
/// described as a [`PayloadUpdate`] and applied by the engine after the
/// group that produced them has finished.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid Payload",
    label = "must be `Clone + Send + Sync + 'static`",
    note = "Stage payloads are shared between concurrently running hooks."
)]
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Payload for T {}

type UpdateFn<P> = dyn FnOnce(&P) -> Result<P, BoxError> + Send;

/// A deferred transformation from one payload to the next.
///
/// An update never sees the payload until the engine applies it, so hooks of
/// the same group cannot observe each other's changes.
pub struct PayloadUpdate<P> {
    apply: Box<UpdateFn<P>>,
}

impl<P: Payload> PayloadUpdate<P> {
    /// Creates an update that may fail.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&P) -> Result<P, BoxError> + Send + 'static,
    {
        Self { apply: Box::new(f) }
    }

    /// Creates an update that always succeeds.
    pub fn map<F>(f: F) -> Self
    where
        F: FnOnce(&P) -> P + Send + 'static,
    {
        Self::new(move |payload| Ok(f(payload)))
    }

    /// Applies the update, producing a new payload.
    pub fn apply(self, payload: &P) -> Result<P, BoxError> {
        (self.apply)(payload)
    }
}

impl<P> fmt::Debug for PayloadUpdate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PayloadUpdate")
    }
}

/// The payload type of every stage, chosen by the host server.
///
/// The engine is generic over this bundle so it never depends on a concrete
/// request or response model.
pub trait StagePayloads: Send + Sync + 'static {
    /// Payload of the entrypoint stage.
    type Entrypoint: Payload;
    /// Payload of the raw and processed auction request stages.
    type AuctionRequest: Payload;
    /// Payload of the bidder request stage.
    type BidderRequest: Payload;
    /// Payload of the raw and processed bidder response stages.
    type BidderResponse: Payload;
    /// Payload of the auction response stage.
    type AuctionResponse: Payload;
    /// Payload of the exitpoint stage.
    type Exitpoint: Payload;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_produces_new_payload() {
        let update = PayloadUpdate::map(|s: &String| format!("{s}!"));
        let original = String::from("bid");
        assert_eq!(update.apply(&original).unwrap(), "bid!");
        assert_eq!(original, "bid");
    }

    #[test]
    fn failing_update_reports_error() {
        let update = PayloadUpdate::<String>::new(|_| Err("broken".into()));
        let err = update.apply(&String::new()).unwrap_err();
        assert_eq!(err.to_string(), "broken");
    }
}
