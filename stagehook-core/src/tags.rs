//! Analytics tags attached to invocation results.
//!
//! Tags are opaque to the engine. It only stores them on the outcome of the
//! invocation that produced them and exposes them to analytics consumers.

use serde::Serialize;
use serde_json::Value;

/// The analytics tags of one hook invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tags {
    /// Activities performed by the hook.
    pub activities: Vec<Activity>,
}

impl Tags {
    /// Creates tags from a list of activities.
    pub fn new(activities: Vec<Activity>) -> Self {
        Self { activities }
    }
}

/// A named piece of work performed by a hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    /// Activity name.
    pub name: String,
    /// Overall status of the activity.
    pub status: String,
    /// Per-object results.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<ActivityResult>,
}

impl Activity {
    /// Creates an activity.
    pub fn new(
        name: impl Into<String>,
        status: impl Into<String>,
        results: Vec<ActivityResult>,
    ) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            results,
        }
    }
}

/// The result of an activity for one object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityResult {
    /// Result status.
    pub status: String,
    /// Free-form details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
    /// Objects the result applies to.
    #[serde(rename = "appliedto", skip_serializing_if = "Option::is_none")]
    pub applied_to: Option<AppliedTo>,
}

impl ActivityResult {
    /// Creates a result with only a status.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            values: None,
            applied_to: None,
        }
    }

    /// Attaches free-form values.
    pub fn with_values(mut self, values: Value) -> Self {
        self.values = Some(values);
        self
    }

    /// Attaches the objects the result applies to.
    pub fn with_applied_to(mut self, applied_to: AppliedTo) -> Self {
        self.applied_to = Some(applied_to);
        self
    }
}

/// Objects of the auction an activity result refers to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppliedTo {
    /// Impression ids.
    #[serde(rename = "impids", skip_serializing_if = "Vec::is_empty")]
    pub imp_ids: Vec<String>,
    /// Bidder codes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bidders: Vec<String>,
    /// Bid ids.
    #[serde(rename = "bidids", skip_serializing_if = "Vec::is_empty")]
    pub bid_ids: Vec<String>,
    /// The whole request.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request: bool,
    /// The whole response.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub response: bool,
}

impl AppliedTo {
    /// Sets the impression ids.
    pub fn with_imp_ids(mut self, imp_ids: Vec<String>) -> Self {
        self.imp_ids = imp_ids;
        self
    }

    /// Sets the bidder codes.
    pub fn with_bidders(mut self, bidders: Vec<String>) -> Self {
        self.bidders = bidders;
        self
    }

    /// Sets the bid ids.
    pub fn with_bid_ids(mut self, bid_ids: Vec<String>) -> Self {
        self.bid_ids = bid_ids;
        self
    }
}
