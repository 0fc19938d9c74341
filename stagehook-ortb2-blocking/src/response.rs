//! Decides which of a bidder's bids are blocked.

use crate::config::{
    AccountConfigReader, BidAttributeBlockingConfig, BlockedAttributes, ConfigResult,
    ResponseBlockingConfig,
};
use crate::openrtb::BidderBid;
use serde_json::{Map, Value, json};
use stagehook_core::{ActivityResult, AppliedTo};
use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

const SUCCESS_BLOCKED_STATUS: &str = "success-blocked";
const SUCCESS_ALLOW_STATUS: &str = "success-allow";

/// What [`BidsBlocker::block`] found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockingReport {
    /// Indexes of the blocked bids.
    pub blocked: BTreeSet<usize>,
    /// Configuration errors, only reported in debug mode.
    pub errors: Vec<String>,
    /// Warnings raised while reading the configuration.
    pub warnings: Vec<String>,
    /// Why each blocked bid was blocked, only reported in debug mode.
    pub debug_messages: Vec<String>,
    /// One analytics result per bid.
    pub analytics_results: Vec<ActivityResult>,
}

#[derive(Debug, Clone, PartialEq)]
enum AttributeCheck<T> {
    Passed,
    Failed(Vec<T>),
}

impl<T> AttributeCheck<T> {
    fn is_failed(&self) -> bool {
        matches!(self, AttributeCheck::Failed(_))
    }
}

struct BidCheck {
    imp_id: String,
    badv: AttributeCheck<String>,
    bcat: AttributeCheck<String>,
    bapp: AttributeCheck<String>,
    battr: AttributeCheck<i64>,
}

impl BidCheck {
    fn is_blocked(&self) -> bool {
        !self.failed_checks().is_empty()
    }

    fn failed_checks(&self) -> Vec<&'static str> {
        [
            ("badv", self.badv.is_failed()),
            ("bcat", self.bcat.is_failed()),
            ("bapp", self.bapp.is_failed()),
            ("battr", self.battr.is_failed()),
        ]
        .into_iter()
        .filter_map(|(name, failed)| failed.then_some(name))
        .collect()
    }

    fn analytics_values(&self) -> Value {
        let mut values = Map::new();
        values.insert("attributes".into(), json!(self.failed_checks()));
        if let AttributeCheck::Failed(domains) = &self.badv {
            values.insert("adomain".into(), json!(domains));
        }
        if let AttributeCheck::Failed(categories) = &self.bcat {
            values.insert("bcat".into(), json!(categories));
        }
        if let AttributeCheck::Failed(bundles) = &self.bapp {
            if let Some(bundle) = bundles.first() {
                values.insert("bundle".into(), json!(bundle));
            }
        }
        if let AttributeCheck::Failed(attributes) = &self.battr {
            values.insert("attr".into(), json!(attributes));
        }
        Value::Object(values)
    }
}

/// Checks a bidder's bids against the attributes blocked in its request.
pub struct BidsBlocker<'a> {
    bids: &'a [BidderBid],
    bidder: &'a str,
    account_config: Option<&'a Value>,
    blocked_attributes: Option<&'a BlockedAttributes>,
    debug_enabled: bool,
}

impl<'a> BidsBlocker<'a> {
    /// Creates a blocker for the bids of `bidder`.
    pub fn new(bids: &'a [BidderBid], bidder: &'a str) -> Self {
        Self {
            bids,
            bidder,
            account_config: None,
            blocked_attributes: None,
            debug_enabled: false,
        }
    }

    /// Sets the module's account configuration.
    pub fn with_account_config(mut self, config: Option<&'a Value>) -> Self {
        self.account_config = config;
        self
    }

    /// Sets the attributes that were blocked in the bidder's request.
    pub fn with_blocked_attributes(mut self, blocked: Option<&'a BlockedAttributes>) -> Self {
        self.blocked_attributes = blocked;
        self
    }

    /// Sets whether the request runs in debug mode.
    pub fn with_debug_enabled(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// Checks every bid.
    ///
    /// A malformed configuration blocks nothing.
    pub fn block(&self) -> BlockingReport {
        let reader = AccountConfigReader::new(self.account_config, self.bidder, self.debug_enabled);
        match self.check_all(&reader) {
            Ok(report) => report,
            Err(err) if self.debug_enabled => BlockingReport {
                errors: vec![err.to_string()],
                ..BlockingReport::default()
            },
            Err(_) => BlockingReport::default(),
        }
    }

    fn check_all(&self, reader: &AccountConfigReader<'_>) -> ConfigResult<BlockingReport> {
        let mut checks = Vec::with_capacity(self.bids.len());
        let mut warnings = Vec::new();
        for bid in self.bids {
            let config = reader.response_blocking_config_for(bid)?;
            warnings.extend(config.messages);
            checks.push(self.check(bid, &config.value));
        }

        let blocked: BTreeSet<usize> = checks
            .iter()
            .enumerate()
            .filter(|(_, check)| check.is_blocked())
            .map(|(index, _)| index)
            .collect();

        let debug_messages = if self.debug_enabled {
            blocked
                .iter()
                .map(|&index| {
                    format!(
                        "Bid {index} from bidder {} has been rejected, failed checks: [{}]",
                        self.bidder,
                        checks[index].failed_checks().join(", ")
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        let analytics_results = checks
            .iter()
            .map(|check| self.analytics_result(check))
            .collect();

        Ok(BlockingReport {
            blocked,
            errors: Vec::new(),
            warnings,
            debug_messages,
            analytics_results,
        })
    }

    fn check(&self, bidder_bid: &BidderBid, config: &ResponseBlockingConfig) -> BidCheck {
        let bid = &bidder_bid.bid;
        let blocked = self.blocked_attributes;

        BidCheck {
            imp_id: bid.impid.clone(),
            badv: check_values(
                bid.adomain.as_deref(),
                config.badv.as_ref(),
                blocked.and_then(|blocked| blocked.badv.as_deref()),
            ),
            bcat: check_values(
                bid.cat.as_deref(),
                config.bcat.as_ref(),
                blocked.and_then(|blocked| blocked.bcat.as_deref()),
            ),
            bapp: check_value(
                bid.bundle.as_deref(),
                config.bapp.as_ref(),
                blocked.and_then(|blocked| blocked.bapp.as_deref()),
            ),
            battr: check_values(
                bid.attr.as_deref(),
                config.battr.as_ref(),
                blocked
                    .and_then(|blocked| blocked.battr.as_ref())
                    .and_then(|battr| battr.get(bid.impid.as_str()))
                    .map(Vec::as_slice),
            ),
        }
    }

    fn analytics_result(&self, check: &BidCheck) -> ActivityResult {
        let applied_to = AppliedTo::default()
            .with_bidders(vec![self.bidder.to_string()])
            .with_imp_ids(vec![check.imp_id.clone()]);

        if check.is_blocked() {
            ActivityResult::new(SUCCESS_BLOCKED_STATUS)
                .with_values(check.analytics_values())
                .with_applied_to(applied_to)
        } else {
            ActivityResult::new(SUCCESS_ALLOW_STATUS).with_applied_to(applied_to)
        }
    }
}

fn check_values<T: Clone + Eq + Hash>(
    values: Option<&[T]>,
    config: Option<&BidAttributeBlockingConfig<T>>,
    blocked: Option<&[T]>,
) -> AttributeCheck<T> {
    let Some(config) = config.filter(|config| config.enforce_blocks) else {
        return AttributeCheck::Passed;
    };

    let values = values.unwrap_or_default();
    if values.is_empty() {
        return if config.block_unknown_values {
            AttributeCheck::Failed(Vec::new())
        } else {
            AttributeCheck::Passed
        };
    }

    let Some(blocked) = blocked.filter(|blocked| !blocked.is_empty()) else {
        return AttributeCheck::Passed;
    };
    let blocked: HashSet<&T> = blocked.iter().collect();
    let failed: Vec<T> = values
        .iter()
        .filter(|value| blocked.contains(value) && !config.allowed_values.contains(*value))
        .cloned()
        .collect();

    if failed.is_empty() {
        AttributeCheck::Passed
    } else {
        AttributeCheck::Failed(failed)
    }
}

fn check_value(
    value: Option<&str>,
    config: Option<&BidAttributeBlockingConfig<String>>,
    blocked: Option<&[String]>,
) -> AttributeCheck<String> {
    match (
        config.filter(|config| config.enforce_blocks),
        value.filter(|value| !value.is_empty()),
        blocked,
    ) {
        (Some(config), Some(value), Some(blocked))
            if blocked.iter().any(|candidate| candidate == value)
                && !config.allowed_values.contains(value) =>
        {
            AttributeCheck::Failed(vec![value.to_string()])
        }
        _ => AttributeCheck::Passed,
    }
}
