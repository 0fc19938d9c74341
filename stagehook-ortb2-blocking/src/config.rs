//! Account configuration of the blocking module.
//!
//! The configuration is kept as raw JSON and read on demand for the bidder
//! being served, so that overrides can be matched against the bidder and the
//! media types at hand. Any malformed field aborts the whole read with an
//! [`InvalidAccountConfiguration`].

use crate::openrtb::{BidRequest, BidderBid, MediaTypes};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use thiserror::Error;

const ATTRIBUTES: &str = "attributes";
const BADV: &str = "badv";
const BCAT: &str = "bcat";
const BAPP: &str = "bapp";
const BTYPE: &str = "btype";
const BATTR: &str = "battr";
const ENFORCE_BLOCKS: &str = "enforce-blocks";
const BLOCK_UNKNOWN_ADOMAIN: &str = "block-unknown-adomain";
const BLOCKED_ADOMAIN: &str = "blocked-adomain";
const ALLOWED_ADOMAIN_FOR_DEALS: &str = "allowed-adomain-for-deals";
const BLOCKED_ADV_CAT: &str = "blocked-adv-cat";
const BLOCK_UNKNOWN_ADV_CAT: &str = "block-unknown-adv-cat";
const ALLOWED_ADV_CAT_FOR_DEALS: &str = "allowed-adv-cat-for-deals";
const BLOCKED_APP: &str = "blocked-app";
const ALLOWED_APP_FOR_DEALS: &str = "allowed-app-for-deals";
const BLOCKED_BANNER_TYPE: &str = "blocked-banner-type";
const BLOCKED_BANNER_ATTR: &str = "blocked-banner-attr";
const ALLOWED_BANNER_ATTR_FOR_DEALS: &str = "allowed-banner-attr-for-deals";
const ACTION_OVERRIDES: &str = "action-overrides";
const OVERRIDE: &str = "override";
const CONDITIONS: &str = "conditions";
const BIDDERS: &str = "bidders";
const MEDIA_TYPE: &str = "media-type";
const DEAL_IDS: &str = "deal-ids";

/// The account configuration could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidAccountConfiguration(String);

impl InvalidAccountConfiguration {
    fn field(field: &str, problem: &str) -> Self {
        Self(format!("{field} field in account configuration {problem}"))
    }
}

/// Result of reading the account configuration.
pub type ConfigResult<T> = Result<T, InvalidAccountConfiguration>;

/// A value read from the configuration, with the warnings produced on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// The value.
    pub value: T,
    /// Warnings, only produced in debug mode.
    pub messages: Vec<String>,
}

impl<T> Resolved<T> {
    fn new(value: T, messages: Vec<String>) -> Self {
        Self { value, messages }
    }

    fn plain(value: T) -> Self {
        Self::new(value, Vec::new())
    }
}

impl<T> Resolved<Option<T>> {
    fn empty() -> Self {
        Self::plain(None)
    }
}

/// Attributes to block in the request sent to one bidder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockedAttributes {
    /// Blocked advertiser domains.
    pub badv: Option<Vec<String>>,
    /// Blocked advertiser categories.
    pub bcat: Option<Vec<String>>,
    /// Blocked app bundles.
    pub bapp: Option<Vec<String>>,
    /// Blocked banner types per impression id.
    pub btype: Option<HashMap<String, Vec<i64>>>,
    /// Blocked banner attributes per impression id.
    pub battr: Option<HashMap<String, Vec<i64>>>,
}

/// How one attribute of a returned bid is checked.
#[derive(Debug, Clone, PartialEq)]
pub struct BidAttributeBlockingConfig<T: Eq + Hash> {
    /// Whether bids carrying blocked values are dropped.
    pub enforce_blocks: bool,
    /// Whether bids not declaring the attribute at all are dropped.
    pub block_unknown_values: bool,
    /// Values exempted for the bid's deal.
    pub allowed_values: HashSet<T>,
}

/// Blocking configuration for one returned bid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseBlockingConfig {
    /// Advertiser domains.
    pub badv: Option<BidAttributeBlockingConfig<String>>,
    /// Advertiser categories.
    pub bcat: Option<BidAttributeBlockingConfig<String>>,
    /// App bundle.
    pub bapp: Option<BidAttributeBlockingConfig<String>>,
    /// Creative attributes.
    pub battr: Option<BidAttributeBlockingConfig<i64>>,
}

trait ConfigValue: Sized {
    const EXPECTED: &'static str;

    fn from_json(value: &Value) -> Option<Self>;
}

impl ConfigValue for String {
    const EXPECTED: &'static str = "string";

    fn from_json(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl ConfigValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_json(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl ConfigValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

/// Reads the configuration on behalf of one bidder.
pub struct AccountConfigReader<'a> {
    config: Option<&'a Value>,
    bidder: &'a str,
    debug_enabled: bool,
}

impl<'a> AccountConfigReader<'a> {
    /// Creates a reader for `bidder` over the module's account configuration.
    pub fn new(config: Option<&'a Value>, bidder: &'a str, debug_enabled: bool) -> Self {
        Self {
            config,
            bidder,
            debug_enabled,
        }
    }

    /// Attributes to block in `request`, or `None` when nothing is configured.
    pub fn blocked_attributes_for(
        &self,
        request: &BidRequest,
    ) -> ConfigResult<Resolved<Option<BlockedAttributes>>> {
        let Some(attributes) = self.attributes()? else {
            return Ok(Resolved::empty());
        };

        let media_types = MediaTypes::of_request(request);
        let badv = self.blocked_attribute::<String>(attributes, BADV, BLOCKED_ADOMAIN, media_types)?;
        let bcat = self.blocked_attribute::<String>(attributes, BCAT, BLOCKED_ADV_CAT, media_types)?;
        let bapp = self.blocked_attribute::<String>(attributes, BAPP, BLOCKED_APP, media_types)?;
        let btype = self.blocked_attribute_for_imps(attributes, BTYPE, BLOCKED_BANNER_TYPE, request)?;
        let battr = self.blocked_attribute_for_imps(attributes, BATTR, BLOCKED_BANNER_ATTR, request)?;

        let messages = [
            badv.messages.as_slice(),
            bcat.messages.as_slice(),
            bapp.messages.as_slice(),
            btype.messages.as_slice(),
            battr.messages.as_slice(),
        ]
        .concat();

        let any = badv.value.is_some()
            || bcat.value.is_some()
            || bapp.value.is_some()
            || btype.value.is_some()
            || battr.value.is_some();
        let value = any.then(|| BlockedAttributes {
            badv: badv.value,
            bcat: bcat.value,
            bapp: bapp.value,
            btype: btype.value,
            battr: battr.value,
        });

        Ok(Resolved::new(value, messages))
    }

    /// How each attribute of `bid` is to be checked.
    pub fn response_blocking_config_for(
        &self,
        bid: &BidderBid,
    ) -> ConfigResult<Resolved<ResponseBlockingConfig>> {
        let Some(attributes) = self.attributes()? else {
            return Ok(Resolved::plain(ResponseBlockingConfig::default()));
        };

        let media_types = bid.bid_type.media_type();
        let dealid = bid
            .bid
            .dealid
            .as_deref()
            .filter(|dealid| !dealid.trim().is_empty());

        let badv = self.blocking_config_for::<String>(
            attributes,
            BADV,
            Some(BLOCK_UNKNOWN_ADOMAIN),
            ALLOWED_ADOMAIN_FOR_DEALS,
            media_types,
            dealid,
        )?;
        let bcat = self.blocking_config_for::<String>(
            attributes,
            BCAT,
            Some(BLOCK_UNKNOWN_ADV_CAT),
            ALLOWED_ADV_CAT_FOR_DEALS,
            media_types,
            dealid,
        )?;
        let bapp = self.blocking_config_for::<String>(
            attributes,
            BAPP,
            None,
            ALLOWED_APP_FOR_DEALS,
            media_types,
            dealid,
        )?;
        let battr = self.blocking_config_for::<i64>(
            attributes,
            BATTR,
            None,
            ALLOWED_BANNER_ATTR_FOR_DEALS,
            media_types,
            dealid,
        )?;

        let messages = [
            badv.messages.as_slice(),
            bcat.messages.as_slice(),
            bapp.messages.as_slice(),
            battr.messages.as_slice(),
        ]
        .concat();

        Ok(Resolved::new(
            ResponseBlockingConfig {
                badv: badv.value,
                bcat: bcat.value,
                bapp: bapp.value,
                battr: battr.value,
            },
            messages,
        ))
    }

    fn attributes(&self) -> ConfigResult<Option<&'a Value>> {
        match self.config {
            Some(config) => object_field(config, ATTRIBUTES),
            None => Ok(None),
        }
    }

    fn blocked_attribute<T: ConfigValue>(
        &self,
        attributes: &Value,
        attribute: &str,
        field: &str,
        media_types: MediaTypes,
    ) -> ConfigResult<Resolved<Option<Vec<T>>>> {
        let Some(config) = object_field(attributes, attribute)? else {
            return Ok(Resolved::empty());
        };

        let overridden = self.override_for(config, media_types, field)?;
        let configured = typed_array_field::<T>(config, field)?;
        let value = match overridden.value {
            Some(value) => Some(as_typed_array::<T>(value, OVERRIDE)?),
            None => configured,
        };

        Ok(Resolved::new(value, overridden.messages))
    }

    fn blocked_attribute_for_imps(
        &self,
        attributes: &Value,
        attribute: &str,
        field: &str,
        request: &BidRequest,
    ) -> ConfigResult<Resolved<Option<HashMap<String, Vec<i64>>>>> {
        let mut values = HashMap::new();
        let mut messages = Vec::new();

        for imp in &request.imp {
            let resolved =
                self.blocked_attribute::<i64>(attributes, attribute, field, imp.media_types())?;
            if let Some(value) = resolved.value {
                values.insert(imp.id.clone(), value);
            }
            messages.extend(resolved.messages);
        }

        Ok(Resolved::new(
            (!values.is_empty()).then_some(values),
            messages,
        ))
    }

    fn blocking_config_for<T: ConfigValue + Eq + Hash>(
        &self,
        attributes: &Value,
        attribute: &str,
        block_unknown_field: Option<&str>,
        allowed_for_deals_field: &str,
        media_types: MediaTypes,
        dealid: Option<&str>,
    ) -> ConfigResult<Resolved<Option<BidAttributeBlockingConfig<T>>>> {
        let Some(config) = object_field(attributes, attribute)? else {
            return Ok(Resolved::empty());
        };

        let enforce = self.override_for(config, media_types, ENFORCE_BLOCKS)?;
        let enforce_blocks = merge_boolean(config, enforce.value, ENFORCE_BLOCKS)?;
        let mut messages = enforce.messages;

        // Only badv and bcat can block bids with unknown values.
        let block_unknown_values = match block_unknown_field {
            Some(field) => {
                let unknown = self.override_for(config, media_types, field)?;
                messages.extend(unknown.messages);
                merge_boolean(config, unknown.value, field)?
            }
            None => false,
        };

        let allowed_values = match dealid {
            Some(dealid) => deal_exceptions::<T>(config, dealid, allowed_for_deals_field)?,
            None => HashSet::new(),
        };

        Ok(Resolved::new(
            Some(BidAttributeBlockingConfig {
                enforce_blocks,
                block_unknown_values,
                allowed_values,
            }),
            messages,
        ))
    }

    /// The first override of `field` matching this bidder and `media_types`.
    ///
    /// Overrides naming the bidder win over those that apply to every bidder.
    fn override_for<'v>(
        &self,
        config: &'v Value,
        media_types: MediaTypes,
        field: &str,
    ) -> ConfigResult<Resolved<Option<&'v Value>>> {
        let Some(overrides) = overrides_of(config, field)? else {
            return Ok(Resolved::empty());
        };

        let mut specific = Vec::new();
        let mut catch_all = Vec::new();
        for entry in overrides {
            let conditions = require(object_field(entry, CONDITIONS)?, CONDITIONS)?;
            let bidders = typed_array_field::<String>(conditions, BIDDERS)?;
            let condition_types = typed_array_field::<String>(conditions, MEDIA_TYPE)?;

            if bidders.is_none() && condition_types.is_none() {
                return Err(InvalidAccountConfiguration(format!(
                    "{CONDITIONS} field in account configuration must contain at least one of {BIDDERS} or {MEDIA_TYPE}"
                )));
            }

            let matches_bidder = bidders
                .as_ref()
                .is_none_or(|bidders| bidders.iter().any(|bidder| bidder == self.bidder));
            let matches_media_types = condition_types.as_ref().is_none_or(|names| {
                names.iter().any(|name| {
                    MediaTypes::from_name(name).is_some_and(|kind| media_types.intersects(kind))
                })
            });

            if matches_bidder && matches_media_types {
                let action = require(entry.get(OVERRIDE), OVERRIDE)?;
                if bidders.is_some() {
                    specific.push(action);
                } else {
                    catch_all.push(action);
                }
            }
        }

        let value = specific.first().or(catch_all.first()).copied();
        let messages = if self.debug_enabled && specific.len() + catch_all.len() > 1 {
            vec![format!(
                "More than one conditions matches request. Bidder: {}, request media types: {}",
                self.bidder, media_types
            )]
        } else {
            Vec::new()
        };

        Ok(Resolved::new(value, messages))
    }
}

fn overrides_of<'v>(config: &'v Value, field: &str) -> ConfigResult<Option<&'v Vec<Value>>> {
    match object_field(config, ACTION_OVERRIDES)? {
        Some(action_overrides) => object_array_field(action_overrides, field),
        None => Ok(None),
    }
}

fn deal_exceptions<T: ConfigValue + Eq + Hash>(
    config: &Value,
    dealid: &str,
    field: &str,
) -> ConfigResult<HashSet<T>> {
    let mut matched = Vec::new();
    for entry in overrides_of(config, field)?.into_iter().flatten() {
        let conditions = require(object_field(entry, CONDITIONS)?, CONDITIONS)?;
        let deal_ids = typed_array_field::<String>(conditions, DEAL_IDS)?.ok_or_else(|| {
            InvalidAccountConfiguration(format!(
                "{CONDITIONS} field in account configuration must contain {DEAL_IDS}"
            ))
        })?;

        if deal_ids.iter().any(|id| id == dealid) {
            matched.push(require(entry.get(OVERRIDE), OVERRIDE)?);
        }
    }

    let mut allowed: HashSet<T> = typed_array_field::<T>(config, field)?
        .unwrap_or_default()
        .into_iter()
        .collect();
    for entry in matched {
        allowed.extend(as_typed_array::<T>(entry, field)?);
    }
    Ok(allowed)
}

fn merge_boolean(parent: &Value, overridden: Option<&Value>, field: &str) -> ConfigResult<bool> {
    let overridden = overridden
        .map(|value| typed_as::<bool>(value, OVERRIDE))
        .transpose()?;
    let configured = typed_field::<bool>(parent, field)?;
    Ok(overridden.or(configured).unwrap_or(false))
}

fn object_field<'v>(parent: &'v Value, field: &str) -> ConfigResult<Option<&'v Value>> {
    match parent.get(field) {
        None => Ok(None),
        Some(child) if child.is_object() => Ok(Some(child)),
        Some(_) => Err(InvalidAccountConfiguration::field(field, "is not an object")),
    }
}

fn object_array_field<'v>(parent: &'v Value, field: &str) -> ConfigResult<Option<&'v Vec<Value>>> {
    let Some(child) = parent.get(field) else {
        return Ok(None);
    };
    match child.as_array() {
        Some(items) if items.iter().all(Value::is_object) => Ok(Some(items)),
        _ => Err(InvalidAccountConfiguration::field(
            field,
            "is not an array of objects",
        )),
    }
}

fn typed_array_field<T: ConfigValue>(parent: &Value, field: &str) -> ConfigResult<Option<Vec<T>>> {
    parent
        .get(field)
        .map(|child| as_typed_array(child, field))
        .transpose()
}

fn as_typed_array<T: ConfigValue>(node: &Value, field: &str) -> ConfigResult<Vec<T>> {
    let items = node
        .as_array()
        .ok_or_else(|| InvalidAccountConfiguration::field(field, "is not an array"))?;
    items.iter().map(|item| typed_as(item, field)).collect()
}

fn typed_field<T: ConfigValue>(parent: &Value, field: &str) -> ConfigResult<Option<T>> {
    parent
        .get(field)
        .map(|child| typed_as(child, field))
        .transpose()
}

fn typed_as<T: ConfigValue>(node: &Value, field: &str) -> ConfigResult<T> {
    T::from_json(node).ok_or_else(|| {
        InvalidAccountConfiguration::field(
            field,
            &format!("has unexpected type. Expected {}", T::EXPECTED),
        )
    })
}

fn require<'v>(node: Option<&'v Value>, field: &str) -> ConfigResult<&'v Value> {
    node.ok_or_else(|| InvalidAccountConfiguration::field(field, "is missing"))
}
