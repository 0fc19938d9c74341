//! The slice of the OpenRTB 2 model the blocking module reads and writes.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bid request as sent to one bidder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidRequest {
    /// Request id.
    #[serde(default)]
    pub id: String,
    /// Impressions offered.
    #[serde(default)]
    pub imp: Vec<Imp>,
    /// Blocked advertiser domains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badv: Option<Vec<String>>,
    /// Blocked advertiser categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcat: Option<Vec<String>>,
    /// Blocked app bundles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bapp: Option<Vec<String>>,
}

/// One impression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Imp {
    /// Impression id.
    pub id: String,
    /// Banner object, if the impression may be a banner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    /// Video object, if the impression may be a video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    /// Audio object, if the impression may be audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    /// Native object, if the impression may be native.
    #[serde(default, rename = "native", skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
}

impl Imp {
    /// Creates an impression with no media objects.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Media types the impression may be filled with.
    pub fn media_types(&self) -> MediaTypes {
        let mut types = MediaTypes::empty();
        types.set(MediaTypes::AUDIO, self.audio.is_some());
        types.set(MediaTypes::BANNER, self.banner.is_some());
        types.set(MediaTypes::NATIVE, self.native.is_some());
        types.set(MediaTypes::VIDEO, self.video.is_some());
        types
    }
}

/// Banner impression details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    /// Blocked banner types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btype: Option<Vec<i64>>,
    /// Blocked creative attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battr: Option<Vec<i64>>,
}

/// Video impression details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    /// Accepted content MIME types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
}

/// Audio impression details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audio {
    /// Accepted content MIME types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
}

/// Native impression details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Native {
    /// The native markup request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
}

/// A bid returned by a bidder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// Bid id.
    pub id: String,
    /// Id of the impression the bid is for.
    pub impid: String,
    /// Advertiser domains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adomain: Option<Vec<String>>,
    /// Advertiser categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,
    /// App bundle of the advertised app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    /// Creative attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<Vec<i64>>,
    /// Deal the bid belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dealid: Option<String>,
}

impl Bid {
    /// Creates a bid for an impression.
    pub fn new(id: impl Into<String>, impid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            impid: impid.into(),
            ..Self::default()
        }
    }
}

/// Media type of a returned bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidType {
    /// Banner.
    Banner,
    /// Video.
    Video,
    /// Audio.
    Audio,
    /// Native.
    Native,
}

impl BidType {
    /// The media type flag of this bid type.
    pub fn media_type(self) -> MediaTypes {
        match self {
            BidType::Banner => MediaTypes::BANNER,
            BidType::Video => MediaTypes::VIDEO,
            BidType::Audio => MediaTypes::AUDIO,
            BidType::Native => MediaTypes::NATIVE,
        }
    }
}

/// A bid together with the bidder's view of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidderBid {
    /// The bid.
    pub bid: Bid,
    /// Its media type.
    #[serde(rename = "type")]
    pub bid_type: BidType,
    /// Bid currency.
    pub currency: String,
}

impl BidderBid {
    /// Creates a bid priced in `currency`.
    pub fn new(bid: Bid, bid_type: BidType, currency: impl Into<String>) -> Self {
        Self {
            bid,
            bid_type,
            currency: currency.into(),
        }
    }
}

bitflags! {
    /// A set of media types.
    #[derive(Copy, Debug, Default, Clone, Eq, PartialEq, Hash)]
    pub struct MediaTypes: u8 {
        /// Audio.
        const AUDIO  = 1 << 0;
        /// Banner.
        const BANNER = 1 << 1;
        /// Native.
        const NATIVE = 1 << 2;
        /// Video.
        const VIDEO  = 1 << 3;
    }
}

/// Configuration names of the media types, sorted by name.
const MEDIA_TYPE_NAMES: &[(MediaTypes, &str)] = &[
    (MediaTypes::AUDIO, "audio"),
    (MediaTypes::BANNER, "banner"),
    (MediaTypes::NATIVE, "native"),
    (MediaTypes::VIDEO, "video"),
];

impl MediaTypes {
    /// Parses a configuration name such as `"banner"`.
    pub fn from_name(name: &str) -> Option<Self> {
        MEDIA_TYPE_NAMES
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(flag, _)| *flag)
    }

    /// Names of the contained media types, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        MEDIA_TYPE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Media types of every impression of the request.
    pub fn of_request(request: &BidRequest) -> Self {
        request
            .imp
            .iter()
            .fold(Self::empty(), |types, imp| types | imp.media_types())
    }
}

impl fmt::Display for MediaTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_media_types_are_the_union_of_its_imps() {
        let request = BidRequest {
            imp: vec![
                Imp {
                    video: Some(Video::default()),
                    ..Imp::new("1")
                },
                Imp {
                    banner: Some(Banner::default()),
                    ..Imp::new("2")
                },
            ],
            ..BidRequest::default()
        };

        let types = MediaTypes::of_request(&request);
        assert_eq!(types, MediaTypes::BANNER | MediaTypes::VIDEO);
        assert_eq!(types.to_string(), "[banner, video]");
    }

    #[test]
    fn parses_configuration_names() {
        assert_eq!(MediaTypes::from_name("native"), Some(MediaTypes::NATIVE));
        assert_eq!(MediaTypes::from_name("Native"), None);
        assert_eq!(BidType::Audio.media_type(), MediaTypes::AUDIO);
    }

    #[test]
    fn bidder_bid_uses_openrtb_field_names() {
        let bid: BidderBid = serde_json::from_value(serde_json::json!({
            "bid": {"id": "b1", "impid": "i1", "adomain": ["a.com"]},
            "type": "video",
            "currency": "USD",
        }))
        .unwrap();

        assert_eq!(bid.bid_type, BidType::Video);
        assert_eq!(bid.bid.adomain, Some(vec![String::from("a.com")]));
    }
}
