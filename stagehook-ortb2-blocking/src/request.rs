//! Writes blocked attributes into the request sent to a bidder.

use crate::config::BlockedAttributes;
use crate::openrtb::{BidRequest, Imp};

/// Replaces the blocking fields of a request with the resolved ones.
///
/// Fields without a resolved value are left as the request has them.
#[derive(Debug, Clone)]
pub struct RequestUpdater {
    blocked: BlockedAttributes,
}

impl RequestUpdater {
    /// Creates an updater writing `blocked`.
    pub fn new(blocked: BlockedAttributes) -> Self {
        Self { blocked }
    }

    /// The updated copy of `request`.
    pub fn update(&self, request: &BidRequest) -> BidRequest {
        let mut updated = request.clone();

        if let Some(badv) = &self.blocked.badv {
            updated.badv = Some(badv.clone());
        }
        if let Some(bcat) = &self.blocked.bcat {
            updated.bcat = Some(bcat.clone());
        }
        if let Some(bapp) = &self.blocked.bapp {
            updated.bapp = Some(bapp.clone());
        }
        for imp in &mut updated.imp {
            self.update_imp(imp);
        }

        updated
    }

    /// Only the banner carries `btype` and `battr`; other formats are left as sent.
    fn update_imp(&self, imp: &mut Imp) {
        let Imp { id, banner, .. } = imp;
        let Some(banner) = banner else {
            return;
        };

        if let Some(btype) = self.blocked.btype.as_ref().and_then(|btype| btype.get(id.as_str())) {
            banner.btype = Some(btype.clone());
        }
        if let Some(battr) = self.blocked.battr.as_ref().and_then(|battr| battr.get(id.as_str())) {
            banner.battr = Some(battr.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openrtb::{Audio, Banner, Video};
    use std::collections::HashMap;

    fn strings(values: &[&str]) -> Option<Vec<String>> {
        Some(values.iter().map(|value| value.to_string()).collect())
    }

    #[test]
    fn replaces_request_level_lists() {
        let updater = RequestUpdater::new(BlockedAttributes {
            badv: strings(&["domain1.com", "domain2.com"]),
            bapp: strings(&["app1"]),
            ..BlockedAttributes::default()
        });
        let request = BidRequest {
            badv: strings(&["old.com"]),
            bcat: strings(&["cat1"]),
            ..BidRequest::default()
        };

        let updated = updater.update(&request);
        assert_eq!(updated.badv, strings(&["domain1.com", "domain2.com"]));
        assert_eq!(updated.bcat, strings(&["cat1"]));
        assert_eq!(updated.bapp, strings(&["app1"]));
    }

    #[test]
    fn writes_banner_fields_of_matching_imps_only() {
        let updater = RequestUpdater::new(BlockedAttributes {
            btype: Some(HashMap::from([(String::from("imp1"), vec![1, 2])])),
            battr: Some(HashMap::from([
                (String::from("imp1"), vec![3]),
                (String::from("imp2"), vec![4]),
            ])),
            ..BlockedAttributes::default()
        });
        let request = BidRequest {
            imp: vec![
                Imp {
                    banner: Some(Banner::default()),
                    ..Imp::new("imp1")
                },
                Imp {
                    video: Some(Video::default()),
                    ..Imp::new("imp2")
                },
            ],
            ..BidRequest::default()
        };

        let updated = updater.update(&request);
        assert_eq!(
            updated.imp[0].banner,
            Some(Banner {
                btype: Some(vec![1, 2]),
                battr: Some(vec![3]),
            })
        );
        assert_eq!(updated.imp[1], request.imp[1]);
    }

    #[test]
    fn battr_applies_to_the_banner_of_a_multi_format_imp() {
        let updater = RequestUpdater::new(BlockedAttributes {
            battr: Some(HashMap::from([(String::from("imp1"), vec![1, 2])])),
            ..BlockedAttributes::default()
        });
        let imp = Imp {
            banner: Some(Banner::default()),
            video: Some(Video::default()),
            audio: Some(Audio::default()),
            ..Imp::new("imp1")
        };
        let request = BidRequest {
            imp: vec![imp.clone()],
            ..BidRequest::default()
        };

        let updated = updater.update(&request);
        assert_eq!(
            updated.imp[0],
            Imp {
                banner: Some(Banner {
                    btype: None,
                    battr: Some(vec![1, 2]),
                }),
                ..imp
            }
        );
    }
}
