//! Detector 4: Lazy-loading (§4.D.4).

use super::{Detector, DetectorContext};
use crate::candidate::{Candidate, CandidateMetadata, DiscoveryMethod};
use crate::dom::{self, Document};
use crate::error::Result;
use crate::url_util::{classify_media_type, normalize_url, pick_from_srcset};
use async_trait::async_trait;
use scraper::Selector;

const LAZY_ATTRS: &[&str] = &[
    "data-src",
    "data-lazy",
    "data-original",
    "data-lazy-src",
    "data-echo",
    "data-bg",
    "data-background",
    "data-background-image",
];

pub struct LazyLoadingDetector;

#[async_trait(?Send)]
impl Detector for LazyLoadingDetector {
    fn name(&self) -> &'static str {
        "lazy-loading"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::LazyLoading
    }

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>> {
        let selector_str = LAZY_ATTRS
            .iter()
            .map(|a| format!("[{a}]"))
            .chain(std::iter::once("[data-srcset]".to_string()))
            .collect::<Vec<_>>()
            .join(",");
        let selector = Selector::parse(&selector_str).unwrap();

        let mut out = Vec::new();
        for el in doc.select(&selector).take(ctx.node_cap) {
            let raw = if let Some(srcset) = el.value().attr("data-srcset") {
                pick_from_srcset(srcset)
            } else {
                dom::first_attr(&el, LAZY_ATTRS).map(str::to_string)
            };

            let Some(raw) = raw else { continue };
            let Some(url) = normalize_url(&raw, &doc.base, ctx.allow_data_urls) else {
                continue;
            };

            let metadata = CandidateMetadata {
                class_name: el.value().attr("class").map(str::to_string),
                container_class: dom::ancestor_classes(&el),
                similar_siblings: dom::similar_sibling_count(&el) >= 3,
                gallery_attribute: dom::has_gallery_attribute(&el),
                ..Default::default()
            };

            out.push(
                Candidate::new(
                    url.clone(),
                    classify_media_type(&url),
                    DiscoveryMethod::LazyLoading,
                    0.5,
                    ctx.next_position(),
                )
                .with_element_path(dom::stable_css_path(&el))
                .with_metadata(metadata),
            );
        }

        Ok(out)
    }
}
