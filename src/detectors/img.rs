//! Detector 1: Standard IMG (§4.D.1).

use super::{Detector, DetectorContext};
use crate::candidate::{Candidate, CandidateMetadata, DiscoveryMethod};
use crate::dom::{self, Document};
use crate::error::Result;
use crate::pattern::passes_gallery_size_rule;
use crate::url_util::{classify_media_type, normalize_url, pick_from_srcset};
use async_trait::async_trait;
use scraper::Selector;

/// Attribute fallback chain, in preference order (`currentSrc` has no
/// static-HTML analogue, so the chain starts at `src`).
const SRC_ATTRS: &[&str] = &[
    "src",
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-full",
    "data-large",
];

pub struct StandardImgDetector;

#[async_trait(?Send)]
impl Detector for StandardImgDetector {
    fn name(&self) -> &'static str {
        "standard-img"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::StandardImg
    }

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>> {
        Ok(scan_imgs(doc, doc.root_element(), ctx))
    }
}

/// Shared with the shadow-DOM detector, which re-runs this scan rooted at
/// each shadow host.
pub fn scan_imgs(doc: &Document, root: scraper::ElementRef, ctx: &DetectorContext) -> Vec<Candidate> {
    let selector = Selector::parse("img").unwrap();
    let mut out = Vec::new();

    for el in root.select(&selector).take(ctx.node_cap) {
        let raw = if let Some(srcset) = el.value().attr("data-srcset").or_else(|| el.value().attr("srcset")) {
            pick_from_srcset(srcset).or_else(|| dom::first_attr(&el, SRC_ATTRS).map(str::to_string))
        } else {
            dom::first_attr(&el, SRC_ATTRS).map(str::to_string)
        };

        let Some(raw) = raw else { continue };
        let Some(url) = normalize_url(&raw, &doc.base, ctx.allow_data_urls) else {
            continue;
        };

        let width: Option<u32> = el.value().attr("width").and_then(|v| v.parse().ok());
        let height: Option<u32> = el.value().attr("height").and_then(|v| v.parse().ok());

        let gallery_context = dom::similar_sibling_count(&el) >= 3;
        if let (Some(w), Some(h)) = (width, height) {
            if !passes_gallery_size_rule(w, h, gallery_context) {
                continue;
            }
        }

        let metadata = CandidateMetadata {
            width,
            height,
            alt: el.value().attr("alt").map(str::to_string),
            class_name: el.value().attr("class").map(str::to_string),
            container_class: dom::ancestor_classes(&el),
            similar_siblings: gallery_context,
            gallery_attribute: dom::has_gallery_attribute(&el),
            ..Default::default()
        };

        let candidate = Candidate::new(
            url.clone(),
            classify_media_type(&url),
            DiscoveryMethod::StandardImg,
            0.5,
            ctx.next_position(),
        )
        .with_element_path(dom::stable_css_path(&el))
        .with_metadata(metadata);

        out.push(candidate);
    }

    out
}
