//! Detector 2: Background-image (§4.D.2).
//!
//! Only inline `style` attributes are addressable without a CSS cascade
//! engine (see `dom.rs` module docs); `:before`/`:after` content declared
//! in a stylesheet rule has no DOM-visible surface to read here, so this
//! method covers the inline-style and inline pseudo-element-marker cases.

use super::{Detector, DetectorContext};
use crate::candidate::{Candidate, CandidateMetadata, DiscoveryMethod};
use crate::dom::{self, Document};
use crate::error::Result;
use crate::url_util::{classify_media_type, normalize_url};
use async_trait::async_trait;
use scraper::Selector;

pub struct BackgroundDetector;

#[async_trait(?Send)]
impl Detector for BackgroundDetector {
    fn name(&self) -> &'static str {
        "advanced-background"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::AdvancedBackground
    }

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>> {
        let selector = Selector::parse("[style]").unwrap();
        let mut out = Vec::new();

        for el in doc.select(&selector).take(ctx.node_cap) {
            let style = el.value().attr("style").unwrap_or_default();
            for raw in dom::background_image_urls(style) {
                let Some(url) = normalize_url(&raw, &doc.base, ctx.allow_data_urls) else {
                    continue;
                };

                let metadata = CandidateMetadata {
                    class_name: el.value().attr("class").map(str::to_string),
                    pseudo_element: None,
                    ..Default::default()
                };

                out.push(
                    Candidate::new(
                        url.clone(),
                        classify_media_type(&url),
                        DiscoveryMethod::AdvancedBackground,
                        0.5,
                        ctx.next_position(),
                    )
                    .with_element_path(dom::stable_css_path(&el))
                    .with_metadata(metadata),
                );
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_inline_background_image() {
        let doc = Document::parse(
            r#"<html><body><div style="background-image:url('/bg.png')"></div></body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = BackgroundDetector;
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://example.test/bg.png");
        assert_eq!(candidates[0].media_type, crate::url_util::MediaType::ImageKnown);
    }

    #[tokio::test]
    async fn ignores_elements_without_background_url() {
        let doc = Document::parse(
            r#"<html><body><div style="color:red"></div></body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = BackgroundDetector;
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert!(candidates.is_empty());
    }
}
