//! Detector 7: SVG (§4.D.7).
//!
//! Serializes every `<svg>` to a `data:image/svg+xml` URL so it fits the
//! same candidate shape as every other method, attaching viewBox/width/
//! height as metadata.

use super::{Detector, DetectorContext};
use crate::candidate::{Candidate, CandidateMetadata, DiscoveryMethod};
use crate::dom::{self, Document};
use crate::error::Result;
use crate::url_util::MediaType;
use async_trait::async_trait;
use scraper::Selector;

pub struct SvgDetector;

#[async_trait(?Send)]
impl Detector for SvgDetector {
    fn name(&self) -> &'static str {
        "svg-processing"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::SvgProcessing
    }

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>> {
        let selector = Selector::parse("svg").unwrap();
        let mut out = Vec::new();

        for el in doc.select(&selector).take(ctx.node_cap) {
            let markup = el.html();
            let encoded = urlencoding_encode(&markup);
            let data_url = format!("data:image/svg+xml,{encoded}");

            let width = el.value().attr("width").and_then(|v| v.parse().ok());
            let height = el.value().attr("height").and_then(|v| v.parse().ok());

            let mut metadata = CandidateMetadata {
                width,
                height,
                ..Default::default()
            };
            if let Some(view_box) = el.value().attr("viewBox") {
                metadata.extra.insert("viewBox".to_string(), view_box.to_string());
            }

            out.push(
                Candidate::new(
                    data_url,
                    MediaType::Svg,
                    DiscoveryMethod::SvgProcessing,
                    0.6,
                    ctx.next_position(),
                )
                .with_element_path(dom::stable_css_path(&el))
                .with_metadata(metadata),
            );
        }

        Ok(out)
    }
}

/// Minimal percent-encoding sufficient for embedding SVG markup in a data
/// URL (avoids pulling in a general-purpose URL-encoding dependency for
/// one call site).
fn urlencoding_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serializes_svg_to_data_url() {
        let doc = Document::parse(
            r#"<html><body><svg viewBox="0 0 10 10"></svg></body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = SvgDetector;
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].media_type, MediaType::Svg);
        assert!(candidates[0].url.starts_with("data:image/svg+xml,"));
        assert_eq!(candidates[0].metadata.extra.get("viewBox").unwrap(), "0 0 10 10");
    }
}
