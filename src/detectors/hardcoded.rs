//! Detector 5: Hard-coded URL extraction (§4.D.5).
//!
//! Regex scan of the outer HTML and inline `<script>` text for absolute
//! image URLs and base64 data URLs, deduplicated against a per-scan
//! extraction cache (collisions are common when the same URL appears in
//! both markup and an inline script).

use super::{Detector, DetectorContext, ExtractionCache};
use crate::candidate::{Candidate, DiscoveryMethod};
use crate::dom::Document;
use crate::error::Result;
use crate::url_util::classify_media_type;
use async_trait::async_trait;
use regex::Regex;
use scraper::Selector;
use std::sync::OnceLock;

fn absolute_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s"'<>]+?\.(?:jpg|jpeg|png|gif|webp|bmp|svg)(?:\?[^\s"'<>]*)?"#)
            .unwrap()
    })
}

fn data_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"data:image/[a-zA-Z0-9.+-]+;base64,[A-Za-z0-9+/=]+"#).unwrap())
}

#[derive(Default)]
pub struct HardcodedUrlDetector {
    cache: ExtractionCache,
}

#[async_trait(?Send)]
impl Detector for HardcodedUrlDetector {
    fn name(&self) -> &'static str {
        "hardcoded-url"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::HardcodedUrl
    }

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>> {
        let mut out = Vec::new();
        let outer_html = doc.root_element().html();
        self.scan_text(&outer_html, ctx, &mut out);

        let script_selector = Selector::parse("script").unwrap();
        for script in doc.select(&script_selector) {
            let text = script.text().collect::<String>();
            self.scan_text(&text, ctx, &mut out);
        }

        Ok(out)
    }
}

impl HardcodedUrlDetector {
    fn scan_text(&self, text: &str, ctx: &DetectorContext, out: &mut Vec<Candidate>) {
        for m in absolute_url_pattern().find_iter(text) {
            let url = m.as_str().to_string();
            if self.cache.insert(&url) {
                out.push(Candidate::new(
                    url.clone(),
                    classify_media_type(&url),
                    DiscoveryMethod::HardcodedUrl,
                    0.5,
                    ctx.next_position(),
                ));
            }
        }

        if ctx.allow_data_urls {
            for m in data_url_pattern().find_iter(text) {
                let url = m.as_str().to_string();
                if self.cache.insert(&url) {
                    out.push(Candidate::new(
                        url.clone(),
                        classify_media_type(&url),
                        DiscoveryMethod::HardcodedUrl,
                        0.5,
                        ctx.next_position(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_absolute_urls_in_script_text() {
        let doc = Document::parse(
            r#"<html><body><script>var x = "https://cdn.test/photo.jpg";</script></body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = HardcodedUrlDetector::default();
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://cdn.test/photo.jpg");
    }

    #[tokio::test]
    async fn dedupes_repeated_urls_within_scan() {
        let doc = Document::parse(
            r#"<html><body>
                <a href="https://cdn.test/a.jpg">https://cdn.test/a.jpg</a>
                <script>var x = "https://cdn.test/a.jpg";</script>
            </body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = HardcodedUrlDetector::default();
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn finds_base64_data_urls() {
        let doc = Document::parse(
            r#"<html><body><script>var x = "data:image/png;base64,AAAA";</script></body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = HardcodedUrlDetector::default();
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].url.starts_with("data:image/png"));
    }
}
