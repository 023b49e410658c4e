//! Detector 8: Multi-document (§4.D.8).
//!
//! Enumerates same-origin anchors whose URL or text looks like a gallery
//! link, fetches each document (bounded by a document cap and rate
//! limited separately from the rest of the orchestrator), and re-runs the
//! Standard IMG scan against the fetched document with an injected base.

use super::img::scan_imgs;
use super::{Detector, DetectorContext};
use crate::candidate::{Candidate, DiscoveryMethod};
use crate::dom::Document;
use crate::error::Result;
use crate::url_util::is_same_origin;
use async_trait::async_trait;
use regex::Regex;
use scraper::Selector;
use std::sync::OnceLock;
use tokio::sync::Semaphore;

const DEFAULT_DOCUMENT_CAP: usize = 5;
/// Separate rate limit from the orchestrator's detector-dispatch gate:
/// at most two document fetches in flight at a time.
const MAX_CONCURRENT_FETCHES: usize = 2;

fn gallery_indicator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)gallery|photo|album|portfolio").unwrap())
}

pub struct MultiDocumentDetector {
    pub document_cap: usize,
}

impl Default for MultiDocumentDetector {
    fn default() -> Self {
        Self {
            document_cap: DEFAULT_DOCUMENT_CAP,
        }
    }
}

#[async_trait(?Send)]
impl Detector for MultiDocumentDetector {
    fn name(&self) -> &'static str {
        "multi-document"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::MultiDocument
    }

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>> {
        let selector = Selector::parse("a[href]").unwrap();
        let mut links = Vec::new();
        for el in doc.select(&selector) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let text = el.text().collect::<String>();
            if !gallery_indicator().is_match(href) && !gallery_indicator().is_match(&text) {
                continue;
            }
            let Ok(resolved) = doc.base.join(href) else {
                continue;
            };
            if !is_same_origin(resolved.as_str(), &doc.base) {
                continue;
            }
            links.push(resolved);
            if links.len() >= self.document_cap {
                break;
            }
        }

        let semaphore = Semaphore::new(MAX_CONCURRENT_FETCHES);
        let mut out = Vec::new();
        let mut fetches = Vec::new();
        for link in links {
            let permit = semaphore.acquire().await.expect("semaphore not closed");
            let result = fetch_and_scan(ctx, link.clone()).await;
            drop(permit);
            fetches.push((link, result));
        }

        for (link, result) in fetches {
            match result {
                Ok(mut candidates) => {
                    for candidate in &mut candidates {
                        candidate.method = DiscoveryMethod::MultiDocument;
                        candidate.metadata.source_document_url = Some(link.to_string());
                    }
                    out.extend(candidates);
                }
                Err(_) => continue,
            }
        }

        Ok(out)
    }
}

async fn fetch_and_scan(ctx: &DetectorContext, url: url::Url) -> Result<Vec<Candidate>> {
    let body = ctx
        .http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| crate::error::Error::Network(e.to_string()))?
        .text()
        .await
        .map_err(|e| crate::error::Error::Network(e.to_string()))?;

    let sub_doc = Document::parse(&body, url);
    Ok(scan_imgs(&sub_doc, sub_doc.root_element(), ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_cross_origin_gallery_links() {
        let doc = Document::parse(
            r#"<html><body><a href="https://other.test/gallery">Gallery</a></body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = MultiDocumentDetector::default();
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn ignores_links_without_gallery_indicator() {
        let doc = Document::parse(
            r#"<html><body><a href="/contact">Contact</a></body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = MultiDocumentDetector::default();
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert!(candidates.is_empty());
    }
}
