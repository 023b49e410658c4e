//! Detector 3: Shadow DOM (§4.D.3).
//!
//! Descends into declarative shadow roots (`<template shadowrootmode>`,
//! the only shadow tree a static parse can see — imperative/closed roots
//! require a live browser) and re-runs the Standard IMG scan inside each.
//! A closed shadow root has no declarative-markup footprint at all, so it
//! is already "silently skipped" by construction.

use super::img::scan_imgs;
use super::{Detector, DetectorContext};
use crate::candidate::{Candidate, DiscoveryMethod};
use crate::dom::{self, Document};
use crate::error::Result;
use async_trait::async_trait;

pub struct ShadowDomDetector;

#[async_trait(?Send)]
impl Detector for ShadowDomDetector {
    fn name(&self) -> &'static str {
        "shadow-dom"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::ShadowDom
    }

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>> {
        let mut out = Vec::new();

        for host in dom::declarative_shadow_roots(doc) {
            let host_tag = Some(host.value().name().to_string());

            for mut candidate in scan_imgs(doc, host, ctx) {
                candidate.method = DiscoveryMethod::ShadowDom;
                candidate.metadata.shadow_host_tag = host_tag.clone();
                out.push(candidate);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn descends_into_declarative_shadow_root() {
        let doc = Document::parse(
            r#"<div id="host"><template shadowrootmode="open"><img src="/a.jpg" width="800" height="600"></template></div>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = ShadowDomDetector;
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].method, DiscoveryMethod::ShadowDom);
        assert_eq!(candidates[0].metadata.shadow_host_tag.as_deref(), Some("div"));
    }

    #[tokio::test]
    async fn page_without_shadow_roots_yields_nothing() {
        let doc = Document::parse(
            r#"<div><img src="/a.jpg"></div>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let detector = ShadowDomDetector;
        let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
        assert!(candidates.is_empty());
    }
}
