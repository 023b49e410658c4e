//! Detector 6: Performance API (§4.D.6).
//!
//! There is no live `performance.getEntriesByType("resource")` timeline in
//! a library operating over an already-fetched document, so the analog
//! here is direct: issue a timed HEAD request against every `<img>`-like
//! URL and record the observed transfer size/duration as metadata — the
//! same information a browser's resource-timing entry would have carried,
//! gathered the way a Rust HTTP client actually can.

use super::img::scan_imgs;
use super::{Detector, DetectorContext};
use crate::candidate::{Candidate, DiscoveryMethod};
use crate::dom::Document;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Instant;

pub struct PerformanceApiDetector;

#[async_trait(?Send)]
impl Detector for PerformanceApiDetector {
    fn name(&self) -> &'static str {
        "performance-api"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::PerformanceApi
    }

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>> {
        let mut candidates = scan_imgs(doc, doc.root_element(), ctx);
        for candidate in &mut candidates {
            candidate.method = DiscoveryMethod::PerformanceApi;
            if candidate.url.starts_with("data:") {
                continue;
            }
            if let Some((duration_ms, size)) = time_head(ctx, &candidate.url).await {
                candidate
                    .metadata
                    .extra
                    .insert("transfer_duration_ms".to_string(), duration_ms.to_string());
                if let Some(size) = size {
                    candidate
                        .metadata
                        .extra
                        .insert("transfer_size_bytes".to_string(), size.to_string());
                }
            }
        }
        Ok(candidates)
    }
}

async fn time_head(ctx: &DetectorContext, url: &str) -> Option<(u128, Option<u64>)> {
    let start = Instant::now();
    let response = ctx.http.head(url).send().await.ok()?;
    let duration = start.elapsed().as_millis();
    let size = response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    Some((duration, size))
}
