//! The eight detection methods (component D) plus the shared
//! [`Detector`] trait and [`DetectorContext`] the orchestrator hands to
//! each of them.
//!
//! The registry/dispatch shape here mirrors a priority-sorted handler
//! table: each detector is independent, failures are isolated by the
//! caller, and every detector is wrapped in the same time-budget/node-cap
//! contract (§4.D "Error/edge policy").

mod background;
mod hardcoded;
mod img;
mod lazy;
mod multidoc;
mod performance;
mod shadow;
mod svg;

pub use background::BackgroundDetector;
pub use hardcoded::HardcodedUrlDetector;
pub use img::StandardImgDetector;
pub use lazy::LazyLoadingDetector;
pub use multidoc::MultiDocumentDetector;
pub use performance::PerformanceApiDetector;
pub use shadow::ShadowDomDetector;
pub use svg::SvgDetector;

use crate::candidate::{Candidate, DiscoveryMethod};
use crate::dom::Document;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(5);
const DEFAULT_NODE_CAP: usize = 1000;
const LARGE_PAGE_THRESHOLD: usize = 15_000;

/// Everything a detector needs from its environment besides the parsed
/// document: the position counter it must draw from (shared and
/// monotonic across every detector in a scan), its time/node budget, and
/// an HTTP client for the two network-touching methods.
pub struct DetectorContext {
    positions: std::sync::Arc<AtomicU64>,
    pub time_budget: Duration,
    pub node_cap: usize,
    pub allow_data_urls: bool,
    pub http: reqwest::Client,
}

impl DetectorContext {
    pub fn new(document_element_count: usize) -> Self {
        let node_cap = if document_element_count > LARGE_PAGE_THRESHOLD {
            DEFAULT_NODE_CAP / 2
        } else {
            DEFAULT_NODE_CAP
        };

        Self {
            positions: std::sync::Arc::new(AtomicU64::new(0)),
            time_budget: DEFAULT_TIME_BUDGET,
            node_cap,
            allow_data_urls: true,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_shared_positions(mut self, positions: std::sync::Arc<AtomicU64>) -> Self {
        self.positions = positions;
        self
    }

    pub fn positions(&self) -> std::sync::Arc<AtomicU64> {
        self.positions.clone()
    }

    /// Draw the next monotonic discovery position.
    pub fn next_position(&self) -> u64 {
        self.positions.fetch_add(1, Ordering::SeqCst)
    }
}

/// A detection method: walks some DOM/network surface and emits
/// candidates tagged with its identifier and a confidence prior.
///
/// Implementations must internally honor `ctx.time_budget` and
/// `ctx.node_cap`; a detector that throws is caught by the orchestrator,
/// which isolates the fault and continues with the remaining methods.
#[async_trait(?Send)]
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;
    fn method(&self) -> DiscoveryMethod;

    async fn detect(&self, doc: &Document, ctx: &DetectorContext) -> Result<Vec<Candidate>>;
}

/// Simple per-detector dedup used by methods that scan free text (hard-coded
/// URL extraction) where URL collisions are common within a single pass.
#[derive(Default)]
pub struct ExtractionCache {
    seen: Mutex<std::collections::HashSet<String>>,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a URL is seen, false on repeats.
    pub fn insert(&self, url: &str) -> bool {
        self.seen.lock().unwrap().insert(url.to_string())
    }
}

pub fn all_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(StandardImgDetector),
        Box::new(BackgroundDetector),
        Box::new(ShadowDomDetector),
        Box::new(LazyLoadingDetector),
        Box::new(HardcodedUrlDetector::default()),
        Box::new(PerformanceApiDetector),
        Box::new(SvgDetector),
        Box::new(MultiDocumentDetector::default()),
    ]
}
