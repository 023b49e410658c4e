//! # pagescout
//!
//! A universal in-page media/structured-data extraction engine, built to
//! run as an injected script inside arbitrary third-party pages and
//! operated through a small set of typed request/response messages.
//!
//! ## Core components
//!
//! - **[`url_util`]** / **[`cache`]** — shared leaves: URL normalization
//!   and MIME classification, bounded LRU/FIFO caches, and the resource
//!   tracker every long-running subsystem registers with.
//! - **[`pattern`]** — the smart-pattern recognizer: scores and tiers a
//!   candidate URL from its shape, domain reputation, and DOM context.
//! - **[`candidate`]** — the `Candidate`/`FeedTier` data model every
//!   detector and the pipeline share.
//! - **[`detectors`]** — the eight detection methods, each independent
//!   and fault-isolated.
//! - **[`pipeline`]** — ingestion, dedup, categorization, and two-phase
//!   validation.
//! - **[`orchestrator`]** — frame gating, priority scheduling, and
//!   throttling across the detector registry.
//! - **[`table`]** — the dominant-tabular-container detector.
//! - **[`smart_selector`]** — interactive pattern induction and
//!   auto-expansion from user-chosen samples.
//! - **[`coordinator`]** — the single in-page message dispatcher.
//! - **[`lifecycle`]** — memory-pressure sampling and tiered cleanup.
//! - **[`observer`]** — buffered, debounced, significance-scored change
//!   notifications.
//!
//! ## Example
//!
//! ```
//! use pagescout::dom::Document;
//! use pagescout::detectors::{Detector, DetectorContext, StandardImgDetector};
//!
//! futures::executor::block_on(async {
//!     let doc = Document::parse(
//!         r#"<html><body><img src="/photos/1.jpg" width="800" height="600"></body></html>"#,
//!         url::Url::parse("https://example.test/").unwrap(),
//!     );
//!     let detector = StandardImgDetector;
//!     let candidates = detector.detect(&doc, &DetectorContext::new(1)).await.unwrap();
//!     assert_eq!(candidates.len(), 1);
//! });
//! ```

pub mod cache;
pub mod candidate;
pub mod coordinator;
pub mod detectors;
pub mod dom;
pub mod error;
pub mod lifecycle;
pub mod observer;
pub mod orchestrator;
pub mod pattern;
pub mod pipeline;
pub mod smart_selector;
pub mod table;
pub mod url_util;

pub use cache::{BoundedSeq, CleanupReport, LruMap, ResourceTracker};
pub use candidate::{Candidate, CandidateMetadata, DiscoveryMethod, ElementPath, FeedTier};
pub use coordinator::{DispatchResponse, Handler, MessageCoordinator, RespondOnce};
pub use detectors::{all_detectors, Detector, DetectorContext, ExtractionCache};
pub use dom::Document;
pub use error::{Error, Result};
pub use lifecycle::{
    CleanupOutcome, CleanupTrigger, Level, LifecycleConfig, LifecycleMonitor, MemorySample,
    PressureLevel,
};
pub use observer::{BufferedChange, DomObserver, ElementClass, ObserverConfig};
pub use orchestrator::{
    FrameGatingPolicy, FrameRole, JobMetrics, Orchestrator, OrchestratorConfig,
    OrchestratorJob, OrchestratorReport,
};
pub use pattern::{PatternKey, PatternRecognizer, Recognition, ScoringContext, Tier};
pub use pipeline::{Pipeline, PipelineConfig, PipelineStats};
pub use smart_selector::{SelectorState, Sample, SmartSelector, SmartSelectorConfig, UrlPattern};
pub use table::{Table, TableDetector, TableDetectorConfig, TryAnotherOutcome};
pub use url_util::{classify_media_type, is_same_origin, normalize_url, MediaType};
