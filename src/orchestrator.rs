//! Content orchestrator (component F): frame gating, detector sequencing
//! by priority, throttling, and global cross-detector deduplication.

use crate::cache::LruMap;
use crate::candidate::Candidate;
use crate::detectors::{Detector, DetectorContext};
use crate::dom::Document;
use crate::error::Error;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Window role relative to the top of the frame tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    Top,
    Iframe { depth: u32, cross_origin: bool },
}

#[derive(Debug, Clone, Default)]
pub struct FrameGatingPolicy {
    pub max_depth: u32,
    pub allow_cross_origin: bool,
    pub host_allow_list: Vec<String>,
}

impl FrameGatingPolicy {
    /// Default policy: run only in the top frame; cross-origin iframes and
    /// depths beyond `max_depth` are excluded unless host-allow-listed.
    pub fn should_run(&self, role: FrameRole, host: &str) -> bool {
        match role {
            FrameRole::Top => true,
            FrameRole::Iframe { depth, cross_origin } => {
                if self.host_allow_list.iter().any(|h| h == host) {
                    return true;
                }
                depth <= self.max_depth && (!cross_origin || self.allow_cross_origin)
            }
        }
    }
}

/// A registered detector plus its scheduling metadata (§3 OrchestratorJob).
pub struct OrchestratorJob {
    pub detector: Box<dyn Detector>,
    pub priority: i32,
    pub timeout: Duration,
    pub retry_limit: u32,
    pub dependencies: Vec<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct JobMetrics {
    pub ran: bool,
    pub elapsed: Option<Duration>,
    pub candidate_count: usize,
    pub error: Option<String>,
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub concurrency_cap: usize,
    pub min_interval: Duration,
    pub cpu_slowdown_ratio: f64,
    pub dedup_cache_capacity: usize,
    pub frame_gating: FrameGatingPolicyConfig,
}

/// Plain-data mirror of [`FrameGatingPolicy`] kept separate so the config
/// struct stays `Clone` without boxing a policy object.
#[derive(Debug, Clone, Default)]
pub struct FrameGatingPolicyConfig {
    pub max_depth: u32,
    pub allow_cross_origin: bool,
    pub host_allow_list: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency_cap: 2,
            min_interval: Duration::from_millis(750),
            cpu_slowdown_ratio: 0.8,
            dedup_cache_capacity: 10_000,
            frame_gating: FrameGatingPolicyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorReport {
    pub items_deduped: u64,
    pub throttled: u64,
    pub job_metrics: HashMap<&'static str, JobMetrics>,
}

/// Schedules registered detectors under throttling/frame-gating policy and
/// owns the global per-document dedup cache.
pub struct Orchestrator {
    config: OrchestratorConfig,
    jobs: Vec<OrchestratorJob>,
    dedup: LruMap<String, ()>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let capacity = config.dedup_cache_capacity;
        Self {
            config,
            jobs: Vec::new(),
            dedup: LruMap::new(capacity),
        }
    }

    /// Register a detector under a unique name with scheduling metadata.
    /// Later dispatch sorts by ascending priority (earlier runs first).
    pub fn register(
        &mut self,
        detector: Box<dyn Detector>,
        priority: i32,
        timeout: Duration,
        retry_limit: u32,
        dependencies: Vec<&'static str>,
    ) {
        self.jobs.push(OrchestratorJob {
            detector,
            priority,
            timeout,
            retry_limit,
            dependencies,
        });
    }

    pub fn should_scan(&self, role: FrameRole, host: &str) -> bool {
        let policy = FrameGatingPolicy {
            max_depth: self.config.frame_gating.max_depth,
            allow_cross_origin: self.config.frame_gating.allow_cross_origin,
            host_allow_list: self.config.frame_gating.host_allow_list.clone(),
        };
        policy.should_run(role, host)
    }

    /// Run every registered detector in priority order, subject to the
    /// concurrency cap, minimum-interval gate, and a CPU-utilization
    /// probe; emit deduplicated candidates and a per-detector report.
    pub async fn run(
        &mut self,
        doc: &Document,
        detector_ctx: &DetectorContext,
    ) -> (Vec<Candidate>, OrchestratorReport) {
        self.jobs.sort_by_key(|j| j.priority);

        let mut report = OrchestratorReport::default();
        let mut completed: Vec<&'static str> = Vec::new();
        let mut emitted = Vec::new();
        let mut last_dispatch: Option<Instant> = None;
        let mut active = 0usize;

        for job in &self.jobs {
            if job
                .dependencies
                .iter()
                .any(|dep| !completed.contains(dep))
            {
                report.job_metrics.insert(
                    job.detector.name(),
                    JobMetrics {
                        error: Some("unmet dependency".to_string()),
                        ..Default::default()
                    },
                );
                continue;
            }

            if active >= self.config.concurrency_cap {
                report.throttled += 1;
            }

            if let Some(last) = last_dispatch {
                let elapsed = last.elapsed();
                if elapsed < self.config.min_interval {
                    tokio::time::sleep(self.config.min_interval - elapsed).await;
                }
            }

            if cpu_probe_indicates_busy(self.config.cpu_slowdown_ratio) {
                report.throttled += 1;
                tokio::time::sleep(self.config.min_interval).await;
            }

            active += 1;
            let attempts_allowed = job.retry_limit + 1;
            let mut attempt = 0u32;
            let (outcome, elapsed) = loop {
                attempt += 1;
                let start = Instant::now();
                let outcome = tokio::time::timeout(job.timeout, job.detector.detect(doc, detector_ctx)).await;
                let elapsed = start.elapsed();

                let retryable = matches!(outcome, Err(_) | Ok(Err(_)));
                if !retryable || attempt >= attempts_allowed {
                    break (outcome, elapsed);
                }
                warn!(
                    detector = job.detector.name(),
                    attempt,
                    retry_limit = job.retry_limit,
                    "detector attempt failed, retrying"
                );
            };
            active -= 1;
            last_dispatch = Some(Instant::now());

            let metrics = match outcome {
                Ok(Ok(candidates)) => {
                    let count = candidates.len();
                    for candidate in candidates {
                        if Self::dedup_admit(&mut self.dedup, &candidate) {
                            emitted.push(candidate);
                        } else {
                            report.items_deduped += 1;
                        }
                    }
                    completed.push(job.detector.name());
                    JobMetrics {
                        ran: true,
                        elapsed: Some(elapsed),
                        candidate_count: count,
                        error: None,
                        timed_out: false,
                    }
                }
                Ok(Err(err)) => {
                    warn!(detector = job.detector.name(), error = %err, "detector failed, isolating");
                    JobMetrics {
                        ran: true,
                        elapsed: Some(elapsed),
                        candidate_count: 0,
                        error: Some(err.to_string()),
                        timed_out: false,
                    }
                }
                Err(_) => {
                    let err = Error::timeout(job.detector.name(), job.timeout.as_millis() as u64);
                    warn!(detector = job.detector.name(), "detector timed out");
                    JobMetrics {
                        ran: true,
                        elapsed: Some(elapsed),
                        candidate_count: 0,
                        error: Some(err.to_string()),
                        timed_out: true,
                    }
                }
            };

            report.job_metrics.insert(job.detector.name(), metrics);
        }

        info!(
            emitted = emitted.len(),
            deduped = report.items_deduped,
            "scan complete"
        );
        (emitted, report)
    }

    /// Keys prefer the resolved URL; fallback to the element's stable CSS
    /// path; last resort is a hash of the serialized candidate. Takes the
    /// dedup cache directly (rather than `&mut self`) so callers holding
    /// an active borrow of `self.jobs` can still call it.
    fn dedup_admit(dedup: &mut LruMap<String, ()>, candidate: &Candidate) -> bool {
        let key = if !candidate.url.is_empty() {
            candidate.url.clone()
        } else if let Some(path) = &candidate.element_path {
            path.clone()
        } else {
            use sha2::{Digest, Sha256};
            let serialized = serde_json::to_string(candidate).unwrap_or_default();
            format!("{:x}", Sha256::digest(serialized.as_bytes()))
        };

        if dedup.contains(&key) {
            return false;
        }
        dedup.set(key, ());
        true
    }
}

/// A short busy-loop timed against wall-clock; if the observed slowdown
/// exceeds `ratio`, dispatch should be deferred. A cooperative stand-in
/// for a real CPU-utilization API, which no portable Rust/browser
/// equivalent exposes synchronously.
fn cpu_probe_indicates_busy(ratio: f64) -> bool {
    let start = Instant::now();
    let mut acc: u64 = 0;
    for i in 0..200_000u64 {
        acc = acc.wrapping_add(i);
    }
    std::hint::black_box(acc);
    let elapsed = start.elapsed();
    // A probe that already took an implausibly long time suggests the
    // event loop is under heavy contention.
    elapsed.as_secs_f64() > (1.0 - ratio).max(0.001) * 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::all_detectors;

    #[tokio::test]
    async fn empty_page_reports_zero_candidates_successfully() {
        let doc = Document::parse("<html><body></body></html>", url::Url::parse("https://example.test/").unwrap());
        let ctx = DetectorContext::new(0);
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default());
        for (i, detector) in all_detectors().into_iter().enumerate() {
            orchestrator.register(detector, i as i32, Duration::from_secs(5), 0, vec![]);
        }
        let (candidates, report) = orchestrator.run(&doc, &ctx).await;
        assert!(candidates.is_empty());
        assert_eq!(report.items_deduped, 0);
        assert!(report.job_metrics.values().all(|m| m.error.is_none() || m.ran));
    }

    #[tokio::test]
    async fn duplicate_urls_across_detectors_are_deduped_once() {
        let doc = Document::parse(
            r#"<html><body>
                <img src="/a.jpg" width="800" height="600">
                <script>var x = "https://example.test/a.jpg";</script>
            </body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let ctx = DetectorContext::new(2);
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default());
        orchestrator.register(
            Box::new(crate::detectors::StandardImgDetector),
            0,
            Duration::from_secs(5),
            0,
            vec![],
        );
        orchestrator.register(
            Box::new(crate::detectors::HardcodedUrlDetector::default()),
            1,
            Duration::from_secs(5),
            0,
            vec![],
        );
        let (candidates, report) = orchestrator.run(&doc, &ctx).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(report.items_deduped, 1);
    }

    #[test]
    fn frame_gating_excludes_cross_origin_iframe_by_default() {
        let policy = FrameGatingPolicy::default();
        assert!(policy.should_run(FrameRole::Top, "example.test"));
        assert!(!policy.should_run(
            FrameRole::Iframe {
                depth: 0,
                cross_origin: true
            },
            "other.test"
        ));
    }

    struct FlakyDetector {
        calls: std::sync::atomic::AtomicU32,
        fail_first: u32,
    }

    #[async_trait::async_trait(?Send)]
    impl Detector for FlakyDetector {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn method(&self) -> crate::candidate::DiscoveryMethod {
            crate::candidate::DiscoveryMethod::StandardImg
        }

        async fn detect(&self, _doc: &Document, _ctx: &DetectorContext) -> crate::error::Result<Vec<Candidate>> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n < self.fail_first {
                Err(crate::error::Error::Internal("flaky failure".to_string()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[tokio::test]
    async fn detector_is_retried_up_to_retry_limit_then_succeeds() {
        let doc = Document::parse("<html><body></body></html>", url::Url::parse("https://example.test/").unwrap());
        let ctx = DetectorContext::new(0);
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default());
        orchestrator.register(
            Box::new(FlakyDetector {
                calls: std::sync::atomic::AtomicU32::new(0),
                fail_first: 2,
            }),
            0,
            Duration::from_secs(5),
            2,
            vec![],
        );
        let (_, report) = orchestrator.run(&doc, &ctx).await;
        let metrics = &report.job_metrics["flaky"];
        assert!(metrics.ran);
        assert!(metrics.error.is_none());
    }

    #[tokio::test]
    async fn detector_failing_more_than_retry_limit_is_reported_as_error() {
        let doc = Document::parse("<html><body></body></html>", url::Url::parse("https://example.test/").unwrap());
        let ctx = DetectorContext::new(0);
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default());
        orchestrator.register(
            Box::new(FlakyDetector {
                calls: std::sync::atomic::AtomicU32::new(0),
                fail_first: 5,
            }),
            0,
            Duration::from_secs(5),
            1,
            vec![],
        );
        let (_, report) = orchestrator.run(&doc, &ctx).await;
        let metrics = &report.job_metrics["flaky"];
        assert!(metrics.error.is_some());
    }

    #[test]
    fn frame_gating_allow_list_overrides_policy() {
        let policy = FrameGatingPolicy {
            host_allow_list: vec!["trusted.test".to_string()],
            ..Default::default()
        };
        assert!(policy.should_run(
            FrameRole::Iframe {
                depth: 5,
                cross_origin: true
            },
            "trusted.test"
        ));
    }
}
