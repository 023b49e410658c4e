//! Candidate pipeline (component E): ingestion/dedup, categorization via
//! the smart-pattern recognizer, and two-phase (fast + network)
//! validation with bounded concurrency.

use crate::candidate::{Candidate, FeedTier};
use crate::pattern::{PatternRecognizer, ScoringContext};
use crate::url_util::{classify_media_type, is_same_origin, MediaType};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_CONCURRENCY: usize = 5;
const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(30);
const NETWORK_PATH_THRESHOLD: f64 = 0.8;
const VALID_THRESHOLD: f64 = 0.6;

/// Transient-failure retry budget for `network_path` (§7: 5xx/429/408 and
/// transport errors are retried with exponential backoff; 4xx is permanent
/// and fails fast, keeping the fast-path verdict).
const NETWORK_RETRY_LIMIT: u32 = 3;
const NETWORK_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub validation_concurrency: usize,
    pub network_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validation_concurrency: DEFAULT_CONCURRENCY,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub duplicates: u64,
    pub validated: u64,
    pub rejected: u64,
}

/// Owns the feed and `processed` sequences exclusively; detectors transfer
/// candidates in and retain no ownership of their own (§3 Ownership).
pub struct Pipeline {
    config: PipelineConfig,
    recognizer: PatternRecognizer,
    http: reqwest::Client,
    document_url: Url,
    seen_urls: HashSet<String>,
    feeds: HashMap<FeedTier, Vec<Candidate>>,
    processed: Vec<Candidate>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(document_url: Url, config: PipelineConfig) -> Self {
        let mut feeds = HashMap::new();
        for tier in [
            FeedTier::HighConfidence,
            FeedTier::SameOrigin,
            FeedTier::External,
            FeedTier::Pending,
        ] {
            feeds.insert(tier, Vec::new());
        }

        Self {
            config,
            recognizer: PatternRecognizer::new(),
            http: reqwest::Client::builder()
                .timeout(config.network_timeout)
                .build()
                .unwrap_or_default(),
            document_url,
            seen_urls: HashSet::new(),
            feeds,
            processed: Vec::new(),
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn feed(&self, tier: FeedTier) -> &[Candidate] {
        self.feeds.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn processed(&self) -> &[Candidate] {
        &self.processed
    }

    /// At most one candidate per resolved URL across the entire scan
    /// (§4.E invariant a). Categorize is idempotent: re-ingesting an
    /// already-seen URL is a no-op besides incrementing the duplicate
    /// counter (§8 round-trip law).
    pub fn ingest(&mut self, candidate: Candidate) -> bool {
        if self.seen_urls.contains(&candidate.url) {
            self.stats.duplicates += 1;
            return false;
        }
        self.seen_urls.insert(candidate.url.clone());
        self.categorize(candidate);
        true
    }

    fn categorize(&mut self, mut candidate: Candidate) {
        let ctx = ScoringContext {
            width: candidate.metadata.width,
            height: candidate.metadata.height,
            gallery_context: [&candidate.metadata.class_name, &candidate.metadata.container_class]
                .into_iter()
                .flatten()
                .any(|c| {
                    ["gallery", "carousel", "masonry", "lightbox"]
                        .iter()
                        .any(|needle| c.contains(needle))
                }),
            similar_siblings: candidate.metadata.similar_siblings,
            gallery_attribute: candidate.metadata.gallery_attribute,
        };

        let recognition = self.recognizer.recognize(&candidate.url, &ctx);
        candidate.set_confidence(recognition.confidence);

        let same_origin = is_same_origin(&candidate.url, &self.document_url);
        let tier = recognition.feed_tier(same_origin);

        // Routed into a feed atomically: never left sitting in `pending`
        // once it has a destination tier (§4.E invariant c).
        self.feeds.entry(tier).or_default().push(candidate);
    }

    /// Runs fast-path (and, when needed, network-path) validation for
    /// every feed in fixed order: high_confidence, same_origin, external.
    pub async fn validate_all(&mut self) {
        for tier in FeedTier::VALIDATION_ORDER {
            self.validate_feed(tier).await;
        }
    }

    async fn validate_feed(&mut self, tier: FeedTier) {
        let candidates = self.feeds.get_mut(&tier).map(std::mem::take).unwrap_or_default();
        if candidates.is_empty() {
            return;
        }

        let semaphore = Semaphore::new(self.config.validation_concurrency);
        let mut validated = Vec::with_capacity(candidates.len());

        for mut candidate in candidates {
            let _permit = semaphore.acquire().await.expect("semaphore not closed");
            let verdict = validate_one(&self.http, &candidate.url).await;

            candidate.set_confidence(verdict.confidence);
            if verdict.media_type != MediaType::Unknown {
                candidate.media_type = verdict.media_type;
            }

            if verdict.confidence > VALID_THRESHOLD {
                self.stats.validated += 1;
                validated.push(candidate);
            } else {
                self.stats.rejected += 1;
                debug!(url = %candidate.url, confidence = verdict.confidence, "candidate rejected by validation");
            }
        }

        validated.sort_by_key(|c| c.position);
        self.processed.extend(validated);
        self.processed.sort_by_key(|c| c.position);
    }
}

struct Verdict {
    confidence: f64,
    media_type: MediaType,
}

async fn validate_one(http: &reqwest::Client, url: &str) -> Verdict {
    let fast = fast_path(url);
    if fast.confidence >= NETWORK_PATH_THRESHOLD {
        return fast;
    }

    match network_path(http, url).await {
        Some(verdict) => verdict,
        None => fast,
    }
}

fn fast_path(url: &str) -> Verdict {
    if let Some(rest) = url.strip_prefix("data:") {
        let media_type = if rest.starts_with("image/svg") {
            MediaType::Svg
        } else {
            MediaType::ImageKnown
        };
        return Verdict {
            confidence: 0.95,
            media_type,
        };
    }

    let media_type = classify_media_type(url);
    if matches!(
        media_type,
        MediaType::ImageKnown | MediaType::Svg | MediaType::Pdf | MediaType::Archive
    ) {
        return Verdict {
            confidence: 0.85,
            media_type,
        };
    }

    let host = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string));
    if let Some(host) = host {
        if crate::pattern::is_known_cdn(&host) {
            return Verdict {
                confidence: 0.80,
                media_type,
            };
        }
    }

    Verdict {
        confidence: 0.3,
        media_type,
    }
}

/// Status codes worth retrying: 5xx, 429 (rate limited), 408 (request
/// timeout). Anything else in the 4xx range is a permanent failure — the
/// resource does not exist or is forbidden, and retrying will not help.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status.as_u16() == 429 || status.as_u16() == 408
}

fn retry_delay(attempt: u32) -> Duration {
    NETWORK_RETRY_BASE_DELAY * 2u32.saturating_pow(attempt.saturating_sub(1))
}

fn verdict_from_response(url: &str, response: &reqwest::Response) -> Option<Verdict> {
    let is_image = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("image/"))
        .unwrap_or(false);

    if is_image {
        return Some(Verdict {
            confidence: 0.95,
            media_type: classify_media_type(url),
        });
    }

    let known_ext = matches!(classify_media_type(url), MediaType::ImageKnown | MediaType::Svg);
    known_ext.then(|| Verdict {
        confidence: 0.7,
        media_type: classify_media_type(url),
    })
}

/// Transient network failures (5xx/429/408, transport/timeout errors) are
/// retried with capped exponential backoff (§7 "Transient network"); a 4xx
/// response is permanent and fails fast, keeping the fast-path verdict
/// (§7 "Permanent network").
async fn network_path(http: &reqwest::Client, url: &str) -> Option<Verdict> {
    let mut attempt = 0;

    loop {
        match http.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return verdict_from_response(url, &response);
                }
                if !is_transient_status(status) {
                    debug!(url, status = %status, "permanent network error, keeping fast-path verdict");
                    return None;
                }
                if attempt >= NETWORK_RETRY_LIMIT {
                    warn!(url, status = %status, attempt, "transient network error, retry limit reached");
                    return None;
                }
                attempt += 1;
                debug!(url, status = %status, attempt, "transient network error, retrying");
                tokio::time::sleep(retry_delay(attempt)).await;
            }
            Err(e) => {
                if attempt >= NETWORK_RETRY_LIMIT {
                    warn!(url, error = %e, attempt, "network validation failed, retaining fast-path verdict");
                    return None;
                }
                attempt += 1;
                debug!(url, error = %e, attempt, "transport error, retrying");
                tokio::time::sleep(retry_delay(attempt)).await;
            }
        }
    }
}
