//! Smart-pattern recognizer (component C): scores a candidate URL by a
//! weighted sum of URL shape, domain reputation, extension class,
//! contextual DOM cues and (later, post-validation) content checks, then
//! buckets the result into a confidence tier.

use crate::cache::LruMap;
use crate::candidate::FeedTier;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const W_URL_PATTERN: f64 = 0.25;
const W_DOMAIN_REPUTATION: f64 = 0.20;
const W_DIMENSION_PRESENCE: f64 = 0.15;
const W_EXTENSION_CLASS: f64 = 0.10;
const W_CONTEXTUAL_CUES: f64 = 0.15;
const W_CONTENT_VALIDATION: f64 = 0.15;

const HIGH_THRESHOLD: f64 = 0.75;
const MEDIUM_THRESHOLD: f64 = 0.3;

/// Confidence tier a recognizer result falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    fn from_score(score: f64) -> Self {
        if score >= HIGH_THRESHOLD {
            Tier::High
        } else if score >= MEDIUM_THRESHOLD {
            Tier::Medium
        } else {
            Tier::Low
        }
    }
}

/// Output of the recognizer: score, tier, and the reasons that contributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recognition {
    pub confidence: f64,
    pub tier: Tier,
    pub reasons: Vec<String>,
}

impl Recognition {
    /// Map tier (+ same-origin-ness, for medium) to the feed it routes into.
    pub fn feed_tier(&self, is_same_origin: bool) -> FeedTier {
        match self.tier {
            Tier::High => FeedTier::HighConfidence,
            Tier::Medium if is_same_origin => FeedTier::SameOrigin,
            Tier::Medium => FeedTier::External,
            Tier::Low => FeedTier::External,
        }
    }
}

/// Contextual facts about where a URL was discovered, gathered by the
/// calling detector (cheap to compute, does not require a second DOM walk).
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Parent/grandparent class or dataset suggests gallery/carousel/etc.
    pub gallery_context: bool,
    /// 3+ similarly-tagged siblings.
    pub similar_siblings: bool,
    /// `data-gallery` / `data-lightbox` / `data-fancybox` present.
    pub gallery_attribute: bool,
}

struct UrlPatterns {
    positive: Regex,
    dimension: Regex,
    negative: Regex,
}

impl UrlPatterns {
    fn new() -> Self {
        Self {
            positive: Regex::new(r"(?i)/gallery/|/photos/|/images/|/media/|/assets/").unwrap(),
            dimension: Regex::new(r"\d{3,}x\d{3,}").unwrap(),
            negative: Regex::new(r"(?i)icon|favicon|emoji|avatar|spinner|placeholder").unwrap(),
        }
    }
}

fn url_patterns() -> &'static UrlPatterns {
    static PATTERNS: OnceLock<UrlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(UrlPatterns::new)
}

fn score_url_pattern(url: &str) -> (f64, Option<&'static str>) {
    let patterns = url_patterns();
    if patterns.negative.is_match(url) {
        return (0.0, Some("icon/placeholder-like path"));
    }
    let mut score: f64 = 0.0;
    let mut reason = None;
    if patterns.positive.is_match(url) {
        score = 1.0;
        reason = Some("gallery-like path segment");
    }
    if patterns.dimension.is_match(url) {
        score = (score + 1.0).min(1.0);
        reason = reason.or(Some("dimensions encoded in path"));
    }
    (score, reason)
}

const KNOWN_PHOTO_DOMAINS: &[&str] = &[
    "flickr.com",
    "unsplash.com",
    "500px.com",
    "pexels.com",
    "imgur.com",
];
const KNOWN_CDN_DOMAINS: &[&str] = &[
    "cloudfront.net",
    "akamaihd.net",
    "cloudinary.com",
    "imgix.net",
    "fastly.net",
];

/// Used by the candidate pipeline's fast-path validation (component E),
/// which treats a known CDN host as a strong signal on its own.
pub fn is_known_cdn(host: &str) -> bool {
    KNOWN_CDN_DOMAINS.iter().any(|d| host.ends_with(d))
}

fn domain_reputation(host: &str) -> f64 {
    if KNOWN_PHOTO_DOMAINS.iter().any(|d| host.ends_with(d)) {
        0.9
    } else if KNOWN_CDN_DOMAINS.iter().any(|d| host.ends_with(d)) {
        0.8
    } else {
        0.5
    }
}

fn extension_class(url: &str) -> f64 {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next().filter(|e| *e != path);
    match ext.map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("jpg") | Some("jpeg") | Some("png") => 0.9,
        Some("webp") => 0.85,
        Some("gif") => 0.7,
        Some("svg") => 0.6,
        Some("ico") => 0.1,
        None => 0.3,
        Some(_) => 0.5,
    }
}

fn dimension_presence(ctx: &ScoringContext) -> f64 {
    match (ctx.width, ctx.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => 1.0,
        (Some(_), None) | (None, Some(_)) => 0.5,
        _ => 0.0,
    }
}

fn contextual_cues(ctx: &ScoringContext) -> f64 {
    let mut score: f64 = 0.0;
    if ctx.gallery_context {
        score += 0.6;
    }
    if ctx.similar_siblings {
        score += 0.3;
    }
    if ctx.gallery_attribute {
        score += 0.4;
    }
    score.min(1.0)
}

/// Size/aspect-ratio gate used both by content validation and by the
/// gallery-aware filter in detector D.1 (Standard IMG).
pub fn passes_gallery_size_rule(width: u32, height: u32, gallery_context: bool) -> bool {
    let ratio = width as f64 / height.max(1) as f64;
    if gallery_context {
        return width >= 15 && height >= 15 && (0.5..=2.0).contains(&ratio);
    }
    if width <= 16 && height <= 16 {
        return false;
    }
    if width == height && width <= 32 {
        return false;
    }
    (0.1..=10.0).contains(&ratio)
}

fn content_validation(ctx: &ScoringContext) -> f64 {
    match (ctx.width, ctx.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => {
            if passes_gallery_size_rule(w, h, ctx.gallery_context) {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.5,
    }
}

/// Scores a candidate URL and its discovery context, memoizing domain
/// reputation per host.
pub struct PatternRecognizer {
    domain_cache: LruMap<String, f64>,
}

impl PatternRecognizer {
    pub fn new() -> Self {
        Self {
            domain_cache: LruMap::new(512),
        }
    }

    pub fn recognize(&mut self, url: &str, ctx: &ScoringContext) -> Recognition {
        let mut reasons = Vec::new();

        let (url_score, url_reason) = score_url_pattern(url);
        if let Some(r) = url_reason {
            reasons.push(r.to_string());
        }

        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let domain_score = if let Some(cached) = self.domain_cache.get(&host) {
            *cached
        } else {
            let score = domain_reputation(&host);
            self.domain_cache.set(host.clone(), score);
            score
        };
        if domain_score >= 0.8 {
            reasons.push(format!("reputable host '{host}'"));
        }

        let dim_score = dimension_presence(ctx);
        let ext_score = extension_class(url);
        let ctx_score = contextual_cues(ctx);
        if ctx_score > 0.0 {
            reasons.push("gallery-context cues present".to_string());
        }
        let content_score = content_validation(ctx);

        let confidence = W_URL_PATTERN * url_score
            + W_DOMAIN_REPUTATION * domain_score
            + W_DIMENSION_PRESENCE * dim_score
            + W_EXTENSION_CLASS * ext_score
            + W_CONTEXTUAL_CUES * ctx_score
            + W_CONTENT_VALIDATION * content_score;

        Recognition {
            confidence: confidence.clamp(0.0, 1.0),
            tier: Tier::from_score(confidence),
            reasons,
        }
    }
}

impl Default for PatternRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Derived from (detection method, gallery context type, tag, first
/// meaningful class) — keyed into the smart selector's adaptive-learning
/// statistics (component H).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    pub method: String,
    pub context_type: String,
    pub tag: String,
    pub first_class: String,
}

impl PatternKey {
    pub fn new(
        method: impl Into<String>,
        context_type: impl Into<String>,
        tag: impl Into<String>,
        first_class: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            context_type: context_type.into(),
            tag: tag.into(),
            first_class: first_class.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_path_and_dimensions_yield_high_tier() {
        let mut rec = PatternRecognizer::new();
        let ctx = ScoringContext {
            width: Some(800),
            height: Some(600),
            gallery_context: true,
            similar_siblings: true,
            gallery_attribute: true,
        };
        let result = rec.recognize("https://example.test/gallery/photo_1200x900.jpg", &ctx);
        assert_eq!(result.tier, Tier::High);
        assert!(result.confidence >= 0.75);
    }

    #[test]
    fn icon_like_path_is_low_tier() {
        let mut rec = PatternRecognizer::new();
        let ctx = ScoringContext {
            width: Some(16),
            height: Some(16),
            ..Default::default()
        };
        let result = rec.recognize("https://example.test/favicon.ico", &ctx);
        assert_eq!(result.tier, Tier::Low);
    }

    #[test]
    fn domain_reputation_is_memoized() {
        let mut rec = PatternRecognizer::new();
        let ctx = ScoringContext::default();
        rec.recognize("https://flickr.com/a.jpg", &ctx);
        assert_eq!(rec.domain_cache.len(), 1);
        rec.recognize("https://flickr.com/b.jpg", &ctx);
        assert_eq!(rec.domain_cache.len(), 1);
    }

    #[test]
    fn gallery_size_rule_admits_small_gallery_images() {
        assert!(passes_gallery_size_rule(15, 15, true));
        assert!(!passes_gallery_size_rule(1, 1, true));
        assert!(!passes_gallery_size_rule(16, 16, false));
    }

    #[test]
    fn feed_routing_matches_tier_and_origin() {
        let high = Recognition {
            confidence: 0.9,
            tier: Tier::High,
            reasons: vec![],
        };
        assert_eq!(high.feed_tier(false), FeedTier::HighConfidence);

        let medium = Recognition {
            confidence: 0.5,
            tier: Tier::Medium,
            reasons: vec![],
        };
        assert_eq!(medium.feed_tier(true), FeedTier::SameOrigin);
        assert_eq!(medium.feed_tier(false), FeedTier::External);
    }
}
