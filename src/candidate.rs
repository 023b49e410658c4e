//! The candidate data model shared by every detector and the pipeline
//! (component, §3 DATA MODEL).

use crate::url_util::MediaType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which of the eight detection methods (or table detection) produced a
/// candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMethod {
    StandardImg,
    AdvancedBackground,
    ShadowDom,
    LazyLoading,
    HardcodedUrl,
    PerformanceApi,
    SvgProcessing,
    MultiDocument,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StandardImg => "standard-img",
            Self::AdvancedBackground => "advanced-background",
            Self::ShadowDom => "shadow-dom",
            Self::LazyLoading => "lazy-loading",
            Self::HardcodedUrl => "hardcoded-url",
            Self::PerformanceApi => "performance-api",
            Self::SvgProcessing => "svg-processing",
            Self::MultiDocument => "multi-document",
        }
    }
}

/// Free-form metadata carried alongside a candidate: dimensions, alt text,
/// class name, referrer document, and provenance markers for shadow-hosted
/// or pseudo-element sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Parent/grandparent `class` attribute(s), concatenated — the
    /// contextual-cue signal `pattern::ScoringContext::gallery_context`
    /// scores on, since gallery wrappers sit above the element, not on it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_class: Option<String>,
    /// 3+ similarly-tagged siblings around the element (§4.C contextual cues).
    #[serde(default)]
    pub similar_siblings: bool,
    /// `data-gallery` / `data-lightbox` / `data-fancybox` present on the
    /// element or one of its two nearest ancestors.
    #[serde(default)]
    pub gallery_attribute: bool,
    /// The document this candidate was discovered in, when it differs from
    /// the top-level scan document (multi-document galleries, shadow hosts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_document_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_host_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudo_element: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

/// A stable path back to the DOM element a candidate was discovered at,
/// used as a dedup fallback key and for highlight/clear round-trips. Plain
/// `String` stands in for a weak element back-reference: the parsed
/// document this path resolves against is not retained by the candidate
/// itself.
pub type ElementPath = String;

/// The unit produced by every detection method (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Resolved absolute source URL.
    pub url: String,
    pub media_type: MediaType,
    pub method: DiscoveryMethod,
    /// Confidence in `[0, 1]`. Monotone: validation may raise or lower it
    /// but a validated candidate is never reset back to "unknown".
    pub confidence: f64,
    /// Monotonic per-scan discovery position, assigned exactly once.
    pub position: u64,
    pub element_path: Option<ElementPath>,
    pub metadata: CandidateMetadata,
}

impl Candidate {
    pub fn new(
        url: impl Into<String>,
        media_type: MediaType,
        method: DiscoveryMethod,
        confidence: f64,
        position: u64,
    ) -> Self {
        Self {
            url: url.into(),
            media_type,
            method,
            confidence: confidence.clamp(0.0, 1.0),
            position,
            element_path: None,
            metadata: CandidateMetadata::default(),
        }
    }

    pub fn with_element_path(mut self, path: impl Into<ElementPath>) -> Self {
        self.element_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, metadata: CandidateMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Raise or lower confidence, but never to a value lower than what a
    /// destructive reset would imply; callers supply the new, fully
    /// computed confidence — this just enforces the clamp.
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence.clamp(0.0, 1.0);
    }
}

/// One of the four feed tiers a candidate is routed into (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedTier {
    HighConfidence,
    SameOrigin,
    External,
    Pending,
}

impl FeedTier {
    /// Feed processing order is fixed: high_confidence before same_origin
    /// before external (§5 Ordering guarantees).
    pub const VALIDATION_ORDER: [FeedTier; 3] =
        [FeedTier::HighConfidence, FeedTier::SameOrigin, FeedTier::External];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_clamped_into_unit_interval() {
        let c = Candidate::new(
            "https://x.test/a.jpg",
            MediaType::ImageKnown,
            DiscoveryMethod::StandardImg,
            1.5,
            0,
        );
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn method_string_tags_are_stable() {
        assert_eq!(DiscoveryMethod::AdvancedBackground.as_str(), "advanced-background");
        assert_eq!(DiscoveryMethod::SvgProcessing.as_str(), "svg-processing");
    }
}
