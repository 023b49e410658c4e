//! Smart selector (component H): pattern induction from a handful of
//! user-chosen samples, with similarity-driven auto-expansion and
//! adaptive per-pattern confidence learning.

use crate::dom::{self, Document};
use crate::pattern::PatternKey;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const DEFAULT_N_AUTO: usize = 3;
const DEFAULT_AUTO_EXPAND_THRESHOLD: f64 = 0.90;
const DEFAULT_MAX_AUTO_EXPAND: usize = 1000;

const W_TAG: f64 = 0.20;
const W_CLASS: f64 = 0.25;
const W_ATTR: f64 = 0.20;
const W_PATH: f64 = 0.15;
const W_SIBLING: f64 = 0.10;
const W_URL: f64 = 0.10;

/// A captured exemplar. Immutable once recorded; removed only by explicit
/// undo (`remove_last`) or `clear`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub sample_index: usize,
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: HashMap<String, String>,
    pub css_path: String,
    pub url_pattern: Option<UrlPattern>,
    pub parent_relative_index: usize,
    pub sibling_count: usize,
    pub similar_sibling_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlPattern {
    pub template: String,
    pub variable: String,
}

/// Finds numeric substrings in a URL, treats the last one as the variable
/// position, and produces `template = url.replace(last_number, "{n}")`.
pub fn mine_url_pattern(url: &str) -> Option<UrlPattern> {
    fn numeric_re() -> &'static regex::Regex {
        static RE: OnceLock<regex::Regex> = OnceLock::new();
        RE.get_or_init(|| regex::Regex::new(r"\d+").unwrap())
    }

    let last = numeric_re().find_iter(url).last()?;
    let mut template = String::with_capacity(url.len() + 3);
    template.push_str(&url[..last.start()]);
    template.push_str("{n}");
    template.push_str(&url[last.end()..]);

    Some(UrlPattern {
        template,
        variable: last.as_str().to_string(),
    })
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn shared_path_fraction(a: &str, b: &str) -> f64 {
    let a_segs: Vec<&str> = a.split(" > ").collect();
    let b_segs: Vec<&str> = b.split(" > ").collect();
    let shared = a_segs.iter().zip(b_segs.iter()).filter(|(x, y)| x == y).count();
    let longest = a_segs.len().max(b_segs.len()).max(1);
    shared as f64 / longest as f64
}

fn sibling_distance(a: &Sample, b_count: usize, b_index: usize, b_similar: usize) -> f64 {
    let norm = |x: usize, y: usize| -> f64 {
        let max = x.max(y).max(1) as f64;
        1.0 - ((x as f64 - y as f64).abs() / max)
    };
    let terms = [
        norm(a.sibling_count, b_count),
        norm(a.parent_relative_index, b_index),
        norm(a.similar_sibling_count, b_similar),
    ];
    terms.iter().sum::<f64>() / terms.len() as f64
}

fn url_pattern_score(a: &Option<UrlPattern>, b: &Option<UrlPattern>) -> f64 {
    match (a, b) {
        (Some(pa), Some(pb)) if pa.template == pb.template && pa.variable == pb.variable => 1.0,
        (Some(pa), Some(pb)) if pa.template == pb.template => 0.8,
        _ => 0.0,
    }
}

/// Pairwise similarity between a sample and a prospective DOM element.
fn similarity(sample: &Sample, tag: &str, classes: &HashSet<String>, attrs: &HashSet<String>,
              css_path: &str, sibling_count: usize, parent_index: usize, similar_sibling_count: usize,
              url_pattern: &Option<UrlPattern>) -> f64 {
    let tag_score = if sample.tag == tag { 1.0 } else { 0.0 };
    let class_score = jaccard(&sample.classes.iter().cloned().collect(), classes);
    let attr_score = jaccard(&sample.attributes.keys().cloned().collect(), attrs);
    let path_score = shared_path_fraction(&sample.css_path, css_path);
    let sibling_score = sibling_distance(sample, sibling_count, parent_index, similar_sibling_count);
    let url_score = url_pattern_score(&sample.url_pattern, url_pattern);

    W_TAG * tag_score
        + W_CLASS * class_score
        + W_ATTR * attr_score
        + W_PATH * path_score
        + W_SIBLING * sibling_score
        + W_URL * url_score
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorState {
    Sampling,
    Analyzing,
    Expanding,
}

#[derive(Debug, Clone)]
pub struct SmartSelectorConfig {
    pub n_auto: usize,
    pub auto_expand_threshold: f64,
    pub max_auto_expand: usize,
}

impl Default for SmartSelectorConfig {
    fn default() -> Self {
        Self {
            n_auto: DEFAULT_N_AUTO,
            auto_expand_threshold: DEFAULT_AUTO_EXPAND_THRESHOLD,
            max_auto_expand: DEFAULT_MAX_AUTO_EXPAND,
        }
    }
}

#[derive(Debug, Default)]
struct PatternStat {
    learned_multiplier: f64,
}

impl PatternStat {
    fn new() -> Self {
        Self { learned_multiplier: 0.5 }
    }

    fn record(&mut self, success: bool) {
        if success {
            self.learned_multiplier = (self.learned_multiplier + 0.1).min(1.0);
        } else {
            self.learned_multiplier = (self.learned_multiplier - 0.1).max(0.0);
        }
    }

    fn confidence_multiplier(&self) -> f64 {
        1.0 + (self.learned_multiplier - 0.5) * 0.4
    }
}

pub struct SmartSelector {
    config: SmartSelectorConfig,
    samples: Vec<Sample>,
    auto_expanded: Vec<String>,
    state: SelectorState,
    pattern_stats: HashMap<PatternKey, PatternStat>,
}

impl SmartSelector {
    pub fn new(config: SmartSelectorConfig) -> Self {
        Self {
            config,
            samples: Vec::new(),
            auto_expanded: Vec::new(),
            state: SelectorState::Sampling,
            pattern_stats: HashMap::new(),
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn auto_expanded(&self) -> &[String] {
        &self.auto_expanded
    }

    /// Capture a click target as a new sample, advancing the sampling
    /// state machine.
    pub fn capture_sample(&mut self, el: &ElementRef) {
        let sample = build_sample(el, self.samples.len());
        self.samples.push(sample);
        self.advance();
    }

    fn advance(&mut self) {
        if self.samples.len() < self.config.n_auto {
            self.state = SelectorState::Sampling;
            return;
        }

        self.state = SelectorState::Analyzing;
        let confidence = self.pattern_confidence();
        if confidence >= self.config.auto_expand_threshold {
            self.state = SelectorState::Expanding;
        } else {
            self.state = SelectorState::Sampling;
        }
    }

    /// Confidence that all captured samples share one pattern: boosted by
    /// +0.15 when they also share a URL-numeric pattern.
    fn pattern_confidence(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let first = &self.samples[0];
        let same_tag = self.samples.iter().all(|s| s.tag == first.tag);
        let same_top_class = first.classes.first().map(|c| {
            self.samples
                .iter()
                .all(|s| s.classes.first() == Some(c))
        }).unwrap_or(false);

        let mut confidence: f64 = 0.0;
        if same_tag {
            confidence += 0.5;
        }
        if same_top_class {
            confidence += 0.35;
        }

        let same_url_pattern = first
            .url_pattern
            .as_ref()
            .is_some_and(|fp| {
                self.samples
                    .iter()
                    .all(|s| s.url_pattern.as_ref().is_some_and(|p| p.template == fp.template))
            });
        if same_url_pattern {
            confidence += 0.15;
        }

        confidence.min(1.0)
    }

    /// Undo the most recent sample.
    pub fn remove_last(&mut self) {
        self.samples.pop();
        self.advance();
        if self.samples.is_empty() {
            self.state = SelectorState::Sampling;
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.auto_expanded.clear();
        self.state = SelectorState::Sampling;
    }

    /// Generate a CSS selector from the dominant tag/class/attribute
    /// shared across samples, picking the most specific that is still
    /// valid.
    pub fn generate_selector(&self) -> Option<String> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;

        let tag = dominant(self.samples.iter().map(|s| s.tag.clone()), n, 0.8)?;

        let class = dominant(
            self.samples.iter().filter_map(|s| s.classes.first().cloned()),
            n,
            0.7,
        );
        let attr = dominant(
            self.samples
                .iter()
                .flat_map(|s| s.attributes.keys().filter(|k| *k != "id" && *k != "class").cloned()),
            n,
            0.6,
        );

        let mut selector = tag;
        if let Some(class) = class {
            selector.push_str(&format!(".{class}"));
        } else if let Some(attr) = attr {
            selector.push_str(&format!("[{attr}]"));
        }
        Some(selector)
    }

    /// Enumerate elements matching the generated selector, skip samples,
    /// keep those whose similarity to the sample set clears the
    /// threshold, cap at `max_auto_expand`, and record them.
    pub fn auto_expand(&mut self, doc: &Document) -> usize {
        let Some(selector_str) = self.generate_selector() else {
            return 0;
        };
        let Ok(selector) = Selector::parse(&selector_str) else {
            return 0;
        };

        let sample_paths: HashSet<String> = self.samples.iter().map(|s| s.css_path.clone()).collect();
        let mut expanded = Vec::new();

        for el in doc.select(&selector) {
            let path = dom::stable_css_path(&el);
            if sample_paths.contains(&path) {
                continue;
            }

            let candidate_sample = build_sample(&el, 0);
            let classes: HashSet<String> = candidate_sample.classes.iter().cloned().collect();
            let attrs: HashSet<String> = candidate_sample.attributes.keys().cloned().collect();

            let avg_similarity: f64 = self
                .samples
                .iter()
                .map(|s| {
                    similarity(
                        s,
                        &candidate_sample.tag,
                        &classes,
                        &attrs,
                        &candidate_sample.css_path,
                        candidate_sample.sibling_count,
                        candidate_sample.parent_relative_index,
                        candidate_sample.similar_sibling_count,
                        &candidate_sample.url_pattern,
                    )
                })
                .sum::<f64>()
                / self.samples.len() as f64;

            if avg_similarity >= self.config.auto_expand_threshold {
                expanded.push(path);
                if expanded.len() >= self.config.max_auto_expand {
                    break;
                }
            }
        }

        self.auto_expanded = expanded;
        self.auto_expanded.len()
    }

    /// Adaptive learning: on confirmation, success raises the learned
    /// multiplier toward 1, failure lowers it toward 0.
    pub fn record_feedback(&mut self, key: PatternKey, success: bool) {
        self.pattern_stats.entry(key).or_insert_with(PatternStat::new).record(success);
    }

    pub fn confidence_multiplier(&self, key: &PatternKey) -> f64 {
        self.pattern_stats
            .get(key)
            .map(PatternStat::confidence_multiplier)
            .unwrap_or(1.0)
    }
}

fn dominant(items: impl Iterator<Item = String>, total: f64, threshold: f64) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| *count as f64 / total >= threshold)
        .map(|(item, _)| item)
}

fn build_sample(el: &ElementRef, sample_index: usize) -> Sample {
    let tag = el.value().name().to_string();
    let classes: Vec<String> = el
        .value()
        .attr("class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let attributes: HashMap<String, String> = el
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let css_path = dom::stable_css_path(el);
    let url = el.value().attr("src").or_else(|| el.value().attr("href"));
    let url_pattern = url.and_then(mine_url_pattern);

    let parent_relative_index = el
        .prev_siblings()
        .filter_map(|n| n.value().as_element())
        .count();
    let sibling_count = el
        .parent()
        .and_then(ElementRef::wrap)
        .map(|p| p.children().filter_map(ElementRef::wrap).count())
        .unwrap_or(1)
        .saturating_sub(1);
    let similar_sibling_count = dom::similar_sibling_count(el);

    Sample {
        sample_index,
        tag,
        classes,
        attributes,
        css_path,
        url_pattern,
        parent_relative_index,
        sibling_count,
        similar_sibling_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_page(n: usize) -> Document {
        let imgs = (1..=n)
            .map(|i| format!(r#"<img class="tile" src="https://x.test/tile{i}.jpg">"#))
            .collect::<String>();
        Document::parse(
            &format!(r#"<html><body><div class="grid">{imgs}</div></body></html>"#),
            url::Url::parse("https://x.test/").unwrap(),
        )
    }

    #[test]
    fn url_pattern_mining_replaces_last_number() {
        let pattern = mine_url_pattern("https://x.test/tile12.jpg").unwrap();
        assert_eq!(pattern.template, "https://x.test/tile{n}.jpg");
        assert_eq!(pattern.variable, "12");
    }

    #[test]
    fn state_transitions_sampling_to_analyzing_to_expanding() {
        let doc = tile_page(20);
        let selector = Selector::parse("img.tile").unwrap();
        let imgs: Vec<_> = doc.select(&selector).collect();

        let mut selector_state = SmartSelector::new(SmartSelectorConfig::default());
        assert_eq!(selector_state.state(), SelectorState::Sampling);

        selector_state.capture_sample(&imgs[0]);
        assert_eq!(selector_state.state(), SelectorState::Sampling);
        selector_state.capture_sample(&imgs[1]);
        assert_eq!(selector_state.state(), SelectorState::Sampling);
        selector_state.capture_sample(&imgs[2]);
        assert_eq!(selector_state.state(), SelectorState::Expanding);
    }

    #[test]
    fn clear_resets_to_sampling_with_empty_set() {
        let doc = tile_page(5);
        let selector = Selector::parse("img.tile").unwrap();
        let imgs: Vec<_> = doc.select(&selector).collect();
        let mut s = SmartSelector::new(SmartSelectorConfig::default());
        for img in &imgs[..3] {
            s.capture_sample(img);
        }
        s.clear();
        assert_eq!(s.state(), SelectorState::Sampling);
        assert!(s.samples().is_empty());
    }

    #[test]
    fn auto_expand_finds_remaining_similar_siblings() {
        let doc = tile_page(20);
        let selector = Selector::parse("img.tile").unwrap();
        let imgs: Vec<_> = doc.select(&selector).collect();

        let mut s = SmartSelector::new(SmartSelectorConfig::default());
        for img in &imgs[..3] {
            s.capture_sample(img);
        }
        assert_eq!(s.state(), SelectorState::Expanding);

        let count = s.auto_expand(&doc);
        assert!(count >= 15, "expected >=15 auto-expanded matches, got {count}");
    }

    #[test]
    fn adaptive_learning_raises_and_lowers_multiplier() {
        let mut s = SmartSelector::new(SmartSelectorConfig::default());
        let key = PatternKey::new("standard-img", "gallery", "img", "tile");
        assert_eq!(s.confidence_multiplier(&key), 1.0);
        s.record_feedback(key.clone(), true);
        assert!(s.confidence_multiplier(&key) > 1.0);
        s.record_feedback(key.clone(), false);
        s.record_feedback(key.clone(), false);
        assert!(s.confidence_multiplier(&key) < 1.0);
    }
}
