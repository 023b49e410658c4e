//! DOM observer (component K): buffers mutations into a bounded change
//! buffer, debounces processing, classifies added elements, scores
//! significance, and notifies registered callbacks when a threshold is
//! met (§4.K).
//!
//! There is no live `MutationObserver` behind a parsed-document library,
//! so the "mutation" this module buffers is simply a diff the host
//! supplies — two [`Document`] snapshots, or a list of elements it knows
//! were inserted. The buffering, debouncing, classification and
//! significance scoring are exactly what the specification asks for;
//! only the mutation *source* is delegated to the caller.

use crate::cache::BoundedSeq;
use scraper::ElementRef;
use std::time::{Duration, Instant};

const DEFAULT_BUFFER_CAPACITY: usize = 500;
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
const MIN_NEW_ELEMENTS: usize = 5;
const MIN_NEW_IMAGES: usize = 3;
const MIN_SIGNIFICANCE: f64 = 0.3;

const W_IMAGE: f64 = 0.8;
const W_PRODUCT: f64 = 0.9;
const W_GALLERY: f64 = 0.7;
const W_LINK: f64 = 0.5;
const W_TEXT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementClass {
    Image,
    Product,
    Gallery,
    Link,
    Text,
}

/// A single buffered addition: a stable path (the observer never retains
/// the element itself) plus its classification.
#[derive(Debug, Clone)]
pub struct BufferedChange {
    pub path: String,
    pub class: ElementClass,
}

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    pub buffer_capacity: usize,
    pub debounce: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

type Callback = Box<dyn Fn(&[BufferedChange], f64) + Send + Sync>;

/// Buffers added elements, debounces processing, and fans significant
/// batches out to registered callbacks. One failing callback does not
/// affect the others (§4.K "Emits callbacks safely").
pub struct DomObserver {
    config: ObserverConfig,
    buffer: BoundedSeq<BufferedChange>,
    callbacks: Vec<Callback>,
    last_flush: Option<Instant>,
}

impl DomObserver {
    pub fn new(config: ObserverConfig) -> Self {
        let capacity = config.buffer_capacity;
        Self {
            config,
            buffer: BoundedSeq::new(capacity),
            callbacks: Vec::new(),
            last_flush: None,
        }
    }

    pub fn register_callback(&mut self, callback: Callback) {
        self.callbacks.push(callback);
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Classify and buffer every element in `added`. Returns `true` if the
    /// caller should flush now (debounce window elapsed since the last
    /// flush, or there was no previous flush).
    pub fn observe(&mut self, added: &[ElementRef]) -> bool {
        for el in added {
            self.buffer.push(BufferedChange {
                path: crate::dom::stable_css_path(el),
                class: classify(el),
            });
        }

        match self.last_flush {
            None => true,
            Some(last) => last.elapsed() >= self.config.debounce,
        }
    }

    /// Scores the current buffer and, if it meets a notification
    /// threshold (≥5 new elements, ≥3 new images, or significance ≥0.3),
    /// invokes every callback with the buffered changes and score, then
    /// clears the buffer. Always marks the flush instant, win or lose, so
    /// the debounce window restarts either way.
    pub fn flush(&mut self) -> Option<f64> {
        self.last_flush = Some(Instant::now());

        let changes: Vec<BufferedChange> = self.buffer.iter().cloned().collect();
        if changes.is_empty() {
            return None;
        }

        let significance = significance_score(&changes, self.config.buffer_capacity);
        let image_count = changes.iter().filter(|c| c.class == ElementClass::Image).count();

        let notify = changes.len() >= MIN_NEW_ELEMENTS
            || image_count >= MIN_NEW_IMAGES
            || significance >= MIN_SIGNIFICANCE;

        if notify {
            for callback in &self.callbacks {
                // A panicking callback must not take the others down with
                // it (§4.K).
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    callback(&changes, significance);
                }));
            }
            self.buffer.clear();
            Some(significance)
        } else {
            None
        }
    }
}

/// Heuristic class/child checks: image tag, product-like class/price
/// child, gallery-like class, anchor, or plain text fallback.
fn classify(el: &ElementRef) -> ElementClass {
    let tag = el.value().name();
    let class_attr = el.value().attr("class").unwrap_or("").to_ascii_lowercase();

    if tag == "img" {
        return ElementClass::Image;
    }
    if class_attr.contains("product") || class_attr.contains("price") {
        return ElementClass::Product;
    }
    if ["gallery", "carousel", "masonry", "lightbox"]
        .iter()
        .any(|needle| class_attr.contains(needle))
    {
        return ElementClass::Gallery;
    }
    if tag == "a" {
        return ElementClass::Link;
    }
    ElementClass::Text
}

/// Weighted sum over the buffered classes, normalized to `[0, 1]` against
/// the buffer's own capacity rather than the batch size: a couple of plain
/// paragraphs should not already read as "significant" just because text
/// carries a nonzero weight — it takes a batch approaching the buffer's
/// capacity, or a batch weighted toward high-value classes, to cross the
/// threshold on its own (the absolute-count thresholds in [`DomObserver::flush`]
/// catch everything else).
fn significance_score(changes: &[BufferedChange], buffer_capacity: usize) -> f64 {
    if changes.is_empty() {
        return 0.0;
    }
    let max_weight = [W_IMAGE, W_PRODUCT, W_GALLERY, W_LINK, W_TEXT]
        .iter()
        .cloned()
        .fold(0.0_f64, f64::max);

    let total: f64 = changes
        .iter()
        .map(|c| match c.class {
            ElementClass::Image => W_IMAGE,
            ElementClass::Product => W_PRODUCT,
            ElementClass::Gallery => W_GALLERY,
            ElementClass::Link => W_LINK,
            ElementClass::Text => W_TEXT,
        })
        .sum();

    (total / (buffer_capacity.max(1) as f64 * max_weight)).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use scraper::Selector;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn elements(html: &str) -> Document {
        Document::parse(
            &format!("<html><body>{html}</body></html>"),
            url::Url::parse("https://example.test/").unwrap(),
        )
    }

    #[test]
    fn five_new_elements_triggers_notification() {
        let doc = elements("<p>a</p><p>b</p><p>c</p><p>d</p><p>e</p>");
        let selector = Selector::parse("p").unwrap();
        let added: Vec<_> = doc.select(&selector).collect();

        let mut observer = DomObserver::new(ObserverConfig::default());
        let notified = Arc::new(AtomicUsize::new(0));
        let c = notified.clone();
        observer.register_callback(Box::new(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        observer.observe(&added);
        let score = observer.flush();
        assert!(score.is_some());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(observer.buffered_len(), 0);
    }

    #[test]
    fn three_new_images_triggers_notification_below_element_threshold() {
        let doc = elements(r#"<img src="/a.jpg"><img src="/b.jpg"><img src="/c.jpg">"#);
        let selector = Selector::parse("img").unwrap();
        let added: Vec<_> = doc.select(&selector).collect();

        let mut observer = DomObserver::new(ObserverConfig::default());
        observer.observe(&added);
        assert!(observer.flush().is_some());
    }

    #[test]
    fn two_plain_paragraphs_do_not_notify() {
        let doc = elements("<p>a</p><p>b</p>");
        let selector = Selector::parse("p").unwrap();
        let added: Vec<_> = doc.select(&selector).collect();

        let mut observer = DomObserver::new(ObserverConfig::default());
        observer.observe(&added);
        assert!(observer.flush().is_none());
        assert_eq!(observer.buffered_len(), 2);
    }

    #[test]
    fn one_failing_callback_does_not_prevent_others_from_running() {
        let doc = elements(r#"<img src="/a.jpg"><img src="/b.jpg"><img src="/c.jpg">"#);
        let selector = Selector::parse("img").unwrap();
        let added: Vec<_> = doc.select(&selector).collect();

        let mut observer = DomObserver::new(ObserverConfig::default());
        observer.register_callback(Box::new(|_, _| panic!("boom")));
        let notified = Arc::new(AtomicUsize::new(0));
        let c = notified.clone();
        observer.register_callback(Box::new(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        observer.observe(&added);
        observer.flush();
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn classifies_gallery_class_elements() {
        let doc = elements(r#"<div class="gallery-item">x</div>"#);
        let selector = Selector::parse("div").unwrap();
        let el = doc.select(&selector).next().unwrap();
        assert_eq!(classify(&el), ElementClass::Gallery);
    }
}
