//! A thin wrapper around `scraper` giving detectors the handful of
//! document-level operations they all need: base-URL resolution, attribute
//! lookup with a fallback chain, inline "computed style" access, and
//! declarative-shadow-DOM traversal.
//!
//! There is no live browser behind this library, so `computed style` reduces
//! to the element's own `style` attribute (pseudo-element backgrounds are
//! read the same way from markup such as `<style>.x::before{background...}`
//! is out of scope — only inline styles are addressable without a CSS
//! cascade engine, which matches how far a static-HTML extractor can go).

use scraper::{ElementRef, Html, Selector};

/// A parsed page plus the base URL that relative references resolve
/// against (the document's own URL, or an injected `<base href>`), and the
/// original markup — kept around because html5ever's parser resolves
/// declarative shadow DOM itself, destructively, leaving no trace in the
/// parsed tree (see [`declarative_shadow_roots`]).
pub struct Document {
    pub html: Html,
    pub base: url::Url,
    source: String,
}

impl Document {
    pub fn parse(body: &str, document_url: url::Url) -> Self {
        let html = Html::parse_document(body);
        let base = base_href(&html).unwrap_or(document_url);
        Self {
            html,
            base,
            source: body.to_string(),
        }
    }

    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> {
        self.html.select(selector)
    }

    pub fn root_element(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// Count of elements in the whole tree, used to decide node-cap halving
    /// (component D: "halved on pages >15k elements").
    pub fn element_count(&self) -> usize {
        self.html.tree.values().filter(|n| n.as_element().is_some()).count()
    }

    fn select_by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.html.select(&Selector::parse(&format!("#{}", css_escape_ident(id))).ok()?).next()
    }
}

/// Minimal CSS identifier escaping for building an `#id` selector out of an
/// attribute value that may contain characters not valid in a bare CSS
/// identifier.
fn css_escape_ident(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

fn base_href(html: &Html) -> Option<url::Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = html.select(&selector).next()?.value().attr("href")?;
    url::Url::parse(href).ok()
}

/// First non-empty attribute among a fallback chain, in order.
pub fn first_attr<'a>(el: &ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| el.value().attr(name))
        .filter(|v| !v.is_empty())
}

/// Parses `background-image: url(...)` (one or more occurrences) out of an
/// inline `style` attribute.
pub fn background_image_urls(style: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = style;
    while let Some(idx) = rest.find("url(") {
        rest = &rest[idx + 4..];
        if let Some(end) = rest.find(')') {
            let raw = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
            if !raw.is_empty() {
                out.push(raw.to_string());
            }
            rest = &rest[end + 1..];
        } else {
            break;
        }
    }
    out
}

/// A stable CSS path for an element: `tag:nth-of-type(n)` chained from the
/// document root down to (and including) the element. Stands in for a weak
/// DOM back-reference — recomputed on demand rather than cached against a
/// live node, so it survives document mutation.
pub fn stable_css_path(el: &ElementRef) -> String {
    let mut segments = Vec::new();
    let mut current = Some(*el);

    while let Some(node) = current {
        let tag = node.value().name().to_string();
        let index = node
            .prev_siblings()
            .filter_map(|n| n.value().as_element())
            .filter(|e| e.name() == tag)
            .count()
            + 1;
        segments.push(format!("{tag}:nth-of-type({index})"));
        current = node.parent().and_then(ElementRef::wrap);
    }

    segments.reverse();
    segments.join(" > ")
}

/// Count of elements matching `tag` among an element's siblings (used by
/// the sibling-context analysis in Standard IMG filtering and the smart
/// selector).
pub fn similar_sibling_count(el: &ElementRef) -> usize {
    let tag = el.value().name();
    el.prev_siblings()
        .filter_map(|n| n.value().as_element())
        .chain(el.next_siblings().filter_map(|n| n.value().as_element()))
        .filter(|e| e.name() == tag)
        .count()
}

/// Parent and grandparent `class` attributes, concatenated with a space so
/// a single `.contains(needle)` check covers both levels (used by the
/// contextual-cues scoring in `pattern::ScoringContext::gallery_context`,
/// since gallery/carousel wrappers are usually one or two levels up from
/// the media element itself, not on the element).
pub fn ancestor_classes(el: &ElementRef) -> Option<String> {
    let parent = el.parent().and_then(ElementRef::wrap);
    let grandparent = parent.and_then(|p| p.parent()).and_then(ElementRef::wrap);

    let classes: Vec<&str> = [parent, grandparent]
        .into_iter()
        .flatten()
        .filter_map(|e| e.value().attr("class"))
        .collect();

    if classes.is_empty() {
        None
    } else {
        Some(classes.join(" "))
    }
}

/// Whether the element or either of its two nearest ancestors carries a
/// `data-gallery`, `data-lightbox`, or `data-fancybox` attribute.
pub fn has_gallery_attribute(el: &ElementRef) -> bool {
    const GALLERY_ATTRS: &[&str] = &["data-gallery", "data-lightbox", "data-fancybox"];

    let parent = el.parent().and_then(ElementRef::wrap);
    let grandparent = parent.and_then(|p| p.parent()).and_then(ElementRef::wrap);

    [Some(*el), parent, grandparent]
        .into_iter()
        .flatten()
        .any(|e| GALLERY_ATTRS.iter().any(|attr| e.value().attr(attr).is_some()))
}

/// Finds the host elements of `<template shadowrootmode="...">` shadow
/// roots: the declarative form is the only shadow tree a static HTML parse
/// can observe, since there is no live browser attaching closed or
/// imperative roots.
///
/// html5ever implements the declarative shadow DOM algorithm at parse
/// time: a `<template shadowrootmode>` is spliced into its host as plain
/// children and the `<template>` wrapper itself is discarded, so by the
/// time a [`Document`] exists there is no tree node left to select on.
/// This scans the original markup for the pattern instead and resolves
/// each host by its `id`.
pub fn declarative_shadow_roots(doc: &Document) -> Vec<ElementRef<'_>> {
    static HOST_RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let host_re = HOST_RE.get_or_init(|| {
        regex::Regex::new(
            r#"<\w+[^>]*\bid\s*=\s*["']([^"']+)["'][^>]*>\s*<template[^>]*\bshadowrootmode\s*=\s*["'](?:open|closed)["']"#,
        )
        .unwrap()
    });

    host_re
        .captures_iter(&doc.source)
        .filter_map(|cap| doc.select_by_id(&cap[1]))
        .collect()
}
