//! Table detector (component G): scores candidate containers for
//! "dominant tabular structure" and extracts normalized header/data rows.

use crate::dom::{self, Document};
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

const MIN_CHILDREN: usize = 3;
const DEFAULT_TOP_N: usize = 5;
const EXCLUDED_TAGS: &[&str] = &["script", "img", "meta", "style"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub container_path: String,
    pub good_classes: Vec<String>,
    pub children: usize,
    pub area: f64,
    pub score: f64,
    pub confidence: f64,
    pub headers: Vec<String>,
    pub data_rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    pub top_n: usize,
    /// Resolves the **open question** from §9: with visual highlighting
    /// disabled, `try_another` still cycles the cursor but does not flip
    /// `highlighted` — both behaviors are reachable, gated by this flag.
    pub visual_highlighting_enabled: bool,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            visual_highlighting_enabled: true,
        }
    }
}

pub struct TableDetector {
    config: TableDetectorConfig,
    tables: Vec<Table>,
    current_index: Option<usize>,
    highlighted: bool,
}

impl TableDetector {
    pub fn new(config: TableDetectorConfig) -> Self {
        Self {
            config,
            tables: Vec::new(),
            current_index: None,
            highlighted: false,
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// `area_of` supplies a container's rendered area in CSS pixels — a
    /// static HTML parse has no layout engine behind it, so callers (the
    /// in-page host, in production) provide the oracle; tests supply a
    /// fixed map.
    pub fn detect(&mut self, doc: &Document, area_of: &dyn Fn(&ElementRef) -> f64, body_area: f64) {
        let mut scored: Vec<Table> = Vec::new();

        for container in candidate_containers(doc) {
            let children = data_children(&container);
            if children.len() < MIN_CHILDREN {
                continue;
            }

            let good_classes = good_classes(&children);
            let pattern_strength = if good_classes.is_empty() {
                0.0
            } else {
                let matching = children
                    .iter()
                    .filter(|c| class_list(c).iter().any(|cl| good_classes.contains(cl)))
                    .count();
                matching as f64 / children.len() as f64
            };

            let area = area_of(&container);
            let score = area * (children.len() as f64).powi(2);

            let area_ratio = if body_area > 0.0 { area / body_area } else { 0.0 };
            let area_bonus = if area_ratio > 0.05 && area_ratio < 0.70 { 0.1 } else { 0.0 };

            let confidence = 0.4
                + (0.015 * children.len() as f64).min(0.25)
                + pattern_strength * 0.2
                + (0.03 * good_classes.len() as f64).min(0.15)
                + area_bonus;

            let (headers, data_rows) = extract_rows(&children);

            scored.push(Table {
                container_path: dom::stable_css_path(&container),
                good_classes,
                children: children.len(),
                area,
                score,
                confidence: confidence.min(1.0),
                headers,
                data_rows,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.top_n);
        self.tables = scored;
        self.current_index = None;
        self.highlighted = false;
    }

    /// Cycles through the top-N tables. Returns `None` when there is no
    /// other table to cycle to.
    pub fn try_another(&mut self) -> TryAnotherOutcome {
        if self.tables.len() <= 1 {
            return TryAnotherOutcome {
                table: self.tables.first().cloned(),
                highlighted: self.highlighted,
            };
        }

        let next = match self.current_index {
            None => 0,
            Some(i) => (i + 1) % self.tables.len(),
        };
        self.current_index = Some(next);

        if self.config.visual_highlighting_enabled {
            self.highlighted = true;
        }

        TryAnotherOutcome {
            table: self.tables.get(next).cloned(),
            highlighted: self.highlighted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TryAnotherOutcome {
    pub table: Option<Table>,
    pub highlighted: bool,
}

fn semantic_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("main, section, article, div, ul, ol, table, tbody").unwrap())
}

fn candidate_containers(doc: &Document) -> Vec<ElementRef<'_>> {
    doc.select(semantic_selector()).collect()
}

fn is_excluded(el: &ElementRef) -> bool {
    EXCLUDED_TAGS.contains(&el.value().name())
}

fn data_children<'a>(container: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| !is_excluded(c))
        .collect()
}

fn class_list(el: &ElementRef) -> Vec<String> {
    el.value()
        .attr("class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// A "good class" appears in at least `ceil(children/2) - 2` children.
/// Falls back to individual-class frequency if no multi-class pattern
/// reaches the threshold (both paths converge to the same frequency
/// count here since we count per-class occurrence regardless of how many
/// other classes share the element).
fn good_classes(children: &[ElementRef]) -> Vec<String> {
    let n = children.len();
    let threshold = ((n as f64 / 2.0).ceil() as i64 - 2).max(1) as usize;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for child in children {
        for class in class_list(child) {
            *counts.entry(class).or_insert(0) += 1;
        }
    }

    let mut good: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .map(|(class, _)| class)
        .collect();
    good.sort();
    good
}

fn cells_of<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let children: Vec<_> = row.children().filter_map(ElementRef::wrap).collect();
    if children.is_empty() {
        vec![*row]
    } else {
        children
    }
}

fn row_is_header(row_cells: &[ElementRef]) -> bool {
    if row_cells.iter().any(|c| c.value().name() == "th") {
        return true;
    }
    row_cells
        .iter()
        .all(|c| !c.text().collect::<String>().trim().is_empty())
}

fn extract_rows(children: &[ElementRef]) -> (Vec<String>, Vec<Vec<String>>) {
    if children.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let first_cells = cells_of(&children[0]);
    let treat_first_as_header = first_cells.len() > 1 && row_is_header(&first_cells);

    let (header_row, data_start) = if treat_first_as_header {
        (
            first_cells
                .iter()
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect(),
            1,
        )
    } else {
        (Vec::new(), 0)
    };

    let data_rows = children[data_start..]
        .iter()
        .map(|row| {
            cells_of(row)
                .iter()
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect()
        })
        .collect();

    (header_row, data_rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_of_rows_yields_one_table_with_no_header() {
        let html = (0..8).map(|_| "<div class=\"row\">item</div>").collect::<String>();
        let doc = Document::parse(
            &format!(r#"<html><body><div class="list">{html}</div></body></html>"#),
            url::Url::parse("https://example.test/").unwrap(),
        );
        let mut detector = TableDetector::new(TableDetectorConfig::default());
        detector.detect(&doc, &|_| 1_000_000.0, 1_000_000.0);

        assert_eq!(detector.tables().len(), 1);
        let table = &detector.tables()[0];
        assert!(table.headers.is_empty());
        assert_eq!(table.data_rows.len(), 8);
        assert!(table.confidence >= 0.6);
    }

    #[test]
    fn header_row_detected_when_th_present() {
        let doc = Document::parse(
            r#"<html><body><table>
                <tr><th>Name</th><th>Price</th></tr>
                <tr><td>Widget</td><td>5</td></tr>
                <tr><td>Gadget</td><td>7</td></tr>
                <tr><td>Gizmo</td><td>9</td></tr>
            </table></body></html>"#,
            url::Url::parse("https://example.test/").unwrap(),
        );
        let mut detector = TableDetector::new(TableDetectorConfig::default());
        detector.detect(&doc, &|_| 5000.0, 100_000.0);

        let table = detector
            .tables()
            .iter()
            .find(|t| !t.headers.is_empty())
            .expect("expected a table with headers");
        assert_eq!(table.headers, vec!["Name", "Price"]);
        assert_eq!(table.data_rows.len(), 3);
    }

    #[test]
    fn try_another_on_single_table_returns_same_table() {
        let html = (0..4).map(|_| "<div class=\"row\">x</div>").collect::<String>();
        let doc = Document::parse(
            &format!(r#"<html><body><div class="list">{html}</div></body></html>"#),
            url::Url::parse("https://example.test/").unwrap(),
        );
        let mut detector = TableDetector::new(TableDetectorConfig::default());
        detector.detect(&doc, &|_| 10.0, 1_000_000.0);
        let outcome = detector.try_another();
        assert!(outcome.table.is_some());
    }

    #[test]
    fn try_another_without_highlighting_does_not_set_highlighted() {
        let config = TableDetectorConfig {
            visual_highlighting_enabled: false,
            ..Default::default()
        };
        let mut detector = TableDetector::new(config);
        detector.tables = vec![
            Table {
                container_path: "a".into(),
                good_classes: vec![],
                children: 4,
                area: 1.0,
                score: 1.0,
                confidence: 0.7,
                headers: vec![],
                data_rows: vec![],
            },
            Table {
                container_path: "b".into(),
                good_classes: vec![],
                children: 4,
                area: 1.0,
                score: 1.0,
                confidence: 0.6,
                headers: vec![],
                data_rows: vec![],
            },
        ];
        let outcome = detector.try_another();
        assert!(!outcome.highlighted);
    }
}
