//! Selector-driven record extraction
//!
//! Every element matching any rule selector becomes one content + link record.

use scraper::{ElementRef, Html, Selector};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{element_text, first_anchor, resolve_href, to_pretty_json};
use crate::error::{ScrapeError, ScrapeResult};

/// One compiled selector, kept with its source text for diagnostics
#[derive(Debug, Clone)]
pub struct RuleSelector {
    pub source: String,
    selector: Selector,
}

/// Which DOM nodes qualify as a record, and the origin their links resolve against
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub selectors: Vec<RuleSelector>,
    pub origin: Url,
}

impl ExtractionRule {
    /// Compile CSS selectors; fails on the first invalid one
    pub fn new<S: AsRef<str>>(selectors: &[S], origin: &str) -> ScrapeResult<Self> {
        if selectors.is_empty() {
            return Err(ScrapeError::Config("extraction rule has no selectors".to_string()));
        }

        let origin = Url::parse(origin)
            .map_err(|e| ScrapeError::Config(format!("invalid origin '{}': {}", origin, e)))?;

        let selectors = selectors
            .iter()
            .map(|s| {
                let source = s.as_ref().trim().to_string();
                Selector::parse(&source)
                    .map(|selector| RuleSelector {
                        source: source.clone(),
                        selector,
                    })
                    .map_err(|e| {
                        ScrapeError::Config(format!("invalid selector '{}': {}", source, e))
                    })
            })
            .collect::<ScrapeResult<Vec<_>>>()?;

        Ok(Self { selectors, origin })
    }

    /// Selector sources joined for diagnostics
    pub fn selector_list(&self) -> String {
        self.selectors
            .iter()
            .map(|s| s.source.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Number of rule selectors `element` satisfies
    fn match_count(&self, element: &ElementRef<'_>) -> usize {
        self.selectors
            .iter()
            .filter(|s| s.selector.matches(element))
            .count()
    }
}

/// One extracted content + link pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub content: String,
    #[serde(rename = "urls")]
    pub url: Option<String>,
}

/// Extracted records in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub items: Vec<Record>,
}

impl ExtractionResult {
    pub fn total_count(&self) -> usize {
        self.items.len()
    }

    /// `{"<key>": [...], "total_count": n}` as pretty JSON
    pub fn to_json(&self, key: &str) -> String {
        to_pretty_json(&KeyedResult { key, result: self })
    }
}

struct KeyedResult<'a> {
    key: &'a str,
    result: &'a ExtractionResult,
}

impl Serialize for KeyedResult<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.key, &self.result.items)?;
        map.serialize_entry("total_count", &self.result.total_count())?;
        map.end()
    }
}

/// Extract records from rendered markup.
///
/// Elements are visited once in document order; an element matching several
/// selectors is emitted once per matching selector (no deduplication).
pub fn extract(html: &str, rule: &ExtractionRule) -> ExtractionResult {
    let document = Html::parse_document(html);
    let mut items = Vec::new();
    let mut dropped = 0usize;

    for element in document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
    {
        let matches = rule.match_count(&element);
        if matches == 0 {
            continue;
        }

        let content = element_text(&element);
        if content.is_empty() {
            dropped += matches;
            continue;
        }

        let url = first_anchor(&element)
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_href(&rule.origin, href));

        for _ in 0..matches {
            items.push(Record {
                content: content.clone(),
                url: url.clone(),
            });
        }
    }

    debug!(
        "Extracted {} records for [{}] ({} empty nodes dropped)",
        items.len(),
        rule.selector_list(),
        dropped
    );

    ExtractionResult { items }
}
