//! Travel calendar extraction
//!
//! The calendar page is a flat run of `<h3>` month headings, each followed by
//! paragraphs describing where to travel that month. A short introduction
//! precedes the first heading.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{element_text, resolve_href};
use crate::error::{ScrapeError, ScrapeResult};

/// Locative month names ("в январе") marking teaser paragraphs in the intro
const MONTH_MARKERS: &[&str] = &[
    "январе", "феврале", "марте", "апреле", "мае", "июне", "июле", "августе", "сентябре",
    "октябре", "ноябре", "декабре",
];

/// Where the calendar lives on the page and how its links resolve
#[derive(Debug, Clone)]
pub struct CalendarRule {
    pub container_source: String,
    container: Selector,
    pub origin: Url,
}

impl CalendarRule {
    pub fn new(container: &str, origin: &str) -> ScrapeResult<Self> {
        let selector = Selector::parse(container).map_err(|e| {
            ScrapeError::Config(format!("invalid container selector '{}': {}", container, e))
        })?;
        let origin = Url::parse(origin)
            .map_err(|e| ScrapeError::Config(format!("invalid origin '{}': {}", origin, e)))?;

        Ok(Self {
            container_source: container.to_string(),
            container: selector,
            origin,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarLink {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRecommendation {
    pub month: String,
    pub description: String,
    pub links: Vec<CalendarLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarResult {
    pub title: String,
    pub description: Vec<String>,
    pub monthly_recommendations: Vec<MonthlyRecommendation>,
}

/// Month section being accumulated
struct OpenMonth {
    month: String,
    paragraphs: Vec<String>,
    links: Vec<CalendarLink>,
}

impl OpenMonth {
    fn new(month: String) -> Self {
        Self {
            month,
            paragraphs: Vec::new(),
            links: Vec::new(),
        }
    }

    fn close(self) -> MonthlyRecommendation {
        MonthlyRecommendation {
            month: self.month,
            description: self.paragraphs.join(" "),
            links: self.links,
        }
    }
}

enum MonthState {
    NoMonthOpen,
    MonthOpen(OpenMonth),
}

fn mentions_month(text: &str) -> bool {
    let lower = text.to_lowercase();
    MONTH_MARKERS.iter().any(|m| lower.contains(m))
}

fn paragraph_links(paragraph: &ElementRef<'_>, origin: &Url) -> Vec<CalendarLink> {
    paragraph
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .filter_map(|a| {
            let href = a.value().attr("href").filter(|h| !h.trim().is_empty())?;
            Some(CalendarLink {
                text: element_text(&a),
                url: resolve_href(origin, href),
            })
        })
        .collect()
}

/// Intro paragraphs: direct `<p>` children before the first direct `<h3>`
fn intro_paragraphs(container: &ElementRef<'_>) -> Vec<String> {
    let mut description = Vec::new();

    for child in container.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "h3" => break,
            "p" => {
                let text = element_text(&child);
                if !text.is_empty() && !mentions_month(&text) {
                    description.push(text);
                }
            }
            _ => {}
        }
    }

    description
}

/// Extract the structured calendar from rendered markup.
///
/// Each `<h3>` opens a month; the paragraphs after it (up to the next `<h3>`)
/// form its description and contribute their anchors as links.
pub fn extract_calendar(html: &str, rule: &CalendarRule) -> ScrapeResult<CalendarResult> {
    let document = Html::parse_document(html);
    let container = document
        .select(&rule.container)
        .next()
        .ok_or_else(|| {
            debug!("No element matches calendar container {}", rule.container_source);
            ScrapeError::ContentSectionMissing
        })?;

    let title = container
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "h1")
        .map(|h1| element_text(&h1))
        .unwrap_or_default();

    let description = intro_paragraphs(&container);

    let mut monthly_recommendations = Vec::new();
    let mut state = MonthState::NoMonthOpen;

    for element in container.descendants().skip(1).filter_map(ElementRef::wrap) {
        match element.value().name() {
            "h3" => {
                let heading = element_text(&element);
                // a blank heading closes the open month without starting one
                let next = if heading.is_empty() {
                    MonthState::NoMonthOpen
                } else {
                    MonthState::MonthOpen(OpenMonth::new(heading))
                };
                if let MonthState::MonthOpen(done) = std::mem::replace(&mut state, next) {
                    monthly_recommendations.push(done.close());
                }
            }
            "p" => {
                let MonthState::MonthOpen(open) = &mut state else {
                    continue;
                };
                let text = element_text(&element);
                if text.is_empty() {
                    continue;
                }
                open.paragraphs.push(text);
                open.links.extend(paragraph_links(&element, &rule.origin));
            }
            _ => {}
        }
    }

    if let MonthState::MonthOpen(last) = state {
        monthly_recommendations.push(last.close());
    }

    Ok(CalendarResult {
        title,
        description,
        monthly_recommendations,
    })
}
