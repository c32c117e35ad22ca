//! Record Extraction
//!
//! Deterministic parsing of rendered markup into stable JSON records:
//! - Selector-driven content + link records (news, tour listings)
//! - Heading-sectioned travel calendar
//!
//! Parsing is tolerant: a missing anchor becomes `null`, a node without text
//! is dropped. Only a missing calendar container is reported as an error.

pub mod calendar;
pub mod records;

pub use calendar::{extract_calendar, CalendarLink, CalendarResult, CalendarRule, MonthlyRecommendation};
pub use records::{extract, ExtractionResult, ExtractionRule, Record};

use scraper::{ElementRef, Node};
use serde::Serialize;
use url::Url;

/// Elements whose text never counts as visible content
const SKIPPED_TEXT_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Visible text of an element: every descendant text fragment trimmed and
/// concatenated without separator, empty fragments skipped.
pub fn element_text(element: &ElementRef<'_>) -> String {
    let mut out = String::new();

    for node in element.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| SKIPPED_TEXT_PARENTS.contains(&parent.value().name()))
            .unwrap_or(false);
        if hidden {
            continue;
        }

        let fragment = text.trim();
        if !fragment.is_empty() {
            out.push_str(fragment);
        }
    }

    out
}

/// First `<a>` strictly below `element`, in document order
pub fn first_anchor<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
}

/// Rewrite root-relative links against `origin`.
///
/// `/path` is appended to the origin verbatim (no percent-encoding, no
/// dot-segment collapsing). `//host/path` takes the origin's scheme.
/// Anything else (absolute URLs, fragments, page-relative paths) is passed
/// through unchanged, so resolving twice yields the same URL.
pub fn resolve_href(origin: &Url, href: &str) -> String {
    if href.starts_with("//") {
        return format!("{}:{}", origin.scheme(), href);
    }
    if !href.starts_with('/') {
        return href.to_string();
    }

    format!("{}{}", origin.as_str().trim_end_matches('/'), href)
}

/// Serialize as UTF-8 JSON, 4-space indented, non-ASCII kept literal
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);

    match value.serialize(&mut ser) {
        // serde_json only emits valid UTF-8
        Ok(()) => String::from_utf8(buf).unwrap_or_default(),
        Err(e) => format!("{{\n    \"error\": \"{}\"\n}}", e),
    }
}

/// `{"error": message}` payload returned as regular tool output
pub fn error_payload(message: impl Into<String>) -> String {
    to_pretty_json(&serde_json::json!({ "error": message.into() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn origin() -> Url {
        Url::parse("https://ht.kz").unwrap()
    }

    #[test]
    fn test_resolve_root_relative() {
        assert_eq!(resolve_href(&origin(), "/tours/1"), "https://ht.kz/tours/1");
    }

    #[test]
    fn test_resolve_absolute_is_idempotent() {
        let once = resolve_href(&origin(), "/tours/1?x=2");
        let twice = resolve_href(&origin(), &once);
        assert_eq!(once, twice);
        assert_eq!(
            resolve_href(&origin(), "https://other.kz/a"),
            "https://other.kz/a"
        );
    }

    #[test]
    fn test_resolve_protocol_relative() {
        assert_eq!(
            resolve_href(&origin(), "//cdn.ht.kz/img.png"),
            "https://cdn.ht.kz/img.png"
        );
    }

    #[test]
    fn test_resolve_keeps_path_verbatim() {
        let origin = Url::parse("https://okeanturov.ru").unwrap();
        assert_eq!(
            resolve_href(&origin, "/страны/таиланд/"),
            "https://okeanturov.ru/страны/таиланд/"
        );
        assert_eq!(
            resolve_href(&origin, "/a/../b c"),
            "https://okeanturov.ru/a/../b c"
        );
    }

    #[test]
    fn test_page_relative_untouched() {
        assert_eq!(resolve_href(&origin(), "tour.html"), "tour.html");
    }

    #[test]
    fn test_element_text_strips_fragments() {
        let doc = Html::parse_fragment(
            "<div id=\"x\">  <b>Вьетнам</b>\n  от 250 000 ₸ <script>var a = 1;</script></div>",
        );
        let sel = Selector::parse("#x").unwrap();
        let el = doc.select(&sel).next().unwrap();
        assert_eq!(element_text(&el), "Вьетнамот 250 000 ₸");
    }

    #[test]
    fn test_first_anchor_in_document_order() {
        let doc = Html::parse_fragment(
            "<div class=\"x\"><p><a href=\"/a\">1</a></p><a href=\"/b\">2</a></div>",
        );
        let sel = Selector::parse(".x").unwrap();
        let el = doc.select(&sel).next().unwrap();
        let href = first_anchor(&el).and_then(|a| a.value().attr("href"));
        assert_eq!(href, Some("/a"));
    }

    #[test]
    fn test_first_anchor_skips_self() {
        let doc = Html::parse_fragment("<a class=\"x\" href=\"/self\">only text</a>");
        let sel = Selector::parse("a.x").unwrap();
        let el = doc.select(&sel).next().unwrap();
        assert!(first_anchor(&el).is_none());
    }

    #[test]
    fn test_pretty_json_keeps_cyrillic() {
        let json = to_pretty_json(&serde_json::json!({ "title": "Туры" }));
        assert!(json.contains("Туры"));
        assert!(json.contains("\n    \"title\""));
    }

    #[test]
    fn test_error_payload() {
        let payload: serde_json::Value =
            serde_json::from_str(&error_payload("Content div not found")).unwrap();
        assert_eq!(payload["error"], "Content div not found");
    }
}
