//! Extract crawl evidence from one page of raw HTML.
//!
//! Parses internal links, booking-intent candidates, asset references,
//! JSON-LD blocks and visible text with the `scraper` crate. No JavaScript
//! is executed. The functions here are synchronous: `scraper` types are
//! `!Send`, so nothing from this module is held across an `.await`.

use crate::config::{MAX_BOOKING_CANDIDATES, MAX_INTERNAL_LINKS};
use crate::error::ParseError;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Tokens that show intent to transact rather than browse. Candidates
/// matching these are ordered ahead of the rest. Matched as whole tokens,
/// so `reserved` and `bookmark` do not count.
pub const STRONG_BOOKING_TOKENS: &[&str] = &[
    "book",
    "books",
    "booking",
    "bookings",
    "booknow",
    "bookonline",
    "reserve",
    "reservation",
    "reservations",
    "availability",
];

/// Tokens that mark a link as a possible way into the booking flow.
pub const WEAK_BOOKING_TOKENS: &[&str] = &["rooms", "rates", "offers"];

const MAX_ASSET_REFERENCES: usize = 400;

/// Link targets that are never pages.
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".zip", ".mp4", ".mp3", ".ics",
    ".doc", ".docx",
];

/// Tag/attribute pairs scanned for asset references.
const ASSET_SOURCES: &[(&str, &str)] = &[
    ("script[src]", "src"),
    ("iframe[src]", "src"),
    ("img[src]", "src"),
    ("a[href]", "href"),
    ("link[href]", "href"),
    ("form[action]", "action"),
];

/// Everything extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPage {
    /// Absolute same-host page links, deduped in document order.
    pub internal_links: Vec<String>,
    /// Absolute booking-intent URLs, strongest intent first.
    pub booking_candidates: Vec<String>,
    pub asset_references: Vec<AssetReference>,
    /// JSON-LD objects (`@graph` and top-level arrays flattened).
    pub structured_data: Vec<Value>,
    /// Whitespace-collapsed text outside script/style.
    pub visible_text: String,
}

/// A resource referenced by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
    pub url: String,
    pub origin: String,
    pub host: String,
    /// Tag the reference came from (`script`, `iframe`, ...).
    pub tag: String,
}

/// Parse a page, degrading to an empty result on failure.
pub fn parse_page(html: &str, base_url: &str) -> ParsedPage {
    try_parse_page(html, base_url).unwrap_or_default()
}

/// Parse a page, reporting why it could not be parsed.
pub fn try_parse_page(html: &str, base_url: &str) -> Result<ParsedPage, ParseError> {
    let base = Url::parse(base_url).map_err(|_| ParseError::BaseUrl(base_url.to_string()))?;
    let document = Html::parse_document(html);

    Ok(ParsedPage {
        internal_links: extract_internal_links(&document, &base)?,
        booking_candidates: extract_booking_candidates(&document, &base)?,
        asset_references: extract_asset_references(&document, &base)?,
        structured_data: extract_jsonld(&document)?,
        visible_text: extract_visible_text(&document),
    })
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

// ── URL helpers ─────────────────────────────────────────────────────────────

/// Resolve `href` against `base`, rejecting pseudo-schemes and fragment-only links.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["mailto:", "tel:", "javascript:", "data:", "sms:", "whatsapp:"]
        .iter()
        .any(|p| lower.starts_with(p))
    {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Host comparison that ignores a leading `www.`.
pub fn same_site(a: &str, b: &str) -> bool {
    let a = a.trim_start_matches("www.");
    let b = b.trim_start_matches("www.");
    a.eq_ignore_ascii_case(b)
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn tokens(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Strongest booking keyword tier matched by `text`: 2 strong, 1 weak, 0 none.
fn booking_intent(text: &str) -> u8 {
    let mut best = 0u8;
    for token in tokens(text) {
        if STRONG_BOOKING_TOKENS.contains(&token.as_str()) {
            return 2;
        }
        if WEAK_BOOKING_TOKENS.contains(&token.as_str()) {
            best = 1;
        }
    }
    best
}

/// The part of a URL worth scanning for intent: host (when third-party), path and query.
fn url_intent_text(url: &Url, base: &Url) -> String {
    let mut text = String::new();
    if let (Some(h), Some(bh)) = (url.host_str(), base.host_str()) {
        if !same_site(h, bh) {
            text.push_str(h);
            text.push(' ');
        }
    }
    text.push_str(url.path());
    if let Some(q) = url.query() {
        text.push(' ');
        text.push_str(q);
    }
    text
}

// ── Links ───────────────────────────────────────────────────────────────────

fn extract_internal_links(document: &Html, base: &Url) -> Result<Vec<String>, ParseError> {
    let sel = selector("a[href]")?;
    let base_host = base.host_str().unwrap_or("");
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&sel) {
        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_href(base, href))
        else {
            continue;
        };
        if !url.host_str().map(|h| same_site(h, base_host)).unwrap_or(false) {
            continue;
        }
        let path = url.path().to_ascii_lowercase();
        if SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            continue;
        }
        let s = url.to_string();
        if seen.insert(s.clone()) {
            links.push(s);
            if links.len() >= MAX_INTERNAL_LINKS {
                break;
            }
        }
    }
    Ok(links)
}

// ── Booking candidates ──────────────────────────────────────────────────────

fn extract_booking_candidates(document: &Html, base: &Url) -> Result<Vec<String>, ParseError> {
    // (tier, document order, url)
    let mut found: Vec<(u8, usize, String)> = Vec::new();
    let mut seen = HashSet::new();
    let mut order = 0usize;

    let mut consider = |url: Url, label: &str, found: &mut Vec<(u8, usize, String)>| {
        let tier = booking_intent(label).max(booking_intent(&url_intent_text(&url, base)));
        order += 1;
        if tier > 0 {
            let s = url.to_string();
            if seen.insert(s.clone()) {
                found.push((tier, order, s));
            }
        }
    };

    let anchors = selector("a[href]")?;
    for a in document.select(&anchors) {
        if let Some(url) = a.value().attr("href").and_then(|h| resolve_href(base, h)) {
            let mut label = element_text(&a);
            for attr in ["title", "aria-label"] {
                if let Some(v) = a.value().attr(attr) {
                    label.push(' ');
                    label.push_str(v);
                }
            }
            consider(url, &label, &mut found);
        }
    }

    let forms = selector("form[action]")?;
    for form in document.select(&forms) {
        if let Some(url) = form.value().attr("action").and_then(|h| resolve_href(base, h)) {
            let label = [form.value().attr("id"), form.value().attr("class"), form.value().attr("name")]
                .iter()
                .flatten()
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            consider(url, &label, &mut found);
        }
    }

    let iframes = selector("iframe[src]")?;
    for iframe in document.select(&iframes) {
        if let Some(url) = iframe.value().attr("src").and_then(|h| resolve_href(base, h)) {
            let label = iframe.value().attr("title").unwrap_or("").to_string();
            consider(url, &label, &mut found);
        }
    }

    found.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    Ok(found
        .into_iter()
        .take(MAX_BOOKING_CANDIDATES)
        .map(|(_, _, url)| url)
        .collect())
}

// ── Asset references ────────────────────────────────────────────────────────

fn extract_asset_references(document: &Html, base: &Url) -> Result<Vec<AssetReference>, ParseError> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for (css, attr) in ASSET_SOURCES {
        let sel = selector(css)?;
        for element in document.select(&sel) {
            let Some(url) = element.value().attr(attr).and_then(|v| resolve_href(base, v)) else {
                continue;
            };
            let Some(host) = url.host_str().map(|h| h.to_ascii_lowercase()) else {
                continue;
            };
            let s = url.to_string();
            if !seen.insert(s.clone()) {
                continue;
            }
            refs.push(AssetReference {
                origin: url.origin().ascii_serialization(),
                url: s,
                host,
                tag: element.value().name().to_string(),
            });
            if refs.len() >= MAX_ASSET_REFERENCES {
                return Ok(refs);
            }
        }
    }
    Ok(refs)
}

// ── JSON-LD ─────────────────────────────────────────────────────────────────

fn extract_jsonld(document: &Html) -> Result<Vec<Value>, ParseError> {
    let sel = selector(r#"script[type="application/ld+json"]"#)?;
    let mut out = Vec::new();
    for element in document.select(&sel) {
        let text = element.inner_html();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        // Malformed blocks are skipped.
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            flatten_jsonld(value, &mut out);
        }
    }
    Ok(out)
}

fn flatten_jsonld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_jsonld(item, out);
            }
        }
        Value::Object(mut map) => match map.remove("@graph") {
            Some(Value::Array(graph)) => {
                for item in graph {
                    flatten_jsonld(item, out);
                }
            }
            Some(other) => {
                map.insert("@graph".to_string(), other);
                out.push(Value::Object(map));
            }
            None => out.push(Value::Object(map)),
        },
        _ => {}
    }
}

// ── Visible text ────────────────────────────────────────────────────────────

fn extract_visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript" | "template"))
            .unwrap_or(false);
        if hidden {
            continue;
        }
        let t = text.trim();
        if !t.is_empty() {
            parts.push(t);
        }
    }
    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.grandhotel.test/";

    #[test]
    fn test_internal_links_same_host_only() {
        let html = r##"
            <a href="/rooms">Rooms</a>
            <a href="https://grandhotel.test/spa#top">Spa</a>
            <a href="https://other.test/x">Other</a>
            <a href="#main">Skip</a>
            <a href="mailto:hi@grandhotel.test">Mail</a>
            <a href="tel:+441234">Call</a>
            <a href="javascript:void(0)">JS</a>
            <a href="/rooms">Rooms again</a>
            <a href="/brochure.pdf">Brochure</a>
        "##;
        let page = parse_page(html, BASE);
        assert_eq!(
            page.internal_links,
            vec![
                "https://www.grandhotel.test/rooms".to_string(),
                "https://grandhotel.test/spa".to_string(),
            ]
        );
    }

    #[test]
    fn test_internal_links_capped() {
        let html: String = (0..40).map(|i| format!("<a href=\"/p{i}\">p</a>")).collect();
        let page = parse_page(&html, BASE);
        assert_eq!(page.internal_links.len(), MAX_INTERNAL_LINKS);
        assert_eq!(page.internal_links[0], "https://www.grandhotel.test/p0");
    }

    #[test]
    fn test_booking_candidates_strong_intent_first() {
        let html = r#"
            <a href="/our-rooms">Our Rooms</a>
            <a href="https://facebook.com/grandhotel">Facebook</a>
            <a href="/book-now">Book Now</a>
            <form action="https://reservations.synxis.com/rez.aspx"><input name="arrive"></form>
            <iframe src="https://widget.test/availability?hotel=1"></iframe>
        "#;
        let page = parse_page(html, BASE);
        assert_eq!(
            page.booking_candidates,
            vec![
                "https://www.grandhotel.test/book-now".to_string(),
                "https://reservations.synxis.com/rez.aspx".to_string(),
                "https://widget.test/availability?hotel=1".to_string(),
                "https://www.grandhotel.test/our-rooms".to_string(),
            ]
        );
    }

    #[test]
    fn test_booking_candidates_deduped_and_capped() {
        let html: String = (0..10)
            .map(|i| format!("<a href=\"/book?room={i}\">Book</a><a href=\"/book?room={i}\">Book</a>"))
            .collect();
        let page = parse_page(&html, BASE);
        assert_eq!(page.booking_candidates.len(), MAX_BOOKING_CANDIDATES);
        let unique: HashSet<_> = page.booking_candidates.iter().collect();
        assert_eq!(unique.len(), MAX_BOOKING_CANDIDATES);
    }

    #[test]
    fn test_booking_intent_ignores_substrings() {
        assert_eq!(booking_intent("facebook"), 0);
        assert_eq!(booking_intent("corporate"), 0);
        assert_eq!(booking_intent("Book your stay"), 2);
        assert_eq!(booking_intent("/reservations/step1"), 2);
        assert_eq!(booking_intent("Special Offers"), 1);
        assert_eq!(booking_intent("Bookings"), 2);
    }

    #[test]
    fn test_booking_intent_ignores_footer_words() {
        assert_eq!(booking_intent("© 2026 The Grand. All rights reserved."), 0);
        assert_eq!(booking_intent("Bookmark us"), 0);
        assert_eq!(booking_intent("Roomservice menu"), 0);
    }

    #[test]
    fn test_asset_references() {
        let html = r#"
            <script src="https://www.googletagmanager.com/gtm.js?id=GTM-X"></script>
            <script src="/local.js"></script>
            <link rel="stylesheet" href="https://fonts.googleapis.com/css">
            <img src="//cdn.hotel.test/a.png">
            <form action="https://be.synxis.com/"></form>
        "#;
        let page = parse_page(html, BASE);
        let hosts: Vec<&str> = page.asset_references.iter().map(|a| a.host.as_str()).collect();
        assert!(hosts.contains(&"www.googletagmanager.com"));
        assert!(hosts.contains(&"www.grandhotel.test"));
        assert!(hosts.contains(&"fonts.googleapis.com"));
        assert!(hosts.contains(&"cdn.hotel.test"));
        assert!(hosts.contains(&"be.synxis.com"));
        let gtm = &page.asset_references[0];
        assert_eq!(gtm.origin, "https://www.googletagmanager.com");
        assert_eq!(gtm.tag, "script");
    }

    #[test]
    fn test_jsonld_graph_flattened_and_malformed_skipped() {
        let html = r#"
            <script type="application/ld+json">{"@context":"https://schema.org","@graph":[{"@type":"Hotel","name":"Grand"},{"@type":"WebSite"}]}</script>
            <script type="application/ld+json">{ not json</script>
            <script type="application/ld+json">[{"@type":"Organization"}]</script>
        "#;
        let page = parse_page(html, BASE);
        assert_eq!(page.structured_data.len(), 3);
        assert_eq!(page.structured_data[0]["@type"], "Hotel");
        assert_eq!(page.structured_data[2]["@type"], "Organization");
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let html = r#"<html><head><style>body{color:red}</style></head>
            <body><h1>Grand   Hotel</h1><script>var secret = 1;</script><p>Afternoon tea</p></body></html>"#;
        let page = parse_page(html, BASE);
        assert_eq!(page.visible_text, "Grand Hotel Afternoon tea");
    }

    #[test]
    fn test_bad_base_url_is_parse_error() {
        assert!(matches!(
            try_parse_page("<a href='/x'>x</a>", "not a url"),
            Err(ParseError::BaseUrl(_))
        ));
        assert_eq!(parse_page("<a href='/x'>x</a>", "not a url"), ParsedPage::default());
    }

    #[test]
    fn test_empty_html() {
        let page = parse_page("", BASE);
        assert!(page.internal_links.is_empty());
        assert!(page.booking_candidates.is_empty());
        assert!(page.asset_references.is_empty());
        assert!(page.structured_data.is_empty());
    }
}
