//! The aggregated evidence bundle and the pure function that builds it.

use crate::acquisition::page_parser::same_site;
use crate::acquisition::{PageFetchResult, ParsedPage};
use crate::config::ScanConfig;
use crate::error::{CrawlError, CrawlIssue, FetchError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

const MAX_ASSET_URLS: usize = 1_000;

/// What the booking call-to-action led to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFlowEvidence {
    /// Deduped booking-intent URLs from fetched pages, in discovery order.
    pub candidate_urls: Vec<String>,
    pub final_url: Option<String>,
    pub final_domain: Option<String>,
    /// Followed URLs: the candidate, each intermediate hop, then the final URL.
    pub redirect_chain: Vec<String>,
    /// Cookie keys set while following the booking flow.
    pub cookie_keys: Vec<String>,
    pub notes: Vec<String>,
}

impl BookingFlowEvidence {
    /// Build evidence from the hops taken while following one candidate.
    ///
    /// The chain keeps at most `max_chain` entries; when longer, the first
    /// `max_chain - 1` hops and the final URL are kept.
    pub fn from_hops(
        candidate_urls: Vec<String>,
        hops: &[String],
        cookie_keys: Vec<String>,
        max_chain: usize,
    ) -> Self {
        let max_chain = max_chain.max(2);
        let redirect_chain = if hops.len() > max_chain {
            let mut chain: Vec<String> = hops[..max_chain - 1].to_vec();
            chain.extend(hops.last().cloned());
            chain
        } else {
            hops.to_vec()
        };
        let final_url = hops.last().cloned();
        let final_domain = final_url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()));

        Self {
            candidate_urls,
            final_url,
            final_domain,
            redirect_chain,
            cookie_keys,
            notes: Vec::new(),
        }
    }

    /// Text folded into the detector's searchable blob.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(self.final_domain.as_deref());
        parts.extend(self.final_url.as_deref());
        parts.extend(self.redirect_chain.iter().map(String::as_str));
        parts.extend(self.candidate_urls.iter().map(String::as_str));
        parts.extend(self.cookie_keys.iter().map(String::as_str));
        parts.join("\n")
    }
}

/// Raw material collected by the orchestrator, before aggregation.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub root_url: String,
    pub base_origin: String,
    /// Fetched pages with their parse results, in fetch order.
    pub pages: Vec<(PageFetchResult, ParsedPage)>,
    pub errors: Vec<CrawlIssue>,
}

/// Everything observed in one bounded crawl. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSignals {
    pub root_url: String,
    pub base_origin: String,
    pub pages: Vec<PageFetchResult>,
    pub asset_urls: BTreeSet<String>,
    /// Third-party hosts referenced by fetched pages.
    pub asset_domains: BTreeSet<String>,
    /// Allow-listed headers across pages, last write wins.
    pub merged_headers: BTreeMap<String, String>,
    pub cookie_keys: BTreeSet<String>,
    pub booking_flow: BookingFlowEvidence,
    /// Raw HTML plus visible text of every page, truncated to the text budget.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub combined_text_blob: String,
    pub visible_text: String,
    pub structured_data: Vec<Value>,
    pub errors: Vec<CrawlIssue>,
    /// Set when the home page could not be fetched and the crawl stopped.
    pub home_page_error: Option<FetchError>,
}

impl CrawlSignals {
    /// Signals for a crawl that stopped at the home page.
    pub fn unreachable(root_url: &str, base_origin: &str, error: FetchError) -> Self {
        Self {
            root_url: root_url.to_string(),
            base_origin: base_origin.to_string(),
            errors: vec![CrawlIssue::Fetch(error.clone())],
            home_page_error: Some(error),
            booking_flow: BookingFlowEvidence {
                notes: vec!["booking flow not attempted: home page unreachable".to_string()],
                ..BookingFlowEvidence::default()
            },
            ..Self::default()
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.home_page_error.is_none()
    }

    /// Surface home-page unreachability as a structural error.
    pub fn ensure_reachable(&self) -> Result<(), CrawlError> {
        match &self.home_page_error {
            Some(e) => Err(CrawlError::HomePageUnreachable(e.clone())),
            None => Ok(()),
        }
    }

    /// Host of `base_origin`, lowercase.
    pub fn base_host(&self) -> Option<String> {
        Url::parse(&self.base_origin)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }
}

/// Merge a harvest into one [`CrawlSignals`]. Total and pure.
pub fn aggregate(harvest: Harvest, booking_flow: BookingFlowEvidence, config: &ScanConfig) -> CrawlSignals {
    let base_host = Url::parse(&harvest.base_origin)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default();

    let mut asset_urls = BTreeSet::new();
    let mut asset_domains = BTreeSet::new();
    let mut merged_headers = BTreeMap::new();
    let mut cookie_keys = BTreeSet::new();
    let mut blob = BoundedText::new(config.text_budget_chars);
    let mut visible = BoundedText::new(config.visible_text_budget_chars);
    let mut structured_data = Vec::new();
    let mut pages = Vec::with_capacity(harvest.pages.len());

    let booking_cookies = booking_flow.cookie_keys.iter();

    for (page, parsed) in harvest.pages {
        for (k, v) in &page.headers {
            merged_headers.insert(k.clone(), v.clone());
        }
        for key in page.cookies.keys() {
            insert_capped(&mut cookie_keys, key, config.max_cookie_keys);
        }
        for asset in &parsed.asset_references {
            if asset_urls.len() < MAX_ASSET_URLS {
                asset_urls.insert(asset.url.clone());
            }
            if !base_host.is_empty() && !same_site(&asset.host, &base_host) {
                asset_domains.insert(asset.host.clone());
            }
        }

        blob.push(&page.html);
        blob.push(&parsed.visible_text);
        visible.push(&parsed.visible_text);

        for item in parsed.structured_data {
            if structured_data.len() < config.max_structured_data {
                structured_data.push(item);
            }
        }
        pages.push(page);
    }

    for key in booking_cookies {
        insert_capped(&mut cookie_keys, key, config.max_cookie_keys);
    }

    let mut errors = harvest.errors;
    errors.truncate(config.max_errors);

    CrawlSignals {
        root_url: harvest.root_url,
        base_origin: harvest.base_origin,
        pages,
        asset_urls,
        asset_domains,
        merged_headers,
        cookie_keys,
        booking_flow,
        combined_text_blob: blob.into_string(),
        visible_text: visible.into_string(),
        structured_data,
        errors,
        home_page_error: None,
    }
}

fn insert_capped(set: &mut BTreeSet<String>, key: &str, cap: usize) {
    if set.len() < cap || set.contains(key) {
        set.insert(key.to_string());
    }
}

/// String that stops growing at a character budget.
struct BoundedText {
    text: String,
    chars: usize,
    budget: usize,
}

impl BoundedText {
    fn new(budget: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            budget,
        }
    }

    fn push(&mut self, s: &str) {
        if s.is_empty() || self.chars >= self.budget {
            return;
        }
        if !self.text.is_empty() {
            self.text.push('\n');
            self.chars += 1;
        }
        let room = self.budget.saturating_sub(self.chars);
        match s.char_indices().nth(room) {
            Some((idx, _)) => {
                self.text.push_str(&s[..idx]);
                self.chars = self.budget;
            }
            None => {
                self.text.push_str(s);
                self.chars += s.chars().count();
            }
        }
    }

    fn into_string(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::page_parser::parse_page;
    use crate::error::FetchErrorKind;

    fn page(url: &str, html: &str, headers: &[(&str, &str)], cookies: &[&str]) -> (PageFetchResult, ParsedPage) {
        let fetch = PageFetchResult {
            url: url.to_string(),
            final_url: url.to_string(),
            status_code: 200,
            content_type: "text/html".to_string(),
            html: html.to_string(),
            headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            cookies: cookies.iter().map(|k| (k.to_string(), "v".to_string())).collect(),
        };
        let parsed = parse_page(html, url);
        (fetch, parsed)
    }

    fn harvest(pages: Vec<(PageFetchResult, ParsedPage)>) -> Harvest {
        Harvest {
            root_url: "https://grandhotel.test/".into(),
            base_origin: "https://grandhotel.test".into(),
            pages,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_booking_from_hops_scenario() {
        let hops = vec![
            "https://grandhotel.test/book-now".to_string(),
            "https://grandhotel.test/go".to_string(),
            "https://live.ihotelier.com/abc".to_string(),
        ];
        let ev = BookingFlowEvidence::from_hops(vec![hops[0].clone()], &hops, vec![], 6);
        assert_eq!(ev.final_domain.as_deref(), Some("live.ihotelier.com"));
        assert_eq!(ev.final_url.as_deref(), Some("https://live.ihotelier.com/abc"));
        let inter = ev.redirect_chain.iter().position(|u| u.ends_with("/go")).unwrap();
        let fin = ev.redirect_chain.iter().position(|u| u.contains("ihotelier")).unwrap();
        assert!(inter < fin);
    }

    #[test]
    fn test_booking_chain_capped_keeps_final() {
        let hops: Vec<String> = (0..10).map(|i| format!("https://h{i}.test/")).collect();
        let ev = BookingFlowEvidence::from_hops(vec![], &hops, vec![], 6);
        assert_eq!(ev.redirect_chain.len(), 6);
        assert_eq!(ev.redirect_chain[0], "https://h0.test/");
        assert_eq!(ev.redirect_chain[5], "https://h9.test/");
        assert_eq!(ev.final_domain.as_deref(), Some("h9.test"));
    }

    #[test]
    fn test_signals_serialize_camel_case() {
        let hops = vec!["https://grandhotel.test/book".to_string()];
        let p = page("https://grandhotel.test/", "<p>x</p>", &[], &["_ga"]);
        let booking = BookingFlowEvidence::from_hops(hops.clone(), &hops, vec![], 6);
        let json = serde_json::to_value(aggregate(harvest(vec![p]), booking, &ScanConfig::default())).unwrap();

        assert!(json["bookingFlow"]["redirectChain"].is_array());
        assert_eq!(json["bookingFlow"]["finalDomain"], "grandhotel.test");
        assert_eq!(json["pages"][0]["finalUrl"], "https://grandhotel.test/");
        assert_eq!(json["pages"][0]["statusCode"], 200);
        assert!(json["assetDomains"].is_array());
        assert!(json.get("booking_flow").is_none());
    }

    #[test]
    fn test_aggregate_unions_evidence() {
        let a = page(
            "https://grandhotel.test/",
            r#"<script src="https://www.googletagmanager.com/gtm.js"></script><img src="/logo.png"><p>Welcome</p>"#,
            &[("server", "nginx"), ("x-powered-by", "PHP")],
            &["_ga", "PHPSESSID"],
        );
        let b = page(
            "https://grandhotel.test/rooms",
            r#"<iframe src="https://be.synxis.com/?hotel=1"></iframe>"#,
            &[("server", "cloudflare")],
            &["_ga", "_fbp"],
        );
        let signals = aggregate(harvest(vec![a, b]), BookingFlowEvidence::default(), &ScanConfig::default());

        assert_eq!(signals.pages.len(), 2);
        assert_eq!(
            signals.asset_domains.iter().cloned().collect::<Vec<_>>(),
            vec!["be.synxis.com".to_string(), "www.googletagmanager.com".to_string()]
        );
        assert!(signals.asset_urls.contains("https://grandhotel.test/logo.png"));
        assert_eq!(signals.merged_headers["server"], "cloudflare");
        assert_eq!(signals.merged_headers["x-powered-by"], "PHP");
        assert_eq!(signals.cookie_keys.len(), 3);
        assert!(signals.combined_text_blob.contains("gtm.js"));
        assert!(signals.combined_text_blob.contains("Welcome"));
        assert!(signals.is_reachable());
    }

    #[test]
    fn test_aggregate_caps_cookie_keys() {
        let names: Vec<String> = (0..150).map(|i| format!("c{i:03}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let p = page("https://grandhotel.test/", "<p>x</p>", &[], &refs);
        let config = ScanConfig::default();
        let signals = aggregate(harvest(vec![p]), BookingFlowEvidence::default(), &config);
        assert_eq!(signals.cookie_keys.len(), config.max_cookie_keys);
    }

    #[test]
    fn test_aggregate_truncates_blob() {
        let big = "é".repeat(5_000);
        let p = page("https://grandhotel.test/", &big, &[], &[]);
        let config = ScanConfig {
            text_budget_chars: 1_000,
            ..ScanConfig::default()
        }
        .sanitized();
        let signals = aggregate(harvest(vec![p]), BookingFlowEvidence::default(), &config);
        assert_eq!(signals.combined_text_blob.chars().count(), 1_000);
    }

    #[test]
    fn test_aggregate_empty_harvest() {
        let signals = aggregate(harvest(vec![]), BookingFlowEvidence::default(), &ScanConfig::default());
        assert!(signals.pages.is_empty());
        assert!(signals.asset_domains.is_empty());
        assert!(signals.combined_text_blob.is_empty());
    }

    #[test]
    fn test_unreachable_signals() {
        let err = FetchError::new(FetchErrorKind::Timeout, "https://grandhotel.test/", "timed out");
        let signals = CrawlSignals::unreachable("https://grandhotel.test/", "https://grandhotel.test", err);
        assert!(signals.pages.is_empty());
        assert_eq!(signals.errors.len(), 1);
        assert!(matches!(
            signals.ensure_reachable(),
            Err(CrawlError::HomePageUnreachable(_))
        ));
    }
}
