//! Crawl orchestrator: drives one bounded, sequential crawl of a hotel site.
//!
//! Phases, in order:
//!
//! 1. **Home**: fetch the root URL. Failure here is the only abort.
//! 2. **Well-known paths**: `/rooms`, `/offers`, ... from [`ScanConfig`].
//! 3. **Internal links**: links found on the home page, capped.
//! 4. **Booking flow**: follow the first booking candidate through its redirects.
//! 5. **Aggregate**: fold everything into [`CrawlSignals`].
//!
//! The page budget is checked before every fetch, and one slot is held back
//! for the booking flow. Fetches are issued one at a time against a single
//! session so link discovery is deterministic.

pub mod booking;
pub mod signals;

pub use signals::{aggregate, BookingFlowEvidence, CrawlSignals, Harvest};

use crate::acquisition::page_parser::try_parse_page;
use crate::acquisition::{HttpClient, ParsedPage};
use crate::config::ScanConfig;
use crate::error::{CrawlIssue, FetchError, FetchErrorKind};
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Slots held back from link traversal for the booking flow.
const BOOKING_RESERVE: usize = 1;

/// Crawl state-machine phase; used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    FetchHome,
    FetchWellKnownPaths,
    FetchInternalLinks,
    DiscoverBookingFlow,
    Aggregate,
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FetchHome => "fetch_home",
            Self::FetchWellKnownPaths => "fetch_well_known_paths",
            Self::FetchInternalLinks => "fetch_internal_links",
            Self::DiscoverBookingFlow => "discover_booking_flow",
            Self::Aggregate => "aggregate",
        };
        f.write_str(s)
    }
}

/// Crawl `root_url` and collect signals.
///
/// Never fails: an unreachable home page yields signals with empty `pages`
/// and a populated `errors` list (see [`CrawlSignals::ensure_reachable`]).
/// The HTTP session lives exactly as long as this call.
pub async fn crawl_signals(root_url: &str, config: &ScanConfig) -> CrawlSignals {
    let config = config.clone().sanitized();
    let client = HttpClient::new(&config);
    Crawler::new(&client, &config).run(root_url).await
}

/// Normalize user input into an absolute http(s) URL. Bare hosts get `https://`.
pub fn normalize_root_url(input: &str) -> Result<Url, FetchError> {
    let trimmed = input.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| {
        FetchError::new(FetchErrorKind::RequestError, input, format!("invalid URL: {e}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(FetchError::new(
            FetchErrorKind::RequestError,
            input,
            "URL must be http(s) with a host",
        ));
    }
    Ok(url)
}

/// Key used to avoid fetching the same page twice.
fn visit_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut u) => {
            u.set_fragment(None);
            let mut s = u.to_string();
            if s.ends_with('/') && u.path() != "/" {
                s.pop();
            }
            s
        }
        Err(_) => url.to_string(),
    }
}

/// One crawl in progress.
pub struct Crawler<'a> {
    client: &'a HttpClient,
    config: &'a ScanConfig,
    harvest: Harvest,
    visited: HashSet<String>,
    fetches: usize,
}

impl<'a> Crawler<'a> {
    pub fn new(client: &'a HttpClient, config: &'a ScanConfig) -> Self {
        Self {
            client,
            config,
            harvest: Harvest::default(),
            visited: HashSet::new(),
            fetches: 0,
        }
    }

    fn budget_left(&self) -> usize {
        self.config.max_pages.saturating_sub(self.fetches)
    }

    /// Run every phase and aggregate.
    pub async fn run(mut self, root_url: &str) -> CrawlSignals {
        let start = Instant::now();

        // ── Home ──
        let root = match normalize_root_url(root_url) {
            Ok(u) => u,
            Err(e) => {
                warn!(url = root_url, error = %e, "invalid root URL");
                return CrawlSignals::unreachable(root_url, "", e);
            }
        };
        let root_str = root.to_string();
        self.harvest.root_url = root_str.clone();
        self.harvest.base_origin = root.origin().ascii_serialization();

        info!(url = %root_str, max_pages = self.config.max_pages, phase = %CrawlPhase::FetchHome, "crawl started");
        self.fetches += 1;
        self.visited.insert(visit_key(&root_str));
        let home = match self.client.fetch(&root_str).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %root_str, error = %e, "home page unreachable, aborting crawl");
                return CrawlSignals::unreachable(&root_str, &self.harvest.base_origin, e);
            }
        };

        // Redirects on the home page (http → https, apex → www) move the origin.
        let home_url = Url::parse(&home.final_url).unwrap_or_else(|_| root.clone());
        self.harvest.base_origin = home_url.origin().ascii_serialization();
        self.visited.insert(visit_key(&home.final_url));
        self.record(home);

        let home_links: Vec<String> = self
            .harvest
            .pages
            .first()
            .map(|(_, parsed)| parsed.internal_links.clone())
            .unwrap_or_default();

        // ── Well-known paths ──
        debug!(phase = %CrawlPhase::FetchWellKnownPaths, "probing well-known paths");
        for path in self.config.well_known_paths.clone() {
            if self.budget_left() <= BOOKING_RESERVE {
                break;
            }
            if let Ok(url) = home_url.join(&path) {
                self.fetch_page(url.as_str()).await;
            }
        }

        // ── Internal links ──
        debug!(phase = %CrawlPhase::FetchInternalLinks, links = home_links.len(), "following internal links");
        for link in home_links.iter().take(self.config.max_internal_links) {
            if self.budget_left() <= BOOKING_RESERVE {
                debug!("page budget reached");
                break;
            }
            self.fetch_page(link).await;
        }

        // ── Booking flow ──
        let candidates = booking::collect_candidates(
            self.harvest.pages.iter().map(|(_, parsed)| parsed),
            self.config.max_booking_candidates,
        );
        debug!(phase = %CrawlPhase::DiscoverBookingFlow, candidates = candidates.len(), "discovering booking flow");
        let base_host = home_url.host_str().unwrap_or("").to_ascii_lowercase();
        let booking_flow = if candidates.is_empty() || self.budget_left() > 0 {
            if !candidates.is_empty() {
                self.fetches += 1;
            }
            let found = booking::discover(self.client, candidates, &base_host, self.config).await;
            if let Some(e) = found.error {
                self.harvest.errors.push(CrawlIssue::Fetch(e));
            }
            if let Some(page) = found.page {
                if self.visited.insert(visit_key(&page.final_url)) {
                    self.record(page);
                }
            }
            found.evidence
        } else {
            BookingFlowEvidence {
                candidate_urls: candidates,
                notes: vec!["booking flow skipped: page budget exhausted".to_string()],
                ..BookingFlowEvidence::default()
            }
        };

        // ── Aggregate ──
        let pages = self.harvest.pages.len();
        let errors = self.harvest.errors.len();
        let signals = aggregate(self.harvest, booking_flow, self.config);
        info!(
            url = %root_str,
            pages,
            errors,
            fetches = self.fetches,
            phase = %CrawlPhase::Aggregate,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "crawl complete"
        );
        signals
    }

    /// Best-effort fetch of a non-home page. Failures are logged into the harvest.
    async fn fetch_page(&mut self, url: &str) {
        if !self.visited.insert(visit_key(url)) {
            return;
        }
        self.fetches += 1;
        match self.client.fetch(url).await {
            Ok(page) => {
                if page.final_url != url && !self.visited.insert(visit_key(&page.final_url)) {
                    debug!(url, final_url = %page.final_url, "redirected to an already-fetched page");
                    return;
                }
                self.record(page);
            }
            Err(e) => {
                debug!(url, error = %e, "fetch failed");
                self.harvest.errors.push(CrawlIssue::Fetch(e));
            }
        }
    }

    /// Parse and keep a fetched page.
    fn record(&mut self, page: crate::acquisition::PageFetchResult) {
        if !page.is_html() {
            self.harvest.errors.push(CrawlIssue::Fetch(FetchError::new(
                FetchErrorKind::NonHtml,
                page.url.clone(),
                format!("content-type {:?}", page.content_type),
            )));
        }
        let parsed = match try_parse_page(&page.html, &page.final_url) {
            Ok(p) => p,
            Err(e) => {
                self.harvest.errors.push(CrawlIssue::Parse {
                    url: page.url.clone(),
                    message: e.to_string(),
                });
                ParsedPage::default()
            }
        };
        self.harvest.pages.push((page, parsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_root_url() {
        assert_eq!(
            normalize_root_url("grandhotel.test").unwrap().as_str(),
            "https://grandhotel.test/"
        );
        assert_eq!(
            normalize_root_url(" http://grandhotel.test/en ").unwrap().as_str(),
            "http://grandhotel.test/en"
        );
        assert!(normalize_root_url("ftp://grandhotel.test").is_err());
        assert!(normalize_root_url("https://").is_err());
    }

    #[test]
    fn test_visit_key() {
        assert_eq!(visit_key("https://h.test/rooms/"), "https://h.test/rooms");
        assert_eq!(visit_key("https://h.test/rooms#x"), "https://h.test/rooms");
        assert_eq!(visit_key("https://h.test/"), "https://h.test/");
    }

    #[tokio::test]
    async fn test_invalid_root_is_unreachable() {
        let signals = crawl_signals("ftp://nowhere", &ScanConfig::default()).await;
        assert!(signals.pages.is_empty());
        assert!(!signals.errors.is_empty());
        assert!(signals.ensure_reachable().is_err());
    }
}
