//! Crawl limits.
//!
//! Every limit has a hard ceiling; [`ScanConfig::sanitized`] clamps values
//! loaded from files or the environment so a config can never loosen the
//! crawl beyond those ceilings.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on pages fetched per crawl (booking flow included).
pub const MAX_PAGE_BUDGET: usize = 16;
/// Hard ceiling on a single fetch.
pub const MAX_FETCH_TIMEOUT_SECS: u64 = 25;
/// Hard ceiling on distinct cookie keys kept per crawl.
pub const MAX_COOKIE_KEYS: usize = 80;
/// Internal links kept per parsed page.
pub const MAX_INTERNAL_LINKS: usize = 14;
/// Booking candidates kept per page and per crawl.
pub const MAX_BOOKING_CANDIDATES: usize = 6;
/// Redirect chain entries kept for the booking flow.
pub const MAX_REDIRECT_CHAIN: usize = 6;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                  AppleWebKit/537.36 (KHTML, like Gecko) \
                                  Chrome/131.0.0.0 Safari/537.36";

/// Limits and knobs for one crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    /// Total pages fetched, home page and booking flow included.
    pub max_pages: usize,
    /// Per-fetch timeout in seconds.
    pub timeout_secs: u64,
    pub max_internal_links: usize,
    pub max_booking_candidates: usize,
    /// Maximum redirect hops followed per fetch.
    pub max_redirects: usize,
    pub max_redirect_chain: usize,
    pub max_cookie_keys: usize,
    pub max_cookies_per_page: usize,
    /// Character budget of the combined text blob handed to the detector.
    pub text_budget_chars: usize,
    pub visible_text_budget_chars: usize,
    pub max_errors: usize,
    pub max_structured_data: usize,
    /// Paths fetched right after the home page, in order.
    pub well_known_paths: Vec<String>,
    pub user_agent: String,
    /// Idle connections kept per host in the crawl's session.
    pub pool_max_idle_per_host: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_pages: MAX_PAGE_BUDGET,
            timeout_secs: 20,
            max_internal_links: MAX_INTERNAL_LINKS,
            max_booking_candidates: MAX_BOOKING_CANDIDATES,
            max_redirects: 10,
            max_redirect_chain: MAX_REDIRECT_CHAIN,
            max_cookie_keys: MAX_COOKIE_KEYS,
            max_cookies_per_page: 40,
            text_budget_chars: 400_000,
            visible_text_budget_chars: 60_000,
            max_errors: 40,
            max_structured_data: 40,
            well_known_paths: [
                "/rooms",
                "/offers",
                "/book",
                "/contact",
                "/privacy-policy",
                "/cookie-policy",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            pool_max_idle_per_host: 5,
        }
    }
}

impl ScanConfig {
    /// Parse a JSON config; missing fields take defaults. The result is sanitized.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: ScanConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        Ok(cfg.sanitized())
    }

    /// Clamp every limit into its allowed range.
    pub fn sanitized(mut self) -> Self {
        self.max_pages = self.max_pages.clamp(1, MAX_PAGE_BUDGET);
        self.timeout_secs = self.timeout_secs.clamp(1, MAX_FETCH_TIMEOUT_SECS);
        self.max_internal_links = self.max_internal_links.min(MAX_INTERNAL_LINKS);
        self.max_booking_candidates = self.max_booking_candidates.clamp(1, MAX_BOOKING_CANDIDATES);
        self.max_redirects = self.max_redirects.clamp(1, 20);
        self.max_redirect_chain = self.max_redirect_chain.clamp(2, MAX_REDIRECT_CHAIN);
        self.max_cookie_keys = self.max_cookie_keys.min(MAX_COOKIE_KEYS);
        self.max_cookies_per_page = self.max_cookies_per_page.min(MAX_COOKIE_KEYS);
        self.text_budget_chars = self.text_budget_chars.clamp(1_000, 2_000_000);
        self.visible_text_budget_chars = self.visible_text_budget_chars.clamp(1_000, 500_000);
        self.max_errors = self.max_errors.clamp(1, 200);
        self.max_structured_data = self.max_structured_data.min(200);
        self.pool_max_idle_per_host = self.pool_max_idle_per_host.clamp(1, 5);
        self.well_known_paths.retain(|p| p.starts_with('/'));
        if self.user_agent.trim().is_empty() {
            self.user_agent = BROWSER_USER_AGENT.to_string();
        }
        self
    }

    /// Apply `HOTEL_STACK_MAX_PAGES` / `HOTEL_STACK_TIMEOUT_SECS` from `lookup`.
    ///
    /// Unparseable values are ignored. The result is sanitized.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOTEL_STACK_MAX_PAGES").and_then(|s| s.trim().parse().ok()) {
            self.max_pages = v;
        }
        if let Some(v) = lookup("HOTEL_STACK_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            self.timeout_secs = v;
        }
        self.sanitized()
    }

    /// [`with_overrides`](Self::with_overrides) against the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|k| std::env::var(k).ok())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_within_ceilings() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.clone().sanitized(), cfg);
        assert!(cfg.max_pages <= MAX_PAGE_BUDGET);
        assert!(cfg.timeout_secs <= MAX_FETCH_TIMEOUT_SECS);
    }

    #[test]
    fn test_sanitize_clamps_to_ceilings() {
        let cfg = ScanConfig {
            max_pages: 500,
            timeout_secs: 120,
            max_cookie_keys: 10_000,
            max_internal_links: 100,
            well_known_paths: vec!["/ok".into(), "not-a-path".into()],
            user_agent: "  ".into(),
            ..ScanConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.max_pages, MAX_PAGE_BUDGET);
        assert_eq!(cfg.timeout_secs, MAX_FETCH_TIMEOUT_SECS);
        assert_eq!(cfg.max_cookie_keys, MAX_COOKIE_KEYS);
        assert_eq!(cfg.max_internal_links, MAX_INTERNAL_LINKS);
        assert_eq!(cfg.well_known_paths, vec!["/ok".to_string()]);
        assert!(cfg.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = ScanConfig::from_json(r#"{"maxPages": 4, "timeoutSecs": 99}"#).unwrap();
        assert_eq!(cfg.max_pages, 4);
        assert_eq!(cfg.timeout_secs, MAX_FETCH_TIMEOUT_SECS);
        assert_eq!(cfg.max_cookie_keys, MAX_COOKIE_KEYS);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(
            ScanConfig::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("HOTEL_STACK_MAX_PAGES", "8"),
            ("HOTEL_STACK_TIMEOUT_SECS", "abc"),
        ]
        .into_iter()
        .collect();
        let cfg = ScanConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.max_pages, 8);
        assert_eq!(cfg.timeout_secs, 20);
    }
}
