//! Error types for the crawl → detect → score pipeline.
//!
//! Only [`CrawlError::HomePageUnreachable`] is terminal. Everything else is
//! recorded as a [`CrawlIssue`] inside the crawl's bounded error log and the
//! pipeline carries on with whatever evidence it has.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchErrorKind {
    /// The per-fetch timeout elapsed.
    Timeout,
    /// Connection, DNS, TLS, redirect or malformed-request failure.
    RequestError,
    /// Anything the HTTP stack reported that fits neither bucket above.
    UnexpectedError,
    /// The response was not HTML (recorded alongside an empty-body page).
    #[serde(rename = "nonHTML")]
    NonHtml,
    /// The server answered with a 4xx/5xx status.
    HttpError,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::RequestError => "request error",
            Self::UnexpectedError => "unexpected error",
            Self::NonHtml => "non-HTML content",
            Self::HttpError => "HTTP error",
        };
        f.write_str(s)
    }
}

/// A single failed fetch. Returned instead of a page, never panicked.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind} fetching {url}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    pub url: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            url: url.into(),
        }
    }
}

/// Page-scoped HTML parse failure.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },

    #[error("invalid base URL {0:?}")]
    BaseUrl(String),
}

/// Terminal crawl failure.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CrawlError {
    #[error("home page unreachable: {0}")]
    HomePageUnreachable(FetchError),
}

/// Errors raised while building a [`crate::detection::RuleSet`] from external input.
#[derive(thiserror::Error, Debug)]
pub enum RuleError {
    #[error("rule file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule file contains no usable rules ({dropped} dropped as malformed)")]
    NoUsableRules { dropped: usize },
}

/// Invalid configuration values.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("layer weights must sum to 1.0 (got {0:.4})")]
    WeightSum(f64),

    #[error("layer weight for {layer} must be > 0 (got {weight})")]
    NonPositiveWeight { layer: String, weight: f64 },

    #[error("source multipliers must be strictly decreasing: customer-confirmed {confirmed} vs public-signal {public}")]
    MultiplierOrder { confirmed: f64, public: f64 },

    #[error("{field} must be within {min}..={max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("config file is not valid JSON: {0}")]
    Json(String),
}

/// Per-layer scoring anomaly. Caught by the engine and replaced with baseline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("scoring anomaly in {layer}: {reason}")]
pub struct ScoringAnomaly {
    pub layer: String,
    pub reason: String,
}

/// An entry in the crawl's bounded error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum CrawlIssue {
    /// A fetch failed (or returned non-HTML content).
    Fetch(FetchError),
    /// HTML for one page could not be parsed; that page contributes no parsed evidence.
    Parse { url: String, message: String },
}

impl CrawlIssue {
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch(e) => &e.url,
            Self::Parse { url, .. } => url,
        }
    }
}

impl From<FetchError> for CrawlIssue {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let e = FetchError::new(FetchErrorKind::HttpError, "https://h.test/", "HTTP 503");
        assert_eq!(e.to_string(), "HTTP error fetching https://h.test/: HTTP 503");
    }

    #[test]
    fn test_fetch_kind_serializes_camel_case() {
        let json = serde_json::to_string(&FetchErrorKind::NonHtml).unwrap();
        assert_eq!(json, "\"nonHTML\"");
        let json = serde_json::to_string(&FetchErrorKind::RequestError).unwrap();
        assert_eq!(json, "\"requestError\"");
    }

    #[test]
    fn test_issue_url() {
        let issue = CrawlIssue::Parse {
            url: "https://h.test/a".into(),
            message: "bad".into(),
        };
        assert_eq!(issue.url(), "https://h.test/a");
    }
}
