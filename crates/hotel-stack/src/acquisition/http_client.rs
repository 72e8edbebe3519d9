//! Async HTTP fetcher wrapping reqwest.
//!
//! Not a browser: one GET per call, with a browser-like header profile.
//! Redirects are followed hop by hop (the client itself never follows) so
//! callers can see every intermediate URL and every `Set-Cookie` along the
//! way. There are no retries: a failure is reported once, as a value.

use crate::config::ScanConfig;
use crate::error::{FetchError, FetchErrorKind};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Largest body read per response; the rest is discarded.
const MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

/// Longest cookie value kept. Values are only informative; keys drive detection.
const MAX_COOKIE_VALUE_CHARS: usize = 64;

const MAX_HEADER_VALUE_CHARS: usize = 1024;

/// Response headers worth keeping as vendor evidence.
const HEADER_ALLOW_LIST: &[&str] = &[
    "server",
    "x-powered-by",
    "x-generator",
    "via",
    "x-cache",
    "x-served-by",
    "x-amz-cf-pop",
    "cf-ray",
    "cf-cache-status",
    "x-vercel-id",
    "x-shopify-stage",
    "x-drupal-cache",
    "x-wix-request-id",
    "content-security-policy",
    "link",
];

/// One successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFetchResult {
    /// URL that was requested.
    pub url: String,
    /// URL that produced the body, after redirects.
    pub final_url: String,
    pub status_code: u16,
    pub content_type: String,
    /// Empty for non-HTML responses.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub html: String,
    /// Allow-listed response headers (lowercase names), last hop wins.
    pub headers: BTreeMap<String, String>,
    /// Cookies set on any hop, name → truncated value.
    pub cookies: BTreeMap<String, String>,
}

impl PageFetchResult {
    /// Whether the response declared (or defaulted to) an HTML body.
    pub fn is_html(&self) -> bool {
        is_html_content_type(&self.content_type)
    }
}

/// A fetch together with the redirect hops it went through.
///
/// `hops` starts with the requested URL and ends with the last URL that was
/// requested, whether or not that request succeeded.
#[derive(Debug, Clone)]
pub struct FollowOutcome {
    pub hops: Vec<String>,
    pub result: Result<PageFetchResult, FetchError>,
    /// Cookies set on the hops that completed, even when a later hop failed.
    pub cookies: BTreeMap<String, String>,
}

/// HTTP session for one crawl.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    max_redirects: usize,
    max_cookies: usize,
}

impl HttpClient {
    /// Create a session with the browser header profile and limits from `config`.
    pub fn new(config: &ScanConfig) -> Self {
        let timeout = config.timeout();

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.9"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            timeout,
            max_redirects: config.max_redirects,
            max_cookies: config.max_cookies_per_page,
        }
    }

    /// Fetch one URL, following redirects. Never panics; failures are values.
    pub async fn fetch(&self, url: &str) -> Result<PageFetchResult, FetchError> {
        self.follow(url).await.result
    }

    /// Fetch one URL and report every hop taken.
    pub async fn follow(&self, url: &str) -> FollowOutcome {
        let start = Instant::now();
        let mut hops = vec![url.to_string()];
        let mut cookies = BTreeMap::new();

        let current = match Url::parse(url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => u,
            Ok(u) => {
                return FollowOutcome {
                    hops,
                    result: Err(FetchError::new(
                        FetchErrorKind::RequestError,
                        url,
                        format!("unsupported scheme {:?}", u.scheme()),
                    )),
                    cookies,
                }
            }
            Err(e) => {
                return FollowOutcome {
                    hops,
                    result: Err(FetchError::new(
                        FetchErrorKind::RequestError,
                        url,
                        format!("invalid URL: {e}"),
                    )),
                    cookies,
                }
            }
        };

        // One deadline covers every hop and the body read.
        let result = match tokio::time::timeout(
            self.timeout,
            self.walk(url, current, &mut hops, &mut cookies),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::new(
                FetchErrorKind::Timeout,
                url,
                format!("no response within {}s", self.timeout.as_secs()),
            )),
        };

        debug!(
            url,
            hops = hops.len(),
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fetch finished"
        );

        FollowOutcome {
            hops,
            result,
            cookies,
        }
    }

    /// Request `current`, then each redirect target, until a final response.
    async fn walk(
        &self,
        url: &str,
        mut current: Url,
        hops: &mut Vec<String>,
        cookies: &mut BTreeMap<String, String>,
    ) -> Result<PageFetchResult, FetchError> {
        let mut redirects = 0usize;
        loop {
            let resp = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| classify(&e, url, &current))?;

            collect_cookies(resp.headers(), cookies, self.max_cookies);

            let status = resp.status();
            if status.is_redirection() {
                let next = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| current.join(loc.trim()).ok());
                if let Some(next) = next {
                    if redirects >= self.max_redirects {
                        return Err(FetchError::new(
                            FetchErrorKind::RequestError,
                            url,
                            format!("too many redirects (>{})", self.max_redirects),
                        ));
                    }
                    redirects += 1;
                    hops.push(next.to_string());
                    current = next;
                    continue;
                }
                // A 3xx without a usable Location is treated as a final response.
            }

            if status.is_client_error() || status.is_server_error() {
                return Err(FetchError::new(
                    FetchErrorKind::HttpError,
                    url,
                    format!("HTTP {}", status.as_u16()),
                ));
            }

            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let headers = allow_listed_headers(resp.headers());

            let html = if is_html_content_type(&content_type) {
                read_body(resp).await.map_err(|e| classify(&e, url, &current))?
            } else {
                String::new()
            };

            return Ok(PageFetchResult {
                url: url.to_string(),
                final_url: current.to_string(),
                status_code: status.as_u16(),
                content_type,
                html,
                headers,
                cookies: cookies.clone(),
            });
        }
    }
}

/// Read at most [`MAX_BODY_BYTES`] of the body.
async fn read_body(mut resp: reqwest::Response) -> Result<String, reqwest::Error> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let room = MAX_BODY_BYTES.saturating_sub(buf.len());
        if chunk.len() >= room {
            buf.extend_from_slice(&chunk[..room]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn classify(e: &reqwest::Error, requested: &str, hop: &Url) -> FetchError {
    let kind = if e.is_timeout() {
        FetchErrorKind::Timeout
    } else if e.is_connect()
        || e.is_request()
        || e.is_redirect()
        || e.is_builder()
        || e.is_body()
        || e.is_decode()
    {
        FetchErrorKind::RequestError
    } else {
        FetchErrorKind::UnexpectedError
    };
    let message = if hop.as_str() == requested {
        e.to_string()
    } else {
        format!("{e} (at {hop})")
    };
    FetchError::new(kind, requested, message)
}

/// Empty content types are treated as HTML; servers omit it more often than they lie.
pub fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.trim().is_empty() || ct.contains("text/html") || ct.contains("xhtml")
}

fn allow_listed_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(k, _)| HEADER_ALLOW_LIST.contains(&k.as_str()))
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|s| (k.as_str().to_string(), truncate_chars(s, MAX_HEADER_VALUE_CHARS)))
        })
        .collect()
}

fn collect_cookies(headers: &HeaderMap, cookies: &mut BTreeMap<String, String>, cap: usize) {
    for value in headers.get_all(SET_COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        let Some((name, value)) = parse_set_cookie(raw) else {
            continue;
        };
        if cookies.len() >= cap && !cookies.contains_key(&name) {
            break;
        }
        cookies.insert(name, value);
    }
}

/// Extract `(name, value)` from a `Set-Cookie` header value.
pub fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((
        name.to_string(),
        truncate_chars(value.trim(), MAX_COOKIE_VALUE_CHARS),
    ))
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new(&ScanConfig::default());
        assert_eq!(client.timeout, Duration::from_secs(20));
        assert_eq!(client.max_redirects, 10);
    }

    #[test]
    fn test_parse_set_cookie() {
        assert_eq!(
            parse_set_cookie("_ga=GA1.2.3; Path=/; Secure"),
            Some(("_ga".to_string(), "GA1.2.3".to_string()))
        );
        assert_eq!(
            parse_set_cookie("  hubspotutk = abc ; HttpOnly"),
            Some(("hubspotutk".to_string(), "abc".to_string()))
        );
        assert_eq!(parse_set_cookie("=nope"), None);
        assert_eq!(parse_set_cookie("flag"), None);
    }

    #[test]
    fn test_cookie_value_truncated() {
        let long = format!("sid={}", "x".repeat(500));
        let (_, v) = parse_set_cookie(&long).unwrap();
        assert_eq!(v.len(), MAX_COOKIE_VALUE_CHARS);
    }

    #[test]
    fn test_is_html_content_type() {
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(is_html_content_type(""));
        assert!(!is_html_content_type("application/pdf"));
        assert!(!is_html_content_type("image/png"));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_collect_cookies_capped() {
        let mut headers = HeaderMap::new();
        for i in 0..5 {
            headers.append(
                SET_COOKIE,
                HeaderValue::from_str(&format!("c{i}=v; Path=/")).unwrap(),
            );
        }
        let mut cookies = BTreeMap::new();
        collect_cookies(&headers, &mut cookies, 3);
        assert_eq!(cookies.len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_url_is_request_error() {
        let client = HttpClient::new(&ScanConfig::default());
        let err = client.fetch("not a url").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::RequestError);
        let err = client.fetch("ftp://example.com/").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::RequestError);
    }
}
