//! Booking-flow discovery: pick the first booking candidate and follow it.

use super::signals::BookingFlowEvidence;
use crate::acquisition::page_parser::same_site;
use crate::acquisition::{HttpClient, PageFetchResult, ParsedPage};
use crate::config::ScanConfig;
use crate::error::FetchError;
use std::collections::HashSet;
use tracing::{debug, info};

/// Result of following the booking flow.
#[derive(Debug, Clone, Default)]
pub struct BookingDiscovery {
    pub evidence: BookingFlowEvidence,
    /// The page the flow landed on, when it could be fetched.
    pub page: Option<PageFetchResult>,
    pub error: Option<FetchError>,
}

/// Deduped booking candidates across pages, in page order then page-local rank.
pub fn collect_candidates<'a, I>(parsed: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a ParsedPage>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for page in parsed {
        for url in &page.booking_candidates {
            if out.len() >= cap {
                return out;
            }
            if seen.insert(url.as_str()) {
                out.push(url.clone());
            }
        }
    }
    out
}

/// Follow exactly one candidate, the first. Failures become notes, never errors.
pub async fn discover(
    client: &HttpClient,
    candidates: Vec<String>,
    base_host: &str,
    config: &ScanConfig,
) -> BookingDiscovery {
    let Some(first) = candidates.first().cloned() else {
        return BookingDiscovery {
            evidence: BookingFlowEvidence {
                notes: vec!["no booking call-to-action found on fetched pages".to_string()],
                ..BookingFlowEvidence::default()
            },
            ..BookingDiscovery::default()
        };
    };

    debug!(candidate = %first, "following booking flow");
    let outcome = client.follow(&first).await;

    let cookie_keys = match &outcome.result {
        Ok(page) => page.cookies.keys().cloned().collect(),
        Err(_) => outcome.cookies.keys().cloned().collect(),
    };
    let mut evidence =
        BookingFlowEvidence::from_hops(candidates, &outcome.hops, cookie_keys, config.max_redirect_chain);

    let redirects = outcome.hops.len().saturating_sub(1);
    match outcome.result {
        Ok(page) => {
            let domain = evidence.final_domain.clone().unwrap_or_default();
            evidence
                .notes
                .push(format!("followed {redirects} redirect(s) to {domain}"));
            if same_site(&domain, base_host) {
                evidence
                    .notes
                    .push("booking flow stays on the hotel's own domain".to_string());
            }
            info!(final_domain = %domain, redirects, "booking flow resolved");
            BookingDiscovery {
                evidence,
                page: Some(page),
                error: None,
            }
        }
        Err(e) => {
            evidence
                .notes
                .push(format!("booking flow fetch failed after {redirects} redirect(s): {e}"));
            info!(error = %e, "booking flow could not be fetched");
            BookingDiscovery {
                evidence,
                page: None,
                error: Some(e),
            }
        }
    }
}
