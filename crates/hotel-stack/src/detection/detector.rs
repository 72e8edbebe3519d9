//! Rule evaluation against [`CrawlSignals`].
//!
//! # Confidence model
//!
//! A rule's confidence is the **maximum** weight among its matching patterns,
//! never the sum, so several weak overlapping hints cannot add up to a strong
//! claim. A rule with no matching pattern produces no [`Detection`].
//!
//! Labels follow fixed thresholds (see [`DetectionLabel::from_confidence`]).
//! `confirmed` is reserved for operator-supplied systems: a public signal is
//! reported as at most `probable`, however strong.

use super::rules::{CompiledPattern, CompiledRule, PatternKind, RuleSet};
use crate::crawl::CrawlSignals;
use crate::layers::{normalize_category, Layer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Confidence at or above which a detection is labelled `confirmed`.
pub const CONFIRMED_THRESHOLD: f64 = 0.85;
/// Confidence at or above which a detection is labelled `probable`.
pub const PROBABLE_THRESHOLD: f64 = 0.55;

/// Human-facing certainty bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionLabel {
    Possible,
    Probable,
    Confirmed,
}

impl DetectionLabel {
    /// Threshold label for a confidence. `None` for zero (no detection).
    pub fn from_confidence(confidence: f64) -> Option<Self> {
        if confidence.is_nan() || confidence <= 0.0 {
            None
        } else if confidence >= CONFIRMED_THRESHOLD {
            Some(Self::Confirmed)
        } else if confidence >= PROBABLE_THRESHOLD {
            Some(Self::Probable)
        } else {
            Some(Self::Possible)
        }
    }

    /// Label for a detection from `source`.
    pub fn for_source(confidence: f64, source: DetectionSource) -> Option<Self> {
        let label = Self::from_confidence(confidence)?;
        match source {
            DetectionSource::CustomerConfirmed => Some(label),
            DetectionSource::PublicSignal => Some(label.min(Self::Probable)),
        }
    }
}

impl fmt::Display for DetectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Possible => "possible",
            Self::Probable => "probable",
            Self::Confirmed => "confirmed",
        })
    }
}

/// Where a detection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectionSource {
    PublicSignal,
    CustomerConfirmed,
}

/// A vendor/product match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub vendor: String,
    pub product: String,
    pub category: String,
    pub confidence: f64,
    pub label: DetectionLabel,
    pub source: DetectionSource,
    /// Matched pattern descriptions, e.g. `domainContains:duetto`.
    pub evidence: Vec<String>,
}

impl Detection {
    /// Canonical layer this detection is routed to.
    pub fn layer(&self) -> Layer {
        Layer::for_category(&self.category)
    }

    pub fn is_customer_confirmed(&self) -> bool {
        self.source == DetectionSource::CustomerConfirmed
    }
}

/// Detections grouped by layer. All seven layers are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerEvidence(BTreeMap<Layer, Vec<Detection>>);

impl Default for LayerEvidence {
    fn default() -> Self {
        Self(Layer::ALL.iter().map(|l| (*l, Vec::new())).collect())
    }
}

impl LayerEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group detections by their category's layer.
    pub fn from_detections<'a, I>(detections: I) -> Self
    where
        I: IntoIterator<Item = &'a Detection>,
    {
        let mut ev = Self::new();
        for d in detections {
            ev.push(d.clone());
        }
        ev
    }

    /// Add a detection to its layer, keeping the layer sorted strongest first.
    pub fn push(&mut self, detection: Detection) {
        let list = self.0.entry(detection.layer()).or_default();
        list.push(detection);
        list.sort_by(compare_detections);
    }

    pub fn get(&self, layer: Layer) -> &[Detection] {
        self.0.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Layers in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Layer, &[Detection])> {
        self.0.iter().map(|(l, d)| (*l, d.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Strongest first, then by vendor and product for a stable order.
fn compare_detections(a: &Detection, b: &Detection) -> std::cmp::Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.vendor.cmp(&b.vendor))
        .then_with(|| a.product.cmp(&b.product))
}

/// Lowercased views of the signals each pattern kind matches against.
struct Haystack {
    blob: String,
    domains: Vec<String>,
    cookies: Vec<String>,
}

impl Haystack {
    fn new(signals: &CrawlSignals) -> Self {
        let mut domains: Vec<String> = signals
            .asset_domains
            .iter()
            .map(|d| d.to_lowercase())
            .collect();
        if let Some(d) = &signals.booking_flow.final_domain {
            domains.push(d.to_lowercase());
        }
        let cookies: Vec<String> = signals
            .cookie_keys
            .iter()
            .chain(signals.booking_flow.cookie_keys.iter())
            .map(|c| c.to_lowercase())
            .collect();

        let mut blob = String::with_capacity(signals.combined_text_blob.len() + 4096);
        blob.push_str(&signals.combined_text_blob);
        blob.push('\n');
        blob.push_str(&signals.visible_text);
        for d in &domains {
            blob.push('\n');
            blob.push_str(d);
        }
        for c in &cookies {
            blob.push('\n');
            blob.push_str(c);
        }
        for (k, v) in &signals.merged_headers {
            blob.push('\n');
            blob.push_str(k);
            blob.push_str(": ");
            blob.push_str(v);
        }
        blob.push('\n');
        blob.push_str(&signals.booking_flow.searchable_text());

        Self {
            blob: blob.to_lowercase(),
            domains,
            cookies,
        }
    }

    fn matches(&self, p: &CompiledPattern) -> bool {
        match p.pattern.kind {
            PatternKind::DomainContains => self.domains.iter().any(|d| d.contains(&p.needle)),
            PatternKind::TextContains => self.blob.contains(&p.needle),
            PatternKind::TextRegex => p.regex.as_ref().is_some_and(|re| re.is_match(&self.blob)),
            PatternKind::CookieContains => self.cookies.iter().any(|c| c.contains(&p.needle)),
        }
    }
}

/// Evaluate every rule against `signals`.
///
/// Pure: the same signals and rules always give the same output. Detections
/// are ordered strongest first; `LayerEvidence` holds the same detections
/// grouped by layer.
pub fn detect(signals: &CrawlSignals, rules: &RuleSet) -> (Vec<Detection>, LayerEvidence) {
    let haystack = Haystack::new(signals);
    let mut detections: Vec<Detection> = rules
        .rules()
        .iter()
        .filter_map(|rule| evaluate(rule, &haystack))
        .collect();
    detections.sort_by(compare_detections);

    debug!(rules = rules.len(), detections = detections.len(), "detection complete");
    let evidence = LayerEvidence::from_detections(&detections);
    (detections, evidence)
}

fn evaluate(rule: &CompiledRule, haystack: &Haystack) -> Option<Detection> {
    let mut confidence: f64 = 0.0;
    let mut evidence = Vec::new();
    for p in &rule.patterns {
        if haystack.matches(p) {
            confidence = confidence.max(p.pattern.weight);
            evidence.push(p.pattern.describe());
        }
    }
    let confidence = confidence.clamp(0.0, 1.0);
    let label = DetectionLabel::for_source(confidence, DetectionSource::PublicSignal)?;

    Some(Detection {
        vendor: rule.rule.vendor.clone(),
        product: rule.rule.product.clone(),
        category: normalize_category(&rule.rule.category),
        confidence,
        label,
        source: DetectionSource::PublicSignal,
        evidence,
    })
}

/// Operator-supplied vendor names for the four confirmable slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmedSystems {
    pub pms: Option<String>,
    pub booking_engine: Option<String>,
    pub channel_manager: Option<String>,
    pub crm: Option<String>,
}

impl ConfirmedSystems {
    /// `(category, vendor)` for every slot holding a real vendor name.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("pms", self.pms.as_deref()),
            ("booking_engine", self.booking_engine.as_deref()),
            ("channel_manager_crs", self.channel_manager.as_deref()),
            ("crm_guest_db", self.crm.as_deref()),
        ]
        .into_iter()
        .filter_map(|(cat, v)| v.and_then(meaningful_vendor).map(|v| (cat, v)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Trimmed vendor name, or `None` for blanks and "none"/"not provided".
fn meaningful_vendor(name: &str) -> Option<&str> {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    if trimmed.is_empty() || lower == "none" || lower == "not provided" {
        None
    } else {
        Some(trimmed)
    }
}

/// Add operator-confirmed systems to both detection views.
///
/// Each confirmed system becomes a confidence-1.0 `customerConfirmed`
/// detection. A public detection of the same vendor in the same layer is
/// superseded.
pub fn inject_confirmed(
    detections: &mut Vec<Detection>,
    evidence: &mut LayerEvidence,
    confirmed: &ConfirmedSystems,
) {
    for (category, vendor) in confirmed.entries() {
        let d = Detection {
            vendor: vendor.to_string(),
            product: String::new(),
            category: category.to_string(),
            confidence: 1.0,
            label: DetectionLabel::Confirmed,
            source: DetectionSource::CustomerConfirmed,
            evidence: vec!["confirmed by operator".to_string()],
        };
        let layer = d.layer();
        let key = vendor.to_lowercase();
        detections.retain(|x| !(x.layer() == layer && x.vendor.to_lowercase() == key));
        if let Some(list) = evidence.0.get_mut(&layer) {
            list.retain(|x| x.vendor.to_lowercase() != key);
        }
        detections.push(d.clone());
        evidence.push(d);
    }
    detections.sort_by(compare_detections);
}
