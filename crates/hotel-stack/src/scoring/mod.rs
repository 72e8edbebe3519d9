//! Layer scoring engine.
//!
//! Each layer scores in `[baseline, max_score]`:
//!
//! ```text
//! strength_i = confidence_i × source_multiplier_i
//! avg        = mean of the top-N strengths
//! score      = clamp(baseline + avg × uplift, baseline, max_score)
//! ```
//!
//! A layer with no evidence sits at baseline, not zero: absence of a public
//! signal is not absence of a system. The overall score is the weighted sum
//! of `score / max_score × 100`. Raising any one detection's confidence can
//! never lower the overall score.

pub mod comparison;
pub mod opportunity;
pub mod policy;
pub mod priorities;
pub mod summary;

pub use comparison::{compare, Comparison, LayerDelta};
pub use opportunity::{opportunity_model, OpportunityModel, PropertyInputs};
pub use policy::{PeerBenchmark, ScoringPolicy, SourceMultipliers};
pub use priorities::{exec_priorities, ExecPriority};
pub use summary::{stack_view, EvidenceStrength, StackEntry, VisibilityStatus};

use crate::detection::{Detection, DetectionLabel, LayerEvidence};
use crate::error::ScoringAnomaly;
use crate::layers::Layer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Entries kept in [`LayerScore::top_signals`].
pub const MAX_TOP_SIGNALS: usize = 4;

/// How a layer's score was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerState {
    /// No evidence; the layer sits at baseline.
    InferredBaseline,
    /// Public signals only.
    Observed,
    /// At least one operator-confirmed or `confirmed`-label detection.
    Confirmed,
}

/// Score of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerScore {
    pub layer: Layer,
    pub score: f64,
    pub out_of: f64,
    pub weight: f64,
    pub state: LayerState,
    /// Strongest detections as `"Vendor Product"`, strongest first.
    pub top_signals: Vec<String>,
}

/// A–E grade of the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    /// 81+ A, 61+ B, 41+ C, 21+ D, else E.
    pub fn from_score(score: u32) -> Self {
        match score {
            81.. => Self::A,
            61..=80 => Self::B,
            41..=60 => Self::C,
            21..=40 => Self::D,
            _ => Self::E,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        };
        f.write_str(s)
    }
}

/// Position of the overall score relative to the peer benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BenchmarkBand {
    BelowTypical,
    WithinTypical,
    AboveTypical,
}

/// Overall score read against the peer benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub band: BenchmarkBand,
    pub summary: String,
    pub typical_range: (f64, f64),
    pub best_in_class: f64,
    /// Points between the overall score and best-in-class; zero at or above it.
    pub gap_to_best_in_class: f64,
}

impl Interpretation {
    pub fn new(overall: u32, benchmark: &policy::PeerBenchmark) -> Self {
        let score = f64::from(overall);
        let (low, high) = benchmark.typical_range;
        let (band, summary) = if score < low {
            (
                BenchmarkBand::BelowTypical,
                "Below typical range: suggests fragmented integration rather than lack of systems.",
            )
        } else if score <= high {
            (
                BenchmarkBand::WithinTypical,
                "Within typical range: indicates solid foundations with optimisation opportunity.",
            )
        } else {
            (
                BenchmarkBand::AboveTypical,
                "Above typical range: indicates strong integration and automation.",
            )
        };
        Self {
            band,
            summary: summary.to_string(),
            typical_range: benchmark.typical_range,
            best_in_class: benchmark.best_in_class,
            gap_to_best_in_class: (benchmark.best_in_class - score).max(0.0),
        }
    }
}

/// Output of [`score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// One entry per layer, canonical order.
    pub layer_scores: Vec<LayerScore>,
    pub overall_score: u32,
    pub grade: Grade,
    pub interpretation: Interpretation,
    /// Layers whose computation was replaced with baseline.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub anomalies: Vec<String>,
}

impl ScoreResult {
    pub fn layer(&self, layer: Layer) -> Option<&LayerScore> {
        self.layer_scores.iter().find(|s| s.layer == layer)
    }
}

/// Score every layer and the overall result. Total: never fails.
pub fn score(evidence: &LayerEvidence, policy: &ScoringPolicy) -> ScoreResult {
    let mut layer_scores = Vec::with_capacity(Layer::ALL.len());
    let mut anomalies = Vec::new();
    let mut weighted = 0.0;

    for layer in Layer::ALL {
        let ls = match score_layer(layer, evidence.get(layer), policy) {
            Ok(ls) => ls,
            Err(anomaly) => {
                warn!(layer = %layer, reason = %anomaly.reason, "scoring anomaly, using baseline");
                anomalies.push(anomaly.to_string());
                baseline_score(layer, policy)
            }
        };
        weighted += ls.score / policy.max_score * 100.0 * ls.weight;
        layer_scores.push(ls);
    }

    let overall = if weighted.is_finite() {
        weighted.round().clamp(0.0, 100.0) as u32
    } else {
        0
    };

    for ls in &mut layer_scores {
        ls.score = round2(ls.score);
    }

    ScoreResult {
        layer_scores,
        overall_score: overall,
        grade: Grade::from_score(overall),
        interpretation: Interpretation::new(overall, &policy.benchmark),
        anomalies,
    }
}

fn baseline_score(layer: Layer, policy: &ScoringPolicy) -> LayerScore {
    LayerScore {
        layer,
        score: policy.baseline,
        out_of: policy.max_score,
        weight: sanitize_weight(policy.weight(layer)),
        state: LayerState::InferredBaseline,
        top_signals: Vec::new(),
    }
}

fn sanitize_weight(w: f64) -> f64 {
    if w.is_finite() && w > 0.0 {
        w
    } else {
        0.0
    }
}

/// Score one layer. Non-finite intermediate values are an anomaly.
pub fn score_layer(
    layer: Layer,
    detections: &[Detection],
    policy: &ScoringPolicy,
) -> Result<LayerScore, ScoringAnomaly> {
    let anomaly = |reason: String| ScoringAnomaly {
        layer: layer.name().to_string(),
        reason,
    };

    if detections.is_empty() {
        return Ok(baseline_score(layer, policy));
    }

    let mut ranked: Vec<(f64, &Detection)> = Vec::with_capacity(detections.len());
    for d in detections {
        if !d.confidence.is_finite() {
            return Err(anomaly(format!("non-finite confidence for {}", d.vendor)));
        }
        let strength = d.confidence.clamp(0.0, 1.0) * policy.source_multipliers.for_source(d.source);
        ranked.push((strength, d));
    }
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let top_n = policy.top_n.max(1);
    let top: Vec<f64> = ranked.iter().take(top_n).map(|(s, _)| *s).collect();
    let avg = top.iter().sum::<f64>() / top.len() as f64;
    let raw = policy.baseline + avg * policy.uplift;
    if !raw.is_finite() {
        return Err(anomaly(format!("non-finite layer score {raw}")));
    }
    let score = raw.clamp(policy.baseline, policy.max_score.max(policy.baseline));

    let confirmed = detections
        .iter()
        .any(|d| d.is_customer_confirmed() || d.label == DetectionLabel::Confirmed);
    let state = if confirmed {
        LayerState::Confirmed
    } else {
        LayerState::Observed
    };

    let top_signals = ranked
        .iter()
        .take(MAX_TOP_SIGNALS)
        .map(|(_, d)| signal_name(d))
        .collect();

    Ok(LayerScore {
        layer,
        score,
        out_of: policy.max_score,
        weight: sanitize_weight(policy.weight(layer)),
        state,
        top_signals,
    })
}

/// `"Vendor Product"`, or just the vendor when there is no product.
pub(crate) fn signal_name(d: &Detection) -> String {
    format!("{} {}", d.vendor.trim(), d.product.trim())
        .trim()
        .to_string()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
