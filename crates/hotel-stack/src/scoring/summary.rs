//! Per-layer stack view: what is visible, the likeliest vendor, and how
//! strong the evidence is. An explanatory label, not a claim of usage.

use super::signal_name;
use crate::detection::LayerEvidence;
use crate::layers::Layer;
use serde::{Deserialize, Serialize};

const DEFAULT_PROOF_PATH: &str =
    "Follow booking journey redirects and inspect scripts/cookies for vendor signals.";

/// Whether a layer was seen in public signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisibilityStatus {
    Observed,
    /// Site reached, nothing seen. Absence of a signal, not of a system.
    Inferred,
    /// Site never reached; nothing can be said.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EvidenceStrength {
    Low,
    Medium,
    High,
}

impl EvidenceStrength {
    /// High ≥0.85, Medium ≥0.55, else Low.
    pub fn from_confidence(best: f64) -> Self {
        if best >= 0.85 {
            Self::High
        } else if best >= 0.55 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEntry {
    pub layer: Layer,
    pub status: VisibilityStatus,
    pub primary_candidate: Option<String>,
    pub evidence_strength: EvidenceStrength,
    /// Where the primary candidate was seen, or how to look for one.
    pub proof_path: String,
}

/// One entry per layer, canonical order.
///
/// `site_reached` decides how silent layers read: inferred when the crawl
/// saw the site, unresolved when it never got past the home page.
pub fn stack_view(evidence: &LayerEvidence, site_reached: bool) -> Vec<StackEntry> {
    let silent = if site_reached {
        VisibilityStatus::Inferred
    } else {
        VisibilityStatus::Unresolved
    };

    Layer::ALL
        .iter()
        .map(|&layer| {
            let detections = evidence.get(layer);
            let best = detections
                .iter()
                .filter(|d| d.confidence.is_finite())
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

            match best {
                Some(d) => StackEntry {
                    layer,
                    status: VisibilityStatus::Observed,
                    primary_candidate: Some(signal_name(d)).filter(|s| !s.is_empty()),
                    evidence_strength: EvidenceStrength::from_confidence(d.confidence),
                    proof_path: d
                        .evidence
                        .first()
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_PROOF_PATH.to_string()),
                },
                None => StackEntry {
                    layer,
                    status: silent,
                    primary_candidate: None,
                    evidence_strength: EvidenceStrength::Low,
                    proof_path: DEFAULT_PROOF_PATH.to_string(),
                },
            }
        })
        .collect()
}
