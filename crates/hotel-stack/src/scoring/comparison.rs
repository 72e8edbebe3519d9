//! Property-versus-competitor comparison of two scored analyses.

use super::ScoreResult;
use crate::layers::Layer;
use serde::{Deserialize, Serialize};

/// Notes kept per comparison.
const MAX_NOTES: usize = 4;
/// Layer gaps smaller than this are not called out in notes.
const NOTABLE_LAYER_GAP: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDelta {
    pub layer: Layer,
    /// Property score minus competitor score, out of 5.
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Property overall minus competitor overall.
    pub score_delta: i64,
    /// Canonical layer order.
    pub layer_deltas: Vec<LayerDelta>,
    pub booking_domain_a: Option<String>,
    pub booking_domain_b: Option<String>,
    pub notes: Vec<String>,
}

/// Compare the property (`a`) against a competitor (`b`).
pub fn compare(
    a: &ScoreResult,
    b: &ScoreResult,
    booking_domain_a: Option<&str>,
    booking_domain_b: Option<&str>,
) -> Comparison {
    let score_delta = i64::from(a.overall_score) - i64::from(b.overall_score);

    let layer_deltas: Vec<LayerDelta> = Layer::ALL
        .iter()
        .map(|&layer| {
            let sa = a.layer(layer).map_or(0.0, |s| s.score);
            let sb = b.layer(layer).map_or(0.0, |s| s.score);
            LayerDelta {
                layer,
                delta: ((sa - sb) * 100.0).round() / 100.0,
            }
        })
        .collect();

    let mut notes = Vec::new();
    match score_delta {
        d if d > 0 => notes.push(format!("Property leads the competitor by {d} points overall.")),
        d if d < 0 => notes.push(format!("Competitor leads the property by {} points overall.", -d)),
        _ => notes.push("Property and competitor score level overall.".to_string()),
    }

    match (booking_domain_a, booking_domain_b) {
        (Some(x), Some(y)) if x.eq_ignore_ascii_case(y) => {
            notes.push(format!("Both booking flows resolve to {x}."))
        }
        (Some(_), None) => notes.push("No booking flow was resolved for the competitor.".to_string()),
        (None, Some(_)) => notes.push("No booking flow was resolved for the property.".to_string()),
        _ => {}
    }

    let mut gaps: Vec<&LayerDelta> = layer_deltas
        .iter()
        .filter(|d| d.delta.abs() >= NOTABLE_LAYER_GAP)
        .collect();
    gaps.sort_by(|x, y| y.delta.abs().total_cmp(&x.delta.abs()));
    for gap in gaps {
        if notes.len() >= MAX_NOTES {
            break;
        }
        let who = if gap.delta > 0.0 { "Property" } else { "Competitor" };
        notes.push(format!(
            "{who} shows stronger {} signals ({:+.1}).",
            gap.layer, gap.delta
        ));
    }

    Comparison {
        score_delta,
        layer_deltas,
        booking_domain_a: booking_domain_a.map(str::to_string),
        booking_domain_b: booking_domain_b.map(str::to_string),
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Detection, DetectionLabel, DetectionSource, LayerEvidence};
    use crate::scoring::{score, ScoringPolicy};

    fn scored(categories: &[&str]) -> ScoreResult {
        let mut ev = LayerEvidence::new();
        for (i, cat) in categories.iter().enumerate() {
            ev.push(Detection {
                vendor: format!("V{i}"),
                product: String::new(),
                category: cat.to_string(),
                confidence: 1.0,
                label: DetectionLabel::Confirmed,
                source: DetectionSource::CustomerConfirmed,
                evidence: vec![],
            });
        }
        score(&ev, &ScoringPolicy::default())
    }

    #[test]
    fn test_compare_deltas() {
        let a = scored(&["pms", "booking_engine"]);
        let b = scored(&[]);
        let cmp = compare(&a, &b, Some("be.synxis.com"), None);

        assert_eq!(cmp.score_delta, i64::from(a.overall_score) - 48);
        assert!(cmp.score_delta > 0);
        assert_eq!(cmp.layer_deltas.len(), 7);
        assert_eq!(cmp.layer_deltas[0].layer, Layer::Distribution);
        assert_eq!(cmp.layer_deltas[0].delta, 2.6);
        assert_eq!(cmp.layer_deltas[2].delta, 0.0);
        assert!(cmp.notes.len() <= MAX_NOTES);
        assert!(cmp.notes[0].starts_with("Property leads"));
        assert_eq!(cmp.booking_domain_a.as_deref(), Some("be.synxis.com"));
    }

    #[test]
    fn test_compare_identical() {
        let a = scored(&[]);
        let cmp = compare(&a, &a, Some("x.test"), Some("X.test"));
        assert_eq!(cmp.score_delta, 0);
        assert!(cmp.layer_deltas.iter().all(|d| d.delta == 0.0));
        assert_eq!(cmp.notes.len(), 2);
    }
}
