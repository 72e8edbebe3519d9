//! Light, explainable hotel-segment inference from public page text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const LUXURY_CUES: &[&str] = &[
    "grand",
    "luxury",
    "five-star",
    "5-star",
    "spa",
    "afternoon tea",
    "suite",
    "heritage",
    "historic",
    "fine dining",
    "champagne",
];

/// Also matched against the URL.
const DESTINATION_CUES: &[&str] = &[
    "york",
    "cathedral",
    "city centre",
    "city center",
    "landmark",
    "rail",
    "station",
    "walk to",
    "minutes from",
];

const MAX_CUES_PER_LINE: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentInference {
    pub segment: String,
    pub confidence: String,
    pub evidence: Vec<String>,
    pub implications: Vec<String>,
}

/// Infer a segment from visible text and the site URL.
pub fn infer_segment(public_text: &str, url: &str) -> SegmentInference {
    let text = public_text.to_lowercase();
    let url = url.to_lowercase();

    let luxury: BTreeSet<&str> = LUXURY_CUES
        .iter()
        .copied()
        .filter(|c| text.contains(c))
        .collect();
    let destination: BTreeSet<&str> = DESTINATION_CUES
        .iter()
        .copied()
        .filter(|c| text.contains(c) || url.contains(c))
        .collect();

    let mut evidence = Vec::new();
    if !luxury.is_empty() {
        evidence.push(cue_line("Luxury cues", &luxury));
    }
    if !destination.is_empty() {
        evidence.push(cue_line("Destination cues", &destination));
    }

    let (segment, confidence, implications): (&str, &str, &[&str]) =
        match (luxury.is_empty(), destination.is_empty()) {
            (false, false) => (
                "Luxury destination hotel",
                "Medium",
                &[
                    "Likely multi-department revenue centres (rooms, F&B, spa, events), so guest data fragmentation risk is high.",
                    "Attribution and channel mix are typically more complex; GA4 and booking-engine event hygiene is a common leak.",
                    "Integration health matters more than tool count: map data flows before changing vendors.",
                ],
            ),
            (false, true) => (
                "Luxury independent hotel",
                "Low–Medium",
                &[
                    "Premium positioning makes direct booking and repeat behaviour the key levers.",
                    "CRM orchestration and identity resolution are typically under-utilised.",
                    "Integration health is usually the maturity constraint.",
                ],
            ),
            _ => (
                "Independent hotel",
                "Low",
                &["Benchmark context should be broad; focus on foundational tracking and distribution hygiene first."],
            ),
        };

    if evidence.is_empty() {
        evidence.push("No strong segment cues detected in sampled public text.".to_string());
    }

    SegmentInference {
        segment: segment.to_string(),
        confidence: confidence.to_string(),
        evidence,
        implications: implications.iter().map(|s| s.to_string()).collect(),
    }
}

fn cue_line(label: &str, cues: &BTreeSet<&str>) -> String {
    let listed: Vec<&str> = cues.iter().copied().take(MAX_CUES_PER_LINE).collect();
    format!("{label}: {}", listed.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luxury_destination() {
        let s = infer_segment(
            "The Grand. Afternoon tea and a spa, five minutes from the cathedral.",
            "https://thegrandyork.test/",
        );
        assert_eq!(s.segment, "Luxury destination hotel");
        assert_eq!(s.confidence, "Medium");
        assert_eq!(s.evidence[0], "Luxury cues: afternoon tea, grand, spa");
        assert_eq!(s.evidence[1], "Destination cues: cathedral, minutes from, york");
        assert_eq!(s.implications.len(), 3);
    }

    #[test]
    fn test_luxury_only() {
        let s = infer_segment("Historic suites and champagne on arrival", "https://h.test/");
        assert_eq!(s.segment, "Luxury independent hotel");
        assert_eq!(s.evidence.len(), 1);
    }

    #[test]
    fn test_destination_cues_alone_stay_independent() {
        let s = infer_segment("Two minutes from the station", "");
        assert_eq!(s.segment, "Independent hotel");
        assert_eq!(s.confidence, "Low");
        assert_eq!(s.evidence, vec!["Destination cues: minutes from, station".to_string()]);
    }

    #[test]
    fn test_no_cues() {
        let s = infer_segment("", "");
        assert_eq!(s.segment, "Independent hotel");
        assert_eq!(
            s.evidence,
            vec!["No strong segment cues detected in sampled public text.".to_string()]
        );
    }

    #[test]
    fn test_cue_line_capped() {
        let s = infer_segment(
            "grand luxury five-star 5-star spa afternoon tea suite heritage historic",
            "",
        );
        let listed = s.evidence[0].trim_start_matches("Luxury cues: ").split(", ").count();
        assert_eq!(listed, MAX_CUES_PER_LINE);
    }
}
