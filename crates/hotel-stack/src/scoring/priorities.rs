//! Opinionated top-three executive priorities.
//!
//! Driven by two facts only: the inferred segment, and whether a tag
//! manager is already in place to build measurement on.

use crate::detection::{Detection, DetectionLabel};
use crate::segment::SegmentInference;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecPriority {
    pub title: String,
    pub why_now: String,
    pub what_good_looks_like: Vec<String>,
    pub exec_questions: Vec<String>,
}

impl ExecPriority {
    fn new(title: &str, why_now: &str, good: &[&str], questions: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            why_now: why_now.to_string(),
            what_good_looks_like: good.iter().map(|s| s.to_string()).collect(),
            exec_questions: questions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Google Tag Manager seen with confirmed-level confidence.
pub fn has_tag_manager(detections: &[Detection]) -> bool {
    detections.iter().any(|d| {
        d.vendor.trim().eq_ignore_ascii_case("google")
            && d.product.trim().eq_ignore_ascii_case("tag manager")
            && DetectionLabel::from_confidence(d.confidence) == Some(DetectionLabel::Confirmed)
    })
}

/// Three priorities, most foundational first.
pub fn exec_priorities(segment: &SegmentInference, detections: &[Detection]) -> Vec<ExecPriority> {
    let mut priorities = Vec::with_capacity(3);

    priorities.push(ExecPriority::new(
        "Map the end-to-end data flow (rooms → guest identity → marketing → reporting) and fix integration breakpoints",
        "Integration health is the main constraint on automation, attribution accuracy, and CRM personalisation.",
        &[
            "Single guest identity across booking engine, PMS, spa/events (where applicable), and marketing systems",
            "Clean conversion events into GA4 and accurate channel attribution for direct bookings",
            "Daily/weekly commercial dashboard fed from source systems (not spreadsheets)",
        ],
        &[
            "Where does guest identity fragment today (rooms vs spa vs events)?",
            "Which integrations are brittle/manual, and what fails silently?",
            "What metrics are we trusting that are actually modelled or estimated?",
        ],
    ));

    priorities.push(if has_tag_manager(detections) {
        ExecPriority::new(
            "Turn GTM into true full-funnel measurement (GA4 + booking engine events + metasearch hygiene)",
            "You have the foundation (GTM) but without clean GA4 and conversion plumbing you cannot steer spend confidently.",
            &[
                "GA4 configured with consistent event schema across site + booking engine",
                "Meta + paid channels receiving correct conversion signals (value + room nights if possible)",
                "Attribution model documented and stable (no constant tag churn)",
            ],
            &[
                "Can we reconcile marketing reporting to actual bookings without debate?",
                "Do we track abandon, step completion, and failure points in the booking journey?",
                "Is metasearch measured on incrementality or just last-click?",
            ],
        )
    } else {
        ExecPriority::new(
            "Establish a measurement backbone (GTM + GA4 + conversion plumbing)",
            "Without a measurement backbone, improvements in pricing and distribution will be hard to prove and sustain.",
            &[
                "GTM deployed with governance and change control",
                "GA4 capturing booking-engine events reliably",
                "Marketing ROI available by channel with confidence",
            ],
            &[
                "What percentage of bookings are unattributed/unknown today?",
                "Which channel metrics do we not trust (and why)?",
            ],
        )
    });

    priorities.push(if segment.segment.to_lowercase().contains("luxury") {
        ExecPriority::new(
            "Reduce manual revenue decisions: pricing guardrails + demand signals + forecast discipline",
            "Luxury/destination hotels leak revenue through slow reaction time and human override; guardrails create consistency.",
            &[
                "Clear pricing rules + exceptions policy",
                "Forecast cadence tied to events/pace and demand signals",
                "Documented strategy by segment (weekday corporate vs leisure peaks)",
            ],
            &[
                "Where are we overriding recommendations most often, and are we right?",
                "Do we have a single view of pace, pickup, and displacement across segments?",
            ],
        )
    } else {
        ExecPriority::new(
            "Tighten direct mix economics: channel strategy + parity + conversion optimisation",
            "Direct mix is the fastest path to profit; the work is usually operationally simple but requires discipline.",
            &[
                "Defined channel roles (OTA vs metasearch vs brand search)",
                "Parity monitored and enforced",
                "Booking journey conversion improved with measurable tests",
            ],
            &[
                "What is our true net cost of acquisition by channel?",
                "Where do we lose customers in the booking flow?",
            ],
        )
    });

    priorities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionSource;
    use crate::segment::infer_segment;

    fn gtm(confidence: f64) -> Detection {
        Detection {
            vendor: "Google".into(),
            product: "Tag Manager".into(),
            category: "tag_management".into(),
            confidence,
            label: DetectionLabel::Probable,
            source: DetectionSource::PublicSignal,
            evidence: vec!["domainContains:googletagmanager.com".into()],
        }
    }

    #[test]
    fn test_luxury_with_gtm() {
        let segment = infer_segment("Luxury spa suites near the cathedral", "https://grand.test/");
        let p = exec_priorities(&segment, &[gtm(0.9)]);
        assert_eq!(p.len(), 3);
        assert!(p[0].title.starts_with("Map the end-to-end data flow"));
        assert!(p[1].title.starts_with("Turn GTM into true full-funnel measurement"));
        assert!(p[2].title.starts_with("Reduce manual revenue decisions"));
    }

    #[test]
    fn test_independent_without_gtm() {
        let segment = infer_segment("A small guesthouse.", "https://inn.test/");
        let p = exec_priorities(&segment, &[]);
        assert!(p[1].title.starts_with("Establish a measurement backbone"));
        assert!(p[2].title.starts_with("Tighten direct mix economics"));
        assert_eq!(p[1].exec_questions.len(), 2);
    }

    #[test]
    fn test_weak_gtm_signal_does_not_count() {
        assert!(!has_tag_manager(&[gtm(0.6)]));
        assert!(has_tag_manager(&[gtm(0.85)]));
        let mut other = gtm(0.95);
        other.product = "Analytics 4".into();
        assert!(!has_tag_manager(&[other]));
    }
}
