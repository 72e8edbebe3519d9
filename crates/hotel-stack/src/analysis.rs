//! End-to-end analysis: crawl → detect → score, plus the report views.

use crate::config::ScanConfig;
use crate::crawl::{crawl_signals, BookingFlowEvidence, CrawlSignals};
use crate::detection::{detect, inject_confirmed, ConfirmedSystems, Detection, LayerEvidence, RuleSet};
use crate::error::{ConfigError, CrawlIssue, FetchError};
use crate::scoring::{
    compare, exec_priorities, opportunity_model, score, stack_view, Comparison, ExecPriority,
    OpportunityModel, PropertyInputs, ScoreResult, ScoringPolicy, StackEntry,
};
use crate::segment::{infer_segment, SegmentInference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::info;

/// What was crawled, without page bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSummary {
    pub root_url: String,
    pub base_origin: String,
    pub reachable: bool,
    pub pages_fetched: Vec<String>,
    pub asset_domains: BTreeSet<String>,
    pub cookie_keys: BTreeSet<String>,
    pub booking_flow: BookingFlowEvidence,
    pub structured_data_blocks: usize,
    pub errors: Vec<CrawlIssue>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub home_page_error: Option<FetchError>,
}

impl From<&CrawlSignals> for CrawlSummary {
    fn from(s: &CrawlSignals) -> Self {
        Self {
            root_url: s.root_url.clone(),
            base_origin: s.base_origin.clone(),
            reachable: s.is_reachable(),
            pages_fetched: s.pages.iter().map(|p| p.final_url.clone()).collect(),
            asset_domains: s.asset_domains.clone(),
            cookie_keys: s.cookie_keys.clone(),
            booking_flow: s.booking_flow.clone(),
            structured_data_blocks: s.structured_data.len(),
            errors: s.errors.clone(),
            home_page_error: s.home_page_error.clone(),
        }
    }
}

/// Full result of analysing one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub url: String,
    pub crawl: CrawlSummary,
    pub detections: Vec<Detection>,
    pub layer_evidence: LayerEvidence,
    pub scores: ScoreResult,
    pub stack: Vec<StackEntry>,
    pub segment: SegmentInference,
    pub priorities: Vec<ExecPriority>,
    pub opportunity: OpportunityModel,
}

impl AnalysisReport {
    pub fn booking_domain(&self) -> Option<&str> {
        self.crawl.booking_flow.final_domain.as_deref()
    }
}

/// Property and competitor analysed side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairReport {
    pub primary: AnalysisReport,
    pub competitor: AnalysisReport,
    pub comparison: Comparison,
}

/// Crawl limits, rules and scoring policy for a run of analyses.
///
/// Holds no per-analysis state: each call crawls with its own session.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: ScanConfig,
    rules: RuleSet,
    policy: ScoringPolicy,
    property: PropertyInputs,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            config: ScanConfig::default(),
            rules: RuleSet::builtin(),
            policy: ScoringPolicy::default(),
            property: PropertyInputs::default(),
        }
    }
}

impl Analyzer {
    /// Build an analyzer. The policy is validated; the config is sanitized.
    pub fn new(config: ScanConfig, rules: RuleSet, policy: ScoringPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            config: config.sanitized(),
            rules,
            policy,
            property: PropertyInputs::default(),
        })
    }

    /// Property figures for the opportunity model. Unset figures take defaults.
    pub fn with_property_inputs(mut self, property: PropertyInputs) -> Self {
        self.property = property;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Detect, inject confirmed systems, score. No network access.
    pub fn evaluate(&self, url: &str, signals: &CrawlSignals, confirmed: &ConfirmedSystems) -> AnalysisReport {
        let (mut detections, mut layer_evidence) = detect(signals, &self.rules);
        inject_confirmed(&mut detections, &mut layer_evidence, confirmed);
        let scores = score(&layer_evidence, &self.policy);
        let stack = stack_view(&layer_evidence, signals.is_reachable());
        let segment = infer_segment(&signals.visible_text, &signals.root_url);
        let priorities = exec_priorities(&segment, &detections);

        AnalysisReport {
            url: url.to_string(),
            crawl: CrawlSummary::from(signals),
            detections,
            layer_evidence,
            scores,
            stack,
            segment,
            priorities,
            opportunity: opportunity_model(&self.property),
        }
    }

    /// Crawl `url` and evaluate it.
    ///
    /// An unreachable site still yields a report: baseline scores plus any
    /// operator-confirmed systems, with the failure in `crawl.homePageError`.
    pub async fn analyze(&self, url: &str, confirmed: &ConfirmedSystems) -> AnalysisReport {
        let start = Instant::now();
        let signals = crawl_signals(url, &self.config).await;
        let report = self.evaluate(url, &signals, confirmed);
        info!(
            url,
            reachable = report.crawl.reachable,
            detections = report.detections.len(),
            overall = report.scores.overall_score,
            grade = %report.scores.grade,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "analysis complete"
        );
        report
    }

    /// Analyse a property and a competitor concurrently, then compare them.
    pub async fn analyze_pair(
        &self,
        primary_url: &str,
        primary_confirmed: &ConfirmedSystems,
        competitor_url: &str,
    ) -> PairReport {
        let none = ConfirmedSystems::default();
        let (primary, competitor) = tokio::join!(
            self.analyze(primary_url, primary_confirmed),
            self.analyze(competitor_url, &none)
        );
        let comparison = compare(
            &primary.scores,
            &competitor.scores,
            primary.booking_domain(),
            competitor.booking_domain(),
        );
        PairReport {
            primary,
            competitor,
            comparison,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use crate::layers::Layer;
    use crate::scoring::{LayerState, VisibilityStatus};
    use assert_json_diff::assert_json_include;

    #[test]
    fn test_evaluate_unreachable_with_confirmed_pms() {
        let err = FetchError::new(FetchErrorKind::HttpError, "https://h.test/", "HTTP 503");
        let signals = CrawlSignals::unreachable("https://h.test/", "https://h.test", err);
        let confirmed = ConfirmedSystems {
            pms: Some("Oracle OPERA".into()),
            ..ConfirmedSystems::default()
        };
        let report = Analyzer::default().evaluate("https://h.test/", &signals, &confirmed);

        assert!(!report.crawl.reachable);
        assert!(report.crawl.home_page_error.is_some());
        assert_eq!(report.stack[0].status, VisibilityStatus::Unresolved);
        assert_eq!(report.stack[1].status, VisibilityStatus::Observed);
        assert_eq!(report.priorities.len(), 3);
        let core = report.layer_evidence.get(Layer::CoreSystems);
        assert_eq!(core.len(), 1);
        assert_eq!(core[0].confidence, 1.0);
        assert_eq!(report.scores.layer(Layer::CoreSystems).unwrap().state, LayerState::Confirmed);
        assert_eq!(
            report.scores.layer(Layer::Distribution).unwrap().state,
            LayerState::InferredBaseline
        );
    }

    #[test]
    fn test_new_rejects_invalid_policy() {
        let mut policy = ScoringPolicy::default();
        policy.top_n = 0;
        assert!(Analyzer::new(ScanConfig::default(), RuleSet::empty(), policy).is_err());
    }

    #[test]
    fn test_property_inputs_feed_opportunity() {
        let analyzer = Analyzer::default().with_property_inputs(PropertyInputs {
            rooms: Some(120),
            occupancy: Some(0.8),
            adr: Some(200.0),
        });
        let report = analyzer.evaluate(
            "https://h.test/",
            &CrawlSignals::default(),
            &ConfirmedSystems::default(),
        );
        assert_eq!(report.opportunity.assumptions.rooms, 120);
        assert_eq!(report.opportunity.room_revenue, 7_008_000.0);
        assert_eq!(report.opportunity.uplift_range.high_gbp, 350_400.0);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = Analyzer::default().evaluate(
            "https://h.test/",
            &CrawlSignals::default(),
            &ConfirmedSystems::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["scores"]["overallScore"].is_u64());
        assert_eq!(json["stack"].as_array().unwrap().len(), 7);
        assert!(json["crawl"]["bookingFlow"]["redirectChain"].is_array());
        assert!(json["opportunity"]["upliftRange"]["lowGbp"].is_number());
        assert!(json["priorities"][0]["whyNow"].is_string());
        assert_json_include!(
            actual: json["scores"].clone(),
            expected: serde_json::json!({
                "overallScore": 48,
                "grade": "C",
                "interpretation": { "band": "belowTypical" },
                "layerScores": [
                    { "layer": "Distribution", "score": 2.4, "outOf": 5.0, "state": "inferredBaseline" }
                ]
            })
        );
    }
}
