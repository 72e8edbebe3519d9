// Copyright 2026 Hotel Stack Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hotel Stack: infer a hotel's technology stack from its public website.
//!
//! The pipeline is three stages, each usable on its own:
//!
//! 1. [`crawl::crawl_signals`] runs one bounded crawl (home page, well-known
//!    paths, capped internal links, booking-flow redirects) and returns an
//!    immutable [`CrawlSignals`] bundle.
//! 2. [`detection::detect`] evaluates a [`RuleSet`] against those signals and
//!    groups the [`Detection`]s into the seven canonical [`Layer`]s.
//! 3. [`scoring::score`] turns the per-layer evidence into 0–5 layer scores
//!    and a 0–100 overall score, with a non-zero baseline for silent layers.
//!
//! [`Analyzer`] strings the stages together and adds the stack view, segment
//! inference, executive priorities, the opportunity model and competitor
//! comparison.

pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod crawl;
pub mod detection;
pub mod error;
pub mod layers;
pub mod scoring;
pub mod segment;

pub use analysis::{AnalysisReport, Analyzer, CrawlSummary, PairReport};
pub use config::ScanConfig;
pub use crawl::{crawl_signals, BookingFlowEvidence, CrawlSignals};
pub use detection::{
    detect, ConfirmedSystems, Detection, DetectionLabel, DetectionRule, DetectionSource,
    LayerEvidence, RuleSet,
};
pub use error::{ConfigError, CrawlError, CrawlIssue, FetchError, FetchErrorKind, RuleError};
pub use layers::Layer;
pub use scoring::{
    score, ExecPriority, Grade, LayerScore, LayerState, OpportunityModel, PropertyInputs,
    ScoreResult, ScoringPolicy,
};
