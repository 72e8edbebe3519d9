//! Vendor detection: declarative rules evaluated against crawl signals.

pub mod detector;
pub mod rules;

pub use detector::{
    detect, inject_confirmed, ConfirmedSystems, Detection, DetectionLabel, DetectionSource,
    LayerEvidence,
};
pub use rules::{CompiledRule, DetectionRule, Pattern, PatternKind, RuleSet};
