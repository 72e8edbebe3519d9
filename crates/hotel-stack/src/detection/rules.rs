//! Declarative vendor rules and the immutable, precompiled [`RuleSet`].
//!
//! Rules arrive as JSON. Construction is lenient: malformed rules and
//! patterns are dropped with a `warn!` instead of failing the whole set, so a
//! single bad entry in an operator's rule file never disables detection.
//!
//! The default rule set is embedded with `include_str!` and only parsed when
//! a caller asks for it via [`RuleSet::builtin`].

use crate::error::RuleError;
use crate::layers::Layer;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Embedded default vendor rules.
const BUILTIN_RULES_JSON: &str = include_str!("vendor_rules.json");

/// Upper bound on a compiled regex, in bytes. Rules are external input.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// How a pattern is evaluated against crawl signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    /// Substring of a third-party asset domain or the booking final domain.
    DomainContains,
    /// Case-insensitive substring of the searchable blob.
    TextContains,
    /// Case-insensitive regex over the searchable blob.
    TextRegex,
    /// Case-insensitive substring of a cookie key.
    CookieContains,
}

/// One matchable pattern inside a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub value: String,
    /// Confidence contributed when the pattern matches, in `(0, 1]`.
    pub weight: f64,
}

impl Pattern {
    /// Human-readable description used as detection evidence.
    pub fn describe(&self) -> String {
        let kind = match self.kind {
            PatternKind::DomainContains => "domainContains",
            PatternKind::TextContains => "textContains",
            PatternKind::TextRegex => "textRegex",
            PatternKind::CookieContains => "cookieContains",
        };
        format!("{kind}:{}", self.value)
    }
}

/// A vendor rule as written in a rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRule {
    pub vendor: String,
    #[serde(default)]
    pub product: String,
    pub category: String,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
}

/// A pattern ready for matching. Lowercased needle, or a compiled regex.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    pub(crate) pattern: Pattern,
    pub(crate) needle: String,
    /// `None` for a `textRegex` that failed to compile. Such a pattern never matches.
    pub(crate) regex: Option<Regex>,
}

/// A validated rule with precompiled patterns.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: DetectionRule,
    pub layer: Layer,
    pub(crate) patterns: Vec<CompiledPattern>,
}

/// Wrapper accepted by [`RuleSet::from_json`]: either a bare array or `{"rules": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Bare(Vec<serde_json::Value>),
    Wrapped { rules: Vec<serde_json::Value> },
}

/// Immutable, validated collection of vendor rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    dropped: usize,
}

impl RuleSet {
    /// Build from already-deserialized rules, dropping malformed entries.
    ///
    /// A rule is kept when it has a vendor, a category and at least one
    /// pattern with a non-empty value and a positive weight. Weights above
    /// 1.0 are clamped.
    pub fn new(rules: Vec<DetectionRule>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut dropped = 0;

        for rule in rules {
            match compile_rule(rule) {
                Some(c) => compiled.push(c),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(dropped, kept = compiled.len(), "dropped malformed detection rules");
        }
        debug!(rules = compiled.len(), "rule set built");
        Self {
            rules: compiled,
            dropped,
        }
    }

    /// A rule set with no rules. Valid: it yields zero public detections.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a rule file. Entries that fail to deserialize are dropped like
    /// malformed rules; a file with nothing usable in it is an error.
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        let file: RuleFile = serde_json::from_str(json)?;
        let raw = match file {
            RuleFile::Bare(v) | RuleFile::Wrapped { rules: v } => v,
        };
        let total = raw.len();
        let rules: Vec<DetectionRule> = raw
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        let unparsed = total - rules.len();

        let mut set = Self::new(rules);
        set.dropped += unparsed;
        if set.rules.is_empty() && total > 0 {
            return Err(RuleError::NoUsableRules {
                dropped: set.dropped,
            });
        }
        Ok(set)
    }

    /// The embedded default rules.
    pub fn builtin() -> Self {
        match Self::from_json(BUILTIN_RULES_JSON) {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "embedded vendor rules unusable, using empty rule set");
                Self::empty()
            }
        }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// How many input rules were discarded during construction.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

fn compile_rule(rule: DetectionRule) -> Option<CompiledRule> {
    if rule.vendor.trim().is_empty() || rule.category.trim().is_empty() {
        return None;
    }

    let patterns: Vec<CompiledPattern> = rule
        .patterns
        .iter()
        .filter_map(|p| compile_pattern(&rule.vendor, p))
        .collect();
    if patterns.is_empty() {
        return None;
    }

    let layer = Layer::for_category(&rule.category);
    if !Layer::is_mapped(&rule.category) {
        debug!(vendor = %rule.vendor, category = %rule.category, layer = %layer, "unmapped category, using fallback layer");
    }
    Some(CompiledRule {
        rule,
        layer,
        patterns,
    })
}

fn compile_pattern(vendor: &str, p: &Pattern) -> Option<CompiledPattern> {
    let value = p.value.trim();
    if value.is_empty() || !p.weight.is_finite() || p.weight <= 0.0 {
        return None;
    }
    let pattern = Pattern {
        kind: p.kind,
        value: value.to_string(),
        weight: p.weight.min(1.0),
    };

    let regex = match p.kind {
        PatternKind::TextRegex => match RegexBuilder::new(value)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
        {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(vendor, pattern = value, error = %e, "invalid regex, pattern will never match");
                None
            }
        },
        _ => None,
    };

    Some(CompiledPattern {
        needle: value.to_lowercase(),
        pattern,
        regex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(vendor: &str, category: &str, patterns: Vec<Pattern>) -> DetectionRule {
        DetectionRule {
            vendor: vendor.into(),
            product: String::new(),
            category: category.into(),
            patterns,
        }
    }

    fn pat(kind: PatternKind, value: &str, weight: f64) -> Pattern {
        Pattern {
            kind,
            value: value.into(),
            weight,
        }
    }

    #[test]
    fn test_builtin_rules_load() {
        let set = RuleSet::builtin();
        assert!(set.len() >= 20);
        assert_eq!(set.dropped(), 0);
        assert!(set.rules().iter().any(|r| r.rule.vendor == "Duetto"));
    }

    #[test]
    fn test_malformed_rules_filtered() {
        let set = RuleSet::new(vec![
            rule("", "pms", vec![pat(PatternKind::TextContains, "x", 0.5)]),
            rule("NoPatterns", "pms", vec![]),
            rule("ZeroWeight", "pms", vec![pat(PatternKind::TextContains, "x", 0.0)]),
            rule("Good", "pms", vec![pat(PatternKind::TextContains, "good", 3.0)]),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.dropped(), 3);
        assert_eq!(set.rules()[0].patterns[0].pattern.weight, 1.0);
    }

    #[test]
    fn test_bad_regex_kept_but_inert() {
        let set = RuleSet::new(vec![rule(
            "Broken",
            "rms",
            vec![pat(PatternKind::TextRegex, "([unclosed", 0.8)],
        )]);
        assert_eq!(set.len(), 1);
        assert!(set.rules()[0].patterns[0].regex.is_none());
    }

    #[test]
    fn test_from_json_wrapped_and_bare() {
        let bare = r#"[{"vendor":"Duetto","category":"rms","patterns":[{"type":"domainContains","value":"duetto","weight":0.9}]}]"#;
        let wrapped = format!(r#"{{"rules": {bare}}}"#);
        assert_eq!(RuleSet::from_json(bare).unwrap().len(), 1);
        assert_eq!(RuleSet::from_json(&wrapped).unwrap().len(), 1);
    }

    #[test]
    fn test_from_json_skips_undeserializable_entries() {
        let json = r#"[
            {"vendor":"Duetto","category":"rms","patterns":[{"type":"domainContains","value":"duetto","weight":0.9}]},
            {"vendor":"Weird","category":"rms","patterns":[{"type":"telepathy","value":"x","weight":0.9}]}
        ]"#;
        let set = RuleSet::from_json(json).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.dropped(), 1);
    }

    #[test]
    fn test_from_json_nothing_usable() {
        let json = r#"[{"vendor":"","category":"rms","patterns":[]}]"#;
        assert!(matches!(
            RuleSet::from_json(json),
            Err(RuleError::NoUsableRules { dropped: 1 })
        ));
        assert!(matches!(RuleSet::from_json("not json"), Err(RuleError::Json(_))));
    }

    #[test]
    fn test_empty_json_array_is_valid() {
        let set = RuleSet::from_json("[]").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_unmapped_category_falls_back() {
        let set = RuleSet::new(vec![rule(
            "Mystery",
            "quantum_upsell",
            vec![pat(PatternKind::TextContains, "mystery", 0.5)],
        )]);
        assert_eq!(set.rules()[0].layer, crate::layers::FALLBACK_LAYER);
    }
}
