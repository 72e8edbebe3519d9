//! Scoring constants as configurable policy.

use crate::detection::DetectionSource;
use crate::error::ConfigError;
use crate::layers::Layer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance when checking that layer weights sum to 1.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Per-source strength multipliers. Customer-confirmed must outrank public.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceMultipliers {
    pub customer_confirmed: f64,
    pub public_signal: f64,
}

impl Default for SourceMultipliers {
    fn default() -> Self {
        Self {
            customer_confirmed: 1.0,
            public_signal: 0.85,
        }
    }
}

impl SourceMultipliers {
    pub fn for_source(&self, source: DetectionSource) -> f64 {
        match source {
            DetectionSource::CustomerConfirmed => self.customer_confirmed,
            DetectionSource::PublicSignal => self.public_signal,
        }
    }
}

/// Peer benchmark used to interpret the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeerBenchmark {
    /// Inclusive `(low, high)` range of a typical peer's overall score.
    pub typical_range: (f64, f64),
    pub best_in_class: f64,
}

impl Default for PeerBenchmark {
    fn default() -> Self {
        Self {
            typical_range: (50.0, 68.0),
            best_in_class: 80.0,
        }
    }
}

/// Everything the scoring engine needs besides the evidence itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringPolicy {
    /// Score of a layer with no evidence, out of `max_score`.
    pub baseline: f64,
    /// Added on top of baseline at full average strength.
    pub uplift: f64,
    pub max_score: f64,
    /// Strongest detections averaged per layer.
    pub top_n: usize,
    pub source_multipliers: SourceMultipliers,
    pub layer_weights: BTreeMap<Layer, f64>,
    pub benchmark: PeerBenchmark,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            baseline: 2.4,
            uplift: 2.6,
            max_score: 5.0,
            top_n: 4,
            source_multipliers: SourceMultipliers::default(),
            layer_weights: default_layer_weights(),
            benchmark: PeerBenchmark::default(),
        }
    }
}

/// Distribution and core systems carry the most weight.
pub fn default_layer_weights() -> BTreeMap<Layer, f64> {
    [
        (Layer::Distribution, 0.22),
        (Layer::CoreSystems, 0.22),
        (Layer::GuestDataCrm, 0.16),
        (Layer::CommercialExecution, 0.14),
        (Layer::InVenueExperience, 0.10),
        (Layer::Operations, 0.08),
        (Layer::FinanceReporting, 0.08),
    ]
    .into_iter()
    .collect()
}

impl ScoringPolicy {
    /// Parse and validate a JSON policy. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let policy: ScoringPolicy =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Weight for `layer`; zero when missing.
    pub fn weight(&self, layer: Layer) -> f64 {
        self.layer_weights.get(&layer).copied().unwrap_or(0.0)
    }

    /// Reject policies the engine cannot score sanely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("maxScore", self.max_score, 1.0, 100.0)?;
        check_range("baseline", self.baseline, 0.0, self.max_score)?;
        check_range("uplift", self.uplift, 0.0, self.max_score)?;
        check_range("topN", self.top_n as f64, 1.0, 50.0)?;

        let m = self.source_multipliers;
        check_range("sourceMultipliers.customerConfirmed", m.customer_confirmed, 0.0, 1.0)?;
        check_range("sourceMultipliers.publicSignal", m.public_signal, 0.0, 1.0)?;
        if m.customer_confirmed <= m.public_signal {
            return Err(ConfigError::MultiplierOrder {
                confirmed: m.customer_confirmed,
                public: m.public_signal,
            });
        }

        for layer in Layer::ALL {
            let weight = self.weight(layer);
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ConfigError::NonPositiveWeight {
                    layer: layer.name().to_string(),
                    weight,
                });
            }
        }
        let sum: f64 = Layer::ALL.iter().map(|l| self.weight(*l)).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::WeightSum(sum));
        }

        let (low, high) = self.benchmark.typical_range;
        check_range("benchmark.typicalRange.low", low, 0.0, 100.0)?;
        check_range("benchmark.typicalRange.high", high, low, 100.0)?;
        check_range("benchmark.bestInClass", self.benchmark.best_in_class, 0.0, 100.0)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
