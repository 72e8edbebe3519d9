//! Scenario-only commercial upside range.
//!
//! Not a forecast: a sensitivity band over room revenue, with every
//! assumption reported back so the figure can be checked by hand.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ROOMS: u32 = 60;
pub const DEFAULT_OCCUPANCY: f64 = 0.72;
pub const DEFAULT_ADR: f64 = 140.0;

const LOW_UPLIFT_PCT: f64 = 0.013;
const HIGH_UPLIFT_PCT: f64 = 0.05;
const NIGHTS_PER_YEAR: f64 = 365.0;

const PRIMARY_LEVERS: &[&str] = &[
    "Pricing accuracy and rate agility",
    "Direct mix and OTA cost control",
    "Repeat revenue via guest data automation",
    "Reduced manual reporting overhead",
];

const DISCLOSURE: &str = "Scenario modelling only. Based on room revenue sensitivity to improved \
                          commercial execution. Excludes F&B/events/spa uplift, longer-term LTV \
                          compounding, and portfolio effects.";

/// Operator-supplied property figures. Missing values take the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyInputs {
    pub rooms: Option<u32>,
    /// Fraction of rooms sold, `0.0..=1.0`.
    pub occupancy: Option<f64>,
    /// Average daily rate, GBP.
    pub adr: Option<f64>,
}

/// The figures the model actually ran on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub rooms: u32,
    pub occupancy: f64,
    pub adr: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpliftRange {
    pub low_pct: f64,
    pub high_pct: f64,
    pub low_gbp: f64,
    pub high_gbp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityModel {
    pub assumptions: Assumptions,
    /// Annual room revenue, GBP, two decimals.
    pub room_revenue: f64,
    pub uplift_range: UpliftRange,
    pub primary_levers: Vec<String>,
    pub disclosure: String,
}

/// Build the upside band for `inputs`.
///
/// A negative or non-finite input yields zero room revenue and a zero band.
pub fn opportunity_model(inputs: &PropertyInputs) -> OpportunityModel {
    let assumptions = Assumptions {
        rooms: inputs.rooms.unwrap_or(DEFAULT_ROOMS),
        occupancy: inputs.occupancy.unwrap_or(DEFAULT_OCCUPANCY),
        adr: inputs.adr.unwrap_or(DEFAULT_ADR),
    };

    let revenue =
        f64::from(assumptions.rooms) * NIGHTS_PER_YEAR * assumptions.occupancy * assumptions.adr;
    let room_revenue = if revenue.is_finite() && revenue >= 0.0 {
        revenue
    } else {
        0.0
    };

    OpportunityModel {
        assumptions,
        room_revenue: (room_revenue * 100.0).round() / 100.0,
        uplift_range: UpliftRange {
            low_pct: LOW_UPLIFT_PCT,
            high_pct: HIGH_UPLIFT_PCT,
            low_gbp: (room_revenue * LOW_UPLIFT_PCT).round(),
            high_gbp: (room_revenue * HIGH_UPLIFT_PCT).round(),
        },
        primary_levers: PRIMARY_LEVERS.iter().map(|s| s.to_string()).collect(),
        disclosure: DISCLOSURE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let model = opportunity_model(&PropertyInputs::default());
        assert_eq!(
            model.assumptions,
            Assumptions {
                rooms: 60,
                occupancy: 0.72,
                adr: 140.0
            }
        );
        assert_eq!(model.room_revenue, 2_207_520.0);
        assert_eq!(model.uplift_range.low_gbp, 28_698.0);
        assert_eq!(model.uplift_range.high_gbp, 110_376.0);
        assert_eq!(model.primary_levers.len(), 4);
        assert!(model.disclosure.starts_with("Scenario modelling only"));
    }

    #[test]
    fn test_partial_inputs_keep_other_defaults() {
        let model = opportunity_model(&PropertyInputs {
            rooms: Some(100),
            ..PropertyInputs::default()
        });
        assert_eq!(model.assumptions.rooms, 100);
        assert_eq!(model.assumptions.adr, DEFAULT_ADR);
        assert_eq!(model.room_revenue, 3_679_200.0);
        assert!(model.uplift_range.low_gbp < model.uplift_range.high_gbp);
    }

    #[test]
    fn test_bad_inputs_zero_revenue() {
        for inputs in [
            PropertyInputs {
                occupancy: Some(f64::NAN),
                ..PropertyInputs::default()
            },
            PropertyInputs {
                adr: Some(-10.0),
                ..PropertyInputs::default()
            },
        ] {
            let model = opportunity_model(&inputs);
            assert_eq!(model.room_revenue, 0.0);
            assert_eq!(model.uplift_range.low_gbp, 0.0);
            assert_eq!(model.uplift_range.high_gbp, 0.0);
        }
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(opportunity_model(&PropertyInputs::default())).unwrap();
        assert_eq!(json["roomRevenue"], 2_207_520.0);
        assert_eq!(json["upliftRange"]["lowPct"], 0.013);
        let inputs: PropertyInputs = serde_json::from_str(r#"{"rooms": 12}"#).unwrap();
        assert_eq!(inputs.rooms, Some(12));
        assert_eq!(inputs.adr, None);
    }
}
