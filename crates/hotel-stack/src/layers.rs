//! The seven canonical business layers and the static category → layer table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical business-capability layer.
///
/// Variant order is the canonical report order; `Ord` follows it so
/// `BTreeMap<Layer, _>` iterates canonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    #[serde(rename = "Distribution")]
    Distribution,
    #[serde(rename = "Core Systems")]
    CoreSystems,
    #[serde(rename = "Guest Data & CRM")]
    GuestDataCrm,
    #[serde(rename = "Commercial Execution")]
    CommercialExecution,
    #[serde(rename = "In-Venue Experience")]
    InVenueExperience,
    #[serde(rename = "Operations")]
    Operations,
    #[serde(rename = "Finance & Reporting")]
    FinanceReporting,
}

/// Layer that receives detections whose category is not in the table.
pub const FALLBACK_LAYER: Layer = Layer::CommercialExecution;

/// Category → layer lookup. Keys are normalized (see [`normalize_category`]).
const CATEGORY_LAYERS: &[(&str, Layer)] = &[
    // Distribution
    ("booking_engine", Layer::Distribution),
    ("channel_manager_crs", Layer::Distribution),
    ("channel_manager", Layer::Distribution),
    ("crs", Layer::Distribution),
    ("metasearch", Layer::Distribution),
    ("rate_intelligence", Layer::Distribution),
    ("parity", Layer::Distribution),
    ("direct_booking", Layer::Distribution),
    // Core systems
    ("pms", Layer::CoreSystems),
    ("rms", Layer::CoreSystems),
    // Guest data
    ("crm_guest_db", Layer::GuestDataCrm),
    ("crm", Layer::GuestDataCrm),
    ("email_lifecycle", Layer::GuestDataCrm),
    ("email_marketing", Layer::GuestDataCrm),
    ("reputation", Layer::GuestDataCrm),
    ("loyalty", Layer::GuestDataCrm),
    ("cdp", Layer::GuestDataCrm),
    // Commercial execution
    ("analytics", Layer::CommercialExecution),
    ("tag_management", Layer::CommercialExecution),
    ("advertising", Layer::CommercialExecution),
    ("paid_media", Layer::CommercialExecution),
    ("consent_management", Layer::CommercialExecution),
    ("session_recording", Layer::CommercialExecution),
    ("personalisation", Layer::CommercialExecution),
    // In-venue
    ("in_stay_tools", Layer::InVenueExperience),
    ("guest_messaging", Layer::InVenueExperience),
    ("chat", Layer::InVenueExperience),
    ("mobile_checkin", Layer::InVenueExperience),
    ("upsell", Layer::InVenueExperience),
    ("spa_booking", Layer::InVenueExperience),
    ("table_booking", Layer::InVenueExperience),
    // Operations
    ("housekeeping_maintenance", Layer::Operations),
    ("operations", Layer::Operations),
    ("staff_scheduling", Layer::Operations),
    ("events_sales", Layer::Operations),
    // Finance
    ("finance_accounting", Layer::FinanceReporting),
    ("reporting_bi", Layer::FinanceReporting),
    ("payments", Layer::FinanceReporting),
];

impl Layer {
    /// All layers in canonical order.
    pub const ALL: [Layer; 7] = [
        Layer::Distribution,
        Layer::CoreSystems,
        Layer::GuestDataCrm,
        Layer::CommercialExecution,
        Layer::InVenueExperience,
        Layer::Operations,
        Layer::FinanceReporting,
    ];

    /// Display name used in serialized output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Distribution => "Distribution",
            Self::CoreSystems => "Core Systems",
            Self::GuestDataCrm => "Guest Data & CRM",
            Self::CommercialExecution => "Commercial Execution",
            Self::InVenueExperience => "In-Venue Experience",
            Self::Operations => "Operations",
            Self::FinanceReporting => "Finance & Reporting",
        }
    }

    /// Route a detection category to its layer. Never fails: unknown
    /// categories land in [`FALLBACK_LAYER`].
    pub fn for_category(category: &str) -> Layer {
        let key = normalize_category(category);
        CATEGORY_LAYERS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, layer)| *layer)
            .unwrap_or(FALLBACK_LAYER)
    }

    /// Whether `category` has an explicit entry in the table.
    pub fn is_mapped(category: &str) -> bool {
        let key = normalize_category(category);
        CATEGORY_LAYERS.iter().any(|(k, _)| *k == key)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase, trim, and fold `-`/space to `_`.
pub fn normalize_category(category: &str) -> String {
    category
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' || c == '/' { '_' } else { c })
        .collect()
}
