//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by the normalizer and consumed by the indicator engine
//! - exported to CSV/JSON for downstream renderers
//! - reloaded later and re-fed to the engine

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Incidence rates are expressed per this many inhabitants.
pub const INCIDENCE_PER: f64 = 100_000.0;

/// EPG strictly below this value is a low risk.
pub const EPG_LOW_MAX: f64 = 30.0;
/// EPG in `[EPG_LOW_MAX, EPG_MODERATE_MAX)` is a moderate risk.
pub const EPG_MODERATE_MAX: f64 = 70.0;
/// EPG in `[EPG_MODERATE_MAX, EPG_HIGH_MAX)` is a high risk; anything above is very high.
pub const EPG_HIGH_MAX: f64 = 100.0;

/// Catalonia, by comarca.
pub const GROUP_CAT_COMARQUES: &str = "cat-comarques";
/// Greece, by periphery (periferia).
pub const GROUP_GRE_PERIFERIES: &str = "gre-periferies";
/// Greece, by regional unit (nomos).
pub const GROUP_GRE_NOMOI: &str = "gre-nomoi";

/// Tag identifying a data source plus its administrative granularity.
///
/// Groups are configuration-driven, so this is an open string tag rather than
/// a closed enum. The well-known tags are exported as `GROUP_*` constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(String);

impl Group {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Group {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One canonical row: daily confirmed cases for one area on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub date: NaiveDate,
    /// Opaque, case-sensitive area key (already cleansed).
    pub area: String,
    pub confirmed: u64,
    pub group: Group,
    pub population: Option<u64>,
    /// Optional parent areas, finest first (e.g. periphery, then geographic region).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl CaseRecord {
    pub fn new(group: Group, area: impl Into<String>, date: NaiveDate, confirmed: u64) -> Self {
        Self {
            date,
            area: area.into(),
            confirmed,
            group,
            population: None,
            parents: Vec::new(),
        }
    }

    pub fn with_population(mut self, population: Option<u64>) -> Self {
        self.population = population;
        self
    }
}

/// A canonical row enriched with the derived indicator columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    #[serde(flatten)]
    pub record: CaseRecord,
    pub confirmed_rolling_mean: f64,
    pub confirmed_rolling_sum: f64,
    pub rho: f64,
    pub rho_7: f64,
    pub ia_14: f64,
    pub epg: f64,
}

impl IndicatorRow {
    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_epg(self.epg)
    }
}

/// Risk band implied by an EPG value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskBand {
    /// Classify an EPG value. Non-finite values are treated as 0.
    pub fn from_epg(epg: f64) -> Self {
        let epg = if epg.is_finite() { epg } else { 0.0 };
        if epg < EPG_LOW_MAX {
            RiskBand::Low
        } else if epg < EPG_MODERATE_MAX {
            RiskBand::Moderate
        } else if epg < EPG_HIGH_MAX {
            RiskBand::High
        } else {
            RiskBand::VeryHigh
        }
    }

    /// Human-readable label for terminal output.
    pub fn label(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Moderate => "moderate",
            RiskBand::High => "high",
            RiskBand::VeryHigh => "very high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_band_boundaries() {
        assert_eq!(RiskBand::from_epg(0.0), RiskBand::Low);
        assert_eq!(RiskBand::from_epg(29.999), RiskBand::Low);
        assert_eq!(RiskBand::from_epg(EPG_LOW_MAX), RiskBand::Moderate);
        assert_eq!(RiskBand::from_epg(69.9), RiskBand::Moderate);
        assert_eq!(RiskBand::from_epg(EPG_MODERATE_MAX), RiskBand::High);
        assert_eq!(RiskBand::from_epg(99.9), RiskBand::High);
        assert_eq!(RiskBand::from_epg(EPG_HIGH_MAX), RiskBand::VeryHigh);
        assert_eq!(RiskBand::from_epg(f64::NAN), RiskBand::Low);
    }

    #[test]
    fn group_serializes_as_plain_string() {
        let json = serde_json::to_string(&Group::from(GROUP_GRE_NOMOI)).unwrap();
        assert_eq!(json, "\"gre-nomoi\"");
    }
}
