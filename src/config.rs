//! Pipeline configuration.
//!
//! A run is configured by a `PipelineConfig`, usually read from a TOML file:
//!
//! ```toml
//! populations = "data/populations.csv"
//!
//! [windows]
//! mean = 7
//! rho_lag = 4
//!
//! [[sources]]
//! group = "cat-comarques"
//! date_column = "TipusCasData"
//! date_format = "%d/%m/%Y"
//! area_column = "ComarcaDescripcio"
//! value_column = "NumCasos"
//! aggregate_area = "Catalunya"
//! synthesize_aggregate = true
//! classification = { column = "TipusCasDescripcio", allow = ["Positiu PCR"] }
//! ```
//!
//! Anything omitted falls back to the built-in defaults for the three known
//! groups, so running without a config file works for the standard sources.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{GROUP_CAT_COMARQUES, GROUP_GRE_NOMOI, GROUP_GRE_PERIFERIES, Group, INCIDENCE_PER};
use crate::error::PipelineError;

/// Environment variable consulted when no `--config` flag is given.
pub const CONFIG_ENV_VAR: &str = "EPG_CONFIG";

/// Rolling window sizes used by the indicator engine (in days).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window of `confirmed_rolling_mean`.
    pub mean: usize,
    /// Window of `confirmed_rolling_sum`.
    pub sum: usize,
    /// Window of the short case sum (`rho_A`).
    pub rho_short: usize,
    /// How many days earlier `rho_B` reads `rho_A`.
    pub rho_lag: usize,
    /// Window of the `rho_7` average.
    pub rho_mean: usize,
    /// Window of the cumulative incidence (`ia_14`).
    pub ia_window: usize,
    /// Incidence is reported per this many inhabitants.
    pub incidence_scale: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            mean: 7,
            sum: 14,
            rho_short: 3,
            rho_lag: 4,
            rho_mean: 7,
            ia_window: 14,
            incidence_scale: INCIDENCE_PER,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let sizes = [
            ("mean", self.mean),
            ("sum", self.sum),
            ("rho_short", self.rho_short),
            ("rho_lag", self.rho_lag),
            ("rho_mean", self.rho_mean),
            ("ia_window", self.ia_window),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(PipelineError::Config(format!("window `{name}` must be >= 1")));
            }
        }
        if !(self.incidence_scale.is_finite() && self.incidence_scale > 0.0) {
            return Err(PipelineError::Config(
                "window `incidence_scale` must be finite and > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shape of a raw source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One observation per row: a date column, an area column and a value column.
    #[default]
    Long,
    /// One row per area, one column per date (headers parse with `date_format`).
    Wide,
}

/// Which raw rows count as confirmed cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Raw column holding the case-type tag.
    pub column: String,
    /// Tags that are epidemiologically valid confirmed cases. Anything else is dropped.
    pub allow: Vec<String>,
}

/// Fixed mapping from one raw source to canonical rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub group: Group,
    #[serde(default)]
    pub layout: Layout,
    /// Required for `Layout::Long`.
    #[serde(default)]
    pub date_column: Option<String>,
    /// `chrono` format of the date values (long) or date headers (wide).
    pub date_format: String,
    pub area_column: String,
    /// Required for `Layout::Long`.
    #[serde(default)]
    pub value_column: Option<String>,
    #[serde(default)]
    pub parent_columns: Vec<String>,
    #[serde(default)]
    pub population_column: Option<String>,
    #[serde(default)]
    pub classification: Option<Classification>,
    /// Values are running totals rather than daily counts.
    #[serde(default)]
    pub cumulative: bool,
    #[serde(default)]
    pub aggregate_area: Option<String>,
    #[serde(default)]
    pub synthesize_aggregate: bool,
    /// An empty raw table yields an empty canonical table instead of `EmptyInput`.
    #[serde(default)]
    pub allow_empty: bool,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let group = &self.group;
        if group.as_str().trim().is_empty() {
            return Err(PipelineError::Config("source with an empty `group`".to_string()));
        }
        if self.date_format.trim().is_empty() {
            return Err(PipelineError::Config(format!("source `{group}`: empty `date_format`")));
        }
        if self.area_column.trim().is_empty() {
            return Err(PipelineError::Config(format!("source `{group}`: empty `area_column`")));
        }
        if self.layout == Layout::Long {
            if self.date_column.is_none() {
                return Err(PipelineError::Config(format!(
                    "source `{group}`: long layout requires `date_column`"
                )));
            }
            if self.value_column.is_none() {
                return Err(PipelineError::Config(format!(
                    "source `{group}`: long layout requires `value_column`"
                )));
            }
        }
        if self.synthesize_aggregate && self.aggregate_area.as_deref().is_none_or(|a| a.trim().is_empty()) {
            return Err(PipelineError::Config(format!(
                "source `{group}`: `synthesize_aggregate` requires `aggregate_area`"
            )));
        }
        if let Some(c) = &self.classification {
            if c.allow.is_empty() {
                return Err(PipelineError::Config(format!(
                    "source `{group}`: classification allow-list is empty"
                )));
            }
        }
        Ok(())
    }
}

/// A full run's configuration as understood by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default = "builtin_sources")]
    pub sources: Vec<SourceConfig>,
    /// Population reference CSV (`group,area,population`).
    #[serde(default)]
    pub populations: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            windows: WindowConfig::default(),
            sources: builtin_sources(),
            populations: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| PipelineError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file. A relative `populations` path is resolved
    /// against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut config = Self::from_toml_str(&text)?;
        if let (Some(pop), Some(dir)) = (config.populations.as_ref(), path.parent()) {
            if pop.is_relative() {
                config.populations = Some(dir.join(pop));
            }
        }
        Ok(config)
    }

    /// Load from `explicit`, else from `$EPG_CONFIG` (a `.env` file is honoured),
    /// else fall back to the built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, PipelineError> {
        let env_value = match explicit {
            Some(_) => None,
            None => {
                dotenvy::dotenv().ok();
                std::env::var_os(CONFIG_ENV_VAR)
            }
        };
        Self::load_or_default(resolve_config_path(explicit, env_value).as_deref())
    }

    fn load_or_default(path: Option<&Path>) -> Result<Self, PipelineError> {
        match path {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading pipeline config");
                Self::load(path)
            }
            None => {
                tracing::debug!("no config file given, using built-in sources");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.windows.validate()?;
        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.group.clone()) {
                return Err(PipelineError::Config(format!(
                    "duplicate source group `{}`",
                    source.group
                )));
            }
        }
        Ok(())
    }

    pub fn source(&self, group: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.group.as_str() == group)
    }
}

fn resolve_config_path(explicit: Option<&Path>, env_value: Option<OsString>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    env_value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Built-in mappings for the Catalan and Greek sources.
pub fn builtin_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            group: Group::from(GROUP_CAT_COMARQUES),
            layout: Layout::Long,
            date_column: Some("TipusCasData".to_string()),
            date_format: "%d/%m/%Y".to_string(),
            area_column: "ComarcaDescripcio".to_string(),
            value_column: Some("NumCasos".to_string()),
            parent_columns: Vec::new(),
            population_column: None,
            // "Sospitós" (suspected) is deliberately not in the list.
            classification: Some(Classification {
                column: "TipusCasDescripcio".to_string(),
                allow: [
                    "Epidemiològic",
                    "Positiu PCR",
                    "Positiu per ELISA",
                    "Positiu per Test Ràpid",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            }),
            cumulative: false,
            aggregate_area: Some("Catalunya".to_string()),
            synthesize_aggregate: true,
            allow_empty: false,
        },
        SourceConfig {
            group: Group::from(GROUP_GRE_PERIFERIES),
            layout: Layout::Long,
            date_column: Some("date".to_string()),
            date_format: "%Y-%m-%d".to_string(),
            area_column: "region".to_string(),
            value_column: Some("total_cases".to_string()),
            parent_columns: Vec::new(),
            population_column: None,
            classification: None,
            cumulative: true,
            aggregate_area: Some("Ελλάδα".to_string()),
            synthesize_aggregate: true,
            allow_empty: false,
        },
        SourceConfig {
            group: Group::from(GROUP_GRE_NOMOI),
            layout: Layout::Wide,
            date_column: None,
            date_format: "%m/%d/%y".to_string(),
            area_column: "county".to_string(),
            value_column: None,
            parent_columns: vec!["Περιφέρεια".to_string(), "Γεωγραφικό Διαμέρισμα".to_string()],
            population_column: Some("Πληθυσμός".to_string()),
            classification: None,
            cumulative: true,
            aggregate_area: Some("ΕΛΛΑΔΑ".to_string()),
            synthesize_aggregate: true,
            allow_empty: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sources.len(), 3);
        assert!(config.source(GROUP_GRE_NOMOI).unwrap().cumulative);
        assert_eq!(config.windows.rho_lag, 4);
    }

    #[test]
    fn toml_overrides_windows_and_keeps_builtin_sources() {
        let config = PipelineConfig::from_toml_str("[windows]\nrho_lag = 5\n").unwrap();
        assert_eq!(config.windows.rho_lag, 5);
        assert_eq!(config.windows.mean, 7);
        assert_eq!(config.sources, builtin_sources());
    }

    #[test]
    fn toml_source_list_replaces_builtins() {
        let text = r#"
            [[sources]]
            group = "test"
            date_column = "d"
            date_format = "%Y-%m-%d"
            area_column = "a"
            value_column = "v"
            cumulative = true
        "#;
        let config = PipelineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.sources.len(), 1);
        let source = config.source("test").unwrap();
        assert_eq!(source.layout, Layout::Long);
        assert!(source.cumulative);
        assert!(!source.synthesize_aggregate);
    }

    #[test]
    fn load_resolves_populations_next_to_the_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epg.toml");
        std::fs::write(&path, "populations = \"pop.csv\"\n\n[windows]\nrho_lag = 5\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.populations, Some(dir.path().join("pop.csv")));
        assert_eq!(config.windows.rho_lag, 5);

        let discovered = PipelineConfig::discover(Some(&path)).unwrap();
        assert_eq!(discovered, config);
    }

    #[test]
    fn absolute_populations_path_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epg.toml");
        let pop = dir.path().join("elsewhere").join("pop.csv");
        std::fs::write(&path, format!("populations = {:?}\n", pop.display().to_string())).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap().populations, Some(pop));
    }

    #[test]
    fn config_path_precedence() {
        let flag = PathBuf::from("flag.toml");
        assert_eq!(
            resolve_config_path(Some(&flag), Some(OsString::from("env.toml"))),
            Some(flag.clone())
        );
        assert_eq!(
            resolve_config_path(None, Some(OsString::from("env.toml"))),
            Some(PathBuf::from("env.toml"))
        );
        assert_eq!(resolve_config_path(None, Some(OsString::new())), None);
        assert_eq!(resolve_config_path(None, None), None);
        assert_eq!(PipelineConfig::load_or_default(None).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let err = PipelineConfig::discover(Some(Path::new("/nonexistent/epg.toml"))).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn rejects_zero_window() {
        let err = PipelineConfig::from_toml_str("[windows]\nsum = 0\n").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn rejects_long_source_without_value_column() {
        let text = r#"
            [[sources]]
            group = "test"
            date_column = "d"
            date_format = "%Y-%m-%d"
            area_column = "a"
        "#;
        assert!(PipelineConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn rejects_duplicate_groups() {
        let mut config = PipelineConfig::default();
        config.sources.push(config.sources[0].clone());
        assert!(config.validate().is_err());
    }
}
