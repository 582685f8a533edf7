//! Configuration loading
//!
//! All policy thresholds are immutable per run. The config file path follows
//! a priority order: CLI argument, then the QUAKEFUSE_CONFIG environment
//! variable, then ./quakefuse.toml when present, then compiled defaults.
//! Every field carries a default so a partial file works.

use crate::error::{Error, Result};
use crate::geo::{GeoRect, NamedRegion};
use crate::model::EvaluationMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "QUAKEFUSE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "quakefuse.toml";

/// Origin-to-event association thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Minimum shared picks for a `Picks` match; 0 disables pick matching
    pub min_matching_picks: u32,
    /// Pick time tolerance in seconds; negative compares by pick id only
    pub max_matching_time_diff_secs: f64,
    /// Epicentral distance window for a `Location` match
    pub max_dist_km: f64,
    /// Origin-time window for a `Location` match
    pub max_time_diff_secs: f64,
    /// Store query window before the candidate origin time
    pub event_time_before_secs: f64,
    /// Store query window after the candidate origin time
    pub event_time_after_secs: f64,
    /// Maximum distance to a store-matched event's preferred origin
    pub max_preferred_origin_distance_km: Option<f64>,
    /// Automatic origins below this defining-phase count never create events
    pub min_defining_phases: u32,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            min_matching_picks: 3,
            max_matching_time_diff_secs: -1.0,
            max_dist_km: 500.0,
            max_time_diff_secs: 60.0,
            event_time_before_secs: 1800.0,
            event_time_after_secs: 1800.0,
            max_preferred_origin_distance_km: None,
            min_defining_phases: 10,
        }
    }
}

/// Deferral-buffer policy: inputs matching the filter wait `span_secs`
/// before association. Each unset agency/author/evaluation-mode
/// criterion matches everything, so a positive span with no criteria
/// delays every input.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub span_secs: u64,
    pub tick_secs: u64,
    pub agency_id: Option<String>,
    pub author: Option<String>,
    pub evaluation_mode: Option<EvaluationMode>,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            span_secs: 0,
            tick_secs: 10,
            agency_id: None,
            author: None,
            evaluation_mode: None,
        }
    }
}

/// Arbitration priority tables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// Ordered priority tokens (AGENCY, AUTHOR, STATUS, METHOD, PHASES,
    /// PHASES_AUTOMATIC, RMS, RMS_AUTOMATIC, TIME, TIME_AUTOMATIC);
    /// empty list selects the built-in fallback cascade
    pub tokens: Vec<String>,
    /// Agency ranking, first entry is the highest priority
    pub agencies: Vec<String>,
    pub authors: Vec<String>,
    pub methods: Vec<String>,
    /// Magnitude-type preference order, first entry is the most preferred
    pub magnitude_types: Vec<String>,
    /// Pick a non-moment magnitude when no moment magnitude qualifies
    pub enable_fallback_magnitude: bool,
    /// mb value above which a well-observed mb overrides moment magnitudes
    pub mb_over_mw_value: f64,
    /// Minimum mb station count for the override
    pub mb_over_mw_count: u32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            agencies: Vec::new(),
            authors: Vec::new(),
            methods: Vec::new(),
            magnitude_types: [
                "Mw", "Mww", "Mwc", "Mwb", "Mwp", "ML", "MLv", "mb", "Md",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            enable_fallback_magnitude: true,
            mb_over_mw_value: 6.0,
            mb_over_mw_count: 30,
        }
    }
}

/// Admission filters for new-event creation and preference
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// When non-empty, only these agencies pass
    pub agency_allowlist: Vec<String>,
    pub agency_blocklist: Vec<String>,
    /// Geographic admission rectangle for new events
    pub region: Option<GeoRect>,
    /// Depth bounds in kilometers
    pub min_depth_km: Option<f64>,
    pub max_depth_km: Option<f64>,
}

/// Engine configuration root
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Agency id stamped on engine-created objects
    pub agency_id: String,
    /// Author stamped on engine-created objects
    pub author: String,
    /// SQLite database path (binary only; tests use the in-memory store)
    pub db_path: Option<PathBuf>,
    /// Idle lifetime of cached events and origins
    pub cache_ttl_secs: u64,
    pub association: AssociationConfig,
    pub delay: DelayConfig,
    pub priority: PriorityConfig,
    pub filter: FilterConfig,
    /// Named rectangles backing the textual region description
    pub regions: Vec<NamedRegion>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agency_id: "QF".to_string(),
            author: "quakefuse".to_string(),
            db_path: None,
            cache_ttl_secs: 3600,
            association: AssociationConfig::default(),
            delay: DelayConfig::default(),
            priority: PriorityConfig::default(),
            filter: FilterConfig::default(),
            regions: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration following the priority order described above
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            return Self::from_file(default_path);
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.association.min_matching_picks, 3);
        assert_eq!(cfg.delay.span_secs, 0);
        assert!(cfg.priority.tokens.is_empty());
        assert!(cfg.priority.enable_fallback_magnitude);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: EngineConfig = toml::from_str(
            r#"
            agency_id = "GFZ"

            [association]
            min_matching_picks = 5

            [delay]
            span_secs = 30
            agency_id = "NEIC"

            [[regions]]
            name = "Test"
            lat_min = 0.0
            lat_max = 1.0
            lon_min = 0.0
            lon_max = 1.0
            "#,
        )
        .expect("valid toml");
        assert_eq!(cfg.agency_id, "GFZ");
        assert_eq!(cfg.association.min_matching_picks, 5);
        assert_eq!(cfg.association.min_defining_phases, 10);
        assert_eq!(cfg.delay.span_secs, 30);
        assert_eq!(cfg.delay.agency_id.as_deref(), Some("NEIC"));
        assert_eq!(cfg.regions.len(), 1);
        assert_eq!(cfg.regions[0].rect.lat_max, 1.0);
    }

    #[test]
    fn test_priority_tokens_parse_from_toml() {
        let cfg: EngineConfig = toml::from_str(
            r#"
            [priority]
            tokens = ["AGENCY", "STATUS", "PHASES"]
            agencies = ["GFZ", "NEIC"]
            "#,
        )
        .expect("valid toml");
        assert_eq!(cfg.priority.tokens, vec!["AGENCY", "STATUS", "PHASES"]);
        assert_eq!(cfg.priority.agencies[0], "GFZ");
    }
}
