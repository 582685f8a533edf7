//! Preferred-magnitude selection
//!
//! Candidates split into "good" (moment-magnitude equivalent types) and
//! "fallback" (everything else), each ranked by station count first and the
//! configured type preference second. Very large events are better sized by
//! mb saturation behaviour, so a well-observed mb above the configured
//! threshold is promoted into the good set while moment magnitudes are
//! demoted to fallback.

use crate::filter::agency_allowed;
use quakefuse_common::config::{FilterConfig, PriorityConfig};
use quakefuse_common::model::{Magnitude, Origin};

/// Moment-magnitude-equivalent type check (Mw, Mww, Mwc, Mwb, Mwp, ...)
pub fn is_moment_type(magnitude_type: &str) -> bool {
    magnitude_type.starts_with("Mw") || magnitude_type == "Mi"
}

/// Position in the preference list, higher is better; unlisted types rank 0
fn type_priority(cfg: &PriorityConfig, magnitude_type: &str) -> u32 {
    cfg.magnitude_types
        .iter()
        .position(|t| t == magnitude_type)
        .map(|i| (cfg.magnitude_types.len() - i) as u32)
        .unwrap_or(0)
}

/// Ranking key: station count dominant, then configured type priority
fn rank(cfg: &PriorityConfig, m: &Magnitude) -> (u32, u32) {
    (m.station_count.unwrap_or(0), type_priority(cfg, &m.magnitude_type))
}

fn qualifies_for_mb_override(cfg: &PriorityConfig, m: &Magnitude) -> bool {
    m.magnitude_type == "mb"
        && m.value > cfg.mb_over_mw_value
        && m.station_count.unwrap_or(0) >= cfg.mb_over_mw_count
}

/// Pick the preferred magnitude of an origin, or None when no candidate
/// survives the policy gates.
pub fn preferred_magnitude<'a>(
    origin: &'a Origin,
    priority: &PriorityConfig,
    filter: &FilterConfig,
) -> Option<&'a Magnitude> {
    let candidates: Vec<&Magnitude> = origin
        .magnitudes
        .iter()
        .filter(|m| agency_allowed(filter, m.agency()))
        .collect();

    let mb_override = candidates
        .iter()
        .any(|m| qualifies_for_mb_override(priority, m));

    let mut good: Vec<&Magnitude> = Vec::new();
    let mut fallback: Vec<&Magnitude> = Vec::new();
    for m in candidates {
        let moment = is_moment_type(&m.magnitude_type);
        if mb_override {
            if qualifies_for_mb_override(priority, m) {
                good.push(m);
            } else {
                fallback.push(m);
            }
        } else if moment {
            good.push(m);
        } else {
            fallback.push(m);
        }
    }

    // Ties keep the first candidate found
    let pick_best = |set: &[&'a Magnitude]| -> Option<&'a Magnitude> {
        let mut best: Option<&'a Magnitude> = None;
        for m in set {
            if best.map_or(true, |b| rank(priority, m) > rank(priority, b)) {
                best = Some(m);
            }
        }
        best
    };

    if let Some(best) = pick_best(&good) {
        return Some(best);
    }
    if priority.enable_fallback_magnitude {
        pick_best(&fallback)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quakefuse_common::model::{CreationInfo, Quantity};

    fn magnitude(id: &str, mtype: &str, value: f64, stations: u32, agency: &str) -> Magnitude {
        Magnitude {
            public_id: id.to_string(),
            origin_id: "Origin/1".into(),
            magnitude_type: mtype.to_string(),
            value,
            station_count: Some(stations),
            creation_info: CreationInfo {
                agency_id: Some(agency.to_string()),
                ..Default::default()
            },
        }
    }

    fn origin_with(mags: Vec<Magnitude>) -> Origin {
        Origin {
            public_id: "Origin/1".into(),
            time: Utc::now(),
            latitude: Quantity::from(0.0),
            longitude: Quantity::from(0.0),
            depth: None,
            evaluation_mode: None,
            method_id: None,
            creation_info: CreationInfo::default(),
            quality: Default::default(),
            arrivals: Vec::new(),
            magnitudes: mags,
        }
    }

    #[test]
    fn test_moment_type_classification() {
        assert!(is_moment_type("Mw"));
        assert!(is_moment_type("Mww"));
        assert!(is_moment_type("Mwc"));
        assert!(is_moment_type("Mi"));
        assert!(!is_moment_type("mb"));
        assert!(!is_moment_type("ML"));
        assert!(!is_moment_type("Md"));
    }

    #[test]
    fn test_moment_magnitude_preferred_over_local() {
        let origin = origin_with(vec![
            magnitude("M/1", "ML", 4.5, 20, "GFZ"),
            magnitude("M/2", "Mw", 4.4, 8, "GFZ"),
        ]);
        let picked = preferred_magnitude(&origin, &PriorityConfig::default(), &Default::default())
            .expect("magnitude");
        assert_eq!(picked.magnitude_type, "Mw");
    }

    #[test]
    fn test_mb_overrides_mw_for_large_events() {
        let origin = origin_with(vec![
            magnitude("M/1", "mb", 6.2, 35, "GFZ"),
            magnitude("M/2", "Mw", 5.9, 6, "GFZ"),
        ]);
        let picked = preferred_magnitude(&origin, &PriorityConfig::default(), &Default::default())
            .expect("magnitude");
        assert_eq!(picked.magnitude_type, "mb");
    }

    #[test]
    fn test_mb_below_threshold_does_not_override() {
        let origin = origin_with(vec![
            magnitude("M/1", "mb", 5.5, 35, "GFZ"),
            magnitude("M/2", "Mw", 5.3, 6, "GFZ"),
        ]);
        let picked = preferred_magnitude(&origin, &PriorityConfig::default(), &Default::default())
            .expect("magnitude");
        assert_eq!(picked.magnitude_type, "Mw");
    }

    #[test]
    fn test_blocked_agency_excluded() {
        let filter = FilterConfig {
            agency_blocklist: vec!["SPAM".into()],
            ..Default::default()
        };
        let origin = origin_with(vec![
            magnitude("M/1", "Mw", 6.0, 50, "SPAM"),
            magnitude("M/2", "ML", 4.0, 10, "GFZ"),
        ]);
        let picked = preferred_magnitude(&origin, &PriorityConfig::default(), &filter)
            .expect("magnitude");
        assert_eq!(picked.public_id, "M/2");
    }

    #[test]
    fn test_fallback_disabled_yields_none() {
        let priority = PriorityConfig {
            enable_fallback_magnitude: false,
            ..Default::default()
        };
        let origin = origin_with(vec![magnitude("M/1", "ML", 4.0, 10, "GFZ")]);
        assert!(preferred_magnitude(&origin, &priority, &Default::default()).is_none());
    }

    #[test]
    fn test_station_count_dominates_type_priority() {
        let origin = origin_with(vec![
            magnitude("M/1", "ML", 4.5, 30, "GFZ"),
            magnitude("M/2", "Md", 4.2, 5, "GFZ"),
        ]);
        let picked = preferred_magnitude(&origin, &PriorityConfig::default(), &Default::default())
            .expect("magnitude");
        assert_eq!(picked.magnitude_type, "ML");
    }
}
