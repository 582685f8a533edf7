//! Origin-to-event match scoring
//!
//! A candidate origin is always scored against the event's *current
//! preferred* origin, not against every member; swapping which origin is
//! preferred can legitimately change the classification.

use quakefuse_common::config::AssociationConfig;
use quakefuse_common::geo;
use quakefuse_common::model::Origin;

/// Match quality; the engine always keeps the best-scoring candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchResult {
    Nothing,
    Location,
    Picks,
    PicksAndLocation,
}

/// Count picks shared between two origins, by pick id with an optional
/// time tolerance when both pick times are known.
pub fn matching_picks(cfg: &AssociationConfig, a: &Origin, b: &Origin) -> u32 {
    let mut count = 0;
    for arr_a in &a.arrivals {
        for arr_b in &b.arrivals {
            if arr_a.pick_id != arr_b.pick_id {
                continue;
            }
            if cfg.max_matching_time_diff_secs >= 0.0 {
                if let (Some(ta), Some(tb)) = (arr_a.pick_time, arr_b.pick_time) {
                    let dt = (ta - tb).num_milliseconds().abs() as f64 / 1000.0;
                    if dt > cfg.max_matching_time_diff_secs {
                        continue;
                    }
                }
            }
            count += 1;
            break;
        }
    }
    count
}

/// Score `candidate` against an event's preferred origin
pub fn match_result(
    cfg: &AssociationConfig,
    preferred: &Origin,
    candidate: &Origin,
) -> MatchResult {
    let picks = cfg.min_matching_picks > 0
        && matching_picks(cfg, candidate, preferred) >= cfg.min_matching_picks;

    let dist = geo::distance_km(
        candidate.latitude.value,
        candidate.longitude.value,
        preferred.latitude.value,
        preferred.longitude.value,
    );
    let dt = (candidate.time - preferred.time).num_milliseconds().abs() as f64 / 1000.0;
    let location = dist <= cfg.max_dist_km && dt <= cfg.max_time_diff_secs;

    match (picks, location) {
        (true, true) => MatchResult::PicksAndLocation,
        (true, false) => MatchResult::Picks,
        (false, true) => MatchResult::Location,
        (false, false) => MatchResult::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use quakefuse_common::model::{Arrival, CreationInfo, Quantity};

    fn origin(id: &str, secs: i64, lat: f64, lon: f64, picks: &[&str]) -> Origin {
        Origin {
            public_id: id.to_string(),
            time: Utc.timestamp_opt(secs, 0).unwrap(),
            latitude: Quantity::from(lat),
            longitude: Quantity::from(lon),
            depth: None,
            evaluation_mode: None,
            method_id: None,
            creation_info: CreationInfo::default(),
            quality: Default::default(),
            arrivals: picks
                .iter()
                .map(|p| Arrival {
                    pick_id: p.to_string(),
                    phase: "P".into(),
                    pick_time: None,
                    time_used: true,
                })
                .collect(),
            magnitudes: Vec::new(),
        }
    }

    #[test]
    fn test_result_ordering() {
        assert!(MatchResult::PicksAndLocation > MatchResult::Picks);
        assert!(MatchResult::Picks > MatchResult::Location);
        assert!(MatchResult::Location > MatchResult::Nothing);
    }

    #[test]
    fn test_picks_and_location() {
        let cfg = AssociationConfig::default();
        let preferred = origin("Origin/1", 1000, 38.0, 142.0, &["P1", "P2", "P3", "P4"]);
        let candidate = origin("Origin/2", 1005, 38.1, 142.1, &["P1", "P2", "P3", "P5"]);
        assert_eq!(
            match_result(&cfg, &preferred, &candidate),
            MatchResult::PicksAndLocation
        );
    }

    #[test]
    fn test_location_only() {
        let cfg = AssociationConfig::default();
        let preferred = origin("Origin/1", 1000, 38.0, 142.0, &["P1", "P2", "P3"]);
        let candidate = origin("Origin/2", 1010, 38.1, 142.1, &["Q1", "Q2", "Q3"]);
        assert_eq!(
            match_result(&cfg, &preferred, &candidate),
            MatchResult::Location
        );
    }

    #[test]
    fn test_picks_only_when_time_outside_window() {
        let cfg = AssociationConfig::default();
        let preferred = origin("Origin/1", 1000, 38.0, 142.0, &["P1", "P2", "P3"]);
        let candidate = origin("Origin/2", 1500, 38.0, 142.0, &["P1", "P2", "P3"]);
        assert_eq!(match_result(&cfg, &preferred, &candidate), MatchResult::Picks);
    }

    #[test]
    fn test_nothing_when_far_and_disjoint() {
        let cfg = AssociationConfig::default();
        let preferred = origin("Origin/1", 1000, 38.0, 142.0, &["P1"]);
        let candidate = origin("Origin/2", 9000, -30.0, 20.0, &["Q1"]);
        assert_eq!(
            match_result(&cfg, &preferred, &candidate),
            MatchResult::Nothing
        );
    }

    #[test]
    fn test_pick_time_tolerance() {
        let cfg = AssociationConfig {
            min_matching_picks: 1,
            max_matching_time_diff_secs: 2.0,
            ..Default::default()
        };
        let t0 = Utc.timestamp_opt(1000, 0).unwrap();
        let mut a = origin("Origin/1", 1000, 0.0, 0.0, &["P1"]);
        let mut b = origin("Origin/2", 1000, 80.0, 100.0, &["P1"]);
        a.arrivals[0].pick_time = Some(t0);
        b.arrivals[0].pick_time = Some(t0 + Duration::seconds(5));
        // Same pick id but times differ beyond tolerance
        assert_eq!(matching_picks(&cfg, &a, &b), 0);
        b.arrivals[0].pick_time = Some(t0 + Duration::seconds(1));
        assert_eq!(matching_picks(&cfg, &a, &b), 1);
    }

    #[test]
    fn test_swapping_preferred_changes_classification() {
        // Asymmetry is expected: scoring is relative to the preferred origin.
        let cfg = AssociationConfig {
            min_matching_picks: 2,
            ..Default::default()
        };
        let a = origin("Origin/1", 1000, 0.0, 0.0, &["P1", "P2"]);
        let mut b = origin("Origin/2", 1005, 0.1, 0.1, &["P1", "P2", "P3"]);
        b.arrivals.truncate(1); // b only shares one pick now
        let ab = match_result(&cfg, &a, &b);
        let ba = match_result(&cfg, &b, &a);
        assert_eq!(ab, ba); // pick counting is symmetric here...
        // ...but differing arrival sets on each side may classify differently
        let c = origin("Origin/3", 1005, 0.1, 0.1, &["P1", "P2"]);
        assert_eq!(match_result(&cfg, &a, &c), MatchResult::PicksAndLocation);
        assert_eq!(match_result(&cfg, &b, &c), MatchResult::Location);
    }
}
