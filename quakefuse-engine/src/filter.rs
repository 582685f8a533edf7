//! Region and policy admission predicates

use quakefuse_common::config::FilterConfig;
use quakefuse_common::model::Origin;

/// Agency allow/block check. The blocklist wins over the allowlist; an
/// empty allowlist admits everyone not blocked.
pub fn agency_allowed(cfg: &FilterConfig, agency: &str) -> bool {
    if cfg.agency_blocklist.iter().any(|a| a == agency) {
        return false;
    }
    if !cfg.agency_allowlist.is_empty() && !cfg.agency_allowlist.iter().any(|a| a == agency) {
        return false;
    }
    true
}

/// Region/depth admission for new-event creation. Boundary points are
/// inside. Depth bounds reject origins without a depth.
pub fn region_admits(cfg: &FilterConfig, origin: &Origin) -> bool {
    if let Some(rect) = &cfg.region {
        if !rect.contains(origin.latitude.value, origin.longitude.value) {
            return false;
        }
    }
    match origin.depth.map(|d| d.value) {
        Some(depth) => {
            if let Some(min) = cfg.min_depth_km {
                if depth < min {
                    return false;
                }
            }
            if let Some(max) = cfg.max_depth_km {
                if depth > max {
                    return false;
                }
            }
        }
        None => {
            if cfg.min_depth_km.is_some() || cfg.max_depth_km.is_some() {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quakefuse_common::geo::GeoRect;
    use quakefuse_common::model::{CreationInfo, Quantity};

    fn origin(lat: f64, lon: f64, depth: Option<f64>) -> Origin {
        Origin {
            public_id: "Origin/1".into(),
            time: Utc::now(),
            latitude: Quantity::from(lat),
            longitude: Quantity::from(lon),
            depth: depth.map(Quantity::from),
            evaluation_mode: None,
            method_id: None,
            creation_info: CreationInfo::default(),
            quality: Default::default(),
            arrivals: Vec::new(),
            magnitudes: Vec::new(),
        }
    }

    #[test]
    fn test_agency_lists() {
        let mut cfg = FilterConfig::default();
        assert!(agency_allowed(&cfg, "GFZ"));

        cfg.agency_blocklist = vec!["SPAM".into()];
        assert!(!agency_allowed(&cfg, "SPAM"));
        assert!(agency_allowed(&cfg, "GFZ"));

        cfg.agency_allowlist = vec!["GFZ".into()];
        assert!(agency_allowed(&cfg, "GFZ"));
        assert!(!agency_allowed(&cfg, "NEIC"));
    }

    #[test]
    fn test_region_boundary_inside() {
        let cfg = FilterConfig {
            region: Some(GeoRect {
                lat_min: -10.0,
                lat_max: 10.0,
                lon_min: 100.0,
                lon_max: 120.0,
            }),
            ..Default::default()
        };
        assert!(region_admits(&cfg, &origin(10.0, 120.0, None)));
        assert!(!region_admits(&cfg, &origin(10.5, 110.0, None)));
    }

    #[test]
    fn test_depth_bounds_reject_missing_depth() {
        let cfg = FilterConfig {
            max_depth_km: Some(100.0),
            ..Default::default()
        };
        assert!(region_admits(&cfg, &origin(0.0, 0.0, Some(33.0))));
        assert!(!region_admits(&cfg, &origin(0.0, 0.0, Some(150.0))));
        assert!(!region_admits(&cfg, &origin(0.0, 0.0, None)));
    }
}
