//! Geographic helpers: great-circle distance, rectangles, region naming

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers (haversine)
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Wrap a longitude into [-180, 180]
pub fn normalize_lon(lon: f64) -> f64 {
    let mut lon = lon % 360.0;
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    lon
}

/// Geographic rectangle; boundary points are inside.
///
/// `lon_min > lon_max` denotes a rectangle crossing the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoRect {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.lat_min || lat > self.lat_max {
            return false;
        }
        let lon = normalize_lon(lon);
        let lo = normalize_lon(self.lon_min);
        let hi = normalize_lon(self.lon_max);
        if lo <= hi {
            lon >= lo && lon <= hi
        } else {
            lon >= lo || lon <= hi
        }
    }
}

/// Labelled rectangle used for textual region descriptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRegion {
    pub name: String,
    #[serde(flatten)]
    pub rect: GeoRect,
}

/// Region-name lookup: first matching configured rectangle wins, with a
/// formatted-coordinate fallback when nothing matches.
#[derive(Debug, Clone, Default)]
pub struct RegionNames {
    regions: Vec<NamedRegion>,
}

impl RegionNames {
    pub fn new(regions: Vec<NamedRegion>) -> Self {
        Self { regions }
    }

    pub fn name_for(&self, lat: f64, lon: f64) -> String {
        for region in &self.regions {
            if region.rect.contains(lat, lon) {
                return region.name.clone();
            }
        }
        let lon = normalize_lon(lon);
        format!(
            "{:.2}{} {:.2}{}",
            lat.abs(),
            if lat < 0.0 { "S" } else { "N" },
            lon.abs(),
            if lon < 0.0 { "W" } else { "E" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_known_pair() {
        // Tokyo to Sendai, roughly 305 km
        let d = distance_km(35.68, 139.69, 38.27, 140.87);
        assert!((d - 305.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_rect_boundary_is_inside() {
        let rect = GeoRect {
            lat_min: -10.0,
            lat_max: 10.0,
            lon_min: 100.0,
            lon_max: 120.0,
        };
        assert!(rect.contains(10.0, 100.0));
        assert!(rect.contains(-10.0, 120.0));
        assert!(!rect.contains(10.01, 110.0));
    }

    #[test]
    fn test_rect_crossing_antimeridian() {
        let rect = GeoRect {
            lat_min: -90.0,
            lat_max: 90.0,
            lon_min: 170.0,
            lon_max: -170.0,
        };
        assert!(rect.contains(0.0, 179.0));
        assert!(rect.contains(0.0, -179.0));
        assert!(!rect.contains(0.0, 0.0));
    }

    #[test]
    fn test_region_names_fallback_format() {
        let names = RegionNames::new(vec![NamedRegion {
            name: "Test Box".into(),
            rect: GeoRect {
                lat_min: 0.0,
                lat_max: 5.0,
                lon_min: 0.0,
                lon_max: 5.0,
            },
        }]);
        assert_eq!(names.name_for(2.0, 2.0), "Test Box");
        assert_eq!(names.name_for(-38.2, -142.37), "38.20S 142.37W");
    }
}
