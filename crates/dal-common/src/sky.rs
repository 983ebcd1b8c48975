//! Sky geometry: search boxes, great-circle distances, longitude wrapping.

use serde::{Deserialize, Serialize};

/// A rectangular region in an unprojected (lon, lat) frame, in degrees.
///
/// Longitude bounds may fall outside `[0, 360)` when the box straddles the
/// origin; use [`SkyBox::lon_ranges`] to get the wrapped intervals.
/// `lon_min`/`lon_max` are `None` when the box spans every longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyBox {
    pub lon_min: Option<f64>,
    pub lon_max: Option<f64>,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl SkyBox {
    /// Create a box from explicit bounds.
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Self {
        Self {
            lon_min: Some(lon_min),
            lon_max: Some(lon_max),
            lat_min,
            lat_max,
        }
    }

    /// Build a box enclosing every point within the given half-widths of a center.
    ///
    /// The longitude half-width is stretched by `1/cos(lat)` at the box edge
    /// nearest a pole, so that points close in angle but far apart in
    /// longitude are not lost. A box touching a pole, or one whose stretched
    /// half-width reaches 180 degrees, spans every longitude.
    pub fn around(lon: f64, lat: f64, half_lon: f64, half_lat: f64) -> Self {
        let lat_min = (lat - half_lat).max(-90.0);
        let lat_max = (lat + half_lat).min(90.0);

        let edge = lat_min.abs().max(lat_max.abs());
        if edge >= 90.0 {
            return Self::lat_band(lat_min, lat_max);
        }

        let stretched = half_lon / edge.to_radians().cos();
        if !stretched.is_finite() || stretched >= 180.0 {
            return Self::lat_band(lat_min, lat_max);
        }

        Self {
            lon_min: Some(lon - stretched),
            lon_max: Some(lon + stretched),
            lat_min,
            lat_max,
        }
    }

    /// A box covering all longitudes between two latitudes.
    pub fn lat_band(lat_min: f64, lat_max: f64) -> Self {
        Self {
            lon_min: None,
            lon_max: None,
            lat_min,
            lat_max,
        }
    }

    /// Whether the box places any limit on longitude.
    pub fn constrains_lon(&self) -> bool {
        self.lon_min.is_some() && self.lon_max.is_some()
    }

    /// Longitude intervals within `[0, 360]` covered by the box.
    ///
    /// A box crossing the 0/360 seam in either direction is split in two.
    pub fn lon_ranges(&self) -> Vec<(f64, f64)> {
        match (self.lon_min, self.lon_max) {
            (Some(lo), Some(hi)) if lo < 0.0 => vec![(360.0 + lo, 360.0), (0.0, hi)],
            (Some(lo), Some(hi)) if hi > 360.0 => vec![(lo, 360.0), (0.0, hi - 360.0)],
            (Some(lo), Some(hi)) => vec![(lo, hi)],
            _ => vec![(0.0, 360.0)],
        }
    }

    /// Check if a point is contained within this box.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        if lat < self.lat_min || lat > self.lat_max {
            return false;
        }
        let lon = normalize_longitude(lon);
        self.lon_ranges()
            .iter()
            .any(|(lo, hi)| lon >= *lo && lon <= *hi)
    }
}

/// Wrap a longitude into `[0, 360)`.
pub fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = lon.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Shift a longitude so that `center` sits at 180 degrees.
///
/// Differencing two re-centered longitudes never crosses the 0/360 seam.
pub fn recenter_longitude(center: f64, lon: f64) -> f64 {
    normalize_longitude(lon - (center - 180.0))
}

/// Great-circle separation between two positions, all values in degrees.
///
/// Both points are projected onto the unit sphere and the chord length `c`
/// between them gives the angle as `2 asin(c / 2)`.
pub fn angular_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (x1, y1, z1) = unit_vector(lon1, lat1);
    let (x2, y2, z2) = unit_vector(lon2, lat2);

    let chord = ((x1 - x2).powi(2) + (y1 - y2).powi(2) + (z1 - z2).powi(2)).sqrt();
    2.0 * (chord / 2.0).min(1.0).asin().to_degrees()
}

fn unit_vector(lon: f64, lat: f64) -> (f64, f64, f64) {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    (lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_distance_on_equator() {
        assert_approx_eq!(angular_distance(180.0, 0.0, 210.0, 0.0), 30.0, 1e-9);
        assert_approx_eq!(angular_distance(359.0, 0.0, 1.0, 0.0), 2.0, 1e-9);
        assert_approx_eq!(angular_distance(10.0, 90.0, 250.0, 90.0), 0.0, 1e-9);
    }

    #[test]
    fn test_recenter_longitude() {
        assert_approx_eq!(recenter_longitude(359.0, 1.0), 182.0, 1e-9);
        assert_approx_eq!(recenter_longitude(359.0, 359.0), 180.0, 1e-9);
        assert_approx_eq!(recenter_longitude(0.5, 359.5), 179.0, 1e-9);
    }

    #[test]
    fn test_box_wraps_at_origin() {
        let b = SkyBox::around(1.0, 0.0, 2.0, 2.0);
        let ranges = b.lon_ranges();
        assert_eq!(ranges.len(), 2);
        assert_approx_eq!(ranges[0].0, 359.0, 0.01);
        assert_eq!(ranges[0].1, 360.0);
        assert_eq!(ranges[1].0, 0.0);
        assert!(b.contains_point(359.5, 1.0));
        assert!(b.contains_point(2.5, -1.0));
        assert!(!b.contains_point(180.0, 0.0));
    }

    #[test]
    fn test_box_near_pole_spans_all_longitudes() {
        let b = SkyBox::around(45.0, 88.0, 1.0, 3.0);
        assert!(!b.constrains_lon());
        assert_eq!(b.lat_max, 90.0);
        assert_eq!(b.lon_ranges(), vec![(0.0, 360.0)]);
    }
}
