//! Generators for synthetic catalog rows.
//!
//! These generators create predictable row patterns whose positions are
//! easy to verify from the row id.

use dal_common::sky::normalize_longitude;
use dal_protocol::CatalogRow;

use crate::fixtures::image_row;

/// Creates `count` image rows evenly spaced on a ring.
///
/// Row `i` sits at position angle `i * 360 / count` degrees, `radius`
/// degrees along the meridian-aligned offset from the center. Positions
/// are computed on a small-angle approximation, so keep `radius` small.
///
/// # Example
///
/// ```
/// use test_utils::create_ring_catalog;
///
/// let rows = create_ring_catalog(10.0, 20.0, 1.0, 8);
/// assert_eq!(rows.len(), 8);
/// assert_eq!(rows[0].text("id").as_deref(), Some("ring-0"));
/// ```
pub fn create_ring_catalog(ra: f64, dec: f64, radius: f64, count: usize) -> Vec<CatalogRow> {
    (0..count)
        .map(|i| {
            let angle = (i as f64 * 360.0 / count as f64).to_radians();
            let d_dec = radius * angle.cos();
            let row_dec = dec + d_dec;
            let d_ra = radius * angle.sin() / row_dec.to_radians().cos();
            image_row(&format!("ring-{}", i), normalize_longitude(ra + d_ra), row_dec)
        })
        .collect()
}

/// Creates `count` image rows along the equator, one degree apart,
/// starting at longitude `start`.
pub fn create_equator_catalog(start: f64, count: usize) -> Vec<CatalogRow> {
    (0..count)
        .map(|i| {
            image_row(
                &format!("eq-{}", i),
                normalize_longitude(start + i as f64),
                0.0,
            )
        })
        .collect()
}

/// Creates rows that all sit at one position, with distinct ids.
///
/// Useful for exercising record caps, since every row matches any
/// search that covers the position.
pub fn create_stacked_catalog(ra: f64, dec: f64, count: usize) -> Vec<CatalogRow> {
    (0..count)
        .map(|i| image_row(&format!("stack-{}", i), ra, dec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dal_common::angular_distance;

    #[test]
    fn test_ring_radius() {
        for row in create_ring_catalog(100.0, 10.0, 0.5, 12) {
            let d = angular_distance(100.0, 10.0, row.f64("s_ra").unwrap(), row.f64("s_dec").unwrap());
            crate::assert_approx_eq!(d, 0.5, 0.01);
        }
    }

    #[test]
    fn test_equator_wraps() {
        let rows = create_equator_catalog(358.0, 4);
        let ras: Vec<f64> = rows.iter().map(|r| r.f64("s_ra").unwrap()).collect();
        assert_eq!(ras, vec![358.0, 359.0, 0.0, 1.0]);
    }
}
