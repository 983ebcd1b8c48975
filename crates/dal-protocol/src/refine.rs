//! Exact positional filtering of catalog rows.
//!
//! The catalog query only applies a coarse box. Each returned row is then
//! tested against the true search radius on the sphere.

use dal_common::sky::{angular_distance, recenter_longitude};

use crate::constraints::SpatialRegion;
use crate::records::CatalogRow;
use crate::table::TableConfiguration;

/// Applies the great-circle test to candidate rows.
pub struct SpatialRefiner {
    region: SpatialRegion,
    lon_col: String,
    lat_col: String,
    scale_col: String,
    naxis1_col: String,
    naxis2_col: String,
}

impl SpatialRefiner {
    pub fn new(region: SpatialRegion, table: &dyn TableConfiguration) -> Self {
        let (lon, lat) = if region.footprint {
            ("s_ra", "s_dec")
        } else {
            ("ra", "dec")
        };
        Self {
            region,
            lon_col: table.column(lon).to_string(),
            lat_col: table.column(lat).to_string(),
            scale_col: table.column("im_scale").to_string(),
            naxis1_col: table.column("im_naxis1").to_string(),
            naxis2_col: table.column("im_naxis2").to_string(),
        }
    }

    pub fn region(&self) -> &SpatialRegion {
        &self.region
    }

    /// Half the larger dimension of a dataset's footprint, in degrees.
    ///
    /// `im_scale` is in arcseconds per pixel. Rows without scale or axis
    /// lengths have no footprint.
    pub fn footprint_half_extent(&self, row: &CatalogRow) -> f64 {
        if !self.region.footprint {
            return 0.0;
        }
        let scale = match row.f64(&self.scale_col) {
            Some(s) => s.abs() / 3600.0,
            None => return 0.0,
        };
        let naxis = row
            .f64(&self.naxis1_col)
            .unwrap_or(0.0)
            .max(row.f64(&self.naxis2_col).unwrap_or(0.0));
        scale * naxis / 2.0
    }

    /// Angular separation of a row's position from the search center.
    pub fn separation(&self, row: &CatalogRow) -> Option<f64> {
        let lon = row.f64(&self.lon_col)?;
        let lat = row.f64(&self.lat_col)?;
        let center = self.region.center_lon;
        Some(angular_distance(
            recenter_longitude(center, center),
            self.region.center_lat,
            recenter_longitude(center, lon),
            lat,
        ))
    }

    /// Whether a row lies within the search radius, widened by its footprint.
    /// Rows without a position are rejected.
    pub fn accepts(&self, row: &CatalogRow) -> bool {
        match self.separation(row) {
            Some(distance) => {
                distance <= self.region.radius() + self.footprint_half_extent(row)
            }
            None => false,
        }
    }
}
