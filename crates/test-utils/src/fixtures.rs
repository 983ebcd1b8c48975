//! Common test fixtures for DAL query tests.
//!
//! This module provides a small image catalog with hand-checked positions
//! and the service contexts the tests run it under.

use dal_protocol::{CatalogRow, RequestContext};

/// Service settings shared by the fixtures.
pub mod service {
    pub const AUTHORITY: &str = "ivo://dal.example.org";
    pub const BASE_URL: &str = "http://dal.example.org/services";
    pub const SIA_SERVICE: &str = "sia";
    pub const SSA_SERVICE: &str = "ssa";
    pub const IMAGE_TABLE: &str = "images";
    pub const SPECTRUM_TABLE: &str = "spectra";
    pub const CONE_TABLE: &str = "messier";
}

/// A catalog source with a known position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureSource {
    pub id: &'static str,
    pub ra: f64,
    pub dec: f64,
    /// Great-circle distance from (180, 0) in degrees, rounded to 0.01.
    pub distance: f64,
}

const fn src(id: &'static str, ra: f64, dec: f64, distance: f64) -> FixtureSource {
    FixtureSource {
        id,
        ra,
        dec,
        distance,
    }
}

/// Sources scattered around (180, 0).
pub const SKY_180: &[FixtureSource] = &[
    src("center", 180.0, 0.0, 0.0),
    src("ne22", 200.0, 10.0, 22.27),
    src("east29", 209.5, 0.0, 29.5),
    src("north29", 180.0, 29.0, 29.0),
    src("south31", 180.0, -31.0, 31.0),
    src("ne38", 215.0, 15.0, 37.7),
    src("sw28", 160.0, -20.0, 27.98),
    src("origin", 0.0, 0.0, 180.0),
    src("nw29", 155.0, 15.0, 28.88),
    src("nw31", 150.0, 10.0, 31.47),
];

/// Ids of [`SKY_180`] sources within 30 degrees of (180, 0).
pub const WITHIN_30_DEG: &[&str] = &["center", "ne22", "east29", "north29", "sw28", "nw29"];

/// Context for image queries against [`service::IMAGE_TABLE`].
pub fn image_context() -> RequestContext {
    RequestContext::builder()
        .authority_id(service::AUTHORITY)
        .base_url(service::BASE_URL)
        .service_name(service::SIA_SERVICE)
        .table_name(service::IMAGE_TABLE)
        .build()
}

/// Context for spectrum queries against [`service::SPECTRUM_TABLE`].
pub fn spectrum_context() -> RequestContext {
    RequestContext::builder()
        .authority_id(service::AUTHORITY)
        .base_url(service::BASE_URL)
        .service_name(service::SSA_SERVICE)
        .table_name(service::SPECTRUM_TABLE)
        .build()
}

/// Context for cone searches; only the table is needed.
pub fn cone_context() -> RequestContext {
    RequestContext::builder()
        .table_name(service::CONE_TABLE)
        .build()
}

/// An image row with the columns the engine reads.
pub fn image_row(id: &str, ra: f64, dec: f64) -> CatalogRow {
    CatalogRow::new()
        .with("id", id)
        .with("obs_title", format!("Image {}", id))
        .with("s_ra", ra)
        .with("s_dec", dec)
        .with("access_format", "image/fits")
        .with("im_naxis1", 2048)
        .with("im_naxis2", 2048)
        .with("im_wcsaxes1", "RA---TAN")
        .with("im_wcsaxes2", "DEC--TAN")
}

/// The [`SKY_180`] sources as image rows without footprints.
pub fn sky_180_catalog() -> Vec<CatalogRow> {
    SKY_180
        .iter()
        .map(|s| image_row(s.id, s.ra, s.dec))
        .collect()
}

/// A cone search row.
pub fn cone_row(id: &str, ra: f64, dec: f64) -> CatalogRow {
    CatalogRow::new()
        .with("id", id)
        .with("ra", ra)
        .with("dec", dec)
}
