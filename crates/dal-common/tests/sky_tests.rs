//! Comprehensive tests for sky boxes and angular distances.

use dal_common::sky::{angular_distance, normalize_longitude, recenter_longitude, SkyBox};
use test_utils::assert_approx_eq;

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_sky_box_new() {
    let b = SkyBox::new(10.0, -5.0, 20.0, 5.0);
    assert_eq!(b.lon_min, Some(10.0));
    assert_eq!(b.lat_min, -5.0);
    assert_eq!(b.lon_max, Some(20.0));
    assert_eq!(b.lat_max, 5.0);
    assert!(b.constrains_lon());
}

#[test]
fn test_sky_box_copy() {
    let b1 = SkyBox::new(0.0, 0.0, 10.0, 10.0);
    let b2 = b1;
    assert_eq!(b1, b2);
}

// ============================================================================
// around() tests
// ============================================================================

#[test]
fn test_around_equator_is_symmetric() {
    let b = SkyBox::around(180.0, 0.0, 10.0, 10.0);
    let lo = b.lon_min.unwrap();
    let hi = b.lon_max.unwrap();
    assert_approx_eq!(180.0 - lo, hi - 180.0, 1e-9);
    assert!(lo < 170.0);
    assert!(hi > 190.0);
    assert_eq!(b.lat_min, -10.0);
    assert_eq!(b.lat_max, 10.0);
}

#[test]
fn test_around_clamps_latitude() {
    let b = SkyBox::around(0.0, -89.5, 1.0, 2.0);
    assert_eq!(b.lat_min, -90.0);
    assert!(!b.constrains_lon());
}

#[test]
fn test_around_wide_box_drops_longitude_term() {
    let b = SkyBox::around(100.0, 60.0, 100.0, 5.0);
    assert!(!b.constrains_lon());
    assert_eq!(b.lon_ranges(), vec![(0.0, 360.0)]);
}

// ============================================================================
// lon_ranges() tests
// ============================================================================

#[test]
fn test_lon_ranges_plain() {
    let b = SkyBox::new(100.0, 0.0, 120.0, 1.0);
    assert_eq!(b.lon_ranges(), vec![(100.0, 120.0)]);
}

#[test]
fn test_lon_ranges_negative_low_bound() {
    let b = SkyBox::new(-10.0, 0.0, 5.0, 1.0);
    assert_eq!(b.lon_ranges(), vec![(350.0, 360.0), (0.0, 5.0)]);
}

#[test]
fn test_lon_ranges_high_bound_past_360() {
    let b = SkyBox::new(355.0, 0.0, 365.0, 1.0);
    assert_eq!(b.lon_ranges(), vec![(355.0, 360.0), (0.0, 5.0)]);
}

// ============================================================================
// Containment tests
// ============================================================================

#[test]
fn test_contains_point_edges() {
    let b = SkyBox::new(10.0, -5.0, 20.0, 5.0);
    assert!(b.contains_point(10.0, -5.0));
    assert!(b.contains_point(20.0, 5.0));
    assert!(!b.contains_point(20.1, 0.0));
    assert!(!b.contains_point(15.0, 5.1));
}

#[test]
fn test_contains_point_normalizes_longitude() {
    let b = SkyBox::new(-10.0, -1.0, 10.0, 1.0);
    assert!(b.contains_point(-5.0, 0.0));
    assert!(b.contains_point(355.0, 0.0));
    assert!(b.contains_point(725.0, 0.0));
}

// ============================================================================
// Distance tests
// ============================================================================

#[test]
fn test_distance_is_symmetric() {
    let d1 = angular_distance(10.0, 20.0, 30.0, -40.0);
    let d2 = angular_distance(30.0, -40.0, 10.0, 20.0);
    assert_approx_eq!(d1, d2, 1e-12);
}

#[test]
fn test_distance_along_meridian() {
    assert_approx_eq!(angular_distance(45.0, -10.0, 45.0, 25.0), 35.0, 1e-9);
}

#[test]
fn test_distance_antipodal() {
    assert_approx_eq!(angular_distance(0.0, 0.0, 180.0, 0.0), 180.0, 1e-9);
}

#[test]
fn test_distance_across_seam_matches_recentered() {
    let direct = angular_distance(359.0, 10.0, 2.0, 12.0);
    let center = 359.0;
    let shifted = angular_distance(
        recenter_longitude(center, 359.0),
        10.0,
        recenter_longitude(center, 2.0),
        12.0,
    );
    assert_approx_eq!(direct, shifted, 1e-9);
    assert!(direct < 4.0);
}

#[test]
fn test_normalize_longitude() {
    assert_eq!(normalize_longitude(0.0), 0.0);
    assert_eq!(normalize_longitude(360.0), 0.0);
    assert_eq!(normalize_longitude(-90.0), 270.0);
    assert_eq!(normalize_longitude(450.0), 90.0);
}
