//! Utility functions for Web Mercator conversions and tile pyramid math
//!
//! Two coordinate spaces are used besides WGS84 degrees:
//! - the *unit square*: Web Mercator scaled to `[0, 1]` on both axes, origin at the
//!   north-west corner (y grows southwards), used by the cluster index;
//! - *world pixels*: the unit square scaled by [`world_size`] for a given zoom, used
//!   by the viewport projector.

use geo::Point;
use std::f64::consts::PI;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Size in pixels of the whole world at zoom 0
pub const WORLD_TILE_SIZE: f64 = 512.0;

/// Highest zoom level supported by the tile pyramid (2^24 tiles fit in a `u32`)
pub const MAX_TILE_ZOOM: u8 = 24;

/// Earth's mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Convert a longitude in degrees to the unit square x coordinate
#[inline(always)]
pub fn lng_to_unit_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Convert a latitude in degrees to the unit square y coordinate
///
/// Latitudes beyond the Web Mercator limit are clamped to the square's edges.
#[inline(always)]
pub fn lat_to_unit_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

/// Convert a unit square x coordinate back to longitude in degrees
#[inline(always)]
pub fn unit_x_to_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Convert a unit square y coordinate back to latitude in degrees
#[inline(always)]
pub fn unit_y_to_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0).to_radians();
    360.0 * y2.exp().atan() / PI - 90.0
}

/// Project a WGS84 point (x = lng, y = lat) into the unit square
#[inline(always)]
pub fn to_unit(point: Point<f64>) -> [f64; 2] {
    [lng_to_unit_x(point.x()), lat_to_unit_y(point.y())]
}

/// Convert a unit square coordinate back to a WGS84 point
#[inline(always)]
pub fn from_unit(x: f64, y: f64) -> Point<f64> {
    Point::new(unit_x_to_lng(x), unit_y_to_lat(y))
}

/// World size in pixels at a (possibly fractional) zoom level
#[inline(always)]
pub fn world_size(zoom: f64) -> f64 {
    WORLD_TILE_SIZE * zoom.exp2()
}

/// Tile pyramid level requested by a tile layer for a viewport zoom
///
/// Smaller tiles need a deeper level to keep the same on-screen resolution: a layer with
/// 256 px tiles at viewport zoom 12.4 requests level 13.
pub fn tile_zoom_for_viewport(zoom: f64, tile_size_px: f64) -> u8 {
    if !zoom.is_finite() || !tile_size_px.is_finite() || tile_size_px <= 0.0 {
        return 0;
    }
    let level = (zoom + (WORLD_TILE_SIZE / tile_size_px).log2()).round();
    level.clamp(0.0, MAX_TILE_ZOOM as f64) as u8
}

/// Check if a point is a finite WGS84 coordinate within the valid degree ranges
#[inline(always)]
pub fn is_valid_lng_lat(point: &Point<f64>) -> bool {
    let (lng, lat) = (point.x(), point.y());
    lng.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lng)
        && (-90.0..=90.0).contains(&lat)
}

/// Great-circle distance between two WGS84 points in meters
pub fn haversine_distance(p1: Point<f64>, p2: Point<f64>) -> f64 {
    let lat1 = p1.y().to_radians();
    let lat2 = p2.y().to_radians();
    let delta_lat = (p2.y() - p1.y()).to_radians();
    let delta_lon = (p2.x() - p1.x()).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_square_origin() {
        let [x, y] = to_unit(Point::new(0.0, 0.0));
        assert!((x - 0.5).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unit_square_bounds() {
        assert!((lng_to_unit_x(-180.0) - 0.0).abs() < 1e-12);
        assert!((lng_to_unit_x(180.0) - 1.0).abs() < 1e-12);
        assert!(lat_to_unit_y(MAX_LATITUDE) < 1e-6);
        assert!(lat_to_unit_y(-MAX_LATITUDE) > 1.0 - 1e-6);
        // Poles clamp instead of producing infinities
        assert_eq!(lat_to_unit_y(90.0), 0.0);
        assert_eq!(lat_to_unit_y(-90.0), 1.0);
    }

    #[test]
    fn test_unit_square_roundtrip() {
        let point = Point::new(-122.406417, 37.785834);
        let [x, y] = to_unit(point);
        let back = from_unit(x, y);
        assert!((back.x() - point.x()).abs() < 1e-9);
        assert!((back.y() - point.y()).abs() < 1e-9);
    }

    #[test]
    fn test_world_size() {
        assert_eq!(world_size(0.0), 512.0);
        assert_eq!(world_size(3.0), 4096.0);
    }

    #[test]
    fn test_tile_zoom_for_viewport() {
        assert_eq!(tile_zoom_for_viewport(12.4, 256.0), 13);
        assert_eq!(tile_zoom_for_viewport(12.4, 512.0), 12);
        assert_eq!(tile_zoom_for_viewport(-3.0, 512.0), 0);
        assert_eq!(tile_zoom_for_viewport(40.0, 256.0), MAX_TILE_ZOOM);
        assert_eq!(tile_zoom_for_viewport(f64::NAN, 256.0), 0);
    }

    #[test]
    fn test_is_valid_lng_lat() {
        assert!(is_valid_lng_lat(&Point::new(-122.4, 37.8)));
        assert!(is_valid_lng_lat(&Point::new(180.0, -90.0)));
        assert!(!is_valid_lng_lat(&Point::new(181.0, 0.0)));
        assert!(!is_valid_lng_lat(&Point::new(0.0, f64::NAN)));
    }

    #[test]
    fn test_haversine_distance() {
        // One degree of latitude is roughly 111 km
        let d = haversine_distance(Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 100.0);
        assert_eq!(haversine_distance(Point::new(1.0, 1.0), Point::new(1.0, 1.0)), 0.0);
    }
}
