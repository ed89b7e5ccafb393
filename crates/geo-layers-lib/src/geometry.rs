//! Geographic value types shared by every component
//!
//! Coordinates follow the `geo` convention: `x` is longitude and `y` is latitude,
//! both in degrees.

use crate::{EngineError, Result, utils};
use geo::{Coord, Intersects, Point, Rect};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A WGS84 position (x = longitude, y = latitude)
pub type GeoPoint = Point<f64>;

/// Axis-aligned geographic rectangle in degrees
///
/// A box with `west == east` or `south == north` is empty ("no visible area").
/// Antimeridian wraparound is not supported: `west` must not exceed `east`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Empty box collapsed onto a single point
    pub fn empty_at(point: GeoPoint) -> Self {
        Self::new(point.x(), point.y(), point.x(), point.y())
    }

    /// Whether all four edges are finite numbers
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.west.is_finite()
            && self.south.is_finite()
            && self.east.is_finite()
            && self.north.is_finite()
    }

    /// Whether the box covers no area (also true for NaN edges)
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.west < self.east && self.south < self.north)
    }

    /// Check the box is finite and not inverted
    ///
    /// Empty boxes are valid; callers treat them as "nothing visible".
    pub fn validate(&self) -> Result<()> {
        if !self.is_finite() {
            return Err(EngineError::InvalidGeometry(format!(
                "non-finite bounding box {self}"
            )));
        }
        if self.west > self.east || self.south > self.north {
            return Err(EngineError::InvalidGeometry(format!(
                "inverted bounding box {self}"
            )));
        }
        Ok(())
    }

    /// Check the box is valid and covers some area
    pub fn has_area(&self) -> bool {
        self.validate().is_ok() && !self.is_empty()
    }

    /// Point-in-box test, boundary inclusive
    #[inline]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.intersects(&self.to_rect())
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> GeoPoint {
        Point::new(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.west,
                y: self.south,
            },
            Coord {
                x: self.east,
                y: self.north,
            },
        )
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.west, self.south, self.east, self.north
        )
    }
}

/// Camera state supplied by the host each time the map view changes
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewportState {
    /// Geographic position at the center of the screen
    pub center: GeoPoint,
    /// Fractional Web Mercator zoom level
    pub zoom: f64,
    /// Camera tilt in degrees (ignored for bounds)
    pub pitch: f64,
    /// Camera rotation in degrees (ignored for bounds)
    pub bearing: f64,
    /// Screen width in pixels
    pub width_px: u32,
    /// Screen height in pixels
    pub height_px: u32,
}

impl ViewportState {
    /// Create a top-down, north-up viewport
    pub fn new(center: GeoPoint, zoom: f64, width_px: u32, height_px: u32) -> Self {
        Self {
            center,
            zoom,
            pitch: 0.0,
            bearing: 0.0,
            width_px,
            height_px,
        }
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = bearing;
        self
    }

    /// Whether the viewport has a visible area and a usable camera
    pub fn has_area(&self) -> bool {
        self.width_px > 0
            && self.height_px > 0
            && self.zoom.is_finite()
            && self.center.x().is_finite()
            && self.center.y().is_finite()
    }

    /// Integer zoom used to select a precomputed cluster level
    pub fn cluster_zoom(&self) -> u8 {
        if !self.zoom.is_finite() {
            return 0;
        }
        self.zoom.round().clamp(0.0, u8::MAX as f64) as u8
    }
}

/// Address of a tile in the power-of-two tile pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub const fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at this key's zoom
    #[inline]
    fn tiles_per_axis(z: u8) -> u32 {
        1u32 << z.min(utils::MAX_TILE_ZOOM)
    }

    /// Geographic extent of the tile
    pub fn bounds(&self) -> BoundingBox {
        let n = Self::tiles_per_axis(self.z) as f64;
        BoundingBox::new(
            utils::unit_x_to_lng(self.x as f64 / n),
            utils::unit_y_to_lat((self.y as f64 + 1.0) / n),
            utils::unit_x_to_lng((self.x as f64 + 1.0) / n),
            utils::unit_y_to_lat(self.y as f64 / n),
        )
    }

    /// Tile containing a position at the given zoom
    pub fn containing(point: GeoPoint, z: u8) -> TileKey {
        let z = z.min(utils::MAX_TILE_ZOOM);
        let [ux, uy] = utils::to_unit(point);
        TileKey::new(z, Self::axis_index(ux, z), Self::axis_index(uy, z))
    }

    /// All tiles intersecting a bounding box at the given zoom, row by row
    ///
    /// Invalid or empty boxes cover no tiles.
    pub fn tiles_covering(bbox: &BoundingBox, z: u8) -> Vec<TileKey> {
        if !bbox.has_area() {
            return Vec::new();
        }
        let z = z.min(utils::MAX_TILE_ZOOM);
        let min_x = Self::axis_index(utils::lng_to_unit_x(bbox.west.max(-180.0)), z);
        let max_x = Self::axis_index(utils::lng_to_unit_x(bbox.east.min(180.0)), z);
        let min_y = Self::axis_index(utils::lat_to_unit_y(bbox.north), z);
        let max_y = Self::axis_index(utils::lat_to_unit_y(bbox.south), z);

        let mut keys = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                keys.push(TileKey::new(z, x, y));
            }
        }
        keys
    }

    #[inline]
    fn axis_index(unit: f64, z: u8) -> u32 {
        let n = Self::tiles_per_axis(z);
        let index = (unit.clamp(0.0, 1.0) * n as f64).floor() as u32;
        index.min(n - 1)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf_box() -> BoundingBox {
        BoundingBox::new(-122.42, 37.78, -122.39, 37.80)
    }

    #[test]
    fn test_bounding_box_validate() {
        assert!(sf_box().validate().is_ok());
        assert!(BoundingBox::new(1.0, 1.0, 1.0, 1.0).validate().is_ok());
        assert!(BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).validate().is_err());
        assert!(BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0).validate().is_err());
        assert!(BoundingBox::new(2.0, 0.0, 1.0, 1.0).validate().is_err());
    }

    #[test]
    fn test_bounding_box_empty() {
        assert!(!sf_box().is_empty());
        assert!(BoundingBox::empty_at(Point::new(3.0, 4.0)).is_empty());
        assert!(BoundingBox::new(0.0, f64::NAN, 1.0, 1.0).is_empty());
        assert!(!BoundingBox::empty_at(Point::new(3.0, 4.0)).has_area());
    }

    #[test]
    fn test_bounding_box_contains_is_boundary_inclusive() {
        let bbox = sf_box();
        assert!(bbox.contains(Point::new(-122.40, 37.79)));
        assert!(bbox.contains(Point::new(-122.42, 37.78)));
        assert!(bbox.contains(Point::new(-122.39, 37.80)));
        assert!(!bbox.contains(Point::new(-122.43, 37.79)));
        assert!(!bbox.contains(Point::new(-122.40, 37.81)));
    }

    #[test]
    fn test_bounding_box_rect_conversion() {
        let bbox = sf_box();
        assert_eq!(BoundingBox::from(bbox.to_rect()), bbox);
        let center = bbox.center();
        assert!((center.x() + 122.405).abs() < 1e-9);
        assert!((center.y() - 37.79).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_cluster_zoom() {
        let viewport = ViewportState::new(Point::new(0.0, 0.0), 12.5, 800, 600);
        assert_eq!(viewport.cluster_zoom(), 13);
        let viewport = ViewportState::new(Point::new(0.0, 0.0), 12.49, 800, 600);
        assert_eq!(viewport.cluster_zoom(), 12);
        let viewport = ViewportState::new(Point::new(0.0, 0.0), -2.0, 800, 600);
        assert_eq!(viewport.cluster_zoom(), 0);
    }

    #[test]
    fn test_viewport_has_area() {
        let viewport = ViewportState::new(Point::new(0.0, 0.0), 3.0, 800, 600);
        assert!(viewport.has_area());
        assert!(!ViewportState { width_px: 0, ..viewport }.has_area());
        assert!(!ViewportState { zoom: f64::NAN, ..viewport }.has_area());
    }

    #[test]
    fn test_tile_key_display() {
        assert_eq!(TileKey::new(1, 2, 3).to_string(), "1/2/3");
    }

    #[test]
    fn test_tile_key_bounds() {
        let world = TileKey::new(0, 0, 0).bounds();
        assert!((world.west + 180.0).abs() < 1e-9);
        assert!((world.east - 180.0).abs() < 1e-9);
        assert!((world.north - utils::MAX_LATITUDE).abs() < 1e-6);
        assert!((world.south + utils::MAX_LATITUDE).abs() < 1e-6);

        // North-east quadrant at zoom 1
        let ne = TileKey::new(1, 1, 0).bounds();
        assert!(ne.west.abs() < 1e-9);
        assert!(ne.south.abs() < 1e-9);
    }

    #[test]
    fn test_tile_key_containing() {
        let point = Point::new(-122.406417, 37.785834);
        let key = TileKey::containing(point, 13);
        assert_eq!(key.z, 13);
        assert!(key.bounds().contains(point));
    }

    #[test]
    fn test_tiles_covering() {
        let bbox = sf_box();
        let keys = TileKey::tiles_covering(&bbox, 14);
        assert!(!keys.is_empty());
        for key in &keys {
            let tile = key.bounds();
            assert!(tile.west <= bbox.east && tile.east >= bbox.west);
            assert!(tile.south <= bbox.north && tile.north >= bbox.south);
        }
        // Every corner of the box lands in one of the covering tiles
        for corner in [
            Point::new(bbox.west, bbox.south),
            Point::new(bbox.east, bbox.north),
        ] {
            assert!(keys.contains(&TileKey::containing(corner, 14)));
        }
    }

    #[test]
    fn test_tiles_covering_invalid_box() {
        assert!(TileKey::tiles_covering(&BoundingBox::default(), 5).is_empty());
        let nan = BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0);
        assert!(TileKey::tiles_covering(&nan, 5).is_empty());
    }
}
