//! Viewport to geographic bounds projection
//!
//! Uses the standard Web Mercator screen mapping with a 512 px world at zoom 0.
//! Pitch and bearing are ignored: the returned bounds are an axis-aligned rectangle
//! around the untilted footprint, which is all the cluster query needs.

use crate::{BoundingBox, GeoPoint, ViewportState, utils};
use geo::Point;

/// Geographic bounding box visible in a viewport
///
/// Viewports without area (zero width or height, non-finite camera) produce an
/// empty box at the center instead of an error.
pub fn project(viewport: &ViewportState) -> BoundingBox {
    #[cfg(feature = "profiling")]
    profiling::scope!("projector::project");

    if !viewport.has_area() {
        tracing::trace!(?viewport, "Viewport has no visible area");
        return degenerate_bounds(viewport);
    }

    let width = viewport.width_px as f64;
    let height = viewport.height_px as f64;
    let corners = [
        unproject(viewport, 0.0, 0.0),
        unproject(viewport, width, 0.0),
        unproject(viewport, 0.0, height),
        unproject(viewport, width, height),
    ];

    let mut bounds = BoundingBox::new(
        f64::INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
    );
    for corner in corners {
        bounds.west = bounds.west.min(corner.x());
        bounds.south = bounds.south.min(corner.y());
        bounds.east = bounds.east.max(corner.x());
        bounds.north = bounds.north.max(corner.y());
    }
    bounds
}

/// Screen position (origin top-left, in pixels) of a geographic point
pub fn project_point(viewport: &ViewportState, point: GeoPoint) -> (f64, f64) {
    let scale = utils::world_size(viewport.zoom);
    let [cx, cy] = utils::to_unit(viewport.center);
    let [px, py] = utils::to_unit(point);
    (
        (px - cx) * scale + viewport.width_px as f64 / 2.0,
        (py - cy) * scale + viewport.height_px as f64 / 2.0,
    )
}

/// Geographic position under a screen pixel
///
/// The result is clamped to the Web Mercator world.
pub fn unproject(viewport: &ViewportState, x: f64, y: f64) -> GeoPoint {
    let scale = utils::world_size(viewport.zoom);
    let [cx, cy] = utils::to_unit(viewport.center);
    let ux = cx + (x - viewport.width_px as f64 / 2.0) / scale;
    let uy = cy + (y - viewport.height_px as f64 / 2.0) / scale;
    Point::new(
        utils::unit_x_to_lng(ux).clamp(-180.0, 180.0),
        utils::unit_y_to_lat(uy.clamp(0.0, 1.0)),
    )
}

fn degenerate_bounds(viewport: &ViewportState) -> BoundingBox {
    let center = viewport.center;
    if center.x().is_finite() && center.y().is_finite() {
        BoundingBox::empty_at(Point::new(
            center.x().clamp(-180.0, 180.0),
            center.y().clamp(-utils::MAX_LATITUDE, utils::MAX_LATITUDE),
        ))
    } else {
        BoundingBox::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf_viewport() -> ViewportState {
        ViewportState::new(Point::new(-122.406417, 37.785834), 12.5, 1280, 720)
            .with_pitch(40.0)
            .with_bearing(-10.0)
    }

    #[test]
    fn test_project_contains_center() {
        let viewport = sf_viewport();
        let bounds = project(&viewport);
        assert!(bounds.has_area());
        assert!(bounds.contains(viewport.center));
    }

    #[test]
    fn test_project_width_matches_zoom() {
        let bounds = project(&sf_viewport());
        // 1280 px at zoom 12.5 is 1280 / (512 * 2^12.5) of the world's 360 degrees
        let expected = 1280.0 / utils::world_size(12.5) * 360.0;
        assert!((bounds.width() - expected).abs() < 1e-9);
        // Mercator stretches latitudes, so the height is less than the pixel ratio suggests
        assert!(bounds.height() < bounds.width() * 720.0 / 1280.0);
    }

    #[test]
    fn test_project_ignores_pitch_and_bearing() {
        let tilted = sf_viewport();
        let flat = tilted.with_pitch(0.0).with_bearing(0.0);
        assert_eq!(project(&tilted), project(&flat));
    }

    #[test]
    fn test_project_halves_with_zoom() {
        let viewport = sf_viewport();
        let closer = ViewportState {
            zoom: viewport.zoom + 1.0,
            ..viewport
        };
        let ratio = project(&viewport).width() / project(&closer).width();
        assert!((ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_degenerate_viewport() {
        let viewport = ViewportState {
            width_px: 0,
            ..sf_viewport()
        };
        let bounds = project(&viewport);
        assert!(bounds.is_empty());
        assert_eq!(bounds.west, bounds.east);
        assert_eq!(bounds.west, viewport.center.x());

        let flat = ViewportState {
            height_px: 0,
            ..sf_viewport()
        };
        let bounds = project(&flat);
        assert!(bounds.is_empty());
        assert_eq!((bounds.west, bounds.east), (flat.center.x(), flat.center.x()));
        assert_eq!((bounds.south, bounds.north), (flat.center.y(), flat.center.y()));

        let broken = ViewportState {
            center: Point::new(f64::NAN, 0.0),
            ..sf_viewport()
        };
        assert_eq!(project(&broken), BoundingBox::default());
    }

    #[test]
    fn test_project_whole_world_is_clamped() {
        let viewport = ViewportState::new(Point::new(0.0, 0.0), 0.0, 4000, 4000);
        let bounds = project(&viewport);
        assert_eq!(bounds.west, -180.0);
        assert_eq!(bounds.east, 180.0);
        assert!((bounds.north - utils::MAX_LATITUDE).abs() < 1e-6);
        assert!((bounds.south + utils::MAX_LATITUDE).abs() < 1e-6);
    }

    #[test]
    fn test_project_point_unproject_inverse() {
        let viewport = sf_viewport();
        let point = Point::new(-122.41, 37.79);
        let (x, y) = project_point(&viewport, point);
        let back = unproject(&viewport, x, y);
        assert!((back.x() - point.x()).abs() < 1e-9);
        assert!((back.y() - point.y()).abs() < 1e-9);

        let (cx, cy) = project_point(&viewport, viewport.center);
        assert!((cx - 640.0).abs() < 1e-6);
        assert!((cy - 360.0).abs() < 1e-6);
    }
}
