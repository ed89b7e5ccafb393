//! Scripted camera movement
//!
//! The camera orbits the dataset center while zooming between a city overview and
//! street level, so a run crosses every interesting cluster level.

use geo::Point;
use geo_layers_lib::datasets::{self, DATASET_BOUNDS};
use geo_layers_lib::ViewportState;
use std::f64::consts::TAU;

pub const MIN_ZOOM: f64 = 10.0;
pub const MAX_ZOOM: f64 = 17.0;

/// Degrees between the orbit and the dataset center
const ORBIT_RADIUS_DEG: f64 = 0.006;

/// Deterministic camera path as a function of elapsed time
#[derive(Debug, Clone)]
pub struct CameraScript {
    base: ViewportState,
    /// Duration of one orbit and one zoom in-out cycle
    period_ms: f64,
}

impl CameraScript {
    pub fn new(width_px: u32, height_px: u32, period_ms: f64) -> Self {
        Self {
            base: datasets::default_viewport(width_px, height_px),
            period_ms: if period_ms > 0.0 { period_ms } else { 1.0 },
        }
    }

    pub fn viewport_at(&self, elapsed_ms: f64) -> ViewportState {
        let phase = (elapsed_ms / self.period_ms).fract() * TAU;
        let center = DATASET_BOUNDS.center();
        let mid_zoom = (MIN_ZOOM + MAX_ZOOM) / 2.0;
        let amplitude = (MAX_ZOOM - MIN_ZOOM) / 2.0;

        ViewportState {
            center: Point::new(
                center.x() + ORBIT_RADIUS_DEG * phase.cos(),
                center.y() + ORBIT_RADIUS_DEG * phase.sin(),
            ),
            // Starts at the overview, reaches street level half way through
            zoom: mid_zoom - amplitude * phase.cos(),
            bearing: self.base.bearing + phase.to_degrees(),
            ..self.base
        }
    }
}
