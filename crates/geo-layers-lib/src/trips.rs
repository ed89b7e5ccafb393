//! Timestamped vehicle paths for animated trail rendering
//!
//! A [`Trip`] stores its path with precomputed time span and length. Given the
//! animation cursor, [`Trip::trail`] returns the visible tail of the path with a
//! linear opacity fade from the oldest vertex to the head.

use crate::{EngineError, GeoPoint, Result, TimeRange, utils};
use geo::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shortest trail kept visible regardless of the data duration
pub const TRAIL_MIN_MS: f64 = 20_000.0;

/// Share of the data duration covered by a trail
pub const TRAIL_FRACTION: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TripPoint {
    pub position: GeoPoint,
    pub timestamp_ms: f64,
}

impl TripPoint {
    pub fn new(lng: f64, lat: f64, timestamp_ms: f64) -> Self {
        Self {
            position: Point::new(lng, lat),
            timestamp_ms,
        }
    }
}

/// A point of a visible trail
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailVertex {
    pub position: GeoPoint,
    pub timestamp_ms: f64,
    /// 0 at the oldest end of the trail, 1 at the head
    pub opacity: f64,
}

/// A vehicle path with cached metadata
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trip {
    vendor: String,
    path: Vec<TripPoint>,
    /// Cached first and last timestamp
    time_range: TimeRange,
    /// Cached haversine length in meters
    length_m: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Trip {
    /// Create a trip, rejecting empty paths, invalid coordinates and timestamps going backwards
    pub fn new(vendor: impl Into<String>, path: Vec<TripPoint>) -> Result<Self> {
        let vendor = vendor.into();
        let (time_range, length_m) = Self::compute_metadata(&vendor, &path)?;
        Ok(Self {
            vendor,
            path,
            time_range,
            length_m,
        })
    }

    /// Validate the path and compute its time span and length in one pass
    fn compute_metadata(vendor: &str, path: &[TripPoint]) -> Result<(TimeRange, f64)> {
        let (Some(first), Some(last)) = (path.first(), path.last()) else {
            return Err(EngineError::InvalidGeometry(format!(
                "trip {vendor} has an empty path"
            )));
        };

        let mut length_m = 0.0;
        let mut previous: Option<&TripPoint> = None;
        for (i, point) in path.iter().enumerate() {
            if !utils::is_valid_lng_lat(&point.position) {
                return Err(EngineError::InvalidGeometry(format!(
                    "trip {vendor} vertex {i} has invalid position ({}, {})",
                    point.position.x(),
                    point.position.y()
                )));
            }
            if !point.timestamp_ms.is_finite() {
                return Err(EngineError::InvalidGeometry(format!(
                    "trip {vendor} vertex {i} has a non-finite timestamp"
                )));
            }
            if let Some(prev) = previous {
                if point.timestamp_ms < prev.timestamp_ms {
                    return Err(EngineError::InvalidGeometry(format!(
                        "trip {vendor} vertex {i} goes back in time"
                    )));
                }
                length_m += utils::haversine_distance(prev.position, point.position);
            }
            previous = Some(point);
        }

        Ok((
            TimeRange::new(first.timestamp_ms, last.timestamp_ms),
            length_m,
        ))
    }

    #[inline]
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    #[inline]
    pub fn path(&self) -> &[TripPoint] {
        &self.path
    }

    #[inline]
    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    /// Total path length in meters
    #[inline]
    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    /// Interpolated position at a time, `None` outside the trip's span
    pub fn position_at(&self, time_ms: f64) -> Option<GeoPoint> {
        if !self.time_range.contains(time_ms) {
            return None;
        }
        let next = self.path.partition_point(|p| p.timestamp_ms <= time_ms);
        if next >= self.path.len() {
            return self.path.last().map(|p| p.position);
        }
        // `time_ms >= start` guarantees at least one vertex at or before it
        let a = &self.path[next.saturating_sub(1)];
        let b = &self.path[next];
        let span = b.timestamp_ms - a.timestamp_ms;
        if span <= 0.0 {
            return Some(a.position);
        }
        let t = (time_ms - a.timestamp_ms) / span;
        Some(Point::new(
            a.position.x() + (b.position.x() - a.position.x()) * t,
            a.position.y() + (b.position.y() - a.position.y()) * t,
        ))
    }

    /// Visible part of the path for a cursor time
    ///
    /// Covers `[current - trail_length, current]` clipped to the trip's span, with
    /// interpolated end vertices. Empty before the trip starts and once the trail has
    /// fully passed its end.
    pub fn trail(&self, current_ms: f64, trail_length_ms: f64) -> Vec<TrailVertex> {
        if !current_ms.is_finite() || !trail_length_ms.is_finite() || trail_length_ms < 0.0 {
            return Vec::new();
        }
        let tail = (current_ms - trail_length_ms).max(self.time_range.start);
        let head = current_ms.min(self.time_range.end);
        if head < tail {
            return Vec::new();
        }

        let span = head - tail;
        let opacity = |time: f64| {
            if span > 0.0 {
                ((time - tail) / span).clamp(0.0, 1.0)
            } else {
                1.0
            }
        };
        let vertex = |time: f64| {
            self.position_at(time).map(|position| TrailVertex {
                position,
                timestamp_ms: time,
                opacity: opacity(time),
            })
        };

        if span <= 0.0 {
            return vertex(head).into_iter().collect();
        }

        let mut trail = Vec::with_capacity(self.path.len() + 2);
        trail.extend(vertex(tail));
        trail.extend(
            self.path
                .iter()
                .filter(|p| p.timestamp_ms > tail && p.timestamp_ms < head)
                .map(|p| TrailVertex {
                    position: p.position,
                    timestamp_ms: p.timestamp_ms,
                    opacity: opacity(p.timestamp_ms),
                }),
        );
        trail.extend(vertex(head));
        trail
    }
}

/// Earliest and latest timestamp over all trips
pub fn time_range(trips: &[Trip]) -> Option<TimeRange> {
    trips
        .iter()
        .map(Trip::time_range)
        .reduce(|a, b| TimeRange::new(a.start.min(b.start), a.end.max(b.end)))
}

/// Trail duration for a data range: a fixed share of it, never below [`TRAIL_MIN_MS`]
pub fn trail_length(range: &TimeRange) -> f64 {
    let duration = range.length();
    if duration.is_finite() {
        TRAIL_MIN_MS.max(duration * TRAIL_FRACTION)
    } else {
        TRAIL_MIN_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: f64 = 1_672_531_200_000.0;

    fn trip() -> Trip {
        Trip::new(
            "vehicle-1",
            vec![
                TripPoint::new(-122.406417, 37.785834, T0),
                TripPoint::new(-122.404, 37.7865, T0 + 60_000.0),
                TripPoint::new(-122.401, 37.788, T0 + 120_000.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_trip_metadata() {
        let trip = trip();
        assert_eq!(trip.vendor(), "vehicle-1");
        assert_eq!(trip.time_range(), TimeRange::new(T0, T0 + 120_000.0));
        // Roughly 230 m + 310 m
        assert!(trip.length_m() > 400.0 && trip.length_m() < 700.0);
    }

    #[test]
    fn test_trip_validation() {
        assert!(Trip::new("empty", Vec::new()).is_err());
        assert!(Trip::new("bad", vec![TripPoint::new(200.0, 0.0, 0.0)]).is_err());
        assert!(Trip::new("nan", vec![TripPoint::new(0.0, 0.0, f64::NAN)]).is_err());
        assert!(Trip::new(
            "backwards",
            vec![TripPoint::new(0.0, 0.0, 10.0), TripPoint::new(0.0, 0.0, 5.0)]
        )
        .is_err());
        assert!(Trip::new("single", vec![TripPoint::new(0.0, 0.0, 5.0)]).is_ok());
    }

    #[test]
    fn test_position_at() {
        let trip = trip();
        assert_eq!(trip.position_at(T0 - 1.0), None);
        assert_eq!(trip.position_at(T0 + 120_001.0), None);
        assert_eq!(trip.position_at(T0), Some(trip.path()[0].position));
        assert_eq!(trip.position_at(T0 + 60_000.0), Some(trip.path()[1].position));
        assert_eq!(trip.position_at(T0 + 120_000.0), Some(trip.path()[2].position));

        let mid = trip.position_at(T0 + 30_000.0).unwrap();
        assert!((mid.x() - (-122.406417 + -122.404) / 2.0).abs() < 1e-9);
        assert!((mid.y() - (37.785834 + 37.7865) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_trail_fades_towards_tail() {
        let trip = trip();
        let trail = trip.trail(T0 + 90_000.0, 42_000.0);
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[0].timestamp_ms, T0 + 48_000.0);
        assert_eq!(trail[0].opacity, 0.0);
        assert_eq!(trail[1].position, trip.path()[1].position);
        assert!((trail[1].opacity - 12.0 / 42.0).abs() < 1e-9);
        assert_eq!(trail[2].timestamp_ms, T0 + 90_000.0);
        assert_eq!(trail[2].opacity, 1.0);
        assert!(trail.windows(2).all(|w| w[0].opacity < w[1].opacity));
    }

    #[test]
    fn test_trail_clipped_to_trip_span() {
        let trip = trip();
        assert!(trip.trail(T0 - 10.0, 42_000.0).is_empty());
        assert!(trip.trail(T0 + 200_000.0, 42_000.0).is_empty());

        let start = trip.trail(T0, 42_000.0);
        assert_eq!(start.len(), 1);
        assert_eq!(start[0].opacity, 1.0);

        let ending = trip.trail(T0 + 150_000.0, 42_000.0);
        assert_eq!(ending.first().unwrap().timestamp_ms, T0 + 108_000.0);
        assert_eq!(ending.last().unwrap().timestamp_ms, T0 + 120_000.0);
    }

    #[test]
    fn test_time_range_and_trail_length() {
        let other = Trip::new(
            "vehicle-2",
            vec![
                TripPoint::new(-122.412345, 37.781122, T0 - 5000.0),
                TripPoint::new(-122.41, 37.783, T0 + 60_000.0),
            ],
        )
        .unwrap();
        let range = time_range(&[trip(), other]).unwrap();
        assert_eq!(range, TimeRange::new(T0 - 5000.0, T0 + 120_000.0));
        assert_eq!(time_range(&[]), None);

        assert_eq!(trail_length(&TimeRange::new(0.0, 120_000.0)), 42_000.0);
        assert_eq!(trail_length(&TimeRange::new(0.0, 1000.0)), TRAIL_MIN_MS);
    }
}
