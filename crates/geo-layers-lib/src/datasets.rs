//! Built-in datasets around downtown San Francisco
//!
//! Small hand-made samples for every layer kind, plus a seeded generator for large
//! point sets used to exercise the cluster index.

use crate::generator::{SeededRandom, TileSeed};
use crate::{BoundingBox, Category, InputPoint, Result, Trip, TripPoint, ViewportState};
use geo::{LineString, Point, Polygon, coord};

/// Area covered by the sample data and the default random dataset
pub const DATASET_BOUNDS: BoundingBox = BoundingBox::new(-122.42, 37.78, -122.39, 37.80);

/// Size of the large random dataset
pub const LARGE_DATASET_COUNT: usize = 10_000;

/// Initial camera over the sample data
pub fn default_viewport(width_px: u32, height_px: u32) -> ViewportState {
    ViewportState::new(Point::new(-122.406417, 37.785834), 12.5, width_px, height_px)
        .with_pitch(40.0)
        .with_bearing(-10.0)
}

/// A region with a scalar value for choropleth rendering
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    pub region: String,
    pub value: f64,
    /// Label anchor
    pub centroid: Point<f64>,
    pub ring: Polygon<f64>,
}

/// A flow between two sample points
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFeature {
    pub from: String,
    pub to: String,
    pub volume: f64,
    pub path: LineString<f64>,
}

pub fn sample_points() -> Vec<InputPoint> {
    [
        ("p1", Category::Restaurant, 4.2, -122.406417, 37.785834),
        ("p2", Category::Cafe, 4.8, -122.412345, 37.781122),
        ("p3", Category::Museum, 4.6, -122.399245, 37.792134),
    ]
    .into_iter()
    .map(|(id, category, weight, lng, lat)| InputPoint {
        id: id.to_string(),
        category,
        weight,
        position: Point::new(lng, lat),
    })
    .collect()
}

pub fn sample_polygons() -> Vec<PolygonFeature> {
    let rectangle = |south: f64, north: f64| {
        Polygon::new(
            LineString::from(vec![
                (-122.42, north),
                (-122.40, north),
                (-122.40, south),
                (-122.42, south),
                (-122.42, north),
            ]),
            vec![],
        )
    };
    vec![
        PolygonFeature {
            region: "north".to_string(),
            value: 120.0,
            centroid: Point::new(-122.41, 37.795),
            ring: rectangle(37.79, 37.80),
        },
        PolygonFeature {
            region: "south".to_string(),
            value: 75.0,
            centroid: Point::new(-122.41, 37.785),
            ring: rectangle(37.78, 37.79),
        },
    ]
}

pub fn sample_routes() -> Vec<RouteFeature> {
    let points = sample_points();
    [(0, 1, 120.0), (1, 2, 40.0)]
        .into_iter()
        .map(|(from, to, volume)| {
            let (a, b) = (&points[from], &points[to]);
            RouteFeature {
                from: a.id.clone(),
                to: b.id.clone(),
                volume,
                path: LineString::new(vec![
                    coord! { x: a.position.x(), y: a.position.y() },
                    coord! { x: b.position.x(), y: b.position.y() },
                ]),
            }
        })
        .collect()
}

pub fn sample_trips() -> Result<Vec<Trip>> {
    const T0: f64 = 1_672_531_200_000.0;
    Ok(vec![
        Trip::new(
            "vehicle-1",
            vec![
                TripPoint::new(-122.406417, 37.785834, T0),
                TripPoint::new(-122.404, 37.7865, T0 + 60_000.0),
                TripPoint::new(-122.401, 37.788, T0 + 120_000.0),
            ],
        )?,
        Trip::new(
            "vehicle-2",
            vec![
                TripPoint::new(-122.412345, 37.781122, T0),
                TripPoint::new(-122.41, 37.783, T0 + 60_000.0),
                TripPoint::new(-122.4075, 37.785, T0 + 120_000.0),
            ],
        )?,
    ])
}

/// Deterministic random dataset inside `bbox`
///
/// Categories are assigned round-robin and weights are ratings in `[0, 5]` with one
/// decimal. Non-finite bounds produce no points.
pub fn random_points(count: usize, bbox: &BoundingBox, seed: u64) -> Vec<InputPoint> {
    #[cfg(feature = "profiling")]
    profiling::scope!("datasets::random_points");

    if !bbox.is_finite() {
        return Vec::new();
    }
    let mut random = SeededRandom::from_seed(&TileSeed::Number(seed));
    (0..count)
        .map(|i| {
            let lng = random.next_f64() * bbox.width() + bbox.west;
            let lat = random.next_f64() * bbox.height() + bbox.south;
            let weight = (random.next_f64() * 50.0).round() / 10.0;
            InputPoint {
                id: format!("p{i}"),
                category: Category::ALL[i % Category::ALL.len()],
                weight,
                position: Point::new(lng, lat),
            }
        })
        .collect()
}

/// Minimum and maximum polygon value
pub fn polygon_value_range(polygons: &[PolygonFeature]) -> Option<(f64, f64)> {
    polygons
        .iter()
        .map(|polygon| (polygon.value, polygon.value))
        .reduce(|(min, max), (value, _)| (min.min(value), max.max(value)))
}
