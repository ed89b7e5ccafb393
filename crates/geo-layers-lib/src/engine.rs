//! Engine facade driven by the host's viewport, dataset and frame signals
//!
//! [`MapEngine`] owns one instance of every component. Discrete UI events (dataset swap,
//! category filter, clustering toggle) rebuild or re-query the cluster index; every
//! animation frame goes through [`MapEngine::frame`], which captures the viewport and the
//! timestamp once and derives the whole [`FrameSnapshot`] from them.

use crate::clock::{AnimationClock, FpsMeter, TimeRange};
use crate::datasets::{PolygonFeature, RouteFeature};
use crate::cluster::{ClusterConfig, ClusterIndex, ClusterNode};
use crate::generator::TilePoint;
use crate::tile_cache::{TileCache, TileCacheConfig, TileCacheStats};
use crate::trips::{self, TrailVertex, Trip};
use crate::{
    BoundingBox, CategoryFilter, EngineError, GeoPoint, InputPoint, Result, TileKey, ViewportState,
    projector,
};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Zoom reached at least when focusing a single point
pub const FOCUS_ZOOM_MIN: f64 = 14.0;

/// Anything a user can click to focus the camera on
#[derive(Debug, Clone, Copy)]
pub enum FocusTarget<'a> {
    Node(&'a ClusterNode),
    Polygon(&'a PolygonFeature),
    Route(&'a RouteFeature),
    Trip(&'a Trip),
}

impl FocusTarget<'_> {
    /// Camera center for the target
    ///
    /// Polygons use their label anchor, routes their middle vertex and trips their
    /// first vertex.
    pub fn position(&self) -> Option<GeoPoint> {
        match self {
            Self::Node(node) => Some(node.position()),
            Self::Polygon(polygon) => Some(polygon.centroid),
            Self::Route(route) => {
                let coords = &route.path.0;
                coords.get(coords.len() / 2).map(|&c| c.into())
            }
            Self::Trip(trip) => trip.path().first().map(|point| point.position),
        }
    }
}

impl<'a> From<&'a ClusterNode> for FocusTarget<'a> {
    fn from(node: &'a ClusterNode) -> Self {
        Self::Node(node)
    }
}

impl<'a> From<&'a PolygonFeature> for FocusTarget<'a> {
    fn from(polygon: &'a PolygonFeature) -> Self {
        Self::Polygon(polygon)
    }
}

impl<'a> From<&'a RouteFeature> for FocusTarget<'a> {
    fn from(route: &'a RouteFeature) -> Self {
        Self::Route(route)
    }
}

impl<'a> From<&'a Trip> for FocusTarget<'a> {
    fn from(trip: &'a Trip) -> Self {
        Self::Trip(trip)
    }
}

/// Trip playback and frame sampling settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnimationConfig {
    /// Wall-clock duration of one pass over the trips' time range
    pub loop_period_ms: f64,
    /// FPS sample window
    pub fps_window_ms: f64,
    /// Start playing as soon as the engine is created
    pub autoplay: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            loop_period_ms: 18_000.0,
            fps_window_ms: 1000.0,
            autoplay: false,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub cluster: ClusterConfig,
    pub tiles: TileCacheConfig,
    pub animation: AnimationConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.tiles.validate()?;
        let animation = &self.animation;
        if !animation.loop_period_ms.is_finite() || animation.loop_period_ms <= 0.0 {
            return Err(EngineError::config(
                "loop_period_ms",
                "must be a positive number",
            ));
        }
        if !animation.fps_window_ms.is_finite() || animation.fps_window_ms <= 0.0 {
            return Err(EngineError::config("fps_window_ms", "must be a positive number"));
        }
        Ok(())
    }
}

/// Inputs of one animation frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Frame timestamp in milliseconds (monotonic clock)
    pub now_ms: f64,
    /// Viewport for this frame, `None` to keep the current one
    pub viewport: Option<ViewportState>,
}

/// Trail of one trip at the frame's time
#[derive(Debug, Clone, PartialEq)]
pub struct TripTrail {
    pub vendor: String,
    pub vertices: Vec<TrailVertex>,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Animation cursor in data time
    pub time_ms: f64,
    /// Animation progress in `[0, 1]`
    pub progress: f64,
    pub playing: bool,
    pub bounds: BoundingBox,
    /// Cluster level used for `clusters`
    pub zoom: u8,
    pub clusters: Arc<[ClusterNode]>,
    pub trails: Vec<TripTrail>,
    pub fps: u32,
    /// Whether this frame's viewport differed from the previous one
    pub viewport_changed: bool,
}

/// Counters for status displays
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineStats {
    pub total_points: usize,
    pub active_points: usize,
    pub visible_nodes: usize,
    pub visible_clusters: usize,
    pub tiles: TileCacheStats,
    pub fps: u32,
    pub time_ms: f64,
}

/// Viewport-driven state of the map layers
#[derive(Debug)]
pub struct MapEngine {
    config: EngineConfig,
    dataset: Vec<Arc<InputPoint>>,
    filter: CategoryFilter,
    clustering_enabled: bool,
    index: ClusterIndex,
    viewport: Option<ViewportState>,
    bounds: BoundingBox,
    clusters: Arc<[ClusterNode]>,
    tiles: TileCache,
    trips: Vec<Trip>,
    trail_length_ms: f64,
    clock: AnimationClock,
    fps: FpsMeter,
}

impl MapEngine {
    /// Create an engine with no data and no viewport
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let index = ClusterIndex::build(config.cluster.clone(), Vec::<InputPoint>::new())?;
        let tiles = TileCache::new(config.tiles.clone())?;
        let range = TimeRange::new(0.0, 0.0);
        let mut clock = AnimationClock::new(range, config.animation.loop_period_ms)?;
        clock.set_playing(config.animation.autoplay);
        let fps = FpsMeter::new(config.animation.fps_window_ms)?;

        Ok(Self {
            config,
            dataset: Vec::new(),
            filter: CategoryFilter::All,
            clustering_enabled: true,
            index,
            viewport: None,
            bounds: BoundingBox::default(),
            clusters: Arc::from(Vec::new()),
            tiles,
            trips: Vec::new(),
            trail_length_ms: trips::trail_length(&range),
            clock,
            fps,
        })
    }

    /// Replace the point dataset and rebuild the cluster index
    pub fn set_dataset<I, P>(&mut self, points: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<Arc<InputPoint>>,
    {
        self.dataset = points.into_iter().map(Into::into).collect();
        self.rebuild_index()
    }

    /// Restrict the clustered points to a category; rebuilds only when the filter changes
    pub fn set_category_filter(&mut self, filter: CategoryFilter) -> Result<()> {
        if self.filter == filter {
            return Ok(());
        }
        self.filter = filter;
        self.rebuild_index()
    }

    pub fn set_clustering_enabled(&mut self, enabled: bool) {
        if self.clustering_enabled != enabled {
            self.clustering_enabled = enabled;
            self.refresh_clusters();
        }
    }

    /// Apply a viewport; returns whether it differed from the current one
    pub fn set_viewport(&mut self, viewport: ViewportState) -> bool {
        if self.viewport == Some(viewport) {
            return false;
        }
        self.viewport = Some(viewport);
        self.bounds = projector::project(&viewport);
        self.refresh_clusters();
        true
    }

    /// Replace the animated trips; the clock range follows their time span
    pub fn set_trips(&mut self, trips: Vec<Trip>) -> Result<()> {
        let range = trips::time_range(&trips).unwrap_or(TimeRange::new(0.0, 0.0));
        let playing = self.clock.is_playing();
        let mut clock = AnimationClock::new(range, self.config.animation.loop_period_ms)?;
        clock.set_playing(playing);

        tracing::debug!(
            "Loaded {} trips spanning {}..{}",
            trips.len(),
            range.start,
            range.end
        );
        self.clock = clock;
        self.trail_length_ms = trips::trail_length(&range);
        self.trips = trips;
        Ok(())
    }

    /// Tile data for a tile layer request
    pub fn tile_data(&self, key: TileKey, bbox: &BoundingBox) -> Arc<[TilePoint]> {
        self.tiles.get_or_generate(key, bbox, key.z as f64)
    }

    /// Observe the number of cached tiles after every tile request
    pub fn set_tile_observer(&mut self, observer: impl Fn(usize) + Send + Sync + 'static) {
        self.tiles.set_observer(observer);
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.clock.set_playing(playing);
    }

    pub fn seek(&mut self, time_ms: f64) {
        self.clock.seek(time_ms);
    }

    /// Advance one frame
    ///
    /// The viewport (if any) is applied before the clock ticks; the snapshot is built from
    /// these inputs only.
    pub fn frame(&mut self, input: FrameInput) -> FrameSnapshot {
        #[cfg(feature = "profiling")]
        profiling::scope!("MapEngine::frame");

        let viewport_changed = input
            .viewport
            .is_some_and(|viewport| self.set_viewport(viewport));
        let time_ms = self.clock.tick(input.now_ms);
        let fps = self.fps.record_frame(input.now_ms);

        FrameSnapshot {
            time_ms,
            progress: self.clock.progress(),
            playing: self.clock.is_playing(),
            bounds: self.bounds,
            zoom: self.cluster_zoom(),
            clusters: Arc::clone(&self.clusters),
            trails: self.trails_at(time_ms),
            fps,
            viewport_changed,
        }
    }

    /// Trails of every trip at a data time
    pub fn trails_at(&self, time_ms: f64) -> Vec<TripTrail> {
        self.trips
            .iter()
            .map(|trip| TripTrail {
                vendor: trip.vendor().to_string(),
                vertices: trip.trail(time_ms, self.trail_length_ms),
            })
            .filter(|trail| !trail.vertices.is_empty())
            .collect()
    }

    /// Viewport centered on a clicked object, zoomed in far enough to separate it
    ///
    /// Aggregates zoom to their expansion zoom, everything else to at least
    /// [`FOCUS_ZOOM_MIN`]; focusing never zooms out. `None` before the first viewport or
    /// when the target has no position.
    pub fn focus<'a>(&self, target: impl Into<FocusTarget<'a>>) -> Option<ViewportState> {
        let viewport = self.viewport?;
        let target = target.into();
        let target_zoom = match target {
            FocusTarget::Node(ClusterNode::Aggregate(aggregate)) => self
                .index
                .expansion_zoom(aggregate.id)
                .map_or(FOCUS_ZOOM_MIN, |zoom| zoom as f64),
            _ => FOCUS_ZOOM_MIN,
        };
        Some(ViewportState {
            center: target.position()?,
            zoom: viewport.zoom.max(target_zoom),
            ..viewport
        })
    }

    /// Position under a screen pixel of the current viewport
    pub fn pick_position(&self, x: f64, y: f64) -> Option<GeoPoint> {
        self.viewport
            .map(|viewport| projector::unproject(&viewport, x, y))
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            total_points: self.dataset.len(),
            active_points: self.index.len(),
            visible_nodes: self.clusters.len(),
            visible_clusters: self.clusters.iter().filter(|node| node.is_cluster()).count(),
            tiles: self.tiles.stats(),
            fps: self.fps.fps(),
            time_ms: self.clock.cursor(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    pub fn index(&self) -> &ClusterIndex {
        &self.index
    }

    /// Points passing the category filter
    pub fn active_points(&self) -> &[Arc<InputPoint>] {
        self.index.points()
    }

    pub fn category_filter(&self) -> CategoryFilter {
        self.filter
    }

    pub fn clustering_enabled(&self) -> bool {
        self.clustering_enabled
    }

    pub fn viewport(&self) -> Option<&ViewportState> {
        self.viewport.as_ref()
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Cluster query result for the current viewport
    pub fn clusters(&self) -> &Arc<[ClusterNode]> {
        &self.clusters
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn tile_cache(&self) -> &TileCache {
        &self.tiles
    }

    fn cluster_zoom(&self) -> u8 {
        let zoom = self
            .viewport
            .map(|viewport| viewport.cluster_zoom())
            .unwrap_or_default();
        self.index.level_zoom(zoom)
    }

    fn rebuild_index(&mut self) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("MapEngine::rebuild_index");

        let filter = self.filter;
        let active = self
            .dataset
            .iter()
            .filter(|point| filter.matches(point.category))
            .cloned();
        self.index = ClusterIndex::build(self.config.cluster.clone(), active)?;
        tracing::debug!(
            "Rebuilt cluster index with {} of {} points (filter: {})",
            self.index.len(),
            self.dataset.len(),
            filter
        );
        self.refresh_clusters();
        Ok(())
    }

    fn refresh_clusters(&mut self) {
        self.clusters = match self.viewport {
            Some(viewport) if self.clustering_enabled => self
                .index
                .query(&self.bounds, viewport.cluster_zoom())
                .into(),
            _ => Arc::from(Vec::new()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, datasets};
    use geo::Point;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine_with_samples() -> MapEngine {
        let mut engine = MapEngine::new(EngineConfig::default()).unwrap();
        engine.set_dataset(datasets::sample_points()).unwrap();
        engine.set_trips(datasets::sample_trips().unwrap()).unwrap();
        engine
    }

    fn viewport_at_zoom(zoom: f64) -> ViewportState {
        ViewportState {
            zoom,
            ..datasets::default_viewport(1280, 720)
        }
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MapEngine>();
    }

    #[test]
    fn test_no_clusters_before_viewport() {
        let engine = engine_with_samples();
        assert!(engine.clusters().is_empty());
        assert_eq!(engine.stats().active_points, 3);
    }

    #[test]
    fn test_viewport_drives_cluster_query() {
        let mut engine = engine_with_samples();
        assert!(engine.set_viewport(viewport_at_zoom(10.0)));
        assert_eq!(engine.clusters().len(), 1);
        assert_eq!(engine.clusters()[0].count(), 3);

        assert!(!engine.set_viewport(viewport_at_zoom(10.0)));

        let close = ViewportState::new(datasets::DATASET_BOUNDS.center(), 17.0, 8000, 8000);
        assert!(engine.set_viewport(close));
        assert_eq!(engine.clusters().len(), 3);
        assert_eq!(engine.stats().visible_clusters, 0);
    }

    #[test]
    fn test_category_filter_rebuilds() {
        let mut engine = engine_with_samples();
        engine.set_viewport(viewport_at_zoom(10.0));
        engine
            .set_category_filter(CategoryFilter::Only(Category::Cafe))
            .unwrap();
        assert_eq!(engine.active_points().len(), 1);
        assert_eq!(engine.clusters().len(), 1);
        assert!(!engine.clusters()[0].is_cluster());

        engine.set_category_filter(CategoryFilter::All).unwrap();
        assert_eq!(engine.active_points().len(), 3);
    }

    #[test]
    fn test_clustering_toggle() {
        let mut engine = engine_with_samples();
        engine.set_viewport(viewport_at_zoom(12.0));
        engine.set_clustering_enabled(false);
        assert!(engine.clusters().is_empty());
        engine.set_clustering_enabled(true);
        assert!(!engine.clusters().is_empty());
    }

    #[test]
    fn test_frame_uses_captured_inputs() {
        let mut engine = engine_with_samples();
        engine.set_playing(true);
        let start = engine.clock().range().start;

        let viewport = viewport_at_zoom(13.2);
        let first = engine.frame(FrameInput {
            now_ms: 5000.0,
            viewport: Some(viewport),
        });
        assert!(first.viewport_changed);
        assert_eq!(first.time_ms, start);
        assert_eq!(first.bounds, projector::project(&viewport));
        assert_eq!(first.zoom, 13);

        let second = engine.frame(FrameInput {
            now_ms: 5900.0,
            viewport: None,
        });
        assert!(!second.viewport_changed);
        // 120 s of data over an 18 s loop
        assert!((second.time_ms - (start + 6000.0)).abs() < 1e-6);
        assert!(Arc::ptr_eq(&first.clusters, &second.clusters));
        assert_eq!(second.trails.len(), 2);
    }

    #[test]
    fn test_paused_frames_keep_time() {
        let mut engine = engine_with_samples();
        let start = engine.clock().range().start;
        for now in [0.0, 16.0, 32.0] {
            let snapshot = engine.frame(FrameInput {
                now_ms: now,
                viewport: None,
            });
            assert_eq!(snapshot.time_ms, start);
            assert!(!snapshot.playing);
        }
        engine.seek(start + 60_000.0);
        assert_eq!(engine.clock().cursor(), start + 60_000.0);
    }

    #[test]
    fn test_tile_data_and_observer() {
        let mut engine = engine_with_samples();
        let entries = Arc::new(AtomicUsize::new(0));
        {
            let entries = Arc::clone(&entries);
            engine.set_tile_observer(move |count| entries.store(count, Ordering::SeqCst));
        }
        let key = TileKey::new(13, 1310, 3166);
        let points = engine.tile_data(key, &key.bounds());
        assert_eq!(points.len(), 54);
        assert_eq!(entries.load(Ordering::SeqCst), 1);
        assert_eq!(engine.stats().tiles.misses, 1);
    }

    #[test]
    fn test_focus() {
        let mut engine = engine_with_samples();
        let point = Arc::new(datasets::sample_points().remove(1));
        assert_eq!(engine.focus(&ClusterNode::Leaf(Arc::clone(&point))), None);

        engine.set_viewport(viewport_at_zoom(10.0));
        let focused = engine.focus(&ClusterNode::Leaf(point)).unwrap();
        assert_eq!(focused.center, Point::new(-122.412345, 37.781122));
        assert_eq!(focused.zoom, FOCUS_ZOOM_MIN);
        assert_eq!(focused.pitch, 40.0);

        let cluster = engine.clusters()[0].clone();
        let focused = engine.focus(&cluster).unwrap();
        assert!(focused.zoom > 10.0);
        assert!(focused.zoom <= 16.0);
    }

    #[test]
    fn test_snapshot_zoom_is_the_queried_level() {
        let mut engine = MapEngine::new(EngineConfig::default()).unwrap();
        engine
            .set_dataset(datasets::random_points(2000, &datasets::DATASET_BOUNDS, 7))
            .unwrap();
        let viewport = ViewportState::new(datasets::DATASET_BOUNDS.center(), 19.6, 1280, 720);
        let snapshot = engine.frame(FrameInput {
            now_ms: 0.0,
            viewport: Some(viewport),
        });
        assert_eq!(snapshot.zoom, engine.config().cluster.max_zoom);
        assert_eq!(
            snapshot.clusters.len(),
            engine.index().query(&snapshot.bounds, snapshot.zoom).len()
        );
    }

    #[test]
    fn test_focus_features() {
        let mut engine = engine_with_samples();
        let polygon = datasets::sample_polygons().remove(0);
        let route = datasets::sample_routes().remove(0);
        let trip = engine.trips()[1].clone();
        assert_eq!(engine.focus(&polygon), None);

        engine.set_viewport(viewport_at_zoom(11.0));
        let focused = engine.focus(&polygon).unwrap();
        assert_eq!(focused.center, polygon.centroid);
        assert_eq!(focused.zoom, FOCUS_ZOOM_MIN);

        // Two vertex routes center on their second vertex
        let focused = engine.focus(&route).unwrap();
        assert_eq!(focused.center, Point::new(-122.412345, 37.781122));
        assert_eq!(focused.zoom, FOCUS_ZOOM_MIN);

        let focused = engine.focus(&trip).unwrap();
        assert_eq!(focused.center, Point::new(-122.412345, 37.781122));
        assert_eq!(focused.zoom, FOCUS_ZOOM_MIN);

        // Never zooms out
        engine.set_viewport(viewport_at_zoom(16.5));
        assert_eq!(engine.focus(FocusTarget::Trip(&trip)).unwrap().zoom, 16.5);

        let empty = datasets::RouteFeature {
            path: geo::LineString::new(Vec::new()),
            ..route
        };
        assert_eq!(engine.focus(&empty), None);
    }

    #[test]
    fn test_invalid_config() {
        let config = EngineConfig {
            animation: AnimationConfig {
                loop_period_ms: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            MapEngine::new(config),
            Err(EngineError::InvalidConfig {
                field: "loop_period_ms",
                ..
            })
        ));
    }
}
