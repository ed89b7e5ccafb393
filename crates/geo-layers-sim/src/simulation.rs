//! Frame loop driving the engine like a renderer would
//!
//! Every simulated frame feeds the scripted viewport and a timestamp to
//! [`MapEngine::frame`], then requests every tile covering the visible bounds, the way a
//! tile layer does after a camera move.

use crate::error::SimError;
use crate::scenario::CameraScript;
use crate::settings::Settings;
use geo_layers_lib::datasets::{self, DATASET_BOUNDS};
use geo_layers_lib::utils::tile_zoom_for_viewport;
use geo_layers_lib::{
    EngineConfig, FrameInput, FrameSnapshot, MapEngine, TileCacheStats, TileKey,
};
use rayon::prelude::*;
use serde::Serialize;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Aggregated results of a run
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub frames: u64,
    pub elapsed_ms: f64,
    pub total_points: usize,
    pub active_points: usize,
    pub category: String,
    pub clustering: bool,
    pub viewport_changes: u64,
    pub min_visible_nodes: usize,
    pub max_visible_nodes: usize,
    pub max_visible_clusters: usize,
    pub tile_requests: u64,
    pub tiles: TileCacheStats,
    pub final_time_ms: f64,
    pub final_progress: f64,
    pub fps: u32,
    pub config: EngineConfig,
}

/// Engine plus the camera script and per-run counters
pub struct Simulation {
    engine: MapEngine,
    script: CameraScript,
    tile_size_px: f64,
    frames: u64,
    viewport_changes: u64,
    min_visible_nodes: Option<usize>,
    max_visible_nodes: usize,
    max_visible_clusters: usize,
    tile_requests: u64,
    last_frame_ms: f64,
}

impl Simulation {
    pub fn new(settings: &Settings) -> Result<Self, SimError> {
        let config = settings.engine_config()?;
        let mut engine = MapEngine::new(config)?;

        if settings.sample_data {
            engine.set_dataset(datasets::sample_points())?;
        } else {
            engine.set_dataset(datasets::random_points(
                settings.points,
                &DATASET_BOUNDS,
                settings.seed,
            ))?;
        }
        engine.set_category_filter(settings.category)?;
        engine.set_clustering_enabled(!settings.no_clustering);
        engine.set_trips(datasets::sample_trips()?)?;

        engine.set_tile_observer(|entries| tracing::trace!("Tile cache holds {} tiles", entries));

        Ok(Self {
            engine,
            script: CameraScript::new(
                settings.width,
                settings.height,
                (settings.duration_ms as f64).max(1.0),
            ),
            tile_size_px: settings.tile_size,
            frames: 0,
            viewport_changes: 0,
            min_visible_nodes: None,
            max_visible_nodes: 0,
            max_visible_clusters: 0,
            tile_requests: 0,
            last_frame_ms: 0.0,
        })
    }

    /// Run one frame at `now_ms` since the start of the simulation
    pub fn step(&mut self, now_ms: f64) -> FrameSnapshot {
        #[cfg(feature = "profiling")]
        profiling::scope!("Simulation::step");

        let snapshot = self.engine.frame(FrameInput {
            now_ms,
            viewport: Some(self.script.viewport_at(now_ms)),
        });

        if snapshot.viewport_changed {
            self.viewport_changes += 1;
            self.tile_requests += self.request_tiles(&snapshot) as u64;
        }

        let visible = snapshot.clusters.len();
        let clusters = snapshot.clusters.iter().filter(|n| n.is_cluster()).count();
        self.min_visible_nodes = Some(self.min_visible_nodes.map_or(visible, |m| m.min(visible)));
        self.max_visible_nodes = self.max_visible_nodes.max(visible);
        self.max_visible_clusters = self.max_visible_clusters.max(clusters);
        self.frames += 1;
        self.last_frame_ms = now_ms;

        tracing::trace!(
            "Frame {}: zoom {}, {} nodes ({} clusters), t={:.0}",
            self.frames,
            snapshot.zoom,
            visible,
            clusters,
            snapshot.time_ms
        );
        snapshot
    }

    /// Request every tile covering the snapshot bounds in parallel
    fn request_tiles(&self, snapshot: &FrameSnapshot) -> usize {
        let zoom = self
            .engine
            .viewport()
            .map(|viewport| tile_zoom_for_viewport(viewport.zoom, self.tile_size_px))
            .unwrap_or_default();
        let keys = TileKey::tiles_covering(&snapshot.bounds, zoom);
        let engine = &self.engine;
        keys.par_iter().for_each(|key| {
            engine.tile_data(*key, &key.bounds());
        });
        keys.len()
    }

    pub fn summary(&self) -> Summary {
        let stats = self.engine.stats();
        let clock = self.engine.clock();
        Summary {
            frames: self.frames,
            elapsed_ms: self.last_frame_ms,
            total_points: stats.total_points,
            active_points: stats.active_points,
            category: self.engine.category_filter().to_string(),
            clustering: self.engine.clustering_enabled(),
            viewport_changes: self.viewport_changes,
            min_visible_nodes: self.min_visible_nodes.unwrap_or_default(),
            max_visible_nodes: self.max_visible_nodes,
            max_visible_clusters: self.max_visible_clusters,
            tile_requests: self.tile_requests,
            tiles: stats.tiles,
            final_time_ms: clock.cursor(),
            final_progress: clock.progress(),
            fps: stats.fps,
            config: self.engine.config().clone(),
        }
    }
}

/// Run the simulation in real time at the configured refresh rate
pub async fn run(settings: &Settings) -> Result<Summary, SimError> {
    let mut simulation = Simulation::new(settings)?;
    let interval_ms = settings.frame_interval_ms();
    let duration = Duration::from_millis(settings.duration_ms);

    tracing::info!(
        "Simulating {} ms at {:.1} fps ({} points, filter {}, clustering {})",
        settings.duration_ms,
        1000.0 / interval_ms,
        simulation.engine.stats().total_points,
        settings.category,
        if settings.no_clustering { "off" } else { "on" }
    );

    let mut interval = tokio::time::interval(Duration::from_secs_f64(interval_ms / 1000.0));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let start = Instant::now();

    loop {
        let tick = interval.tick().await;
        let elapsed = tick.duration_since(start);
        if elapsed > duration {
            break;
        }
        simulation.step(elapsed.as_secs_f64() * 1000.0);
    }

    let summary = simulation.summary();
    tracing::info!(
        "Simulated {} frames: {} viewport changes, {}..{} visible nodes, {} tile requests ({} cached)",
        summary.frames,
        summary.viewport_changes,
        summary.min_visible_nodes,
        summary.max_visible_nodes,
        summary.tile_requests,
        summary.tiles.entries
    );
    Ok(summary)
}
