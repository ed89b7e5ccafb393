use crate::error::SimError;
use clap::Parser;
use geo_layers_lib::datasets::LARGE_DATASET_COUNT;
use geo_layers_lib::{CategoryFilter, EngineConfig};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Geo Layers simulator - drives the map engine with a scripted camera and reports what a renderer would draw
pub struct Settings {
    /// Number of random points in the clustered dataset
    #[clap(long, default_value_t = LARGE_DATASET_COUNT)]
    pub points: usize,

    /// Use the three built-in sample points instead of a random dataset
    #[clap(long, default_value = "false")]
    pub sample_data: bool,

    /// Seed of the random dataset
    #[clap(long, default_value = "1")]
    pub seed: u64,

    /// Category filter: all, restaurant, cafe, museum, park or shop
    #[clap(long, default_value = "all")]
    pub category: CategoryFilter,

    /// Disable point clustering
    #[clap(long, default_value = "false")]
    pub no_clustering: bool,

    /// Cluster radius in pixels (overrides the config file)
    #[clap(long)]
    pub cluster_radius: Option<f64>,

    /// Zoom at and above which points are no longer clustered (overrides the config file)
    #[clap(long)]
    pub cluster_max_zoom: Option<u8>,

    /// Maximum number of cached tiles (overrides the config file)
    #[clap(long)]
    pub tile_cache_size: Option<usize>,

    /// Duration of one trip animation loop in milliseconds (overrides the config file)
    #[clap(long)]
    pub loop_period_ms: Option<f64>,

    /// Simulated display refresh rate
    #[clap(long, default_value = "60")]
    pub fps: f64,

    /// Length of the simulation in milliseconds
    #[clap(long, default_value = "5000")]
    pub duration_ms: u64,

    /// Viewport width in pixels
    #[clap(long, default_value = "1280")]
    pub width: u32,

    /// Viewport height in pixels
    #[clap(long, default_value = "720")]
    pub height: u32,

    /// Tile size in pixels used to enumerate visible tiles
    #[clap(long, default_value = "256")]
    pub tile_size: f64,

    /// Play the trips animation from the start
    #[clap(long, default_value = "false")]
    pub play: bool,

    /// JSON engine configuration file
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[clap(long, default_value = "false")]
    pub summary_json: bool,
}

impl Settings {
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Engine configuration: the config file (or defaults) with command line overrides applied
    pub fn engine_config(&self) -> Result<EngineConfig, SimError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => EngineConfig::default(),
        };

        if let Some(radius) = self.cluster_radius {
            config.cluster.radius_px = radius;
        }
        if let Some(max_zoom) = self.cluster_max_zoom {
            config.cluster.max_zoom = max_zoom;
        }
        if let Some(capacity) = self.tile_cache_size {
            config.tiles.capacity = capacity;
        }
        if let Some(period) = self.loop_period_ms {
            config.animation.loop_period_ms = period;
        }
        if self.play {
            config.animation.autoplay = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Interval between two simulated frames
    pub fn frame_interval_ms(&self) -> f64 {
        if self.fps.is_finite() && self.fps > 0.0 {
            1000.0 / self.fps
        } else {
            1000.0 / 60.0
        }
    }
}

fn load_config(path: &Path) -> Result<EngineConfig, SimError> {
    let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&text).map_err(|source| SimError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Loaded engine configuration from {}", path.display());
    Ok(config)
}
