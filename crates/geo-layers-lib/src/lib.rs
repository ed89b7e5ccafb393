//! Geo Layers Library - Viewport-Driven Spatial Data Engine
//!
//! This library decides what an interactive map renderer should draw on every viewport
//! change and every animation frame. Rendering itself is left to the host; everything here
//! is synchronous, deterministic and cheap enough to run inside a single frame.
//!
//! # Architecture
//!
//! - **[`projector`]**: Viewport state to geographic bounding box (Web Mercator)
//! - **[`ClusterIndex`]**: Hierarchical greedy point clustering with one KD-tree per zoom level
//! - **[`generator`]**: Seed-keyed deterministic synthetic point generation
//! - **[`TileCache`]**: LRU tile data cache with lookup-or-generate semantics
//! - **[`AnimationClock`]**: Frame-paced looping time cursor
//! - **[`MapEngine`]**: Facade wiring the above to viewport, dataset and frame signals
//!
//! # Performance Characteristics
//!
//! - **Index build**: O(N log N) per zoom level, point projection parallelized
//! - **Cluster query**: O(log N + K) where K = nodes inside the bounding box
//! - **Tile lookup**: O(1) on hit, O(count) generation on miss

pub mod clock;
pub mod cluster;
pub mod datasets;
pub mod engine;
pub mod generator;
pub mod geometry;
pub mod point;
pub mod projector;
pub mod style;
pub mod tile_cache;
pub mod trips;
pub mod utils;

// Public API exports
pub use clock::{AnimationClock, FpsMeter, PlaybackState, TimeRange};
pub use cluster::{ClusterAggregate, ClusterConfig, ClusterId, ClusterIndex, ClusterNode};
pub use engine::{
    AnimationConfig, EngineConfig, EngineStats, FocusTarget, FrameInput, FrameSnapshot, MapEngine,
    TripTrail,
};
pub use generator::{TilePoint, TileSeed};
pub use geometry::{BoundingBox, GeoPoint, TileKey, ViewportState};
pub use point::{Category, CategoryFilter, InputPoint};
pub use tile_cache::{TileCache, TileCacheConfig, TileCacheStats, TileDensity};
pub use trips::{TrailVertex, Trip, TripPoint};

/// Error types for the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that all public types are accessible
        let _: fn(EngineConfig) -> Result<MapEngine> = MapEngine::new;
        let _: fn() -> EngineConfig = EngineConfig::default;
    }

    #[test]
    fn test_config_error_message() {
        let err = EngineError::config("loop_period_ms", "must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for `loop_period_ms`: must be positive"
        );
    }
}
