//! Bounded LRU cache of synthetic tile data
//!
//! Tiles are generated on first request with the tile key (`"z/x/y"`) as seed, so a tile
//! evicted and requested again comes back identical. Lookup and generation happen under
//! one lock: concurrent requests for the same missing tile generate it once.

use crate::generator::{self, TilePoint, TileSeed};
use crate::{BoundingBox, EngineError, Result, TileKey};
use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Callback receiving the number of cached tiles after every lookup
pub type TileObserver = Box<dyn Fn(usize) + Send + Sync>;

/// How many points a tile holds at a given zoom
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TileDensity {
    pub min_count: usize,
    pub max_count: usize,
    pub zoom_offset: f64,
    pub density_scale: f64,
}

impl Default for TileDensity {
    fn default() -> Self {
        Self {
            min_count: 24,
            max_count: 100,
            zoom_offset: 10.0,
            density_scale: 18.0,
        }
    }
}

impl TileDensity {
    /// `clamp(round((zoom - zoom_offset) * density_scale), min_count, max_count)`
    pub fn count_for_zoom(&self, zoom: f64) -> usize {
        let raw = ((zoom - self.zoom_offset) * self.density_scale).round();
        if raw.is_nan() {
            return self.min_count;
        }
        raw.clamp(self.min_count as f64, self.max_count as f64) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_count > self.max_count {
            return Err(EngineError::config(
                "min_count",
                format!("{} exceeds max_count {}", self.min_count, self.max_count),
            ));
        }
        if !self.zoom_offset.is_finite() {
            return Err(EngineError::config("zoom_offset", "must be finite"));
        }
        if !self.density_scale.is_finite() {
            return Err(EngineError::config("density_scale", "must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TileCacheConfig {
    /// Maximum number of cached tiles
    pub capacity: usize,
    pub density: TileDensity,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 180,
            density: TileDensity::default(),
        }
    }
}

impl TileCacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(EngineError::config("capacity", "must be at least 1"));
        }
        self.density.validate()
    }
}

/// Snapshot of the cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileCacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheState {
    entries: LruCache<TileKey, Arc<[TilePoint]>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct TileCache {
    state: Mutex<CacheState>,
    density: TileDensity,
    observer: Option<TileObserver>,
}

impl TileCache {
    pub fn new(config: TileCacheConfig) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.capacity)
            .ok_or_else(|| EngineError::config("capacity", "must be at least 1"))?;
        Ok(Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            density: config.density,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.set_observer(observer);
        self
    }

    pub fn set_observer(&mut self, observer: impl Fn(usize) + Send + Sync + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Cached tile data, generating and inserting it on a miss
    ///
    /// Malformed bounds return no points; nothing is cached and the observer is not called.
    pub fn get_or_generate(&self, key: TileKey, bbox: &BoundingBox, zoom: f64) -> Arc<[TilePoint]> {
        #[cfg(feature = "profiling")]
        profiling::scope!("TileCache::get_or_generate");

        if !bbox.has_area() {
            tracing::trace!("Tile {} requested with malformed bounds {}", key, bbox);
            return Arc::from(Vec::new());
        }

        let (points, entries) = {
            let mut state = self.lock();
            if let Some(points) = state.entries.get(&key).cloned() {
                state.hits += 1;
                (points, state.entries.len())
            } else {
                state.misses += 1;
                let count = self.density.count_for_zoom(zoom);
                let points: Arc<[TilePoint]> =
                    generator::generate(bbox, count, &TileSeed::from(key)).into();
                if let Some((evicted, _)) = state.entries.push(key, Arc::clone(&points)) {
                    state.evictions += 1;
                    tracing::debug!("Evicted tile {} for {}", evicted, key);
                }
                (points, state.entries.len())
            }
        };

        if let Some(observer) = &self.observer {
            observer(entries);
        }
        points
    }

    /// Whether a tile is cached, without touching its recency
    pub fn contains(&self, key: &TileKey) -> bool {
        self.lock().entries.contains(key)
    }

    /// Drop every cached tile; counters are kept
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn density(&self) -> &TileDensity {
        &self.density
    }

    pub fn stats(&self) -> TileCacheStats {
        let state = self.lock();
        TileCacheStats {
            entries: state.entries.len(),
            capacity: state.entries.cap().get(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCache")
            .field("stats", &self.stats())
            .field("density", &self.density)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
