//! Deterministic synthetic point generation
//!
//! Tile contents are a pure function of `(bbox, count, seed)`: the seed string is hashed
//! with 32-bit FNV-1a and drives a Mulberry32 generator. Both algorithms are fixed here
//! so regenerated tiles are bit-identical across runs and platforms.

use crate::{BoundingBox, GeoPoint, TileKey};
use geo::Point;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;
const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;

/// A synthetic point with a normalized intensity in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TilePoint {
    pub position: GeoPoint,
    pub intensity: f64,
}

/// Seed of a generation run
///
/// Numbers hash through their decimal form, so `Number(7)` and `Text("7")` are the same seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TileSeed {
    Text(String),
    Number(u64),
}

impl TileSeed {
    pub fn hash(&self) -> u32 {
        match self {
            Self::Text(text) => hash_seed(text),
            Self::Number(number) => hash_seed(&number.to_string()),
        }
    }
}

impl fmt::Display for TileSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for TileSeed {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for TileSeed {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<u64> for TileSeed {
    fn from(number: u64) -> Self {
        Self::Number(number)
    }
}

impl From<TileKey> for TileSeed {
    fn from(key: TileKey) -> Self {
        Self::Text(key.to_string())
    }
}

/// 32-bit FNV-1a hash of the UTF-8 bytes
pub fn hash_seed(seed: &str) -> u32 {
    seed.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
    })
}

/// Mulberry32 pseudo random generator
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn from_seed(seed: &TileSeed) -> Self {
        Self::new(seed.hash())
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Uniform value in `[0, 1)`
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / 4_294_967_296.0
    }
}

/// Generate `count` points uniformly spread over `bbox`
///
/// A non-finite box yields no points.
pub fn generate(bbox: &BoundingBox, count: usize, seed: &TileSeed) -> Vec<TilePoint> {
    #[cfg(feature = "profiling")]
    profiling::scope!("generator::generate");

    if !bbox.is_finite() {
        tracing::trace!("Refusing to generate points in non-finite bounds {}", bbox);
        return Vec::new();
    }

    let mut random = SeededRandom::from_seed(seed);
    (0..count)
        .map(|_| {
            let lng = random.next_f64() * bbox.width() + bbox.west;
            let lat = random.next_f64() * bbox.height() + bbox.south;
            let intensity = (random.next_f64() * 100.0).round() / 100.0;
            TilePoint {
                position: Point::new(lng, lat),
                intensity,
            }
        })
        .collect()
}
