//! Color and size helpers for renderers
//!
//! All colors are RGBA with 8 bits per channel.

use crate::{Category, ClusterNode};

pub type Rgba = [u8; 4];

const CATEGORY_ALPHA: u8 = 200;

/// Radius of a single point marker in pixels
pub const POINT_RADIUS_PX: f64 = 6.0;

/// Smallest radius of an aggregate marker in pixels
pub const MIN_CLUSTER_RADIUS_PX: f64 = 10.0;

/// Growth of the aggregate radius with the square root of its count
pub const CLUSTER_RADIUS_SCALE: f64 = 4.0;

/// Smallest route width in pixels
pub const MIN_ROUTE_WIDTH_PX: f64 = 2.0;

const CHOROPLETH_LOW: [u8; 3] = [226, 232, 240];
const CHOROPLETH_HIGH: [u8; 3] = [52, 211, 153];
const CHOROPLETH_FLAT: Rgba = [160, 217, 149, 200];

pub fn category_color(category: Category) -> Rgba {
    let [r, g, b] = match category {
        Category::Restaurant => [255, 107, 107],
        Category::Cafe => [77, 171, 247],
        Category::Museum => [255, 209, 102],
        Category::Park => [160, 217, 149],
        Category::Shop => [162, 155, 254],
    };
    [r, g, b, CATEGORY_ALPHA]
}

/// Aggregate color by count bucket
pub fn cluster_color(count: u32) -> Rgba {
    match count {
        c if c > 100 => [99, 102, 241, 220],
        c if c > 50 => [59, 130, 246, 220],
        c if c > 20 => [14, 165, 233, 220],
        _ => [56, 189, 248, 200],
    }
}

/// Linear ramp between a light and a saturated green
///
/// Values are clamped to `[min, max]`; a flat color is used when the range is empty.
pub fn choropleth_color(value: f64, min: f64, max: f64) -> Rgba {
    if max == min {
        return CHOROPLETH_FLAT;
    }
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    let t = if t.is_nan() { 0.0 } else { t };
    let channel = |i: usize| {
        let low = CHOROPLETH_LOW[i] as f64;
        let high = CHOROPLETH_HIGH[i] as f64;
        (low + (high - low) * t).round() as u8
    };
    [channel(0), channel(1), channel(2), 200]
}

pub fn cluster_radius_px(count: u32) -> f64 {
    MIN_CLUSTER_RADIUS_PX.max((count as f64).sqrt() * CLUSTER_RADIUS_SCALE)
}

pub fn route_width_px(volume: f64) -> f64 {
    MIN_ROUTE_WIDTH_PX.max(volume / 15.0)
}

/// Marker color of a cluster query result
pub fn node_color(node: &ClusterNode) -> Rgba {
    match node {
        ClusterNode::Leaf(point) => category_color(point.category),
        ClusterNode::Aggregate(aggregate) => cluster_color(aggregate.count),
    }
}

/// Marker radius of a cluster query result
pub fn node_radius_px(node: &ClusterNode) -> f64 {
    match node {
        ClusterNode::Leaf(_) => POINT_RADIUS_PX,
        ClusterNode::Aggregate(aggregate) => cluster_radius_px(aggregate.count),
    }
}
