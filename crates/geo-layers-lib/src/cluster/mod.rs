//! Hierarchical greedy point clustering
//!
//! The index precomputes one level per integer zoom between `min_zoom` and `max_zoom`.
//! Level `max_zoom` holds one node per input point; every coarser level is produced by
//! merging the nodes of the level below that lie within the cluster radius of each other,
//! projected to that zoom. Each level keeps its own static KD-tree so a viewport query only
//! touches the nodes near the requested bounding box.
//!
//! Aggregates live in an arena addressed by [`ClusterId`]; their children point either at
//! input points or at finer aggregates, which backs [`ClusterIndex::children`],
//! [`ClusterIndex::leaves`] and [`ClusterIndex::expansion_zoom`].

mod kdtree;

use crate::{BoundingBox, EngineError, GeoPoint, InputPoint, Result, utils};
use kdtree::KdTree;
use rayon::prelude::*;
use smallvec::{SmallVec, smallvec};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Padding applied to the unit square range query; results are re-checked in degrees
const QUERY_EPSILON: f64 = 1e-12;

/// Parameters of the cluster hierarchy
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusterConfig {
    /// Cluster radius in screen pixels
    pub radius_px: f64,
    /// Tile extent the radius is relative to
    pub extent_px: f64,
    /// Coarsest precomputed zoom
    pub min_zoom: u8,
    /// Zoom at and above which every point is its own node
    pub max_zoom: u8,
    /// Minimum number of points forming an aggregate
    pub min_points: usize,
    /// KD-tree leaf size
    pub node_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_px: 60.0,
            extent_px: 512.0,
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
            node_size: 64,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_zoom < self.min_zoom {
            return Err(EngineError::config(
                "max_zoom",
                format!("{} is below min_zoom {}", self.max_zoom, self.min_zoom),
            ));
        }
        if self.max_zoom > utils::MAX_TILE_ZOOM {
            return Err(EngineError::config(
                "max_zoom",
                format!("{} exceeds {}", self.max_zoom, utils::MAX_TILE_ZOOM),
            ));
        }
        if !self.radius_px.is_finite() || self.radius_px <= 0.0 {
            return Err(EngineError::config("radius_px", "must be a positive number"));
        }
        if !self.extent_px.is_finite() || self.extent_px <= 0.0 {
            return Err(EngineError::config("extent_px", "must be a positive number"));
        }
        if self.min_points < 2 {
            return Err(EngineError::config("min_points", "must be at least 2"));
        }
        if self.node_size == 0 {
            return Err(EngineError::config("node_size", "must be at least 1"));
        }
        Ok(())
    }

    /// Cluster radius in unit square distance at a zoom level
    #[inline]
    pub fn unit_radius(&self, zoom: u8) -> f64 {
        self.radius_px / (self.extent_px * (zoom as f64).exp2())
    }
}

/// Opaque handle of an aggregate inside its index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterId(u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster-{}", self.0)
    }
}

/// An aggregate as returned by queries
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAggregate {
    pub id: ClusterId,
    /// Count-weighted centroid of the members
    pub position: GeoPoint,
    /// Number of input points under this aggregate
    pub count: u32,
    /// Sum of the member weights
    pub weight: f64,
}

impl ClusterAggregate {
    /// Short label for the count: `"999"`, `"1.2k"`, `"15k"`
    pub fn abbreviated_count(&self) -> String {
        if self.count >= 10_000 {
            format!("{}k", (self.count as f64 / 1000.0).round())
        } else if self.count >= 1000 {
            let tenths = (self.count as f64 / 100.0).round() as u32;
            if tenths % 10 == 0 {
                format!("{}k", tenths / 10)
            } else {
                format!("{}.{}k", tenths / 10, tenths % 10)
            }
        } else {
            self.count.to_string()
        }
    }

    pub fn mean_weight(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.weight / self.count as f64
        }
    }
}

/// A node visible at some zoom: a single input point or an aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterNode {
    Leaf(Arc<InputPoint>),
    Aggregate(ClusterAggregate),
}

impl ClusterNode {
    pub fn position(&self) -> GeoPoint {
        match self {
            Self::Leaf(point) => point.position,
            Self::Aggregate(aggregate) => aggregate.position,
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            Self::Leaf(_) => 1,
            Self::Aggregate(aggregate) => aggregate.count,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Self::Leaf(point) => point.weight,
            Self::Aggregate(aggregate) => aggregate.weight,
        }
    }

    #[inline]
    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Aggregate(_))
    }
}

/// Reference from a level or an aggregate to one of its constituents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRef {
    Point(u32),
    Cluster(ClusterId),
}

#[derive(Debug, Clone)]
struct Aggregate {
    /// Zoom of the level that produced this aggregate
    zoom: u8,
    x: f64,
    y: f64,
    count: u32,
    weight: f64,
    children: SmallVec<[NodeRef; 4]>,
}

#[derive(Debug, Clone, Copy)]
struct LevelNode {
    x: f64,
    y: f64,
    count: u32,
    weight: f64,
    node: NodeRef,
}

#[derive(Debug, Clone)]
struct Level {
    zoom: u8,
    nodes: Vec<LevelNode>,
    tree: KdTree,
}

impl Level {
    fn new(zoom: u8, nodes: Vec<LevelNode>, node_size: usize) -> Self {
        let tree = KdTree::build(nodes.iter().map(|n| [n.x, n.y]), node_size);
        Self { zoom, nodes, tree }
    }
}

/// Immutable cluster hierarchy over a point set
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    config: ClusterConfig,
    points: Vec<Arc<InputPoint>>,
    aggregates: Vec<Aggregate>,
    /// Levels from `min_zoom` (index 0) to `max_zoom`
    levels: Vec<Level>,
}

impl ClusterIndex {
    /// Build the full hierarchy
    ///
    /// Points failing [`InputPoint::validate`] are skipped with a warning; only an invalid
    /// configuration is an error.
    pub fn build<I, P>(config: ClusterConfig, points: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<Arc<InputPoint>>,
    {
        #[cfg(feature = "profiling")]
        profiling::scope!("ClusterIndex::build");

        config.validate()?;

        let mut skipped = 0usize;
        let points: Vec<Arc<InputPoint>> = points
            .into_iter()
            .map(Into::into)
            .filter(|point: &Arc<InputPoint>| match point.validate() {
                Ok(()) => true,
                Err(err) => {
                    skipped += 1;
                    tracing::warn!("Skipping point: {}", err);
                    false
                }
            })
            .collect();

        if u32::try_from(points.len()).is_err() {
            return Err(EngineError::config(
                "points",
                format!("{} points exceed the index capacity", points.len()),
            ));
        }

        let projected: Vec<[f64; 2]> = {
            #[cfg(feature = "profiling")]
            profiling::scope!("project_points");
            points
                .par_iter()
                .map(|point| utils::to_unit(point.position))
                .collect()
        };

        let leaves: Vec<LevelNode> = points
            .iter()
            .zip(&projected)
            .enumerate()
            .map(|(i, (point, &[x, y]))| LevelNode {
                x,
                y,
                count: 1,
                weight: point.weight,
                node: NodeRef::Point(i as u32),
            })
            .collect();

        let mut aggregates = Vec::new();
        let mut levels = Vec::with_capacity((config.max_zoom - config.min_zoom) as usize + 1);
        let mut finer = Level::new(config.max_zoom, leaves, config.node_size);

        for zoom in (config.min_zoom..config.max_zoom).rev() {
            #[cfg(feature = "profiling")]
            profiling::scope!("cluster_level");
            let nodes = cluster_level(&finer, zoom, &config, &mut aggregates);
            let coarser = Level::new(zoom, nodes, config.node_size);
            levels.push(std::mem::replace(&mut finer, coarser));
        }
        levels.push(finer);
        levels.reverse();

        tracing::debug!(
            "Built cluster index: {} points ({} skipped), {} aggregates, zoom {}..={}",
            points.len(),
            skipped,
            aggregates.len(),
            config.min_zoom,
            config.max_zoom
        );

        Ok(Self {
            config,
            points,
            aggregates,
            levels,
        })
    }

    /// Nodes of the level closest to `zoom` whose position lies inside `bbox`
    ///
    /// Zoom is clamped to the precomputed range. Empty or invalid boxes yield no nodes.
    /// Results are in level order.
    pub fn query(&self, bbox: &BoundingBox, zoom: u8) -> Vec<ClusterNode> {
        #[cfg(feature = "profiling")]
        profiling::scope!("ClusterIndex::query");

        if !bbox.has_area() {
            tracing::trace!("Cluster query with empty or invalid bounds {}", bbox);
            return Vec::new();
        }
        let Some(level) = self.level(zoom) else {
            return Vec::new();
        };

        let min = [
            utils::lng_to_unit_x(bbox.west) - QUERY_EPSILON,
            utils::lat_to_unit_y(bbox.north) - QUERY_EPSILON,
        ];
        let max = [
            utils::lng_to_unit_x(bbox.east) + QUERY_EPSILON,
            utils::lat_to_unit_y(bbox.south) + QUERY_EPSILON,
        ];

        let mut ids = level.tree.range(min, max);
        ids.sort_unstable();
        ids.into_iter()
            .map(|i| self.resolve(level.nodes[i].node))
            .filter(|node| bbox.contains(node.position()))
            .collect()
    }

    /// Nodes one level finer that were merged into an aggregate
    pub fn children(&self, id: ClusterId) -> Vec<ClusterNode> {
        self.aggregate(id)
            .map(|aggregate| {
                aggregate
                    .children
                    .iter()
                    .map(|&child| self.resolve(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Input points under an aggregate, skipping `offset` and returning at most `limit`
    pub fn leaves(&self, id: ClusterId, limit: usize, offset: usize) -> Vec<Arc<InputPoint>> {
        let Some(aggregate) = self.aggregate(id) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut skipped = 0;
        // Depth-first, children visited in merge order
        let mut stack: Vec<NodeRef> = aggregate.children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if result.len() >= limit {
                break;
            }
            match node {
                NodeRef::Point(i) => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        result.push(Arc::clone(&self.points[i as usize]));
                    }
                }
                NodeRef::Cluster(child) => {
                    if let Some(child) = self.aggregate(child) {
                        let count = child.count as usize;
                        if skipped + count <= offset {
                            skipped += count;
                        } else {
                            stack.extend(child.children.iter().rev().copied());
                        }
                    }
                }
            }
        }
        result
    }

    /// Zoom at which an aggregate splits into several nodes
    pub fn expansion_zoom(&self, id: ClusterId) -> Option<u8> {
        self.aggregate(id)
            .map(|aggregate| (aggregate.zoom + 1).min(self.config.max_zoom))
    }

    /// Number of indexed input points
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Arc<InputPoint>] {
        &self.points
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Number of nodes at every precomputed zoom, coarsest first
    pub fn levels(&self) -> Vec<(u8, usize)> {
        self.levels
            .iter()
            .map(|level| (level.zoom, level.tree.len()))
            .collect()
    }

    /// Level actually queried for a requested zoom
    #[inline]
    pub fn level_zoom(&self, zoom: u8) -> u8 {
        zoom.clamp(self.config.min_zoom, self.config.max_zoom)
    }

    fn level(&self, zoom: u8) -> Option<&Level> {
        let zoom = self.level_zoom(zoom);
        self.levels.get((zoom - self.config.min_zoom) as usize)
    }

    fn aggregate(&self, id: ClusterId) -> Option<&Aggregate> {
        self.aggregates.get(id.0 as usize)
    }

    fn resolve(&self, node: NodeRef) -> ClusterNode {
        match node {
            NodeRef::Point(i) => ClusterNode::Leaf(Arc::clone(&self.points[i as usize])),
            NodeRef::Cluster(id) => {
                let aggregate = &self.aggregates[id.0 as usize];
                ClusterNode::Aggregate(ClusterAggregate {
                    id,
                    position: utils::from_unit(aggregate.x, aggregate.y),
                    count: aggregate.count,
                    weight: aggregate.weight,
                })
            }
        }
    }
}

/// Greedily merge the nodes of `finer` for the coarser `zoom`
fn cluster_level(
    finer: &Level,
    zoom: u8,
    config: &ClusterConfig,
    aggregates: &mut Vec<Aggregate>,
) -> Vec<LevelNode> {
    let radius = config.unit_radius(zoom);
    let nodes = &finer.nodes;
    let mut visited = vec![false; nodes.len()];
    let mut next = Vec::with_capacity(nodes.len());

    for i in 0..nodes.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let origin = nodes[i];
        let neighbors = finer.tree.within([origin.x, origin.y], radius);
        let count = neighbors
            .iter()
            .filter(|&&j| !visited[j])
            .fold(origin.count, |sum, &j| sum + nodes[j].count);

        if count > origin.count && count as usize >= config.min_points {
            let mut wx = origin.x * origin.count as f64;
            let mut wy = origin.y * origin.count as f64;
            let mut weight = origin.weight;
            let mut children: SmallVec<[NodeRef; 4]> = smallvec![origin.node];

            for j in neighbors {
                if visited[j] {
                    continue;
                }
                visited[j] = true;
                let neighbor = nodes[j];
                wx += neighbor.x * neighbor.count as f64;
                wy += neighbor.y * neighbor.count as f64;
                weight += neighbor.weight;
                children.push(neighbor.node);
            }

            let id = ClusterId(aggregates.len() as u32);
            let (x, y) = (wx / count as f64, wy / count as f64);
            aggregates.push(Aggregate {
                zoom,
                x,
                y,
                count,
                weight,
                children,
            });
            next.push(LevelNode {
                x,
                y,
                count,
                weight,
                node: NodeRef::Cluster(id),
            });
        } else {
            next.push(origin);
            if count > origin.count {
                // Too few points for an aggregate: neighbours pass through as well
                for j in neighbors {
                    if !visited[j] {
                        visited[j] = true;
                        next.push(nodes[j]);
                    }
                }
            }
        }
    }

    next
}
