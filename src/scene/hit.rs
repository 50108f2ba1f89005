//! Point hit testing.
//!
//! Candidates come back front-to-back (smallest depth first), which is the
//! order click cycling walks through.

use serde::{Deserialize, Serialize};

use super::{NodeId, SceneTree};

/// Screen-space point, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Screen-space footprint of a node plus its distance from the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Smaller is closer to the viewer.
    #[serde(default)]
    pub depth: f64,
}

impl Bounds {
    pub const fn new(x: f64, y: f64, width: f64, height: f64, depth: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            depth,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

impl SceneTree {
    /// Nodes whose bounds contain `point`, closest first.
    ///
    /// Deleted nodes (and anything under them) are inert and never hit.
    /// Equal depths keep tree order.
    pub fn hit_test(&self, point: Point) -> Vec<NodeId> {
        let mut hits: Vec<(f64, NodeId)> = self
            .preorder(self.root())
            .into_iter()
            .filter_map(|id| {
                let bounds = self.get(id)?.bounds?;
                (bounds.contains(point) && !self.is_inert(id)).then_some((bounds.depth, id))
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter().map(|(_, id)| id).collect()
    }
}
