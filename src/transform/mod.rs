//! Transform Commit Pipeline
//!
//! A gesture mutates live transforms every frame without sending anything.
//! Completing it reads the final values, rounds them, and yields one persist
//! request per target.
//!
//! ```text
//! begin(targets, kind) ──▶ update(offset)* ──▶ commit(space) ──▶ [RequestPersistElementProp]
//!                                         └──▶ cancel()      ──▶ live values restored
//! ```

pub mod history;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::debug;
use crate::protocol::{PropAction, RequestPersistElementProp};
use crate::scene::{Location, NodeId, SceneTree, Transform, Vec3};

pub use history::{History, HistoryEntry};

/// Which transform component a gesture edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Translate,
    Rotate,
    Scale,
}

impl TransformKind {
    /// Prop persisted for this kind.
    pub fn prop_name(self) -> &'static str {
        match self {
            Self::Translate => "position",
            Self::Rotate => "rotation",
            Self::Scale => "scale",
        }
    }

    pub fn action(self) -> PropAction {
        match self {
            Self::Translate => PropAction::Translate,
            Self::Rotate => PropAction::Rotate,
            Self::Scale => PropAction::Scale,
        }
    }

    fn read(self, transform: &Transform) -> Vec3 {
        match self {
            Self::Translate => transform.position,
            Self::Rotate => transform.rotation,
            Self::Scale => transform.scale,
        }
    }

    fn write(self, transform: &mut Transform, value: Vec3) {
        match self {
            Self::Translate => transform.position = value,
            Self::Rotate => transform.rotation = value,
            Self::Scale => transform.scale = value,
        }
    }

    /// Apply a gesture offset to a starting value.
    fn offset(self, start: Vec3, offset: Vec3) -> Vec3 {
        let mut out = start;
        for axis in 0..3 {
            out[axis] = match self {
                Self::Scale => start[axis] * offset[axis],
                Self::Translate | Self::Rotate => start[axis] + offset[axis],
            };
        }
        out
    }
}

/// Coordinate space of persisted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    /// Composed through every ancestor.
    World,
    /// Relative to the parent node.
    #[default]
    Local,
}

struct Target {
    node: NodeId,
    location: Location,
    start: Vec3,
    start_world: Vec3,
}

struct Gesture {
    kind: TransformKind,
    targets: Vec<Target>,
}

/// Buffers one transform gesture at a time.
pub struct TransformPipeline {
    precision: u32,
    active: Option<Gesture>,
}

impl TransformPipeline {
    /// Pipeline rounding persisted values to `precision` decimals.
    pub fn new(precision: u32) -> Self {
        Self {
            precision,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn kind(&self) -> Option<TransformKind> {
        self.active.as_ref().map(|g| g.kind)
    }

    /// Start a gesture on `targets` (node plus the call site to persist to).
    ///
    /// Captures each target's current value. Nodes that are gone are
    /// skipped. A gesture already in progress is discarded without restoring.
    pub fn begin(
        &mut self,
        tree: &SceneTree,
        targets: impl IntoIterator<Item = (NodeId, Location)>,
        kind: TransformKind,
    ) -> usize {
        let targets: Vec<Target> = targets
            .into_iter()
            .filter_map(|(node, location)| {
                let local = tree.transform(node)?;
                let world = tree.world_transform(node)?;
                Some(Target {
                    node,
                    location,
                    start: kind.read(local),
                    start_world: kind.read(&world),
                })
            })
            .collect();
        let count = targets.len();
        self.active = Some(Gesture { kind, targets });
        count
    }

    /// Move every target to `offset` from its start: added for translate
    /// and rotate, multiplied per axis for scale. Sends nothing.
    pub fn update(&mut self, tree: &mut SceneTree, offset: Vec3) {
        let Some(gesture) = &self.active else {
            return;
        };
        for target in &gesture.targets {
            if let Some(transform) = tree.transform_mut(target.node) {
                gesture
                    .kind
                    .write(transform, gesture.kind.offset(target.start, offset));
            }
        }
    }

    /// Finish the gesture and produce one persist request per live target.
    pub fn commit(&mut self, tree: &SceneTree, space: Space) -> Vec<RequestPersistElementProp> {
        let Some(gesture) = self.active.take() else {
            return Vec::new();
        };

        let requests: Vec<_> = gesture
            .targets
            .iter()
            .filter_map(|target| {
                let (value, prev) = match space {
                    Space::Local => (gesture.kind.read(tree.transform(target.node)?), target.start),
                    Space::World => (
                        gesture.kind.read(&tree.world_transform(target.node)?),
                        target.start_world,
                    ),
                };
                Some(RequestPersistElementProp {
                    location: target.location.clone(),
                    prop_name: gesture.kind.prop_name().to_owned(),
                    prop_value: json!(self.round(value)),
                    prev_prop_value: Some(json!(self.round(prev))),
                    action: gesture.kind.action(),
                })
            })
            .collect();

        debug!(
            "transform";
            "{} committed for {} target(s)",
            gesture.kind.action().label(),
            requests.len()
        );
        requests
    }

    /// Abort the gesture, putting every live target back.
    pub fn cancel(&mut self, tree: &mut SceneTree) {
        let Some(gesture) = self.active.take() else {
            return;
        };
        for target in &gesture.targets {
            if let Some(transform) = tree.transform_mut(target.node) {
                gesture.kind.write(transform, target.start);
            }
        }
    }

    fn round(&self, value: Vec3) -> Vec3 {
        value.map(|v| round_to(v, self.precision))
    }
}

/// Round to `precision` decimals. Never yields negative zero.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}
