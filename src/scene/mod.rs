//! Runtime Scene Tree
//!
//! Abstract stand-in for whatever the scene renders into (DOM, 3D scene
//! graph): nodes with parent links, a transform, optional screen bounds and
//! an optional metadata record.
//!
//! # Module Structure
//!
//! - `meta` - `Location`, `SceneMeta`, `chain_parent`
//! - `render` - `RenderPass`, builds nodes and propagates metadata
//! - `hit` - point hit testing, front-to-back
//!
//! Node ids are never reused. Unmounting or remounting a subtree retires
//! its ids, so a stale id simply stops resolving.

pub mod hit;
pub mod meta;
pub mod render;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use smallvec::SmallVec;

pub use hit::{Bounds, Point};
pub use meta::{Location, SceneMeta, chain_parent};
pub use render::RenderPass;

/// Handle to a node in a [`SceneTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type Vec3 = [f64; 3];

/// Local transform of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles, radians.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    /// Compose `self` (a parent's world transform) with a child's local one.
    ///
    /// Axis-aligned composition: rotation accumulates per axis and does not
    /// rotate the child offset.
    pub fn then(&self, local: &Transform) -> Transform {
        let mut out = Transform::default();
        for axis in 0..3 {
            out.position[axis] = self.position[axis] + self.scale[axis] * local.position[axis];
            out.rotation[axis] = self.rotation[axis] + local.rotation[axis];
            out.scale[axis] = self.scale[axis] * local.scale[axis];
        }
        out
    }
}

/// A runtime node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Host element type (`mesh`, `group`, `div`).
    pub name: String,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: SmallVec<[NodeId; 4]>,
    #[serde(default)]
    pub meta: Option<Arc<SceneMeta>>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Props other than the transform (`color`, `intensity`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, Value>,
    /// Marked deleted by the editor: kept in the tree, inert and invisible.
    #[serde(default)]
    pub deleted: bool,
    /// Bumped whenever the attached record actually changes.
    #[serde(skip)]
    pub revision: u64,
}

impl Node {
    fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            parent,
            children: SmallVec::new(),
            meta: None,
            transform: Transform::default(),
            bounds: None,
            props: BTreeMap::new(),
            deleted: false,
            revision: 0,
        }
    }
}

/// Arena of runtime nodes. Slot 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneTree {
    nodes: Vec<Option<Node>>,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    /// Create a tree holding only a root node without metadata.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::new("scene", None))],
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Whether `id` still refers to a mounted node.
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Number of mounted nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a new child under `parent`. Returns `None` if `parent` is gone.
    pub fn insert(&mut self, parent: NodeId, name: impl Into<String>) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let id = NodeId(u32::try_from(self.nodes.len()).ok()?);
        self.nodes.push(Some(Node::new(name, Some(parent))));
        self.get_mut(parent)?.children.push(id);
        Some(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Attach a record to a node.
    ///
    /// Attaching a record equal to the current one is a no-op and returns
    /// `false`, so repeated attachment within one render pass causes no
    /// spurious change.
    pub fn attach(&mut self, id: NodeId, meta: Arc<SceneMeta>) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        if node.meta.as_deref() == Some(&*meta) {
            return false;
        }
        node.meta = Some(meta);
        node.revision += 1;
        true
    }

    /// Read the record attached to a node.
    #[inline]
    pub fn read(&self, id: NodeId) -> Option<&Arc<SceneMeta>> {
        self.get(id)?.meta.as_ref()
    }

    pub fn revision(&self, id: NodeId) -> Option<u64> {
        self.get(id).map(|n| n.revision)
    }

    // =========================================================================
    // Delete / restore / unmount
    // =========================================================================

    /// Mark a node deleted (or restore it). Metadata stays attached.
    ///
    /// Returns `true` when the flag changed.
    pub fn set_deleted(&mut self, id: NodeId, deleted: bool) -> bool {
        match self.get_mut(id) {
            Some(node) if node.deleted != deleted => {
                node.deleted = deleted;
                true
            }
            _ => false,
        }
    }

    /// True when the node or any ancestor is marked deleted.
    pub fn is_inert(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.get(current) {
                Some(node) if node.deleted => return true,
                Some(node) => cursor = node.parent,
                None => return true,
            }
        }
        false
    }

    /// Unmount a subtree. Its ids become unreachable.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root() || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.parent(id)
            && let Some(parent) = self.get_mut(parent)
        {
            parent.children.retain(|child| *child != id);
        }
        for node in self.preorder(id) {
            self.nodes[node.index()] = None;
        }
        true
    }

    /// Replace a subtree with an identical copy under fresh ids, as a hot
    /// reload does. Returns the id of the new subtree root.
    pub fn remount(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.children(parent).iter().position(|c| *c == id)?;

        let new_root = self.clone_subtree(id, parent)?;
        // clone_subtree appended the copy; move it into the old slot
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.pop();
            parent_node.children.insert(position + 1, new_root);
        }
        self.remove(id);
        Some(new_root)
    }

    fn clone_subtree(&mut self, source: NodeId, parent: NodeId) -> Option<NodeId> {
        let template = self.get(source)?.clone();
        let copy = self.insert(parent, template.name.clone())?;
        if let Some(node) = self.get_mut(copy) {
            node.meta = template.meta;
            node.transform = template.transform;
            node.bounds = template.bounds;
            node.props = template.props;
            node.deleted = template.deleted;
        }
        for child in template.children {
            self.clone_subtree(child, copy)?;
        }
        Some(copy)
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Pre-order listing of `start` and its descendants.
    pub fn preorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    pub fn transform(&self, id: NodeId) -> Option<&Transform> {
        self.get(id).map(|n| &n.transform)
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.get_mut(id).map(|n| &mut n.transform)
    }

    /// Transform of `id` composed through all of its ancestors.
    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.get(current)?;
            chain.push(node.transform);
            cursor = node.parent;
        }
        Some(
            chain
                .iter()
                .rev()
                .fold(Transform::default(), |world, local| world.then(local)),
        )
    }

    pub fn set_bounds(&mut self, id: NodeId, bounds: Bounds) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.bounds = Some(bounds);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Props
    // =========================================================================

    /// Read a prop as JSON. `position`, `rotation` and `scale` come from the
    /// transform, `visible` from the deleted flag.
    pub fn prop(&self, id: NodeId, name: &str) -> Option<Value> {
        let node = self.get(id)?;
        match name {
            "position" => Some(json!(node.transform.position)),
            "rotation" => Some(json!(node.transform.rotation)),
            "scale" => Some(json!(node.transform.scale)),
            "visible" => Some(json!(!node.deleted)),
            _ => node.props.get(name).cloned(),
        }
    }

    /// Write a prop. Transform props must be `[x, y, z]` arrays.
    ///
    /// Returns `false` when the node is gone or the value has the wrong shape.
    pub fn set_prop(&mut self, id: NodeId, name: &str, value: Value) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        let slot = match name {
            "position" => &mut node.transform.position,
            "rotation" => &mut node.transform.rotation,
            "scale" => &mut node.transform.scale,
            "visible" => {
                let Some(visible) = value.as_bool() else {
                    return false;
                };
                node.deleted = !visible;
                return true;
            }
            _ => {
                node.props.insert(name.to_owned(), value);
                return true;
            }
        };
        match serde_json::from_value::<Vec3>(value) {
            Ok(v) => {
                *slot = v;
                true
            }
            Err(_) => false,
        }
    }

    // =========================================================================
    // Dump
    // =========================================================================

    /// Parse a scene dump produced by [`SceneTree::to_json`].
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let tree: Self = serde_json::from_str(json)?;
        if tree.nodes.first().is_none_or(Option::is_none) {
            return Err(serde::de::Error::custom("scene dump has no root node"));
        }
        Ok(tree)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_chain() -> (SceneTree, NodeId, NodeId) {
        let mut tree = SceneTree::new();
        let group = tree.insert(tree.root(), "group").unwrap();
        let mesh = tree.insert(group, "mesh").unwrap();
        (tree, group, mesh)
    }

    #[test]
    fn test_insert_links_parent_and_children() {
        let (tree, group, mesh) = tree_with_chain();
        assert_eq!(tree.parent(mesh), Some(group));
        assert_eq!(tree.children(group), &[mesh]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let (mut tree, _, mesh) = tree_with_chain();
        let meta = Arc::new(SceneMeta::new("/scene.tsx", 10, 4, "mesh"));

        assert!(tree.attach(mesh, meta.clone()));
        assert_eq!(tree.revision(mesh), Some(1));

        // Same content, fresh allocation: no change
        assert!(!tree.attach(mesh, Arc::new(SceneMeta::new("/scene.tsx", 10, 4, "mesh"))));
        assert_eq!(tree.revision(mesh), Some(1));
        assert!(Arc::ptr_eq(tree.read(mesh).unwrap(), &meta));

        assert!(tree.attach(mesh, Arc::new(SceneMeta::new("/scene.tsx", 11, 4, "mesh"))));
        assert_eq!(tree.revision(mesh), Some(2));
    }

    #[test]
    fn test_delete_keeps_metadata() {
        let (mut tree, group, mesh) = tree_with_chain();
        tree.attach(mesh, Arc::new(SceneMeta::new("/scene.tsx", 10, 4, "mesh")));

        assert!(tree.set_deleted(group, true));
        assert!(!tree.set_deleted(group, true));
        assert!(tree.is_inert(mesh));
        assert!(tree.read(mesh).is_some());

        assert!(tree.set_deleted(group, false));
        assert!(!tree.is_inert(mesh));
    }

    #[test]
    fn test_remove_retires_ids() {
        let (mut tree, group, mesh) = tree_with_chain();
        assert!(tree.remove(group));
        assert!(!tree.contains(group));
        assert!(!tree.contains(mesh));
        assert!(tree.children(tree.root()).is_empty());
        assert!(!tree.remove(tree.root()));
    }

    #[test]
    fn test_remount_keeps_position_and_metadata() {
        let mut tree = SceneTree::new();
        let first = tree.insert(tree.root(), "mesh").unwrap();
        let second = tree.insert(tree.root(), "group").unwrap();
        let inner = tree.insert(second, "mesh").unwrap();
        let third = tree.insert(tree.root(), "light").unwrap();
        let meta = Arc::new(SceneMeta::new("/scene.tsx", 12, 6, "mesh"));
        tree.attach(inner, meta.clone());

        let fresh = tree.remount(second).unwrap();

        assert_ne!(fresh, second);
        assert!(!tree.contains(second));
        assert!(!tree.contains(inner));
        assert_eq!(tree.children(tree.root()), &[first, fresh, third]);
        let new_inner = tree.children(fresh)[0];
        assert_eq!(tree.read(new_inner).map(|m| m.as_ref()), Some(meta.as_ref()));
    }

    #[test]
    fn test_preorder() {
        let mut tree = SceneTree::new();
        let a = tree.insert(tree.root(), "a").unwrap();
        let a1 = tree.insert(a, "a1").unwrap();
        let b = tree.insert(tree.root(), "b").unwrap();
        assert_eq!(tree.preorder(tree.root()), vec![tree.root(), a, a1, b]);
    }

    #[test]
    fn test_world_transform() {
        let (mut tree, group, mesh) = tree_with_chain();
        *tree.transform_mut(group).unwrap() = Transform {
            position: [1.0, 0.0, 0.0],
            rotation: [0.0, 0.5, 0.0],
            scale: [2.0, 2.0, 2.0],
        };
        tree.transform_mut(mesh).unwrap().position = [1.0, 1.0, 0.0];

        let world = tree.world_transform(mesh).unwrap();
        assert_eq!(world.position, [3.0, 2.0, 0.0]);
        assert_eq!(world.rotation, [0.0, 0.5, 0.0]);
        assert_eq!(world.scale, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_json_dump_round_trip_keeps_structure() {
        let (mut tree, _, mesh) = tree_with_chain();
        tree.attach(mesh, Arc::new(SceneMeta::new("/scene.tsx", 10, 4, "mesh")));

        let parsed = SceneTree::from_json(&tree.to_json().unwrap()).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.read(mesh).unwrap().location, Location::new("/scene.tsx", 10, 4));
    }

    #[test]
    fn test_props() {
        let (mut tree, _, mesh) = tree_with_chain();
        assert!(tree.set_prop(mesh, "position", json!([1.0, 2.0, 3.0])));
        assert!(!tree.set_prop(mesh, "scale", json!("big")));
        assert!(tree.set_prop(mesh, "color", json!("red")));
        assert!(tree.set_prop(mesh, "visible", json!(false)));

        assert_eq!(tree.prop(mesh, "position"), Some(json!([1.0, 2.0, 3.0])));
        assert_eq!(tree.prop(mesh, "scale"), Some(json!([1.0, 1.0, 1.0])));
        assert_eq!(tree.prop(mesh, "color"), Some(json!("red")));
        assert_eq!(tree.prop(mesh, "visible"), Some(json!(false)));
        assert!(tree.is_inert(mesh));
        assert_eq!(tree.prop(mesh, "intensity"), None);
    }

    #[test]
    fn test_json_dump_requires_root() {
        assert!(SceneTree::from_json(r#"{"nodes":[]}"#).is_err());
    }
}
