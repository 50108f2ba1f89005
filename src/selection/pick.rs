//! Pickers: turn a screen point into resolved candidates.

use crate::resolve::{Filter, resolve_element_meta};
use crate::scene::{Point, SceneTree};

use super::store::Resolved;

/// Source of selection candidates under a point, front-to-back.
pub trait Picker: Send {
    fn pick(&self, tree: &SceneTree, point: Point) -> Vec<Resolved>;
}

/// Hit-tests the scene tree and resolves every hit through its metadata.
///
/// Hits resolving to the same call site collapse into the front-most one.
#[derive(Debug, Clone)]
pub struct ScenePicker {
    filter: Filter,
}

impl Default for ScenePicker {
    fn default() -> Self {
        Self { filter: Filter::Any }
    }
}

impl ScenePicker {
    /// Restrict candidates to `filter` (e.g. the call sites of the open file).
    pub fn new(filter: Filter) -> Self {
        Self { filter }
    }
}

impl Picker for ScenePicker {
    fn pick(&self, tree: &SceneTree, point: Point) -> Vec<Resolved> {
        let mut out: Vec<Resolved> = Vec::new();
        for node in tree.hit_test(point) {
            let Some(meta) = resolve_element_meta(tree, node, &self.filter) else {
                continue;
            };
            let candidate = Resolved::new(node, meta);
            if !out.iter().any(|c| c.same_target(&candidate)) {
                out.push(candidate);
            }
        }
        out
    }
}

/// Run pickers in registration order, merging their candidates.
pub(super) fn pick_all(pickers: &[Box<dyn Picker>], tree: &SceneTree, point: Point) -> Vec<Resolved> {
    let mut out: Vec<Resolved> = Vec::new();
    for picker in pickers {
        for candidate in picker.pick(tree, point) {
            if !out.iter().any(|c| c.same_target(&candidate)) {
                out.push(candidate);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Bounds, Location, RenderPass, SceneMeta};

    #[test]
    fn test_hits_resolve_front_to_back() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut pass = RenderPass::new(&mut tree, root);
        let back = pass.leaf("mesh", SceneMeta::new("/scene.tsx", 3, 4, "mesh"));
        let front = pass.leaf("mesh", SceneMeta::new("/scene.tsx", 4, 4, "mesh"));
        tree.set_bounds(back, Bounds::new(0.0, 0.0, 10.0, 10.0, 5.0));
        tree.set_bounds(front, Bounds::new(0.0, 0.0, 10.0, 10.0, 1.0));

        let picked = ScenePicker::default().pick(&tree, Point::new(5.0, 5.0));
        let lines: Vec<_> = picked.iter().map(|c| c.state.line).collect();
        assert_eq!(lines, vec![4, 3]);
        assert_eq!(picked[0].node, front);
    }

    #[test]
    fn test_same_call_site_collapses() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut pass = RenderPass::new(&mut tree, root);
        let mut meshes = Vec::new();
        pass.component(SceneMeta::new("/scene.tsx", 20, 2, "Foo"), |pass| {
            meshes.push(pass.leaf("mesh", SceneMeta::new("/scene.tsx", 10, 4, "mesh")));
            meshes.push(pass.leaf("mesh", SceneMeta::new("/scene.tsx", 11, 4, "mesh")));
        });
        for (depth, mesh) in meshes.iter().enumerate() {
            tree.set_bounds(*mesh, Bounds::new(0.0, 0.0, 1.0, 1.0, depth as f64));
        }

        let foo = ScenePicker::new(Filter::Exact(Location::new("/scene.tsx", 20, 2)));
        let picked = foo.pick(&tree, Point::new(0.5, 0.5));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].node, meshes[0]);
        assert_eq!(picked[0].meta.name, "Foo");
    }

    #[test]
    fn test_miss_yields_nothing() {
        let tree = SceneTree::new();
        assert!(ScenePicker::default().pick(&tree, Point::new(1.0, 1.0)).is_empty());
    }
}
