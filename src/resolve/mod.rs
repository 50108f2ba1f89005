//! Element Resolver
//!
//! Maps a runtime node plus a filter back to the authored source location.
//! Two walks are kept apart:
//!
//! - `match_in_chain` walks one node's metadata (own record, then `parents`)
//! - `next_meta_ancestor` walks the runtime tree up to the next node that
//!   carries a record
//!
//! `resolve_element_meta` joins them: check the node's chain, then hop to the
//! next tagged ancestor and check its chain, and so on.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::scene::{Location, NodeId, SceneMeta, SceneTree};

/// Which source locations a resolution is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Exactly this call site.
    Exact(Location),
    /// Any call site in the set (e.g. every element of the open file).
    AnyOf(FxHashSet<Location>),
    /// Any record pointing at real source.
    Any,
}

impl Filter {
    pub fn exact(path: impl Into<String>, line: i32, column: i32) -> Self {
        Self::Exact(Location::new(path, line, column))
    }

    pub fn any_of(locations: impl IntoIterator<Item = Location>) -> Self {
        Self::AnyOf(locations.into_iter().collect())
    }

    pub fn matches(&self, meta: &SceneMeta) -> bool {
        match self {
            Self::Exact(location) => &meta.location == location,
            Self::AnyOf(set) => set.contains(&meta.location),
            Self::Any => meta.is_source(),
        }
    }
}

/// Check a record, then its `parents` front-to-back. First match wins.
pub fn match_in_chain<'m>(meta: &'m Arc<SceneMeta>, filter: &Filter) -> Option<&'m Arc<SceneMeta>> {
    if filter.matches(meta) {
        return Some(meta);
    }
    meta.parents.iter().find(|parent| filter.matches(parent))
}

/// Nearest strict ancestor of `node` in the runtime tree that carries a record.
pub fn next_meta_ancestor(tree: &SceneTree, node: NodeId) -> Option<NodeId> {
    let mut cursor = tree.parent(node);
    while let Some(id) = cursor {
        if tree.read(id).is_some() {
            return Some(id);
        }
        cursor = tree.parent(id);
    }
    None
}

/// Resolve the source record for `node` under `filter`.
///
/// - A node without a record resolves to `None`.
/// - The node's own chain is searched first (own record, then parents).
/// - Otherwise each tagged ancestor's chain is searched in turn. When an
///   ancestor at a real source position has no match in its chain, its own
///   record is returned as the closest available approximation; sentinel
///   ancestors (negative coordinates) are climbed past.
/// - `None` once the tree is exhausted.
pub fn resolve_element_meta(tree: &SceneTree, node: NodeId, filter: &Filter) -> Option<Arc<SceneMeta>> {
    let meta = tree.read(node)?;
    if let Some(found) = match_in_chain(meta, filter) {
        return Some(Arc::clone(found));
    }

    let mut cursor = next_meta_ancestor(tree, node);
    while let Some(ancestor) = cursor {
        let meta = tree.read(ancestor)?;
        if let Some(found) = match_in_chain(meta, filter) {
            return Some(Arc::clone(found));
        }
        if meta.is_source() {
            return Some(Arc::clone(meta));
        }
        cursor = next_meta_ancestor(tree, ancestor);
    }
    None
}

/// First node in pre-order under `root` whose own chain matches `filter`.
///
/// Deleted nodes are still found: the editor must be able to restore them.
pub fn find_node(tree: &SceneTree, root: NodeId, filter: &Filter) -> Option<NodeId> {
    tree.preorder(root)
        .into_iter()
        .find(|id| own_chain_matches(tree, *id, filter))
}

/// Every node under `root` whose own chain matches `filter`, in pre-order.
///
/// One call site rendered several times (a list) yields several nodes.
pub fn find_nodes(tree: &SceneTree, root: NodeId, filter: &Filter, include_deleted: bool) -> Vec<NodeId> {
    tree.preorder(root)
        .into_iter()
        .filter(|id| include_deleted || !tree.is_inert(*id))
        .filter(|id| own_chain_matches(tree, *id, filter))
        .collect()
}

fn own_chain_matches(tree: &SceneTree, id: NodeId, filter: &Filter) -> bool {
    tree.read(id)
        .is_some_and(|meta| match_in_chain(meta, filter).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::RenderPass;

    /// `<Foo>` at /scene.tsx:20:2 wrapping `<mesh>` at /scene.tsx:10:4.
    fn wrapped_mesh() -> (SceneTree, NodeId) {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut mesh = None;
        let mut pass = RenderPass::new(&mut tree, root);
        pass.component(SceneMeta::new("/scene.tsx", 20, 2, "Foo"), |pass| {
            mesh = Some(pass.leaf("mesh", SceneMeta::new("/scene.tsx", 10, 4, "mesh")));
        });
        (tree, mesh.unwrap())
    }

    #[test]
    fn test_untagged_node_fails() {
        let mut tree = SceneTree::new();
        let node = tree.insert(tree.root(), "mesh").unwrap();
        assert!(resolve_element_meta(&tree, node, &Filter::Any).is_none());
    }

    #[test]
    fn test_direct_match_short_circuits() {
        let (tree, mesh) = wrapped_mesh();
        let found = resolve_element_meta(&tree, mesh, &Filter::exact("/scene.tsx", 10, 4)).unwrap();
        assert_eq!(found.name, "mesh");
    }

    #[test]
    fn test_custom_boundary_wins_over_own_record() {
        let (tree, mesh) = wrapped_mesh();
        let found = resolve_element_meta(&tree, mesh, &Filter::exact("/scene.tsx", 20, 2)).unwrap();

        assert_eq!(found.location, Location::new("/scene.tsx", 20, 2));
        assert_eq!(found.name, "Foo");
    }

    #[test]
    fn test_candidate_set_prefers_innermost() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut mesh = None;
        let mut pass = RenderPass::new(&mut tree, root);
        pass.component(SceneMeta::new("/scene.tsx", 30, 2, "Outer"), |pass| {
            pass.component(SceneMeta::new("/scene.tsx", 20, 2, "Inner"), |pass| {
                mesh = Some(pass.leaf("mesh", SceneMeta::new("/lib.tsx", 3, 4, "mesh")));
            });
        });

        let filter = Filter::any_of([
            Location::new("/scene.tsx", 30, 2),
            Location::new("/scene.tsx", 20, 2),
        ]);
        let found = resolve_element_meta(&tree, mesh.unwrap(), &filter).unwrap();
        assert_eq!(found.name, "Inner");
    }

    #[test]
    fn test_climbs_runtime_tree_to_tagged_ancestor() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut mesh = None;
        let mut pass = RenderPass::new(&mut tree, root);
        pass.component(SceneMeta::new("/scene.tsx", 20, 2, "Foo"), |pass| {
            pass.element("group", SceneMeta::new("/foo.tsx", 5, 2, "group"), |pass| {
                pass.untagged("primitive", |pass| {
                    mesh = Some(pass.leaf("mesh", SceneMeta::new("/foo.tsx", 6, 4, "mesh")));
                });
            });
        });

        let found = resolve_element_meta(&tree, mesh.unwrap(), &Filter::exact("/scene.tsx", 20, 2)).unwrap();
        assert_eq!(found.name, "Foo");
    }

    #[test]
    fn test_falls_back_to_tagged_source_ancestor() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut mesh = None;
        let mut pass = RenderPass::new(&mut tree, root);
        pass.element("group", SceneMeta::new("/scene.tsx", 5, 2, "group"), |pass| {
            mesh = Some(pass.leaf("mesh", SceneMeta::new("/scene.tsx", 6, 4, "mesh")));
        });

        let found = resolve_element_meta(&tree, mesh.unwrap(), &Filter::exact("/other.tsx", 1, 1)).unwrap();
        assert_eq!(found.location, Location::new("/scene.tsx", 5, 2));
    }

    #[test]
    fn test_sentinel_ancestors_are_climbed_past() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        tree.attach(root, Arc::new(SceneMeta::sentinel("/scene.tsx", "scene")));
        let mut mesh = None;
        let mut pass = RenderPass::new(&mut tree, root);
        pass.element("portal", SceneMeta::sentinel("/scene.tsx", "portal"), |pass| {
            mesh = Some(pass.leaf("mesh", SceneMeta::new("/scene.tsx", 6, 4, "mesh")));
        });

        assert!(resolve_element_meta(&tree, mesh.unwrap(), &Filter::exact("/other.tsx", 1, 1)).is_none());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let (tree, mesh) = wrapped_mesh();
        let filter = Filter::exact("/scene.tsx", 20, 2);
        let first = resolve_element_meta(&tree, mesh, &filter);
        let second = resolve_element_meta(&tree, mesh, &filter);
        assert_eq!(first, second);
    }

    #[test]
    fn test_find_node_and_list_semantics() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut pass = RenderPass::new(&mut tree, root);
        let mut items = Vec::new();
        pass.component(SceneMeta::new("/scene.tsx", 20, 2, "Foo"), |pass| {
            for _ in 0..3 {
                items.push(pass.leaf("mesh", SceneMeta::new("/scene.tsx", 10, 4, "mesh")));
            }
        });

        let filter = Filter::exact("/scene.tsx", 20, 2);
        assert_eq!(find_node(&tree, root, &filter), Some(items[0]));
        assert_eq!(find_nodes(&tree, root, &filter, false), items);

        tree.set_deleted(items[1], true);
        assert_eq!(find_nodes(&tree, root, &filter, false), vec![items[0], items[2]]);
        assert_eq!(find_nodes(&tree, root, &filter, true), items);
        assert!(find_node(&tree, root, &Filter::exact("/scene.tsx", 99, 1)).is_none());
    }

    #[test]
    fn test_next_meta_ancestor_skips_untagged() {
        let mut tree = SceneTree::new();
        let tagged = tree.insert(tree.root(), "group").unwrap();
        tree.attach(tagged, Arc::new(SceneMeta::new("/scene.tsx", 1, 1, "group")));
        let plain = tree.insert(tagged, "object").unwrap();
        let leaf = tree.insert(plain, "mesh").unwrap();

        assert_eq!(next_meta_ancestor(&tree, leaf), Some(tagged));
        assert_eq!(next_meta_ancestor(&tree, tagged), None);
    }
}
