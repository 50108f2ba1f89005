//! Metadata propagation during a render pass.
//!
//! Custom components never become runtime nodes. Entering one pushes its
//! record onto the pending chain of the current frame; the next primitive
//! element created below consumes that chain as its `parents` (nearest
//! first) and starts a fresh, empty chain for its own children.
//!
//! ```text
//! component(Foo)        pending = [Foo]
//!   component(Bar)      pending = [Foo, Bar]
//!     element(mesh)     mesh.parents = [Bar, Foo]; children start with []
//! ```
//!
//! The chain is computed as each node is constructed, so resolution only
//! ever walks the metadata records, never the render tree.

use std::sync::Arc;

use super::{NodeId, SceneMeta, SceneTree, chain_parent};

struct Frame {
    node: NodeId,
    /// Custom components entered since `node`, outermost first.
    pending: Vec<Arc<SceneMeta>>,
}

/// Builds runtime nodes under a mount point, attaching chained metadata.
pub struct RenderPass<'a> {
    tree: &'a mut SceneTree,
    frames: Vec<Frame>,
}

impl<'a> RenderPass<'a> {
    pub fn new(tree: &'a mut SceneTree, mount: NodeId) -> Self {
        Self {
            tree,
            frames: vec![Frame {
                node: mount,
                pending: Vec::new(),
            }],
        }
    }

    fn frame(&mut self) -> &mut Frame {
        // `frames` always keeps the mount frame at the bottom
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Current runtime parent.
    pub fn current(&self) -> NodeId {
        self.frames.last().map_or(self.tree.root(), |f| f.node)
    }

    /// Render a custom component boundary around `body`.
    pub fn component(&mut self, meta: SceneMeta, body: impl FnOnce(&mut Self)) {
        self.frame().pending.push(Arc::new(meta));
        body(self);
        self.frame().pending.pop();
    }

    /// Record for `meta` with the pending custom chain attached.
    fn chained(&mut self, meta: SceneMeta) -> SceneMeta {
        self.frame()
            .pending
            .iter()
            .rev()
            .fold(meta, |record, enclosing| chain_parent(&record, Arc::clone(enclosing)))
    }

    /// Render a primitive element carrying `meta`, with `body` as children.
    pub fn element(&mut self, name: &str, meta: SceneMeta, body: impl FnOnce(&mut Self)) -> NodeId {
        let record = Arc::new(self.chained(meta));
        let parent = self.current();
        let Some(id) = self.tree.insert(parent, name) else {
            return parent;
        };
        self.tree.attach(id, record);

        self.frames.push(Frame {
            node: id,
            pending: Vec::new(),
        });
        body(self);
        self.frames.pop();
        id
    }

    /// Leaf shorthand for [`RenderPass::element`].
    pub fn leaf(&mut self, name: &str, meta: SceneMeta) -> NodeId {
        self.element(name, meta, |_| {})
    }

    /// Render an element the injection step did not tag (library internals).
    ///
    /// It carries no record, so the pending chain passes through to the
    /// next tagged descendant.
    pub fn untagged(&mut self, name: &str, body: impl FnOnce(&mut Self)) -> NodeId {
        let parent = self.current();
        let pending = self.frame().pending.clone();
        let Some(id) = self.tree.insert(parent, name) else {
            return parent;
        };

        self.frames.push(Frame { node: id, pending });
        body(self);
        self.frames.pop();
        id
    }

    /// Re-render an existing node in the current context.
    ///
    /// Returns `true` only when the record actually changed.
    pub fn rerender(&mut self, id: NodeId, meta: SceneMeta) -> bool {
        let record = Arc::new(self.chained(meta));
        self.tree.attach(id, record)
    }
}
