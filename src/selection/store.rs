//! Selection and hover state.
//!
//! Identities (`SelectionState`) outlive node ids: a remount invalidates the
//! node but the authored location still names the same thing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::scene::{Location, NodeId, SceneMeta};

/// Addressable identity of a selection target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub path: String,
    pub line: i32,
    pub column: i32,
    /// File of the nearest enclosing custom component, if any.
    pub parent_path: Option<String>,
}

impl SelectionState {
    pub fn from_meta(meta: &SceneMeta) -> Self {
        Self {
            path: meta.location.path.clone(),
            line: meta.location.line,
            column: meta.location.column,
            parent_path: meta.parents.first().map(|p| p.location.path.clone()),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.path.clone(), self.line, self.column)
    }
}

/// An identity plus the live node and record it resolved to.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub state: Arc<SelectionState>,
    pub node: NodeId,
    pub meta: Arc<SceneMeta>,
}

impl Resolved {
    pub fn new(node: NodeId, meta: Arc<SceneMeta>) -> Self {
        Self {
            state: Arc::new(SelectionState::from_meta(&meta)),
            node,
            meta,
        }
    }

    #[inline]
    pub fn same_target(&self, other: &Resolved) -> bool {
        self.state == other.state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Drop the current selection first.
    #[default]
    Replace,
    /// Append, keeping selection order.
    Addition,
}

/// Ordered selection list plus a single hover slot.
#[derive(Debug, Default)]
pub struct SelectionStore {
    selections: Vec<Resolved>,
    hovered: Option<Resolved>,
    resolve_count: u64,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selections(&self) -> &[Resolved] {
        &self.selections
    }

    /// Identities in selection order.
    pub fn identities(&self) -> Vec<Arc<SelectionState>> {
        self.selections.iter().map(|s| Arc::clone(&s.state)).collect()
    }

    pub fn last(&self) -> Option<&Resolved> {
        self.selections.last()
    }

    pub fn hovered(&self) -> Option<&Resolved> {
        self.hovered.as_ref()
    }

    pub fn is_selected(&self, state: &SelectionState) -> bool {
        self.selections.iter().any(|s| *s.state == *state)
    }

    /// Number of forced re-resolve passes so far.
    pub fn resolve_count(&self) -> u64 {
        self.resolve_count
    }

    /// Select `items`. Returns `true` when the identity list changed.
    ///
    /// An identity is never listed twice; adding one that is already
    /// selected leaves it where it is.
    pub fn select(&mut self, items: Vec<Resolved>, mode: SelectMode) -> bool {
        let before = self.identities();
        if mode == SelectMode::Replace {
            self.selections.clear();
        }
        for item in items {
            if !self.selections.iter().any(|s| s.same_target(&item)) {
                self.selections.push(item);
            }
        }
        before != self.identities()
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.selections.is_empty();
        self.selections.clear();
        changed
    }

    /// Replace the hover slot. Returns `true` only when the identity
    /// changed; an equal hover keeps the stored `Arc` untouched.
    pub fn set_hovered(&mut self, hovered: Option<Resolved>) -> bool {
        let same = match (&self.hovered, &hovered) {
            (Some(current), Some(next)) => current.same_target(next),
            (None, None) => true,
            _ => false,
        };
        if same {
            return false;
        }
        self.hovered = hovered;
        true
    }

    /// Swap in freshly resolved selections after a remount.
    pub(super) fn replace_resolved(&mut self, resolved: Vec<Resolved>) {
        self.resolve_count += 1;
        self.selections = resolved;
    }
}
