//! Selection Marshal
//!
//! Pointer-driven state machine producing hover and selection state.
//!
//! ```text
//! idle ──move──▶ hover (pickers at point, first candidate)
//! idle ──down──▶ pressed ──move > threshold──▶ dragging ──up──▶ idle (selection untouched)
//!                pressed ──up──────────────────────────────────▶ idle (select)
//! ```
//!
//! Repeated clicks at an unchanged point walk the z-ordered candidates:
//! click count `n` selects candidate `(n - 1) % len`.
//!
//! # Module Structure
//!
//! - `pick` - `Picker` trait and the scene hit-test picker
//! - `store` - selection list, hover slot, resolve counter

pub mod pick;
pub mod store;


use std::sync::Arc;

use crate::debug;
use crate::resolve::{Filter, find_node, resolve_element_meta};
use crate::scene::{Location, Point, SceneTree};

pub use pick::{Picker, ScenePicker};
pub use store::{Resolved, SelectMode, SelectionState, SelectionStore};

/// Raw pointer input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Move(Point),
    Down(Point),
    Up {
        point: Point,
        /// Consecutive clicks at this spot, as reported by the platform.
        click_count: u32,
        /// Additive modifier (shift) held.
        additive: bool,
    },
    /// Pointer left the viewport or the viewport lost focus.
    Out,
}

impl PointerEvent {
    /// Single, non-additive click release.
    pub fn up(point: Point) -> Self {
        Self::Up {
            point,
            click_count: 1,
            additive: false,
        }
    }
}

/// Published state change.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    HoverChanged(Option<Arc<SelectionState>>),
    SelectionChanged(Vec<Arc<SelectionState>>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Pressed { origin: Point },
    Dragging,
}

pub struct SelectionMarshal {
    store: SelectionStore,
    pickers: Vec<Box<dyn Picker>>,
    phase: Phase,
    drag_threshold: f64,
    last_click: Option<Point>,
}

impl SelectionMarshal {
    /// Marshal with no pickers; see [`SelectionMarshal::register`].
    pub fn new(drag_threshold: f64) -> Self {
        Self {
            store: SelectionStore::new(),
            pickers: Vec::new(),
            phase: Phase::Idle,
            drag_threshold,
            last_click: None,
        }
    }

    pub fn register(&mut self, picker: impl Picker + 'static) {
        self.pickers.push(Box::new(picker));
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == Phase::Dragging
    }

    /// Feed one pointer event.
    pub fn handle(&mut self, tree: &SceneTree, event: PointerEvent) -> Vec<SelectionEvent> {
        match event {
            PointerEvent::Move(point) => self.on_move(tree, point),
            PointerEvent::Down(origin) => {
                self.phase = Phase::Pressed { origin };
                Vec::new()
            }
            PointerEvent::Up {
                point,
                click_count,
                additive,
            } => self.on_up(tree, point, click_count, additive),
            PointerEvent::Out => self.set_hovered(None),
        }
    }

    fn on_move(&mut self, tree: &SceneTree, point: Point) -> Vec<SelectionEvent> {
        match self.phase {
            Phase::Idle => {
                let hovered = pick::pick_all(&self.pickers, tree, point).into_iter().next();
                self.set_hovered(hovered)
            }
            Phase::Pressed { origin } if point.distance(&origin) > self.drag_threshold => {
                debug!("select"; "drag started at {:?}", origin);
                self.phase = Phase::Dragging;
                self.set_hovered(None)
            }
            Phase::Pressed { .. } | Phase::Dragging => Vec::new(),
        }
    }

    fn on_up(&mut self, tree: &SceneTree, point: Point, click_count: u32, additive: bool) -> Vec<SelectionEvent> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        if !matches!(phase, Phase::Pressed { .. }) {
            // Drag end, or a release without a press
            return Vec::new();
        }

        let candidates = pick::pick_all(&self.pickers, tree, point);
        let repeated = click_count > 1 && self.last_click == Some(point);
        self.last_click = Some(point);

        let mode = if additive {
            SelectMode::Addition
        } else {
            SelectMode::Replace
        };
        if candidates.is_empty() {
            return match mode {
                SelectMode::Replace => self.clear(),
                SelectMode::Addition => Vec::new(),
            };
        }

        let index = if repeated {
            (click_count as usize - 1) % candidates.len()
        } else {
            0
        };
        let Some(target) = candidates.into_iter().nth(index) else {
            return Vec::new();
        };
        debug!("select"; "click x{} -> {}", click_count, target.meta.location);
        self.select(vec![target], mode)
    }

    fn set_hovered(&mut self, hovered: Option<Resolved>) -> Vec<SelectionEvent> {
        if self.store.set_hovered(hovered) {
            vec![SelectionEvent::HoverChanged(
                self.store.hovered().map(|h| Arc::clone(&h.state)),
            )]
        } else {
            Vec::new()
        }
    }

    fn select(&mut self, items: Vec<Resolved>, mode: SelectMode) -> Vec<SelectionEvent> {
        if self.store.select(items, mode) {
            vec![SelectionEvent::SelectionChanged(self.store.identities())]
        } else {
            Vec::new()
        }
    }

    /// Drop the selection (escape).
    pub fn clear(&mut self) -> Vec<SelectionEvent> {
        if self.store.clear() {
            vec![SelectionEvent::SelectionChanged(Vec::new())]
        } else {
            Vec::new()
        }
    }

    /// Clear hover without touching the selection.
    pub fn blur(&mut self) -> Vec<SelectionEvent> {
        self.set_hovered(None)
    }

    /// Select the first live node for `location`, e.g. on an editor focus
    /// request. An unknown location changes nothing.
    pub fn select_location(&mut self, tree: &SceneTree, location: &Location, mode: SelectMode) -> Vec<SelectionEvent> {
        let filter = Filter::Exact(location.clone());
        let Some(resolved) = resolve_identity(tree, &filter) else {
            debug!("select"; "nothing renders {}", location);
            return Vec::new();
        };
        self.select(vec![resolved], mode)
    }

    /// Re-resolve selections whose node is gone, e.g. after a hot reload.
    ///
    /// Identities that no longer resolve are dropped silently.
    pub fn reconcile(&mut self, tree: &SceneTree) -> Vec<SelectionEvent> {
        let mut events = Vec::new();

        if self.store.hovered().is_some_and(|h| !tree.contains(h.node)) {
            events.extend(self.set_hovered(None));
        }

        let stale = self.store.selections().iter().any(|s| !tree.contains(s.node));
        if !stale {
            return events;
        }

        let refreshed: Vec<Resolved> = self
            .store
            .identities()
            .iter()
            .filter_map(|state| resolve_identity(tree, &Filter::Exact(state.location())))
            .collect();
        debug!(
            "select";
            "re-resolved {} of {} selection(s)",
            refreshed.len(),
            self.store.selections().len()
        );
        self.store.replace_resolved(refreshed);
        events.push(SelectionEvent::SelectionChanged(self.store.identities()));
        events
    }
}

/// Resolve an identity against the current tree: the first live node whose
/// chain mentions it, and the record the resolver settles on.
fn resolve_identity(tree: &SceneTree, filter: &Filter) -> Option<Resolved> {
    let node = find_node(tree, tree.root(), filter)?;
    let meta = resolve_element_meta(tree, node, filter)?;
    Some(Resolved::new(node, meta))
}
