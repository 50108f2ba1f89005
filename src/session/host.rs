//! Editor-side session.
//!
//! Owns the undo/redo history and the error overlay, mirrors what the scene
//! reports (focus, hover, reloads), and turns persist requests into
//! undoable history entries.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::bridge::{Bridge, BridgeError, Dispatch, Reply, Subscription, compose};
use crate::protocol::{
    CameraMode, ElementBlurred, ElementFocused, ElementHovered, ElementPropPersisted, ErrorOverlay,
    PlayState, PropValue, Ready, RemoteError, RequestBlurElement, RequestDeleteElement,
    RequestFocusElement, RequestPersistElementProp, RequestRestoreElement,
    RequestSceneObjectPropValue, RequestSetElementProp, RequestStateChange, SceneReloaded,
};
use crate::scene::Location;
use crate::transform::{History, HistoryEntry};
use crate::{debug, log};

use super::PropPersistence;

type SharedPersistence = Arc<Mutex<Box<dyn PropPersistence>>>;

/// What the scene last told us.
#[derive(Debug, Default)]
struct Mirror {
    ready: bool,
    focused: Option<Location>,
    hovered: Option<Location>,
    overlay: ErrorOverlay,
    reloads: u64,
}

struct Shared {
    mirror: Mutex<Mirror>,
    history: Mutex<History>,
    persistence: SharedPersistence,
}

pub struct HostSession {
    bridge: Bridge,
    shared: Arc<Shared>,
    subscription: Option<Subscription>,
}

impl HostSession {
    /// Attach a session to `bridge`, registering its handlers.
    pub fn new(bridge: Bridge, persistence: impl PropPersistence + 'static) -> Self {
        let persistence: Box<dyn PropPersistence> = Box::new(persistence);
        let shared = Arc::new(Shared {
            mirror: Mutex::new(Mirror::default()),
            history: Mutex::new(History::new()),
            persistence: Arc::new(Mutex::new(persistence)),
        });
        let subscription = register(&bridge, &shared);
        Self {
            bridge,
            shared,
            subscription: Some(subscription),
        }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    // =========================================================================
    // Mirrored scene state
    // =========================================================================

    /// The scene announced readiness on the current connection.
    pub fn is_scene_ready(&self) -> bool {
        self.shared.mirror.lock().ready
    }

    pub fn focused(&self) -> Option<Location> {
        self.shared.mirror.lock().focused.clone()
    }

    pub fn hovered(&self) -> Option<Location> {
        self.shared.mirror.lock().hovered.clone()
    }

    /// Error currently shown in the overlay.
    pub fn error(&self) -> Option<RemoteError> {
        self.shared.mirror.lock().overlay.current().cloned()
    }

    /// Source location to jump to from the overlay.
    pub fn error_jump_target(&self) -> Option<Location> {
        self.shared.mirror.lock().overlay.jump_target()
    }

    pub fn dismiss_error(&self) -> Option<RemoteError> {
        self.shared.mirror.lock().overlay.dismiss()
    }

    pub fn reloads(&self) -> u64 {
        self.shared.mirror.lock().reloads
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub fn focus(&self, location: &Location) -> Result<(), BridgeError> {
        self.bridge.send_msg(&RequestFocusElement {
            location: location.clone(),
        })
    }

    pub fn blur(&self) -> Result<(), BridgeError> {
        self.bridge.send_msg(&RequestBlurElement)
    }

    /// Apply an intermediate value in the scene. Nothing is persisted.
    pub fn set_prop(&self, location: &Location, prop: &str, value: Value) -> Result<(), BridgeError> {
        self.bridge.send_msg(&RequestSetElementProp {
            location: location.clone(),
            prop_name: prop.to_owned(),
            prop_value: value,
        })
    }

    /// Read a live value off the scene object.
    pub fn prop_value(&self, location: &Location, prop: &str) -> Result<Reply<PropValue>, BridgeError> {
        self.bridge.request_msg(&RequestSceneObjectPropValue {
            location: location.clone(),
            prop_name: prop.to_owned(),
        })
    }

    /// Delete an element. Undo restores it.
    pub fn delete(&self, location: &Location) -> Result<(), BridgeError> {
        self.bridge.send_msg(&RequestDeleteElement {
            location: location.clone(),
        })?;

        let (undo_bridge, redo_bridge) = (self.bridge.clone(), self.bridge.clone());
        let (undo_at, redo_at) = (location.clone(), location.clone());
        self.shared.history.lock().push(HistoryEntry::new(
            "delete",
            move || {
                let request = RequestRestoreElement {
                    location: undo_at.clone(),
                };
                if let Err(e) = undo_bridge.send_msg(&request) {
                    log!("host"; "failed to restore {}: {}", undo_at, e);
                }
            },
            move || {
                let request = RequestDeleteElement {
                    location: redo_at.clone(),
                };
                if let Err(e) = redo_bridge.send_msg(&request) {
                    log!("host"; "failed to delete {}: {}", redo_at, e);
                }
            },
        ));
        Ok(())
    }

    pub fn restore(&self, location: &Location) -> Result<(), BridgeError> {
        self.bridge.send_msg(&RequestRestoreElement {
            location: location.clone(),
        })
    }

    pub fn change_state(&self, state: PlayState, camera: CameraMode) -> Result<(), BridgeError> {
        self.bridge.send_msg(&RequestStateChange { state, camera })
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Undo the latest edit, returning its label.
    pub fn undo(&self) -> Option<String> {
        self.shared.history.lock().undo()
    }

    pub fn redo(&self) -> Option<String> {
        self.shared.history.lock().redo()
    }

    pub fn can_undo(&self) -> bool {
        self.shared.history.lock().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.shared.history.lock().can_redo()
    }

    /// Labels of undoable edits, oldest first.
    pub fn history_labels(&self) -> Vec<String> {
        self.shared.history.lock().labels().map(str::to_owned).collect()
    }

    /// Reset mirrored state for a new scene connection. History survives.
    pub fn on_reconnect(&self) {
        let mut mirror = self.shared.mirror.lock();
        mirror.ready = false;
        mirror.focused = None;
        mirror.hovered = None;
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        // Handlers hold bridge clones; removing them breaks the cycle
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.shared.history.lock().clear();
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn register(bridge: &Bridge, shared: &Arc<Shared>) -> Subscription {
    let ready = Arc::clone(shared);
    let focused = Arc::clone(shared);
    let blurred = Arc::clone(shared);
    let hovered = Arc::clone(shared);
    let errored = Arc::clone(shared);
    let reloaded = Arc::clone(shared);
    let persisted = Arc::clone(shared);
    let confirm_bridge = bridge.clone();

    compose([
        bridge.on_msg(move |msg: Ready| {
            ready.mirror.lock().ready = true;
            log!("host"; "scene ready (protocol v{})", msg.version);
            // Others may want to see readiness too
            Dispatch::Pass
        }),
        bridge.on_msg(move |msg: ElementFocused| {
            debug!("host"; "focused {}", msg.location);
            focused.mirror.lock().focused = Some(msg.location);
            Dispatch::Handled
        }),
        bridge.on_msg(move |_: ElementBlurred| {
            blurred.mirror.lock().focused = None;
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: ElementHovered| {
            hovered.mirror.lock().hovered = msg.0;
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: RemoteError| {
            log!("error"; "{} ({}): {}", msg.title, msg.subtitle(), msg.message);
            errored.mirror.lock().overlay.show(msg);
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: SceneReloaded| {
            debug!("host"; "scene reloaded: {}", msg.path);
            let mut mirror = reloaded.mirror.lock();
            mirror.reloads += 1;
            // A successful reload supersedes the last render error
            mirror.overlay.dismiss();
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: RequestPersistElementProp| {
            persist(&persisted, &confirm_bridge, msg);
            Dispatch::Handled
        }),
    ])
}

/// Persist a final value, confirm it to the scene and record an undo entry.
fn persist(shared: &Shared, bridge: &Bridge, msg: RequestPersistElementProp) {
    let RequestPersistElementProp {
        location,
        prop_name,
        prop_value,
        prev_prop_value,
        action,
    } = msg;
    debug!("host"; "persist {} {} = {}", location, prop_name, prop_value);

    let prior = shared
        .persistence
        .lock()
        .persist(&location, &prop_name, &prop_value);
    confirm(bridge, &location, &prop_name, &prop_value);

    let Some(before) = prev_prop_value.or(prior) else {
        debug!("host"; "{} {} has no prior value; not undoable", location, prop_name);
        return;
    };

    let undo = apply_step(shared, bridge, &location, &prop_name, before);
    let redo = apply_step(shared, bridge, &location, &prop_name, prop_value);
    shared
        .history
        .lock()
        .push(HistoryEntry::new(action.label(), undo, redo));
}

/// Closure writing `value` back and confirming it to the scene.
fn apply_step(
    shared: &Shared,
    bridge: &Bridge,
    location: &Location,
    prop: &str,
    value: Value,
) -> impl FnMut() + Send + 'static {
    let persistence = Arc::clone(&shared.persistence);
    let bridge = bridge.clone();
    let location = location.clone();
    let prop = prop.to_owned();
    move || {
        persistence.lock().persist(&location, &prop, &value);
        confirm(&bridge, &location, &prop, &value);
    }
}

fn confirm(bridge: &Bridge, location: &Location, prop: &str, value: &Value) {
    let confirmed = ElementPropPersisted {
        location: location.clone(),
        prop_name: prop.to_owned(),
        prop_value: value.clone(),
    };
    if let Err(e) = bridge.send_msg(&confirmed) {
        log!("host"; "failed to confirm {} {}: {}", location, prop, e);
    }
}
