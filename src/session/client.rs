//! Scene-side session.
//!
//! Runs pointer handling and transforms against the live scene tree, and
//! answers the host's commands. Selection lives here because hit-testing
//! needs the tree; the host only mirrors what gets published.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::bridge::{Bridge, BridgeError, Dispatch, Subscription, compose};
use crate::config::SceneConfig;
use crate::protocol::{
    CameraMode, ElementBlurred, ElementFocused, ElementHovered, ElementPropPersisted, PlayState,
    PropValue, RemoteError, RequestBlurElement, RequestDeleteElement, RequestFocusElement,
    RequestRestoreElement, RequestSceneObjectPropValue, RequestSetElementProp, RequestStateChange,
    SceneReloaded,
};
use crate::resolve::{Filter, find_node, find_nodes};
use crate::scene::{Location, SceneTree, Vec3};
use crate::selection::{
    PointerEvent, ScenePicker, SelectMode, SelectionEvent, SelectionMarshal, SelectionState,
};
use crate::transform::{Space, TransformKind, TransformPipeline};
use crate::{debug, log};

struct Scene {
    tree: SceneTree,
    marshal: SelectionMarshal,
    pipeline: TransformPipeline,
    space: Space,
    state: PlayState,
    camera: CameraMode,
}

impl Scene {
    /// Apply `value` to every node rendered from `location`, deleted or not.
    fn apply_prop(&mut self, location: &Location, prop: &str, value: &Value) -> usize {
        let filter = Filter::Exact(location.clone());
        let nodes = find_nodes(&self.tree, self.tree.root(), &filter, true);
        nodes
            .into_iter()
            .filter(|node| self.tree.set_prop(*node, prop, value.clone()))
            .count()
    }

    fn set_deleted(&mut self, location: &Location, deleted: bool) -> usize {
        let filter = Filter::Exact(location.clone());
        let nodes = find_nodes(&self.tree, self.tree.root(), &filter, true);
        nodes
            .into_iter()
            .filter(|node| self.tree.set_deleted(*node, deleted))
            .count()
    }
}

pub struct ClientSession {
    bridge: Bridge,
    scene: Arc<Mutex<Scene>>,
    subscription: Option<Subscription>,
}

impl ClientSession {
    /// Attach a session for `tree` to `bridge`, registering its handlers.
    pub fn new(bridge: Bridge, tree: SceneTree, config: &SceneConfig) -> Self {
        let mut marshal = SelectionMarshal::new(config.selection.drag_threshold);
        marshal.register(ScenePicker::default());

        let scene = Arc::new(Mutex::new(Scene {
            tree,
            marshal,
            pipeline: TransformPipeline::new(config.transform.precision),
            space: config.transform.space,
            state: PlayState::default(),
            camera: CameraMode::default(),
        }));
        let subscription = register(&bridge, &scene);
        Self {
            bridge,
            scene,
            subscription: Some(subscription),
        }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Tell the host the scene is loaded.
    pub fn announce_ready(&self) -> Result<(), BridgeError> {
        self.bridge.announce_ready()
    }

    /// Read the live tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&SceneTree) -> R) -> R {
        f(&self.scene.lock().tree)
    }

    pub fn selection(&self) -> Vec<Arc<SelectionState>> {
        self.scene.lock().marshal.store().identities()
    }

    pub fn hovered(&self) -> Option<Arc<SelectionState>> {
        self.scene
            .lock()
            .marshal
            .store()
            .hovered()
            .map(|h| Arc::clone(&h.state))
    }

    pub fn play_state(&self) -> (PlayState, CameraMode) {
        let scene = self.scene.lock();
        (scene.state, scene.camera)
    }

    // =========================================================================
    // Pointer input
    // =========================================================================

    /// Feed a pointer event. Ignored outside edit mode.
    pub fn pointer(&self, event: PointerEvent) -> Result<Vec<SelectionEvent>, BridgeError> {
        let events = {
            let mut guard = self.scene.lock();
            if guard.state != PlayState::Edit {
                return Ok(Vec::new());
            }
            let scene = &mut *guard;
            scene.marshal.handle(&scene.tree, event)
        };
        publish(&self.bridge, &events)?;
        Ok(events)
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    /// Start a gesture on the current selection. Returns the target count.
    pub fn begin_transform(&self, kind: TransformKind) -> usize {
        let mut guard = self.scene.lock();
        let scene = &mut *guard;
        let targets: Vec<_> = scene
            .marshal
            .store()
            .selections()
            .iter()
            .map(|s| (s.node, s.meta.location.clone()))
            .collect();
        scene.pipeline.begin(&scene.tree, targets, kind)
    }

    pub fn update_transform(&self, offset: Vec3) {
        let mut guard = self.scene.lock();
        let scene = &mut *guard;
        scene.pipeline.update(&mut scene.tree, offset);
    }

    /// Finish the gesture and ask the host to persist every target.
    pub fn commit_transform(&self) -> Result<usize, BridgeError> {
        let requests = {
            let mut guard = self.scene.lock();
            let scene = &mut *guard;
            scene.pipeline.commit(&scene.tree, scene.space)
        };
        for request in &requests {
            self.bridge.send_msg(request)?;
        }
        Ok(requests.len())
    }

    pub fn cancel_transform(&self) {
        let mut guard = self.scene.lock();
        let scene = &mut *guard;
        scene.pipeline.cancel(&mut scene.tree);
    }

    // =========================================================================
    // Reload and errors
    // =========================================================================

    /// Apply a hot-reloaded module to the tree, then re-resolve selections
    /// whose nodes were replaced and notify the host.
    pub fn hot_reload(&self, path: &str, apply: impl FnOnce(&mut SceneTree)) -> Result<(), BridgeError> {
        let events = {
            let mut guard = self.scene.lock();
            let scene = &mut *guard;
            apply(&mut scene.tree);
            scene.marshal.reconcile(&scene.tree)
        };
        publish(&self.bridge, &events)?;
        self.bridge.send_msg(&SceneReloaded {
            path: path.to_owned(),
        })
    }

    /// Forward a render or loader failure to the host's overlay.
    pub fn report_error(&self, error: &RemoteError) -> Result<(), BridgeError> {
        self.bridge.send_msg(error)
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn register(bridge: &Bridge, scene: &Arc<Mutex<Scene>>) -> Subscription {
    let focus = (Arc::clone(scene), bridge.clone());
    let blur = (Arc::clone(scene), bridge.clone());
    let set = Arc::clone(scene);
    let persisted = Arc::clone(scene);
    let read = Arc::clone(scene);
    let delete = Arc::clone(scene);
    let restore = Arc::clone(scene);
    let state = (Arc::clone(scene), bridge.clone());

    compose([
        bridge.on_msg(move |msg: RequestFocusElement| {
            let (scene, bridge) = &focus;
            let events = {
                let mut guard = scene.lock();
                let scene = &mut *guard;
                scene
                    .marshal
                    .select_location(&scene.tree, &msg.location, SelectMode::Replace)
            };
            report(publish(bridge, &events));
            Dispatch::Handled
        }),
        bridge.on_msg(move |_: RequestBlurElement| {
            let (scene, bridge) = &blur;
            let events = scene.lock().marshal.clear();
            report(publish(bridge, &events));
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: RequestSetElementProp| {
            let applied = set
                .lock()
                .apply_prop(&msg.location, &msg.prop_name, &msg.prop_value);
            debug!("select"; "set {} on {} node(s) at {}", msg.prop_name, applied, msg.location);
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: ElementPropPersisted| {
            persisted
                .lock()
                .apply_prop(&msg.location, &msg.prop_name, &msg.prop_value);
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: RequestSceneObjectPropValue| {
            let scene = read.lock();
            let filter = Filter::Exact(msg.location);
            let value = find_node(&scene.tree, scene.tree.root(), &filter)
                .and_then(|node| scene.tree.prop(node, &msg.prop_name));
            Dispatch::reply(&PropValue { value })
        }),
        bridge.on_msg(move |msg: RequestDeleteElement| {
            if delete.lock().set_deleted(&msg.location, true) == 0 {
                debug!("select"; "nothing to delete at {}", msg.location);
            }
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: RequestRestoreElement| {
            restore.lock().set_deleted(&msg.location, false);
            Dispatch::Handled
        }),
        bridge.on_msg(move |msg: RequestStateChange| {
            let (scene, bridge) = &state;
            let events = {
                let mut guard = scene.lock();
                let scene = &mut *guard;
                scene.state = msg.state;
                scene.camera = msg.camera;
                if msg.state == PlayState::Edit {
                    Vec::new()
                } else {
                    // Leaving edit mode abandons any gesture in flight
                    scene.pipeline.cancel(&mut scene.tree);
                    scene.marshal.blur()
                }
            };
            log!("scene"; "state {:?}, camera {:?}", msg.state, msg.camera);
            report(publish(bridge, &events));
            Dispatch::Handled
        }),
    ])
}

/// Forward selection events to the host.
fn publish(bridge: &Bridge, events: &[SelectionEvent]) -> Result<(), BridgeError> {
    for event in events {
        match event {
            SelectionEvent::SelectionChanged(list) => match list.last() {
                Some(last) => bridge.send_msg(&ElementFocused {
                    location: last.location(),
                })?,
                None => bridge.send_msg(&ElementBlurred)?,
            },
            SelectionEvent::HoverChanged(hovered) => {
                bridge.send_msg(&ElementHovered(hovered.as_ref().map(|s| s.location())))?
            }
        }
    }
    Ok(())
}

fn report(result: Result<(), BridgeError>) {
    if let Err(e) = result {
        log!("select"; "failed to publish selection: {}", e);
    }
}
