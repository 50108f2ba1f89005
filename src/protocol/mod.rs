//! Bridge Message Registry
//!
//! The closed set of message kinds both contexts understand, and the typed
//! payload for each. Kinds travel as kebab-case strings:
//!
//! | kind                              | direction     | reply        |
//! |-----------------------------------|---------------|--------------|
//! | `ready`                           | client → host | -            |
//! | `request-focus-element`           | host → client | -            |
//! | `element-focused`                 | client → host | -            |
//! | `request-blur-element`            | host → client | -            |
//! | `element-blurred`                 | client → host | -            |
//! | `element-hovered`                 | client → host | -            |
//! | `request-set-element-prop`        | host → client | -            |
//! | `request-persist-element-prop`    | client → host | -            |
//! | `element-prop-persisted`          | host → client | -            |
//! | `request-scene-object-prop-value` | host → client | `{value}`    |
//! | `request-delete-element`          | host → client | -            |
//! | `request-restore-element`         | host → client | -            |
//! | `request-state-change`            | host → client | -            |
//! | `scene-reloaded`                  | client → host | -            |
//! | `error`                           | client → host | -            |
//!
//! Bump [`PROTOCOL_VERSION`] whenever a kind or payload changes shape.

pub mod error;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::scene::Location;

pub use error::{ErrorOrigin, ErrorOverlay, RemoteError};

/// Version announced in `ready`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Every kind a bridge endpoint may send or receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Ready,
    RequestFocusElement,
    ElementFocused,
    RequestBlurElement,
    ElementBlurred,
    ElementHovered,
    RequestSetElementProp,
    RequestPersistElementProp,
    ElementPropPersisted,
    RequestSceneObjectPropValue,
    RequestDeleteElement,
    RequestRestoreElement,
    RequestStateChange,
    SceneReloaded,
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::RequestFocusElement => "request-focus-element",
            Self::ElementFocused => "element-focused",
            Self::RequestBlurElement => "request-blur-element",
            Self::ElementBlurred => "element-blurred",
            Self::ElementHovered => "element-hovered",
            Self::RequestSetElementProp => "request-set-element-prop",
            Self::RequestPersistElementProp => "request-persist-element-prop",
            Self::ElementPropPersisted => "element-prop-persisted",
            Self::RequestSceneObjectPropValue => "request-scene-object-prop-value",
            Self::RequestDeleteElement => "request-delete-element",
            Self::RequestRestoreElement => "request-restore-element",
            Self::RequestStateChange => "request-state-change",
            Self::SceneReloaded => "scene-reloaded",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed message bound to one registry kind.
pub trait Message: Serialize + DeserializeOwned {
    const KIND: MessageKind;

    /// Payload of the reply, `()` for fire-and-forget kinds.
    type Reply: Serialize + DeserializeOwned;
}

macro_rules! message {
    ($ty:ty => $kind:ident) => {
        message!($ty => $kind, reply = ());
    };
    ($ty:ty => $kind:ident, reply = $reply:ty) => {
        impl Message for $ty {
            const KIND: MessageKind = MessageKind::$kind;
            type Reply = $reply;
        }
    };
}

// =============================================================================
// Payloads
// =============================================================================

/// `ready`: the scene finished loading and accepts commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ready {
    pub version: u32,
}

impl Default for Ready {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
        }
    }
}

/// `request-focus-element`: select the element at this call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFocusElement {
    #[serde(flatten)]
    pub location: Location,
}

/// `element-focused`: the user selected an element inside the scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementFocused {
    #[serde(flatten)]
    pub location: Location,
}

/// `request-blur-element`: clear the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBlurElement;

/// `element-blurred`: the selection inside the scene was cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementBlurred;

/// `element-hovered`: hover moved to an element, or off all elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHovered(pub Option<Location>);

/// `request-set-element-prop`: apply an intermediate prop value, unpersisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSetElementProp {
    #[serde(flatten)]
    pub location: Location,
    pub prop_name: String,
    pub prop_value: Value,
}

/// What produced a persisted change, used to label undo entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropAction {
    Translate,
    Rotate,
    Scale,
    #[default]
    SetProp,
}

impl PropAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::Rotate => "rotate",
            Self::Scale => "scale",
            Self::SetProp => "set prop",
        }
    }
}

/// `request-persist-element-prop`: write a final prop value to source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPersistElementProp {
    #[serde(flatten)]
    pub location: Location,
    pub prop_name: String,
    pub prop_value: Value,
    /// Value before the edit, when the scene knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_prop_value: Option<Value>,
    #[serde(default)]
    pub action: PropAction,
}

/// `element-prop-persisted`: confirmation that a value reached source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPropPersisted {
    #[serde(flatten)]
    pub location: Location,
    pub prop_name: String,
    pub prop_value: Value,
}

/// `request-scene-object-prop-value`: read a live value off the scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSceneObjectPropValue {
    #[serde(flatten)]
    pub location: Location,
    pub prop_name: String,
}

/// Reply to [`RequestSceneObjectPropValue`]; `None` when the object or prop
/// no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropValue {
    pub value: Option<Value>,
}

/// `request-delete-element`: hide the element, keep it restorable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDeleteElement {
    #[serde(flatten)]
    pub location: Location,
}

/// `request-restore-element`: undo a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRestoreElement {
    #[serde(flatten)]
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    #[default]
    Edit,
    Play,
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// The scene's own camera.
    #[default]
    Default,
    /// The editor's free camera.
    Editor,
}

/// `request-state-change`: switch between editing and playing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestStateChange {
    pub state: PlayState,
    #[serde(default)]
    pub camera: CameraMode,
}

/// `scene-reloaded`: a module was hot-reloaded; live objects were replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneReloaded {
    pub path: String,
}

message!(Ready => Ready);
message!(RequestFocusElement => RequestFocusElement);
message!(ElementFocused => ElementFocused);
message!(RequestBlurElement => RequestBlurElement);
message!(ElementBlurred => ElementBlurred);
message!(ElementHovered => ElementHovered);
message!(RequestSetElementProp => RequestSetElementProp);
message!(RequestPersistElementProp => RequestPersistElementProp);
message!(ElementPropPersisted => ElementPropPersisted);
message!(RequestSceneObjectPropValue => RequestSceneObjectPropValue, reply = PropValue);
message!(RequestDeleteElement => RequestDeleteElement);
message!(RequestRestoreElement => RequestRestoreElement);
message!(RequestStateChange => RequestStateChange);
message!(SceneReloaded => SceneReloaded);
message!(RemoteError => Error);
