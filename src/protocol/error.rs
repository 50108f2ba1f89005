//! Remote runtime errors.
//!
//! The scene catches its own failures and forwards them as `error`
//! messages. The host never crashes on them: it shows an overlay, keeps the
//! bridge alive, and offers a jump to the first source frame of the stack.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::scene::Location;

/// Where inside the scene the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorOrigin {
    /// Importing the scene module failed (syntax error, missing export).
    ModuleLoad,
    /// A user-provided wrapper component threw while rendering.
    ProviderRender,
    /// The scene itself threw while rendering.
    #[default]
    SceneRender,
}

impl ErrorOrigin {
    pub fn subtitle(self) -> &'static str {
        match self {
            Self::ModuleLoad => "The scene module could not be loaded.",
            Self::ProviderRender => "The provider component threw while rendering.",
            Self::SceneRender => "The scene threw while rendering.",
        }
    }
}

/// `error` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub message: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub source: ErrorOrigin,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
}

impl RemoteError {
    pub fn new(origin: ErrorOrigin, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: String::new(),
            source: origin,
            title: title.into(),
            subtitle: origin.subtitle().to_string(),
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    /// Subtitle as sent, or the origin's default when the scene omitted it.
    pub fn subtitle(&self) -> &str {
        if self.subtitle.is_empty() {
            self.source.subtitle()
        } else {
            &self.subtitle
        }
    }
}

/// `path:line:column` frames, with or without surrounding parentheses.
static FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\s()]+):(\d+):(\d+)").expect("frame pattern is valid"));

/// First source location mentioned in a stack trace.
///
/// URL frames (`http://localhost:3333/src/scene.tsx:4:2`) are reduced to
/// their path (`/src/scene.tsx`).
pub fn first_source_frame(stack: &str) -> Option<Location> {
    FRAME.captures_iter(stack).find_map(|caps| {
        let path = strip_origin(caps.get(1)?.as_str());
        let line = caps.get(2)?.as_str().parse().ok()?;
        let column = caps.get(3)?.as_str().parse().ok()?;
        (!path.is_empty()).then(|| Location::new(path, line, column))
    })
}

fn strip_origin(path: &str) -> &str {
    match path.find("://") {
        Some(scheme_end) => {
            let rest = &path[scheme_end + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => path,
    }
}

/// Host-side overlay state for the latest remote error.
#[derive(Debug, Default)]
pub struct ErrorOverlay {
    current: Option<RemoteError>,
}

impl ErrorOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show an error, replacing any previous one.
    pub fn show(&mut self, error: RemoteError) {
        self.current = Some(error);
    }

    /// Close the overlay. Returns the error that was shown.
    pub fn dismiss(&mut self) -> Option<RemoteError> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&RemoteError> {
        self.current.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    /// Target of the "jump to source" action.
    pub fn jump_target(&self) -> Option<Location> {
        first_source_frame(&self.current.as_ref()?.stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_source_frame_from_url_stack() {
        let stack = "TypeError: cannot read properties of undefined\n    \
                     at Box (http://localhost:3333/src/scene.tsx:12:5)\n    \
                     at renderWithHooks (http://localhost:3333/node_modules/.vite/react.js:100:18)";
        assert_eq!(first_source_frame(stack), Some(Location::new("/src/scene.tsx", 12, 5)));
    }

    #[test]
    fn test_first_source_frame_plain_path() {
        let stack = "Error: boom\n    at /home/me/project/scene.tsx:4:2";
        assert_eq!(
            first_source_frame(stack),
            Some(Location::new("/home/me/project/scene.tsx", 4, 2))
        );
    }

    #[test]
    fn test_first_source_frame_none() {
        assert_eq!(first_source_frame("Error: boom"), None);
        assert_eq!(first_source_frame(""), None);
    }

    #[test]
    fn test_subtitle_falls_back_to_origin() {
        let mut error = RemoteError::new(ErrorOrigin::ModuleLoad, "Syntax error", "unexpected token");
        assert_eq!(error.subtitle(), ErrorOrigin::ModuleLoad.subtitle());
        error.subtitle.clear();
        assert_eq!(error.subtitle(), ErrorOrigin::ModuleLoad.subtitle());
    }

    #[test]
    fn test_overlay_show_and_dismiss() {
        let mut overlay = ErrorOverlay::new();
        assert!(!overlay.is_visible());

        overlay.show(
            RemoteError::new(ErrorOrigin::SceneRender, "Render failed", "boom")
                .with_stack("at Scene (/scene.tsx:3:9)"),
        );
        assert!(overlay.is_visible());
        assert_eq!(overlay.jump_target(), Some(Location::new("/scene.tsx", 3, 9)));

        let dismissed = overlay.dismiss().unwrap();
        assert_eq!(dismissed.title, "Render failed");
        assert!(!overlay.is_visible());
        assert_eq!(overlay.jump_target(), None);
    }

    #[test]
    fn test_error_payload_parses_without_optional_fields() {
        let parsed: RemoteError =
            serde_json::from_str(r#"{"message":"boom","title":"Render failed"}"#).unwrap();
        assert_eq!(parsed.source, ErrorOrigin::SceneRender);
        assert!(parsed.stack.is_empty());
    }
}
