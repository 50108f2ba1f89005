//! `[selection]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [selection]
//! drag_threshold = 5.0     # Pixels a press may travel and still count as a click
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Distance in pixels beyond which a press becomes a drag.
    pub drag_threshold: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { drag_threshold: 5.0 }
    }
}

impl SelectionConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.drag_threshold.is_finite() || self.drag_threshold < 0.0 {
            diag.error_with_hint(
                "selection.drag_threshold",
                format!("invalid threshold `{}`", self.drag_threshold),
                "use a non-negative number of pixels",
            );
        }
    }
}
