//! `[log]` section configuration.
//!
//! ```toml
//! [log]
//! verbose = false     # Print debug lines (same as --verbose)
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub verbose: bool,
}
