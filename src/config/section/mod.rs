//! Configuration section definitions.
//!
//! Each module corresponds to a section in `scenelink.toml`:
//!
//! | Module      | TOML Section   | Purpose                              |
//! |-------------|----------------|--------------------------------------|
//! | `bridge`    | `[bridge]`     | Pump interval, readiness gating      |
//! | `host`      | `[host]`       | Listener address for `scenelink host`|
//! | `log`       | `[log]`        | Verbose output                       |
//! | `selection` | `[selection]`  | Pointer handling                     |
//! | `transform` | `[transform]`  | Rounding and commit space            |

mod bridge;
mod host;
mod log;
mod selection;
mod transform;

pub use bridge::BridgeConfig;
pub use host::HostConfig;
pub use log::LogConfig;
pub use selection::SelectionConfig;
pub use transform::TransformConfig;
