//! Configuration management for `scenelink.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # One module per TOML section
//! ├── error.rs       # ConfigError, ConfigDiagnostics
//! ├── util.rs        # Config file discovery
//! └── mod.rs         # SceneConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section        | Purpose                                   |
//! |----------------|-------------------------------------------|
//! | `[bridge]`     | Pump interval, host readiness gating      |
//! | `[selection]`  | Drag threshold                            |
//! | `[transform]`  | Rounding precision, default commit space  |
//! | `[host]`       | Listener interface and port               |
//! | `[log]`        | Verbose output                            |
//!
//! A missing file means defaults. Unknown keys are reported, not fatal.

mod error;
pub mod section;
mod util;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};
pub use section::{BridgeConfig, HostConfig, LogConfig, SelectionConfig, TransformConfig};

use util::find_config_file;

use crate::{
    cli::{Cli, Commands},
    log,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name, searched upward from the working directory.
pub const CONFIG_FILE: &str = "scenelink.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing scenelink.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Path of the loaded file, `None` when running on defaults (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl SceneConfig {
    /// Load configuration from CLI arguments.
    ///
    /// An explicit `--config` must exist. Otherwise `scenelink.toml` is
    /// searched upward from cwd, and defaults are used when none is found.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let config_path = match &cli.config {
            Some(path) => Some(path.clone()),
            None => find_config_file(Path::new(CONFIG_FILE)),
        };

        let mut config = match &config_path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.config_path = config_path;
        config.apply_command_options(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path with unknown field detection.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        eprintln!();
        log!("warning"; "unknown fields in {}:", display_path);
        log!("warning"; "ignoring:");
        for field in fields {
            eprintln!("- {}", field);
        }
        eprintln!();
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply global flags and command-specific options.
    fn apply_command_options(&mut self, cli: &Cli) {
        self.log.verbose |= cli.verbose;
        crate::logger::set_verbose(self.log.verbose);

        match &cli.command {
            Commands::Host { interface, port } => {
                Self::update_option(&mut self.host.interface, interface.as_ref());
                Self::update_option(&mut self.host.port, port.as_ref());
            }
            // Resolve command doesn't modify config
            Commands::Resolve { .. } => {}
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate every section, collecting all errors at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.bridge.validate(&mut diag);
        self.selection.validate(&mut diag);
        self.transform.validate(&mut diag);
        diag.into_result().map_err(ConfigError::Diagnostics)
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config content.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SceneConfig {
    let (parsed, ignored) = SceneConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("scenelink").chain(args.iter().copied()))
    }

    #[test]
    fn test_from_str_invalid_toml() {
        // Invalid TOML syntax - unclosed bracket
        assert!(SceneConfig::from_str("[bridge\ngated = true").is_err());
    }

    #[test]
    fn test_scene_config_default() {
        let config = SceneConfig::default();
        assert!(config.config_path.is_none());
        assert_eq!(config.bridge.poll_interval_ms, 16);
        assert_eq!(config.selection.drag_threshold, 5.0);
        assert_eq!(config.transform.precision, 3);
        assert_eq!(config.host.port, 5280);
        assert!(!config.log.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[bridge]\ngated = false\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = SceneConfig::parse_with_ignored(content).unwrap();

        assert!(!config.bridge.gated);
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_no_unknown_fields() {
        let (_, ignored) = SceneConfig::parse_with_ignored("[host]\nport = 1").unwrap();
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_validation_collects_every_error() {
        let config =
            test_parse_config("[bridge]\npoll_interval_ms = 0\n[transform]\nprecision = 40");
        match config.validate() {
            Err(ConfigError::Diagnostics(diag)) => assert_eq!(diag.len(), 2),
            other => panic!("expected diagnostics, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file_with_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenelink.toml");
        fs::write(&path, "[host]\nport = 6000\ninterface = \"0.0.0.0\"\n").unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let config = SceneConfig::load(&cli(&["--config", &path_arg, "host", "--port", "7000"])).unwrap();

        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.host.port, 7000);
        assert_eq!(config.host.interface.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml").to_string_lossy().into_owned();

        let result = SceneConfig::load(&cli(&["--config", &missing, "host"]));
        assert!(matches!(result, Err(ConfigError::Io(..))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenelink.toml");
        fs::write(&path, "[selection]\ndrag_threshold = -3.0\n").unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let result = SceneConfig::load(&cli(&["--config", &path_arg, "host"]));
        assert!(matches!(result, Err(ConfigError::Diagnostics(_))));
    }
}
