//! `[transform]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [transform]
//! precision = 3       # Decimals kept when persisting transform values
//! space = "local"     # Default commit space: "local" or "world"
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;
use crate::transform::Space;

/// Upper bound on `precision`; beyond this rounding no longer removes noise.
const MAX_PRECISION: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub precision: u32,
    pub space: Space,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            precision: 3,
            space: Space::Local,
        }
    }
}

impl TransformConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.precision > MAX_PRECISION {
            diag.error_with_hint(
                "transform.precision",
                format!("precision {} is too large", self.precision),
                format!("use at most {MAX_PRECISION}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use crate::transform::Space;

    #[test]
    fn test_transform_config() {
        let config = test_parse_config("[transform]\nprecision = 2\nspace = \"world\"");
        assert_eq!(config.transform.precision, 2);
        assert_eq!(config.transform.space, Space::World);
    }

    #[test]
    fn test_transform_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.transform.precision, 3);
        assert_eq!(config.transform.space, Space::Local);
    }

    #[test]
    fn test_unknown_space_fails_to_parse() {
        let result = crate::config::SceneConfig::from_str("[transform]\nspace = \"screen\"");
        assert!(result.is_err());
    }
}
