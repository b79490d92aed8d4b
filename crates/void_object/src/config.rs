//! Runtime configuration
//!
//! Loaded from TOML, every field optional:
//!
//! ```toml
//! name = "editor"
//! report_leaks_on_shutdown = true
//! panic_on_leaks = false
//! require_registered_parent = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for one runtime context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Context name used in log output
    pub name: String,
    /// Log leaked objects when the runtime shuts down
    pub report_leaks_on_shutdown: bool,
    /// Turn a non-empty leak report into a panic (useful in tests)
    pub panic_on_leaks: bool,
    /// Reject class registration before the parent class is registered
    pub require_registered_parent: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: "main".into(),
            report_leaks_on_shutdown: true,
            panic_on_leaks: false,
            require_registered_parent: false,
        }
    }
}

impl RuntimeConfig {
    /// Default configuration with a different name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse from a TOML string
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}
