//! # Engine Configuration
//!
//! [`EngineOptions`] can be built in code or loaded from a JSON, YAML
//! (`yaml-config` feature) or TOML (`toml-config` feature) file; the format
//! follows the file extension. Missing keys take their defaults.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
#[cfg(feature = "yaml-config")]
use serde_yaml;
#[cfg(feature = "toml-config")]
use toml;

use crate::error::{AccelError, Result};
use crate::native::BinaryConvention;

/// Default folder holding native binaries inside an archive
pub const DEFAULT_BINARY_FOLDER: &str = "native";

/// Default file name prefix of native binaries
pub const DEFAULT_BINARY_PREFIX: &str = "lib";

/// Shared library extension of the build target
pub fn platform_library_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Options of one engine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Abort the whole installation on the first descriptor failure
    pub strict_all_or_nothing: bool,
    /// Ignore the expected provenance of every descriptor
    pub suppress_provenance_filter: bool,
    /// Advice panics fall back to the original method instead of propagating
    pub dev_mode: bool,
    /// Activate dispatchers while installing instead of on the first intercepted call
    pub eager_activation: bool,
    pub binary_folder: String,
    pub binary_prefix: String,
    pub binary_extension: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strict_all_or_nothing: false,
            suppress_provenance_filter: false,
            dev_mode: false,
            eager_activation: true,
            binary_folder: DEFAULT_BINARY_FOLDER.to_string(),
            binary_prefix: DEFAULT_BINARY_PREFIX.to_string(),
            binary_extension: platform_library_extension().to_string(),
        }
    }
}

impl EngineOptions {
    pub fn convention(&self) -> BinaryConvention {
        BinaryConvention::new(&self.binary_folder, &self.binary_prefix, &self.binary_extension)
    }

    /// Load options from a configuration file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| AccelError::Config {
            path: path.to_path_buf(),
            message: "unknown or unsupported config format".to_string(),
        })?;
        let content = fs::read_to_string(path).map_err(|e| AccelError::Config {
            path: path.to_path_buf(),
            message: format!("failed to read: {}", e),
        })?;
        Self::parse(&content, format).map_err(|message| AccelError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse options written in `format`
    pub fn parse(content: &str, format: ConfigFormat) -> std::result::Result<Self, String> {
        match format {
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| format!("invalid YAML: {}", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| format!("invalid TOML: {}", e)),
        }
    }
}
