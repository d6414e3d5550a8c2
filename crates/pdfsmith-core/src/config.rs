//! TOML configuration for operation defaults
//!
//! Every section is optional; missing sections and keys fall back to the
//! library defaults.
//!
//! ```toml
//! [watermark]
//! font_size = 60
//! opacity = 0.2
//!
//! [encryption]
//! algorithm = "aes128"
//!
//! [encryption.permissions]
//! copy = false
//! ```
//!
//! Rendering options are not configurable here: they belong to whoever
//! supplies the rasterizer.

use crate::crypto::EncryptOptions;
use crate::error::{PdfSmithError, Result};
use crate::watermark::WatermarkOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub watermark: WatermarkOptions,
    pub encryption: EncryptOptions,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PdfSmithError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(s).map_err(|e| PdfSmithError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.watermark
            .validate()
            .map_err(|err| PdfSmithError::Config(format!("[watermark] {}", err)))
    }
}
