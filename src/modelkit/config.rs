//! # Configuration
//!
//! Settings shared by the JSON format, stored as `modelkit.json` in a
//! directory chosen by the caller.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `ignore_default_values` | `true` | Leave out attributes holding their default |
//! | `pretty` | `true` | Indent written JSON |
//! | `strict_references` | `true` | Fail on references that cannot be resolved |
//!
//! Missing keys fall back to their defaults, so a partial file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

pub const CONFIG_FILE: &str = "modelkit.json";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ModelkitConfig {
    pub ignore_default_values: bool,
    pub pretty: bool,
    /// When false, references that stay unresolved after a document is read
    /// are dropped with a warning.
    pub strict_references: bool,
}

impl Default for ModelkitConfig {
    fn default() -> Self {
        Self {
            ignore_default_values: true,
            pretty: true,
            strict_references: true,
        }
    }
}

impl ModelkitConfig {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE)
    }

    /// Loads the configuration from `dir`, or the defaults if there is none.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        let config = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::path_in(dir);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }
}
