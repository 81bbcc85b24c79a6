//! JSON-backed session settings: per-tier detector configs and the singer's
//! voice profile.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vocal_core::{DetectorConfig, VoiceProfile};

/// Detector settings for both tiers.
///
/// A missing section keeps its tier defaults. A partial section fills its
/// gaps from `DetectorConfig::default()` (the Basic values), so Pro overrides
/// should be spelled out in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub basic: DetectorConfig,
    pub pro: DetectorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            basic: DetectorConfig::basic(),
            pro: DetectorConfig::pro(),
        }
    }
}

impl SessionConfig {
    /// Loads and validates a config file, or returns the defaults without one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = match path {
            Some(path) => load_json(path)?,
            None => Self::default(),
        };
        config.basic.validate().context("invalid basic config")?;
        config.pro.validate().context("invalid pro config")?;
        Ok(config)
    }
}

/// Loads a voice profile if a path is given.
pub fn load_profile(path: Option<&Path>) -> Result<Option<VoiceProfile>> {
    path.map(load_json).transpose()
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}
