//! TOML model configuration files.
//!
//! ```toml
//! [model]
//! primitives = ["ti", "bu", "do"]
//! reading_frame = 2
//! seed = 42
//!
//! [units]
//! tibudo = 1.5
//! ```
//!
//! Every `[model]` key is optional except `primitives`; missing keys take
//! the model defaults. `[units]` pre-seeds the store.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shaper_core::{Shaper, ShaperConfig};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: ShaperConfig,
    #[serde(default)]
    pub units: BTreeMap<String, f64>,
}

impl ConfigFile {
    /// Validate the configuration and build a model seeded with `[units]`.
    pub fn build(&self) -> Result<Shaper> {
        Ok(Shaper::with_units(
            self.model.clone(),
            self.units.iter().map(|(u, &w)| (u.clone(), w)),
        )?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| StoreError::InvalidData(format!("cannot encode config: {e}")))
    }
}

pub fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::debug!(
        "loaded config {} ({} primitives, {} seeded units)",
        path.display(),
        config.model.primitives.len(),
        config.units.len()
    );
    Ok(config)
}
