//! JSON snapshot of a percept shaper.
//!
//! The wire format uses camelCase field names. Weights are plain JSON
//! numbers and survive a round trip bit for bit.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::shaper::PerceptShaper;

pub const SNAPSHOT_VERSION: &str = "1";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub version: String,
    #[serde(rename = "readingFrame")]
    pub reading_frame: usize,
    #[serde(default)]
    pub primitives: BTreeSet<String>,
    #[serde(rename = "forgottenPrimitives", default)]
    pub forgotten_primitives: BTreeSet<String>,
    pub units: BTreeMap<String, f64>,
}

impl StoreSnapshot {
    pub fn from_store(store: &PerceptShaper) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            reading_frame: store.reading_frame(),
            primitives: store.primitives().clone(),
            forgotten_primitives: store.forgotten_primitives().clone(),
            units: store.units().clone(),
        }
    }

    /// Rebuild a store over the snapshot's own alphabet.
    pub fn into_store(self) -> Result<PerceptShaper> {
        let mut store = PerceptShaper::new(self.primitives, self.reading_frame)?;
        store.seed_units(self.units);
        store.restore_forgotten(self.forgotten_primitives);
        Ok(store)
    }
}

/// Serialize a snapshot as pretty-printed JSON.
pub fn export_json(snapshot: &StoreSnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Parse a snapshot from JSON.
pub fn import_json(json: &str) -> Result<StoreSnapshot> {
    Ok(serde_json::from_str(json)?)
}
