//! Model parameters and their validation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONSOLIDATION_WEIGHT, FORGET_WEIGHT, INTERFERENCE_WEIGHT, MAX_PERCEPT_SIZE, MIN_PERCEPT_SIZE,
    NEW_UNIT_WEIGHT, READING_FRAME, SHAPING_THRESHOLD,
};
use crate::error::{Result, ShaperError};
use crate::tokens::char_len;

/// What to do with a caller-supplied RNG seed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// The supplied seed seeds the RNG, so runs are reproducible.
    #[default]
    Deterministic,
    /// The supplied seed is discarded and a fresh random seed drawn instead.
    /// Matches the legacy PARSER port, which reseeded whenever a seed was given.
    Reseed,
}

/// Model parameters, fixed for the lifetime of a [`crate::Shaper`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaperConfig {
    /// The primitive alphabet. Every member must be `reading_frame` characters wide.
    pub primitives: BTreeSet<String>,
    pub reading_frame: usize,
    pub shaping_threshold: f64,
    pub new_unit_weight: f64,
    pub forget_weight: f64,
    pub consolidation_weight: f64,
    pub interference_weight: f64,
    pub min_percept_size: usize,
    pub max_percept_size: usize,
    pub seed: Option<u64>,
    pub seed_policy: SeedPolicy,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            primitives: BTreeSet::new(),
            reading_frame: READING_FRAME,
            shaping_threshold: SHAPING_THRESHOLD,
            new_unit_weight: NEW_UNIT_WEIGHT,
            forget_weight: FORGET_WEIGHT,
            consolidation_weight: CONSOLIDATION_WEIGHT,
            interference_weight: INTERFERENCE_WEIGHT,
            min_percept_size: MIN_PERCEPT_SIZE,
            max_percept_size: MAX_PERCEPT_SIZE,
            seed: None,
            seed_policy: SeedPolicy::Deterministic,
        }
    }
}

impl ShaperConfig {
    /// Default parameters over the given alphabet.
    pub fn new<I, S>(primitives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            primitives: primitives.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_reading_frame(mut self, frame: usize) -> Self {
        self.reading_frame = frame;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed_policy = policy;
        self
    }

    pub fn with_percept_size(mut self, min: usize, max: usize) -> Self {
        self.min_percept_size = min;
        self.max_percept_size = max;
        self
    }

    /// Check every construction-time constraint.
    pub fn validate(&self) -> Result<()> {
        validate_alphabet(&self.primitives, self.reading_frame)?;

        if self.min_percept_size == 0 {
            return Err(ShaperError::InvalidConfiguration(
                "min_percept_size must be at least 1".to_string(),
            ));
        }
        if self.min_percept_size > self.max_percept_size {
            return Err(ShaperError::InvalidConfiguration(format!(
                "min_percept_size {} exceeds max_percept_size {}",
                self.min_percept_size, self.max_percept_size
            )));
        }

        let weights = [
            ("shaping_threshold", self.shaping_threshold),
            ("new_unit_weight", self.new_unit_weight),
            ("forget_weight", self.forget_weight),
            ("consolidation_weight", self.consolidation_weight),
            ("interference_weight", self.interference_weight),
        ];
        if let Some((name, value)) = weights.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ShaperError::InvalidConfiguration(format!(
                "{name} must be finite, got {value}"
            )));
        }
        Ok(())
    }
}

/// Alphabet must be non-empty and every primitive exactly one frame wide.
pub(crate) fn validate_alphabet(primitives: &BTreeSet<String>, frame: usize) -> Result<()> {
    if frame == 0 {
        return Err(ShaperError::InvalidConfiguration(
            "reading_frame must be at least 1".to_string(),
        ));
    }
    if primitives.is_empty() {
        return Err(ShaperError::InvalidConfiguration(
            "primitive alphabet cannot be empty".to_string(),
        ));
    }
    if let Some(p) = primitives.iter().find(|p| char_len(p) != frame) {
        return Err(ShaperError::InvalidConfiguration(format!(
            "primitive {p:?} does not conform to a reading frame of {frame}"
        )));
    }
    Ok(())
}
