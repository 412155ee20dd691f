//! Per-step weight changes: shaping, interference and forgetting.
//!
//! Every function here reads the store as it was when the step began and
//! writes only into a [`StepContext`]. Nothing reaches the store until
//! [`crate::PerceptShaper::commit`], so no update can observe another update
//! from the same step.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::ShaperConfig;
use crate::shaper::PerceptShaper;
use crate::tokens::split_tokens;

/// One interference hit: `source` shares `matches` primitive occurrences with `target`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InterferenceHit {
    pub source: String,
    pub target: String,
    pub matches: usize,
}

/// Transient state for a single step. Built fresh for every step.
#[derive(Debug, Default)]
pub struct StepContext {
    novel: BTreeSet<String>,
    deltas: BTreeMap<String, f64>,
    hits: Vec<InterferenceHit>,
}

impl StepContext {
    pub fn mark_novel(&mut self, unit: &str) {
        self.novel.insert(unit.to_string());
    }

    pub fn add_delta(&mut self, unit: &str, delta: f64) {
        *self.deltas.entry(unit.to_string()).or_insert(0.0) += delta;
    }

    pub fn is_novel(&self, unit: &str) -> bool {
        self.novel.contains(unit)
    }

    pub fn novel_units(&self) -> &BTreeSet<String> {
        &self.novel
    }

    pub fn deltas(&self) -> &BTreeMap<String, f64> {
        &self.deltas
    }

    pub fn interference_hits(&self) -> &[InterferenceHit] {
        &self.hits
    }

    pub(crate) fn into_parts(self) -> (BTreeSet<String>, BTreeMap<String, f64>) {
        (self.novel, self.deltas)
    }
}

/// Run shaping, interference and forgetting for one percept, in that order.
pub fn update_weights(
    perceived: &[String],
    store: &PerceptShaper,
    config: &ShaperConfig,
    ctx: &mut StepContext,
) {
    shape(perceived, store, config, ctx);
    interfere(perceived, store, config, ctx);
    forget(store, config, ctx);
}

/// Reinforce or create the joined percept and, for multi-unit percepts,
/// each perceived unit.
///
/// A stored unit at or above the threshold (non-strict, unlike perception)
/// gains the consolidation weight, below it the new-unit weight. Unstored
/// primitives become novel unless forgotten. An unstored joined percept
/// that is not a primitive is a new chunk and becomes novel too.
pub fn shape(
    perceived: &[String],
    store: &PerceptShaper,
    config: &ShaperConfig,
    ctx: &mut StepContext,
) {
    if perceived.is_empty() {
        return;
    }
    let percept = perceived.concat();

    if !reinforce(&percept, store, config, ctx) && store.can_enter(&percept) {
        ctx.mark_novel(&percept);
    }

    if perceived.len() > 1 {
        for unit in perceived {
            if !reinforce(unit, store, config, ctx)
                && store.is_primitive(unit)
                && store.can_enter(unit)
            {
                ctx.mark_novel(unit);
            }
        }
    }
}

/// Add the shaping delta for a stored unit. Returns false when `unit` is not stored.
fn reinforce(
    unit: &str,
    store: &PerceptShaper,
    config: &ShaperConfig,
    ctx: &mut StepContext,
) -> bool {
    let Some(weight) = store.weight(unit) else {
        return false;
    };
    let delta = if weight >= config.shaping_threshold {
        config.consolidation_weight
    } else {
        config.new_unit_weight
    };
    ctx.add_delta(unit, delta);
    true
}

/// Penalize stored units that share primitives with familiar perceived units.
///
/// Each perceived unit weighing strictly more than the threshold is split
/// into its primitives, and every other stored, non-novel unit loses
/// `interference_weight` per (non-overlapping) occurrence of each of those
/// primitives inside it. A unit perceived twice interferes twice.
pub fn interfere(
    perceived: &[String],
    store: &PerceptShaper,
    config: &ShaperConfig,
    ctx: &mut StepContext,
) {
    let frame = store.reading_frame();
    let sources = perceived.iter().filter(|unit| {
        store
            .weight(unit)
            .is_some_and(|weight| weight > config.shaping_threshold)
    });

    for source in sources {
        let primitives = split_tokens(source, frame);
        for target in store.units().keys() {
            if target == source || ctx.is_novel(target) {
                continue;
            }
            let matches: usize = primitives
                .iter()
                .map(|p| target.matches(p).count())
                .sum();
            if matches > 0 {
                tracing::debug!(%source, %target, matches, "interference");
                ctx.add_delta(target, matches as f64 * config.interference_weight);
                ctx.hits.push(InterferenceHit {
                    source: source.clone(),
                    target: target.clone(),
                    matches,
                });
            }
        }
    }
}

/// Flat decay for every stored unit that is not novel this step.
pub fn forget(store: &PerceptShaper, config: &ShaperConfig, ctx: &mut StepContext) {
    for unit in store.units().keys() {
        if !ctx.is_novel(unit) {
            ctx.add_delta(unit, config.forget_weight);
        }
    }
}
