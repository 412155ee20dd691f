//! The percept shaper: learned units and their familiarity weights.
//!
//! Primitives and chunks share one weight map but differ in what happens on
//! eviction. A chunk that drops to a non-positive weight simply leaves and
//! may be learned again later. A primitive that drops out is recorded as
//! forgotten and [`PerceptShaper::commit`] refuses to ever insert it again.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::validate_alphabet;
use crate::error::Result;
use crate::update::StepContext;

/// Whether a unit is a single alphabet primitive or a learned chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Primitive,
    Chunk,
}

/// A unit evicted during a commit, with the weight that caused it.
#[derive(Clone, Debug, PartialEq)]
pub struct Removal {
    pub unit: String,
    pub weight: f64,
    pub kind: UnitKind,
}

#[derive(Clone, Debug)]
pub struct PerceptShaper {
    primitives: BTreeSet<String>,
    reading_frame: usize,
    units: BTreeMap<String, f64>,
    forgotten: BTreeSet<String>,
}

impl PerceptShaper {
    /// An empty store over a validated alphabet.
    pub fn new(primitives: BTreeSet<String>, reading_frame: usize) -> Result<Self> {
        validate_alphabet(&primitives, reading_frame)?;
        Ok(Self {
            primitives,
            reading_frame,
            units: BTreeMap::new(),
            forgotten: BTreeSet::new(),
        })
    }

    /// Merge a unit → weight snapshot in verbatim, overwriting existing entries.
    pub fn seed_units<I, S>(&mut self, units: I)
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.units
            .extend(units.into_iter().map(|(unit, weight)| (unit.into(), weight)));
    }

    /// Mark primitives as already forgotten (restoring a snapshot).
    /// Strings outside the alphabet are ignored.
    pub fn restore_forgotten<I, S>(&mut self, forgotten: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for unit in forgotten {
            let unit = unit.into();
            if self.primitives.contains(&unit) {
                self.forgotten.insert(unit);
            }
        }
    }

    pub fn primitives(&self) -> &BTreeSet<String> {
        &self.primitives
    }

    pub fn reading_frame(&self) -> usize {
        self.reading_frame
    }

    pub fn units(&self) -> &BTreeMap<String, f64> {
        &self.units
    }

    pub fn forgotten_primitives(&self) -> &BTreeSet<String> {
        &self.forgotten
    }

    pub fn weight(&self, unit: &str) -> Option<f64> {
        self.units.get(unit).copied()
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn is_primitive(&self, unit: &str) -> bool {
        self.primitives.contains(unit)
    }

    pub fn is_forgotten(&self, unit: &str) -> bool {
        self.forgotten.contains(unit)
    }

    pub fn kind(&self, unit: &str) -> UnitKind {
        if self.is_primitive(unit) {
            UnitKind::Primitive
        } else {
            UnitKind::Chunk
        }
    }

    /// False only for primitives that were evicted before.
    pub fn can_enter(&self, unit: &str) -> bool {
        !self.is_forgotten(unit)
    }

    /// Units whose weight is strictly above `threshold`.
    pub fn familiar_units(&self, threshold: f64) -> impl Iterator<Item = &str> {
        self.units
            .iter()
            .filter(move |&(_, &weight)| weight > threshold)
            .map(|(unit, _)| unit.as_str())
    }

    /// Apply one step's accumulated changes.
    ///
    /// Novel units enter at `new_unit_weight`, then every delta is added to
    /// the weight it was computed against. Any touched unit left at or below
    /// zero is evicted; evicted primitives are forgotten for good.
    pub fn commit(&mut self, ctx: StepContext, new_unit_weight: f64) -> Vec<Removal> {
        let (novel, deltas) = ctx.into_parts();

        let mut touched: BTreeSet<String> = BTreeSet::new();
        for unit in novel {
            if self.can_enter(&unit) {
                self.units.insert(unit.clone(), new_unit_weight);
                touched.insert(unit);
            }
        }
        for (unit, delta) in deltas {
            if let Some(weight) = self.units.get_mut(&unit) {
                *weight += delta;
                touched.insert(unit);
            }
        }

        let mut removed = Vec::new();
        for unit in touched {
            let Some(&weight) = self.units.get(&unit) else {
                continue;
            };
            if weight > 0.0 {
                continue;
            }
            self.units.remove(&unit);
            let kind = self.kind(&unit);
            if kind == UnitKind::Primitive {
                self.forgotten.insert(unit.clone());
            }
            removed.push(Removal { unit, weight, kind });
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet(prims: &[&str]) -> BTreeSet<String> {
        prims.iter().map(|s| s.to_string()).collect()
    }

    fn store() -> PerceptShaper {
        PerceptShaper::new(alphabet(&["a", "b"]), 1).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_alphabet() {
        assert!(PerceptShaper::new(BTreeSet::new(), 1).is_err());
        assert!(PerceptShaper::new(alphabet(&["ab"]), 1).is_err());
    }

    #[test]
    fn test_kind() {
        let ps = store();
        assert_eq!(ps.kind("a"), UnitKind::Primitive);
        assert_eq!(ps.kind("ab"), UnitKind::Chunk);
        assert_eq!(ps.kind("z"), UnitKind::Chunk);
    }

    #[test]
    fn test_familiar_units_strictly_above() {
        let mut ps = store();
        ps.seed_units([("a", 1.0), ("b", 1.5), ("ab", 0.2)]);
        let familiar: Vec<&str> = ps.familiar_units(1.0).collect();
        assert_eq!(familiar, vec!["b"]);
    }

    #[test]
    fn test_commit_inserts_novel_and_applies_deltas() {
        let mut ps = store();
        ps.seed_units([("a", 1.0)]);
        let mut ctx = StepContext::default();
        ctx.mark_novel("b");
        ctx.add_delta("a", 0.5);
        ctx.add_delta("a", -0.05);
        let removed = ps.commit(ctx, 1.0);
        assert!(removed.is_empty());
        assert_eq!(ps.weight("b"), Some(1.0));
        assert!((ps.weight("a").unwrap() - 1.45).abs() < 1e-12);
    }

    #[test]
    fn test_evicted_primitive_is_forgotten_for_good() {
        let mut ps = store();
        ps.seed_units([("a", 0.03)]);
        let mut ctx = StepContext::default();
        ctx.add_delta("a", -0.05);
        let removed = ps.commit(ctx, 1.0);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].kind, UnitKind::Primitive);
        assert!(!ps.contains("a"));
        assert!(ps.is_forgotten("a"));

        let mut ctx = StepContext::default();
        ctx.mark_novel("a");
        ps.commit(ctx, 1.0);
        assert!(!ps.contains("a"), "forgotten primitive must not return");
    }

    #[test]
    fn test_evicted_chunk_can_return() {
        let mut ps = store();
        ps.seed_units([("ab", 0.05)]);
        let mut ctx = StepContext::default();
        ctx.add_delta("ab", -0.05);
        let removed = ps.commit(ctx, 1.0);
        assert_eq!(removed[0].kind, UnitKind::Chunk);
        assert!(!ps.contains("ab"));
        assert!(ps.forgotten_primitives().is_empty());

        let mut ctx = StepContext::default();
        ctx.mark_novel("ab");
        ps.commit(ctx, 1.0);
        assert_eq!(ps.weight("ab"), Some(1.0));
    }

    #[test]
    fn test_untouched_units_not_checked() {
        let mut ps = store();
        ps.seed_units([("a", -1.0)]);
        ps.commit(StepContext::default(), 1.0);
        assert!(ps.contains("a"));
    }

    #[test]
    fn test_restore_forgotten_ignores_chunks() {
        let mut ps = store();
        ps.restore_forgotten(["a", "ab"]);
        assert!(ps.is_forgotten("a"));
        assert!(!ps.is_forgotten("ab"));
        assert!(!ps.can_enter("a"));
        assert!(ps.can_enter("ab"));
    }
}
