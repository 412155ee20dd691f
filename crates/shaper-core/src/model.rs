//! The step driver that turns a stream into a shaped store.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{SeedPolicy, ShaperConfig};
use crate::constants::INPUT_HEAD_CHARS;
use crate::error::{Result, ShaperError};
use crate::perception::perceive;
use crate::shaper::PerceptShaper;
use crate::snapshot::StoreSnapshot;
use crate::tokens::char_prefix;
use crate::trace::{NoopObserver, StepObserver, StepTrace};
use crate::update::{StepContext, update_weights};

/// The step driver: owns the store, the RNG and the step counter.
///
/// Each step perceives a handful of units from the head of the input,
/// computes all weight changes against the store as it stood at step start,
/// and commits them in one go.
pub struct Shaper {
    config: ShaperConfig,
    store: PerceptShaper,
    rng: SmallRng,
    effective_seed: u64,
    step_number: u64,
}

impl Shaper {
    pub fn new(config: ShaperConfig) -> Result<Self> {
        config.validate()?;
        let store = PerceptShaper::new(config.primitives.clone(), config.reading_frame)?;
        let effective_seed = match (config.seed, config.seed_policy) {
            (Some(seed), SeedPolicy::Deterministic) => seed,
            (Some(_), SeedPolicy::Reseed) | (None, _) => rand::random(),
        };
        Ok(Self {
            rng: SmallRng::seed_from_u64(effective_seed),
            config,
            store,
            effective_seed,
            step_number: 0,
        })
    }

    /// Start from a pre-seeded store, merged in verbatim.
    pub fn with_units<I, S>(config: ShaperConfig, units: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut shaper = Self::new(config)?;
        shaper.store.seed_units(units);
        Ok(shaper)
    }

    /// Continue from a saved snapshot, including its forgotten primitives.
    pub fn from_snapshot(config: ShaperConfig, snapshot: StoreSnapshot) -> Result<Self> {
        if snapshot.reading_frame != config.reading_frame {
            return Err(ShaperError::InvalidConfiguration(format!(
                "snapshot reading frame {} does not match configured frame {}",
                snapshot.reading_frame, config.reading_frame
            )));
        }
        let mut shaper = Self::new(config)?;
        shaper.store.seed_units(snapshot.units);
        shaper.store.restore_forgotten(snapshot.forgotten_primitives);
        Ok(shaper)
    }

    // --- Accessors ---

    pub fn config(&self) -> &ShaperConfig {
        &self.config
    }

    pub fn primitives(&self) -> &BTreeSet<String> {
        self.store.primitives()
    }

    pub fn reading_frame(&self) -> usize {
        self.config.reading_frame
    }

    pub fn shaping_threshold(&self) -> f64 {
        self.config.shaping_threshold
    }

    pub fn new_unit_weight(&self) -> f64 {
        self.config.new_unit_weight
    }

    pub fn forget_weight(&self) -> f64 {
        self.config.forget_weight
    }

    pub fn consolidation_weight(&self) -> f64 {
        self.config.consolidation_weight
    }

    pub fn interference_weight(&self) -> f64 {
        self.config.interference_weight
    }

    pub fn min_percept_size(&self) -> usize {
        self.config.min_percept_size
    }

    pub fn max_percept_size(&self) -> usize {
        self.config.max_percept_size
    }

    /// The seed as configured, before the seed policy is applied.
    pub fn seed(&self) -> Option<u64> {
        self.config.seed
    }

    pub fn seed_policy(&self) -> SeedPolicy {
        self.config.seed_policy
    }

    /// The seed the RNG was actually built from.
    pub fn effective_seed(&self) -> u64 {
        self.effective_seed
    }

    pub fn step_number(&self) -> u64 {
        self.step_number
    }

    pub fn store(&self) -> &PerceptShaper {
        &self.store
    }

    pub fn units(&self) -> &BTreeMap<String, f64> {
        self.store.units()
    }

    pub fn forgotten_primitives(&self) -> &BTreeSet<String> {
        self.store.forgotten_primitives()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::from_store(&self.store)
    }

    /// Units weighing at least `min_weight`, heaviest first.
    pub fn learned_units(&self, min_weight: f64) -> Vec<(&str, f64)> {
        let mut units: Vec<(&str, f64)> = self
            .store
            .units()
            .iter()
            .filter(|&(_, &w)| w >= min_weight)
            .map(|(u, &w)| (u.as_str(), w))
            .collect();
        units.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        units
    }

    // --- Running ---

    /// Process `input` until nothing is left and return the remainder.
    ///
    /// With `sizes`, step `n` perceives `sizes[n]` units and the RNG is never
    /// consulted. Running out of sizes while input remains is an error.
    pub fn run(&mut self, input: &str, sizes: Option<&[usize]>) -> Result<String> {
        self.run_observed(input, sizes, &mut NoopObserver)
    }

    /// Like [`Shaper::run`], reporting every step to `observer`.
    pub fn run_observed(
        &mut self,
        input: &str,
        sizes: Option<&[usize]>,
        observer: &mut dyn StepObserver,
    ) -> Result<String> {
        let start_step = self.step_number;
        let mut sizes = sizes.map(|s| s.iter().copied());
        let mut remainder = input;

        while !remainder.is_empty() {
            let size = match sizes.as_mut() {
                Some(iter) => Some(iter.next().ok_or(ShaperError::PerceptSequenceExhausted {
                    step: self.step_number + 1,
                })?),
                None => None,
            };
            remainder = self.step_observed(remainder, size, observer)?;
        }

        tracing::info!(
            steps = self.step_number - start_step,
            units = self.store.len(),
            forgotten = self.store.forgotten_primitives().len(),
            "run complete"
        );
        Ok(remainder.to_string())
    }

    /// Run a single step and return what is left of `input`.
    /// `size` overrides the random percept size. Empty input is left untouched.
    pub fn step<'a>(&mut self, input: &'a str, size: Option<usize>) -> Result<&'a str> {
        self.step_observed(input, size, &mut NoopObserver)
    }

    fn step_observed<'a>(
        &mut self,
        input: &'a str,
        size: Option<usize>,
        observer: &mut dyn StepObserver,
    ) -> Result<&'a str> {
        if input.is_empty() {
            return Ok(input);
        }
        let count = self.percept_size(size)?;
        self.step_number += 1;
        let step = self.step_number;
        let _span = tracing::debug_span!("step", step).entered();

        let input_head = char_prefix(input, INPUT_HEAD_CHARS);
        tracing::debug!(head = input_head, units = ?self.store.units(), "step start");
        let store_before = observer.enabled().then(|| self.store.units().clone());

        let perception = perceive(count, input, &self.store, self.config.shaping_threshold);
        let percept = perception.percept();
        tracing::debug!(count, perceived = ?perception.units, %percept, "perceived");

        let mut ctx = StepContext::default();
        update_weights(&perception.units, &self.store, &self.config, &mut ctx);
        let pending = observer.enabled().then(|| {
            (
                ctx.novel_units().clone(),
                ctx.interference_hits().to_vec(),
                ctx.deltas().clone(),
            )
        });

        let removed = self.store.commit(ctx, self.config.new_unit_weight);
        for r in &removed {
            tracing::info!(unit = %r.unit, weight = r.weight, kind = ?r.kind, "removing unit");
        }
        tracing::debug!(units = ?self.store.units(), "step end");

        if let (Some(store_before), Some((novel, interference, deltas))) = (store_before, pending)
        {
            observer.observe(&StepTrace {
                step,
                percept_size: count,
                input_head: input_head.to_string(),
                store_before,
                perceived: perception.units,
                percept,
                novel,
                interference,
                deltas,
                removed: removed.into_iter().map(|r| (r.unit, r.weight)).collect(),
                store_after: self.store.units().clone(),
            });
        }

        Ok(perception.remainder)
    }

    fn percept_size(&mut self, size: Option<usize>) -> Result<usize> {
        let min = self.config.min_percept_size;
        let max = self.config.max_percept_size;
        match size {
            Some(size) if (min..=max).contains(&size) => Ok(size),
            Some(size) => Err(ShaperError::PerceptSizeOutOfRange {
                step: self.step_number + 1,
                size,
                min,
                max,
            }),
            None => Ok(self.rng.random_range(min..=max)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceLog;
    use approx::assert_abs_diff_eq;

    fn ab_config() -> ShaperConfig {
        ShaperConfig::new(["a", "b"]).with_percept_size(1, 1)
    }

    #[test]
    fn test_three_step_trace() {
        let mut shaper = Shaper::new(ab_config()).unwrap();
        let mut log = TraceLog::new();
        let rest = shaper
            .run_observed("aab", Some(&[1, 1, 1]), &mut log)
            .unwrap();
        assert_eq!(rest, "");
        assert_eq!(log.len(), 3);

        let after: Vec<&BTreeMap<String, f64>> =
            log.traces.iter().map(|t| &t.store_after).collect();
        assert_eq!(after[0].len(), 1);
        assert_abs_diff_eq!(after[0]["a"], 1.0);
        assert_eq!(after[1].len(), 1);
        assert_abs_diff_eq!(after[1]["a"], 1.45, epsilon = 1e-9);
        assert_eq!(after[2].len(), 2);
        assert_abs_diff_eq!(after[2]["a"], 1.40, epsilon = 1e-9);
        assert_abs_diff_eq!(after[2]["b"], 1.0);
        assert_eq!(shaper.step_number(), 3);
    }

    #[test]
    fn test_empty_input_is_idempotent() {
        let mut shaper = Shaper::with_units(ab_config(), [("ab", 2.0)]).unwrap();
        let before = shaper.units().clone();
        assert_eq!(shaper.run("", None).unwrap(), "");
        assert_eq!(shaper.run("", Some(&[])).unwrap(), "");
        assert_eq!(shaper.step_number(), 0);
        assert_eq!(shaper.units(), &before);
    }

    #[test]
    fn test_exhausted_sizes_is_fatal() {
        let mut shaper = Shaper::new(ab_config()).unwrap();
        let err = shaper.run("aab", Some(&[1, 1])).unwrap_err();
        assert!(matches!(
            err,
            ShaperError::PerceptSequenceExhausted { step: 3 }
        ));
    }

    #[test]
    fn test_explicit_size_out_of_range() {
        let mut shaper = Shaper::new(ShaperConfig::new(["a"]).with_percept_size(1, 2)).unwrap();
        let err = shaper.run("aaaa", Some(&[1, 3])).unwrap_err();
        assert!(matches!(
            err,
            ShaperError::PerceptSizeOutOfRange { step: 2, size: 3, min: 1, max: 2 }
        ));
        assert_eq!(shaper.step_number(), 1);
    }

    #[test]
    fn test_forgotten_primitive_never_returns() {
        let mut shaper = Shaper::with_units(ab_config(), [("a", 0.04)]).unwrap();
        shaper.run("bba", Some(&[1, 1, 1])).unwrap();
        assert!(!shaper.units().contains_key("a"));
        assert!(shaper.forgotten_primitives().contains("a"));
        assert!(shaper.units().contains_key("b"));
    }

    #[test]
    fn test_evicted_chunk_is_relearned() {
        let config = ShaperConfig::new(["a", "b"]).with_percept_size(1, 2);
        let mut shaper = Shaper::with_units(config, [("ab", 0.04)]).unwrap();
        shaper.step("aab", Some(1)).unwrap();
        assert!(!shaper.units().contains_key("ab"));
        shaper.step("ab", Some(2)).unwrap();
        assert_abs_diff_eq!(shaper.units()["ab"], 1.0);
        assert_abs_diff_eq!(shaper.units()["a"], 1.45, epsilon = 1e-9);
        assert_abs_diff_eq!(shaper.units()["b"], 1.0);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let input = "abbaabababbbaabbababaaab".repeat(4);
        let config = ShaperConfig::new(["a", "b"]).with_seed(42);
        let mut first = Shaper::new(config.clone()).unwrap();
        let mut second = Shaper::new(config).unwrap();
        first.run(&input, None).unwrap();
        second.run(&input, None).unwrap();
        assert_eq!(first.effective_seed(), 42);
        assert_eq!(first.step_number(), second.step_number());
        assert_eq!(first.units().len(), second.units().len());
        for (unit, w) in first.units() {
            assert_abs_diff_eq!(*w, second.units()[unit], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reseed_policy_ignores_supplied_seed() {
        let config = ShaperConfig::new(["a"])
            .with_seed(7)
            .with_seed_policy(SeedPolicy::Reseed);
        let shaper = Shaper::new(config).unwrap();
        assert_eq!(shaper.seed(), Some(7));
        assert_eq!(shaper.seed_policy(), SeedPolicy::Reseed);
        assert_ne!(shaper.effective_seed(), 7);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            Shaper::new(ShaperConfig::new(Vec::<String>::new())),
            Err(ShaperError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Shaper::new(ShaperConfig::new(["ab"])),
            Err(ShaperError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_learned_units_heaviest_first() {
        let shaper =
            Shaper::with_units(ab_config(), [("a", 0.5), ("ab", 3.0), ("b", 3.0)]).unwrap();
        let learned = shaper.learned_units(1.0);
        assert_eq!(learned, vec![("ab", 3.0), ("b", 3.0)]);
    }

    #[test]
    fn test_snapshot_resume() {
        let mut shaper = Shaper::with_units(ab_config(), [("a", 0.04)]).unwrap();
        shaper.run("bb", Some(&[1, 1])).unwrap();
        let snapshot = shaper.snapshot();

        let mut resumed = Shaper::from_snapshot(ab_config(), snapshot).unwrap();
        assert_eq!(resumed.units(), shaper.units());
        resumed.run("a", Some(&[1])).unwrap();
        assert!(!resumed.units().contains_key("a"));
    }

    #[test]
    fn test_snapshot_frame_mismatch() {
        let shaper = Shaper::new(ab_config()).unwrap();
        let snapshot = shaper.snapshot();
        let config = ShaperConfig::new(["ab"]).with_reading_frame(2);
        assert!(Shaper::from_snapshot(config, snapshot).is_err());
    }

    #[test]
    fn test_accessors_reflect_config() {
        let shaper = Shaper::new(ShaperConfig::new(["x"]).with_seed(3)).unwrap();
        assert_eq!(shaper.reading_frame(), 1);
        assert_eq!(shaper.shaping_threshold(), 1.0);
        assert_eq!(shaper.new_unit_weight(), 1.0);
        assert_eq!(shaper.forget_weight(), -0.05);
        assert_eq!(shaper.consolidation_weight(), 0.5);
        assert_eq!(shaper.interference_weight(), -0.005);
        assert_eq!(shaper.min_percept_size(), 1);
        assert_eq!(shaper.max_percept_size(), 3);
        assert_eq!(shaper.seed(), Some(3));
        assert!(shaper.primitives().contains("x"));
    }
}
