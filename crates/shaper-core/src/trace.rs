//! Per-step diagnostics. Observers see what a step did; they cannot change it.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::update::InterferenceHit;

/// Everything that happened during one step.
#[derive(Clone, Debug, Serialize)]
pub struct StepTrace {
    pub step: u64,
    pub percept_size: usize,
    /// The first few characters of the input the step started from.
    pub input_head: String,
    pub store_before: BTreeMap<String, f64>,
    pub perceived: Vec<String>,
    pub percept: String,
    pub novel: BTreeSet<String>,
    pub interference: Vec<InterferenceHit>,
    pub deltas: BTreeMap<String, f64>,
    pub removed: Vec<(String, f64)>,
    pub store_after: BTreeMap<String, f64>,
}

pub trait StepObserver {
    /// Traces are only assembled when this returns true.
    fn enabled(&self) -> bool {
        true
    }

    fn observe(&mut self, trace: &StepTrace);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn enabled(&self) -> bool {
        false
    }

    fn observe(&mut self, _trace: &StepTrace) {}
}

/// Observer that keeps every trace in order.
#[derive(Debug, Default)]
pub struct TraceLog {
    pub traces: Vec<StepTrace>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

impl StepObserver for TraceLog {
    fn observe(&mut self, trace: &StepTrace) {
        self.traces.push(trace.clone());
    }
}
