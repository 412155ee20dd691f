//! Greedy longest-match perception against the currently familiar units.

use std::collections::HashSet;

use crate::shaper::PerceptShaper;
use crate::tokens::{char_len, char_prefix};

/// Units perceived in one step and what is left of the input afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Perception<'a> {
    pub units: Vec<String>,
    pub remainder: &'a str,
}

impl Perception<'_> {
    /// All perceived units joined into the percept.
    pub fn percept(&self) -> String {
        self.units.concat()
    }
}

/// Perceive up to `count` units from the head of `input`.
///
/// The matching set is every unit weighing strictly more than `threshold`,
/// rebuilt on each call. The first candidate is as long as the longest
/// familiar unit (one frame when nothing is familiar). Candidates that are
/// not familiar shrink one frame at a time until they are, or until they are
/// a single frame wide, and whatever is left is taken as the unit.
pub fn perceive<'a>(
    count: usize,
    input: &'a str,
    store: &PerceptShaper,
    threshold: f64,
) -> Perception<'a> {
    let frame = store.reading_frame();
    let memory: HashSet<&str> = store.familiar_units(threshold).collect();
    let mut max_len = memory
        .iter()
        .map(|unit| char_len(unit))
        .max()
        .unwrap_or(frame);

    let mut units = Vec::with_capacity(count);
    let mut remainder = input;
    let mut remaining_len = char_len(input);

    for _ in 0..count {
        max_len = max_len.min(remaining_len);
        let mut candidate = char_prefix(remainder, max_len);
        let mut candidate_len = max_len;

        while !memory.contains(candidate) && candidate_len > frame {
            // Only reachable with primitives wider than one frame, which the
            // alphabet validation rules out.
            if store.is_primitive(candidate) {
                break;
            }
            candidate_len -= frame;
            candidate = char_prefix(candidate, candidate_len);
        }

        remainder = &remainder[candidate.len()..];
        remaining_len -= candidate_len;
        if !candidate.is_empty() {
            units.push(candidate.to_string());
        }
    }

    Perception { units, remainder }
}
