/// Weight a unit must exceed to shape perception.
pub const SHAPING_THRESHOLD: f64 = 1.0;

/// Initial weight of a unit entering the percept shaper.
pub const NEW_UNIT_WEIGHT: f64 = 1.0;

/// Flat per-step decay added to every non-novel unit.
pub const FORGET_WEIGHT: f64 = -0.05;

/// Reinforcement for a familiar unit that is perceived again.
pub const CONSOLIDATION_WEIGHT: f64 = 0.5;

/// Penalty per shared primitive occurrence with a familiar perceived unit.
pub const INTERFERENCE_WEIGHT: f64 = -0.005;

/// Fewest units perceived in one step.
pub const MIN_PERCEPT_SIZE: usize = 1;

/// Most units perceived in one step.
pub const MAX_PERCEPT_SIZE: usize = 3;

/// Characters per primitive token.
pub const READING_FRAME: usize = 1;

/// How many characters of the remaining input are shown in diagnostics.
pub const INPUT_HEAD_CHARS: usize = 30;
