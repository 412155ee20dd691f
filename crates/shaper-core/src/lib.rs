//! Percept shaper: an incremental chunking model of word segmentation.
//!
//! Follows PARSER (Perruchet & Vinter, 1998). A continuous stream of
//! syllables is consumed a few units at a time. Each percept is matched
//! greedily against the units currently familiar to memory, then memory is
//! reshaped: familiar units are consolidated, new ones enter, units sharing
//! syllables with a strong percept suffer interference, and everything
//! else slowly decays. Words emerge as the units that survive.
//!
//! Zero I/O: the caller owns input streams and persistence.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod perception;
pub mod shaper;
pub mod snapshot;
pub mod tokens;
pub mod trace;
pub mod update;

pub use analysis::{
    SharedSubstring, UnitReport, common_start_length, levenshtein, lexicon_report,
    longest_shared_substring_length,
};
pub use config::{SeedPolicy, ShaperConfig};
pub use error::{Result, ShaperError};
pub use model::Shaper;
pub use perception::{Perception, perceive};
pub use shaper::{PerceptShaper, Removal, UnitKind};
pub use snapshot::{SNAPSHOT_VERSION, StoreSnapshot, export_json, import_json};
pub use tokens::{normalize_stream, primitives_from_stream};
pub use trace::{NoopObserver, StepObserver, StepTrace, TraceLog};
pub use update::{InterferenceHit, StepContext, update_weights};
