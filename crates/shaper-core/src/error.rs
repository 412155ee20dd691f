use std::fmt;

#[derive(Debug)]
pub enum ShaperError {
    /// Construction-time configuration problem. Never recoverable.
    InvalidConfiguration(String),
    /// An explicit percept-size sequence ran out while input remained.
    PerceptSequenceExhausted { step: u64 },
    /// An explicit percept size fell outside `[min, max]`.
    PerceptSizeOutOfRange {
        step: u64,
        size: usize,
        min: usize,
        max: usize,
    },
    Snapshot(serde_json::Error),
}

impl fmt::Display for ShaperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaperError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            ShaperError::PerceptSequenceExhausted { step } => write!(
                f,
                "percept size sequence exhausted at step {step} while input remains"
            ),
            ShaperError::PerceptSizeOutOfRange {
                step,
                size,
                min,
                max,
            } => write!(
                f,
                "percept size {size} at step {step} outside allowed range [{min}, {max}]"
            ),
            ShaperError::Snapshot(e) => write!(f, "snapshot error: {e}"),
        }
    }
}

impl std::error::Error for ShaperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShaperError::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ShaperError {
    fn from(e: serde_json::Error) -> Self {
        ShaperError::Snapshot(e)
    }
}

pub type Result<T> = std::result::Result<T, ShaperError>;
