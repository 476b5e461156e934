use thiserror::Error;

// ---------------------------------------------------------------------------
// Engine error taxonomy
// ---------------------------------------------------------------------------

/// Every failure an engine operation can report. None of them is fatal and
/// none of them leaves the session half-updated.
#[derive(Debug, Error)]
pub enum CalError {
    #[error("line {line}: {reason}")]
    InputFormat { line: usize, reason: String },

    #[error("no data rows found")]
    EmptyData,

    /// A value outside its domain that did not come from a file line.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid selection: {0}")]
    Selection(String),

    #[error("fit did not converge: {0}")]
    FitConvergence(String),

    #[error("need at least {required} calibration points, found {found}")]
    InsufficientPoints { required: usize, found: usize },

    #[error("pixel list has {pixels} entries but reference list has {references}")]
    LengthMismatch { pixels: usize, references: usize },

    #[error("no calibration is available")]
    NoCalibration,

    #[error("no spectrum is loaded")]
    NoSpectrum,

    #[error("no peak has been fitted yet")]
    NoPeakFit,

    #[error("{list} index {index} is out of range (length {len})")]
    IndexOutOfRange {
        list: &'static str,
        index: usize,
        len: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CalError {
    /// Shorthand for an `InputFormat` error at a given 1-based line.
    pub fn format(line: usize, reason: impl Into<String>) -> Self {
        CalError::InputFormat {
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = CalError> = std::result::Result<T, E>;
