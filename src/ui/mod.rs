//! Front-end seams: what the calibration engine needs from whoever drives it.
//!
//! ```text
//!   CalibrationApp ──► CalibrationSession      (numerics, state)
//!         │
//!         ├──► StatusSink   one-line status messages
//!         └──► PathPrompt   file open / save, or "cancelled"
//! ```

use std::path::{Path, PathBuf};

pub mod console;

/// Single-line status output.
pub trait StatusSink {
    fn show(&mut self, message: &str);
}

/// File prompts. `None` means the user cancelled.
pub trait PathPrompt {
    /// Ask for an existing file; `what` names the kind of file ("spectrum", "catalog").
    fn open_path(&mut self, what: &str) -> Option<PathBuf>;

    /// Ask where to save, starting from `suggested`.
    fn save_path(&mut self, what: &str, suggested: &Path) -> Option<PathBuf>;
}
