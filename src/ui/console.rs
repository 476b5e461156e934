use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{PathPrompt, StatusSink};

// ---------------------------------------------------------------------------
// Status sink backed by the log facade
// ---------------------------------------------------------------------------

/// Sends every status line to the logger and keeps the most recent one.
#[derive(Debug, Default)]
pub struct LogSink {
    pub last: Option<String>,
}

impl StatusSink for LogSink {
    fn show(&mut self, message: &str) {
        log::info!("{message}");
        self.last = Some(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// Prompt answered from paths given up front (command line)
// ---------------------------------------------------------------------------

/// Answers `open_path` from a fixed table keyed by `what`; each answer is
/// handed out once. Saves go to the suggested path unless an output
/// directory is set.
#[derive(Debug, Default)]
pub struct PresetPaths {
    open: HashMap<String, PathBuf>,
    output_dir: Option<PathBuf>,
}

impl PresetPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open(mut self, what: &str, path: impl Into<PathBuf>) -> Self {
        self.open.insert(what.to_string(), path.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

impl PathPrompt for PresetPaths {
    fn open_path(&mut self, what: &str) -> Option<PathBuf> {
        self.open.remove(what)
    }

    fn save_path(&mut self, _what: &str, suggested: &Path) -> Option<PathBuf> {
        match (&self.output_dir, suggested.file_name()) {
            (Some(dir), Some(name)) => Some(dir.join(name)),
            _ => Some(suggested.to_path_buf()),
        }
    }
}
