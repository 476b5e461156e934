use std::fmt::Display;
use std::path::PathBuf;

use crate::data::export::{self, ExportKind};
use crate::data::loader;
use crate::error::CalError;
use crate::fit::calibration::CalibrationMode;
use crate::fit::peak::PeakShape;
use crate::state::CalibrationSession;
use crate::ui::{PathPrompt, StatusSink};

// ---------------------------------------------------------------------------
// User-action handlers
// ---------------------------------------------------------------------------

/// Drives a [`CalibrationSession`] the way a front end would: one method per
/// user action, each reporting its outcome through the status sink.
///
/// Handlers return `None` when the action failed or was cancelled; the reason
/// has already been shown by then and the session is unchanged.
pub struct CalibrationApp<S, P> {
    pub session: CalibrationSession,
    pub sink: S,
    pub prompt: P,
}

impl<S: StatusSink, P: PathPrompt> CalibrationApp<S, P> {
    pub fn new(session: CalibrationSession, sink: S, prompt: P) -> Self {
        Self {
            session,
            sink,
            prompt,
        }
    }

    fn status(&mut self, message: impl AsRef<str>) {
        self.sink.show(message.as_ref());
    }

    fn report<T, E: Display>(&mut self, action: &str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("{action} failed: {e:#}");
                self.status(format!("Error: {e:#}"));
                None
            }
        }
    }

    fn pixel_list(&self) -> String {
        format!("pixels: [{}]", self.session.points().pixel_labels().join(", "))
    }

    fn reference_list(&self) -> String {
        format!("references: [{}]", self.session.points().reference_labels().join(", "))
    }

    fn cancelled<T>(&mut self, action: &str) -> Option<T> {
        self.status(format!("{action}: cancelled"));
        None
    }

    // ---- files ------------------------------------------------------------

    pub fn open_spectrum(&mut self) -> Option<usize> {
        let Some(path) = self.prompt.open_path("spectrum") else {
            return self.cancelled("Open spectrum");
        };
        let spectrum = self.report("open spectrum", loader::load_spectrum_file(&path))?;
        let n = spectrum.len();
        self.session.set_spectrum(spectrum, Some(path.clone()));
        if let Some(window) = self.session.window() {
            self.status(format!("Loaded {n} points from {}; window {window}", path.display()));
        }
        Some(n)
    }

    pub fn open_catalog(&mut self) -> Option<usize> {
        let Some(path) = self.prompt.open_path("catalog") else {
            return self.cancelled("Open catalog");
        };
        let entries = self.report("open catalog", loader::load_catalog_file(&path))?;
        let n = entries.len();
        self.session.set_catalog(entries);
        self.status(format!("Loaded {n} reference lines from {}", path.display()));
        Some(n)
    }

    // ---- selection & peak fitting ------------------------------------------

    pub fn set_window(&mut self, a: f64, b: f64) {
        let window = self.session.set_window(a, b);
        self.status(format!(
            "Window {window}, center {:.3}, width {:.3}",
            window.midpoint(),
            window.width()
        ));
    }

    pub fn clear(&mut self) -> Option<()> {
        let result = self.session.clear();
        self.report("clear", result)?;
        self.status("Cleared peak fit");
        Some(())
    }

    /// Fit the current window; `None` uses the configured peak shape.
    pub fn fit_peak(&mut self, shape: Option<PeakShape>) -> Option<f64> {
        let shape = shape.unwrap_or(self.session.config.peak_shape);
        let result = self
            .session
            .fit_peak(shape)
            .map(|fit| (fit.center(), fit.location_label()));
        let (center, label) = self.report("peak fit", result)?;
        self.status(label);
        Some(center)
    }

    // ---- calibration points --------------------------------------------------

    pub fn accept_peak(&mut self) -> Option<f64> {
        let result = self.session.add_pixel_point();
        let pixel = self.report("add pixel", result)?;
        self.status(format!("Added pixel {pixel:.3}; {}", self.pixel_list()));
        Some(pixel)
    }

    pub fn add_reference(&mut self, value: f64) -> Option<()> {
        let result = self.session.add_reference_point(value);
        self.report("add reference", result)?;
        self.status(format!("Added reference {value}; {}", self.reference_list()));
        Some(())
    }

    pub fn add_catalog_reference(&mut self, index: usize) -> Option<f64> {
        let result = self
            .session
            .add_reference_from_catalog(index)
            .map(|entry| (entry.to_string(), entry.value));
        let (text, value) = self.report("add reference", result)?;
        self.status(format!("Added reference {text}; {}", self.reference_list()));
        Some(value)
    }

    /// Add the catalog entry with this label.
    pub fn add_catalog_reference_by_label(&mut self, label: &str) -> Option<f64> {
        match self.session.find_catalog_entry(label) {
            Some(index) => self.add_catalog_reference(index),
            None => {
                let err = CalError::Selection(format!("no catalog entry labelled '{label}'"));
                self.report::<f64, _>("add reference", Err(err))
            }
        }
    }

    pub fn delete_pixel(&mut self, index: usize) -> Option<f64> {
        let result = self.session.delete_pixel_point(index);
        let removed = self.report("delete pixel", result)?;
        self.status(format!("Removed pixel {removed:.3}; {}", self.pixel_list()));
        Some(removed)
    }

    pub fn delete_reference(&mut self, index: usize) -> Option<f64> {
        let result = self.session.delete_reference_point(index);
        let removed = self.report("delete reference", result)?;
        self.status(format!("Removed reference {removed}; {}", self.reference_list()));
        Some(removed)
    }

    pub fn clear_pixels(&mut self) {
        self.session.clear_pixel_points();
        self.status("Pixel list cleared");
    }

    pub fn clear_references(&mut self) {
        self.session.clear_reference_points();
        self.status("Reference list cleared");
    }

    // ---- calibration -------------------------------------------------------

    pub fn set_laser(&mut self, nm: f64) -> Option<()> {
        let result = self.session.set_laser_wavelength_nm(nm);
        self.report("set laser", result)?;
        self.status(format!("Laser wavelength {nm} nm"));
        Some(())
    }

    pub fn calibrate(&mut self, mode: CalibrationMode) -> Option<()> {
        let result = self.session.calibrate(mode).map(|model| model.to_string());
        let summary = self.report("calibration", result)?;
        self.status(format!("Calibrated: {summary}"));
        Some(())
    }

    // ---- export --------------------------------------------------------------

    /// Write one calibration file; the save prompt starts from the default name.
    pub fn export(&mut self, kind: ExportKind) -> Option<PathBuf> {
        let source = self.session.export_source().map(|p| p.to_path_buf());
        let source = self.report("export", source)?;
        let suggested = export::export_path(&source, kind);
        let Some(path) = self.prompt.save_path(kind.suffix(), &suggested) else {
            return self.cancelled("Export");
        };
        let result = self.session.export_to(kind, &path);
        self.report("export", result)?;
        self.status(format!("Saved {}", path.display()));
        Some(path)
    }

    /// Export each kind in turn; stops at the first failure.
    pub fn export_all(&mut self, kinds: &[ExportKind]) -> Option<Vec<PathBuf>> {
        kinds.iter().map(|&kind| self.export(kind)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::Path;

    use super::*;
    use crate::fit::calibration::CalibrationModel;

    #[derive(Default)]
    struct Recorder {
        messages: Vec<String>,
    }

    impl StatusSink for Recorder {
        fn show(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }
    }

    /// Hands out scripted answers in order; an exhausted script cancels.
    #[derive(Default)]
    struct Script {
        answers: VecDeque<Option<PathBuf>>,
    }

    impl PathPrompt for Script {
        fn open_path(&mut self, _what: &str) -> Option<PathBuf> {
            self.answers.pop_front().flatten()
        }

        fn save_path(&mut self, _what: &str, suggested: &Path) -> Option<PathBuf> {
            match self.answers.pop_front() {
                Some(answer) => answer,
                None => Some(suggested.to_path_buf()),
            }
        }
    }

    fn app(answers: Vec<Option<PathBuf>>) -> CalibrationApp<Recorder, Script> {
        CalibrationApp::new(
            CalibrationSession::default(),
            Recorder::default(),
            Script {
                answers: answers.into(),
            },
        )
    }

    fn last(app: &CalibrationApp<Recorder, Script>) -> &str {
        app.sink.messages.last().map(String::as_str).unwrap_or("")
    }

    fn lamp_text() -> String {
        (0..1024)
            .map(|i| {
                let x = i as f64;
                let y: f64 = [(100.0, 80.0), (300.0, 60.0), (500.0, 90.0)]
                    .iter()
                    .map(|&(c, a)| a * (-0.5 * (x - c) * (x - c) / 16.0).exp())
                    .sum::<f64>()
                    + 20.0;
                format!("{i} {y}\n")
            })
            .collect()
    }

    #[test]
    fn test_cancelled_open_leaves_session_alone() {
        let mut app = app(vec![None]);
        assert_eq!(app.open_spectrum(), None);
        assert_eq!(last(&app), "Open spectrum: cancelled");
        assert!(app.session.spectrum().is_none());
    }

    #[test]
    fn test_bad_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        std::fs::write(&path, "1 2\n3\n").unwrap();

        let mut app = app(vec![Some(path)]);
        assert_eq!(app.open_spectrum(), None);
        assert!(last(&app).starts_with("Error: loading spectrum"), "{}", last(&app));
        assert!(last(&app).contains("line 2"));
    }

    #[test]
    fn test_actions_before_loading() {
        let mut app = app(vec![]);
        assert_eq!(app.fit_peak(None), None);
        assert_eq!(last(&app), "Error: no spectrum is loaded");
        assert_eq!(app.accept_peak(), None);
        assert_eq!(last(&app), "Error: no peak has been fitted yet");
        assert_eq!(app.export(ExportKind::Nanometer), None);
        assert_eq!(app.clear(), None);
        assert!(last(&app).starts_with("Error: invalid selection"));
    }

    #[test]
    fn test_full_session() {
        let dir = tempfile::tempdir().unwrap();
        let spectrum = dir.path().join("lamp.txt");
        let catalog = dir.path().join("lines.txt");
        std::fs::write(&spectrum, lamp_text()).unwrap();
        std::fs::write(&catalog, "Ne 600\nNe 620\n\nNe 640\n").unwrap();

        let mut app = app(vec![Some(spectrum), Some(catalog)]);
        assert_eq!(app.open_spectrum(), Some(1024));
        assert_eq!(app.open_catalog(), Some(3));

        for (i, center) in [100.0, 300.0, 500.0].into_iter().enumerate() {
            app.set_window(center + 20.0, center - 20.0);
            assert_eq!(
                last(&app),
                format!(
                    "Window [{:.3}, {:.3}), center {center:.3}, width 40.000",
                    center - 20.0,
                    center + 20.0
                )
            );
            let fitted = app.fit_peak(Some(PeakShape::Gaussian)).unwrap();
            assert!((fitted - center).abs() < 1e-6);
            assert!(last(&app).starts_with("Current peak location: "));
            app.accept_peak().unwrap();
            assert!(last(&app).ends_with(&format!("pixels: [{}]", app.session.points().pixel_labels().join(", "))));
            app.add_catalog_reference(i).unwrap();
        }
        assert_eq!(app.session.points().reference_labels(), vec!["600", "620", "640"]);

        app.calibrate(CalibrationMode::Linear).unwrap();
        assert!(last(&app).starts_with("Calibrated: "));
        assert!(matches!(app.session.model(), Some(CalibrationModel::Linear(_))));

        let written = app.export_all(&ExportKind::ALL).unwrap();
        assert_eq!(written.len(), 4);
        assert_eq!(written[0], dir.path().join("lamp_nm.cal"));
        let nm = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(nm.lines().nth(400), Some("6.3000e+02"));
    }

    #[test]
    fn test_cancelled_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let spectrum = dir.path().join("lamp.txt");
        std::fs::write(&spectrum, "10\n20\n30\n").unwrap();

        let mut app = app(vec![Some(spectrum), None]);
        app.open_spectrum().unwrap();
        assert_eq!(app.export(ExportKind::Nanometer), None);
        assert_eq!(last(&app), "Export: cancelled");
        assert!(!dir.path().join("lamp_nm.cal").exists());
    }

    #[test]
    fn test_catalog_label_lookup_and_deletes() {
        let mut app = app(vec![]);
        app.session.set_catalog(vec![crate::data::model::ReferenceEntry {
            label: "Hg 546".into(),
            value: 546.074,
        }]);
        assert_eq!(app.add_catalog_reference_by_label("Hg 546"), Some(546.074));
        assert_eq!(last(&app), "Added reference Hg 546 546.074; references: [546.074]");
        assert_eq!(app.add_catalog_reference_by_label("Ar 763"), None);
        assert!(last(&app).contains("Ar 763"));

        assert_eq!(app.delete_reference(3), None);
        assert_eq!(last(&app), "Error: reference index 3 is out of range (length 1)");
        assert_eq!(app.delete_reference(0), Some(546.074));
        assert_eq!(last(&app), "Removed reference 546.074; references: []");
        assert!(app.session.points().references().is_empty());
    }

    #[test]
    fn test_invalid_laser_is_rejected() {
        let mut app = app(vec![]);
        assert_eq!(app.set_laser(-5.0), None);
        assert_eq!(
            last(&app),
            "Error: invalid value: laser wavelength must be a positive number of nm, got -5"
        );
        assert_eq!(app.session.laser_wavelength_nm(), 532.0);
        assert_eq!(app.set_laser(785.0), Some(()));
        assert_eq!(last(&app), "Laser wavelength 785 nm");
    }
}
