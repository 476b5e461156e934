use std::path::{Path, PathBuf};

use crate::config::{validate_laser_wavelength, CalibrationConfig};
use crate::data::export::{self, ExportKind};
use crate::data::model::{ReferenceEntry, SelectionWindow, Spectrum};
use crate::error::{CalError, Result};
use crate::fit::calibration::{self, CalibrationMode, CalibrationModel};
use crate::fit::peak::{self, PeakFit, PeakShape};
use crate::points::CalibrationPoints;
use crate::units;

// ---------------------------------------------------------------------------
// Calibration session state
// ---------------------------------------------------------------------------

/// Everything one calibration works on, independent of any front end.
///
/// Each operation either succeeds and updates the session, or fails and
/// leaves it exactly as it was.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    pub config: CalibrationConfig,

    /// Loaded spectrum (None until one is loaded).
    spectrum: Option<Spectrum>,

    /// Where the spectrum came from; export files are named after it.
    source_path: Option<PathBuf>,

    /// Active fit-selection window.
    window: Option<SelectionWindow>,

    /// Most recent peak fit.
    last_fit: Option<PeakFit>,

    points: CalibrationPoints,

    /// Reference lines available for picking.
    catalog: Vec<ReferenceEntry>,

    laser_wavelength_nm: f64,

    model: Option<CalibrationModel>,

    /// Text of the last calibration, saved as `_fit.cal`.
    calibration_report: Option<String>,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

impl CalibrationSession {
    pub fn new(config: CalibrationConfig) -> Self {
        let laser_wavelength_nm = config.laser_wavelength_nm;
        Self {
            config,
            spectrum: None,
            source_path: None,
            window: None,
            last_fit: None,
            points: CalibrationPoints::new(),
            catalog: Vec::new(),
            laser_wavelength_nm,
            model: None,
            calibration_report: None,
        }
    }

    // -- spectrum & selection ---------------------------------------------

    /// Replace the spectrum wholesale. Resets the window and drops the last
    /// peak fit; points and the calibration model are kept.
    pub fn set_spectrum(&mut self, spectrum: Spectrum, source_path: Option<PathBuf>) {
        self.window = Some(SelectionWindow::centered_on(&spectrum, self.config.window_width));
        self.spectrum = Some(spectrum);
        self.source_path = source_path;
        self.last_fit = None;
    }

    /// Parse rows of raw text (1 or 2 numeric columns) and load them.
    pub fn load(&mut self, text: &str) -> Result<()> {
        let spectrum = crate::data::loader::parse_spectrum_text(text)?;
        self.set_spectrum(spectrum, None);
        Ok(())
    }

    pub fn spectrum(&self) -> Option<&Spectrum> {
        self.spectrum.as_ref()
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn window(&self) -> Option<SelectionWindow> {
        self.window
    }

    /// Bounds may be given in either order.
    pub fn set_window(&mut self, low: f64, high: f64) -> SelectionWindow {
        let window = SelectionWindow::new(low, high);
        self.window = Some(window);
        window
    }

    /// Drop fit artifacts and restore the default window; the spectrum stays.
    pub fn clear(&mut self) -> Result<()> {
        let spectrum = self.spectrum.as_ref().ok_or_else(|| {
            CalError::Selection("no spectrum loaded to place a window on".to_string())
        })?;
        self.window = Some(SelectionWindow::centered_on(spectrum, self.config.window_width));
        self.last_fit = None;
        Ok(())
    }

    // -- peak fitting -------------------------------------------------------

    pub fn fit_peak(&mut self, shape: PeakShape) -> Result<&PeakFit> {
        let spectrum = self.spectrum.as_ref().ok_or(CalError::NoSpectrum)?;
        let window = self
            .window
            .ok_or_else(|| CalError::Selection("no selection window".to_string()))?;
        let fit = peak::fit_peak(spectrum, window, shape, &self.config.solver)?;
        log::info!("{}", fit.location_label());
        Ok(&*self.last_fit.insert(fit))
    }

    pub fn last_fit(&self) -> Option<&PeakFit> {
        self.last_fit.as_ref()
    }

    // -- calibration points -------------------------------------------------

    pub fn points(&self) -> &CalibrationPoints {
        &self.points
    }

    /// Accept the last fitted peak center as a calibration pixel.
    pub fn add_pixel_point(&mut self) -> Result<f64> {
        let center = self.last_fit.as_ref().ok_or(CalError::NoPeakFit)?.center();
        self.points.push_pixel(center);
        Ok(center)
    }

    pub fn add_reference_point(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(CalError::InvalidValue(format!("reference value {value} is not finite")));
        }
        self.points.push_reference(value);
        Ok(())
    }

    /// Append the value of catalog entry `index`.
    pub fn add_reference_from_catalog(&mut self, index: usize) -> Result<&ReferenceEntry> {
        let len = self.catalog.len();
        let entry = self.catalog.get(index).ok_or(CalError::IndexOutOfRange {
            list: "catalog",
            index,
            len,
        })?;
        self.points.push_reference(entry.value);
        Ok(entry)
    }

    pub fn delete_pixel_point(&mut self, index: usize) -> Result<f64> {
        self.points.remove_pixel(index)
    }

    pub fn delete_reference_point(&mut self, index: usize) -> Result<f64> {
        self.points.remove_reference(index)
    }

    pub fn clear_pixel_points(&mut self) {
        self.points.clear_pixels();
    }

    pub fn clear_reference_points(&mut self) {
        self.points.clear_references();
    }

    // -- reference catalog --------------------------------------------------

    /// Replace the catalog.
    pub fn set_catalog(&mut self, entries: Vec<ReferenceEntry>) {
        self.catalog = entries;
    }

    pub fn catalog(&self) -> &[ReferenceEntry] {
        &self.catalog
    }

    /// Index of the first catalog entry with this label.
    pub fn find_catalog_entry(&self, label: &str) -> Option<usize> {
        self.catalog.iter().position(|e| e.label == label)
    }

    // -- calibration --------------------------------------------------------

    pub fn laser_wavelength_nm(&self) -> f64 {
        self.laser_wavelength_nm
    }

    pub fn set_laser_wavelength_nm(&mut self, nm: f64) -> Result<()> {
        validate_laser_wavelength(nm)?;
        self.laser_wavelength_nm = nm;
        Ok(())
    }

    /// Fit a calibration model from the current point lists.
    pub fn calibrate(&mut self, mode: CalibrationMode) -> Result<&CalibrationModel> {
        let pixels = self.points.pixels();
        let references = self.points.references();
        let model = calibration::fit_model(
            mode,
            pixels,
            references,
            self.laser_wavelength_nm,
            &self.config.solver,
        )?;
        let report = calibration::calibration_report(&model, pixels, references);
        log::info!("calibrated: {model}");
        self.calibration_report = Some(report);
        Ok(&*self.model.insert(model))
    }

    pub fn calibrate_linear(&mut self) -> Result<&CalibrationModel> {
        self.calibrate(CalibrationMode::Linear)
    }

    pub fn calibrate_shift(&mut self) -> Result<&CalibrationModel> {
        self.calibrate(CalibrationMode::Shift)
    }

    pub fn model(&self) -> Option<&CalibrationModel> {
        self.model.as_ref()
    }

    pub fn calibration_report(&self) -> Option<&str> {
        self.calibration_report.as_deref()
    }

    // -- unit conversion ----------------------------------------------------

    fn axis_and_model(&self) -> Result<(&[f64], &CalibrationModel)> {
        let spectrum = self.spectrum.as_ref().ok_or(CalError::NoSpectrum)?;
        let model = self.model.as_ref().ok_or(CalError::NoCalibration)?;
        Ok((&spectrum.x, model))
    }

    pub fn wavelength_axis(&self) -> Result<Vec<f64>> {
        let (x, model) = self.axis_and_model()?;
        Ok(units::to_wavelength_nm(x, model))
    }

    pub fn wavenumber_axis(&self) -> Result<Vec<f64>> {
        let (x, model) = self.axis_and_model()?;
        Ok(units::to_wavenumber_cm1(x, model, self.laser_wavelength_nm))
    }

    pub fn energy_axis(&self) -> Result<Vec<f64>> {
        let (x, model) = self.axis_and_model()?;
        Ok(units::to_energy_ev(x, model))
    }

    // -- export ---------------------------------------------------------------

    /// File the export names derive from. A spectrum loaded from raw text has
    /// none; write those with [`Self::export_to`].
    pub fn export_source(&self) -> Result<&Path> {
        self.spectrum.as_ref().ok_or(CalError::NoSpectrum)?;
        self.source_path.as_deref().ok_or_else(|| {
            CalError::Selection(
                "spectrum has no source file to name exports after; choose a path".to_string(),
            )
        })
    }

    /// Write one calibration file next to the loaded spectrum and return its path.
    pub fn export(&self, kind: ExportKind) -> Result<PathBuf> {
        let path = export::export_path(self.export_source()?, kind);
        self.export_to(kind, &path)?;
        Ok(path)
    }

    /// Write one calibration file to an explicit path.
    pub fn export_to(&self, kind: ExportKind, path: &Path) -> Result<()> {
        match kind {
            ExportKind::Nanometer => export::write_column(path, &self.wavelength_axis()?),
            ExportKind::Wavenumber => export::write_column(path, &self.wavenumber_axis()?),
            ExportKind::ElectronVolt => export::write_column(path, &self.energy_axis()?),
            ExportKind::FitReport => {
                self.spectrum.as_ref().ok_or(CalError::NoSpectrum)?;
                let report = self.calibration_report.as_deref().ok_or(CalError::NoCalibration)?;
                export::write_report(path, report)
            }
        }
    }
}
