//! Pixel-axis calibration for spectrometers.
//!
//! Load a spectrum, fit Gaussian or Lorentzian peaks inside a selection
//! window, pair the fitted centers with reference lines, fit a linear
//! (wavelength) or Raman-shift calibration, and export the calibrated axis
//! in nm, cm⁻¹ and eV.

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod fit;
pub mod points;
pub mod state;
pub mod ui;
pub mod units;

pub use app::CalibrationApp;
pub use config::CalibrationConfig;
pub use error::{CalError, Result};
pub use fit::calibration::{CalibrationMode, CalibrationModel};
pub use fit::peak::{PeakFit, PeakShape};
pub use state::CalibrationSession;
