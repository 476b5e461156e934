use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CalError;
use crate::fit::peak::PeakShape;

// ---------------------------------------------------------------------------
// Session configuration
// ---------------------------------------------------------------------------

/// Tunables for a calibration session. Every field has a default so a JSON
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Excitation line (nm) for shift calibration and wavenumber export.
    pub laser_wavelength_nm: f64,
    /// Width of the default selection window, in pixel units.
    pub window_width: f64,
    /// Peak model used when the caller does not pick one.
    pub peak_shape: PeakShape,
    pub solver: SolverSettings,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            laser_wavelength_nm: 532.0,
            window_width: 50.0,
            peak_shape: PeakShape::Gaussian,
            solver: SolverSettings::default(),
        }
    }
}

/// Stopping rules for the Levenberg–Marquardt solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iterations: usize,
    /// Relative reduction of the residual sum of squares below which the fit stops.
    pub ftol: f64,
    /// Relative step length below which the fit stops.
    pub xtol: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-12,
            xtol: 1e-12,
        }
    }
}

impl CalibrationConfig {
    /// Read a JSON config file and validate it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: CalibrationConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CalError> {
        validate_laser_wavelength(self.laser_wavelength_nm)?;
        if !self.window_width.is_finite() || self.window_width < 0.0 {
            return Err(CalError::InvalidValue(format!(
                "window width must be a non-negative number, got {}",
                self.window_width
            )));
        }
        if self.solver.max_iterations == 0 {
            return Err(CalError::InvalidValue(
                "solver.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The excitation wavelength must be a positive, finite number of nanometres.
pub fn validate_laser_wavelength(nm: f64) -> Result<(), CalError> {
    if nm.is_finite() && nm > 0.0 {
        Ok(())
    } else {
        Err(CalError::InvalidValue(format!(
            "laser wavelength must be a positive number of nm, got {nm}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CalibrationConfig =
            serde_json::from_str(r#"{ "laser_wavelength_nm": 632.8 }"#).unwrap();
        assert_eq!(config.laser_wavelength_nm, 632.8);
        assert_eq!(config.window_width, 50.0);
        assert_eq!(config.peak_shape, PeakShape::Gaussian);
        assert_eq!(config.solver, SolverSettings::default());
    }

    #[test]
    fn test_peak_shape_is_lowercase_in_json() {
        let config: CalibrationConfig =
            serde_json::from_str(r#"{ "peak_shape": "lorentzian", "solver": { "max_iterations": 50 } }"#)
                .unwrap();
        assert_eq!(config.peak_shape, PeakShape::Lorentzian);
        assert_eq!(config.solver.max_iterations, 50);
        assert_eq!(config.solver.ftol, 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_laser() {
        let config = CalibrationConfig {
            laser_wavelength_nm: -1.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CalError::InvalidValue(_)));
        assert_eq!(
            err.to_string(),
            "invalid value: laser wavelength must be a positive number of nm, got -1"
        );
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.json");
        std::fs::write(&path, r#"{ "window_width": 100.0 }"#).unwrap();
        let config = CalibrationConfig::from_path(&path).unwrap();
        assert_eq!(config.window_width, 100.0);

        std::fs::write(&path, r#"{ "window_width": -3.0 }"#).unwrap();
        assert!(CalibrationConfig::from_path(&path).is_err());
    }
}
