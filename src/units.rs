//! Pixel axis → physical units through a fitted calibration model.

use crate::fit::calibration::{CalibrationModel, NM_TO_WAVENUMBER};

/// Planck constant, J·s.
pub const PLANCK_H: f64 = 6.626e-34;
/// Speed of light, nm/s.
pub const SPEED_OF_LIGHT_NM: f64 = 2.99792458e17;
/// Joules per electron-volt.
pub const JOULE_PER_EV: f64 = 1.60218e-19;

pub fn to_wavelength_nm(pixels: &[f64], model: &CalibrationModel) -> Vec<f64> {
    model.apply(pixels)
}

/// Raman shift (cm⁻¹) relative to the laser line; positive on the Stokes side.
pub fn to_wavenumber_cm1(pixels: &[f64], model: &CalibrationModel, laser_nm: f64) -> Vec<f64> {
    to_wavelength_nm(pixels, model)
        .into_iter()
        .map(|nm| NM_TO_WAVENUMBER / laser_nm - NM_TO_WAVENUMBER / nm)
        .collect()
}

/// Photon energy (eV).
pub fn to_energy_ev(pixels: &[f64], model: &CalibrationModel) -> Vec<f64> {
    to_wavelength_nm(pixels, model)
        .into_iter()
        .map(|nm| PLANCK_H * SPEED_OF_LIGHT_NM / (nm * JOULE_PER_EV))
        .collect()
}

/// Inverse of the wavenumber conversion: shift (cm⁻¹) back to wavelength (nm).
pub fn wavenumber_to_wavelength_nm(shift_cm1: f64, laser_nm: f64) -> f64 {
    1.0 / (1.0 / laser_nm - shift_cm1 / NM_TO_WAVENUMBER)
}
