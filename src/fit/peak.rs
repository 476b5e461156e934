use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use super::lm::{self, CurveModel};
use crate::config::SolverSettings;
use crate::data::model::{SelectionWindow, Spectrum};
use crate::error::{CalError, Result};

/// `2·sqrt(2·ln 2)`: Gaussian FWHM per unit sigma.
const GAUSSIAN_FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

// ---------------------------------------------------------------------------
// PeakShape – the selectable single-peak models
// ---------------------------------------------------------------------------

/// Single peak on a constant baseline. Parameters are ordered
/// `[center, sigma, amplitude, offset]`.
///
/// * Gaussian:   `offset + amplitude·exp(-½(x-center)²/sigma²)`
/// * Lorentzian: `offset + amplitude/((x-center)² + (sigma/2)²)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakShape {
    #[default]
    Gaussian,
    Lorentzian,
}

impl fmt::Display for PeakShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakShape::Gaussian => write!(f, "Gaussian"),
            PeakShape::Lorentzian => write!(f, "Lorentzian"),
        }
    }
}

impl std::str::FromStr for PeakShape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" | "gauss" => Ok(PeakShape::Gaussian),
            "lorentzian" | "lorentz" => Ok(PeakShape::Lorentzian),
            other => Err(format!("unknown peak shape '{other}' (gaussian, lorentzian)")),
        }
    }
}

impl CurveModel for PeakShape {
    fn n_params(&self) -> usize {
        4
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        let (center, sigma, amplitude, offset) = (p[0], p[1], p[2], p[3]);
        let dx = x - center;
        match self {
            PeakShape::Gaussian => offset + amplitude * (-0.5 * dx * dx / (sigma * sigma)).exp(),
            PeakShape::Lorentzian => {
                let half = 0.5 * sigma;
                offset + amplitude / (dx * dx + half * half)
            }
        }
    }

    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        let (center, sigma, amplitude) = (p[0], p[1], p[2]);
        let dx = x - center;
        match self {
            PeakShape::Gaussian => {
                let s2 = sigma * sigma;
                let e = (-0.5 * dx * dx / s2).exp();
                out[0] = amplitude * e * dx / s2;
                out[1] = amplitude * e * dx * dx / (s2 * sigma);
                out[2] = e;
            }
            PeakShape::Lorentzian => {
                let half = 0.5 * sigma;
                let d = dx * dx + half * half;
                let d2 = d * d;
                out[0] = 2.0 * amplitude * dx / d2;
                out[1] = -amplitude * half / d2;
                out[2] = 1.0 / d;
            }
        }
        out[3] = 1.0;
    }
}

// ---------------------------------------------------------------------------
// PeakFit – result of one fit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakParams {
    pub center: f64,
    pub sigma: f64,
    pub amplitude: f64,
    pub offset: f64,
}

impl PeakParams {
    fn from_slice(p: &[f64]) -> Self {
        PeakParams {
            center: p[0],
            sigma: p[1],
            amplitude: p[2],
            offset: p[3],
        }
    }

    fn to_array(self) -> [f64; 4] {
        [self.center, self.sigma, self.amplitude, self.offset]
    }
}

#[derive(Debug, Clone)]
pub struct PeakFit {
    pub shape: PeakShape,
    pub window: SelectionWindow,
    pub initial: PeakParams,
    pub params: PeakParams,
    /// Standard errors in `[center, sigma, amplitude, offset]` order.
    pub std_errors: [Option<f64>; 4],
    pub n_points: usize,
    pub chi_square: f64,
    pub reduced_chi_square: Option<f64>,
    pub r_squared: f64,
    pub evaluations: usize,
}

impl PeakFit {
    /// Fitted peak position, the value accepted as a calibration pixel.
    pub fn center(&self) -> f64 {
        self.params.center
    }

    pub fn fwhm(&self) -> f64 {
        match self.shape {
            PeakShape::Gaussian => GAUSSIAN_FWHM_PER_SIGMA * self.params.sigma,
            PeakShape::Lorentzian => self.params.sigma,
        }
    }

    /// One-line summary shown next to the spectrum.
    pub fn location_label(&self) -> String {
        format!("Current peak location: {:.3}", self.center())
    }

    /// Multi-line fit report.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[[Model]]");
        let _ = writeln!(out, "    {} peak + constant baseline", self.shape);
        let _ = writeln!(out, "[[Fit Statistics]]");
        let _ = writeln!(out, "    fit window         = {}", self.window);
        let _ = writeln!(out, "    # function evals   = {}", self.evaluations);
        let _ = writeln!(out, "    # data points      = {}", self.n_points);
        let _ = writeln!(out, "    # variables        = 4");
        let _ = writeln!(out, "    chi-square         = {:.6e}", self.chi_square);
        match self.reduced_chi_square {
            Some(v) => {
                let _ = writeln!(out, "    reduced chi-square = {v:.6e}");
            }
            None => {
                let _ = writeln!(out, "    reduced chi-square = (no degrees of freedom)");
            }
        }
        let _ = writeln!(out, "    R-squared          = {:.8}", self.r_squared);
        let _ = writeln!(out, "[[Variables]]");
        let names = ["center", "sigma", "amplitude", "offset"];
        let values = self.params.to_array();
        let initial = self.initial.to_array();
        for i in 0..4 {
            let _ = writeln!(
                out,
                "    {:<10} {}  (init = {:.6})",
                format!("{}:", names[i]),
                value_with_error(values[i], self.std_errors[i]),
                initial[i]
            );
        }
        let _ = writeln!(out, "    {:<10} {:.6}", "fwhm:", self.fwhm());
        out
    }
}

/// `value +/- err (rel%)`, as lmfit prints it.
pub(crate) fn value_with_error(value: f64, err: Option<f64>) -> String {
    match err {
        Some(e) if value != 0.0 => {
            format!("{value:.6} +/- {e:.6} ({:.2}%)", 100.0 * e / value.abs())
        }
        Some(e) => format!("{value:.6} +/- {e:.6}"),
        None => format!("{value:.6} +/- (not estimated)"),
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Starting point for the solver. Center at the most intense pixel of the
/// window, unit width, baseline at the window minimum, and an amplitude that
/// makes the initial peak height equal to `max - min`.
pub fn initial_guess(shape: PeakShape, x: &[f64], y: &[f64]) -> PeakParams {
    let (mut min, mut max, mut argmax) = (f64::INFINITY, f64::NEG_INFINITY, 0);
    for (i, &v) in y.iter().enumerate() {
        min = min.min(v);
        if v > max {
            max = v;
            argmax = i;
        }
    }
    let sigma = 1.0;
    let height = max - min;
    let amplitude = match shape {
        PeakShape::Gaussian => height,
        PeakShape::Lorentzian => height * (0.5 * sigma) * (0.5 * sigma),
    };
    PeakParams {
        center: x[argmax],
        sigma,
        amplitude,
        offset: min,
    }
}

/// Fit one peak to the part of `spectrum` inside `window`.
pub fn fit_peak(
    spectrum: &Spectrum,
    window: SelectionWindow,
    shape: PeakShape,
    settings: &SolverSettings,
) -> Result<PeakFit> {
    let (x, y) = spectrum.windowed(window);
    let n = shape.n_params();
    if x.len() < n {
        return Err(CalError::Selection(format!(
            "window {window} holds {} points, at least {n} are needed",
            x.len()
        )));
    }

    let initial = initial_guess(shape, &x, &y);
    let result = lm::fit(&shape, &x, &y, &initial.to_array(), settings)?;

    let mut params = PeakParams::from_slice(&result.params);
    // Both models depend on sigma only through its square.
    params.sigma = params.sigma.abs();
    if !params.center.is_finite() || params.sigma == 0.0 {
        return Err(CalError::FitConvergence(
            "fit collapsed to a degenerate peak".to_string(),
        ));
    }

    let std_errors = [
        result.std_errors[0],
        result.std_errors[1],
        result.std_errors[2],
        result.std_errors[3],
    ];
    log::debug!(
        "{shape} fit in {window}: center {:.4}, sigma {:.4}, {} iterations",
        params.center,
        params.sigma,
        result.iterations
    );

    Ok(PeakFit {
        shape,
        window,
        initial,
        params,
        std_errors,
        n_points: result.n_points,
        chi_square: result.chi_square,
        reduced_chi_square: result.reduced_chi_square(),
        r_squared: lm::r_squared(&y, result.chi_square),
        evaluations: result.evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(shape: PeakShape, truth: [f64; 4]) -> Spectrum {
        let y = (0..1024).map(|i| shape.eval(i as f64, &truth)).collect();
        Spectrum::from_intensities(y).unwrap()
    }

    fn assert_rel(actual: f64, expected: f64, tol: f64) {
        assert!(
            ((actual - expected) / expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_gaussian_recovers_parameters() {
        let sp = synthetic(PeakShape::Gaussian, [512.0, 5.0, 100.0, 10.0]);
        let fit = fit_peak(
            &sp,
            SelectionWindow::new(480.0, 544.0),
            PeakShape::Gaussian,
            &SolverSettings::default(),
        )
        .unwrap();
        assert_rel(fit.params.center, 512.0, 1e-3);
        assert_rel(fit.params.sigma, 5.0, 1e-3);
        assert_rel(fit.params.amplitude, 100.0, 1e-3);
        assert_rel(fit.params.offset, 10.0, 1e-3);
        assert_eq!(fit.n_points, 64);
        assert!(fit.r_squared > 0.999_999);
    }

    #[test]
    fn test_gaussian_off_center_peak() {
        let sp = synthetic(PeakShape::Gaussian, [498.7, 5.0, 100.0, 10.0]);
        let fit = fit_peak(
            &sp,
            SelectionWindow::new(544.0, 480.0),
            PeakShape::Gaussian,
            &SolverSettings::default(),
        )
        .unwrap();
        assert!((fit.center() - 498.7).abs() < 1e-6, "{}", fit.center());
        assert!((fit.fwhm() - 5.0 * GAUSSIAN_FWHM_PER_SIGMA).abs() < 1e-5);
    }

    #[test]
    fn test_lorentzian_recovers_parameters() {
        let sp = synthetic(PeakShape::Lorentzian, [507.4, 6.0, 900.0, 10.0]);
        let fit = fit_peak(
            &sp,
            SelectionWindow::new(480.0, 544.0),
            PeakShape::Lorentzian,
            &SolverSettings::default(),
        )
        .unwrap();
        assert_rel(fit.params.center, 507.4, 1e-6);
        assert_rel(fit.params.sigma, 6.0, 1e-6);
        assert_rel(fit.params.amplitude, 900.0, 1e-6);
        assert_rel(fit.params.offset, 10.0, 1e-6);
        assert_rel(fit.fwhm(), 6.0, 1e-6);
    }

    #[test]
    fn test_initial_guess_policy() {
        let x = [10.0, 11.0, 12.0, 13.0];
        let y = [2.0, 9.0, 5.0, 3.0];
        let g = initial_guess(PeakShape::Gaussian, &x, &y);
        assert_eq!(g, PeakParams { center: 11.0, sigma: 1.0, amplitude: 7.0, offset: 2.0 });
        let l = initial_guess(PeakShape::Lorentzian, &x, &y);
        assert_eq!(l.amplitude, 7.0 * 0.25);
        // Peak height of the Lorentzian guess equals max - min.
        assert_eq!(PeakShape::Lorentzian.eval(11.0, &l.to_array()) - l.offset, 7.0);
    }

    #[test]
    fn test_empty_window_is_selection_error() {
        let sp = synthetic(PeakShape::Gaussian, [512.0, 5.0, 100.0, 10.0]);
        let err = fit_peak(
            &sp,
            SelectionWindow::new(2000.0, 2100.0),
            PeakShape::Gaussian,
            &SolverSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CalError::Selection(_)));

        let err = fit_peak(
            &sp,
            SelectionWindow::new(10.0, 12.5),
            PeakShape::Gaussian,
            &SolverSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CalError::Selection(_)));
    }

    #[test]
    fn test_report_contents() {
        let sp = synthetic(PeakShape::Gaussian, [300.25, 3.5, 2500.0, 120.0]);
        let fit = fit_peak(
            &sp,
            SelectionWindow::new(280.0, 320.0),
            PeakShape::Gaussian,
            &SolverSettings::default(),
        )
        .unwrap();
        let report = fit.report();
        assert!(report.contains("Gaussian peak + constant baseline"));
        assert!(report.contains("# data points      = 40"));
        assert!(report.contains("center:"));
        assert_eq!(fit.location_label(), "Current peak location: 300.250");
    }

    #[test]
    fn test_shape_parsing() {
        assert_eq!("Lorentzian".parse::<PeakShape>().unwrap(), PeakShape::Lorentzian);
        assert_eq!("gauss".parse::<PeakShape>().unwrap(), PeakShape::Gaussian);
        assert!("voigt".parse::<PeakShape>().is_err());
    }
}
