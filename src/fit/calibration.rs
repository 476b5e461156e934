use std::fmt::{self, Write as _};

use statrs::distribution::{ContinuousCDF, StudentsT};

use super::lm::{self, CurveModel};
use super::peak::value_with_error;
use crate::config::SolverSettings;
use crate::error::{CalError, Result};

/// nm → cm⁻¹ factor in `1e7 / λ`.
pub const NM_TO_WAVENUMBER: f64 = 1e7;

/// Guards the t statistic when |r| is exactly one.
const TINY: f64 = 1.0e-20;

// ---------------------------------------------------------------------------
// Calibration families
// ---------------------------------------------------------------------------

/// Which quantity the reference list holds, and therefore which model is fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationMode {
    /// References are wavelengths (nm); ordinary least-squares line.
    #[default]
    Linear,
    /// References are Raman shifts (cm⁻¹) from a fixed laser line.
    Shift,
}

impl std::str::FromStr for CalibrationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "wavelength" => Ok(CalibrationMode::Linear),
            "shift" | "raman" => Ok(CalibrationMode::Shift),
            other => Err(format!("unknown calibration mode '{other}' (linear, shift)")),
        }
    }
}

/// Simple linear regression of wavelength on pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient.
    pub r: f64,
    /// Two-sided p-value for a zero slope.
    pub p: f64,
    /// Standard error of the slope.
    pub stderr: f64,
    pub intercept_stderr: f64,
}

/// `shift(x) = 1e7·(1/l − 1/(k·x + b))` with the laser line `l` held fixed.
/// `k·x + b` is the implied wavelength in nm.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftModel {
    pub k: f64,
    pub b: f64,
    pub laser_wavelength_nm: f64,
    pub k_stderr: Option<f64>,
    pub b_stderr: Option<f64>,
    pub chi_square: f64,
    pub r_squared: f64,
    pub n_points: usize,
    pub evaluations: usize,
}

impl ShiftModel {
    pub fn shift_at(&self, pixel: f64) -> f64 {
        ShiftCurve::new(self.laser_wavelength_nm).eval(pixel, &[self.k, self.b])
    }
}

/// A fitted pixel → wavelength mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationModel {
    Linear(LinearModel),
    Shift(ShiftModel),
}

impl CalibrationModel {
    pub fn mode(&self) -> CalibrationMode {
        match self {
            CalibrationModel::Linear(_) => CalibrationMode::Linear,
            CalibrationModel::Shift(_) => CalibrationMode::Shift,
        }
    }

    /// Wavelength (nm) at one pixel position.
    pub fn wavelength_at(&self, pixel: f64) -> f64 {
        match self {
            CalibrationModel::Linear(m) => m.slope * pixel + m.intercept,
            CalibrationModel::Shift(m) => m.k * pixel + m.b,
        }
    }

    /// Wavelength axis (nm) for a pixel axis.
    pub fn apply(&self, pixels: &[f64]) -> Vec<f64> {
        pixels.iter().map(|&x| self.wavelength_at(x)).collect()
    }
}

impl fmt::Display for CalibrationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationModel::Linear(m) => write!(
                f,
                "λ = {:.6}·x + {:.4} nm (r = {:.6})",
                m.slope, m.intercept, m.r
            ),
            CalibrationModel::Shift(m) => write!(
                f,
                "λ = {:.6}·x + {:.4} nm (laser {} nm)",
                m.k, m.b, m.laser_wavelength_nm
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Both lists need at least two entries, and the same number of them.
pub fn check_points(pixels: &[f64], references: &[f64]) -> Result<()> {
    let found = pixels.len().min(references.len());
    if found < 2 {
        return Err(CalError::InsufficientPoints { required: 2, found });
    }
    if pixels.len() != references.len() {
        return Err(CalError::LengthMismatch {
            pixels: pixels.len(),
            references: references.len(),
        });
    }
    Ok(())
}

/// Closed-form ordinary least squares, with the statistics `linregress` reports.
pub fn fit_linear(pixels: &[f64], references: &[f64]) -> Result<LinearModel> {
    check_points(pixels, references)?;
    let n = pixels.len() as f64;
    let x_mean = pixels.iter().sum::<f64>() / n;
    let y_mean = references.iter().sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&x, &y) in pixels.iter().zip(references) {
        let (dx, dy) = (x - x_mean, y - y_mean);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return Err(CalError::InsufficientPoints { required: 2, found: 1 });
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let (p, stderr, intercept_stderr) = if pixels.len() == 2 {
        let p = if references[0] == references[1] { 1.0 } else { 0.0 };
        (p, 0.0, 0.0)
    } else {
        let df = n - 2.0;
        let t = r * (df / ((1.0 - r + TINY) * (1.0 + r + TINY))).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| CalError::FitConvergence(e.to_string()))?;
        let p = 2.0 * dist.sf(t.abs());
        let stderr = ((1.0 - r * r) * syy / sxx / df).sqrt();
        let intercept_stderr = stderr * (sxx / n + x_mean * x_mean).sqrt();
        (p, stderr, intercept_stderr)
    };

    Ok(LinearModel {
        slope,
        intercept,
        r,
        p,
        stderr,
        intercept_stderr,
    })
}

/// Raman-shift curve with the laser line fixed; free parameters `[k, b]`.
#[derive(Debug, Clone, Copy)]
pub struct ShiftCurve {
    laser_nm: f64,
}

impl ShiftCurve {
    pub fn new(laser_nm: f64) -> Self {
        ShiftCurve { laser_nm }
    }
}

impl CurveModel for ShiftCurve {
    fn n_params(&self) -> usize {
        2
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        NM_TO_WAVENUMBER * (1.0 / self.laser_nm - 1.0 / (p[0] * x + p[1]))
    }

    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        let lambda = p[0] * x + p[1];
        let g = NM_TO_WAVENUMBER / (lambda * lambda);
        out[0] = g * x;
        out[1] = g;
    }
}

/// Nonlinear least-squares fit of `k, b` from the initial guess `k = 1, b = 1`.
pub fn fit_shift(
    pixels: &[f64],
    shifts: &[f64],
    laser_wavelength_nm: f64,
    settings: &SolverSettings,
) -> Result<ShiftModel> {
    check_points(pixels, shifts)?;
    let curve = ShiftCurve::new(laser_wavelength_nm);
    let result = lm::fit(&curve, pixels, shifts, &[1.0, 1.0], settings)?;
    Ok(ShiftModel {
        k: result.params[0],
        b: result.params[1],
        laser_wavelength_nm,
        k_stderr: result.std_errors[0],
        b_stderr: result.std_errors[1],
        chi_square: result.chi_square,
        r_squared: lm::r_squared(shifts, result.chi_square),
        n_points: result.n_points,
        evaluations: result.evaluations,
    })
}

/// Fit whichever family `mode` names.
pub fn fit_model(
    mode: CalibrationMode,
    pixels: &[f64],
    references: &[f64],
    laser_wavelength_nm: f64,
    settings: &SolverSettings,
) -> Result<CalibrationModel> {
    match mode {
        CalibrationMode::Linear => fit_linear(pixels, references).map(CalibrationModel::Linear),
        CalibrationMode::Shift => {
            fit_shift(pixels, references, laser_wavelength_nm, settings).map(CalibrationModel::Shift)
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Text saved as `_fit.cal`: model statistics followed by the point lists used.
pub fn calibration_report(model: &CalibrationModel, pixels: &[f64], references: &[f64]) -> String {
    let mut out = String::new();
    let reference_title = match model {
        CalibrationModel::Linear(m) => {
            let _ = writeln!(out, "Calibration result:");
            let _ = writeln!(out, "slope: {}", m.slope);
            let _ = writeln!(out, "intercept: {}", m.intercept);
            let _ = writeln!(out, "r value: {}", m.r);
            let _ = writeln!(out, "p value: {}", m.p);
            let _ = writeln!(out, "std err: {}", m.stderr);
            let _ = writeln!(out, "intercept std err: {}", m.intercept_stderr);
            let _ = writeln!(out);
            "Wavelength list:"
        }
        CalibrationModel::Shift(m) => {
            let dof = m.n_points.saturating_sub(2);
            let _ = writeln!(out, "[[Model]]");
            let _ = writeln!(out, "    shift = 1e7*(1/l - 1/(k*x + b))");
            let _ = writeln!(out, "[[Fit Statistics]]");
            let _ = writeln!(out, "    # function evals   = {}", m.evaluations);
            let _ = writeln!(out, "    # data points      = {}", m.n_points);
            let _ = writeln!(out, "    # variables        = 2");
            let _ = writeln!(out, "    chi-square         = {:.6e}", m.chi_square);
            if dof > 0 {
                let _ = writeln!(out, "    reduced chi-square = {:.6e}", m.chi_square / dof as f64);
            }
            let _ = writeln!(out, "    R-squared          = {:.8}", m.r_squared);
            let _ = writeln!(out, "[[Variables]]");
            let _ = writeln!(out, "    k:  {}  (init = 1)", value_with_error(m.k, m.k_stderr));
            let _ = writeln!(out, "    b:  {}  (init = 1)", value_with_error(m.b, m.b_stderr));
            let _ = writeln!(out, "    l:  {:.6} (fixed)", m.laser_wavelength_nm);
            let _ = writeln!(out);
            "Raman shift list:"
        }
    };

    let pixel_line: Vec<String> = pixels.iter().map(|p| format!("{p:.3}")).collect();
    let reference_line: Vec<String> = references.iter().map(|r| r.to_string()).collect();
    let _ = writeln!(out, "Pixel list:");
    let _ = writeln!(out, "{}", pixel_line.join(" "));
    let _ = writeln!(out, "{reference_title}");
    let _ = writeln!(out, "{}", reference_line.join(" "));
    out
}
