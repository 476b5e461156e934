//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimises `Σ (y_i - f(x_i; p))²` for a [`CurveModel`] with an analytic
//! gradient. Damping uses Marquardt's diagonal scaling; a step is only
//! accepted when it lowers the residual sum of squares.

use nalgebra::{DMatrix, DVector};

use crate::config::SolverSettings;
use crate::error::{CalError, Result};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
/// Gradient infinity-norm (relative to the cost) treated as stationary.
const GTOL: f64 = 1e-15;

/// A scalar model `f(x; p)` with a fixed number of free parameters.
pub trait CurveModel {
    fn n_params(&self) -> usize;

    fn eval(&self, x: f64, p: &[f64]) -> f64;

    /// Write `∂f/∂p_j` at `x` into `out` (length `n_params`).
    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]);
}

/// Outcome of a converged fit.
#[derive(Debug, Clone)]
pub struct LmFit {
    pub params: Vec<f64>,
    /// One-sigma errors from the scaled covariance; `None` when there are no
    /// degrees of freedom left.
    pub std_errors: Vec<Option<f64>>,
    /// Residual sum of squares at the solution.
    pub chi_square: f64,
    pub n_points: usize,
    pub iterations: usize,
    pub evaluations: usize,
}

impl LmFit {
    pub fn dof(&self) -> usize {
        self.n_points.saturating_sub(self.params.len())
    }

    pub fn reduced_chi_square(&self) -> Option<f64> {
        match self.dof() {
            0 => None,
            dof => Some(self.chi_square / dof as f64),
        }
    }
}

pub fn fit<M: CurveModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    initial: &[f64],
    settings: &SolverSettings,
) -> Result<LmFit> {
    let n = model.n_params();
    debug_assert_eq!(initial.len(), n);
    debug_assert_eq!(x.len(), y.len());
    if x.len() < n {
        return Err(CalError::FitConvergence(format!(
            "{} data points cannot determine {n} parameters",
            x.len()
        )));
    }

    let mut p = DVector::from_column_slice(initial);
    let mut cost = sum_of_squares(model, x, y, p.as_slice());
    let mut evaluations = 1;
    if !cost.is_finite() {
        return Err(CalError::FitConvergence(
            "model is not finite at the initial guess".to_string(),
        ));
    }

    let mut lambda = LAMBDA_INIT;
    let mut converged = false;
    let mut iterations = 0;

    'outer: while iterations < settings.max_iterations {
        iterations += 1;
        let (jtj, g) = normal_equations(model, x, y, p.as_slice());
        if g.amax() <= GTOL * cost.max(1.0) {
            converged = true;
            break;
        }

        loop {
            let mut damped = jtj.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * jtj[(i, i)].max(f64::MIN_POSITIVE);
            }
            let Some(chol) = damped.cholesky() else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    break 'outer;
                }
                continue;
            };
            let step = chol.solve(&g);
            let trial = &p + &step;
            let trial_cost = sum_of_squares(model, x, y, trial.as_slice());
            evaluations += 1;

            let step_small = step.norm() <= settings.xtol * (p.norm() + settings.xtol);
            if trial_cost < cost {
                let done = cost - trial_cost <= settings.ftol * cost || step_small;
                p = trial;
                cost = trial_cost;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                if done {
                    converged = true;
                    break 'outer;
                }
                break;
            }
            if step_small {
                // No representable improvement left.
                converged = true;
                break 'outer;
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break 'outer;
            }
        }
        log::trace!("lm iter {iterations}: cost {cost:.6e}, lambda {lambda:.1e}");
    }

    if !converged {
        return Err(CalError::FitConvergence(format!(
            "no convergence after {iterations} iterations (residual {cost:.4e})"
        )));
    }

    let (jtj, _) = normal_equations(model, x, y, p.as_slice());
    let covariance = jtj.try_inverse().ok_or_else(|| {
        CalError::FitConvergence("singular Jacobian at the solution".to_string())
    })?;
    let dof = x.len() - n;
    let std_errors = (0..n)
        .map(|i| {
            (dof > 0).then(|| (covariance[(i, i)].abs() * cost / dof as f64).sqrt())
        })
        .collect();

    log::debug!("lm converged in {iterations} iterations, {evaluations} evaluations, residual {cost:.4e}");
    Ok(LmFit {
        params: p.as_slice().to_vec(),
        std_errors,
        chi_square: cost,
        n_points: x.len(),
        iterations,
        evaluations,
    })
}

/// Coefficient of determination of a model against data.
pub fn r_squared(y: &[f64], chi_square: f64) -> f64 {
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    let total: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    if total > 0.0 {
        1.0 - chi_square / total
    } else {
        f64::NAN
    }
}

fn sum_of_squares<M: CurveModel>(model: &M, x: &[f64], y: &[f64], p: &[f64]) -> f64 {
    let total: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| (yi - model.eval(xi, p)).powi(2))
        .sum();
    if total.is_nan() {
        f64::INFINITY
    } else {
        total
    }
}

/// `JᵀJ` and `Jᵀr` with `J = ∂f/∂p` and `r = y - f`.
fn normal_equations<M: CurveModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    p: &[f64],
) -> (DMatrix<f64>, DVector<f64>) {
    let n = p.len();
    let mut jtj = DMatrix::zeros(n, n);
    let mut g = DVector::zeros(n);
    let mut grad = vec![0.0; n];
    for (&xi, &yi) in x.iter().zip(y) {
        let r = yi - model.eval(xi, p);
        model.gradient(xi, p, &mut grad);
        for i in 0..n {
            g[i] += grad[i] * r;
            for j in 0..=i {
                jtj[(i, j)] += grad[i] * grad[j];
            }
        }
    }
    for i in 0..n {
        for j in 0..i {
            jtj[(j, i)] = jtj[(i, j)];
        }
    }
    (jtj, g)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = a * exp(b * x)
    struct Exponential;

    impl CurveModel for Exponential {
        fn n_params(&self) -> usize {
            2
        }

        fn eval(&self, x: f64, p: &[f64]) -> f64 {
            p[0] * (p[1] * x).exp()
        }

        fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
            let e = (p[1] * x).exp();
            out[0] = e;
            out[1] = p[0] * x * e;
        }
    }

    #[test]
    fn test_recovers_exponential() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&x| 2.5 * (-1.3 * x).exp()).collect();
        let fit = fit(&Exponential, &x, &y, &[1.0, -0.5], &SolverSettings::default()).unwrap();
        assert!((fit.params[0] - 2.5).abs() < 1e-8, "{:?}", fit.params);
        assert!((fit.params[1] + 1.3).abs() < 1e-8, "{:?}", fit.params);
        assert!(fit.chi_square < 1e-16);
        assert_eq!(fit.dof(), 18);
        assert!(fit.std_errors.iter().all(|e| e.is_some()));
    }

    #[test]
    fn test_too_few_points() {
        let err = fit(&Exponential, &[1.0], &[2.0], &[1.0, 1.0], &SolverSettings::default());
        assert!(matches!(err, Err(CalError::FitConvergence(_))));
    }

    #[test]
    fn test_iteration_cap_reports_failure() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&x| 2.5 * (-1.3 * x).exp()).collect();
        let settings = SolverSettings {
            max_iterations: 1,
            ..Default::default()
        };
        let err = fit(&Exponential, &x, &y, &[1.0, 0.5], &settings);
        assert!(matches!(err, Err(CalError::FitConvergence(_))));
    }

    #[test]
    fn test_r_squared() {
        assert_eq!(r_squared(&[1.0, 2.0, 3.0], 0.0), 1.0);
        assert!((r_squared(&[1.0, 2.0, 3.0], 1.0) - 0.5).abs() < 1e-12);
        assert!(r_squared(&[2.0, 2.0], 0.0).is_nan());
    }
}
