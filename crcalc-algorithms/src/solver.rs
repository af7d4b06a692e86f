//! Levenberg-Marquardt minimizer for four-parameter least-squares problems.
//!
//! The Jacobian is estimated by central differences with a fixed step per
//! parameter. Every iteration either accepts a step that lowers the
//! objective (and relaxes the damping) or rejects it (and raises the
//! damping), so the iteration limit bounds the total work.

use crcalc_core::FitConfig;
use nalgebra::{Matrix4, Vector4};
use thiserror::Error;

const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const DIAGONAL_FLOOR: f64 = 1e-12;

/// A least-squares objective over four parameters.
///
/// The objective is the sum of squared residuals.
pub trait LeastSquaresProblem {
    /// Number of residual components.
    fn residual_count(&self) -> usize;

    /// Writes the residuals at `params` into `out` (`residual_count` long).
    fn residuals(&self, params: &Vector4<f64>, out: &mut [f64]);

    /// Objective value at `params`.
    fn evaluate(&self, params: &Vector4<f64>) -> f64 {
        let mut out = vec![0.0; self.residual_count()];
        self.residuals(params, &mut out);
        sum_of_squares(&out)
    }
}

/// A converged solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    /// Parameters at the minimum.
    pub params: Vector4<f64>,
    /// Objective value at the minimum.
    pub value: f64,
    /// Iterations used.
    pub iterations: usize,
}

/// Reasons the minimizer gives up.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverError {
    /// Iteration limit reached before any convergence test passed.
    #[error("no convergence after {0} iterations")]
    MaxIterations(usize),

    /// The objective is NaN or infinite at the starting point.
    #[error("objective is not finite at the starting point")]
    NonFinite,

    /// Damping grew without bound and no step lowered the objective.
    #[error("damping diverged without finding a descent step")]
    Stalled,
}

/// Damped Gauss-Newton minimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: FitConfig,
}

impl LevenbergMarquardt {
    /// Creates a minimizer with the given settings.
    #[must_use]
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Minimizes `problem` starting from `start`.
    ///
    /// # Errors
    /// Returns a [`SolverError`] if no convergence test passes.
    pub fn minimize<P>(&self, problem: &P, start: Vector4<f64>) -> Result<Minimum, SolverError>
    where
        P: LeastSquaresProblem + ?Sized,
    {
        let m = problem.residual_count();
        let mut residuals = vec![0.0; m];
        let mut trial_residuals = vec![0.0; m];
        let mut jacobian = vec![Vector4::zeros(); m];

        let mut params = start;
        problem.residuals(&params, &mut residuals);
        let mut cost = sum_of_squares(&residuals);
        if !cost.is_finite() {
            return Err(SolverError::NonFinite);
        }

        let mut lambda = self.config.initial_lambda;
        let mut jtj = Matrix4::zeros();
        let mut gradient = Vector4::zeros();
        let mut refresh = true;

        for iteration in 1..=self.config.max_iterations {
            if refresh {
                if cost <= f64::MIN_POSITIVE {
                    return Ok(Minimum {
                        params,
                        value: cost,
                        iterations: iteration - 1,
                    });
                }
                self.jacobian(problem, &params, &mut jacobian, &mut trial_residuals);
                (jtj, gradient) = normal_equations(&jacobian, &residuals);
                if gradient.amax() <= self.config.gtol {
                    return Ok(Minimum {
                        params,
                        value: cost,
                        iterations: iteration - 1,
                    });
                }
                refresh = false;
            }

            let mut damped = jtj;
            for k in 0..4 {
                damped[(k, k)] += lambda * jtj[(k, k)].max(DIAGONAL_FLOOR);
            }
            let Some(delta) = damped.cholesky().map(|c| c.solve(&-gradient)) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Err(SolverError::Stalled);
                }
                continue;
            };

            let trial = params + delta;
            problem.residuals(&trial, &mut trial_residuals);
            let trial_cost = sum_of_squares(&trial_residuals);
            let small_step =
                delta.norm() <= self.config.xtol * (params.norm() + self.config.xtol);

            if trial_cost.is_finite() && trial_cost < cost {
                let decrease = cost - trial_cost;
                let previous = cost;
                params = trial;
                cost = trial_cost;
                std::mem::swap(&mut residuals, &mut trial_residuals);
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                refresh = true;

                if small_step || decrease <= self.config.ftol * previous {
                    return Ok(Minimum {
                        params,
                        value: cost,
                        iterations: iteration,
                    });
                }
            } else {
                // No descent at a vanishing step: the current point is the minimum.
                if small_step {
                    return Ok(Minimum {
                        params,
                        value: cost,
                        iterations: iteration,
                    });
                }
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Err(SolverError::Stalled);
                }
            }
        }

        Err(SolverError::MaxIterations(self.config.max_iterations))
    }

    /// Central-difference Jacobian, one row per residual.
    fn jacobian<P>(
        &self,
        problem: &P,
        params: &Vector4<f64>,
        jacobian: &mut [Vector4<f64>],
        scratch: &mut [f64],
    ) where
        P: LeastSquaresProblem + ?Sized,
    {
        let h = self.config.step_size;
        let mut forward = vec![0.0; scratch.len()];

        for k in 0..4 {
            let mut plus = *params;
            plus[k] += h;
            let mut minus = *params;
            minus[k] -= h;

            problem.residuals(&plus, &mut forward);
            problem.residuals(&minus, scratch);

            for ((row, f), b) in jacobian.iter_mut().zip(&forward).zip(scratch.iter()) {
                row[k] = (f - b) / (2.0 * h);
            }
        }
    }
}

fn normal_equations(jacobian: &[Vector4<f64>], residuals: &[f64]) -> (Matrix4<f64>, Vector4<f64>) {
    let mut jtj = Matrix4::zeros();
    let mut gradient = Vector4::zeros();
    for (row, &r) in jacobian.iter().zip(residuals) {
        jtj += row * row.transpose();
        gradient += row * r;
    }
    (jtj, gradient)
}

fn sum_of_squares(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Residuals `params - target`.
    struct Bowl {
        target: Vector4<f64>,
    }

    impl LeastSquaresProblem for Bowl {
        fn residual_count(&self) -> usize {
            4
        }

        fn residuals(&self, params: &Vector4<f64>, out: &mut [f64]) {
            for (k, value) in out.iter_mut().enumerate() {
                *value = params[k] - self.target[k];
            }
        }
    }

    /// Two decoupled Rosenbrock valleys, minimum at (1, 1, 1, 1).
    struct Rosenbrock;

    impl LeastSquaresProblem for Rosenbrock {
        fn residual_count(&self) -> usize {
            4
        }

        fn residuals(&self, p: &Vector4<f64>, out: &mut [f64]) {
            out[0] = 10.0 * (p[1] - p[0] * p[0]);
            out[1] = 1.0 - p[0];
            out[2] = 10.0 * (p[3] - p[2] * p[2]);
            out[3] = 1.0 - p[2];
        }
    }

    struct NotANumber;

    impl LeastSquaresProblem for NotANumber {
        fn residual_count(&self) -> usize {
            1
        }

        fn residuals(&self, _params: &Vector4<f64>, out: &mut [f64]) {
            out[0] = f64::NAN;
        }
    }

    #[test]
    fn test_bowl_minimum() {
        let problem = Bowl {
            target: Vector4::new(1.0, -2.0, 3.0, 0.5),
        };
        let solver = LevenbergMarquardt::default();
        let min = solver.minimize(&problem, Vector4::zeros()).unwrap();

        for k in 0..4 {
            assert_abs_diff_eq!(min.params[k], problem.target[k], epsilon = 1e-9);
        }
        assert!(min.value < 1e-18);
    }

    #[test]
    fn test_rosenbrock_minimum() {
        let solver = LevenbergMarquardt::default();
        let start = Vector4::new(-1.2, 1.0, -1.2, 1.0);
        let min = solver.minimize(&Rosenbrock, start).unwrap();

        for k in 0..4 {
            assert_abs_diff_eq!(min.params[k], 1.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(Rosenbrock.evaluate(&min.params), min.value, epsilon = 1e-15);
    }

    #[test]
    fn test_iteration_limit() {
        let problem = Bowl {
            target: Vector4::new(5.0, 5.0, 5.0, 5.0),
        };
        let solver = LevenbergMarquardt::new(FitConfig::default().with_max_iterations(1));
        let result = solver.minimize(&problem, Vector4::zeros());
        assert_eq!(result, Err(SolverError::MaxIterations(1)));
    }

    #[test]
    fn test_non_finite_start() {
        let solver = LevenbergMarquardt::default();
        let result = solver.minimize(&NotANumber, Vector4::zeros());
        assert_eq!(result, Err(SolverError::NonFinite));
    }

    #[test]
    fn test_start_at_minimum() {
        let problem = Bowl {
            target: Vector4::new(1.0, 1.0, 1.0, 1.0),
        };
        let solver = LevenbergMarquardt::default();
        let min = solver.minimize(&problem, problem.target).unwrap();
        assert_eq!(min.iterations, 0);
        assert_eq!(min.params, problem.target);
    }
}
