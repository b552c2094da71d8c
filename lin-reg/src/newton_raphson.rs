use nalgebra::{DMatrix, DVector};

use super::{add_ridge, check_lambda, check_shapes, invert, Fit, LinReg, LinRegError};

/// The logistic function, `1 / (1 + e^-z)`
#[inline]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        // same value, without overflowing exp for very negative z
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// L2 penalized logistic regression, fitted by Newton-Raphson
/// (iteratively reweighted least squares).
///
/// Each iteration computes the fitted probabilities `p = sigmoid(X beta)`, the
/// gradient `g = X'(y - p) - lambda beta` and the penalized Hessian
/// `H = X'WX + lambda I` with `W = diag(p (1 - p))`, then steps
/// `beta += H^-1 g`.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    /// Ridge parameter, 0 yields unpenalized logistic regression
    pub regularization_coeff: f64,
    /// Upper bound on the number of Newton steps
    pub max_iterations: usize,
    /// The iteration stops once the euclidean norm of a step drops below this
    pub tolerance: f64,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self {
            regularization_coeff: 0.0,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

impl LinReg for NewtonRaphson {
    fn fit(
        &self,
        design: &DMatrix<f64>,
        targets: &DVector<f64>,
        start: &DVector<f64>,
    ) -> Result<Fit, LinRegError> {
        check_shapes(design, targets)?;
        check_lambda(self.regularization_coeff)?;
        let (n, p) = design.shape();
        if start.len() != p {
            return Err(LinRegError::DimensionMismatch {
                expected: p,
                got: start.len(),
            });
        }

        let mut beta = start.clone();
        if p >= n {
            warn!(
                "{} covariates but only {} rows, keeping the starting coefficients",
                p, n
            );
            return Ok(Fit {
                coefficients: beta,
                converged: false,
                iterations: 0,
            });
        }

        for iteration in 1..=self.max_iterations {
            let probs: DVector<f64> = (design * &beta).map(sigmoid);

            let gradient = design.tr_mul(&(targets - &probs)) - &beta * self.regularization_coeff;

            let mut weighted = design.clone();
            for (i, prob) in probs.iter().enumerate() {
                let w = prob * (1.0 - prob);
                for j in 0..p {
                    weighted[(i, j)] *= w;
                }
            }
            let hessian = add_ridge(design.tr_mul(&weighted), self.regularization_coeff);

            let step = invert(hessian)? * gradient;
            beta += &step;

            let step_norm = step.norm();
            trace!("iteration {}: step norm {}", iteration, step_norm);
            if !step_norm.is_finite() {
                return Err(LinRegError::SingularMatrix);
            }
            if step_norm < self.tolerance {
                info!("converged after {} iterations", iteration);
                return Ok(Fit {
                    coefficients: beta,
                    converged: true,
                    iterations: iteration,
                });
            }
        }

        warn!("did not converge after {} iterations", self.max_iterations);
        Ok(Fit {
            coefficients: beta,
            converged: false,
            iterations: self.max_iterations,
        })
    }
}
