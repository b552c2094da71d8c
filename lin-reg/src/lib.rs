//! Penalized regression solvers over dense `nalgebra` matrices

#![warn(missing_docs)]

#[macro_use]
extern crate log;

use nalgebra::{DMatrix, DVector};

mod error;
mod newton_raphson;
mod tikhonov_regularization;

pub use error::LinRegError;
pub use newton_raphson::{sigmoid, NewtonRaphson};
pub use tikhonov_regularization::TikhonovRegularization;

/// The outcome of fitting a coefficient vector
#[derive(Debug, Clone, PartialEq)]
pub struct Fit {
    /// One coefficient per design column
    pub coefficients: DVector<f64>,
    /// Whether the method reached its convergence criterion.
    /// Always true for closed form solutions.
    pub converged: bool,
    /// Number of iterations performed, 0 for closed form solutions
    pub iterations: usize,
}

/// Generic way of performing a regression and fitting the coefficient vector
pub trait LinReg: Clone {
    /// Fit a coefficient vector, mapping the rows of `design` onto `targets`
    ///
    /// # Parameters
    /// design: n x p matrix, one row per observation, one column per covariate
    /// targets: n target values
    /// start: p starting coefficients, used by iterative methods and ignored
    /// by closed form ones
    fn fit(
        &self,
        design: &DMatrix<f64>,
        targets: &DVector<f64>,
        start: &DVector<f64>,
    ) -> Result<Fit, LinRegError>;
}

/// Closed form ridge regression, `(X'X + lambda I)^-1 X'y`
pub fn fit_linear(
    design: &DMatrix<f64>,
    targets: &DVector<f64>,
    lambda: f64,
) -> Result<DVector<f64>, LinRegError> {
    let regressor = TikhonovRegularization {
        regularization_coeff: lambda,
    };
    let start = DVector::zeros(design.ncols());

    Ok(regressor.fit(design, targets, &start)?.coefficients)
}

/// L2 penalized logistic regression via Newton-Raphson.
/// Returns the coefficients and whether the iteration converged.
pub fn fit_logistic(
    design: &DMatrix<f64>,
    targets: &DVector<f64>,
    lambda: f64,
    beta_start: &DVector<f64>,
    max_iterations: usize,
) -> Result<(DVector<f64>, bool), LinRegError> {
    let regressor = NewtonRaphson {
        regularization_coeff: lambda,
        max_iterations,
        ..Default::default()
    };
    let fit = regressor.fit(design, targets, beta_start)?;

    Ok((fit.coefficients, fit.converged))
}

/// Rejects empty designs and designs whose row count disagrees with the targets
pub(crate) fn check_shapes(
    design: &DMatrix<f64>,
    targets: &DVector<f64>,
) -> Result<(), LinRegError> {
    if design.nrows() == 0 {
        return Err(LinRegError::EmptyDataset);
    }
    if design.nrows() != targets.len() {
        return Err(LinRegError::DimensionMismatch {
            expected: design.nrows(),
            got: targets.len(),
        });
    }
    Ok(())
}

/// Accepts finite, non-negative ridge parameters only
pub(crate) fn check_lambda(lambda: f64) -> Result<(), LinRegError> {
    if lambda.is_finite() && lambda >= 0.0 {
        Ok(())
    } else {
        Err(LinRegError::InvalidLambda(lambda))
    }
}

/// Adds `lambda` onto the diagonal of a square matrix
pub(crate) fn add_ridge(mut m: DMatrix<f64>, lambda: f64) -> DMatrix<f64> {
    for j in 0..m.ncols().min(m.nrows()) {
        m[(j, j)] += lambda;
    }
    m
}

/// Inverts `m`, treating a missing or non-finite inverse as singular
pub(crate) fn invert(m: DMatrix<f64>) -> Result<DMatrix<f64>, LinRegError> {
    match m.try_inverse() {
        Some(inv) if inv.iter().all(|v| v.is_finite()) => Ok(inv),
        _ => Err(LinRegError::SingularMatrix),
    }
}
