use nalgebra::{DMatrix, DVector};

use super::{add_ridge, check_lambda, check_shapes, invert, Fit, LinReg, LinRegError};

/// Tikhonov regularization aka ridge regression
/// It is particularly useful to mitigate the problem of multicollinearity in
/// linear regression
#[derive(Debug, Clone, Default)]
pub struct TikhonovRegularization {
    /// Ridge parameter, 0 yields ordinary least squares
    pub regularization_coeff: f64,
}

impl LinReg for TikhonovRegularization {
    fn fit(
        &self,
        design: &DMatrix<f64>,
        targets: &DVector<f64>,
        _start: &DVector<f64>,
    ) -> Result<Fit, LinRegError> {
        check_shapes(design, targets)?;
        check_lambda(self.regularization_coeff)?;

        let p0 = add_ridge(design.tr_mul(design), self.regularization_coeff);
        let p1 = invert(p0)?;
        let p2 = design.tr_mul(targets);

        let coefficients = p1 * p2;
        if coefficients.iter().any(|v| !v.is_finite()) {
            return Err(LinRegError::SingularMatrix);
        }
        debug!(
            "ridge fit on {}x{} design, lambda: {}",
            design.nrows(),
            design.ncols(),
            self.regularization_coeff
        );

        Ok(Fit {
            coefficients,
            converged: true,
            iterations: 0,
        })
    }
}
