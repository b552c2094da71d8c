use nalgebra::{DMatrix, DVector};

use crate::{Error, ModelType, Result};

/// Predict the target of a covariate row, which has to be in coefficient order.
///
/// # Arguments
/// model_type: `linear` or `logistic`
/// coefficients: the fitted coefficient vector
/// row: covariate values, see [`covariate_row`](crate::covariate_row)
pub fn predict(model_type: &str, coefficients: &DVector<f64>, row: &DVector<f64>) -> Result<f64> {
    let model_type: ModelType = model_type.parse()?;
    model_type.predict(coefficients, row)
}

impl ModelType {
    /// Apply the coefficients to a single covariate row
    pub fn predict(&self, coefficients: &DVector<f64>, row: &DVector<f64>) -> Result<f64> {
        if coefficients.len() != row.len() {
            return Err(Error::DimensionMismatch {
                expected: coefficients.len(),
                got: row.len(),
            });
        }
        Ok(self.link().apply(coefficients.dot(row)))
    }
}

/// Root mean squared error of the predictions over all rows of `design`
pub fn rmse(
    model_type: ModelType,
    coefficients: &DVector<f64>,
    design: &DMatrix<f64>,
    targets: &DVector<f64>,
) -> Result<f64> {
    if design.nrows() == 0 {
        return Err(Error::EmptyDataset);
    }
    if design.ncols() != coefficients.len() {
        return Err(Error::DimensionMismatch {
            expected: design.ncols(),
            got: coefficients.len(),
        });
    }
    if design.nrows() != targets.len() {
        return Err(Error::DimensionMismatch {
            expected: design.nrows(),
            got: targets.len(),
        });
    }

    let mut predictions = design * coefficients;
    model_type.link().activate(predictions.as_mut_slice());

    let sse: f64 = predictions.iter().zip(targets.iter()).map(|(p, y)| (y - p).powi(2)).sum();

    Ok((sse / design.nrows() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use round::round;

    use super::*;

    #[test]
    fn linear_prediction_is_dot_product() {
        let beta = DVector::from_vec(vec![0.5, -2.0, 1.0]);
        let row = DVector::from_vec(vec![2.0, 1.5, -4.0]);

        assert_eq!(predict("linear", &beta, &row), Ok(beta.dot(&row)));
        assert_eq!(predict("linear", &beta, &row), Ok(-6.0));
    }

    #[test]
    fn logistic_prediction_in_unit_interval() {
        let beta = DVector::from_vec(vec![0.8, -1.1]);
        for x in [-10.0, -1.0, 0.0, 0.3, 5.0, 12.0] {
            let row = DVector::from_vec(vec![1.0, x]);
            let p = predict("logistic", &beta, &row).unwrap();
            assert!(p > 0.0 && p < 1.0);
        }
        let p = predict("logistic", &beta, &DVector::zeros(2)).unwrap();
        assert_eq!(p, 0.5);
    }

    #[test]
    fn unknown_model_type() {
        let beta = DVector::from_vec(vec![1.0]);
        assert_eq!(
            predict("poisson", &beta, &beta),
            Err(Error::UnknownModelType("poisson".to_string()))
        );
    }

    #[test]
    fn prediction_dimension_mismatch() {
        let beta = DVector::from_vec(vec![1.0, 2.0]);
        let row = DVector::from_vec(vec![1.0]);
        assert_eq!(
            ModelType::Linear.predict(&beta, &row),
            Err(Error::DimensionMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn rmse_is_zero_for_exact_predictions() {
        let design = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let beta = DVector::from_vec(vec![1.0, 2.0]);
        let targets = DVector::from_vec(vec![1.0, 3.0, 5.0]);

        assert_eq!(rmse(ModelType::Linear, &beta, &design, &targets), Ok(0.0));
    }

    #[test]
    fn rmse_averages_squared_errors() {
        let design = DMatrix::from_row_slice(4, 1, &[1.0, 1.0, 1.0, 1.0]);
        let beta = DVector::from_vec(vec![0.0]);
        let targets = DVector::from_vec(vec![1.0, -1.0, 1.0, -1.0]);

        // mean of squared errors is 1, a plain sum would give 2
        assert_eq!(rmse(ModelType::Linear, &beta, &design, &targets), Ok(1.0));

        // logistic predictions are all 0.5
        let targets = DVector::from_vec(vec![1.0, 0.0, 1.0, 0.0]);
        let err = rmse(ModelType::Logistic, &beta, &design, &targets).unwrap();
        assert_eq!(round(err, 6), 0.5);
    }

    #[test]
    fn rmse_rejects_empty_and_mismatched() {
        let beta = DVector::from_vec(vec![1.0]);
        assert_eq!(
            rmse(ModelType::Linear, &beta, &DMatrix::zeros(0, 1), &DVector::zeros(0)),
            Err(Error::EmptyDataset)
        );
        assert_eq!(
            rmse(ModelType::Linear, &beta, &DMatrix::zeros(2, 2), &DVector::zeros(2)),
            Err(Error::DimensionMismatch {
                expected: 2,
                got: 1
            })
        );
    }
}
