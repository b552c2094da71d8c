use std::{collections::HashMap, fmt, str::FromStr};

use lin_reg::{Fit, LinReg, NewtonRaphson, TikhonovRegularization};
use nalgebra::{DMatrix, DVector};

use crate::{Error, Link, Result};

/// The two supported classes of penalized regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// Ridge linear regression
    Linear,
    /// L2 regularized logistic regression
    Logistic,
}

impl ModelType {
    /// The inverse link applied to the linear predictor
    #[inline(always)]
    pub fn link(&self) -> Link {
        match self {
            ModelType::Linear => Link::Identity,
            ModelType::Logistic => Link::Logistic,
        }
    }

    /// Fit coefficients with the solver belonging to this model type.
    /// `start` and `max_iterations` only matter for logistic models.
    pub fn fit(
        &self,
        design: &DMatrix<f64>,
        targets: &DVector<f64>,
        lambda: f64,
        start: &DVector<f64>,
        max_iterations: usize,
    ) -> Result<Fit> {
        let fit = match self {
            ModelType::Linear => TikhonovRegularization {
                regularization_coeff: lambda,
            }
            .fit(design, targets, start)?,
            ModelType::Logistic => NewtonRaphson {
                regularization_coeff: lambda,
                max_iterations,
                ..Default::default()
            }
            .fit(design, targets, start)?,
        };
        Ok(fit)
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(ModelType::Linear),
            "logistic" => Ok(ModelType::Logistic),
            other => Err(Error::UnknownModelType(other.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Linear => write!(f, "linear"),
            ModelType::Logistic => write!(f, "logistic"),
        }
    }
}

/// The fitted weight of one covariate
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    /// Covariate label, unique within a model
    pub label: String,
    /// Current weight
    pub value: f64,
}

/// A single labeled training row
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    /// Identifier assigned by the store
    pub id: String,
    /// Identifier of the owning model
    pub model: String,
    /// Target value
    pub value: f64,
    /// Covariate values by label. Labels the model does not know are ignored,
    /// labels it knows but that are absent here count as 0.
    pub covariates: HashMap<String, f64>,
}

/// A regression model and its summary statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Identifier assigned by the store
    pub id: String,
    /// Which solver and link the model uses
    pub model_type: ModelType,
    /// Regularization strength
    pub lambda: f64,
    /// Coefficients in design column order. The labels never change after creation.
    pub coefficients: Vec<Coefficient>,
    /// Number of stored training rows
    pub num_training_data: usize,
    /// Changes whenever rows are added or dropped. A fit computed from an
    /// older version describes data the model no longer has.
    pub data_version: u64,
    /// Root mean squared error on the training rows, once learned
    pub train_rmse: Option<f64>,
    /// Cross validated root mean squared error, once computed
    pub cv_rmse: Option<f64>,
}

impl Model {
    /// Create a model with all coefficients at 0 and no training data
    pub fn new<S: Into<String>>(
        id: impl Into<String>,
        model_type: ModelType,
        labels: impl IntoIterator<Item = S>,
        lambda: f64,
    ) -> Self {
        let coefficients = labels
            .into_iter()
            .map(|label| Coefficient {
                label: label.into(),
                value: 0.0,
            })
            .collect();

        Self {
            id: id.into(),
            model_type,
            lambda,
            coefficients,
            num_training_data: 0,
            data_version: 0,
            train_rmse: None,
            cv_rmse: None,
        }
    }

    /// Number of covariates, fixed at creation
    #[inline(always)]
    pub fn num_covariates(&self) -> usize {
        self.coefficients.len()
    }

    /// The covariate labels in design column order
    pub fn labels(&self) -> Vec<&str> {
        self.coefficients.iter().map(|c| c.label.as_str()).collect()
    }

    /// The current coefficient values in design column order
    pub fn coefficient_vector(&self) -> DVector<f64> {
        DVector::from_iterator(self.num_covariates(), self.coefficients.iter().map(|c| c.value))
    }

    /// Replace every coefficient value and the training error at once
    pub fn replace_coefficients(&mut self, values: &DVector<f64>, train_rmse: f64) -> Result<()> {
        if values.len() != self.num_covariates() {
            return Err(Error::DimensionMismatch {
                expected: self.num_covariates(),
                got: values.len(),
            });
        }
        for (c, v) in self.coefficients.iter_mut().zip(values.iter()) {
            c.value = *v;
        }
        self.train_rmse = Some(train_rmse);
        Ok(())
    }

    /// Count one more training row
    pub fn record_datum(&mut self) {
        self.num_training_data += 1;
        self.data_version += 1;
    }

    /// Forget all training data: the row count and coefficient values go back
    /// to 0 while the labels stay
    pub fn reset(&mut self) {
        self.num_training_data = 0;
        self.data_version += 1;
        for c in self.coefficients.iter_mut() {
            c.value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_model_type() {
        assert_eq!("linear".parse::<ModelType>(), Ok(ModelType::Linear));
        assert_eq!("logistic".parse::<ModelType>(), Ok(ModelType::Logistic));
        assert_eq!(
            "poisson".parse::<ModelType>(),
            Err(Error::UnknownModelType("poisson".to_string()))
        );
        assert_eq!(ModelType::Logistic.to_string(), "logistic");
    }

    #[test]
    fn new_model_starts_empty() {
        let model = Model::new("m", ModelType::Linear, ["intercept", "age"], 0.1);

        assert_eq!(model.num_covariates(), 2);
        assert_eq!(model.labels(), vec!["intercept", "age"]);
        assert_eq!(model.coefficient_vector(), DVector::zeros(2));
        assert_eq!(model.num_training_data, 0);
        assert_eq!(model.data_version, 0);
        assert_eq!(model.train_rmse, None);
        assert_eq!(model.cv_rmse, None);
    }

    #[test]
    fn replace_and_reset() {
        let mut model = Model::new("m", ModelType::Logistic, ["a", "b"], 0.0);
        for _ in 0..4 {
            model.record_datum();
        }
        assert_eq!(model.num_training_data, 4);
        assert_eq!(model.data_version, 4);

        let values = DVector::from_vec(vec![1.5, -0.5]);
        model.replace_coefficients(&values, 0.25).unwrap();
        assert_eq!(model.coefficient_vector(), values);
        assert_eq!(model.train_rmse, Some(0.25));

        assert_eq!(
            model.replace_coefficients(&DVector::zeros(3), 0.0),
            Err(Error::DimensionMismatch {
                expected: 2,
                got: 3
            })
        );

        model.reset();
        assert_eq!(model.num_training_data, 0);
        // the same row count after a reset is a different dataset
        assert_eq!(model.data_version, 5);
        assert_eq!(model.coefficient_vector(), DVector::zeros(2));
        assert_eq!(model.labels(), vec!["a", "b"]);
    }

    #[test]
    fn fit_dispatches_by_type() {
        let design = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let targets = DVector::from_vec(vec![2.0, 4.0, 6.0]);
        let start = DVector::zeros(1);

        let fit = ModelType::Linear.fit(&design, &targets, 0.0, &start, 100).unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-12);
        assert!(fit.converged);

        let empty = DMatrix::<f64>::zeros(0, 1);
        assert_eq!(
            ModelType::Logistic.fit(&empty, &DVector::zeros(0), 0.0, &start, 100),
            Err(Error::EmptyDataset)
        );
    }
}
