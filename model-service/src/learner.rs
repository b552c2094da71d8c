use std::{collections::HashMap, sync::Arc};

use common::{build_design, covariate_row, rmse, ZeroFill};
use nalgebra::DVector;
use validation::{cross_validate, CvReport, KFold};

use crate::{ModelStore, ServiceResult};

/// Parameters of learning and cross validation
#[derive(Debug, Clone)]
pub struct LearnParams {
    /// Newton-Raphson iteration cap for logistic models
    pub max_iterations: usize,
    /// Fold count and shuffle seed of cross validation
    pub cv: KFold,
}

impl Default for LearnParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            cv: KFold::default(),
        }
    }
}

/// The outcome of a completed learn
#[derive(Debug, Clone, PartialEq)]
pub struct LearnReport {
    /// The new coefficients, in model coefficient order
    pub coefficients: DVector<f64>,
    /// RMSE of the new coefficients on all training rows
    pub train_rmse: f64,
    /// Whether the solver converged. Linear fits always do.
    pub converged: bool,
    /// Solver iterations, 0 for linear fits
    pub iterations: usize,
    /// Covariates the training rows lacked and that were taken as 0
    pub zero_fills: Vec<ZeroFill>,
}

/// A prediction together with the model covariates the input lacked
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted target, a probability for logistic models
    pub value: f64,
    /// Labels of the model that were absent from the input and taken as 0
    pub missing: Vec<String>,
}

/// Fits stored models and writes the results back to the store
#[derive(Debug)]
pub struct Learner<S> {
    store: Arc<S>,
    params: LearnParams,
}

impl<S> Clone for Learner<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            params: self.params.clone(),
        }
    }
}

impl<S> Learner<S>
where
    S: ModelStore,
{
    /// Create a new learner on top of `store`
    pub fn new(store: Arc<S>, params: LearnParams) -> Self {
        Self {
            store,
            params,
        }
    }

    /// The underlying store
    #[inline(always)]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The learn parameters
    #[inline(always)]
    pub fn params(&self) -> &LearnParams {
        &self.params
    }

    /// Refit a model on all of its training rows and persist the new
    /// coefficients and training error. Nothing is persisted on failure,
    /// nor when the rows changed while fitting.
    pub fn learn(&self, model_id: &str) -> ServiceResult<LearnReport> {
        let model = self.store.get_model(model_id)?;
        let data = self.store.data(model_id)?;
        let labels = model.labels();
        let dm = build_design(&labels, &data)?;

        // logistic fits continue from the current coefficients
        let fit = model.model_type.fit(
            &dm.design,
            &dm.targets,
            model.lambda,
            &model.coefficient_vector(),
            self.params.max_iterations,
        )?;
        let train_rmse = rmse(model.model_type, &fit.coefficients, &dm.design, &dm.targets)?;

        self.store.save_fit(model_id, model.data_version, &fit.coefficients, train_rmse)?;
        info!(
            "learned {} model {} on {} rows: train rmse {}, converged: {}",
            model.model_type,
            model_id,
            dm.nrows(),
            train_rmse,
            fit.converged
        );

        Ok(LearnReport {
            coefficients: fit.coefficients,
            train_rmse,
            converged: fit.converged,
            iterations: fit.iterations,
            zero_fills: dm.zero_fills,
        })
    }

    /// Cross validate a model on its training rows and persist the error.
    /// The coefficients stay untouched.
    pub fn cross_validate(&self, model_id: &str) -> ServiceResult<CvReport> {
        let model = self.store.get_model(model_id)?;
        let data = self.store.data(model_id)?;
        let dm = build_design(&model.labels(), &data)?;

        let report = cross_validate(
            model.model_type,
            &dm.design,
            &dm.targets,
            model.lambda,
            &self.params.cv,
        )?;
        self.store.save_cv(model_id, model.data_version, report.rmse)?;

        Ok(report)
    }

    /// Predict the target for a set of covariates with the stored coefficients.
    /// Covariates the model does not know are ignored, missing ones count as 0
    /// and are listed in the result.
    pub fn predict(
        &self,
        model_id: &str,
        covariates: &HashMap<String, f64>,
    ) -> ServiceResult<Prediction> {
        let model = self.store.get_model(model_id)?;
        let (row, missing) = covariate_row(&model.labels(), covariates);
        if !missing.is_empty() {
            debug!("model {}: predicting with {:?} taken as 0", model_id, missing);
        }
        let value = model.model_type.predict(&model.coefficient_vector(), &row)?;

        Ok(Prediction {
            value,
            missing,
        })
    }
}
