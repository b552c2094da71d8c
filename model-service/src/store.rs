use std::{
    collections::{HashMap, HashSet},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use common::{Datum, Model, ModelType};
use nalgebra::DVector;

use crate::{ServiceError, ServiceResult};

/// Persistence of models, their coefficients and their training rows.
/// Handed to the [`Learner`](crate::Learner) explicitly, there is no global store.
pub trait ModelStore: Send + Sync {
    /// Create a model with zero coefficients for the given, unique, labels.
    /// `lambda` has to be finite and non-negative.
    fn create_model(
        &self,
        model_type: ModelType,
        labels: &[String],
        lambda: f64,
    ) -> ServiceResult<Model>;

    /// Fetch a model
    fn get_model(&self, id: &str) -> ServiceResult<Model>;

    /// All stored models
    fn list_models(&self) -> ServiceResult<Vec<Model>>;

    /// Remove a model together with its training rows
    fn delete_model(&self, id: &str) -> ServiceResult<()>;

    /// Store a training row and bump the model's row count
    fn add_datum(
        &self,
        model_id: &str,
        value: f64,
        covariates: HashMap<String, f64>,
    ) -> ServiceResult<Datum>;

    /// Fetch a single training row
    fn get_datum(&self, id: &str) -> ServiceResult<Datum>;

    /// All training rows of a model
    fn data(&self, model_id: &str) -> ServiceResult<Vec<Datum>>;

    /// Replace the whole coefficient vector and the training error.
    /// Fails with [`ServiceError::StaleData`] unless the model's
    /// `data_version` still equals the one the fit was computed from.
    fn save_fit(
        &self,
        model_id: &str,
        data_version: u64,
        coefficients: &DVector<f64>,
        train_rmse: f64,
    ) -> ServiceResult<Model>;

    /// Replace the cross validated error, guarded like [`ModelStore::save_fit`]
    fn save_cv(&self, model_id: &str, data_version: u64, cv_rmse: f64) -> ServiceResult<Model>;

    /// Drop all training rows, zeroing the coefficients but keeping their labels
    fn delete_data(&self, model_id: &str) -> ServiceResult<Model>;
}

#[derive(Debug, Default)]
struct Inner {
    models: HashMap<String, Model>,
    data: HashMap<String, Vec<Datum>>,
    next_id: u64,
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn model_mut(&mut self, id: &str) -> ServiceResult<&mut Model> {
        self.models.get_mut(id).ok_or_else(|| ServiceError::ModelNotFound(id.to_string()))
    }

    /// The model, provided its rows are still at `data_version`
    fn current_model_mut(&mut self, id: &str, data_version: u64) -> ServiceResult<&mut Model> {
        let model = self.model_mut(id)?;
        if model.data_version != data_version {
            warn!(
                "discarding result for model {}: data version {} is now {}",
                id, data_version, model.data_version
            );
            return Err(ServiceError::StaleData {
                model: id.to_string(),
                expected: data_version,
                found: model.data_version,
            });
        }
        Ok(model)
    }
}

/// A [`ModelStore`] keeping everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> ServiceResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| ServiceError::StorePoisoned)
    }

    fn write(&self) -> ServiceResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| ServiceError::StorePoisoned)
    }
}

impl ModelStore for MemoryStore {
    fn create_model(
        &self,
        model_type: ModelType,
        labels: &[String],
        lambda: f64,
    ) -> ServiceResult<Model> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(common::Error::InvalidLambda(lambda).into());
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for label in labels {
            if !seen.insert(label.as_str()) {
                return Err(ServiceError::DuplicateCovariate(label.clone()));
            }
        }

        let mut inner = self.write()?;
        let id = inner.next_id("model");
        let model = Model::new(id.clone(), model_type, labels.iter().cloned(), lambda);
        inner.models.insert(id.clone(), model.clone());
        inner.data.insert(id, vec![]);
        info!("created {} model {} with {} covariates", model_type, model.id, labels.len());

        Ok(model)
    }

    fn get_model(&self, id: &str) -> ServiceResult<Model> {
        self.read()?
            .models
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::ModelNotFound(id.to_string()))
    }

    fn list_models(&self) -> ServiceResult<Vec<Model>> {
        let mut models: Vec<Model> = self.read()?.models.values().cloned().collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(models)
    }

    fn delete_model(&self, id: &str) -> ServiceResult<()> {
        let mut inner = self.write()?;
        if inner.models.remove(id).is_none() {
            return Err(ServiceError::ModelNotFound(id.to_string()));
        }
        inner.data.remove(id);
        info!("deleted model {}", id);
        Ok(())
    }

    fn add_datum(
        &self,
        model_id: &str,
        value: f64,
        covariates: HashMap<String, f64>,
    ) -> ServiceResult<Datum> {
        let mut inner = self.write()?;
        inner.model_mut(model_id)?.record_datum();

        let datum = Datum {
            id: inner.next_id("datum"),
            model: model_id.to_string(),
            value,
            covariates,
        };
        inner.data.entry(model_id.to_string()).or_default().push(datum.clone());

        Ok(datum)
    }

    fn get_datum(&self, id: &str) -> ServiceResult<Datum> {
        self.read()?
            .data
            .values()
            .flatten()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::DatumNotFound(id.to_string()))
    }

    fn data(&self, model_id: &str) -> ServiceResult<Vec<Datum>> {
        let inner = self.read()?;
        if !inner.models.contains_key(model_id) {
            return Err(ServiceError::ModelNotFound(model_id.to_string()));
        }
        Ok(inner.data.get(model_id).cloned().unwrap_or_default())
    }

    fn save_fit(
        &self,
        model_id: &str,
        data_version: u64,
        coefficients: &DVector<f64>,
        train_rmse: f64,
    ) -> ServiceResult<Model> {
        let mut inner = self.write()?;
        let model = inner.current_model_mut(model_id, data_version)?;
        model.replace_coefficients(coefficients, train_rmse)?;
        Ok(model.clone())
    }

    fn save_cv(&self, model_id: &str, data_version: u64, cv_rmse: f64) -> ServiceResult<Model> {
        let mut inner = self.write()?;
        let model = inner.current_model_mut(model_id, data_version)?;
        model.cv_rmse = Some(cv_rmse);
        Ok(model.clone())
    }

    fn delete_data(&self, model_id: &str) -> ServiceResult<Model> {
        let mut inner = self.write()?;
        let model = inner.model_mut(model_id)?;
        model.reset();
        let model = model.clone();
        inner.data.insert(model_id.to_string(), vec![]);
        info!("deleted all data of model {}", model_id);
        Ok(model)
    }
}
