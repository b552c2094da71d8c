#[macro_use]
extern crate log;

use std::{collections::HashMap, env, error::Error, fs::File, sync::Arc, time::Instant};

use common::ModelType;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use lin_reg::sigmoid;
use model_service::{
    EnqueueOutcome, LearnParams, LearnQueue, Learner, MemoryStore, ModelStore, DEFAULT_CAPACITY,
};
use nanorand::{Rng, WyRand};
use validation::KFold;

const NUM_ROWS: usize = 200;
const SEED: Option<u64> = Some(0);

type Rows = Vec<(f64, HashMap<String, f64>)>;

/// Fits a model on a csv file given as the first argument, or on generated data.
/// The csv needs a `value` column, every other column is a covariate and empty
/// cells are left out of the row.
pub(crate) fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let types = vec!["linear", "logistic"];
    let e = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select model type")
        .items(&types)
        .default(0)
        .interact()?;
    let model_type: ModelType = types[e].parse()?;
    let lambda: f64 = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Regularization strength")
        .default(0.1)
        .interact_text()?;

    let (labels, rows) = match env::args().nth(1) {
        Some(path) => load_csv(&path)?,
        None => generate(model_type),
    };
    info!("got {} rows with covariates {:?}", rows.len(), labels);

    let store = Arc::new(MemoryStore::new());
    let model = store.create_model(model_type, &labels, lambda)?;
    let mut first = None;
    for (value, covariates) in rows {
        let datum = store.add_datum(&model.id, value, covariates)?;
        first.get_or_insert(datum.id);
    }

    let params = LearnParams {
        cv: KFold {
            seed: SEED,
            ..Default::default()
        },
        ..Default::default()
    };
    let learner = Learner::new(store.clone(), params);

    let t0 = Instant::now();
    let queue = LearnQueue::for_learner(DEFAULT_CAPACITY, learner.clone())?;
    match queue.enqueue(&model.id) {
        EnqueueOutcome::Enqueued | EnqueueOutcome::Coalesced => {}
        EnqueueOutcome::Rejected(e) => warn!("{}", e),
        EnqueueOutcome::Closed => warn!("learn queue closed before model {} was queued", model.id),
    }
    queue.shutdown();
    info!("learning done in: {}ms", t0.elapsed().as_millis());

    let report = learner.cross_validate(&model.id)?;
    info!("skipped {} folds", report.skipped_folds());

    let model = store.get_model(&model.id)?;
    println!("{} model {}, lambda {}", model.model_type, model.id, model.lambda);
    for c in model.coefficients.iter() {
        println!("  {:>12}: {:.6}", c.label, c.value);
    }
    println!("train rmse: {:?}", model.train_rmse);
    println!("cv rmse:    {:?}", model.cv_rmse);

    if let Some(id) = first {
        let datum = store.get_datum(&id)?;
        let prediction = learner.predict(&model.id, &datum.covariates)?;
        println!("first row: target {}, predicted {:.6}", datum.value, prediction.value);
        if !prediction.missing.is_empty() {
            println!("  taken as 0: {:?}", prediction.missing);
        }
    }

    Ok(())
}

fn load_csv(path: &str) -> Result<(Vec<String>, Rows), Box<dyn Error>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);

    let headers = rdr.headers()?.clone();
    let value_col = headers
        .iter()
        .position(|h| h == "value")
        .ok_or("csv has no `value` column")?;
    let labels: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != value_col)
        .map(|(_, h)| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut value = 0.0;
        let mut covariates = HashMap::new();
        for (j, cell) in record.iter().enumerate() {
            if j == value_col {
                value = cell.trim().parse::<f64>()?;
            } else if !cell.trim().is_empty() {
                covariates.insert(headers[j].to_string(), cell.trim().parse::<f64>()?);
            }
        }
        rows.push((value, covariates));
    }

    Ok((labels, rows))
}

/// Noisy rows of `1 + 2 x1 - x2`, thresholded through the sigmoid for logistic models
fn generate(model_type: ModelType) -> (Vec<String>, Rows) {
    let mut rng = match SEED {
        Some(seed) => WyRand::new_seed(seed),
        None => WyRand::new(),
    };
    let labels = vec!["intercept".to_string(), "x1".to_string(), "x2".to_string()];

    let rows = (0..NUM_ROWS)
        .map(|_| {
            let x1 = rng.generate::<f64>() * 4.0 - 2.0;
            let x2 = rng.generate::<f64>() * 4.0 - 2.0;
            let eta = 1.0 + 2.0 * x1 - x2;
            let value = match model_type {
                ModelType::Linear => eta + (rng.generate::<f64>() - 0.5) * 0.2,
                ModelType::Logistic => {
                    if rng.generate::<f64>() < sigmoid(eta) {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            let covariates: HashMap<String, f64> =
                [("intercept", 1.0), ("x1", x1), ("x2", x2)]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect();
            (value, covariates)
        })
        .collect();

    (labels, rows)
}
