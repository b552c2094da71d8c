//! The k-fold cross validator

use std::ops::Range;

use common::{rmse, Error, ModelType, Result};
use nalgebra::{DMatrix, DVector};
use nanorand::{Rng, WyRand};

/// Parameters of a k-fold cross validation
#[derive(Debug, Clone)]
pub struct KFold {
    /// Number of folds
    pub folds: usize,
    /// Optional seed for the shuffle, for reproducible fold assignment
    pub seed: Option<u64>,
    /// Newton-Raphson iteration cap used for logistic models
    pub max_iterations: usize,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            folds: 5,
            seed: None,
            max_iterations: 100,
        }
    }
}

/// The outcome of a cross validation
#[derive(Debug, Clone, PartialEq)]
pub struct CvReport {
    /// Mean of the held out RMSE over all folds that could be fit
    pub rmse: f64,
    /// Held out RMSE per fold, `None` for folds whose training failed
    pub fold_rmses: Vec<Option<f64>>,
}

impl CvReport {
    /// Number of folds excluded from the mean
    pub fn skipped_folds(&self) -> usize {
        self.fold_rmses.iter().filter(|r| r.is_none()).count()
    }
}

/// Split `n` rows into `folds` contiguous ranges whose sizes differ by at most one.
/// The first `n % folds` ranges get the extra row.
pub fn partition(n: usize, folds: usize) -> Vec<Range<usize>> {
    if folds == 0 {
        return vec![];
    }
    let per_fold = n / folds;
    let remainder = n % folds;

    let mut start = 0;
    (0..folds)
        .map(|i| {
            let len = if i < remainder { per_fold + 1 } else { per_fold };
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// A uniformly random permutation of `0..n`
pub fn shuffled_order(n: usize, seed: Option<u64>) -> Vec<usize> {
    let mut rng = match seed {
        Some(seed) => WyRand::new_seed(seed),
        None => WyRand::new(),
    };
    let mut order: Vec<usize> = (0..n).collect();
    rng.shuffle(&mut order);
    order
}

/// Estimate the prediction error of a model type on unseen rows.
///
/// The rows are shuffled and cut into `params.folds` contiguous folds. Each fold
/// is held out once while the model is fit on the remaining rows, starting from
/// zero coefficients. Folds whose fit hits a singular matrix are skipped.
/// With many covariates and small folds the estimate becomes unreliable,
/// guarding against that is up to the caller.
pub fn cross_validate(
    model_type: ModelType,
    design: &DMatrix<f64>,
    targets: &DVector<f64>,
    lambda: f64,
    params: &KFold,
) -> Result<CvReport> {
    let n = design.nrows();
    if n == 0 {
        return Err(Error::EmptyDataset);
    }
    if n != targets.len() {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: targets.len(),
        });
    }
    if params.folds < 2 || params.folds > n {
        return Err(Error::InvalidFoldCount {
            folds: params.folds,
            rows: n,
        });
    }

    let order = shuffled_order(n, params.seed);
    let start = DVector::zeros(design.ncols());

    let mut fold_rmses = Vec::with_capacity(params.folds);
    for (i, fold) in partition(n, params.folds).into_iter().enumerate() {
        let held_out = &order[fold.clone()];
        let training: Vec<usize> =
            order[..fold.start].iter().chain(order[fold.end..].iter()).copied().collect();

        let train_design = design.select_rows(training.iter());
        let train_targets = targets.select_rows(training.iter());

        let fit = match model_type.fit(
            &train_design,
            &train_targets,
            lambda,
            &start,
            params.max_iterations,
        ) {
            Ok(fit) => fit,
            Err(Error::SingularMatrix) => {
                warn!("skipping fold {}: singular matrix", i);
                fold_rmses.push(None);
                continue;
            }
            Err(e) => return Err(e),
        };

        let test_design = design.select_rows(held_out.iter());
        let test_targets = targets.select_rows(held_out.iter());
        let fold_rmse = rmse(model_type, &fit.coefficients, &test_design, &test_targets)?;
        debug!("fold {}: {} held out rows, rmse {}", i, held_out.len(), fold_rmse);

        fold_rmses.push(Some(fold_rmse));
    }

    let succeeded: Vec<f64> = fold_rmses.iter().flatten().copied().collect();
    if succeeded.is_empty() {
        return Err(Error::CvFailed {
            folds: params.folds,
        });
    }
    let mean = succeeded.iter().sum::<f64>() / succeeded.len() as f64;
    info!(
        "{} cross validation over {} of {} folds: rmse {}",
        model_type,
        succeeded.len(),
        params.folds,
        mean
    );

    Ok(CvReport {
        rmse: mean,
        fold_rmses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = 2 * x1 - x2 without noise
    fn exact_linear() -> (DMatrix<f64>, DVector<f64>) {
        let design = DMatrix::from_row_slice(
            8,
            2,
            &[
                1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 5.0, -1.0, 2.0, 0.5, -3.0, 4.0, 4.5,
            ],
        );
        let targets = DVector::from_iterator(
            8,
            design.row_iter().map(|r| 2.0 * r[0] - r[1]),
        );
        (design, targets)
    }

    #[test]
    fn partition_sizes() {
        let folds = partition(13, 5);
        let sizes: Vec<usize> = folds.iter().map(|f| f.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 2, 2]);

        let mut seen: Vec<usize> = folds.into_iter().flatten().collect();
        seen.sort();
        assert_eq!(seen, (0..13).collect::<Vec<usize>>());

        assert_eq!(partition(4, 4), vec![0..1, 1..2, 2..3, 3..4]);
        assert!(partition(4, 0).is_empty());
    }

    #[test]
    fn shuffle_is_a_seeded_permutation() {
        let a = shuffled_order(50, Some(7));
        let b = shuffled_order(50, Some(7));
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..50).collect::<Vec<usize>>());
    }

    #[test]
    fn leave_one_out_on_exact_data() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let (design, targets) = exact_linear();
        let params = KFold {
            folds: design.nrows(),
            seed: Some(0),
            ..Default::default()
        };

        let report = cross_validate(ModelType::Linear, &design, &targets, 0.0, &params).unwrap();

        assert!(report.rmse < 1e-9);
        assert_eq!(report.fold_rmses.len(), 8);
        assert_eq!(report.skipped_folds(), 0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let (design, targets) = exact_linear();
        let targets = targets.map(|y| y + 0.1);
        let params = KFold {
            folds: 3,
            seed: Some(42),
            ..Default::default()
        };

        let a = cross_validate(ModelType::Linear, &design, &targets, 0.5, &params).unwrap();
        let b = cross_validate(ModelType::Linear, &design, &targets, 0.5, &params).unwrap();

        assert_eq!(a, b);
        assert!(a.rmse > 0.0);
    }

    #[test]
    fn singular_folds_are_skipped() {
        // only the first row carries information
        let design = DMatrix::from_row_slice(4, 1, &[1.0, 0.0, 0.0, 0.0]);
        let targets = DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0]);
        let params = KFold {
            folds: 4,
            seed: Some(3),
            ..Default::default()
        };

        let report = cross_validate(ModelType::Linear, &design, &targets, 0.0, &params).unwrap();

        assert_eq!(report.skipped_folds(), 1);
        assert_eq!(report.rmse, 0.0);
    }

    #[test]
    fn every_fold_failing() {
        let design = DMatrix::<f64>::zeros(6, 1);
        let targets = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(
            cross_validate(ModelType::Linear, &design, &targets, 0.0, &KFold::default()),
            Err(Error::CvFailed { folds: 5 })
        );
    }

    #[test]
    fn logistic_error_is_bounded() {
        let x = [-3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 0.5, -0.5, 1.5];
        let y = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let design = DMatrix::from_fn(x.len(), 2, |i, j| if j == 0 { 1.0 } else { x[i] });
        let targets = DVector::from_column_slice(&y);
        let params = KFold {
            folds: 2,
            seed: Some(1),
            ..Default::default()
        };

        let report =
            cross_validate(ModelType::Logistic, &design, &targets, 0.1, &params).unwrap();

        assert!(report.rmse > 0.0 && report.rmse < 1.0);
    }

    #[test]
    fn invalid_inputs() {
        let (design, targets) = exact_linear();
        for folds in [0, 1, 9] {
            let params = KFold {
                folds,
                ..Default::default()
            };
            assert_eq!(
                cross_validate(ModelType::Linear, &design, &targets, 0.0, &params),
                Err(Error::InvalidFoldCount { folds, rows: 8 })
            );
        }

        assert_eq!(
            cross_validate(
                ModelType::Linear,
                &DMatrix::zeros(0, 2),
                &DVector::zeros(0),
                0.0,
                &KFold::default()
            ),
            Err(Error::EmptyDataset)
        );
    }
}
