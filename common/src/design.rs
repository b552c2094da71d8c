use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use crate::{Datum, Error, Result};

/// A covariate a row did not supply, counted as 0 in the design
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroFill {
    /// Row index in the design
    pub row: usize,
    /// Label of the missing covariate
    pub label: String,
}

/// Dense design matrix and target vector built from labeled rows
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    /// n x p, columns in covariate label order
    pub design: DMatrix<f64>,
    /// n target values
    pub targets: DVector<f64>,
    /// Every cell that was filled with 0 because the row lacked the label
    pub zero_fills: Vec<ZeroFill>,
}

impl DesignMatrix {
    /// Number of rows
    #[inline(always)]
    pub fn nrows(&self) -> usize {
        self.design.nrows()
    }

    /// Number of covariate columns
    #[inline(always)]
    pub fn ncols(&self) -> usize {
        self.design.ncols()
    }
}

/// Build the design matrix for `rows`, with column `j` holding covariate `labels[j]`.
/// Covariates not listed in `labels` are ignored.
pub fn build_design<S: AsRef<str>>(labels: &[S], rows: &[Datum]) -> Result<DesignMatrix> {
    if rows.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let mut design = DMatrix::zeros(rows.len(), labels.len());
    let mut zero_fills = Vec::new();
    for (i, datum) in rows.iter().enumerate() {
        for (j, label) in labels.iter().enumerate() {
            match datum.covariates.get(label.as_ref()) {
                Some(v) => design[(i, j)] = *v,
                None => zero_fills.push(ZeroFill {
                    row: i,
                    label: label.as_ref().to_string(),
                }),
            }
        }
    }
    let targets = DVector::from_iterator(rows.len(), rows.iter().map(|d| d.value));

    if !zero_fills.is_empty() {
        warn!(
            "filled {} missing covariate values with 0 across {} rows",
            zero_fills.len(),
            rows.len()
        );
    }

    Ok(DesignMatrix {
        design,
        targets,
        zero_fills,
    })
}

/// Build a single covariate vector in `labels` order.
/// Also returns the labels that were missing and filled with 0.
pub fn covariate_row<S: AsRef<str>>(
    labels: &[S],
    covariates: &HashMap<String, f64>,
) -> (DVector<f64>, Vec<String>) {
    let mut missing = Vec::new();
    let row = DVector::from_iterator(
        labels.len(),
        labels.iter().map(|label| match covariates.get(label.as_ref()) {
            Some(v) => *v,
            None => {
                missing.push(label.as_ref().to_string());
                0.0
            }
        }),
    );
    if !missing.is_empty() {
        debug!("covariates {:?} missing, using 0", missing);
    }

    (row, missing)
}
