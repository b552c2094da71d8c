//! k-fold cross validation of the regression models

#[macro_use]
extern crate log;

mod k_fold;

pub use k_fold::{cross_validate, partition, shuffled_order, CvReport, KFold};
