//! This crate provides the data model shared by the regression engine:
//! models, coefficients and training rows, the design matrix builder,
//! prediction and the error metric.

#![deny(unused_imports, unused_crate_dependencies)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

mod design;
mod error;
mod evaluation;
mod link;
mod model;

pub use design::{build_design, covariate_row, DesignMatrix, ZeroFill};
pub use error::{Error, Result};
pub use evaluation::{predict, rmse};
pub use link::Link;
pub use model::{Coefficient, Datum, Model, ModelType};
