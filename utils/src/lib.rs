pub mod regression;

pub use regression::{DataPoint, RegressionError};
