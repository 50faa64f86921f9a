pub mod error;
pub mod knn;
pub mod mnist;
pub mod ranking;

pub use error::{Error, Result};
