pub mod adapters;
pub mod catalog;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "server")]
pub mod server;

pub use config::cli::LocalStorage;

#[cfg(feature = "cli")]
pub use config::CliConfig;

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

pub use catalog::pricing::PriceBook;
pub use core::{batch::BatchPipeline, engine::EstimateEngine, pipeline::EstimatePipeline};
pub use domain::model::{RoofMeasurements, RoofSystemType};
pub use utils::error::{EstimatorError, Result};
