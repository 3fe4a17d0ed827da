pub mod batch;
pub mod comparison;
pub mod detail_takeoff;
pub mod drawing;
pub mod engine;
pub mod pipeline;
pub mod report;
pub mod sanity;
pub mod spec_extract;
pub mod takeoff;

pub use crate::domain::ports::{ConfigProvider, EstimateInput, EstimateOutput, Pipeline, Storage};
pub use crate::utils::error::Result;
