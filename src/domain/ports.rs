use crate::catalog::pricing::PriceBook;
use crate::domain::analysis::DrawingAnalysis;
use crate::domain::estimate::{DetailEstimate, SystemComparison, TakeoffEstimate};
use crate::domain::model::{RoofMeasurements, RoofSystemType};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn project_name(&self) -> &str;
    fn measurements_path(&self) -> &str;
    fn analysis_path(&self) -> Option<&str>;
    fn price_list_path(&self) -> Option<&str>;
    fn price_overrides(&self) -> BTreeMap<String, f64>;
    fn system_override(&self) -> Option<RoofSystemType>;
    fn compare_systems(&self) -> &[RoofSystemType];
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn compression_enabled(&self) -> bool;
    fn bundle_filename(&self) -> &str;
}

/// extract 階段讀入的資料
#[derive(Debug, Clone)]
pub struct EstimateInput {
    pub project_name: String,
    pub measurements: RoofMeasurements,
    pub analysis: Option<DrawingAnalysis>,
    pub price_book: PriceBook,
}

/// transform 階段的估算結果
#[derive(Debug, Clone)]
pub struct EstimateOutput {
    pub project_name: String,
    pub estimate: TakeoffEstimate,
    pub detail: Option<DetailEstimate>,
    pub comparison: Vec<SystemComparison>,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<EstimateInput>;
    async fn transform(&self, input: EstimateInput) -> Result<EstimateOutput>;
    async fn load(&self, output: EstimateOutput) -> Result<String>;
}
