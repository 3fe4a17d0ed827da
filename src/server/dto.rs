use crate::adapters::solar::{FootprintEstimate, MembraneFamily};
use crate::catalog::{assemblies, systems};
use crate::domain::analysis::DrawingAnalysis;
use crate::domain::estimate::SystemComparison;
use crate::domain::model::{RoofMeasurements, RoofSystemType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub key: RoofSystemType,
    pub display_name: String,
    pub spec: String,
    pub labour_multiplier: f64,
    pub mechanical_multiplier: f64,
    pub assembly_key: Option<String>,
}

impl From<RoofSystemType> for SystemInfo {
    fn from(system: RoofSystemType) -> Self {
        let meta = systems::meta(system);
        Self {
            key: system,
            display_name: meta.display_name.to_string(),
            spec: meta.spec.to_string(),
            labour_multiplier: meta.labour_multiplier,
            mechanical_multiplier: meta.mechanical_multiplier,
            assembly_key: assemblies::for_system(system).map(|a| a.key.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimateRequest {
    pub measurements: RoofMeasurements,
    #[serde(default)]
    pub system: Option<RoofSystemType>,
    #[serde(default)]
    pub price_overrides: BTreeMap<String, f64>,
}

/// 細部估算：AI 分析結果加上人工量測的面積與周長
#[derive(Debug, Clone, Deserialize)]
pub struct DetailEstimateRequest {
    pub analysis: DrawingAnalysis,
    pub total_roof_area_sqft: f64,
    pub perimeter_lf: f64,
    #[serde(default)]
    pub parapet_length_lf: Option<f64>,
    #[serde(default = "default_parapet_height")]
    pub parapet_height_ft: f64,
    #[serde(default)]
    pub price_overrides: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareRequest {
    pub measurements: RoofMeasurements,
    /// 空白時比較全部系統
    #[serde(default)]
    pub systems: Vec<RoofSystemType>,
    #[serde(default)]
    pub price_overrides: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResponse {
    pub comparisons: Vec<SystemComparison>,
    pub cheapest: Option<RoofSystemType>,
}

/// `pdftotext` 的純文字輸出，以換頁字元分頁
#[derive(Debug, Clone, Deserialize)]
pub struct SpecAnalyzeRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FootprintRequest {
    pub address: String,
    #[serde(default)]
    pub system: MembraneFamily,
    #[serde(default = "default_parapet_height")]
    pub parapet_height_ft: f64,
    #[serde(default)]
    pub hvac_units: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintResponse {
    pub address: String,
    pub system: MembraneFamily,
    #[serde(flatten)]
    pub estimate: FootprintEstimate,
}

fn default_parapet_height() -> f64 {
    2.0
}
