//! 圖面 AI 分析文件 (`analysis.json`) 的資料結構。
//!
//! 模型回覆的欄位常常缺漏或型別不一致，數值欄位一律寬鬆解析：
//! 數字照收、字串嘗試轉換、其餘視為 0。

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value).unwrap_or(0.0))
}

pub(crate) fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value))
}

fn lenient_counts<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let mut counts = BTreeMap::new();
    if let serde_json::Value::Object(map) = value {
        for (key, v) in map {
            counts.insert(key, value_to_f64(&v).unwrap_or(0.0));
        }
    }
    Ok(counts)
}

fn default_detail_name() -> String {
    "Unknown Detail".to_string()
}

fn default_detail_type() -> String {
    "unknown".to_string()
}

fn default_measurement_type() -> String {
    "each".to_string()
}

fn default_pricing_key() -> String {
    "CUSTOM".to_string()
}

fn default_material() -> String {
    "?".to_string()
}

fn default_confidence() -> String {
    "low".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnitInstance {
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub width_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub height_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub perimeter_lf: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub area_sqft: Option<f64>,
}

/// 平面圖上的標示單元（例如 HS、P、D）及其圖例對應的細部圖
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnitLabel {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detail_ref: Option<String>,
    #[serde(default)]
    pub detail_page: Option<String>,
    #[serde(default)]
    pub instances: Vec<UnitInstance>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub total_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub total_perimeter_lf: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub total_area_sqft: Option<f64>,
}

impl UnitLabel {
    pub fn count(&self) -> f64 {
        self.total_count
            .unwrap_or_else(|| self.instances.len() as f64)
    }

    pub fn perimeter(&self) -> f64 {
        self.total_perimeter_lf.unwrap_or_else(|| {
            self.instances
                .iter()
                .filter_map(|i| i.perimeter_lf)
                .sum()
        })
    }

    pub fn area(&self) -> f64 {
        self.total_area_sqft
            .unwrap_or_else(|| self.instances.iter().filter_map(|i| i.area_sqft).sum())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanPage {
    pub source_page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    #[serde(default, deserialize_with = "lenient_counts")]
    pub counts: BTreeMap<String, f64>,
    #[serde(default)]
    pub detail_references: Vec<serde_json::Value>,
    #[serde(default)]
    pub unit_labels: Vec<UnitLabel>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parse_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// zones、parapet 等其餘欄位原樣保留
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PlanPage {
    pub fn is_usable(&self) -> bool {
        !self.parse_error && self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailLayer {
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default = "default_material")]
    pub material: String,
    #[serde(default = "default_pricing_key")]
    pub pricing_key: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailSpec {
    #[serde(default = "default_detail_name")]
    pub detail_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_ref_id: Option<String>,
    #[serde(default = "default_detail_type")]
    pub detail_type: String,
    #[serde(default = "default_measurement_type")]
    pub measurement_type: String,
    #[serde(default)]
    pub layers: Vec<DetailLayer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailPage {
    pub source_page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_ref: Option<String>,
    #[serde(default)]
    pub details: Vec<DetailSpec>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parse_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DetailPage {
    pub fn is_usable(&self) -> bool {
        !self.parse_error && self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpecMaterial {
    #[serde(default)]
    pub material_name: String,
    #[serde(default)]
    pub brand_model: Option<String>,
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub pricing_key: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpecPage {
    pub source_page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(default)]
    pub materials: Vec<SpecMaterial>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parse_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Unmatched,
}

/// 平面圖標示單元與細部圖的連結結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitDetailEntry {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detail_ref: Option<String>,
    #[serde(default)]
    pub matched_detail_index: Option<usize>,
    pub match_status: MatchStatus,
    #[serde(default)]
    pub instances: Vec<UnitInstance>,
    pub total_count: f64,
    pub total_perimeter_lf: f64,
    pub total_area_sqft: f64,
    #[serde(default)]
    pub layers: Vec<DetailLayer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DrawingAnalysis {
    #[serde(default)]
    pub drawing_pdf: String,
    #[serde(default)]
    pub model_used: String,
    #[serde(default)]
    pub plan_analysis: Vec<PlanPage>,
    #[serde(default)]
    pub detail_analysis: Vec<DetailPage>,
    #[serde(default)]
    pub spec_analysis: Vec<SpecPage>,
    #[serde(default)]
    pub unit_detail_map: Vec<UnitDetailEntry>,
}

/// 平面圖量測候選結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
    #[serde(default)]
    pub scale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_measurement_used: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_roof_area_sqft: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub perimeter_lf: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub parapet_length_lf: f64,
    #[serde(default = "default_confidence")]
    pub confidence: String,
    #[serde(default)]
    pub notes: String,
}

impl Default for MeasurementCandidate {
    fn default() -> Self {
        Self {
            source_page: None,
            scale: "Unknown".to_string(),
            reference_measurement_used: None,
            total_roof_area_sqft: 0.0,
            perimeter_lf: 0.0,
            parapet_length_lf: 0.0,
            confidence: default_confidence(),
            notes: "No measurements extracted.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParapetCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub parapet_height_ft: Option<f64>,
    #[serde(default = "default_confidence")]
    pub confidence: String,
    #[serde(default)]
    pub notes: String,
}

impl Default for ParapetCandidate {
    fn default() -> Self {
        Self {
            source_page: None,
            parapet_height_ft: Some(2.0),
            confidence: default_confidence(),
            notes: "No parapet details found, using default.".to_string(),
        }
    }
}

/// 使用者確認過的參考尺寸，用來校正圖面比例
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceMeasurement {
    pub description: String,
    pub value: f64,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_page_lenient_counts_and_extra_fields() {
        let page: PlanPage = serde_json::from_value(serde_json::json!({
            "source_page": 3,
            "drawing_ref": "R2.0",
            "counts": {"roof_drains": 4, "scuppers": "2", "vent_hoods": null},
            "zones": [{"name": "Main roof"}]
        }))
        .unwrap();

        assert!(page.is_usable());
        assert_eq!(page.counts["roof_drains"], 4.0);
        assert_eq!(page.counts["scuppers"], 2.0);
        assert_eq!(page.counts["vent_hoods"], 0.0);
        assert!(page.extra.contains_key("zones"));
    }

    #[test]
    fn test_error_page_shapes() {
        let parse_failed: DetailPage = serde_json::from_value(serde_json::json!({
            "source_page": 5, "raw_response": "not json", "parse_error": true
        }))
        .unwrap();
        let transport_failed: DetailPage = serde_json::from_value(serde_json::json!({
            "source_page": 6, "error": "timeout"
        }))
        .unwrap();

        assert!(!parse_failed.is_usable());
        assert!(!transport_failed.is_usable());
    }

    #[test]
    fn test_detail_defaults() {
        let detail: DetailSpec =
            serde_json::from_value(serde_json::json!({"layers": [{"material": "Primer"}]}))
                .unwrap();
        assert_eq!(detail.detail_name, "Unknown Detail");
        assert_eq!(detail.detail_type, "unknown");
        assert_eq!(detail.measurement_type, "each");
        assert_eq!(detail.layers[0].pricing_key, "CUSTOM");
    }

    #[test]
    fn test_unit_label_totals_fall_back_to_instances() {
        let label: UnitLabel = serde_json::from_value(serde_json::json!({
            "label": "HS",
            "instances": [
                {"instance_id": "HS-1", "perimeter_lf": 11.0, "area_sqft": 7.5},
                {"instance_id": "HS-2", "perimeter_lf": "11", "area_sqft": 7.5}
            ]
        }))
        .unwrap();
        assert_eq!(label.count(), 2.0);
        assert_eq!(label.perimeter(), 22.0);
        assert_eq!(label.area(), 15.0);
    }
}
