use crate::domain::model::RoofSystemType;
use serde::{Deserialize, Serialize};

/// 四捨五入至分（遠離零）
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidGroup {
    Roofing,
    Flashing,
    Mechanical,
}

impl BidGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidGroup::Roofing => "roofing",
            BidGroup::Flashing => "flashing",
            BidGroup::Mechanical => "mechanical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeoffSection {
    AreaMaterials,
    LinearMaterials,
    UnitItems,
    Consumables,
}

impl TakeoffSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TakeoffSection::AreaMaterials => "area_materials",
            TakeoffSection::LinearMaterials => "linear_materials",
            TakeoffSection::UnitItems => "unit_items",
            TakeoffSection::Consumables => "consumables",
        }
    }
}

/// 一筆已計價的數量明細
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub name: String,
    /// 礫石壓載說明列沒有價格鍵
    pub pricing_key: Option<String>,
    /// 面積 (sqft)、長度 (LF) 或數量
    pub base_quantity: f64,
    pub waste_pct: f64,
    pub multiplier: u32,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub line_cost: f64,
    pub bid_group: BidGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSummary {
    pub total_roof_area_sqft: f64,
    pub perimeter_lf: f64,
    pub parapet_length_lf: f64,
    pub parapet_height_ft: f64,
    pub tapered_area_sqft: f64,
    pub ballast_area_sqft: f64,
    pub total_penetrations: u32,
    pub roof_system_type: RoofSystemType,
    pub roof_system_name: String,
    pub spec: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidLine {
    pub description: String,
    pub note: String,
    pub material_cost: f64,
    /// 第 1 項為百分比 (0.10)，其餘為人工倍數
    pub multiplier: f64,
    pub estimated_cost: f64,
}

/// Div 00 41 00 投標單摘要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidSummary {
    pub item_1_general_requirements: BidLine,
    pub item_2_roofing_assembly_and_flashing: BidLine,
    pub item_3_mechanical_support: BidLine,
    pub total_estimate: f64,
    pub per_sqft: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TakeoffEstimate {
    pub project_measurements: ProjectSummary,
    pub area_materials: Vec<LineItem>,
    pub linear_materials: Vec<LineItem>,
    pub unit_items: Vec<LineItem>,
    pub consumables: Vec<LineItem>,
    pub bid_summary: BidSummary,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// 同一價格鍵合併後的材料小計
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialTotal {
    pub pricing_key: String,
    pub names: Vec<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_cost: f64,
}

impl TakeoffEstimate {
    pub fn line_items(&self) -> impl Iterator<Item = (TakeoffSection, &LineItem)> {
        self.area_materials
            .iter()
            .map(|item| (TakeoffSection::AreaMaterials, item))
            .chain(
                self.linear_materials
                    .iter()
                    .map(|item| (TakeoffSection::LinearMaterials, item)),
            )
            .chain(
                self.unit_items
                    .iter()
                    .map(|item| (TakeoffSection::UnitItems, item)),
            )
            .chain(
                self.consumables
                    .iter()
                    .map(|item| (TakeoffSection::Consumables, item)),
            )
    }

    /// 依價格鍵去重合併，保留首次出現順序
    pub fn material_summary(&self) -> Vec<MaterialTotal> {
        let mut totals: Vec<MaterialTotal> = Vec::new();
        for (_, item) in self.line_items() {
            let Some(key) = item.pricing_key.as_deref() else {
                continue;
            };
            match totals.iter_mut().find(|t| t.pricing_key == key) {
                Some(total) => {
                    total.quantity += item.quantity;
                    total.line_cost = round2(total.line_cost + item.line_cost);
                    if !total.names.contains(&item.name) {
                        total.names.push(item.name.clone());
                    }
                }
                None => totals.push(MaterialTotal {
                    pricing_key: key.to_string(),
                    names: vec![item.name.clone()],
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_cost: item.line_cost,
                }),
            }
        }
        totals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantitySource {
    UnitPerimeter,
    MeasurementMap,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailLayerResult {
    pub material: String,
    pub pricing_key: String,
    /// None 表示需要人工輸入
    pub quantity: Option<f64>,
    pub unit: String,
    pub unit_price: f64,
    pub line_cost: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitInstanceSummary {
    pub instance_id: Option<String>,
    pub perimeter_lf: Option<f64>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailResult {
    pub detail_name: String,
    pub detail_type: String,
    pub drawing_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_ref_id: Option<String>,
    pub measurement_type: String,
    pub base_measurement: f64,
    pub quantity_source: QuantitySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unit_instances: Vec<UnitInstanceSummary>,
    pub layers: Vec<DetailLayerResult>,
    pub detail_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailProjectSummary {
    pub total_roof_area_sqft: f64,
    pub perimeter_lf: f64,
    pub parapet_length_lf: f64,
    pub parapet_height_ft: f64,
    pub total_penetrations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailBidSummary {
    pub material_cost: f64,
    pub general_requirements_10pct: f64,
    pub labour_and_material_1_65x: f64,
    pub total_estimate: f64,
    pub per_sqft: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailEstimate {
    pub project_measurements: DetailProjectSummary,
    pub details: Vec<DetailResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_material_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_summary: Option<DetailBidSummary>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DetailEstimate {
    pub fn unpriced_layer_count(&self) -> usize {
        self.details
            .iter()
            .flat_map(|d| d.layers.iter())
            .filter(|layer| layer.quantity.is_none())
            .count()
    }
}

/// 單一系統的比較結果（標準估算與組合單價概算）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemComparison {
    pub roof_system_type: RoofSystemType,
    pub roof_system_name: String,
    pub material_cost: f64,
    pub total_estimate: f64,
    pub per_sqft: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_estimate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, key: Option<&str>, quantity: f64, cost: f64) -> LineItem {
        LineItem {
            name: name.to_string(),
            pricing_key: key.map(str::to_string),
            base_quantity: 0.0,
            waste_pct: 0.0,
            multiplier: 1,
            quantity,
            unit: "EA".to_string(),
            unit_price: 0.0,
            line_cost: cost,
            bid_group: BidGroup::Roofing,
            note: None,
        }
    }

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(-2.345_000_1), -2.35);
    }

    #[test]
    fn test_material_summary_dedups_by_key() {
        let estimate = TakeoffEstimate {
            project_measurements: ProjectSummary {
                total_roof_area_sqft: 0.0,
                perimeter_lf: 0.0,
                parapet_length_lf: 0.0,
                parapet_height_ft: 0.0,
                tapered_area_sqft: 0.0,
                ballast_area_sqft: 0.0,
                total_penetrations: 0,
                roof_system_type: RoofSystemType::Sbs,
                roof_system_name: String::new(),
                spec: String::new(),
            },
            area_materials: vec![item("Gravel Ballast", None, 100.0, 0.0)],
            linear_materials: vec![
                item("Metal Cap Flashing", Some("Flashing_General"), 5.0, 872.30),
                item("Metal Counter Flashing", Some("Flashing_General"), 5.0, 872.30),
            ],
            unit_items: vec![item(
                "Mechanical Unit Curb Flashing",
                Some("Flashing_General"),
                8.0,
                1395.68,
            )],
            consumables: vec![],
            bid_summary: BidSummary {
                item_1_general_requirements: BidLine {
                    description: String::new(),
                    note: String::new(),
                    material_cost: 0.0,
                    multiplier: 0.10,
                    estimated_cost: 0.0,
                },
                item_2_roofing_assembly_and_flashing: BidLine {
                    description: String::new(),
                    note: String::new(),
                    material_cost: 0.0,
                    multiplier: 1.65,
                    estimated_cost: 0.0,
                },
                item_3_mechanical_support: BidLine {
                    description: String::new(),
                    note: String::new(),
                    material_cost: 0.0,
                    multiplier: 1.80,
                    estimated_cost: 0.0,
                },
                total_estimate: 0.0,
                per_sqft: 0.0,
            },
            warnings: vec![],
        };

        let summary = estimate.material_summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].quantity, 18.0);
        assert_eq!(summary[0].line_cost, 3140.28);
        assert_eq!(summary[0].names.len(), 3);
    }
}
