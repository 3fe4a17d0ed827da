use crate::catalog::coverage::{coverage_for, detail_type_mapping, Coverage, MeasurementKind};
use crate::catalog::pricing::PriceBook;
use crate::domain::analysis::{DetailSpec, DrawingAnalysis, MatchStatus, UnitDetailEntry};
use crate::domain::estimate::{
    round2, DetailBidSummary, DetailEstimate, DetailLayerResult, DetailProjectSummary,
    DetailResult, QuantitySource, UnitInstanceSummary,
};
use crate::domain::model::RoofMeasurements;
use std::collections::BTreeMap;

const DETAIL_WASTE: f64 = 1.10;
const GENERAL_REQUIREMENTS_PCT: f64 = 0.10;
const LABOUR_AND_MATERIAL: f64 = 1.65;

/// 平面圖計數鍵 → 量測欄位
const PLAN_COUNT_KEYS: [&str; 8] = [
    "roof_drains",
    "scuppers",
    "mechanical_units",
    "sleeper_curbs",
    "vent_hoods",
    "gas_penetrations",
    "electrical_penetrations",
    "plumbing_vents",
];

/// 以 AI 計數加上人工量得的面積與周長組成量測資料
pub fn measurements_from_analysis(
    analysis: &DrawingAnalysis,
    total_roof_area_sqft: f64,
    perimeter_lf: f64,
    parapet_length_lf: Option<f64>,
    parapet_height_ft: f64,
) -> RoofMeasurements {
    let mut counts: BTreeMap<&str, f64> = BTreeMap::new();
    for page in analysis.plan_analysis.iter().filter(|p| !p.parse_error) {
        for (key, value) in &page.counts {
            *counts.entry(key.as_str()).or_insert(0.0) += value;
        }
    }

    let count = |key: &str| -> u32 {
        let value = counts.get(key).copied().unwrap_or(0.0);
        if value.is_finite() && value > 0.0 {
            value.round() as u32
        } else {
            0
        }
    };

    let mut m = RoofMeasurements::new(total_roof_area_sqft, perimeter_lf);
    m.parapet_length_lf = parapet_length_lf
        .filter(|length| *length > 0.0)
        .unwrap_or(perimeter_lf);
    m.parapet_height_ft = parapet_height_ft;
    m.roof_drain_count = count(PLAN_COUNT_KEYS[0]);
    m.scupper_count = count(PLAN_COUNT_KEYS[1]);
    m.mechanical_unit_count = count(PLAN_COUNT_KEYS[2]);
    m.sleeper_curb_count = count(PLAN_COUNT_KEYS[3]);
    m.vent_hood_count = count(PLAN_COUNT_KEYS[4]);
    m.gas_penetration_count = count(PLAN_COUNT_KEYS[5]);
    m.electrical_penetration_count = count(PLAN_COUNT_KEYS[6]);
    m.plumbing_vent_count = count(PLAN_COUNT_KEYS[7]);
    m
}

/// "Detail 3/R3.1"、"3 / r3.1" 皆正規化為 "3/r3.1"
pub fn normalize_detail_ref(reference: &str) -> String {
    let lowered = reference.trim().to_lowercase();
    let stripped = lowered
        .strip_prefix("detail")
        .map(|rest| rest.trim_start_matches(['.', ':', '#', ' ']))
        .unwrap_or(&lowered);
    stripped.chars().filter(|c| !c.is_whitespace()).collect()
}

fn usable_details(analysis: &DrawingAnalysis) -> Vec<(&str, &DetailSpec)> {
    analysis
        .detail_analysis
        .iter()
        .filter(|page| !page.parse_error)
        .flat_map(|page| {
            let drawing_ref = page.drawing_ref.as_deref().unwrap_or("?");
            page.details.iter().map(move |detail| (drawing_ref, detail))
        })
        .collect()
}

/// 將平面圖的標示單元對應到細部圖
pub fn build_unit_detail_map(analysis: &DrawingAnalysis) -> Vec<UnitDetailEntry> {
    let details = usable_details(analysis);

    analysis
        .plan_analysis
        .iter()
        .filter(|page| !page.parse_error)
        .flat_map(|page| page.unit_labels.iter())
        .map(|unit| {
            let wanted = unit.detail_ref.as_deref().map(normalize_detail_ref);
            let matched = wanted.as_ref().filter(|w| !w.is_empty()).and_then(|wanted| {
                details.iter().position(|(_, detail)| {
                    detail
                        .detail_ref_id
                        .as_deref()
                        .map(normalize_detail_ref)
                        .is_some_and(|id| &id == wanted)
                })
            });

            if matched.is_none() {
                tracing::warn!(
                    "⚠️ Unit label '{}' has no matching detail ({})",
                    unit.label,
                    unit.detail_ref.as_deref().unwrap_or("no reference")
                );
            }

            UnitDetailEntry {
                label: unit.label.clone(),
                description: unit.description.clone(),
                detail_ref: unit.detail_ref.clone(),
                matched_detail_index: matched,
                match_status: if matched.is_some() {
                    MatchStatus::Matched
                } else {
                    MatchStatus::Unmatched
                },
                instances: unit.instances.clone(),
                total_count: unit.count(),
                total_perimeter_lf: unit.perimeter(),
                total_area_sqft: unit.area(),
                layers: matched
                    .map(|index| details[index].1.layers.clone())
                    .unwrap_or_default(),
            }
        })
        .collect()
}

fn unit_map_for(analysis: &DrawingAnalysis) -> Vec<UnitDetailEntry> {
    if analysis.unit_detail_map.is_empty() {
        build_unit_detail_map(analysis)
    } else {
        analysis.unit_detail_map.clone()
    }
}

fn layer_quantity(
    kind: MeasurementKind,
    coverage: Option<Coverage>,
    base_value: f64,
) -> (f64, &'static str) {
    let sqft_per_unit = coverage.and_then(|c| c.sqft_per_unit());
    let lf_per_unit = coverage.and_then(|c| c.lf_per_unit());

    match kind {
        MeasurementKind::Sqft => (
            (base_value * DETAIL_WASTE / sqft_per_unit.unwrap_or(1.0)).ceil(),
            coverage.map(|c| c.unit()).unwrap_or("unit"),
        ),
        // 只有面積覆蓋率的材料，線性細部仍以面積換算
        MeasurementKind::LinearFt if sqft_per_unit.is_some() => (
            (base_value * DETAIL_WASTE / sqft_per_unit.unwrap_or(1.0)).ceil(),
            coverage.map(|c| c.unit()).unwrap_or("unit"),
        ),
        MeasurementKind::LinearFt if lf_per_unit.is_some() => (
            (base_value * DETAIL_WASTE / lf_per_unit.unwrap_or(1.0)).ceil(),
            coverage.map(|c| c.unit()).unwrap_or("unit"),
        ),
        _ => (
            base_value * coverage.and_then(|c| c.per_each()).unwrap_or(1.0),
            coverage.map(|c| c.unit()).unwrap_or("EA"),
        ),
    }
}

/// 以 AI 辨識的細部圖層次計算數量與成本
pub fn calculate_detail_takeoff(
    m: &RoofMeasurements,
    analysis: &DrawingAnalysis,
    book: &PriceBook,
) -> DetailEstimate {
    let project_measurements = DetailProjectSummary {
        total_roof_area_sqft: m.total_roof_area_sqft,
        perimeter_lf: m.perimeter_lf,
        parapet_length_lf: m.parapet_length_lf,
        parapet_height_ft: m.parapet_height_ft,
        total_penetrations: m.total_penetrations(),
    };

    let details = usable_details(analysis);
    if details.is_empty() {
        let warning = "No AI detail analysis found. Use the standard takeoff instead.".to_string();
        tracing::warn!("⚠️ {}", warning);
        return DetailEstimate {
            project_measurements,
            details: Vec::new(),
            total_material_cost: None,
            bid_summary: None,
            warnings: vec![warning],
        };
    }

    let unit_map = unit_map_for(analysis);
    let mut warnings = Vec::new();
    let mut grand_total = 0.0;
    let mut results = Vec::with_capacity(details.len());

    for (index, (drawing_ref, detail)) in details.iter().enumerate() {
        let kind = MeasurementKind::parse_lenient(&detail.measurement_type);
        let unit = unit_map.iter().find(|entry| {
            entry.match_status == MatchStatus::Matched && entry.matched_detail_index == Some(index)
        });

        let (base_value, quantity_source) = match (unit, detail_type_mapping(&detail.detail_type)) {
            (Some(unit), _) => {
                let value = match kind {
                    MeasurementKind::LinearFt => unit.total_perimeter_lf,
                    MeasurementKind::Sqft => unit.total_area_sqft,
                    MeasurementKind::Each => unit.total_count,
                };
                (value, QuantitySource::UnitPerimeter)
            }
            (None, Some((_, field))) => (m.value(field), QuantitySource::MeasurementMap),
            (None, None) => (1.0, QuantitySource::Default),
        };

        let mut detail_cost = 0.0;
        let mut layers = Vec::with_capacity(detail.layers.len());
        for layer in &detail.layers {
            let key = layer.pricing_key.as_str();
            if key == "CUSTOM" || !book.is_general_key(key) {
                let warning = format!("No pricing for '{}' - needs manual entry", key);
                warnings.push(format!("{}: {}", detail.detail_name, warning));
                layers.push(DetailLayerResult {
                    material: layer.material.clone(),
                    pricing_key: key.to_string(),
                    quantity: None,
                    unit: "?".to_string(),
                    unit_price: 0.0,
                    line_cost: 0.0,
                    notes: layer.notes.clone(),
                    warning: Some(warning),
                });
                continue;
            }

            let unit_price = book.price(key);
            let (quantity, unit) = layer_quantity(kind, coverage_for(key), base_value);
            let line_cost = quantity * unit_price;
            detail_cost += line_cost;

            layers.push(DetailLayerResult {
                material: layer.material.clone(),
                pricing_key: key.to_string(),
                quantity: Some(quantity),
                unit: unit.to_string(),
                unit_price: round2(unit_price),
                line_cost: round2(line_cost),
                notes: layer.notes.clone(),
                warning: None,
            });
        }

        let detail_cost = round2(detail_cost);
        grand_total += detail_cost;

        results.push(DetailResult {
            detail_name: detail.detail_name.clone(),
            detail_type: detail.detail_type.clone(),
            drawing_ref: drawing_ref.to_string(),
            detail_ref_id: detail.detail_ref_id.clone(),
            measurement_type: detail.measurement_type.clone(),
            base_measurement: base_value,
            quantity_source,
            unit_label: unit.map(|u| u.label.clone()),
            unit_instances: unit
                .map(|u| {
                    u.instances
                        .iter()
                        .map(|instance| UnitInstanceSummary {
                            instance_id: instance.instance_id.clone(),
                            perimeter_lf: instance.perimeter_lf,
                            location: instance.location.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            layers,
            detail_cost,
        });
    }

    let estimated = grand_total * GENERAL_REQUIREMENTS_PCT + grand_total * LABOUR_AND_MATERIAL;
    let bid_summary = DetailBidSummary {
        material_cost: round2(grand_total),
        general_requirements_10pct: round2(grand_total * GENERAL_REQUIREMENTS_PCT),
        labour_and_material_1_65x: round2(grand_total * LABOUR_AND_MATERIAL),
        total_estimate: round2(estimated),
        per_sqft: if m.total_roof_area_sqft > 0.0 {
            round2(estimated / m.total_roof_area_sqft)
        } else {
            0.0
        },
    };

    DetailEstimate {
        project_measurements,
        details: results,
        total_material_cost: Some(round2(grand_total)),
        bid_summary: Some(bid_summary),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{DetailLayer, DetailPage, PlanPage, UnitInstance, UnitLabel};

    fn layer(material: &str, key: &str) -> DetailLayer {
        DetailLayer {
            position: None,
            material: material.to_string(),
            pricing_key: key.to_string(),
            notes: String::new(),
        }
    }

    fn detail(name: &str, ref_id: Option<&str>, dtype: &str, mtype: &str, layers: Vec<DetailLayer>) -> DetailSpec {
        DetailSpec {
            detail_name: name.to_string(),
            detail_ref_id: ref_id.map(str::to_string),
            detail_type: dtype.to_string(),
            measurement_type: mtype.to_string(),
            layers,
        }
    }

    fn analysis() -> DrawingAnalysis {
        let mut plan = PlanPage {
            source_page: 1,
            ..Default::default()
        };
        plan.counts.insert("roof_drains".to_string(), 3.0);
        plan.counts.insert("mechanical_units".to_string(), 2.0);
        plan.unit_labels = vec![UnitLabel {
            label: "HS".to_string(),
            description: Some("Hot Stack Penetration".to_string()),
            detail_ref: Some("Detail 3/R3.1".to_string()),
            detail_page: Some("R3.1".to_string()),
            instances: vec![
                UnitInstance {
                    instance_id: Some("HS-1".to_string()),
                    perimeter_lf: Some(11.0),
                    ..Default::default()
                },
                UnitInstance {
                    instance_id: Some("HS-2".to_string()),
                    perimeter_lf: Some(11.0),
                    ..Default::default()
                },
            ],
            total_count: None,
            total_perimeter_lf: None,
            total_area_sqft: None,
        }];

        let mut broken = PlanPage {
            source_page: 2,
            parse_error: true,
            ..Default::default()
        };
        broken.counts.insert("roof_drains".to_string(), 10.0);

        let details = DetailPage {
            source_page: 5,
            drawing_ref: Some("R3.1".to_string()),
            details: vec![
                detail(
                    "Parapet Detail",
                    Some("1/R3.1"),
                    "parapet",
                    "linear_ft",
                    vec![layer("Metal cap flashing", "Flashing_General"), layer("Custom trim", "CUSTOM")],
                ),
                detail(
                    "Hot Stack Penetration",
                    Some("3/R3.1"),
                    "penetration_gas",
                    "linear_ft",
                    vec![layer("Metal counter flashing", "Flashing_General")],
                ),
                detail(
                    "Field Assembly",
                    None,
                    "field_assembly",
                    "sqft",
                    vec![layer("Cap sheet", "Cap_Membrane")],
                ),
                detail("Mystery", None, "skylight", "each", vec![layer("Drain", "Roof_Drain")]),
            ],
            ..Default::default()
        };

        DrawingAnalysis {
            plan_analysis: vec![plan, broken],
            detail_analysis: vec![details],
            ..Default::default()
        }
    }

    #[test]
    fn test_measurements_from_analysis_skips_broken_pages() {
        let m = measurements_from_analysis(&analysis(), 10_000.0, 400.0, None, 2.5);
        assert_eq!(m.roof_drain_count, 3);
        assert_eq!(m.mechanical_unit_count, 2);
        assert_eq!(m.parapet_length_lf, 400.0);
        assert_eq!(m.parapet_height_ft, 2.5);

        let m = measurements_from_analysis(&analysis(), 10_000.0, 400.0, Some(0.0), 2.0);
        assert_eq!(m.parapet_length_lf, 400.0);
        let m = measurements_from_analysis(&analysis(), 10_000.0, 400.0, Some(250.0), 2.0);
        assert_eq!(m.parapet_length_lf, 250.0);
    }

    #[test]
    fn test_normalize_detail_ref() {
        assert_eq!(normalize_detail_ref("Detail 3/R3.1"), "3/r3.1");
        assert_eq!(normalize_detail_ref(" 3 / r3.1 "), "3/r3.1");
    }

    #[test]
    fn test_unit_detail_map_matches_by_reference() {
        let map = build_unit_detail_map(&analysis());
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].match_status, MatchStatus::Matched);
        assert_eq!(map[0].matched_detail_index, Some(1));
        assert_eq!(map[0].total_perimeter_lf, 22.0);
        assert_eq!(map[0].total_count, 2.0);
        assert_eq!(map[0].layers.len(), 1);
    }

    #[test]
    fn test_unmatched_unit_label() {
        let mut analysis = analysis();
        analysis.plan_analysis[0].unit_labels[0].detail_ref = Some("Detail 9/R9.9".to_string());
        let map = build_unit_detail_map(&analysis);
        assert_eq!(map[0].match_status, MatchStatus::Unmatched);
        assert!(map[0].matched_detail_index.is_none());
        assert!(map[0].layers.is_empty());
    }

    #[test]
    fn test_detail_takeoff_quantity_sources() {
        let analysis = analysis();
        let m = measurements_from_analysis(&analysis, 10_000.0, 400.0, None, 2.0);
        let book = PriceBook::builtin();
        let estimate = calculate_detail_takeoff(&m, &analysis, &book);

        assert_eq!(estimate.details.len(), 4);

        let parapet = &estimate.details[0];
        assert_eq!(parapet.quantity_source, QuantitySource::MeasurementMap);
        assert_eq!(parapet.base_measurement, 400.0);
        // 400 × 1.1 在浮點數下略大於 440
        assert_eq!(parapet.layers[0].quantity, Some(45.0));
        assert_eq!(parapet.layers[0].unit, "10ft piece");
        assert!(parapet.layers[1].quantity.is_none());
        assert_eq!(
            parapet.layers[1].warning.as_deref(),
            Some("No pricing for 'CUSTOM' - needs manual entry")
        );

        let stack = &estimate.details[1];
        assert_eq!(stack.quantity_source, QuantitySource::UnitPerimeter);
        assert_eq!(stack.base_measurement, 22.0);
        assert_eq!(stack.unit_label.as_deref(), Some("HS"));
        assert_eq!(stack.unit_instances.len(), 2);
        // ceil(22 × 1.1 / 10) = 3
        assert_eq!(stack.layers[0].quantity, Some(3.0));

        // ceil(10000 × 1.1 / 86) = 128
        assert_eq!(estimate.details[2].layers[0].quantity, Some(128.0));

        let mystery = &estimate.details[3];
        assert_eq!(mystery.quantity_source, QuantitySource::Default);
        assert_eq!(mystery.layers[0].quantity, Some(1.0));
        assert_eq!(mystery.layers[0].unit, "EA");

        let material: f64 = estimate.details.iter().map(|d| d.detail_cost).sum();
        let bid = estimate.bid_summary.as_ref().unwrap();
        assert_eq!(bid.material_cost, round2(material));
        assert_eq!(bid.total_estimate, round2(material * 0.10 + material * 1.65));
        assert_eq!(estimate.unpriced_layer_count(), 1);
    }

    #[test]
    fn test_no_details_returns_warning_only() {
        let analysis = DrawingAnalysis::default();
        let m = RoofMeasurements::new(1_000.0, 130.0);
        let estimate = calculate_detail_takeoff(&m, &analysis, &PriceBook::builtin());
        assert!(estimate.details.is_empty());
        assert!(estimate.bid_summary.is_none());
        assert!(estimate.total_material_cost.is_none());
        assert_eq!(estimate.warnings.len(), 1);
    }
}
