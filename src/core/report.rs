//! 估算結果的文字報表與 CSV 輸出。

use crate::core::spec_extract::SpecAnalysis;
use crate::domain::analysis::DrawingAnalysis;
use crate::domain::estimate::{DetailEstimate, LineItem, SystemComparison, TakeoffEstimate};
use crate::utils::error::{EstimatorError, Result};
use serde::Serialize;

const WIDE: usize = 72;

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn with_separators(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    match unsigned.split_once('.') {
        Some((int, frac)) => format!("{}{}.{}", sign, group_thousands(int), frac),
        None => format!("{}{}", sign, group_thousands(unsigned)),
    }
}

/// 1234.5 → "1,234.50"
pub fn money(value: f64) -> String {
    with_separators(&format!("{:.2}", value))
}

/// 1234.5 → "1,235"
pub fn whole(value: f64) -> String {
    with_separators(&format!("{:.0}", value))
}

/// 整數不帶小數，其餘照原值
pub fn quantity(value: f64) -> String {
    with_separators(&value.to_string())
}

fn rule(ch: char, width: usize) -> String {
    ch.to_string().repeat(width)
}

fn section_header(lines: &mut Vec<String>, title: &str) {
    lines.push(String::new());
    lines.push(format!("  {}", rule('-', 68)));
    lines.push(format!("  {}", title));
    lines.push(format!("  {}", rule('-', 68)));
}

fn push_warnings(lines: &mut Vec<String>, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push("  WARNINGS".to_string());
    for warning in warnings {
        lines.push(format!("    - {}", warning));
    }
}

fn area_line(lines: &mut Vec<String>, item: &LineItem) {
    let cost = if item.line_cost > 0.0 {
        format!("${}", money(item.line_cost))
    } else {
        "TBD".to_string()
    };
    lines.push(format!("    {}", item.name));
    lines.push(format!(
        "      {} {}  @  ${}  =  {}",
        quantity(item.quantity),
        item.unit,
        money(item.unit_price),
        cost
    ));
    if let Some(note) = &item.note {
        lines.push(format!("      ** {}", note));
    }
}

pub fn estimate_report(estimate: &TakeoffEstimate) -> String {
    let m = &estimate.project_measurements;
    let mut lines = vec![
        rule('=', WIDE),
        "  ROOFING QUANTITY TAKEOFF & COST ESTIMATE".to_string(),
        format!("  {}", m.roof_system_name),
        format!("  Spec: {}", m.spec),
        rule('=', WIDE),
        String::new(),
        format!("  Roof Area     : {} sqft", whole(m.total_roof_area_sqft)),
        format!("  Perimeter     : {} LF", whole(m.perimeter_lf)),
        format!(
            "  Parapet       : {} LF x {:.1} ft",
            whole(m.parapet_length_lf),
            m.parapet_height_ft
        ),
        format!("  Tapered Area  : {} sqft", whole(m.tapered_area_sqft)),
        format!("  Ballast Area  : {} sqft", whole(m.ballast_area_sqft)),
        format!("  Penetrations  : {} total", m.total_penetrations),
    ];

    section_header(&mut lines, "AREA-BASED MATERIALS (membrane, insulation, drainage)");
    for item in &estimate.area_materials {
        area_line(&mut lines, item);
    }

    section_header(&mut lines, "LINEAR-FOOT MATERIALS (flashings, blocking, sheathing)");
    for item in &estimate.linear_materials {
        lines.push(format!("    {}", item.name));
        lines.push(format!(
            "      {} {}  ({} LF + {} waste)",
            quantity(item.quantity),
            item.unit,
            whole(item.base_quantity),
            item.waste_pct
        ));
        lines.push(format!(
            "      @  ${}  =  ${}",
            money(item.unit_price),
            money(item.line_cost)
        ));
    }

    if !estimate.unit_items.is_empty() {
        section_header(&mut lines, "UNIT ITEMS (drains, penetrations, equipment)");
        for item in &estimate.unit_items {
            let multiplier = if item.multiplier > 1 {
                format!(" x{}", item.multiplier)
            } else {
                String::new()
            };
            lines.push(format!("    {}", item.name));
            lines.push(format!(
                "      {}{}  =  {} {}",
                item.base_quantity,
                multiplier,
                item.quantity,
                item.unit
            ));
            lines.push(format!(
                "      @  ${}  =  ${}",
                money(item.unit_price),
                money(item.line_cost)
            ));
        }
    }

    section_header(&mut lines, "CONSUMABLES (mastic, adhesive, sealant)");
    for item in &estimate.consumables {
        lines.push(format!("    {}", item.name));
        lines.push(format!(
            "      {} {}  @  ${}  =  ${}",
            item.quantity,
            item.unit,
            money(item.unit_price),
            money(item.line_cost)
        ));
    }

    let bid = &estimate.bid_summary;
    lines.push(String::new());
    lines.push(rule('=', WIDE));
    lines.push("  BID FORM SUMMARY (Div 00 41 00)".to_string());
    lines.push(rule('=', WIDE));

    let general = &bid.item_1_general_requirements;
    lines.push(String::new());
    lines.push(format!("  1. {}", general.description));
    lines.push(format!("     ({})", general.note));
    lines.push(format!("     Estimated: ${:>12}", money(general.estimated_cost)));

    for (number, item) in [
        (2, &bid.item_2_roofing_assembly_and_flashing),
        (3, &bid.item_3_mechanical_support),
    ] {
        lines.push(String::new());
        lines.push(format!("  {}. {}", number, item.description));
        lines.push(format!("     Material: ${:>12}", money(item.material_cost)));
        lines.push(format!("     x {}  ({})", item.multiplier, item.note));
        lines.push(format!("     Estimated: ${:>12}", money(item.estimated_cost)));
    }

    lines.push(String::new());
    lines.push(format!("  {}", rule('-', 50)));
    lines.push(format!("  TOTAL PROJECT ESTIMATE:  ${:>12}", money(bid.total_estimate)));
    lines.push(format!("  {}", rule('-', 50)));
    lines.push(format!("  Per sqft:  ${:>8} / sqft", money(bid.per_sqft)));
    lines.push(rule('=', WIDE));

    push_warnings(&mut lines, &estimate.warnings);
    lines.join("\n")
}

pub fn detail_report(estimate: &DetailEstimate) -> String {
    let m = &estimate.project_measurements;
    let mut lines = vec![
        rule('=', WIDE),
        "  DETAIL-BASED QUANTITY TAKEOFF (AI-Analyzed)".to_string(),
        rule('=', WIDE),
        String::new(),
        format!("  Roof Area     : {} sqft", whole(m.total_roof_area_sqft)),
        format!("  Perimeter     : {} LF", whole(m.perimeter_lf)),
        format!(
            "  Parapet       : {} LF x {:.1} ft",
            whole(m.parapet_length_lf),
            m.parapet_height_ft
        ),
        format!("  Penetrations  : {} total", m.total_penetrations),
    ];

    for detail in &estimate.details {
        lines.push(String::new());
        lines.push(format!("  {}", rule('-', 68)));
        lines.push(format!(
            "  {}  [{}]  (ref: {})",
            detail.detail_name, detail.detail_type, detail.drawing_ref
        ));
        lines.push(format!(
            "  Measured in: {}  |  Base value: {}  |  Detail cost: ${}",
            detail.measurement_type,
            quantity(detail.base_measurement),
            money(detail.detail_cost)
        ));
        lines.push(format!("  {}", rule('-', 68)));

        for layer in &detail.layers {
            match layer.quantity {
                Some(qty) if layer.line_cost > 0.0 => {
                    lines.push(format!("    {}", layer.material));
                    lines.push(format!(
                        "      {} {}  @  ${}  =  ${}",
                        quantity(qty),
                        layer.unit,
                        money(layer.unit_price),
                        money(layer.line_cost)
                    ));
                }
                _ => {
                    let warning = layer
                        .warning
                        .as_deref()
                        .map(|w| format!("  !! {}", w))
                        .unwrap_or_default();
                    lines.push(format!(
                        "    {}  ->  {}{}",
                        layer.material, layer.pricing_key, warning
                    ));
                }
            }
            if !layer.notes.is_empty() {
                lines.push(format!("      ({})", layer.notes));
            }
        }
    }

    if let Some(bid) = &estimate.bid_summary {
        lines.push(String::new());
        lines.push(rule('=', WIDE));
        lines.push("  ESTIMATE SUMMARY".to_string());
        lines.push(rule('=', WIDE));
        lines.push(format!("  Total Material Cost:     ${:>12}", money(bid.material_cost)));
        lines.push(format!(
            "  General Req (10%):       ${:>12}",
            money(bid.general_requirements_10pct)
        ));
        lines.push(format!(
            "  Labour + Material (1.65x): ${:>12}",
            money(bid.labour_and_material_1_65x)
        ));
        lines.push(format!("  {}", rule('-', 50)));
        lines.push(format!("  TOTAL PROJECT ESTIMATE:  ${:>12}", money(bid.total_estimate)));
        lines.push(format!("  Per sqft:                ${:>12}", money(bid.per_sqft)));
    }
    lines.push(rule('=', WIDE));

    push_warnings(&mut lines, &estimate.warnings);
    lines.join("\n")
}

#[derive(Serialize)]
struct LineItemRow<'a> {
    section: &'a str,
    name: &'a str,
    pricing_key: &'a str,
    quantity: f64,
    unit: &'a str,
    unit_price: f64,
    line_cost: f64,
    bid_group: &'a str,
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| EstimatorError::IoError(e.into_error()))
}

pub fn line_items_csv(estimate: &TakeoffEstimate) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (section, item) in estimate.line_items() {
        writer.serialize(LineItemRow {
            section: section.as_str(),
            name: &item.name,
            pricing_key: item.pricing_key.as_deref().unwrap_or(""),
            quantity: item.quantity,
            unit: &item.unit,
            unit_price: item.unit_price,
            line_cost: item.line_cost,
            bid_group: item.bid_group.as_str(),
        })?;
    }
    finish_csv(writer)
}

#[derive(Serialize)]
struct MaterialRow<'a> {
    pricing_key: &'a str,
    names: String,
    quantity: f64,
    unit_price: f64,
    line_cost: f64,
}

/// 訂料用：同一價格鍵只出現一列
pub fn material_summary_csv(estimate: &TakeoffEstimate) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for total in estimate.material_summary() {
        writer.serialize(MaterialRow {
            pricing_key: &total.pricing_key,
            names: total.names.join("; "),
            quantity: total.quantity,
            unit_price: total.unit_price,
            line_cost: total.line_cost,
        })?;
    }
    finish_csv(writer)
}

#[derive(Serialize)]
struct ComparisonRow<'a> {
    project: &'a str,
    roof_system_type: &'a str,
    roof_system_name: &'a str,
    material_cost: f64,
    total_estimate: f64,
    per_sqft: f64,
    assembly_key: &'a str,
    budget_estimate: Option<f64>,
}

/// (專案名稱, 比較結果) 逐列輸出
pub fn comparison_csv<'a>(
    rows: impl IntoIterator<Item = (&'a str, &'a SystemComparison)>,
) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (project, comparison) in rows {
        writer.serialize(ComparisonRow {
            project,
            roof_system_type: comparison.roof_system_type.key(),
            roof_system_name: &comparison.roof_system_name,
            material_cost: comparison.material_cost,
            total_estimate: comparison.total_estimate,
            per_sqft: comparison.per_sqft,
            assembly_key: comparison.assembly_key.as_deref().unwrap_or(""),
            budget_estimate: comparison.budget_estimate,
        })?;
    }
    finish_csv(writer)
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn page_failure(error: &Option<String>, parse_error: bool) -> Option<String> {
    if parse_error {
        Some("PARSE ERROR".to_string())
    } else {
        error.as_ref().map(|e| format!("ERROR ({})", e))
    }
}

pub fn analysis_summary(analysis: &DrawingAnalysis) -> String {
    let mut lines = vec![
        String::new(),
        rule('=', 60),
        "  DRAWING ANALYSIS SUMMARY".to_string(),
        rule('=', 60),
    ];

    for plan in &analysis.plan_analysis {
        lines.push(String::new());
        if let Some(failure) = page_failure(&plan.error, plan.parse_error) {
            lines.push(format!("  Plan page {}: {}", plan.source_page, failure));
            continue;
        }
        lines.push(format!(
            "  Plan: {} (page {})",
            plan.drawing_ref.as_deref().unwrap_or("?"),
            plan.source_page
        ));
        if let Some(scale) = &plan.scale {
            lines.push(format!("  Scale: {}", scale));
        }
        let nonzero: Vec<_> = plan.counts.iter().filter(|(_, &v)| v > 0.0).collect();
        if !nonzero.is_empty() {
            lines.push("  Item counts:".to_string());
            for (item, count) in nonzero {
                lines.push(format!("    {}: {}", item, count));
            }
        }
        if !plan.detail_references.is_empty() {
            let refs: Vec<String> = plan.detail_references.iter().map(json_text).collect();
            lines.push(format!("  Detail refs: {}", refs.join(", ")));
        }
        for label in &plan.unit_labels {
            lines.push(format!(
                "  Unit {}: {} x, {} LF  ->  {}",
                label.label,
                label.count(),
                quantity(label.perimeter()),
                label.detail_ref.as_deref().unwrap_or("?")
            ));
        }
    }

    for page in &analysis.detail_analysis {
        lines.push(String::new());
        if let Some(failure) = page_failure(&page.error, page.parse_error) {
            lines.push(format!("  Detail page {}: {}", page.source_page, failure));
            continue;
        }
        lines.push(format!(
            "  Details: {} (page {})",
            page.drawing_ref.as_deref().unwrap_or("?"),
            page.source_page
        ));
        for detail in &page.details {
            lines.push(format!(
                "    {}  [{}]  measured in: {}",
                detail.detail_name, detail.detail_type, detail.measurement_type
            ));
            for layer in &detail.layers {
                let position = layer
                    .position
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".to_string());
                let notes = if layer.notes.is_empty() {
                    String::new()
                } else {
                    format!("  ({})", layer.notes)
                };
                lines.push(format!(
                    "      {}. {}  ->  {}{}",
                    position, layer.material, layer.pricing_key, notes
                ));
            }
        }
    }

    for spec in &analysis.spec_analysis {
        lines.push(String::new());
        if let Some(failure) = page_failure(&spec.error, spec.parse_error) {
            lines.push(format!("  Spec page {}: {}", spec.source_page, failure));
            continue;
        }
        lines.push(format!(
            "  Spec: {} - {} (page {})",
            spec.spec_section.as_deref().unwrap_or("?"),
            spec.section_title.as_deref().unwrap_or("?"),
            spec.source_page
        ));
        for material in &spec.materials {
            let brand = material
                .brand_model
                .as_deref()
                .map(|b| format!(" ({})", b))
                .unwrap_or_default();
            lines.push(format!(
                "    {}{}  ->  {}",
                material.material_name,
                brand,
                material.pricing_key.as_deref().unwrap_or("?")
            ));
        }
    }

    lines.push(String::new());
    lines.push(rule('=', 60));
    lines.join("\n")
}

pub fn spec_report(analysis: &SpecAnalysis) -> String {
    let info = &analysis.project_info;
    let summary = &analysis.summary;
    let mut lines = vec![
        rule('=', 70),
        "  ROOFING PRODUCT EXTRACTION REPORT".to_string(),
        rule('=', 70),
    ];

    for (label, value) in [
        ("Project ", &info.project_name),
        ("Address ", &info.address),
        ("Proj #  ", &info.project_number),
        ("Date    ", &info.date),
    ] {
        if let Some(value) = value {
            lines.push(format!("  {}: {}", label, value));
        }
    }
    lines.push(rule('-', 70));
    lines.push(format!(
        "  Found {} unique products across {} categories",
        summary.total_unique_products, summary.total_categories
    ));
    lines.push(String::new());

    for (category, products) in &analysis.products {
        lines.push(format!("  [{}]  ({} items)", category, products.len()));
        lines.push(format!("  {}", rule('-', 60)));
        for (name, mention) in products {
            let dimensions = if mention.dimensions.is_empty() {
                String::new()
            } else {
                format!("  ({})", mention.dimensions.join(", "))
            };
            let pages: Vec<String> = mention.pages.iter().map(u32::to_string).collect();
            lines.push(format!("    - {}{}", name, dimensions));
            lines.push(format!(
                "      Mentions: {}  |  Pages: {}",
                mention.count,
                pages.join(", ")
            ));
            if let Some(snippet) = mention.context_snippets.first() {
                let example: String = snippet.chars().take(100).collect();
                lines.push(format!("      Example : \"{}\"", example));
            }
        }
        lines.push(String::new());
    }

    lines.push(rule('=', 70));
    lines.push("  CATEGORY SUMMARY".to_string());
    lines.push(rule('=', 70));
    for (category, count) in &summary.categories {
        lines.push(format!("    {:<35} {} products", category, count));
    }
    lines.push(String::new());
    lines.push(format!(
        "    {:<35} {} products",
        "TOTAL", summary.total_unique_products
    ));
    lines.push(rule('=', 70));
    lines.join("\n")
}
