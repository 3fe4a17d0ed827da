use crate::catalog::pricing::PriceBook;
use crate::catalog::systems::{self, AreaSource};
use crate::domain::estimate::{
    round2, BidGroup, BidLine, BidSummary, LineItem, ProjectSummary, TakeoffEstimate,
};
use crate::domain::model::{MeasurementField, RoofMeasurements};

const GENERAL_REQUIREMENTS_PCT: f64 = 0.10;

const BALLAST_NAME: &str = "Gravel Ballast (100mm max / 15 lb/sqft) - existing, redistribute";
const BALLAST_NOTE: &str =
    "Existing ballast. Reduce depth to 100mm max. Disposal/redistribution cost by contractor.";

/// (名稱, 價格鍵, 單位, 每單位長度, 損耗)
const LINEAR_ITEMS: &[(&str, &str, &str, f64, f64)] = &[
    (
        "Metal Cap Flashing (24ga prefinished galv.)",
        "Flashing_General",
        "10ft piece",
        10.0,
        0.10,
    ),
    (
        "Metal Counter Flashing (24ga prefinished galv.)",
        "Flashing_General",
        "10ft piece",
        10.0,
        0.10,
    ),
    ("Wood Blocking (SPF 2x)", "Wood_Blocking_Lumber", "8ft piece", 8.0, 0.15),
    (
        "Plywood Sheathing (12.5mm Douglas Fir)",
        "Plywood_Sheathing",
        "4'x8' sheet",
        8.0,
        0.15,
    ),
];

/// 各項成本小計（未四捨五入）
#[derive(Debug, Default, Clone, Copy)]
struct GroupTotals {
    roofing: f64,
    flashing: f64,
    mechanical: f64,
}

impl GroupTotals {
    fn add(&mut self, group: BidGroup, cost: f64) {
        match group {
            BidGroup::Roofing => self.roofing += cost,
            BidGroup::Flashing => self.flashing += cost,
            BidGroup::Mechanical => self.mechanical += cost,
        }
    }
}

struct Priced {
    item: LineItem,
    raw_cost: f64,
}

fn priced_line(
    book: &PriceBook,
    name: String,
    pricing_key: &str,
    base_quantity: f64,
    waste_pct: f64,
    multiplier: u32,
    quantity: f64,
    unit: &str,
    bid_group: BidGroup,
) -> Priced {
    let unit_price = book.price(pricing_key);
    let raw_cost = quantity * unit_price;
    Priced {
        item: LineItem {
            name,
            pricing_key: Some(pricing_key.to_string()),
            base_quantity: round2(base_quantity),
            waste_pct,
            multiplier,
            quantity,
            unit: unit.to_string(),
            unit_price: round2(unit_price),
            line_cost: round2(raw_cost),
            bid_group,
            note: None,
        },
        raw_cost,
    }
}

/// 依量測值計算材料數量與投標單金額
pub fn calculate_takeoff(m: &RoofMeasurements, book: &PriceBook) -> TakeoffEstimate {
    let system = m.roof_system_type;
    let meta = systems::meta(system);
    let mut totals = GroupTotals::default();

    let mut area_materials = Vec::new();
    for layer in systems::area_layers(system) {
        if !layer.role.is_enabled(m) {
            tracing::debug!("Skipping disabled layer: {}", layer.name);
            continue;
        }
        let base_area = layer.area_source.area(m);
        let quantity = (base_area * (1.0 + layer.waste_pct) / layer.sqft_per_unit).ceil();
        let priced = priced_line(
            book,
            layer.name.to_string(),
            layer.pricing_key,
            base_area,
            layer.waste_pct,
            1,
            quantity,
            layer.unit,
            layer.bid_group,
        );
        totals.add(layer.bid_group, priced.raw_cost);
        area_materials.push(priced.item);
    }

    if meta.include_ballast_note {
        let ballast_area = AreaSource::BallastArea.area(m);
        area_materials.push(LineItem {
            name: BALLAST_NAME.to_string(),
            pricing_key: None,
            base_quantity: ballast_area.round(),
            waste_pct: 0.0,
            multiplier: 1,
            quantity: ballast_area.round(),
            unit: "sqft".to_string(),
            unit_price: 0.0,
            line_cost: 0.0,
            bid_group: BidGroup::Roofing,
            note: Some(BALLAST_NOTE.to_string()),
        });
    }

    let mut linear_materials = Vec::new();
    for (name, pricing_key, unit, lf_per_unit, waste_pct) in LINEAR_ITEMS {
        let base_lf = m.parapet_length_lf;
        let quantity = (base_lf * (1.0 + waste_pct) / lf_per_unit).ceil();
        let priced = priced_line(
            book,
            name.to_string(),
            pricing_key,
            base_lf,
            *waste_pct,
            1,
            quantity,
            unit,
            BidGroup::Flashing,
        );
        totals.add(BidGroup::Flashing, priced.raw_cost);
        linear_materials.push(priced.item);
    }

    let pipe_seal = systems::pipe_seal(system);
    let unit_defs: [(String, &str, MeasurementField, u32, BidGroup); 8] = [
        (
            "Roof Drain Insert (spun aluminum, OMG/Thaler)".to_string(),
            "Roof_Drain",
            MeasurementField::RoofDrainCount,
            1,
            BidGroup::Roofing,
        ),
        (
            "Overflow Scupper".to_string(),
            "Scupper",
            MeasurementField::ScupperCount,
            1,
            BidGroup::Roofing,
        ),
        (
            "Mechanical Unit Curb Flashing".to_string(),
            "Flashing_General",
            MeasurementField::MechanicalUnitCount,
            4,
            BidGroup::Mechanical,
        ),
        (
            "Sleeper Curb Flashing".to_string(),
            "Flashing_General",
            MeasurementField::SleeperCurbCount,
            2,
            BidGroup::Mechanical,
        ),
        (
            "Vent Hood Flashing".to_string(),
            "Gooseneck_Vent",
            MeasurementField::VentHoodCount,
            1,
            BidGroup::Roofing,
        ),
        (
            format!("Gas {}", pipe_seal.name),
            pipe_seal.pricing_key,
            MeasurementField::GasPenetrationCount,
            1,
            BidGroup::Roofing,
        ),
        (
            format!("Electrical {}", pipe_seal.name),
            pipe_seal.pricing_key,
            MeasurementField::ElectricalPenetrationCount,
            1,
            BidGroup::Roofing,
        ),
        (
            "Plumbing Vent Flashing".to_string(),
            "Plumbing_Vent",
            MeasurementField::PlumbingVentCount,
            1,
            BidGroup::Roofing,
        ),
    ];

    let mut unit_items = Vec::new();
    for (name, pricing_key, field, multiplier, bid_group) in unit_defs {
        let base_count = m.count(field);
        let quantity = f64::from(base_count) * f64::from(multiplier);
        if quantity == 0.0 {
            continue;
        }
        let priced = priced_line(
            book,
            name,
            pricing_key,
            f64::from(base_count),
            0.0,
            multiplier,
            quantity,
            "EA",
            bid_group,
        );
        totals.add(bid_group, priced.raw_cost);
        unit_items.push(priced.item);
    }

    let mut consumables = Vec::new();
    for consumable in systems::consumables(system) {
        let quantity = (m.total_roof_area_sqft / 1000.0 * consumable.rate_per_1000_sqft).ceil();
        let priced = priced_line(
            book,
            consumable.name.to_string(),
            consumable.pricing_key,
            m.total_roof_area_sqft,
            0.0,
            1,
            quantity,
            consumable.unit,
            consumable.bid_group,
        );
        totals.add(consumable.bid_group, priced.raw_cost);
        consumables.push(priced.item);
    }

    let bid_summary = bid_summary(totals, &meta, m.total_roof_area_sqft);
    tracing::debug!(
        "Takeoff totals - roofing: {:.2}, flashing: {:.2}, mechanical: {:.2}",
        totals.roofing,
        totals.flashing,
        totals.mechanical
    );

    TakeoffEstimate {
        project_measurements: ProjectSummary {
            total_roof_area_sqft: m.total_roof_area_sqft,
            perimeter_lf: m.perimeter_lf,
            parapet_length_lf: m.parapet_length_lf,
            parapet_height_ft: m.parapet_height_ft,
            tapered_area_sqft: m.effective_tapered_area(),
            ballast_area_sqft: m.effective_ballast_area(),
            total_penetrations: m.total_penetrations(),
            roof_system_type: system,
            roof_system_name: meta.display_name.to_string(),
            spec: meta.spec.to_string(),
        },
        area_materials,
        linear_materials,
        unit_items,
        consumables,
        bid_summary,
        warnings: Vec::new(),
    }
}

fn bid_summary(totals: GroupTotals, meta: &systems::SystemMeta, area_sqft: f64) -> BidSummary {
    let roofing_plus_flashing = totals.roofing + totals.flashing;
    let general = roofing_plus_flashing * GENERAL_REQUIREMENTS_PCT;
    let assembly = roofing_plus_flashing * meta.labour_multiplier;
    let mechanical = totals.mechanical * meta.mechanical_multiplier;
    let total = round2(general + assembly + mechanical);

    BidSummary {
        item_1_general_requirements: BidLine {
            description: "General Requirements (Div 01)".to_string(),
            note: "Mobilization, site protection, cleanup - typically 8-12% of roofing".to_string(),
            material_cost: round2(roofing_plus_flashing),
            multiplier: GENERAL_REQUIREMENTS_PCT,
            estimated_cost: round2(general),
        },
        item_2_roofing_assembly_and_flashing: BidLine {
            description: format!("Roofing Assembly + Metal Flashing ({})", meta.spec),
            note: meta.labour_note.to_string(),
            material_cost: round2(roofing_plus_flashing),
            multiplier: meta.labour_multiplier,
            estimated_cost: round2(assembly),
        },
        item_3_mechanical_support: BidLine {
            description: "Mechanical Support (sleeper curbs, RTU flashings)".to_string(),
            note: "Higher labour ratio for detail work".to_string(),
            material_cost: round2(totals.mechanical),
            multiplier: meta.mechanical_multiplier,
            estimated_cost: round2(mechanical),
        },
        total_estimate: total,
        per_sqft: if area_sqft > 0.0 {
            round2(total / area_sqft)
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RoofSystemType;
    use crate::utils::validation::Validate;

    fn find<'a>(items: &'a [LineItem], prefix: &str) -> &'a LineItem {
        items
            .iter()
            .find(|item| item.name.starts_with(prefix))
            .unwrap_or_else(|| panic!("missing line item {}", prefix))
    }

    fn sbs_measurements() -> RoofMeasurements {
        let mut m = RoofMeasurements::new(10_000.0, 400.0);
        m.parapet_length_lf = 400.0;
        m.roof_drain_count = 4;
        m.mechanical_unit_count = 2;
        m.sleeper_curb_count = 3;
        m.gas_penetration_count = 1;
        m
    }

    #[test]
    fn test_sbs_area_quantities() {
        let estimate = calculate_takeoff(&sbs_measurements(), &PriceBook::builtin());

        // ceil(10000 × 1.15 / 86) = 134
        let cap = find(&estimate.area_materials, "SBS Cap Sheet");
        assert_eq!(cap.quantity, 134.0);
        assert_eq!(cap.line_cost, round2(134.0 * 216.95));

        // ceil(10000 × 1.05 / 250) = 42
        assert_eq!(find(&estimate.area_materials, "Asphaltic Primer").quantity, 42.0);

        let ballast = find(&estimate.area_materials, "Gravel Ballast");
        assert_eq!(ballast.quantity, 10_000.0);
        assert_eq!(ballast.line_cost, 0.0);
        assert!(ballast.pricing_key.is_none());
    }

    #[test]
    fn test_linear_and_unit_items() {
        let estimate = calculate_takeoff(&sbs_measurements(), &PriceBook::builtin());

        // 400 × 1.1 在浮點數下略大於 440，故為 45
        assert_eq!(find(&estimate.linear_materials, "Metal Cap").quantity, 45.0);
        // ceil(400 × 1.15 / 8) = 58
        assert_eq!(find(&estimate.linear_materials, "Wood Blocking").quantity, 58.0);

        let curbs = find(&estimate.unit_items, "Mechanical Unit Curb");
        assert_eq!(curbs.quantity, 8.0);
        assert_eq!(curbs.bid_group, BidGroup::Mechanical);
        assert_eq!(find(&estimate.unit_items, "Sleeper Curb").quantity, 6.0);
        assert_eq!(
            find(&estimate.unit_items, "Gas ").name,
            "Gas Penetration Seal"
        );
        // 數量為零的項目不列出
        assert!(estimate.unit_items.iter().all(|i| !i.name.starts_with("Overflow")));
    }

    #[test]
    fn test_bid_summary_uses_system_multipliers() {
        let book = PriceBook::builtin();
        let estimate = calculate_takeoff(&sbs_measurements(), &book);
        let bid = &estimate.bid_summary;

        let roofing_flashing: f64 = estimate
            .line_items()
            .filter(|(_, item)| item.bid_group != BidGroup::Mechanical)
            .map(|(_, item)| item.quantity * book.price(item.pricing_key.as_deref().unwrap_or("")))
            .sum();
        let mechanical = 14.0 * book.price("Flashing_General");

        let expected = round2(roofing_flashing * 0.10 + roofing_flashing * 1.65 + mechanical * 1.80);
        assert!((bid.total_estimate - expected).abs() < 0.011);
        assert_eq!(bid.item_2_roofing_assembly_and_flashing.multiplier, 1.65);
        assert_eq!(bid.per_sqft, round2(bid.total_estimate / 10_000.0));
    }

    #[test]
    fn test_consumables_rate_per_thousand() {
        let mut m = RoofMeasurements::new(2_500.0, 200.0);
        m.roof_system_type = RoofSystemType::TpoMechanicallyAttached;
        let estimate = calculate_takeoff(&m, &PriceBook::builtin());

        // ceil(2.5 × 3) = 8, ceil(2.5 × 4) = 10
        assert_eq!(find(&estimate.consumables, "TPO Lap Sealant").quantity, 8.0);
        assert_eq!(find(&estimate.consumables, "Polyurethane Sealant").quantity, 10.0);
        assert!(estimate
            .area_materials
            .iter()
            .all(|item| !item.name.starts_with("Gravel")));
    }

    #[test]
    fn test_layer_toggles_and_zero_area() {
        let mut m = RoofMeasurements::new(0.0, 0.0).with_system(RoofSystemType::EpdmFullyAdhered);
        m.include_vapour_barrier = false;
        m.include_tapered = false;
        let estimate = calculate_takeoff(&m, &PriceBook::builtin());

        assert!(estimate
            .area_materials
            .iter()
            .all(|item| !item.name.starts_with("Vapour") && !item.name.starts_with("Tapered")));
        assert_eq!(estimate.bid_summary.total_estimate, 0.0);
        assert_eq!(estimate.bid_summary.per_sqft, 0.0);
    }

    #[test]
    fn test_large_counts_do_not_overflow() {
        let mut m = RoofMeasurements::new(10_000.0, 400.0);
        m.mechanical_unit_count = 2_000_000_000;
        m.plumbing_vent_count = u32::MAX;
        assert!(m.validate().is_ok());

        let estimate = calculate_takeoff(&m, &PriceBook::builtin());
        let curbs = find(&estimate.unit_items, "Mechanical Unit Curb");
        assert_eq!(curbs.quantity, 8_000_000_000.0);
        assert_eq!(estimate.project_measurements.total_penetrations, u32::MAX);
    }
}
