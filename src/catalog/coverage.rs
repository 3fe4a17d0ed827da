use crate::domain::model::MeasurementField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 一個採購單位可覆蓋的面積、長度或數量
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coverage {
    PerArea { sqft_per_unit: f64, unit: &'static str },
    PerLength { lf_per_unit: f64, unit: &'static str },
    PerEach { per_each: f64, unit: &'static str },
}

impl Coverage {
    pub fn unit(&self) -> &'static str {
        match self {
            Coverage::PerArea { unit, .. }
            | Coverage::PerLength { unit, .. }
            | Coverage::PerEach { unit, .. } => unit,
        }
    }

    pub fn sqft_per_unit(&self) -> Option<f64> {
        match self {
            Coverage::PerArea { sqft_per_unit, .. } => Some(*sqft_per_unit),
            _ => None,
        }
    }

    pub fn lf_per_unit(&self) -> Option<f64> {
        match self {
            Coverage::PerLength { lf_per_unit, .. } => Some(*lf_per_unit),
            _ => None,
        }
    }

    pub fn per_each(&self) -> Option<f64> {
        match self {
            Coverage::PerEach { per_each, .. } => Some(*per_each),
            _ => None,
        }
    }
}

const fn area(sqft_per_unit: f64, unit: &'static str) -> Coverage {
    Coverage::PerArea { sqft_per_unit, unit }
}

const fn length(lf_per_unit: f64, unit: &'static str) -> Coverage {
    Coverage::PerLength { lf_per_unit, unit }
}

const fn each(per_each: f64, unit: &'static str) -> Coverage {
    Coverage::PerEach { per_each, unit }
}

pub const COVERAGE_RATES: &[(&str, Coverage)] = &[
    ("Primer", area(250.0, "pail")),
    ("Base_Membrane", area(100.0, "roll")),
    ("Cap_Membrane", area(86.0, "roll")),
    ("SBS_Membrane", area(100.0, "roll")),
    ("EPDM_Membrane", area(100.0, "roll")),
    ("TPO_Membrane", area(100.0, "roll")),
    ("PVC_Membrane", area(100.0, "roll")),
    ("Vapour_Barrier_Membrane", area(200.0, "roll")),
    ("EPDM_Accessory", area(50.0, "roll")),
    ("TPO_Accessory", area(50.0, "piece")),
    ("Polyisocyanurate_ISO_Insulation", area(16.0, "sheet (4'x4')")),
    ("XPS_Insulation", area(16.0, "sheet (2'x8')")),
    ("Fiberboard_Insulation", area(8.0, "sheet (2'x4')")),
    ("Batt_Insulation", area(40.0, "bundle")),
    ("DensDeck_Coverboard", area(32.0, "sheet (4'x8')")),
    ("Gypsum_Fiber_Coverboard", area(32.0, "sheet (4'x8')")),
    ("Drainage_Board", area(300.0, "roll (6'x50')")),
    ("Fleece_Reinforcement_Fabric", area(300.0, "roll")),
    ("Flashing_General", length(10.0, "10ft piece")),
    ("Coated_Metal_Sheet", area(40.0, "sheet (4'x10')")),
    ("Metal_Panel", length(1.0, "lin ft")),
    ("Standing_Seam_Metal", length(1.0, "lin ft")),
    ("Drip_Edge", length(10.0, "10ft piece")),
    ("Wood_Blocking_Lumber", length(8.0, "8ft piece")),
    ("Plywood_Sheathing", length(8.0, "4'x8' sheet")),
    ("Mastic", area(500.0, "pail")),
    ("Adhesive", area(200.0, "pail")),
    ("Adhesive_Elastocol", area(333.0, "pail (19L)")),
    ("Sealant_General", length(20.0, "tube")),
    ("Coating_Paint", area(200.0, "pail")),
    ("Tape", length(150.0, "roll")),
    ("Walkway_Pads", area(12.0, "pad")),
    ("Roof_Drain", each(1.0, "EA")),
    ("Scupper", each(1.0, "EA")),
    ("Gooseneck_Vent", each(1.0, "EA")),
    ("Pipe_Boot_Seal", each(1.0, "EA")),
    ("Plumbing_Vent", each(1.0, "EA")),
    ("Vent_Cap", each(1.0, "EA")),
    ("Roof_Hatch", each(1.0, "EA")),
    ("Roof_Anchor", each(1.0, "EA")),
    ("Gutter_Downpipe", each(1.0, "EA")),
    ("Clips", each(1.0, "piece")),
    ("Fasteners", area(100.0, "box (1M)")),
    ("Insulation_Plates", area(100.0, "box (1M)")),
    ("Nails_Staples", area(200.0, "box")),
    ("Screws", area(100.0, "box")),
    ("Equipment_Torch", area(100.0, "roll")),
];

pub fn coverage_for(pricing_key: &str) -> Option<Coverage> {
    COVERAGE_RATES
        .iter()
        .find(|(key, _)| *key == pricing_key)
        .map(|(_, coverage)| *coverage)
}

/// 細部圖的計量方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Sqft,
    LinearFt,
    Each,
}

impl MeasurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::Sqft => "sqft",
            MeasurementKind::LinearFt => "linear_ft",
            MeasurementKind::Each => "each",
        }
    }

    /// 無法辨識的字串視為逐項計數
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqft" => MeasurementKind::Sqft,
            "linear_ft" => MeasurementKind::LinearFt,
            _ => MeasurementKind::Each,
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// detail_type → (計量方式, 量測欄位)
pub const DETAIL_TYPE_MAP: &[(&str, MeasurementKind, MeasurementField)] = &[
    ("field_assembly", MeasurementKind::Sqft, MeasurementField::TotalRoofAreaSqft),
    ("parapet", MeasurementKind::LinearFt, MeasurementField::ParapetLengthLf),
    ("curtain_wall", MeasurementKind::LinearFt, MeasurementField::ParapetLengthLf),
    ("drain", MeasurementKind::Each, MeasurementField::RoofDrainCount),
    ("mechanical_curb", MeasurementKind::Each, MeasurementField::MechanicalUnitCount),
    ("sleeper_curb", MeasurementKind::Each, MeasurementField::SleeperCurbCount),
    ("penetration_gas", MeasurementKind::Each, MeasurementField::GasPenetrationCount),
    (
        "penetration_electrical",
        MeasurementKind::Each,
        MeasurementField::ElectricalPenetrationCount,
    ),
    ("penetration_plumbing", MeasurementKind::Each, MeasurementField::PlumbingVentCount),
    ("vent_hood", MeasurementKind::Each, MeasurementField::VentHoodCount),
    ("scupper", MeasurementKind::Each, MeasurementField::ScupperCount),
    ("expansion_joint", MeasurementKind::LinearFt, MeasurementField::PerimeterLf),
    ("pipe_support", MeasurementKind::Each, MeasurementField::PlumbingVentCount),
    ("opening_cover", MeasurementKind::Each, MeasurementField::MechanicalUnitCount),
];

pub fn detail_type_mapping(detail_type: &str) -> Option<(MeasurementKind, MeasurementField)> {
    DETAIL_TYPE_MAP
        .iter()
        .find(|(name, _, _)| *name == detail_type)
        .map(|(_, kind, field)| (*kind, *field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_lookup() {
        assert_eq!(coverage_for("Cap_Membrane").and_then(|c| c.sqft_per_unit()), Some(86.0));
        assert_eq!(
            coverage_for("Flashing_General").and_then(|c| c.lf_per_unit()),
            Some(10.0)
        );
        assert_eq!(coverage_for("Roof_Drain").map(|c| c.unit()), Some("EA"));
        assert!(coverage_for("CUSTOM").is_none());
    }

    #[test]
    fn test_detail_type_mapping() {
        assert_eq!(
            detail_type_mapping("parapet"),
            Some((MeasurementKind::LinearFt, MeasurementField::ParapetLengthLf))
        );
        assert_eq!(
            detail_type_mapping("expansion_joint"),
            Some((MeasurementKind::LinearFt, MeasurementField::PerimeterLf))
        );
        assert!(detail_type_mapping("skylight").is_none());
    }
}
