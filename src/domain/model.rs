use crate::utils::error::{EstimatorError, Result};
use crate::utils::validation::{validate_measurement, Validate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 五種低坡度屋面系統
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum RoofSystemType {
    #[default]
    #[serde(rename = "SBS")]
    Sbs,
    #[serde(rename = "EPDM_Fully_Adhered")]
    EpdmFullyAdhered,
    #[serde(rename = "EPDM_Ballasted")]
    EpdmBallasted,
    #[serde(rename = "TPO_Mechanically_Attached")]
    TpoMechanicallyAttached,
    #[serde(rename = "TPO_Fully_Adhered")]
    TpoFullyAdhered,
}

impl RoofSystemType {
    pub const ALL: [RoofSystemType; 5] = [
        RoofSystemType::Sbs,
        RoofSystemType::EpdmFullyAdhered,
        RoofSystemType::EpdmBallasted,
        RoofSystemType::TpoMechanicallyAttached,
        RoofSystemType::TpoFullyAdhered,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RoofSystemType::Sbs => "SBS",
            RoofSystemType::EpdmFullyAdhered => "EPDM_Fully_Adhered",
            RoofSystemType::EpdmBallasted => "EPDM_Ballasted",
            RoofSystemType::TpoMechanicallyAttached => "TPO_Mechanically_Attached",
            RoofSystemType::TpoFullyAdhered => "TPO_Fully_Adhered",
        }
    }

    pub fn is_epdm(&self) -> bool {
        matches!(
            self,
            RoofSystemType::EpdmFullyAdhered | RoofSystemType::EpdmBallasted
        )
    }

    pub fn is_tpo(&self) -> bool {
        matches!(
            self,
            RoofSystemType::TpoMechanicallyAttached | RoofSystemType::TpoFullyAdhered
        )
    }
}

impl fmt::Display for RoofSystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RoofSystemType {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        RoofSystemType::ALL
            .iter()
            .copied()
            .find(|system| system.key().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| EstimatorError::InvalidConfigValueError {
                field: "roof_system_type".to_string(),
                value: s.to_string(),
                reason: format!(
                    "Unknown roof system. Valid systems: {}",
                    RoofSystemType::ALL
                        .iter()
                        .map(|system| system.key())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
    }
}

/// 量測來源欄位，供細部圖對照表與單位對照使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementField {
    TotalRoofAreaSqft,
    PerimeterLf,
    ParapetLengthLf,
    RoofDrainCount,
    ScupperCount,
    MechanicalUnitCount,
    SleeperCurbCount,
    VentHoodCount,
    GasPenetrationCount,
    ElectricalPenetrationCount,
    PlumbingVentCount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoofSection {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_section_count")]
    pub count: u32,
    pub length_ft: f64,
    pub width_ft: f64,
}

fn default_section_count() -> u32 {
    1
}

impl RoofSection {
    pub fn area_sqft(&self) -> f64 {
        f64::from(self.count.max(1)) * self.length_ft * self.width_ft
    }
}

fn default_parapet_height() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

/// 從比例圖面量得的屋面數據
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoofMeasurements {
    #[serde(default)]
    pub total_roof_area_sqft: f64,
    #[serde(default)]
    pub perimeter_lf: f64,
    /// 0 表示與周長相同
    #[serde(default)]
    pub parapet_length_lf: f64,
    #[serde(default = "default_parapet_height")]
    pub parapet_height_ft: f64,

    #[serde(default)]
    pub roof_drain_count: u32,
    #[serde(default)]
    pub scupper_count: u32,

    #[serde(default)]
    pub mechanical_unit_count: u32,
    #[serde(default)]
    pub sleeper_curb_count: u32,
    #[serde(default)]
    pub vent_hood_count: u32,
    #[serde(default)]
    pub gas_penetration_count: u32,
    #[serde(default)]
    pub electrical_penetration_count: u32,
    #[serde(default)]
    pub plumbing_vent_count: u32,

    #[serde(default)]
    pub tapered_area_sqft: Option<f64>,
    #[serde(default)]
    pub ballast_area_sqft: Option<f64>,

    #[serde(default)]
    pub roof_system_type: RoofSystemType,

    #[serde(default)]
    pub roof_sections: Vec<RoofSection>,

    #[serde(default = "default_true")]
    pub include_vapour_barrier: bool,
    #[serde(default = "default_true")]
    pub include_insulation: bool,
    #[serde(default = "default_true")]
    pub include_coverboard: bool,
    #[serde(default = "default_true")]
    pub include_tapered: bool,
    #[serde(default = "default_true")]
    pub include_drainage: bool,
}

impl Default for RoofMeasurements {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl RoofMeasurements {
    pub fn new(total_roof_area_sqft: f64, perimeter_lf: f64) -> Self {
        Self {
            total_roof_area_sqft,
            perimeter_lf,
            parapet_length_lf: perimeter_lf,
            parapet_height_ft: default_parapet_height(),
            roof_drain_count: 0,
            scupper_count: 0,
            mechanical_unit_count: 0,
            sleeper_curb_count: 0,
            vent_hood_count: 0,
            gas_penetration_count: 0,
            electrical_penetration_count: 0,
            plumbing_vent_count: 0,
            tapered_area_sqft: None,
            ballast_area_sqft: None,
            roof_system_type: RoofSystemType::Sbs,
            roof_sections: Vec::new(),
            include_vapour_barrier: true,
            include_insulation: true,
            include_coverboard: true,
            include_tapered: true,
            include_drainage: true,
        }
    }

    pub fn with_system(mut self, system: RoofSystemType) -> Self {
        self.roof_system_type = system;
        self
    }

    pub fn effective_tapered_area(&self) -> f64 {
        self.tapered_area_sqft.unwrap_or(self.total_roof_area_sqft)
    }

    pub fn effective_ballast_area(&self) -> f64 {
        self.ballast_area_sqft.unwrap_or(self.total_roof_area_sqft)
    }

    /// 設備與穿孔數量總和（不含落水頭與溢流口）
    pub fn total_penetrations(&self) -> u32 {
        [
            self.mechanical_unit_count,
            self.sleeper_curb_count,
            self.vent_hood_count,
            self.gas_penetration_count,
            self.electrical_penetration_count,
            self.plumbing_vent_count,
        ]
        .into_iter()
        .fold(0, u32::saturating_add)
    }

    pub fn sections_area(&self) -> f64 {
        self.roof_sections.iter().map(RoofSection::area_sqft).sum()
    }

    /// 面積恰為 0 時才以分區加總；負值與 NaN 原樣保留交由 validate 拒絕
    pub fn effective_roof_area(&self) -> f64 {
        if self.total_roof_area_sqft == 0.0 {
            self.sections_area()
        } else {
            self.total_roof_area_sqft
        }
    }

    /// 套用預設值：面積為 0 時以分區加總，女兒牆長度為 0 時沿用周長
    pub fn normalize(mut self) -> Self {
        self.total_roof_area_sqft = self.effective_roof_area();
        if self.parapet_length_lf == 0.0 {
            self.parapet_length_lf = self.perimeter_lf;
        }
        self
    }

    pub fn value(&self, field: MeasurementField) -> f64 {
        match field {
            MeasurementField::TotalRoofAreaSqft => self.total_roof_area_sqft,
            MeasurementField::PerimeterLf => self.perimeter_lf,
            MeasurementField::ParapetLengthLf => self.parapet_length_lf,
            other => f64::from(self.count(other)),
        }
    }

    pub fn count(&self, field: MeasurementField) -> u32 {
        match field {
            MeasurementField::RoofDrainCount => self.roof_drain_count,
            MeasurementField::ScupperCount => self.scupper_count,
            MeasurementField::MechanicalUnitCount => self.mechanical_unit_count,
            MeasurementField::SleeperCurbCount => self.sleeper_curb_count,
            MeasurementField::VentHoodCount => self.vent_hood_count,
            MeasurementField::GasPenetrationCount => self.gas_penetration_count,
            MeasurementField::ElectricalPenetrationCount => self.electrical_penetration_count,
            MeasurementField::PlumbingVentCount => self.plumbing_vent_count,
            MeasurementField::TotalRoofAreaSqft
            | MeasurementField::PerimeterLf
            | MeasurementField::ParapetLengthLf => 0,
        }
    }
}

impl Validate for RoofMeasurements {
    fn validate(&self) -> Result<()> {
        validate_measurement("total_roof_area_sqft", self.total_roof_area_sqft)?;
        validate_measurement("perimeter_lf", self.perimeter_lf)?;
        validate_measurement("parapet_length_lf", self.parapet_length_lf)?;
        validate_measurement("parapet_height_ft", self.parapet_height_ft)?;
        if let Some(area) = self.tapered_area_sqft {
            validate_measurement("tapered_area_sqft", area)?;
        }
        if let Some(area) = self.ballast_area_sqft {
            validate_measurement("ballast_area_sqft", area)?;
        }
        for (i, section) in self.roof_sections.iter().enumerate() {
            validate_measurement(&format!("roof_sections[{}].length_ft", i), section.length_ft)?;
            validate_measurement(&format!("roof_sections[{}].width_ft", i), section.width_ft)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_type_parsing() {
        assert_eq!(
            "TPO_Fully_Adhered".parse::<RoofSystemType>().unwrap(),
            RoofSystemType::TpoFullyAdhered
        );
        assert_eq!("sbs".parse::<RoofSystemType>().unwrap(), RoofSystemType::Sbs);
        let err = "PVC".parse::<RoofSystemType>().unwrap_err();
        assert!(err.to_string().contains("roof_system_type"));
    }

    #[test]
    fn test_defaults_from_minimal_json() {
        let m: RoofMeasurements =
            serde_json::from_str(r#"{"total_roof_area_sqft": 10000, "perimeter_lf": 400}"#)
                .unwrap();
        assert_eq!(m.parapet_height_ft, 2.0);
        assert_eq!(m.roof_system_type, RoofSystemType::Sbs);
        assert!(m.include_vapour_barrier && m.include_drainage);

        let m = m.normalize();
        assert_eq!(m.parapet_length_lf, 400.0);
    }

    #[test]
    fn test_effective_areas_and_penetrations() {
        let mut m = RoofMeasurements::new(10_000.0, 400.0);
        m.tapered_area_sqft = Some(2_500.0);
        m.mechanical_unit_count = 2;
        m.sleeper_curb_count = 3;
        m.plumbing_vent_count = 4;
        m.roof_drain_count = 6;

        assert_eq!(m.effective_tapered_area(), 2_500.0);
        assert_eq!(m.effective_ballast_area(), 10_000.0);
        assert_eq!(m.total_penetrations(), 9);
        assert_eq!(m.value(MeasurementField::RoofDrainCount), 6.0);
    }

    #[test]
    fn test_sections_fill_missing_area() {
        let mut m = RoofMeasurements::new(0.0, 300.0);
        m.roof_sections = vec![
            RoofSection {
                name: "Main".to_string(),
                count: 1,
                length_ft: 100.0,
                width_ft: 50.0,
            },
            RoofSection {
                name: "Canopy".to_string(),
                count: 2,
                length_ft: 10.0,
                width_ft: 10.0,
            },
        ];
        assert_eq!(m.normalize().total_roof_area_sqft, 5_200.0);
    }

    #[test]
    fn test_validation_rejects_negative_values() {
        let m = RoofMeasurements::new(-5.0, 100.0);
        assert!(m.validate().is_err());
        assert!(RoofMeasurements::new(5.0, 100.0).validate().is_ok());
    }

    #[test]
    fn test_normalize_keeps_invalid_area_for_validation() {
        for area in [-5_000.0, f64::NAN] {
            let m = RoofMeasurements::new(area, 100.0).normalize();
            assert!(m.total_roof_area_sqft.is_nan() || m.total_roof_area_sqft < 0.0);
            assert!(m.validate().is_err());
        }
    }

    #[test]
    fn test_total_penetrations_saturates() {
        let mut m = RoofMeasurements::new(10_000.0, 400.0);
        m.mechanical_unit_count = u32::MAX;
        m.plumbing_vent_count = 5;
        assert_eq!(m.total_penetrations(), u32::MAX);
    }
}
