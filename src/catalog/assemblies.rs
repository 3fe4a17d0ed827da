use crate::domain::estimate::round2;
use crate::domain::model::RoofSystemType;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    Glued,
    Adhesive,
    Screwed,
    FullyAdhered,
    LooseLaid,
    MechanicallyAttached,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssemblyLayer {
    pub product: &'static str,
    pub layers: Option<u32>,
    pub attachment: Attachment,
}

/// 組合單價的預算系統
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assembly {
    pub key: &'static str,
    pub description: &'static str,
    pub base_cost_per_sqft: f64,
    pub layers: &'static [AssemblyLayer],
    pub required_materials: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'static str>,
    pub labour_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickEstimate {
    pub assembly: &'static str,
    pub area_sqft: f64,
    pub material_cost: f64,
    pub labour_cost: f64,
    pub total_cost: f64,
}

impl Assembly {
    /// 材料 = 面積 × 單價；總價 = 材料 + 材料 × 人工倍數
    pub fn quick_estimate(&self, area_sqft: f64) -> QuickEstimate {
        let material = area_sqft * self.base_cost_per_sqft;
        let labour = material * self.labour_multiplier;
        QuickEstimate {
            assembly: self.key,
            area_sqft,
            material_cost: round2(material),
            labour_cost: round2(labour),
            total_cost: round2(material + labour),
        }
    }
}

const fn ply(product: &'static str, layers: Option<u32>, attachment: Attachment) -> AssemblyLayer {
    AssemblyLayer {
        product,
        layers,
        attachment,
    }
}

pub const ASSEMBLIES: &[Assembly] = &[
    Assembly {
        key: "EPDM_60mil_Fully_Adhered",
        description: "EPDM 60 mil Fully Adhered System",
        base_cost_per_sqft: 6.00,
        layers: &[
            ply("Vapour_Barrier_Sopravapor", None, Attachment::Glued),
            ply("ISO_2_5_inch", Some(1), Attachment::Adhesive),
            ply("Densdeck_Half_Inch", Some(1), Attachment::Screwed),
            ply("EPDM_Membrane_60mil", Some(1), Attachment::FullyAdhered),
        ],
        required_materials: &[
            "EPDM_Primer_HP250",
            "EPDM_Bonding_Adhesive",
            "EPDM_Seam_Tape",
            "EPDM_Lap_Sealant",
        ],
        notes: None,
        labour_multiplier: 1.2,
    },
    Assembly {
        key: "EPDM_60mil_Ballasted",
        description: "EPDM 60 mil Ballasted/Inverted System",
        base_cost_per_sqft: 5.50,
        layers: &[
            ply("Vapour_Barrier_Sopravapor", None, Attachment::Glued),
            ply("EPDM_Membrane_60mil", Some(1), Attachment::LooseLaid),
            ply("EPS_Insulation_EPDM", Some(2), Attachment::LooseLaid),
            ply("EPDM_Filter_Fabric", None, Attachment::LooseLaid),
            ply("EPDM_Drainage_Mat", None, Attachment::LooseLaid),
        ],
        required_materials: &["EPDM_Seam_Tape", "EPDM_Lap_Sealant"],
        notes: Some("Requires ballast (gravel/pavers) not included in material pricing"),
        labour_multiplier: 1.0,
    },
    Assembly {
        key: "TPO_60mil_Mechanically_Attached",
        description: "TPO 60 mil Mechanically Attached System",
        base_cost_per_sqft: 5.50,
        layers: &[
            ply("Vapour_Barrier_Sopravapor", None, Attachment::Glued),
            ply("ISO_2_5_inch", Some(1), Attachment::Adhesive),
            ply("Densdeck_Half_Inch", Some(1), Attachment::Screwed),
            ply("TPO_Membrane", Some(1), Attachment::MechanicallyAttached),
        ],
        required_materials: &["TPO_Rhinobond_Plate", "TPO_Screws", "TPO_Lap_Sealant"],
        notes: None,
        labour_multiplier: 1.1,
    },
    Assembly {
        key: "TPO_60mil_Fully_Adhered",
        description: "TPO 60 mil Fully Adhered System",
        base_cost_per_sqft: 6.50,
        layers: &[
            ply("Vapour_Barrier_Sopravapor", None, Attachment::Glued),
            ply("ISO_2_5_inch", Some(1), Attachment::Adhesive),
            ply("Soprasmart_ISO_HD", Some(1), Attachment::Adhesive),
            ply("TPO_Membrane", Some(1), Attachment::FullyAdhered),
        ],
        required_materials: &["TPO_Primer", "TPO_Bonding_Adhesive_SureWeld", "TPO_Lap_Sealant"],
        notes: None,
        labour_multiplier: 1.3,
    },
];

pub fn find(key: &str) -> Option<&'static Assembly> {
    ASSEMBLIES.iter().find(|assembly| assembly.key == key)
}

/// SBS 沒有對應的組合單價
pub fn for_system(system: RoofSystemType) -> Option<&'static Assembly> {
    let key = match system {
        RoofSystemType::Sbs => return None,
        RoofSystemType::EpdmFullyAdhered => "EPDM_60mil_Fully_Adhered",
        RoofSystemType::EpdmBallasted => "EPDM_60mil_Ballasted",
        RoofSystemType::TpoMechanicallyAttached => "TPO_60mil_Mechanically_Attached",
        RoofSystemType::TpoFullyAdhered => "TPO_60mil_Fully_Adhered",
    };
    find(key)
}
