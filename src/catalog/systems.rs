use crate::domain::estimate::BidGroup;
use crate::domain::model::{RoofMeasurements, RoofSystemType};
use serde::Serialize;

/// 面積來源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaSource {
    RoofArea,
    TaperedArea,
    BallastArea,
}

impl AreaSource {
    pub fn area(&self, m: &RoofMeasurements) -> f64 {
        match self {
            AreaSource::RoofArea => m.total_roof_area_sqft,
            AreaSource::TaperedArea => m.effective_tapered_area(),
            AreaSource::BallastArea => m.effective_ballast_area(),
        }
    }
}

/// 層次角色，對應量測資料中的 include_* 開關
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    VapourBarrier,
    Insulation,
    TaperedInsulation,
    Coverboard,
    Membrane,
    Drainage,
    Accessory,
}

impl LayerRole {
    pub fn is_enabled(&self, m: &RoofMeasurements) -> bool {
        match self {
            LayerRole::VapourBarrier => m.include_vapour_barrier,
            LayerRole::Insulation => m.include_insulation,
            LayerRole::TaperedInsulation => m.include_tapered,
            LayerRole::Coverboard => m.include_coverboard,
            LayerRole::Drainage => m.include_drainage,
            LayerRole::Membrane | LayerRole::Accessory => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaLayer {
    pub name: &'static str,
    pub pricing_key: &'static str,
    pub unit: &'static str,
    pub sqft_per_unit: f64,
    pub area_source: AreaSource,
    pub waste_pct: f64,
    pub bid_group: BidGroup,
    pub role: LayerRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Consumable {
    pub name: &'static str,
    pub pricing_key: &'static str,
    pub unit: &'static str,
    pub rate_per_1000_sqft: f64,
    pub bid_group: BidGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemMeta {
    pub display_name: &'static str,
    pub spec: &'static str,
    pub labour_multiplier: f64,
    pub labour_note: &'static str,
    pub mechanical_multiplier: f64,
    pub include_ballast_note: bool,
}

/// 管線穿孔密封產品
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipeSeal {
    pub pricing_key: &'static str,
    pub name: &'static str,
}

const fn layer(
    name: &'static str,
    pricing_key: &'static str,
    unit: &'static str,
    sqft_per_unit: f64,
    area_source: AreaSource,
    waste_pct: f64,
    role: LayerRole,
) -> AreaLayer {
    AreaLayer {
        name,
        pricing_key,
        unit,
        sqft_per_unit,
        area_source,
        waste_pct,
        bid_group: BidGroup::Roofing,
        role,
    }
}

const fn consumable(
    name: &'static str,
    pricing_key: &'static str,
    unit: &'static str,
    rate_per_1000_sqft: f64,
    bid_group: BidGroup,
) -> Consumable {
    Consumable {
        name,
        pricing_key,
        unit,
        rate_per_1000_sqft,
        bid_group,
    }
}

use AreaSource::{RoofArea, TaperedArea};
use LayerRole::{Accessory, Coverboard, Drainage, Insulation, Membrane, TaperedInsulation, VapourBarrier};

const VAPOUR_BARRIER: AreaLayer = layer(
    "Vapour Barrier (Sopravap'r WG 45\")",
    "Vapour_Barrier_Sopravapor",
    "roll (45\" x 5Sq)",
    500.0,
    RoofArea,
    0.10,
    VapourBarrier,
);

const ISO_2_5: AreaLayer = layer(
    "ISO Insulation 2.5\" (Sopra-ISO)",
    "ISO_2_5_inch",
    "sheet (4'x4')",
    16.0,
    RoofArea,
    0.10,
    Insulation,
);

const TAPERED_ISO: AreaLayer = layer(
    "Tapered ISO Insulation (drainage slope)",
    "Tapered_ISO",
    "sqft",
    1.0,
    TaperedArea,
    0.10,
    TaperedInsulation,
);

const DENSDECK: AreaLayer = layer(
    "Densdeck Coverboard 1/2\"",
    "Densdeck_Half_Inch",
    "sheet (4'x8')",
    32.0,
    RoofArea,
    0.10,
    Coverboard,
);

const TPO_MEMBRANE: AreaLayer = layer(
    "TPO Membrane 60 mil (Sure-Weld)",
    "TPO_Membrane",
    "roll (10'x100')",
    1000.0,
    RoofArea,
    0.10,
    Membrane,
);

const EPDM_SEAM_TAPE: AreaLayer = layer(
    "EPDM Seam Tape 3\"x100'",
    "EPDM_Seam_Tape",
    "roll (100 lf)",
    1000.0,
    RoofArea,
    0.10,
    Accessory,
);

const SBS_LAYERS: &[AreaLayer] = &[
    layer("Asphaltic Primer", "Primer", "pail (5 gal)", 250.0, RoofArea, 0.05, Accessory),
    layer(
        "SBS Base Sheet (Sopraply Base 520)",
        "Base_Membrane",
        "roll",
        100.0,
        RoofArea,
        0.15,
        Membrane,
    ),
    layer(
        "SBS Cap Sheet (Sopraply Traffic Cap)",
        "Cap_Membrane",
        "roll",
        86.0,
        RoofArea,
        0.15,
        Membrane,
    ),
    layer(
        "Tapered ISO Insulation (Soprasmart Board 2:1)",
        "Polyisocyanurate_ISO_Insulation",
        "sheet (4'x4')",
        16.0,
        TaperedArea,
        0.10,
        TaperedInsulation,
    ),
    layer(
        "XPS Insulation (Sopra-XPS 40 Type 4)",
        "XPS_Insulation",
        "sheet (2'x8')",
        16.0,
        RoofArea,
        0.10,
        Insulation,
    ),
    layer(
        "Drainage Board (Sopradrain EcoVent)",
        "Drainage_Board",
        "roll (6'x50')",
        300.0,
        RoofArea,
        0.10,
        Drainage,
    ),
    layer(
        "Filter Fabric",
        "Fleece_Reinforcement_Fabric",
        "roll",
        300.0,
        RoofArea,
        0.10,
        Drainage,
    ),
];

const EPDM_FULLY_ADHERED_LAYERS: &[AreaLayer] = &[
    VAPOUR_BARRIER,
    ISO_2_5,
    TAPERED_ISO,
    DENSDECK,
    layer(
        "EPDM Membrane 60 mil (Carlisle Sure-Seal)",
        "EPDM_Membrane_60mil",
        "roll (10'x100')",
        1000.0,
        RoofArea,
        0.10,
        Membrane,
    ),
    layer(
        "EPDM Bonding Adhesive 90-8-30A",
        "EPDM_Bonding_Adhesive",
        "pail (5 gal)",
        300.0,
        RoofArea,
        0.05,
        Accessory,
    ),
    layer(
        "EPDM Primer HP-250",
        "EPDM_Primer_HP250",
        "gallon",
        50.0,
        RoofArea,
        0.05,
        Accessory,
    ),
    EPDM_SEAM_TAPE,
];

const EPDM_BALLASTED_LAYERS: &[AreaLayer] = &[
    VAPOUR_BARRIER,
    layer(
        "EPDM Membrane 60 mil (Carlisle Sure-Seal, loose laid)",
        "EPDM_Membrane_60mil",
        "roll (10'x100')",
        1000.0,
        RoofArea,
        0.10,
        Membrane,
    ),
    layer(
        "EPS Insulation Type II (2 layers x 2.5\")",
        "EPS_Insulation_EPDM",
        "sheet (4'x4')",
        8.0,
        RoofArea,
        0.10,
        Insulation,
    ),
    layer(
        "Filter Fabric (Soprafilter)",
        "EPDM_Filter_Fabric",
        "roll",
        300.0,
        RoofArea,
        0.10,
        Drainage,
    ),
    layer(
        "Drainage Mat (Sopradrain 15G 6'x50')",
        "EPDM_Drainage_Mat",
        "roll (6'x50')",
        300.0,
        RoofArea,
        0.10,
        Drainage,
    ),
    EPDM_SEAM_TAPE,
];

const TPO_MECHANICALLY_ATTACHED_LAYERS: &[AreaLayer] = &[
    VAPOUR_BARRIER,
    ISO_2_5,
    TAPERED_ISO,
    DENSDECK,
    TPO_MEMBRANE,
    layer(
        "Rhinobond Induction Weld Plates",
        "TPO_Rhinobond_Plate",
        "pallet",
        4000.0,
        RoofArea,
        0.05,
        Accessory,
    ),
    layer("TPO Fastening Screws", "TPO_Screws", "box", 4000.0, RoofArea, 0.05, Accessory),
];

const TPO_FULLY_ADHERED_LAYERS: &[AreaLayer] = &[
    VAPOUR_BARRIER,
    ISO_2_5,
    TAPERED_ISO,
    layer(
        "Soprasmart ISO HD 1/2\" (factory laminated coverboard)",
        "Soprasmart_ISO_HD",
        "sheet (4'x8')",
        32.0,
        RoofArea,
        0.10,
        Coverboard,
    ),
    TPO_MEMBRANE,
    layer(
        "TPO Bonding Adhesive (SureWeld)",
        "TPO_Bonding_Adhesive_SureWeld",
        "pail (5 gal)",
        300.0,
        RoofArea,
        0.05,
        Accessory,
    ),
    layer("TPO Primer", "TPO_Primer", "gallon", 100.0, RoofArea, 0.05, Accessory),
];

const POLYURETHANE_SEALANT: Consumable = consumable(
    "Polyurethane Sealant (Dymonic 100 / NP1)",
    "Sealant_General",
    "tube",
    4.0,
    BidGroup::Flashing,
);

const EPDM_LAP_SEALANT: Consumable =
    consumable("EPDM Lap Sealant", "EPDM_Lap_Sealant", "tube", 4.0, BidGroup::Roofing);

const TPO_LAP_SEALANT: Consumable =
    consumable("TPO Lap Sealant", "TPO_Lap_Sealant", "tube", 3.0, BidGroup::Roofing);

const SBS_CONSUMABLES: &[Consumable] = &[
    consumable("Mastic (Sopramastic)", "Mastic", "pail", 2.0, BidGroup::Roofing),
    consumable(
        "Elastocol Adhesive",
        "Adhesive_Elastocol",
        "pail (19L)",
        3.0,
        BidGroup::Roofing,
    ),
    consumable(
        "Polyurethane Sealant (Dymonic 100 / NP1)",
        "Sealant_General",
        "tube",
        6.0,
        BidGroup::Flashing,
    ),
];

const EPDM_FULLY_ADHERED_CONSUMABLES: &[Consumable] = &[
    EPDM_LAP_SEALANT,
    consumable(
        "Duotack Foamable Adhesive (insulation bonding)",
        "Duotack_Adhesive",
        "case",
        2.0,
        BidGroup::Roofing,
    ),
    POLYURETHANE_SEALANT,
];

const EPDM_BALLASTED_CONSUMABLES: &[Consumable] = &[EPDM_LAP_SEALANT, POLYURETHANE_SEALANT];

const TPO_CONSUMABLES: &[Consumable] = &[TPO_LAP_SEALANT, POLYURETHANE_SEALANT];

pub fn area_layers(system: RoofSystemType) -> &'static [AreaLayer] {
    match system {
        RoofSystemType::Sbs => SBS_LAYERS,
        RoofSystemType::EpdmFullyAdhered => EPDM_FULLY_ADHERED_LAYERS,
        RoofSystemType::EpdmBallasted => EPDM_BALLASTED_LAYERS,
        RoofSystemType::TpoMechanicallyAttached => TPO_MECHANICALLY_ATTACHED_LAYERS,
        RoofSystemType::TpoFullyAdhered => TPO_FULLY_ADHERED_LAYERS,
    }
}

pub fn consumables(system: RoofSystemType) -> &'static [Consumable] {
    match system {
        RoofSystemType::Sbs => SBS_CONSUMABLES,
        RoofSystemType::EpdmFullyAdhered => EPDM_FULLY_ADHERED_CONSUMABLES,
        RoofSystemType::EpdmBallasted => EPDM_BALLASTED_CONSUMABLES,
        RoofSystemType::TpoMechanicallyAttached | RoofSystemType::TpoFullyAdhered => {
            TPO_CONSUMABLES
        }
    }
}

pub fn meta(system: RoofSystemType) -> SystemMeta {
    match system {
        RoofSystemType::Sbs => SystemMeta {
            display_name: "Inverted Modified Bitumen (2-Ply SBS) - Soprema System",
            spec: "Div 07 52 01 / 07 62 00 / 07 92 00",
            labour_multiplier: 1.65,
            labour_note: "Labour typically 1.5-1.8x material for SBS torch-applied",
            mechanical_multiplier: 1.80,
            include_ballast_note: true,
        },
        RoofSystemType::EpdmFullyAdhered => SystemMeta {
            display_name: "EPDM 60 mil Fully Adhered System",
            spec: "Div 07 53 23",
            labour_multiplier: 1.55,
            labour_note: "Labour typically 1.4-1.6x material for EPDM fully adhered",
            mechanical_multiplier: 1.80,
            include_ballast_note: false,
        },
        RoofSystemType::EpdmBallasted => SystemMeta {
            display_name: "EPDM 60 mil Ballasted / Inverted System",
            spec: "Div 07 53 23",
            labour_multiplier: 1.40,
            labour_note: "Labour typically 1.3-1.5x material for EPDM ballasted",
            mechanical_multiplier: 1.70,
            include_ballast_note: true,
        },
        RoofSystemType::TpoMechanicallyAttached => SystemMeta {
            display_name: "TPO 60 mil Mechanically Attached System",
            spec: "Div 07 54 23",
            labour_multiplier: 1.50,
            labour_note: "Labour typically 1.4-1.6x material for TPO mechanically attached",
            mechanical_multiplier: 1.80,
            include_ballast_note: false,
        },
        RoofSystemType::TpoFullyAdhered => SystemMeta {
            display_name: "TPO 60 mil Fully Adhered System",
            spec: "Div 07 54 23",
            labour_multiplier: 1.65,
            labour_note: "Labour typically 1.5-1.8x material for TPO fully adhered",
            mechanical_multiplier: 1.80,
            include_ballast_note: false,
        },
    }
}

pub fn pipe_seal(system: RoofSystemType) -> PipeSeal {
    match system {
        RoofSystemType::Sbs => PipeSeal {
            pricing_key: "Pipe_Boot_Seal",
            name: "Penetration Seal",
        },
        RoofSystemType::EpdmFullyAdhered | RoofSystemType::EpdmBallasted => PipeSeal {
            pricing_key: "EPDM_Pipe_Flashing",
            name: "EPDM Pipe Flashing (1\"-6\")",
        },
        RoofSystemType::TpoMechanicallyAttached | RoofSystemType::TpoFullyAdhered => PipeSeal {
            pricing_key: "TPO_Pipe_Boot",
            name: "TPO Universal Pipe Boot",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::pricing::PriceBook;

    #[test]
    fn test_every_system_has_membrane_and_consumables() {
        for system in RoofSystemType::ALL {
            let layers = area_layers(system);
            assert!(layers.iter().any(|l| l.role == LayerRole::Membrane), "{}", system);
            assert!(!consumables(system).is_empty());
            assert!(layers.iter().all(|l| l.sqft_per_unit > 0.0));
        }
    }

    #[test]
    fn test_system_keys_are_priced() {
        let book = PriceBook::builtin();
        for system in RoofSystemType::ALL {
            for layer in area_layers(system) {
                assert!(book.price(layer.pricing_key) > 0.0, "{}", layer.pricing_key);
            }
            assert!(book.price(pipe_seal(system).pricing_key) > 0.0);
        }
    }

    #[test]
    fn test_toggles_disable_roles() {
        let mut m = RoofMeasurements::new(1000.0, 100.0);
        m.include_drainage = false;
        assert!(!LayerRole::Drainage.is_enabled(&m));
        assert!(LayerRole::Membrane.is_enabled(&m));
        assert_eq!(meta(RoofSystemType::EpdmBallasted).mechanical_multiplier, 1.70);
    }
}
