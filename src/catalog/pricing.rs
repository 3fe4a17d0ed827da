use crate::utils::error::{EstimatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// 價格來源表，查價時依此順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTable {
    General,
    Epdm,
    Tpo,
    Common,
    Composite,
}

impl PriceTable {
    pub const LOOKUP_ORDER: [PriceTable; 5] = [
        PriceTable::General,
        PriceTable::Epdm,
        PriceTable::Tpo,
        PriceTable::Common,
        PriceTable::Composite,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceEntry {
    pub key: String,
    pub canonical_name: String,
    pub category: String,
    pub avg_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u32>,
    pub unit: String,
    pub table: PriceTable,
}

impl PriceEntry {
    fn new(
        table: PriceTable,
        key: &str,
        canonical_name: &str,
        category: &str,
        avg_price: f64,
        unit: &str,
    ) -> Self {
        Self {
            key: key.to_string(),
            canonical_name: canonical_name.to_string(),
            category: category.to_string(),
            avg_price,
            min_price: None,
            max_price: None,
            sample_count: None,
            unit: unit.to_string(),
            table,
        }
    }

    fn range(mut self, min_price: f64, max_price: f64, sample_count: u32) -> Self {
        self.min_price = Some(min_price);
        self.max_price = Some(max_price);
        self.sample_count = Some(sample_count);
        self
    }
}

/// 供應商價格清單的 CSV 欄位
#[derive(Debug, Deserialize)]
struct PriceRow {
    key: String,
    canonical_name: String,
    category: String,
    avg_price: f64,
    unit: String,
    #[serde(default)]
    min_price: Option<f64>,
    #[serde(default)]
    max_price: Option<f64>,
    #[serde(default)]
    count: Option<u32>,
}

/// 材料價格簿：內建價格表加上覆寫價格
#[derive(Debug, Clone)]
pub struct PriceBook {
    entries: Vec<PriceEntry>,
    overrides: BTreeMap<String, f64>,
}

impl Default for PriceBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PriceBook {
    pub fn builtin() -> Self {
        let mut entries = Vec::new();
        entries.extend(general_entries());
        entries.extend(epdm_entries());
        entries.extend(tpo_entries());
        entries.extend(common_entries());
        entries.extend(composite_entries());

        let mut overrides = BTreeMap::new();
        // EPS：$0.31/sqft/inch × 16 sqft × 2.5" = $12.40/張
        overrides.insert("EPS_Insulation_EPDM".to_string(), 12.40);

        Self { entries, overrides }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &PriceEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 依查價順序找出第一筆符合的項目
    pub fn get(&self, key: &str) -> Option<&PriceEntry> {
        PriceTable::LOOKUP_ORDER.iter().find_map(|table| {
            self.entries
                .iter()
                .find(|entry| entry.table == *table && entry.key == key)
        })
    }

    /// 單價：覆寫 → General → EPDM → TPO → Common → Composite，找不到為 0
    pub fn price(&self, key: &str) -> f64 {
        if let Some(price) = self.overrides.get(key) {
            return *price;
        }
        self.get(key).map(|entry| entry.avg_price).unwrap_or(0.0)
    }

    /// 是否為提供給圖面分析的一般價格鍵
    pub fn is_general_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| {
            entry.key == key && matches!(entry.table, PriceTable::General | PriceTable::Composite)
        })
    }

    pub fn general_entries(&self) -> impl Iterator<Item = &PriceEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.table, PriceTable::General | PriceTable::Composite))
    }

    pub fn overrides(&self) -> &BTreeMap<String, f64> {
        &self.overrides
    }

    pub fn with_override(mut self, key: &str, price: f64) -> Self {
        self.overrides.insert(key.to_string(), price);
        self
    }

    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, f64>) {
        for (key, price) in overrides {
            self.overrides.insert(key.clone(), *price);
        }
    }

    /// 匯入供應商價格清單；同鍵項目直接取代，新鍵加入 General 表
    pub fn load_csv<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut imported = 0;
        for row in csv_reader.deserialize::<PriceRow>() {
            let row = row?;
            if row.key.is_empty() {
                return Err(EstimatorError::ValidationError {
                    message: format!("Price list row {} has an empty key", imported + 1),
                });
            }
            if !row.avg_price.is_finite() || row.avg_price < 0.0 {
                return Err(EstimatorError::ValidationError {
                    message: format!("Price for '{}' must be a non-negative number", row.key),
                });
            }

            let existing = self.entries.iter_mut().find(|entry| entry.key == row.key);
            match existing {
                Some(entry) => {
                    entry.canonical_name = row.canonical_name;
                    entry.category = row.category;
                    entry.avg_price = row.avg_price;
                    entry.unit = row.unit;
                    entry.min_price = row.min_price;
                    entry.max_price = row.max_price;
                    entry.sample_count = row.count;
                }
                None => self.entries.push(PriceEntry {
                    key: row.key,
                    canonical_name: row.canonical_name,
                    category: row.category,
                    avg_price: row.avg_price,
                    min_price: row.min_price,
                    max_price: row.max_price,
                    sample_count: row.count,
                    unit: row.unit,
                    table: PriceTable::General,
                }),
            }
            imported += 1;
        }

        tracing::debug!("📥 Imported {} price list rows", imported);
        Ok(imported)
    }
}

/// 供應商報價彙整 (avg / min / max / 樣本數)
fn general_entries() -> Vec<PriceEntry> {
    let entry = |key, name, category, avg, unit| PriceEntry::new(PriceTable::General, key, name, category, avg, unit);
    vec![
        entry("DensDeck_Coverboard", "DensDeck Coverboard", "Coverboard", 33.52, "SHT").range(29.0, 37.4, 4),
        entry("Gypsum_Fiber_Coverboard", "Gypsum Fiber Coverboard", "Coverboard", 29.62, "Sheet").range(15.77, 34.0, 13),
        entry("Drainage_Board", "Drainage Board", "Drainage", 410.53, "Roll").range(215.7, 601.92, 7),
        entry("Gutter_Downpipe", "Gutter / Downpipe", "Drainage", 13.6, "Piece").range(1.25, 20.55, 3),
        entry("Roof_Drain", "Roof Drain", "Drainage", 181.77, "EA").range(4.95, 381.0, 26),
        entry("Scupper", "Scupper", "Drainage", 74.83, "EA").range(30.48, 206.0, 5),
        entry("Clips", "Clips", "Fasteners & Hardware", 10.19, "Piece").range(0.5, 48.06, 27),
        entry("Fasteners", "Fasteners", "Fasteners & Hardware", 447.76, "PL").range(113.5, 1648.2, 81),
        entry("Insulation_Plates", "Insulation Plates", "Fasteners & Hardware", 269.38, "PL").range(242.1, 314.4, 4),
        entry("Nails_Staples", "Nails / Staples", "Fasteners & Hardware", 29.75, "Box").range(0.8, 91.72, 12),
        entry("Roof_Anchor", "Roof Anchor", "Fasteners & Hardware", 16.99, "Box").range(16.99, 16.99, 1),
        entry("Screws", "Screws", "Fasteners & Hardware", 39.96, "Box").range(2.29, 113.31, 8),
        entry("Batt_Insulation", "Batt Insulation", "Insulation", 91.9, "Bdl").range(46.87, 149.75, 4),
        entry("Fiberboard_Insulation", "Fiberboard Insulation", "Insulation", 24.85, "SH").range(8.94, 76.5, 11),
        entry("Polyisocyanurate_ISO_Insulation", "Polyisocyanurate (ISO) Insulation", "Insulation", 43.62, "Sheet").range(13.67, 185.0, 31),
        entry("XPS_Insulation", "XPS Insulation", "Insulation", 35.53, "Sheet").range(14.6, 58.4, 8),
        entry("Base_Membrane", "Base Membrane", "Membranes", 193.85, "RL").range(62.75, 324.95, 2),
        entry("Cap_Membrane", "Cap Membrane", "Membranes", 216.95, "Roll").range(216.95, 216.95, 1),
        entry("EPDM_Accessory", "EPDM Accessory", "Membranes", 398.99, "Roll").range(0.62, 4880.0, 41),
        entry("EPDM_Membrane", "EPDM Membrane", "Membranes", 1119.86, "roll").range(571.9, 1530.0, 5),
        entry("PVC_Membrane", "PVC Membrane", "Membranes", 810.07, "Roll").range(262.5, 1674.2, 3),
        entry("SBS_Membrane", "SBS Membrane", "Membranes", 298.0, "Roll").range(146.0, 450.0, 2),
        entry("TPO_Accessory", "TPO Accessory", "Membranes", 499.33, "Pce").range(0.98, 2699.0, 56),
        entry("TPO_Membrane", "TPO Membrane", "Membranes", 2865.53, "SqFt").range(750.0, 7805.0, 57),
        entry("Vapour_Barrier_Membrane", "Vapour Barrier Membrane", "Membranes", 173.66, "Roll").range(14.97, 515.0, 14),
        entry("Coated_Metal_Sheet", "Coated Metal Sheet", "Metal Flashings & Accessories", 583.11, "Sheet").range(371.9, 741.0, 5),
        entry("Drip_Edge", "Drip Edge", "Metal Flashings & Accessories", 6.85, "EA").range(6.7, 6.99, 2),
        entry("Flashing_General", "Flashing (General)", "Metal Flashings & Accessories", 174.46, "18").range(0.59, 1024.0, 45),
        entry("Metal_Panel", "Metal Panel", "Metal Flashings & Accessories", 10.95, "lin foot").range(3.7, 55.0, 9),
        entry("Standing_Seam_Metal", "Standing Seam Metal", "Metal Flashings & Accessories", 6.34, "Piece").range(1.2, 16.99, 4),
        entry("Coating_Paint", "Coating / Paint", "Miscellaneous", 1088.17, "Pail").range(0.77, 6409.0, 40),
        entry("Equipment_Torch", "Equipment / Torch", "Miscellaneous", 220.19, "Roll").range(24.85, 591.45, 16),
        entry("Fleece_Reinforcement_Fabric", "Fleece Reinforcement Fabric", "Miscellaneous", 1192.69, "Roll").range(53.15, 4198.0, 22),
        entry("Tape", "Tape", "Miscellaneous", 425.57, "Piece").range(0.59, 2940.0, 47),
        entry("Walkway_Pads", "Walkway Pads", "Pavers & Walkways", 590.1, "RL").range(134.0, 1048.5, 3),
        entry("Adhesive", "Adhesive", "Sealants & Adhesives", 735.19, "PL").range(5.02, 11852.0, 91),
        entry("Adhesive_Elastocol", "Adhesive (Elastocol)", "Sealants & Adhesives", 99.74, "36").range(0.0, 188.39, 8),
        entry("Mastic", "Mastic", "Sealants & Adhesives", 359.3, "Piece").range(5.55, 3219.0, 50),
        entry("Primer", "Primer", "Sealants & Adhesives", 282.83, "Pail").range(9.1, 3145.0, 76),
        entry("Sealant_General", "Sealant (General)", "Sealants & Adhesives", 29.86, "Tube").range(5.99, 329.0, 25),
        entry("Gooseneck_Vent", "Gooseneck Vent", "Vents & Penetrations", 53.21, "Piece").range(35.65, 69.55, 9),
        entry("Pipe_Boot_Seal", "Pipe Boot / Seal", "Vents & Penetrations", 50.48, "EA").range(43.5, 57.45, 2),
        entry("Plumbing_Vent", "Plumbing Vent", "Vents & Penetrations", 21.87, "Piece").range(21.38, 22.35, 2),
        entry("Roof_Hatch", "Roof Hatch", "Vents & Penetrations", 1822.12, "Piece").range(329.95, 3622.25, 12),
        entry("Vent_Cap", "Vent Cap", "Vents & Penetrations", 57.75, "Piece").range(1.7, 217.24, 15),
        entry("Plywood_Sheathing", "Plywood Sheathing", "Wood & Sheathing", 48.74, "Piece").range(15.45, 103.63, 5),
        entry("Wood_Blocking_Lumber", "Wood Blocking / Lumber", "Wood & Sheathing", 16.59, "Piece").range(2.36, 51.59, 19),
    ]
}

fn epdm_entries() -> Vec<PriceEntry> {
    let entry = |key, name, category, avg, unit| PriceEntry::new(PriceTable::Epdm, key, name, category, avg, unit);
    vec![
        entry("EPDM_Membrane_60mil", "EPDM Membrane 60 mil", "Membranes", 1119.86, "roll").range(571.9, 1530.0, 5),
        entry("EPDM_Membrane_45mil", "EPDM Membrane 45 mil", "Membranes", 1000.0, "roll"),
        entry("EPDM_Filter_Fabric", "Filter Fabric (Soprafilter)", "Drainage", 380.25, "roll"),
        entry("EPDM_Drainage_Mat", "Drainage Mat (Sopradrain 15G)", "Drainage", 215.7, "roll"),
        entry("EPDM_Seam_Tape", "EPDM Seam Tape", "EPDM Accessories", 104.86, "roll"),
        entry("EPDM_PS_Corner", "EPDM Peel & Stick Corner", "EPDM Accessories", 10.75, "piece"),
        entry("EPDM_Pipe_Flashing", "EPDM Pipe Flashing", "EPDM Accessories", 71.65, "piece"),
        entry("EPDM_Curb_Flash", "EPDM Curb Flashing", "EPDM Accessories", 438.0, "roll"),
        entry("EPDM_RUSS_6", "RUSS 6 inch EPDM Accessory", "EPDM Accessories", 307.22, "roll"),
        entry("EPDM_Primer_HP250", "EPDM HP-250 Primer", "Sealants & Adhesives", 52.55, "gallon"),
        entry("EPDM_Bonding_Adhesive", "EPDM Bonding Adhesive 90-8-30A", "Sealants & Adhesives", 198.95, "pail"),
        entry("EPDM_Cav_Grip", "Cav Grip Adhesive", "Sealants & Adhesives", 1000.0, "cylinder"),
        entry("EPDM_Lap_Sealant", "EPDM Lap Sealant", "Sealants & Adhesives", 12.71, "tube"),
        entry("EPS_Insulation_EPDM", "EPS Insulation (for EPDM Inverted)", "Insulation", 0.31, "sheet"),
        entry("XPS_Dow_EPDM", "Dow XPS (for EPDM)", "Insulation", 52.48, "sheet"),
    ]
}

fn tpo_entries() -> Vec<PriceEntry> {
    let entry = |key, name, category, avg, unit| PriceEntry::new(PriceTable::Tpo, key, name, category, avg, unit);
    vec![
        entry("TPO_Membrane", "TPO Membrane", "Membranes", 2865.53, "sqft").range(750.0, 7805.0, 57),
        entry("TPO_Flashing_24in", "TPO Flashing 24 inch", "TPO Accessories", 565.0, "roll"),
        entry("TPO_Flashing_12in", "TPO Flashing 12 inch", "TPO Accessories", 285.0, "roll"),
        entry("TPO_Pipe_Boot", "TPO Universal Pipe Boot", "TPO Accessories", 43.25, "piece"),
        entry("TPO_Corner", "TPO Inside/Outside Corner", "TPO Accessories", 16.75, "piece"),
        entry("TPO_Rhinobond_Plate", "Rhinobond Plate", "TPO Fasteners", 603.75, "pallet"),
        entry("TPO_Screws", "TPO Fastening Screws", "TPO Fasteners", 375.0, "box"),
        entry("TPO_Tuck_Tape", "Tuck Tape", "TPO Accessories", 0.96, "roll"),
        entry("TPO_Lap_Sealant", "TPO Lap Sealant", "Sealants & Adhesives", 12.71, "tube"),
        entry("TPO_Primer", "TPO Primer", "Sealants & Adhesives", 63.5, "gallon"),
        entry("TPO_Bonding_Adhesive_SureWeld", "TPO Bonding Adhesive SureWeld", "Sealants & Adhesives", 205.6, "pail"),
    ]
}

/// EPDM 與 TPO 共用材料
fn common_entries() -> Vec<PriceEntry> {
    let entry = |key, name, category, avg, unit| PriceEntry::new(PriceTable::Common, key, name, category, avg, unit);
    vec![
        entry("Vapour_Barrier_Sopravapor", "Sopravap'r WG 45in", "Vapour Barrier", 324.95, "roll"),
        entry("Vapour_Barrier_TieIn", "Vapour Barrier Tie In", "Vapour Barrier", 50.0, "allowance"),
        entry("ISO_2_5_inch", "2.5 inch ISO Glass", "Insulation", 25.6, "sheet"),
        entry("Tapered_ISO", "Tapered Insulation", "Insulation", 3.1, "sqft"),
        entry("Densdeck_Half_Inch", "Densdeck Primed 1/2 inch", "Coverboard", 34.2, "sheet"),
        entry("Soprasmart_ISO_HD", "Soprasmart ISO HD 1/2 inch", "Coverboard", 63.55, "sheet"),
        entry("Duotack_Adhesive", "Duotack Foamable Adhesive", "Sealants & Adhesives", 58.0, "case"),
        entry("Elastocol_Stick", "Elastocol Stick 19L", "Sealants & Adhesives", 160.0, "pail"),
        entry("Roof_Tape_IKO", "IKO 6 inch Roof Tape", "Roofing Accessories", 27.9, "roll"),
        entry("Sopralap_Cover_Strip", "Sopralap Cover Strip", "Roofing Accessories", 42.0, "roll"),
    ]
}

/// 組合單價：每 sqft 或每處
fn composite_entries() -> Vec<PriceEntry> {
    let entry = |key, avg, unit| PriceEntry::new(PriceTable::Composite, key, key, "Composite", avg, unit);
    vec![
        entry("TPO_60mil_Mechanically_Attached", 5.5, "sqft"),
        entry("EPDM_60mil_Fully_Adhered", 6.0, "sqft"),
        entry("ISO_Insulation_2_Layer", 3.75, "sqft"),
        entry("Parapet_Flashing_Detail", 45.0, "lf"),
        entry("HVAC_Curb_Detail", 850.0, "EA"),
    ]
}

/// 圖面分析 prompt 用的價格鍵清單，一行一筆
pub fn pricing_keys_prompt_list(book: &PriceBook) -> String {
    book.general_entries()
        .map(|entry| format!("  {}  ({}, per {})", entry.key, entry.canonical_name, entry.unit))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order_and_missing_key() {
        let book = PriceBook::builtin();
        assert_eq!(book.price("Primer"), 282.83);
        assert_eq!(book.price("Cap_Membrane"), 216.95);
        assert_eq!(book.price("HVAC_Curb_Detail"), 850.0);
        assert_eq!(book.price("Does_Not_Exist"), 0.0);
    }

    #[test]
    fn test_builtin_eps_override() {
        let book = PriceBook::builtin();
        assert_eq!(book.get("EPS_Insulation_EPDM").map(|e| e.avg_price), Some(0.31));
        assert_eq!(book.price("EPS_Insulation_EPDM"), 12.40);
    }

    #[test]
    fn test_with_override_wins() {
        let book = PriceBook::builtin().with_override("Primer", 300.0);
        assert_eq!(book.price("Primer"), 300.0);

        let mut book = PriceBook::builtin();
        let mut overrides = BTreeMap::new();
        overrides.insert("Roof_Drain".to_string(), 200.0);
        book.apply_overrides(&overrides);
        assert_eq!(book.price("Roof_Drain"), 200.0);
    }

    #[test]
    fn test_general_keys() {
        let book = PriceBook::builtin();
        assert!(book.is_general_key("Flashing_General"));
        assert!(book.is_general_key("Parapet_Flashing_Detail"));
        assert!(!book.is_general_key("EPDM_Membrane_60mil"));
        assert!(!book.is_general_key("CUSTOM"));
        assert!(pricing_keys_prompt_list(&book).contains("Flashing_General"));
    }

    #[test]
    fn test_load_csv_replaces_and_appends() {
        let csv_data = "key,canonical_name,category,avg_price,unit,min_price,max_price,count\n\
                        Primer,Asphalt Primer,Primers,250.00,Pail,,,\n\
                        Walkway_Tile,Walkway Tile,Pavers,42.5,EA,40,45,3\n";
        let mut book = PriceBook::builtin();
        let before = book.len();

        let imported = book.load_csv(csv_data.as_bytes()).unwrap();

        assert_eq!(imported, 2);
        assert_eq!(book.len(), before + 1);
        assert_eq!(book.price("Primer"), 250.0);
        assert_eq!(book.price("Walkway_Tile"), 42.5);
        assert!(book.is_general_key("Walkway_Tile"));
    }

    #[test]
    fn test_load_csv_rejects_negative_price() {
        let csv_data = "key,canonical_name,category,avg_price,unit\nPrimer,Primer,Primers,-1,Pail\n";
        let mut book = PriceBook::empty();
        assert!(book.load_csv(csv_data.as_bytes()).is_err());
    }
}
