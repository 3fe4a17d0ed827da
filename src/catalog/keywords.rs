use crate::utils::error::{EstimatorError, Result};
use regex::Regex;

/// 產品關鍵字規則：(類別, 正規式, 標準產品名稱)
pub const KEYWORD_RULES: &[(&str, &str, &str)] = &[
    // Membranes
    ("Membranes", r"granule\s+surfaced\s+thermofusible\s+cap\s+membrane", "Granule Surfaced Thermofusible Cap Membrane"),
    ("Membranes", r"cap\s+membrane\s+flash", "Cap Membrane Flashings"),
    ("Membranes", r"base\s+membrane\s+flash", "Base Membrane Flashings"),
    ("Membranes", r"vapou?r\s+barrier\s+membrane", "Vapour Barrier Membrane"),
    ("Membranes", r"liquid\s+membrane\s+flash", "Liquid Membrane Flashing"),
    ("Membranes", r"sbs\s+membrane", "SBS Membrane"),
    ("Membranes", r"coverboard\s+with\s+factory\s+laminated\s+base\s+membrane", "Coverboard with Factory Laminated Base Membrane"),
    ("Membranes", r"membrane\s+pipe\s+seal", "Membrane Pipe Seal"),
    ("Membranes", r"sacrificial\s+cap\s+membrane", "Sacrificial Cap Membrane (slip sheet)"),
    ("Membranes", r"sopraply\s+traffic\s+cap", "Sopraply Traffic Cap (SBS Cap Sheet)"),
    ("Membranes", r"sopraply\s+base\s+520", "Sopraply Base 520 (SBS Base Sheet)"),
    ("Membranes", r"sopraply\s+stick\s+duo", "Sopraply Stick Duo (Self-Adhered Base)"),
    ("Membranes", r"soprasmart\s+board", "Soprasmart Board 2:1 (Factory Laminated ISO+Base)"),
    ("Membranes", r"modified\s+bitumen\s+membrane", "Modified Bitumen Membrane"),
    ("Membranes", r"2[- ]ply\s+sbs", "2-Ply SBS Membrane System"),
    ("Membranes", r"inverted.*membrane\s+roof", "Inverted Membrane Roofing"),
    // Insulation
    ("Insulation", r"polyisocyanurate\s+insulation", "Polyisocyanurate Insulation"),
    ("Insulation", r"fibe?r\s*board\s+insulation", "Fiberboard Insulation"),
    ("Insulation", r"tapered\s+expanded\s+polystyrene\s+insulation", "Tapered Expanded Polystyrene (EPS) Insulation"),
    ("Insulation", r"tapered\s+insulation\s+sump", "Tapered Insulation Sump"),
    ("Insulation", r"xps\s+insulation", "XPS Insulation"),
    ("Insulation", r"mineral\s+wool\s+insulation", "Mineral Wool Insulation"),
    ("Insulation", r"spray\s+foam", "Spray Foam Insulation"),
    ("Insulation", r"drain\s+bowl/?pipe\s+insulation", "Drain Bowl/Pipe Insulation"),
    ("Insulation", r"type\s+iv\s+xps", "Type IV XPS Insulation"),
    ("Insulation", r"sopra-?xps\s+40", "Sopra-XPS 40 Type 4 (Inverted Insulation)"),
    ("Insulation", r"type\s+4\s+xps", "Type 4 XPS Insulation"),
    ("Insulation", r"tapered\s+polyisocyanurate", "Tapered Polyisocyanurate Insulation"),
    // Coverboard
    ("Coverboard", r"\d+\s*mm\s+coverboard", "Coverboard"),
    // Metal Flashings & Accessories
    ("Metal Flashings & Accessories", r"metal\s+cap\s+flash", "Metal Cap Flashings"),
    ("Metal Flashings & Accessories", r"metal\s+scupper\s+flash", "Metal Scupper Flashings"),
    ("Metal Flashings & Accessories", r"metal\s+skirt\s+flash", "Metal Skirt Flashings"),
    ("Metal Flashings & Accessories", r"metal\s+counter\s+flash", "Metal Counter Flashings"),
    ("Metal Flashings & Accessories", r"metal\s+base\s+flash", "Metal Base Flashings"),
    ("Metal Flashings & Accessories", r"metal\s+gooseneck\s+flash", "Metal Gooseneck Flashings"),
    ("Metal Flashings & Accessories", r"metal\s+brakeshape", "Metal Brakeshape"),
    ("Metal Flashings & Accessories", r"metal\s+debris\s+screen", "Metal Debris Screen"),
    ("Metal Flashings & Accessories", r"standing\s+seam", "Standing Seam Metal"),
    ("Metal Flashings & Accessories", r"s-lock", "S-Lock Joint"),
    ("Metal Flashings & Accessories", r"hem\s+edge", "Hem Edge Detail"),
    // Wood & Sheathing
    ("Wood & Sheathing", r"plywood\s+sheathing", "Plywood Sheathing"),
    ("Wood & Sheathing", r"back-?sloped.*plywood\s+sheathing", "Back-Sloped Plywood Sheathing"),
    ("Wood & Sheathing", r"wood\s+blocking", "Wood Blocking"),
    // Drainage
    ("Drainage", r"drain\s+clamping\s+ring", "Drain Clamping Ring"),
    ("Drainage", r"drain\s+bowl", "Drain Bowl"),
    ("Drainage", r"sump\s+receiver\s+pan", "Sump Receiver Pan"),
    ("Drainage", r"lead\s+flash", "Lead Flashings"),
    ("Drainage", r"overflow\s+scupper", "Overflow Scupper"),
    ("Drainage", r"roof\s+drain", "Roof Drain"),
    ("Drainage", r"scupper\s+drain", "Scupper Drain"),
    ("Drainage", r"sopradrain", "Sopradrain EcoVent (Drainage Board)"),
    ("Drainage", r"filter\s+fabric", "Filter Fabric"),
    ("Drainage", r"drainage\s+board", "Drainage Board"),
    // Fasteners & Hardware
    ("Fasteners & Hardware", r"pan\s+head\s+(fastener|screw)", "Pan Head Fasteners/Screws"),
    ("Fasteners & Hardware", r"hex\s+head\s+(fastener|screw)", "Hex Head Fasteners/Screws"),
    ("Fasteners & Hardware", r"wood\s+screw", "Wood Screws"),
    ("Fasteners & Hardware", r"neoprene\s+washer", "Neoprene Washers"),
    ("Fasteners & Hardware", r"\d+\s*mm\s+clips?", "Metal Clips"),
    ("Fasteners & Hardware", r"roof\s+anchor", "Roof Anchor"),
    // Sealants & Adhesives
    ("Sealants & Adhesives", r"asphaltic\s+primer", "Asphaltic Primer"),
    ("Sealants & Adhesives", r"mastic", "Mastic"),
    ("Sealants & Adhesives", r"urethane\s+sealant", "Urethane Sealant"),
    ("Sealants & Adhesives", r"exterior\s+grade\s+sealant", "Exterior Grade Sealant"),
    ("Sealants & Adhesives", r"membrane\s+compatible\s+sealant", "Membrane Compatible Sealant"),
    ("Sealants & Adhesives", r"adhesive\s+ribbon", "Adhesive Ribbon"),
    ("Sealants & Adhesives", r"sealant", "Sealant (General)"),
    ("Sealants & Adhesives", r"dymonic\s+100", "Dymonic 100 (Polyurethane Sealant)"),
    ("Sealants & Adhesives", r"masterseal\s+np[\s-]?1", "MasterSeal NP1 (Polyurethane Sealant)"),
    ("Sealants & Adhesives", r"elastocol", "Elastocol Adhesive"),
    ("Sealants & Adhesives", r"sopramastic", "Sopramastic"),
    ("Sealants & Adhesives", r"polyurethane\s+sealant", "Polyurethane Sealant"),
    // Pavers & Walkways
    ("Pavers & Walkways", r"concrete\s+paver", "Concrete Pavers"),
    ("Pavers & Walkways", r"\d+\s*mm\s*x\s*\d+\s*mm\s*x\s*\d+\s*mm\s+paver", "Concrete Pavers (sized)"),
    // Vents & Penetrations
    ("Vents & Penetrations", r"spun\s+aluminum\s+vent\s+flash", "Spun Aluminum Vent Flashing"),
    ("Vents & Penetrations", r"abs\s+pipe", "ABS Pipe"),
    ("Vents & Penetrations", r"vent\s+extension\s+pipe", "Vent Extension Pipe"),
    ("Vents & Penetrations", r"vent\s+cap", "Vent Cap"),
    ("Vents & Penetrations", r"roof\s+hatch", "Roof Hatch"),
    ("Vents & Penetrations", r"plumbing\s+vent", "Plumbing Vent"),
    ("Vents & Penetrations", r"gooseneck", "Gooseneck Vent"),
    // Miscellaneous
    ("Miscellaneous", r"foam\s+gasket", "Foam Gasket"),
    ("Miscellaneous", r"polyethylene\s+film", "Polyethylene Film"),
    ("Miscellaneous", r"tremclad\s+paint", "Tremclad Paint"),
    ("Miscellaneous", r"fleece\s+reinforcement\s+fabric", "Fleece Reinforcement Fabric"),
    ("Miscellaneous", r"gypsum\s+auxiliary\s+leveling\s+surface", "Gypsum Auxiliary Leveling Surface"),
    ("Miscellaneous", r"steel\s+deck", "Steel Deck"),
    ("Miscellaneous", r"c-?ports?", "C-Port Pipe Supports"),
    ("Miscellaneous", r"sleepers?", "Sleepers"),
    ("Miscellaneous", r"gravel\s+ballast", "Gravel Ballast"),
    ("Miscellaneous", r"paver\s+pedestal", "Paver Pedestals"),
    ("Miscellaneous", r"mammouth\s+platinum", "Soprema Mammouth Platinum Warranty"),
];

pub const CATEGORIES: &[&str] = &[
    "Membranes",
    "Insulation",
    "Coverboard",
    "Metal Flashings & Accessories",
    "Wood & Sheathing",
    "Drainage",
    "Fasteners & Hardware",
    "Sealants & Adhesives",
    "Pavers & Walkways",
    "Vents & Penetrations",
    "Miscellaneous",
];

/// 一般密封膠規則不得緊接在這些字之後
const GENERAL_SEALANT: &str = "Sealant (General)";
const SEALANT_EXCLUDED_PREFIX: &str = r"(?i)(?:urethane\s|exterior\sgrade\s|membrane\scompatible\s)$";

#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub category: &'static str,
    pub product: &'static str,
    pattern: Regex,
    excluded_prefix: Option<Regex>,
}

impl KeywordRule {
    pub fn is_match(&self, line: &str) -> bool {
        match &self.excluded_prefix {
            None => self.pattern.is_match(line),
            Some(prefix) => self
                .pattern
                .find_iter(line)
                .any(|m| !prefix.is_match(&line[..m.start()])),
        }
    }
}

/// 編譯後的關鍵字比對器
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    rules: Vec<KeywordRule>,
}

impl KeywordMatcher {
    pub fn new() -> Result<Self> {
        let excluded = compile(SEALANT_EXCLUDED_PREFIX)?;
        let rules = KEYWORD_RULES
            .iter()
            .map(|&(category, pattern, product)| {
                Ok(KeywordRule {
                    category,
                    product,
                    pattern: compile(&format!("(?i){}", pattern))?,
                    excluded_prefix: (product == GENERAL_SEALANT).then(|| excluded.clone()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// 回傳此行命中的所有 (類別, 產品)
    pub fn matches<'a>(&'a self, line: &'a str) -> impl Iterator<Item = &'a KeywordRule> + 'a {
        self.rules.iter().filter(move |rule| rule.is_match(line))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| EstimatorError::ProcessingError {
        message: format!("Invalid keyword pattern '{}': {}", pattern, e),
    })
}
