use crate::catalog::keywords::KEYWORD_RULES;
use crate::catalog::pricing::{pricing_keys_prompt_list, PriceBook};
use crate::domain::analysis::{MeasurementCandidate, ParapetCandidate, ReferenceMeasurement};
use crate::utils::error::{EstimatorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

const MEASUREMENT_PROMPT_BASE: &str = r#"You are a roofing quantity surveyor analyzing a roof plan view drawing.

Your goal is to extract the primary roof measurements from this drawing.

1. SCALE: Find the scale notation (e.g., 1/8" = 1'-0" or 1:100).
2. DIMENSIONS: Read the overall dimensions of the building outline.
{reference_section}
3. CALCULATE:
   - Total Roof Area (sqft): The total flat roof surface area.
   - Perimeter (LF): The total length of the roof edge.
   - Parapet Length (LF): The length of edges that have a parapet wall (vs. open edges or gutters).

4. CONFIDENCE: Rate your confidence (high/medium/low) based on image clarity and scale visibility.

Return ONLY valid JSON (no markdown, no explanation) in this format:
{
  "scale": "1/8\" = 1'-0\"",
  "reference_measurement_used": true,
  "total_roof_area_sqft": 0.0,
  "perimeter_lf": 0.0,
  "parapet_length_lf": 0.0,
  "confidence": "high",
  "notes": "Scale found in bottom right. Dimensions clear."
}"#;

const REFERENCE_SECTION_WITH_DATA: &str = r#"
IMPORTANT - REFERENCE MEASUREMENT (use this to calibrate all other dimensions):
   The user has confirmed that "{description}" measures {value} {unit} in real life.
   Use this known dimension to:
   a) Verify or determine the drawing scale
   b) Cross-check all other measured dimensions against this reference
   c) If the scale shown on the drawing conflicts with this reference measurement, TRUST the reference measurement
   d) Calculate all areas and lengths using the scale validated by this reference"#;

const REFERENCE_SECTION_NO_DATA: &str =
    "   Use the scale notation on the drawing along with any visible dimensions to calculate measurements.";

pub const PARAPET_HEIGHT_PROMPT: &str = r#"You are a roofing quantity surveyor analyzing a detail/section drawing.

Your goal is to find the Parapet Height.

1. Look for a cross-section detail of a parapet wall.
2. Read the vertical dimension from the roof deck level to the top of the coping cap.
3. If multiple parapet details exist, pick the most common or tallest one.
4. If no parapet detail is found, return 0.

Return ONLY valid JSON (no markdown, no explanation) in this format:
{
  "parapet_height_ft": 0.0,
  "confidence": "high",
  "notes": "Found detail 3/A5.0 showing 2'-6\" height."
}"#;

const DETAIL_PROMPT: &str = r#"You are a roofing quantity-takeoff specialist analyzing architectural detail/section drawings.

For EACH detail or section shown on this drawing page, identify:
1. The detail name and reference number (e.g. "Detail 1", "Section A-A")
2. The exact detail reference ID as written on the drawing (e.g. "3/R3.1", "1/R3.2"),
   in the same format the plan legend uses, as "detail_ref_id"
3. The detail type - classify as one of:
   parapet, drain, mechanical_curb, sleeper_curb, penetration_gas,
   penetration_electrical, penetration_plumbing, vent_hood, scupper,
   expansion_joint, curtain_wall, field_assembly, pipe_support, opening_cover
4. All materials/products shown, listed from BOTTOM to TOP (or inside to outside)
5. For each material, map it to the closest pricing_key from our database
6. Whether this detail is measured in: sqft, linear_ft, or each
7. reference measurement can often be found in the details

Our pricing database keys:
{pricing_keys}

Known product names in our system:
{product_names}

Return ONLY valid JSON (no markdown, no explanation) in this format:
{
  "drawing_ref": "the drawing sheet number shown on the page",
  "details": [
    {
      "detail_name": "Detail 1 - Typical Parapet",
      "detail_ref_id": "1/R3.1",
      "detail_type": "parapet",
      "measurement_type": "linear_ft",
      "layers": [
        {
          "position": 1,
          "material": "exact material name from drawing",
          "pricing_key": "closest match from our database",
          "notes": "thickness, size, or spec info visible"
        }
      ]
    }
  ]
}"#;

pub const PLAN_PROMPT: &str = r#"You are a roofing quantity-takeoff specialist analyzing a roof plan view drawing.

Count and identify everything visible on this plan view:

1. ITEM COUNTS - count each type you can see:
   - roof_drains: circular drain symbols
   - scuppers: rectangular openings in parapet/wall edges
   - mechanical_units: large rooftop equipment (RTUs, AHUs)
   - sleeper_curbs: linear support structures (often shown as parallel lines)
   - vent_hoods: small rectangular/circular vents
   - gas_penetrations: gas pipe penetrations (may be labeled)
   - electrical_penetrations: electrical conduit penetrations
   - plumbing_vents: plumbing vent pipes

2. ZONES - identify any distinct roof zones with different assemblies

3. DIMENSIONS - note any dimensions, areas, or the drawing scale

4. PARAPET - identify which edges have parapets vs other edge conditions

5. DETAIL REFERENCES - note which detail drawings are referenced (e.g., "see Detail 3/R3.1")

6. UNIT LABELS - read the LEGEND first to learn what each label means
   (e.g. "HS - HOT STACK PENETRATION, SEE DETAIL 3/R3.1"), then find every
   labelled unit on the plan (HS, P, D, V, M, PW ...). For each instance,
   measure its footprint with the drawing scale:
   - rectangular: width and height, perimeter = 2*(W+H)
   - circular: diameter, perimeter = pi * D
   - irregular: estimate the outer perimeter in LF
   Report dimensions in feet and perimeters in LF.

Return ONLY valid JSON (no markdown, no explanation) in this format:
{
  "drawing_ref": "the drawing sheet number",
  "scale": "the drawing scale if shown",
  "counts": {
    "roof_drains": 0,
    "scuppers": 0,
    "mechanical_units": 0,
    "sleeper_curbs": 0,
    "vent_hoods": 0,
    "gas_penetrations": 0,
    "electrical_penetrations": 0,
    "plumbing_vents": 0
  },
  "zones": [
    {
      "name": "zone description",
      "assembly_type": "field_assembly or detail type",
      "detail_refs": ["Detail 1/R3.0"],
      "notes": "any relevant observations"
    }
  ],
  "parapet": {
    "edges_with_parapet": "describe which edges",
    "other_edges": "describe other edge conditions (curtain wall, etc.)"
  },
  "dimensions_noted": ["list any dimensions or areas visible"],
  "detail_references": ["list all detail callouts visible on the plan"],
  "unit_labels": [
    {
      "label": "HS",
      "description": "Hot Stack Penetration",
      "detail_ref": "Detail 3/R3.1",
      "detail_page": "R3.1",
      "instances": [
        {
          "instance_id": "HS-1",
          "location": "center-left area near grid line 4",
          "shape": "rectangular",
          "width_ft": 2.5,
          "height_ft": 3.0,
          "perimeter_lf": 11.0,
          "area_sqft": 7.5
        }
      ],
      "total_count": 1,
      "total_perimeter_lf": 11.0,
      "total_area_sqft": 7.5
    }
  ]
}"#;

const SPEC_PROMPT: &str = r#"You are a roofing quantity-takeoff specialist analyzing a specification document page.

Extract all material and product requirements from this specification page.
For each material mentioned, identify:
1. The product/material name and any brand/model specified
2. The applicable standard (ASTM, CSA, etc.)
3. Which detail or assembly it belongs to
4. Map it to the closest pricing_key from our database

Our pricing database keys:
{pricing_keys}

Return ONLY valid JSON (no markdown, no explanation) in this format:
{
  "spec_section": "section number (e.g., 07 52 01)",
  "section_title": "section title",
  "materials": [
    {
      "material_name": "full product name",
      "brand_model": "brand and model if specified (or null)",
      "standard": "ASTM/CSA reference if mentioned (or null)",
      "pricing_key": "closest match from our database",
      "usage": "where/how this material is used",
      "notes": "any quantity, thickness, or other specs"
    }
  ]
}"#;

fn product_names_list() -> String {
    KEYWORD_RULES
        .iter()
        .map(|(category, _, name)| format!("  [{}] {}", category, name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn measurement_prompt(reference: Option<&ReferenceMeasurement>) -> String {
    let section = match reference {
        Some(reference) => REFERENCE_SECTION_WITH_DATA
            .replace("{description}", &reference.description)
            .replace("{value}", &reference.value.to_string())
            .replace("{unit}", &reference.unit),
        None => REFERENCE_SECTION_NO_DATA.to_string(),
    };
    MEASUREMENT_PROMPT_BASE.replace("{reference_section}", &section)
}

pub fn detail_prompt(book: &PriceBook) -> String {
    DETAIL_PROMPT
        .replace("{pricing_keys}", &pricing_keys_prompt_list(book))
        .replace("{product_names}", &product_names_list())
}

pub fn spec_prompt(book: &PriceBook) -> String {
    SPEC_PROMPT.replace("{pricing_keys}", &pricing_keys_prompt_list(book))
}

/// 從模型回覆中取出 JSON：```json 區塊 → 任意 ``` 區塊 → 第一個 { 到最後一個 }
pub fn extract_json(text: &str) -> &str {
    fn fenced<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
        let start = text.find(marker)? + marker.len();
        let body = &text[start..];
        let end = body.find("```").unwrap_or(body.len());
        Some(body[..end].trim())
    }

    if let Some(body) = fenced(text, "```json") {
        return body;
    }
    if let Some(body) = fenced(text, "```") {
        return body;
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(first), Some(last)) if first <= last => &text[first..=last],
        _ => text,
    }
}

fn confidence_rank(confidence: &str) -> u8 {
    match confidence.to_lowercase().as_str() {
        "high" => 3,
        "medium" => 2,
        "low" => 1,
        _ => 0,
    }
}

/// 取信心最高者；同分時保留先出現的頁面
fn most_confident<T>(candidates: Vec<T>, confidence: impl Fn(&T) -> &str) -> Option<T> {
    let mut best: Option<(u8, T)> = None;
    for candidate in candidates {
        let rank = confidence_rank(confidence(&candidate));
        match &best {
            Some((best_rank, _)) if *best_rank >= rank => {}
            _ => best = Some((rank, candidate)),
        }
    }
    best.map(|(_, candidate)| candidate)
}

pub fn aggregate_measurements(candidates: Vec<MeasurementCandidate>) -> MeasurementCandidate {
    let mut best = most_confident(candidates, |c| c.confidence.as_str()).unwrap_or_default();
    for value in [
        &mut best.total_roof_area_sqft,
        &mut best.perimeter_lf,
        &mut best.parapet_length_lf,
    ] {
        if !value.is_finite() {
            *value = 0.0;
        }
    }
    best
}

pub fn select_best_parapet_height(candidates: Vec<ParapetCandidate>) -> ParapetCandidate {
    if candidates.is_empty() {
        return ParapetCandidate::default();
    }

    let (non_zero, zero): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.parapet_height_ft.is_some_and(|h| h > 0.0));
    let pool = if non_zero.is_empty() { zero } else { non_zero };

    let mut best = most_confident(pool, |c| c.confidence.as_str()).unwrap_or_default();
    if best.parapet_height_ft.is_none() {
        best.parapet_height_ft = Some(2.0);
    }
    best
}

/// 單次解析最多展開的頁數
pub const MAX_PAGE_LIST_LEN: usize = 10_000;

/// "1,3-5" → [1, 3, 4, 5]
pub fn parse_page_list(input: &str) -> Result<Vec<u32>> {
    let invalid = |part: &str| EstimatorError::ValidationError {
        message: format!("Invalid page list entry '{}' in '{}'", part, input),
    };
    let too_many = || EstimatorError::ValidationError {
        message: format!(
            "Page list '{}' expands to more than {} pages",
            input, MAX_PAGE_LIST_LEN
        ),
    };

    let mut pages = Vec::new();
    for part in input.split(',').map(str::trim) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.trim().parse().map_err(|_| invalid(part))?;
                let end: u32 = end.trim().parse().map_err(|_| invalid(part))?;
                if start > end {
                    return Err(EstimatorError::ValidationError {
                        message: format!("Page range '{}' is reversed in '{}'", part, input),
                    });
                }
                let span = (end - start) as usize + 1;
                if pages.len() + span > MAX_PAGE_LIST_LEN {
                    return Err(too_many());
                }
                pages.extend(start..=end);
            }
            None => {
                if pages.len() >= MAX_PAGE_LIST_LEN {
                    return Err(too_many());
                }
                pages.push(part.parse().map_err(|_| invalid(part))?)
            }
        }
    }
    Ok(pages)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSuggestion {
    pub plan_pages: String,
    pub detail_pages: String,
}

fn join_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// 依頁面文字猜測平面圖與細部圖頁碼
pub fn suggest_page_ranges(page_texts: &[(u32, String)]) -> PageSuggestion {
    let mut plan_pages = Vec::new();
    let mut detail_pages = Vec::new();

    for (page, text) in page_texts {
        let text = text.to_lowercase();
        if text.contains("roof plan") {
            plan_pages.push(*page);
        } else if text.contains("detail") || text.contains("section") || text.contains("elevation")
        {
            detail_pages.push(*page);
        }
    }

    PageSuggestion {
        plan_pages: join_pages(&plan_pages),
        detail_pages: join_pages(&detail_pages),
    }
}

/// 只保留 Division 00 / 01 / 07 的規範頁
pub fn filter_spec_pages(page_texts: &[(u32, String)]) -> Result<Vec<u32>> {
    let section_number = Regex::new(r"\b(00|01|07)[\s-]?\d{2}[\s-]?\d{2}\b")
        .map_err(|e| EstimatorError::ProcessingError {
            message: e.to_string(),
        })?;
    let section_heading =
        Regex::new(r"(?i)Section\s+(00|01|07)").map_err(|e| EstimatorError::ProcessingError {
            message: e.to_string(),
        })?;

    let mut pages = Vec::new();
    for (page, text) in page_texts {
        if section_number.is_match(text) || section_heading.is_match(text) {
            pages.push(*page);
        } else {
            tracing::debug!("Skipping page {} (not section 00, 01, or 07)", page);
        }
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("Here:\n```\n{\"b\": 2}\n```"), "{\"b\": 2}");
        assert_eq!(extract_json("Result is {\"c\": {\"d\": 3}} done"), "{\"c\": {\"d\": 3}}");
        assert_eq!(extract_json("no json here"), "no json here");
    }

    #[test]
    fn test_measurement_prompt_reference_injection() {
        let prompt = measurement_prompt(Some(&ReferenceMeasurement {
            description: "north wall".to_string(),
            value: 120.5,
            unit: "ft".to_string(),
        }));
        assert!(prompt.contains("\"north wall\" measures 120.5 ft in real life"));
        assert!(!prompt.contains("{reference_section}"));

        let prompt = measurement_prompt(None);
        assert!(prompt.contains("Use the scale notation on the drawing"));
    }

    #[test]
    fn test_detail_prompt_lists_keys_and_products() {
        let prompt = detail_prompt(&PriceBook::builtin());
        assert!(prompt.contains("  Flashing_General  (Flashing (General), per "));
        assert!(prompt.contains("[Membranes] SBS Membrane"));
        assert!(!prompt.contains("{pricing_keys}"));
        assert!(spec_prompt(&PriceBook::builtin()).contains("Cap_Membrane"));
    }

    #[test]
    fn test_aggregate_prefers_high_confidence() {
        let low = MeasurementCandidate {
            total_roof_area_sqft: 100.0,
            confidence: "low".to_string(),
            ..Default::default()
        };
        let high = MeasurementCandidate {
            total_roof_area_sqft: 9_000.0,
            confidence: "HIGH".to_string(),
            ..Default::default()
        };
        let best = aggregate_measurements(vec![low, high]);
        assert_eq!(best.total_roof_area_sqft, 9_000.0);

        let empty = aggregate_measurements(Vec::new());
        assert_eq!(empty.scale, "Unknown");
        assert_eq!(empty.notes, "No measurements extracted.");
    }

    #[test]
    fn test_parapet_prefers_non_zero() {
        let zero_high = ParapetCandidate {
            parapet_height_ft: Some(0.0),
            confidence: "high".to_string(),
            ..Default::default()
        };
        let real_low = ParapetCandidate {
            parapet_height_ft: Some(2.5),
            confidence: "low".to_string(),
            ..Default::default()
        };
        let best = select_best_parapet_height(vec![zero_high, real_low]);
        assert_eq!(best.parapet_height_ft, Some(2.5));
        assert_eq!(select_best_parapet_height(Vec::new()).parapet_height_ft, Some(2.0));
    }

    #[test]
    fn test_parse_page_list() {
        assert_eq!(parse_page_list("1,3-5").unwrap(), vec![1, 3, 4, 5]);
        assert_eq!(parse_page_list(" 2 , 7 ").unwrap(), vec![2, 7]);
        assert!(parse_page_list("1,a").is_err());
        assert!(parse_page_list("").is_err());
    }

    #[test]
    fn test_parse_page_list_rejects_reversed_and_huge_ranges() {
        let err = parse_page_list("5-3").unwrap_err();
        assert!(matches!(err, EstimatorError::ValidationError { .. }));
        assert!(err.to_string().contains("reversed"));

        let err = parse_page_list("1-4000000000").unwrap_err();
        assert!(err.to_string().contains("more than"));

        assert_eq!(parse_page_list("7-7").unwrap(), vec![7]);
        assert_eq!(parse_page_list("1-10000").unwrap().len(), MAX_PAGE_LIST_LEN);
        assert!(parse_page_list("1-10000,10001").is_err());
    }

    #[test]
    fn test_page_suggestions_and_spec_filter() {
        let pages = vec![
            (1, "COVER SHEET".to_string()),
            (2, "ROOF PLAN R2.0".to_string()),
            (3, "Typical Parapet DETAIL".to_string()),
            (4, "Section 07 52 00 Modified Bitumen".to_string()),
            (5, "Division 09 Painting 09 91 00".to_string()),
            (6, "Refer to 075200 for membranes".to_string()),
        ];
        let suggestion = suggest_page_ranges(&pages);
        assert_eq!(suggestion.plan_pages, "2");
        assert_eq!(suggestion.detail_pages, "3,4");
        assert_eq!(filter_spec_pages(&pages).unwrap(), vec![4, 6]);
    }
}
