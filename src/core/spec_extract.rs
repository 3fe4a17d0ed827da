//! 規範書 / 圖面文字的產品關鍵字擷取。

use crate::catalog::keywords::KeywordMatcher;
use crate::utils::error::{EstimatorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_SNIPPETS: usize = 5;
const SNIPPET_CHARS: usize = 200;
const PROJECT_INFO_PAGES: usize = 2;
const PROJECT_NAME_LINES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_name: Option<String>,
    pub address: Option<String>,
    pub project_number: Option<String>,
    pub date: Option<String>,
    pub consultant: Option<String>,
    pub client: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMention {
    pub pages: Vec<u32>,
    pub count: u32,
    pub context_snippets: Vec<String>,
    pub dimensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecSummary {
    pub total_categories: usize,
    pub total_unique_products: usize,
    pub categories: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecAnalysis {
    pub project_info: ProjectInfo,
    /// 類別 → 產品 → 出現紀錄
    pub products: BTreeMap<String, BTreeMap<String, ProductMention>>,
    pub summary: SpecSummary,
}

/// `pdftotext` 輸出以換頁字元分頁，頁碼從 1 開始
pub fn split_pages(text: &str) -> Vec<(u32, String)> {
    let mut pages: Vec<&str> = text.split('\x0c').collect();
    if pages.len() > 1 && pages.last().is_some_and(|last| last.trim().is_empty()) {
        pages.pop();
    }
    pages
        .into_iter()
        .enumerate()
        .map(|(i, page)| (i as u32 + 1, page.to_string()))
        .collect()
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| EstimatorError::ProcessingError {
        message: format!("Invalid extraction pattern '{}': {}", pattern, e),
    })
}

pub struct SpecExtractor {
    matcher: KeywordMatcher,
    dimension: Regex,
}

impl SpecExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            matcher: KeywordMatcher::new()?,
            dimension: regex(r"(?i)(\d+(?:\.\d+)?)\s*(mm|cm|m|inch|in|ft|mil)\b")?,
        })
    }

    pub fn analyze_text(&self, pages: &[(u32, String)]) -> Result<SpecAnalysis> {
        let project_info = extract_project_info(pages)?;
        let mut products: BTreeMap<String, BTreeMap<String, ProductMention>> = BTreeMap::new();

        for (page, text) in pages {
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                for rule in self.matcher.matches(line) {
                    let entry = products
                        .entry(rule.category.to_string())
                        .or_default()
                        .entry(rule.product.to_string())
                        .or_default();

                    entry.count += 1;
                    if !entry.pages.contains(page) {
                        entry.pages.push(*page);
                    }

                    let snippet: String = line.chars().take(SNIPPET_CHARS).collect();
                    if entry.context_snippets.len() < MAX_SNIPPETS
                        && !entry.context_snippets.contains(&snippet)
                    {
                        entry.context_snippets.push(snippet);
                    }

                    for caps in self.dimension.captures_iter(line) {
                        let dimension = format!("{}{}", &caps[1], caps[2].to_lowercase());
                        if !entry.dimensions.contains(&dimension) {
                            entry.dimensions.push(dimension);
                        }
                    }
                }
            }
        }

        let categories: BTreeMap<String, usize> = products
            .iter()
            .map(|(category, items)| (category.clone(), items.len()))
            .collect();
        let summary = SpecSummary {
            total_categories: products.len(),
            total_unique_products: categories.values().sum(),
            categories,
        };

        tracing::debug!(
            "🔍 Found {} unique products across {} categories",
            summary.total_unique_products,
            summary.total_categories
        );

        Ok(SpecAnalysis {
            project_info,
            products,
            summary,
        })
    }
}

pub fn analyze_text(pages: &[(u32, String)]) -> Result<SpecAnalysis> {
    SpecExtractor::new()?.analyze_text(pages)
}

/// 專案資訊只看前兩頁
fn extract_project_info(pages: &[(u32, String)]) -> Result<ProjectInfo> {
    let combined = pages
        .iter()
        .take(PROJECT_INFO_PAGES)
        .map(|(_, text)| text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut info = ProjectInfo::default();

    if let Some(caps) = regex(r"(?i)Project\s*No\.?\s*:?\s*(\S+)")?.captures(&combined) {
        info.project_number = Some(caps[1].to_string());
    }

    if let Some(caps) = regex(r"(?i)Date\s*:?\s*([\w\s\-,]+\d{4})")?.captures(&combined) {
        info.date = Some(caps[1].trim().to_string());
    }

    if let Some(caps) = regex(r"(?i)(\d+\s+\d+\s+Street\s+\w+)")?.captures(&combined) {
        info.address = Some(caps[1].to_string());
    }

    let city = regex(
        r"(?i)(Calgary|Edmonton|Toronto|Vancouver|Ottawa|Winnipeg)\s*,?\s*(Alberta|Ontario|BC|Manitoba|Saskatchewan|Quebec)",
    )?;
    if let Some(caps) = city.captures(&combined) {
        let locality = format!("{}, {}", &caps[1], &caps[2]);
        info.address = Some(match info.address.take() {
            Some(street) => format!("{}, {}", street, locality),
            None => locality,
        });
    }

    let title = regex(r"(?i)roofing|replacement|restoration|repair")?;
    info.project_name = combined
        .split('\n')
        .take(PROJECT_NAME_LINES)
        .find(|line| title.is_match(line) && line.chars().count() > 10)
        .map(|line| line.trim().to_string());

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pages() -> Vec<(u32, String)> {
        vec![
            (
                1,
                "ABC School Roofing Replacement\nProject No.: 2024-117\n\
                 1234 56 Street NE\nCalgary, Alberta\nDate: March 15, 2024\n"
                    .to_string(),
            ),
            (
                2,
                "Install 2 layers of 50mm polyisocyanurate insulation\nApply urethane sealant\n"
                    .to_string(),
            ),
            (
                3,
                "Polyisocyanurate insulation 50 mm and 2.5 in\n\nApply urethane sealant\n".to_string(),
            ),
        ]
    }

    #[test]
    fn test_project_info() {
        let analysis = analyze_text(&sample_pages()).unwrap();
        let info = analysis.project_info;
        assert_eq!(info.project_name.as_deref(), Some("ABC School Roofing Replacement"));
        assert_eq!(info.project_number.as_deref(), Some("2024-117"));
        assert_eq!(info.date.as_deref(), Some("March 15, 2024"));
        assert_eq!(info.address.as_deref(), Some("1234 56 Street NE, Calgary, Alberta"));
        assert!(info.client.is_none());
    }

    #[test]
    fn test_product_mentions() {
        let analysis = analyze_text(&sample_pages()).unwrap();
        let sealants = &analysis.products["Sealants & Adhesives"];
        let urethane = &sealants["Urethane Sealant"];
        assert_eq!(urethane.count, 2);
        assert_eq!(urethane.pages, vec![2, 3]);
        // 相同內容只留一筆
        assert_eq!(urethane.context_snippets, vec!["Apply urethane sealant".to_string()]);
        assert!(!sealants.contains_key("Sealant (General)"));

        let insulation = analysis
            .products
            .values()
            .flat_map(|items| items.iter())
            .find(|(_, mention)| mention.dimensions.contains(&"2.5in".to_string()))
            .map(|(_, mention)| mention)
            .unwrap();
        assert!(insulation.dimensions.contains(&"50mm".to_string()));

        assert_eq!(analysis.summary.total_categories, analysis.products.len());
        assert_eq!(
            analysis.summary.total_unique_products,
            analysis.summary.categories.values().sum::<usize>()
        );
    }

    #[test]
    fn test_split_pages_drops_trailing_form_feed() {
        let pages = split_pages("first\x0csecond\x0c");
        assert_eq!(pages, vec![(1, "first".to_string()), (2, "second".to_string())]);
        assert_eq!(split_pages("").len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let analysis = analyze_text(&[]).unwrap();
        assert!(analysis.products.is_empty());
        assert_eq!(analysis.summary.total_unique_products, 0);
        assert_eq!(analysis.project_info, ProjectInfo::default());
    }
}
