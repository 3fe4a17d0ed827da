pub mod batch_config;
pub mod cli;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod services;
pub mod toml_config;

use crate::domain::model::RoofSystemType;
use crate::utils::error::{EstimatorError, Result};
use crate::utils::validation::{validate_file_extension, validate_path, Validate};
use regex::Regex;
use std::collections::BTreeMap;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

pub const OUTPUT_FORMATS: [&str; 3] = ["json", "csv", "txt"];
pub const DEFAULT_BUNDLE_FILENAME: &str = "estimate_bundle.zip";

/// 替換環境變數 (例如 ${GEMINI_API_KEY})，未設定者保留原字串
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EstimatorError::ProcessingError {
        message: e.to_string(),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

pub fn validate_output_formats(field_name: &str, formats: &[String]) -> Result<()> {
    for format in formats {
        if !OUTPUT_FORMATS.contains(&format.as_str()) {
            return Err(EstimatorError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: format.clone(),
                reason: format!(
                    "Unsupported format. Valid formats: {}",
                    OUTPUT_FORMATS.join(", ")
                ),
            });
        }
    }
    Ok(())
}

/// 量測檔、分析檔與價格清單的副檔名檢查
pub fn validate_input_files(
    measurements: &str,
    analysis: Option<&str>,
    price_list: Option<&str>,
) -> Result<()> {
    validate_path("measurements", measurements)?;
    validate_file_extension("measurements", measurements, &["toml", "json"])?;
    if let Some(analysis) = analysis {
        validate_file_extension("analysis", analysis, &["json"])?;
    }
    if let Some(price_list) = price_list {
        validate_file_extension("price_list", price_list, &["csv"])?;
    }
    Ok(())
}

/// "Primer=300" → ("Primer", 300.0)
pub fn parse_price_override(value: &str) -> std::result::Result<(String, f64), String> {
    let (key, price) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=PRICE, got '{}'", value))?;
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|_| format!("invalid price '{}' for '{}'", price.trim(), key.trim()))?;
    if !price.is_finite() || price < 0.0 {
        return Err(format!("price for '{}' must be non-negative", key.trim()));
    }
    Ok((key.trim().to_string(), price))
}

pub fn parse_system(value: &str) -> std::result::Result<RoofSystemType, String> {
    value.parse().map_err(|e: EstimatorError| e.to_string())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "roof-takeoff")]
#[command(about = "Roofing quantity takeoff and cost estimator")]
pub struct CliConfig {
    #[arg(long, default_value = "Roofing Project")]
    pub project_name: String,

    #[arg(long, help = "Measurement file (.toml or .json)")]
    pub measurements: String,

    #[arg(long, help = "Drawing analysis JSON for the detail-based takeoff")]
    pub analysis: Option<String>,

    #[arg(long, help = "Supplier price list CSV")]
    pub price_list: Option<String>,

    #[arg(long = "price", value_parser = parse_price_override, help = "Price override KEY=PRICE")]
    pub prices: Vec<(String, f64)>,

    #[arg(long, value_parser = parse_system)]
    pub system: Option<RoofSystemType>,

    #[arg(long, value_delimiter = ',', value_parser = parse_system)]
    pub compare: Vec<RoofSystemType>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "json,csv,txt")]
    pub formats: Vec<String>,

    #[arg(long, help = "Write loose files instead of a ZIP bundle")]
    pub no_compression: bool,

    #[arg(long, default_value = DEFAULT_BUNDLE_FILENAME)]
    pub bundle_filename: String,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn measurements_path(&self) -> &str {
        &self.measurements
    }

    fn analysis_path(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    fn price_list_path(&self) -> Option<&str> {
        self.price_list.as_deref()
    }

    fn price_overrides(&self) -> BTreeMap<String, f64> {
        self.prices.iter().cloned().collect()
    }

    fn system_override(&self) -> Option<RoofSystemType> {
        self.system
    }

    fn compare_systems(&self) -> &[RoofSystemType] {
        &self.compare
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn compression_enabled(&self) -> bool {
        !self.no_compression
    }

    fn bundle_filename(&self) -> &str {
        &self.bundle_filename
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_input_files(
            &self.measurements,
            self.analysis.as_deref(),
            self.price_list.as_deref(),
        )?;
        validate_path("output_path", &self.output_path)?;
        validate_output_formats("formats", &self.formats)?;
        if !self.no_compression {
            validate_file_extension("bundle_filename", &self.bundle_filename, &["zip"])?;
        }
        Ok(())
    }
}
