use crate::config::{
    substitute_env_vars, validate_input_files, validate_output_formats, DEFAULT_BUNDLE_FILENAME,
};
use crate::core::ConfigProvider;
use crate::domain::model::RoofSystemType;
use crate::utils::error::{EstimatorError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub project: ProjectConfig,
    pub input: InputConfig,
    pub pricing: Option<PricingConfig>,
    pub comparison: Option<ComparisonConfig>,
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub measurements: String,
    pub analysis: Option<String>,
    pub system: Option<RoofSystemType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    pub price_list: Option<String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonConfig {
    #[serde(default)]
    pub systems: Vec<RoofSystemType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    pub formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

pub(crate) fn validate_price_overrides(field_name: &str, overrides: &BTreeMap<String, f64>) -> Result<()> {
    for (key, price) in overrides {
        if !price.is_finite() || *price < 0.0 {
            return Err(EstimatorError::InvalidConfigValueError {
                field: format!("{}.{}", field_name, key),
                value: price.to_string(),
                reason: "Price must be a non-negative number".to_string(),
            });
        }
    }
    Ok(())
}

impl EstimatorConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EstimatorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("project.name", &self.project.name)?;

        let price_list = self.pricing.as_ref().and_then(|p| p.price_list.as_deref());
        validate_input_files(
            &self.input.measurements,
            self.input.analysis.as_deref(),
            price_list,
        )?;

        validate_path("output.path", &self.output.path)?;
        validate_output_formats("output.formats", &self.output.formats)?;

        if let Some(pricing) = &self.pricing {
            validate_price_overrides("pricing.overrides", &pricing.overrides)?;
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// `[monitoring] log_level = "debug"` 等同 --verbose
    pub fn debug_logging(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_level.as_deref())
            .is_some_and(|level| level.eq_ignore_ascii_case("debug"))
    }
}

impl ConfigProvider for EstimatorConfig {
    fn project_name(&self) -> &str {
        &self.project.name
    }

    fn measurements_path(&self) -> &str {
        &self.input.measurements
    }

    fn analysis_path(&self) -> Option<&str> {
        self.input.analysis.as_deref()
    }

    fn price_list_path(&self) -> Option<&str> {
        self.pricing.as_ref().and_then(|p| p.price_list.as_deref())
    }

    fn price_overrides(&self) -> BTreeMap<String, f64> {
        self.pricing
            .as_ref()
            .map(|p| p.overrides.clone())
            .unwrap_or_default()
    }

    fn system_override(&self) -> Option<RoofSystemType> {
        self.input.system
    }

    fn compare_systems(&self) -> &[RoofSystemType] {
        self.comparison
            .as_ref()
            .map(|c| c.systems.as_slice())
            .unwrap_or(&[])
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn output_formats(&self) -> &[String] {
        &self.output.formats
    }

    fn compression_enabled(&self) -> bool {
        self.output
            .compression
            .as_ref()
            .map(|c| c.enabled)
            .unwrap_or(true)
    }

    fn bundle_filename(&self) -> &str {
        self.output
            .compression
            .as_ref()
            .and_then(|c| c.filename.as_deref())
            .unwrap_or(DEFAULT_BUNDLE_FILENAME)
    }
}

impl Validate for EstimatorConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
