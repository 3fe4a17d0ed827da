use crate::config::toml_config::{validate_price_overrides, MonitoringConfig, PricingConfig};
use crate::config::{
    substitute_env_vars, validate_input_files, validate_output_formats, DEFAULT_BUNDLE_FILENAME,
    OUTPUT_FORMATS,
};
use crate::core::ConfigProvider;
use crate::domain::model::RoofSystemType;
use crate::utils::error::{EstimatorError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// 多專案批次估算設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub batch: BatchInfo,
    pub projects: Vec<ProjectDefinition>,
    pub pricing: Option<PricingConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInfo {
    pub name: String,
    pub description: Option<String>,
    pub execution_order: Vec<String>,
    pub output_path: String,
    pub output_formats: Option<Vec<String>>,
    pub compression: Option<bool>,
    /// 每個專案預設比較的系統
    #[serde(default)]
    pub compare_systems: Vec<RoofSystemType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDefinition {
    pub id: String,
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub measurements: String,
    pub analysis: Option<String>,
    pub system: Option<RoofSystemType>,
    pub compare_systems: Option<Vec<RoofSystemType>>,
    #[serde(default)]
    pub price_overrides: BTreeMap<String, f64>,
}

/// 批次中單一專案的執行設定
#[derive(Debug, Clone)]
pub struct ProjectRunConfig {
    pub id: String,
    name: String,
    measurements: String,
    analysis: Option<String>,
    price_list: Option<String>,
    price_overrides: BTreeMap<String, f64>,
    system: Option<RoofSystemType>,
    compare_systems: Vec<RoofSystemType>,
    output_path: String,
    output_formats: Vec<String>,
    compression: bool,
}

impl BatchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EstimatorError::ConfigValidationError {
            field: "batch_toml_parsing".to_string(),
            message: format!("Batch TOML parsing error: {}", e),
        })
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("batch.name", &self.batch.name)?;
        validate_path("batch.output_path", &self.batch.output_path)?;
        if let Some(formats) = &self.batch.output_formats {
            validate_output_formats("batch.output_formats", formats)?;
        }

        let mut ids = HashSet::new();
        for project in &self.projects {
            validate_non_empty_string("projects.id", &project.id)?;
            if !ids.insert(project.id.as_str()) {
                return Err(EstimatorError::ConfigValidationError {
                    field: "projects.id".to_string(),
                    message: format!("Duplicate project id '{}'", project.id),
                });
            }
            validate_input_files(
                &project.measurements,
                project.analysis.as_deref(),
                None,
            )?;
            validate_price_overrides(
                &format!("projects.{}.price_overrides", project.id),
                &project.price_overrides,
            )?;
        }

        // 執行順序中的專案都必須存在
        for id in &self.batch.execution_order {
            if !ids.contains(id.as_str()) {
                return Err(EstimatorError::ConfigValidationError {
                    field: "batch.execution_order".to_string(),
                    message: format!(
                        "Project '{}' in execution order not found in projects definition",
                        id
                    ),
                });
            }
        }

        if let Some(pricing) = &self.pricing {
            if let Some(price_list) = &pricing.price_list {
                validate_file_extension("pricing.price_list", price_list, &["csv"])?;
            }
            validate_price_overrides("pricing.overrides", &pricing.overrides)?;
        }

        Ok(())
    }

    pub fn get_project(&self, id: &str) -> Option<&ProjectDefinition> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// 依執行順序列出啟用的專案；未指定順序時依定義順序
    pub fn get_enabled_projects(&self) -> Vec<&ProjectDefinition> {
        let ordered: Vec<&ProjectDefinition> = if self.batch.execution_order.is_empty() {
            self.projects.iter().collect()
        } else {
            self.batch
                .execution_order
                .iter()
                .filter_map(|id| self.get_project(id))
                .collect()
        };
        ordered
            .into_iter()
            .filter(|project| project.enabled.unwrap_or(true))
            .collect()
    }

    pub fn run_config(&self, project: &ProjectDefinition) -> ProjectRunConfig {
        let mut price_overrides = self
            .pricing
            .as_ref()
            .map(|p| p.overrides.clone())
            .unwrap_or_default();
        price_overrides.extend(project.price_overrides.clone());

        ProjectRunConfig {
            id: project.id.clone(),
            name: project.name.clone().unwrap_or_else(|| project.id.clone()),
            measurements: project.measurements.clone(),
            analysis: project.analysis.clone(),
            price_list: self.pricing.as_ref().and_then(|p| p.price_list.clone()),
            price_overrides,
            system: project.system,
            compare_systems: project
                .compare_systems
                .clone()
                .unwrap_or_else(|| self.batch.compare_systems.clone()),
            output_path: format!("{}/{}", self.batch.output_path, project.id),
            output_formats: self
                .batch
                .output_formats
                .clone()
                .unwrap_or_else(|| OUTPUT_FORMATS.iter().map(|f| f.to_string()).collect()),
            compression: self.batch.compression.unwrap_or(true),
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for ProjectRunConfig {
    fn project_name(&self) -> &str {
        &self.name
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
        self.price_overrides.clone()
    }

    fn system_override(&self) -> Option<RoofSystemType> {
        self.system
    }

    fn compare_systems(&self) -> &[RoofSystemType] {
        &self.compare_systems
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn compression_enabled(&self) -> bool {
        self.compression
    }

    fn bundle_filename(&self) -> &str {
        DEFAULT_BUNDLE_FILENAME
    }
}

impl Validate for BatchConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: &str = r#"
[batch]
name = "Spring tender"
execution_order = ["library", "school"]
output_path = "./out/batch"
compare_systems = ["SBS", "TPO_Fully_Adhered"]

[pricing.overrides]
Primer = 250.0

[[projects]]
id = "school"
name = "ABC School"
measurements = "school.toml"
price_overrides = { Primer = 275.0 }

[[projects]]
id = "library"
measurements = "library.json"
compare_systems = []

[[projects]]
id = "gym"
enabled = false
measurements = "gym.toml"
"#;

    #[test]
    fn test_batch_parsing_and_order() {
        let config = BatchConfig::from_toml_str(BATCH).unwrap();
        assert!(config.validate().is_ok());

        let enabled: Vec<_> = config
            .get_enabled_projects()
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(enabled, vec!["library", "school"]);
    }

    #[test]
    fn test_run_config_merges_batch_settings() {
        let config = BatchConfig::from_toml_str(BATCH).unwrap();

        let school = config.run_config(config.get_project("school").unwrap());
        assert_eq!(school.project_name(), "ABC School");
        assert_eq!(school.output_path(), "./out/batch/school");
        assert_eq!(school.price_overrides()["Primer"], 275.0);
        assert_eq!(school.compare_systems().len(), 2);
        assert_eq!(school.output_formats().len(), 3);

        let library = config.run_config(config.get_project("library").unwrap());
        assert_eq!(library.project_name(), "library");
        assert_eq!(library.price_overrides()["Primer"], 250.0);
        assert!(library.compare_systems().is_empty());
    }

    #[test]
    fn test_unknown_project_in_order() {
        let content = BATCH.replace("[\"library\", \"school\"]", "[\"library\", \"arena\"]");
        let config = BatchConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let content = BATCH.replace("id = \"gym\"", "id = \"school\"");
        let config = BatchConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }
}
