use crate::utils::error::{EstimatorError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use std::env;

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_SOLAR_ENDPOINT: &str = "https://solar.googleapis.com";
pub const DEFAULT_NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_ARCGIS_ENDPOINT: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer";
pub const DEFAULT_USER_AGENT: &str = "roof-takeoff/0.1 (roofing estimator)";

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_number<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|_| EstimatorError::InvalidConfigValueError {
                    field: name.to_string(),
                    value: raw.clone(),
                    reason: "Expected a number".to_string(),
                })
        }
        _ => Ok(default),
    }
}

fn required_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| EstimatorError::MissingConfigError {
            field: name.to_string(),
        })
}

/// Gemini 影像分析服務設定
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub max_concurrency: usize,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            max_attempts: 3,
            retry_base_delay_ms: 1000,
            max_concurrency: 2,
        }
    }

    /// 讀取 .env 與環境變數；GEMINI_API_KEY 必填
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            api_key: required_env("GEMINI_API_KEY")?,
            model: env_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            endpoint: env_or("GEMINI_ENDPOINT", DEFAULT_GEMINI_ENDPOINT),
            max_attempts: env_number("GEMINI_MAX_ATTEMPTS", 3)?,
            retry_base_delay_ms: env_number("GEMINI_RETRY_DELAY_MS", 1000)?,
            max_concurrency: env_number("GEMINI_MAX_CONCURRENCY", 2)?,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }
}

impl Validate for GeminiConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("gemini.api_key", &self.api_key)?;
        validate_non_empty_string("gemini.model", &self.model)?;
        validate_url("gemini.endpoint", &self.endpoint)?;
        validate_positive_number("gemini.max_attempts", self.max_attempts, 1)?;
        validate_range("gemini.max_concurrency", self.max_concurrency, 1, 8)?;
        Ok(())
    }
}

/// Google Solar 與地理編碼服務設定
#[derive(Debug, Clone)]
pub struct SolarConfig {
    pub api_key: String,
    pub solar_endpoint: String,
    pub nominatim_endpoint: String,
    pub arcgis_endpoint: String,
    pub geocode_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
}

impl SolarConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            solar_endpoint: DEFAULT_SOLAR_ENDPOINT.to_string(),
            nominatim_endpoint: DEFAULT_NOMINATIM_ENDPOINT.to_string(),
            arcgis_endpoint: DEFAULT_ARCGIS_ENDPOINT.to_string(),
            geocode_attempts: 5,
            retry_base_delay_ms: 1000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// 讀取 .env 與環境變數；GOOGLE_SOLAR_API_KEY 必填
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            api_key: required_env("GOOGLE_SOLAR_API_KEY")?,
            solar_endpoint: env_or("SOLAR_ENDPOINT", DEFAULT_SOLAR_ENDPOINT),
            nominatim_endpoint: env_or("NOMINATIM_ENDPOINT", DEFAULT_NOMINATIM_ENDPOINT),
            arcgis_endpoint: env_or("ARCGIS_ENDPOINT", DEFAULT_ARCGIS_ENDPOINT),
            geocode_attempts: env_number("GEOCODE_ATTEMPTS", 5)?,
            retry_base_delay_ms: env_number("GEOCODE_RETRY_DELAY_MS", 1000)?,
            user_agent: env_or("GEOCODE_USER_AGENT", DEFAULT_USER_AGENT),
        })
    }

    /// 測試時把三個服務指向同一個 mock server
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.solar_endpoint = base.to_string();
        self.nominatim_endpoint = base.to_string();
        self.arcgis_endpoint = format!("{}/arcgis", base);
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }
}

impl Validate for SolarConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("solar.api_key", &self.api_key)?;
        validate_url("solar.solar_endpoint", &self.solar_endpoint)?;
        validate_url("solar.nominatim_endpoint", &self.nominatim_endpoint)?;
        validate_url("solar.arcgis_endpoint", &self.arcgis_endpoint)?;
        validate_range("solar.geocode_attempts", self.geocode_attempts, 1, 10)?;
        validate_non_empty_string("solar.user_agent", &self.user_agent)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_defaults_validate() {
        let config = GeminiConfig::new("test-key");
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.max_concurrency, 2);
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.max_concurrency = 0;
        assert!(bad.validate().is_err());

        let bad_endpoint = config.with_endpoint("not a url");
        assert!(bad_endpoint.validate().is_err());
    }

    #[test]
    fn test_solar_base_url_override() {
        let config = SolarConfig::new("k").with_base_url("http://127.0.0.1:8080/");
        assert_eq!(config.solar_endpoint, "http://127.0.0.1:8080");
        assert_eq!(config.arcgis_endpoint, "http://127.0.0.1:8080/arcgis");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_key_error() {
        let err = required_env("ROOF_TEST_SURELY_UNSET_KEY").unwrap_err();
        assert!(matches!(err, EstimatorError::MissingConfigError { .. }));
    }
}
