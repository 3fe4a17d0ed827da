use thiserror::Error;

#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid measurement '{field}': {reason}")]
    MeasurementError { field: String, reason: String },

    #[error("{service} error{}: {message}", status_suffix(.status))]
    ExternalServiceError {
        service: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{resource} not found: {detail}")]
    NotFoundError { resource: String, detail: String },

    #[error("Analysis failed on page {page}: {message}")]
    AnalysisError { page: u32, message: String },

    #[error("Estimation failed at '{stage}': {details}")]
    EstimationError { stage: String, details: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" {}", s)).unwrap_or_default()
}

/// 錯誤分類，用於日誌與退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    Io,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 命令列工具的退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EstimatorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EstimatorError::ConfigError { .. }
            | EstimatorError::ConfigValidationError { .. }
            | EstimatorError::InvalidConfigValueError { .. }
            | EstimatorError::MissingConfigError { .. }
            | EstimatorError::TomlError(_) => ErrorCategory::Configuration,
            EstimatorError::ApiError(_)
            | EstimatorError::ExternalServiceError { .. }
            | EstimatorError::NotFoundError { .. } => ErrorCategory::Network,
            EstimatorError::CsvError(_)
            | EstimatorError::SerializationError(_)
            | EstimatorError::MeasurementError { .. }
            | EstimatorError::AnalysisError { .. }
            | EstimatorError::EstimationError { .. }
            | EstimatorError::ProcessingError { .. }
            | EstimatorError::ValidationError { .. } => ErrorCategory::Data,
            EstimatorError::IoError(_) => ErrorCategory::Io,
            EstimatorError::ZipError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 可重試的外部服務錯誤
            EstimatorError::ApiError(_) | EstimatorError::ExternalServiceError { .. } => {
                ErrorSeverity::Medium
            }
            EstimatorError::NotFoundError { .. } | EstimatorError::AnalysisError { .. } => {
                ErrorSeverity::Medium
            }
            EstimatorError::IoError(_) | EstimatorError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            EstimatorError::ApiError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            EstimatorError::ExternalServiceError { status, .. } => {
                matches!(status, None | Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EstimatorError::ConfigError { .. }
            | EstimatorError::ConfigValidationError { .. }
            | EstimatorError::InvalidConfigValueError { .. } => {
                "Check the configuration file and command line arguments"
            }
            EstimatorError::MissingConfigError { .. } => {
                "Provide the missing value in the config file, the command line or a .env file"
            }
            EstimatorError::TomlError(_) => "Make sure the file is valid TOML",
            EstimatorError::ApiError(_) => "Check network connectivity and retry",
            EstimatorError::ExternalServiceError { .. } => {
                "Verify the API key and that the service is enabled, then retry"
            }
            EstimatorError::NotFoundError { .. } => "Check the address or input and try again",
            EstimatorError::MeasurementError { .. } => {
                "Re-measure from the scaled drawings; values must be finite and non-negative"
            }
            EstimatorError::AnalysisError { .. } => {
                "Re-run the drawing analysis or enter the counts manually"
            }
            EstimatorError::CsvError(_) => {
                "Check the price list columns: key,canonical_name,category,avg_price,unit"
            }
            EstimatorError::SerializationError(_) => "Check that the input is valid JSON",
            EstimatorError::IoError(_) => "Check that the file exists and the path is writable",
            EstimatorError::ZipError(_) => "Check available disk space and retry",
            EstimatorError::EstimationError { .. }
            | EstimatorError::ProcessingError { .. }
            | EstimatorError::ValidationError { .. } => "Review the input data and retry",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EstimatorError::MissingConfigError { field } => {
                format!("Required setting '{}' is missing", field)
            }
            EstimatorError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            EstimatorError::MeasurementError { field, reason } => {
                format!("Measurement '{}' is invalid: {}", field, reason)
            }
            EstimatorError::ExternalServiceError { service, message, .. } => {
                format!("{} request failed: {}", service, message)
            }
            EstimatorError::IoError(e) => format!("File operation failed: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
