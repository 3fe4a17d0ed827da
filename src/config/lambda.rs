use crate::config::{validate_input_files, DEFAULT_BUNDLE_FILENAME, OUTPUT_FORMATS};
use crate::core::{ConfigProvider, Storage};
use crate::domain::model::RoofSystemType;
use crate::utils::error::{EstimatorError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client as S3Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;

/// Lambda 事件：輸入檔皆為 bucket 內的物件鍵
#[derive(Debug, Clone, Deserialize)]
pub struct EstimateEvent {
    pub project_name: Option<String>,
    pub measurements_key: String,
    pub analysis_key: Option<String>,
    pub price_list_key: Option<String>,
    pub system: Option<RoofSystemType>,
    #[serde(default)]
    pub compare_systems: Vec<RoofSystemType>,
    #[serde(default)]
    pub price_overrides: BTreeMap<String, f64>,
    pub s3_bucket: Option<String>,
    pub s3_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub project_name: String,
    pub measurements_key: String,
    pub analysis_key: Option<String>,
    pub price_list_key: Option<String>,
    pub system: Option<RoofSystemType>,
    pub compare_systems: Vec<RoofSystemType>,
    pub price_overrides: BTreeMap<String, f64>,
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: String,
    output_formats: Vec<String>,
}

impl LambdaConfig {
    /// 事件欄位優先，其次環境變數
    pub fn from_event(event: EstimateEvent) -> Result<Self> {
        let s3_bucket = match event.s3_bucket {
            Some(bucket) => bucket,
            None => env::var("S3_BUCKET").map_err(|_| EstimatorError::MissingConfigError {
                field: "S3_BUCKET".to_string(),
            })?,
        };
        let s3_prefix = event
            .s3_prefix
            .or_else(|| env::var("S3_PREFIX").ok())
            .unwrap_or_else(|| "roof-estimates".to_string());

        Ok(Self {
            project_name: event
                .project_name
                .unwrap_or_else(|| "Roofing Project".to_string()),
            measurements_key: event.measurements_key,
            analysis_key: event.analysis_key,
            price_list_key: event.price_list_key,
            system: event.system,
            compare_systems: event.compare_systems,
            price_overrides: event.price_overrides,
            s3_bucket,
            s3_prefix,
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "ap-southeast-2".to_string()),
            output_formats: OUTPUT_FORMATS.iter().map(|f| f.to_string()).collect(),
        })
    }
}

impl ConfigProvider for LambdaConfig {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn measurements_path(&self) -> &str {
        &self.measurements_key
    }

    fn analysis_path(&self) -> Option<&str> {
        self.analysis_key.as_deref()
    }

    fn price_list_path(&self) -> Option<&str> {
        self.price_list_key.as_deref()
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
        &self.s3_prefix
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn compression_enabled(&self) -> bool {
        true
    }

    fn bundle_filename(&self) -> &str {
        DEFAULT_BUNDLE_FILENAME
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("project_name", &self.project_name)?;
        validate_input_files(
            &self.measurements_key,
            self.analysis_key.as_deref(),
            self.price_list_key.as_deref(),
        )?;
        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;
        validate_non_empty_string("s3_prefix", &self.s3_prefix)?;
        validate_aws_region("s3_region", &self.s3_region)?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    let invalid = |reason: &str| EstimatorError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: bucket_name.to_string(),
        reason: reason.to_string(),
    };

    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid("S3 bucket name must be between 3 and 63 characters"));
    }
    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }
    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid("S3 bucket name cannot start or end with a hyphen"));
    }
    Ok(())
}

fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(EstimatorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn s3_error(&self, action: &str, path: &str, detail: impl std::fmt::Display) -> EstimatorError {
        EstimatorError::ExternalServiceError {
            service: "S3".to_string(),
            status: None,
            message: format!("{} s3://{}/{} failed: {}", action, self.bucket, path, detail),
        }
    }
}

impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetObjectError::NoSuchKey(_) => EstimatorError::NotFoundError {
                    resource: "S3 object".to_string(),
                    detail: format!("s3://{}/{}", self.bucket, path),
                },
                err => self.s3_error(
                    "Read",
                    path,
                    err.message().unwrap_or("unknown service error"),
                ),
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| self.s3_error("Collect", path, e))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                self.s3_error("Write", path, err.message().unwrap_or("unknown service error"))
            })?;

        tracing::debug!("💾 Uploaded {} bytes to s3://{}/{}", data.len(), self.bucket, path);
        Ok(())
    }
}
