use crate::utils::error::EstimatorError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// RFC 9457 problem details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            type_uri: format!("https://httpstatuses.io/{}", status.as_u16()),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

pub fn map_estimator_error(err: &EstimatorError) -> Problem {
    let problem = match err {
        EstimatorError::MeasurementError { .. }
        | EstimatorError::ValidationError { .. }
        | EstimatorError::InvalidConfigValueError { .. }
        | EstimatorError::ConfigValidationError { .. }
        | EstimatorError::SerializationError(_)
        | EstimatorError::CsvError(_) => Problem::new(StatusCode::BAD_REQUEST, "Invalid request"),
        EstimatorError::NotFoundError { resource, .. } => {
            Problem::new(StatusCode::NOT_FOUND, format!("{} not found", resource))
        }
        EstimatorError::ExternalServiceError { service, .. } => {
            Problem::new(StatusCode::BAD_GATEWAY, format!("{} unavailable", service))
        }
        EstimatorError::ApiError(_) => Problem::new(StatusCode::BAD_GATEWAY, "Upstream request failed"),
        EstimatorError::MissingConfigError { .. } => {
            Problem::new(StatusCode::SERVICE_UNAVAILABLE, "Service not configured")
        }
        _ => {
            tracing::error!("❌ Unhandled estimator error: {}", err);
            return Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                .with_detail("An internal error occurred");
        }
    };
    problem.with_detail(err.to_string())
}

impl From<EstimatorError> for Problem {
    fn from(err: EstimatorError) -> Self {
        map_estimator_error(&err)
    }
}
