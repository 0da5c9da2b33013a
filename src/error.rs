use crate::predictor::PredictorError;
use crate::schema::CANONICAL_COLUMNS;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;

/// A single field that failed to bind on the `/predict` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn missing(field: &str) -> Self {
        FieldError {
            loc: vec!["body".to_string(), field.to_string()],
            msg: "Field required".to_string(),
            kind: "missing".to_string(),
        }
    }

    pub fn invalid(field: &str, msg: impl Into<String>, kind: &str) -> Self {
        FieldError {
            loc: vec!["body".to_string(), field.to_string()],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        self.loc.last().map(String::as_str).unwrap_or("body")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid input for fields: {}", field_names(.0))]
    InvalidInput(Vec<FieldError>),

    #[error("Invalid JSON payload: {0}")]
    MalformedBody(String),

    #[error("Missing upload: {0}")]
    MissingUpload(String),

    #[error("Only CSV files are supported")]
    UnsupportedFormat,

    #[error("Could not parse CSV file: {0}")]
    ParseError(String),

    #[error("The CSV file must contain the following columns: {}", CANONICAL_COLUMNS.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Inference failed: {0}")]
    InferenceFailure(#[from] PredictorError),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn field_names(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(FieldError::field)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_)
            | ServiceError::MalformedBody(_)
            | ServiceError::MissingUpload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::UnsupportedFormat
            | ServiceError::ParseError(_)
            | ServiceError::SchemaMismatch { .. } => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::InferenceFailure(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ServiceError::InvalidInput(errors) => json!({ "detail": errors }),
            ServiceError::SchemaMismatch { .. } => json!({
                "detail": self.to_string(),
                "required_columns": CANONICAL_COLUMNS,
            }),
            ServiceError::InferenceFailure(_) | ServiceError::Internal(_) => {
                log::error!("{}", self);
                json!({ "detail": "Internal Server Error" })
            }
            _ => json!({ "detail": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
