//! Shared error contracts.
//!
//! Every rejection the system produces carries a stable UPPER_SNAKE_CASE
//! code. `ErrorResponse` is the wire shape the collaborating API layer
//! returns; the `IntoResponse` impl maps codes onto the agreed HTTP
//! statuses (400 field rejections, 404 unknown property/version, 409
//! illegal transition, 413 oversized document).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable rejection codes for listings that fail normalisation or
/// structural validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    MissingRequiredField,
    InvalidPostcode,
    UnmappedPropertyType,
    UnmappedTenure,
    PriceBelowThreshold,
    PriceAboveThreshold,
    FutureListingDate,
    StaleListing,
    /// A source fetch exceeded its timeout; the batch is rejected, never
    /// synthesised.
    FetchTimeout,
}

impl RejectionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::InvalidPostcode => "INVALID_POSTCODE",
            Self::UnmappedPropertyType => "UNMAPPED_PROPERTY_TYPE",
            Self::UnmappedTenure => "UNMAPPED_TENURE",
            Self::PriceBelowThreshold => "PRICE_BELOW_THRESHOLD",
            Self::PriceAboveThreshold => "PRICE_ABOVE_THRESHOLD",
            Self::FutureListingDate => "FUTURE_LISTING_DATE",
            Self::StaleListing => "STALE_LISTING",
            Self::FetchTimeout => "FETCH_TIMEOUT",
        }
    }
}

impl std::fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-field error detail for submission rejections.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    /// Field path (e.g. "agent_email")
    pub field: String,
    /// Error message for this field
    pub message: String,
    /// Stable error code
    pub code: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Standard API error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Detailed field-level errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    /// ISO 8601 timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation_failed(details: Vec<FieldError>) -> Self {
        Self::new("VALIDATION_FAILED", "submission failed field validation").with_details(details)
    }
}

/// HTTP status for a stable error code.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "UNKNOWN_PROPERTY" | "VERSION_NOT_FOUND" | "NOT_FOUND" => StatusCode::NOT_FOUND,
        "ILLEGAL_STATUS_TRANSITION" => StatusCode::CONFLICT,
        "FILE_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
        "VALIDATION_FAILED"
        | "MISSING_REQUIRED_FIELD"
        | "INVALID_POSTCODE"
        | "UNMAPPED_PROPERTY_TYPE"
        | "UNMAPPED_TENURE"
        | "PRICE_BELOW_THRESHOLD"
        | "PRICE_ABOVE_THRESHOLD"
        | "FUTURE_LISTING_DATE"
        | "STALE_LISTING"
        | "UNSUPPORTED_FORMAT"
        | "EMPTY_FILE"
        | "UNEXPECTED_FIELD" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = status_for_code(self.code.as_str());
        (status, Json(self)).into_response()
    }
}
