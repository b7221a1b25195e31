use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PbError>;

/// Error body returned by the record service on non-success responses.
///
/// `{"code": 400, "message": "Failed to create record.", "data": {"password": {"code": "...", "message": "..."}}}`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: BTreeMap<String, FieldError>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FieldError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum PbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {}", .0.message)]
    Validation(ApiErrorBody),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl PbError {
    /// Classify a non-success response by status and (optional) error body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = if parsed.message.is_empty() {
            format!("HTTP {}", status)
        } else {
            parsed.message.clone()
        };

        match status {
            404 => Self::NotFound(message),
            400 if !parsed.data.is_empty() => Self::Validation(parsed),
            401 | 403 => Self::Auth(message),
            _ => Self::Api { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Transport-level failure: the service could not be reached or answered garbage.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Json(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Message suitable for showing to an end user.
    ///
    /// Field-level validation errors win over the generic service message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(body) => {
                let fields: Vec<String> = body
                    .data
                    .iter()
                    .filter_map(|(field, err)| {
                        err.message.as_ref().map(|m| format!("{}: {}", field, m))
                    })
                    .collect();

                if !fields.is_empty() {
                    fields.join(", ")
                } else {
                    let names: Vec<&str> = body.data.keys().map(String::as_str).collect();
                    format!("Validation error in fields: {}", names.join(", "))
                }
            }
            Self::NotFound(message) | Self::Auth(message) | Self::Api { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_field_messages() {
        let body = r#"{
            "code": 400,
            "message": "Failed to create record.",
            "data": {
                "password": {"code": "validation_length_out_of_range", "message": "The length must be between 8 and 72."},
                "email": {"code": "validation_invalid_email", "message": "Must be a valid email address."}
            }
        }"#;
        let err = PbError::from_response(400, body);
        assert!(matches!(err, PbError::Validation(_)));
        assert_eq!(
            err.user_message(),
            "email: Must be a valid email address., password: The length must be between 8 and 72."
        );
    }

    #[test]
    fn test_validation_without_field_messages() {
        let body = r#"{"code": 400, "message": "Failed.", "data": {"name": {"code": "x"}, "email": {"code": "y"}}}"#;
        let err = PbError::from_response(400, body);
        assert_eq!(err.user_message(), "Validation error in fields: email, name");
    }

    #[test]
    fn test_status_classification() {
        assert!(PbError::from_response(404, r#"{"code":404,"message":"Missing."}"#).is_not_found());
        assert!(matches!(PbError::from_response(403, ""), PbError::Auth(_)));
        assert!(matches!(
            PbError::from_response(400, r#"{"code":400,"message":"Bad filter.","data":{}}"#),
            PbError::Api { status: 400, .. }
        ));

        let unavailable = PbError::from_response(503, "<html>gateway</html>");
        assert!(unavailable.is_unavailable());
        assert_eq!(unavailable.user_message(), "HTTP 503");
    }
}
