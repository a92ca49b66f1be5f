//! Typed errors at the crate's boundaries.
//!
//! The workflow in `main` works with `anyhow`; these enums are what the
//! intake form, the analysis API and the auth service hand back so that
//! callers can tell a bad form from an upstream rejection.

use thiserror::Error;

/// A user-correctable problem detected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Patient ID is required")]
    MissingPatientId,

    #[error("At least one symptom is required")]
    MissingSymptoms,

    #[error("Invalid case file: {0}")]
    InvalidCaseFile(String),

    #[error("No completed analysis results to export")]
    NothingToExport,
}

/// Failure talking to the analysis API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request to {endpoint} timed out after {timeout_seconds}s")]
    Timeout {
        endpoint: String,
        timeout_seconds: u64,
    },

    #[error("Cannot connect to analysis API at {0}")]
    Connect(String),

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Analysis API error {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

/// Failure reported by the auth service.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Auth service is not configured (set [auth] url)")]
    NotConfigured,

    #[error("Auth request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Auth service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected auth response: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_user_facing() {
        assert_eq!(
            ValidationError::MissingPatientId.to_string(),
            "Patient ID is required"
        );
        assert_eq!(
            ValidationError::NothingToExport.to_string(),
            "No completed analysis results to export"
        );
    }

    #[test]
    fn test_status_error_keeps_upstream_body() {
        let err = ApiError::Status {
            endpoint: "summary".to_string(),
            status: 500,
            body: r#"{"error":"model unavailable"}"#.to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("model unavailable"));
    }

    #[test]
    fn test_auth_rejection_message() {
        let err = AuthError::Rejected {
            status: 400,
            message: "Invalid login credentials".to_string(),
        };
        assert!(err.to_string().contains("Invalid login credentials"));
    }
}
