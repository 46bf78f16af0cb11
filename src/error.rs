//! Error types for the SharePoint client.
//!
//! This module defines `SpError`, the unified error type returned by every
//! client operation. Failures are never thrown or logged-and-dropped by the
//! client itself; they always come back to the caller as an `Err`.
//!
//! # Security
//!
//! Cookie and bearer credentials are never part of an error message. Bodies
//! returned by the server are passed through [`SpError::sanitize_message`]
//! before they are stored in an error.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all SharePoint operations.
#[derive(Error, Debug)]
pub enum SpError {
    /// Configuration error - missing or invalid environment variables.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP request failed during transmission.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// HTTP client initialization failed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// HTTP response returned a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code returned.
        status: reqwest::StatusCode,
        /// The response body, truncated and sanitized.
        body: String,
    },

    /// Request timed out.
    #[error("request timed out after {duration:?} - the server may be slow or unreachable")]
    Timeout {
        /// How long we waited before timing out.
        duration: Duration,
        /// The operation that timed out.
        operation: String,
    },

    /// Throttled by the server (HTTP 429).
    #[error("rate limited by server - please wait before retrying")]
    RateLimited {
        /// Suggested delay, if the server sent a `Retry-After` header.
        retry_after: Option<Duration>,
    },

    /// Server temporarily unavailable (HTTP 502/503/504).
    #[error("service temporarily unavailable ({status})")]
    ServiceUnavailable {
        /// The specific status code.
        status: reqwest::StatusCode,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The addressed list, item or endpoint does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// What was being looked up.
        resource: String,
    },

    /// Authentication failed - the cookie or access token was rejected.
    #[error("authentication failed - check SP_COOKIE or SP_ACCESS_TOKEN")]
    Authentication,

    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The context info response did not carry a form digest.
    #[error("No digest provided")]
    NoDigest,

    /// A profile lookup was made without an account name or email.
    #[error("No account name provided")]
    NoAccountName,

    /// A read was made in development mode without a static data source.
    #[error("No static data in dev")]
    NoStaticData,

    /// The item re-fetched before a conditional update had no etag.
    #[error("no etag returned for item {item_url}")]
    MissingEtag {
        /// URL of the item that was re-fetched.
        item_url: String,
    },

    /// The response body did not have the envelope shape the operation needs.
    #[error("unexpected response envelope: {0}")]
    UnexpectedEnvelope(String),

    /// Connection test failed.
    #[error("connection test failed: {message}")]
    ConnectionTest {
        /// Details about why the connection test failed.
        message: String,
    },
}

impl SpError {
    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        SpError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        SpError::Config(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SpError::Validation(message.into())
    }

    /// Creates a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        SpError::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration, operation: impl Into<String>) -> Self {
        SpError::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Creates an error for a body that does not match the expected envelope.
    pub fn unexpected_envelope(message: impl Into<String>) -> Self {
        SpError::UnexpectedEnvelope(message.into())
    }

    /// Creates a connection test error.
    pub fn connection_test(message: impl Into<String>) -> Self {
        SpError::ConnectionTest {
            message: message.into(),
        }
    }

    /// Returns true for failures caused by the server being busy or slow.
    ///
    /// The client never retries on its own; callers and the digest refresher
    /// use this only to pick a log level.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SpError::RateLimited { .. }
            | SpError::ServiceUnavailable { .. }
            | SpError::Timeout { .. } => true,
            SpError::Http(e) => e.is_timeout() || e.is_connect(),
            SpError::HttpStatus { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// Replaces every occurrence of each secret in `message` with `[REDACTED]`.
    ///
    /// Empty secrets are ignored.
    #[must_use]
    pub fn sanitize_message<S: AsRef<str>>(message: &str, secrets: &[S]) -> String {
        secrets
            .iter()
            .map(AsRef::as_ref)
            .filter(|secret| !secret.is_empty())
            .fold(message.to_string(), |acc, secret| {
                acc.replace(secret, "[REDACTED]")
            })
    }

    /// Creates a sanitized version of this error's display message.
    #[must_use]
    pub fn sanitized_display<S: AsRef<str>>(&self, secrets: &[S]) -> String {
        Self::sanitize_message(&self.to_string(), secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_error() {
        let err = SpError::missing_env("SP_SITE_URL");
        assert!(err.to_string().contains("SP_SITE_URL"));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_contract_messages_are_literal() {
        assert_eq!(SpError::NoDigest.to_string(), "No digest provided");
        assert_eq!(SpError::NoAccountName.to_string(), "No account name provided");
        assert_eq!(SpError::NoStaticData.to_string(), "No static data in dev");
    }

    #[test]
    fn test_validation_error() {
        let err = SpError::validation("list_name is required");
        assert_eq!(err.to_string(), "validation error: list_name is required");
    }

    #[test]
    fn test_missing_etag_names_item() {
        let err = SpError::MissingEtag {
            item_url: "https://x/_api/items(4)".to_string(),
        };
        assert!(err.to_string().contains("items(4)"));
    }

    #[test]
    fn test_timeout_error() {
        let err = SpError::timeout(Duration::from_secs(30), "GET /_api/contextinfo");
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("30s"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_is_transient() {
        assert!(SpError::RateLimited { retry_after: None }.is_transient());
        assert!(SpError::ServiceUnavailable {
            status: reqwest::StatusCode::BAD_GATEWAY,
        }
        .is_transient());
        assert!(!SpError::not_found("list").is_transient());
        assert!(!SpError::NoDigest.is_transient());
    }

    #[test]
    fn test_sanitize_message_removes_every_secret() {
        let message = "cookie FedAuth=abc123 token eyJhbGci rejected";
        let sanitized = SpError::sanitize_message(message, &["FedAuth=abc123", "eyJhbGci"]);
        assert!(!sanitized.contains("abc123"));
        assert!(!sanitized.contains("eyJhbGci"));
        assert_eq!(sanitized.matches("[REDACTED]").count(), 2);
    }

    #[test]
    fn test_sanitize_message_ignores_empty_secret() {
        let message = "Some error message";
        let sanitized = SpError::sanitize_message(message, &[""]);
        assert_eq!(sanitized, message);
    }

    #[test]
    fn test_sanitized_display() {
        let err = SpError::HttpStatus {
            status: reqwest::StatusCode::BAD_REQUEST,
            body: "bad token s3cret".to_string(),
        };
        let display = err.sanitized_display(&["s3cret"]);
        assert!(display.contains("[REDACTED]"));
        assert!(display.contains("400"));
    }
}
