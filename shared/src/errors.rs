//! Shared error types for the orchestration and resilience layers

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid UUID: {input}")]
    InvalidUuid { input: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Environment file error: {message}")]
    EnvFileError { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;

/// Stable error codes surfaced to callers of resilient calls
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NetworkError,
    Timeout,
    UnknownError,
    InvalidInput,
    /// HTTP status reported by the transport
    Http(u16),
    /// Code reported by the data layer (e.g. a SQLSTATE)
    Data(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR".into(),
            ErrorCode::Timeout => "TIMEOUT".into(),
            ErrorCode::UnknownError => "UNKNOWN_ERROR".into(),
            ErrorCode::InvalidInput => "INVALID_INPUT".into(),
            ErrorCode::Http(status) => format!("HTTP_{status}").into(),
            ErrorCode::Data(code) => code.as_str().into(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

/// Terminal error of every resilient call. Raw failures are always normalized into this.
#[derive(Error, Debug, Clone, Serialize)]
#[error("[{code}] {message}")]
#[serde(rename_all = "camelCase")]
pub struct ServiceError {
    pub message: String,
    pub code: ErrorCode,
    pub context: BTreeMap<String, serde_json::Value>,
    pub is_retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ServiceError {
    pub fn new(message: impl Into<String>, code: ErrorCode, is_retryable: bool) -> Self {
        Self {
            message: message.into(),
            code,
            context: BTreeMap::new(),
            is_retryable,
            status_code: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::NetworkError, true)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::Timeout, true)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::UnknownError, false)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::InvalidInput, false)
    }

    /// HTTP failure; 5xx statuses are retryable
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        let mut error = Self::new(message, ErrorCode::Http(status), (500..600).contains(&status));
        error.status_code = Some(status);
        error
    }

    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// True for 5xx transport statuses
    pub fn is_server_error(&self) -> bool {
        self.status_code.is_some_and(|status| (500..600).contains(&status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::NetworkError.as_str(), "NETWORK_ERROR");
        assert_eq!(ErrorCode::Timeout.as_str(), "TIMEOUT");
        assert_eq!(ErrorCode::Http(503).as_str(), "HTTP_503");
        assert_eq!(ErrorCode::Data("23505".to_string()).as_str(), "23505");
    }

    #[test]
    fn test_http_errors_classify_by_status() {
        let server = ServiceError::http(502, "bad gateway");
        assert!(server.is_retryable);
        assert!(server.is_server_error());
        assert_eq!(server.status_code, Some(502));

        let client = ServiceError::http(404, "not found");
        assert!(!client.is_retryable);
        assert!(!client.is_server_error());
    }

    #[test]
    fn test_service_error_serializes_stable_code() {
        let error = ServiceError::network("fetch failed").with_context("service", "kpis");
        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(json["code"], "NETWORK_ERROR");
        assert_eq!(json["isRetryable"], true);
        assert_eq!(json["context"]["service"], "kpis");
        assert!(json.get("statusCode").is_none());
        assert_eq!(error.to_string(), "[NETWORK_ERROR] fetch failed");
    }
}
