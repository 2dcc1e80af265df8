//! Error normalization
//!
//! Every failure that leaves the resilience layer is a [`ServiceError`]. Raw
//! failures from call sites arrive as [`RawError`] and are classified here.

use thiserror::Error;

use shared::{ErrorCode, ServiceError};

/// Data-layer codes that denote a uniqueness or idempotency conflict.
/// Replaying the same write cannot succeed, so these are never retried.
pub const CONFLICT_CODES: &[&str] = &["23505", "23P01"];

/// Heterogeneous failure produced by a call site's operation
#[derive(Error, Debug)]
pub enum RawError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Data layer error {code}: {message}")]
    DataLayer {
        code: String,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },

    #[error("Type error: {message}")]
    TypeMismatch { message: String },

    #[error("Operation timed out: {message}")]
    Timeout { message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RawError {
    pub fn data_layer(code: impl Into<String>, message: impl Into<String>) -> Self {
        RawError::DataLayer {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        RawError::TypeMismatch { message: message.into() }
    }
}

/// Classify a raw failure into a [`ServiceError`] attributed to `service_id`.
///
/// An existing `ServiceError` passes through unchanged.
pub fn enhance(raw: RawError, service_id: &str) -> ServiceError {
    match raw {
        RawError::Service(error) => error,
        RawError::DataLayer {
            code,
            message,
            details,
            hint,
        } => {
            let retryable = !CONFLICT_CODES.contains(&code.as_str());
            let mut error = ServiceError::new(message, ErrorCode::Data(code.clone()), retryable)
                .with_context("service", service_id)
                .with_context("originalCode", code);
            if let Some(details) = details {
                error = error.with_context("details", details);
            }
            if let Some(hint) = hint {
                error = error.with_context("hint", hint);
            }
            error
        }
        RawError::TypeMismatch { message } => {
            if message.to_lowercase().contains("fetch") {
                ServiceError::network(format!("Network request failed: {message}"))
                    .with_context("service", service_id)
                    .with_context("originalMessage", message)
            } else {
                ServiceError::unknown(message.clone())
                    .with_context("service", service_id)
                    .with_context("originalError", message)
            }
        }
        RawError::Timeout { message } => ServiceError::timeout(message.clone())
            .with_context("service", service_id)
            .with_context("originalMessage", message),
        RawError::Http { status, message } => ServiceError::http(status, message.clone())
            .with_context("service", service_id)
            .with_context("originalMessage", message),
        RawError::Other(error) => match error.downcast::<ServiceError>() {
            Ok(service_error) => service_error,
            Err(error) => ServiceError::unknown(error.to_string())
                .with_context("service", service_id)
                .with_context("originalError", format!("{error:#}")),
        },
    }
}
