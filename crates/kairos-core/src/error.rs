//! Error types for Kairos.
//!
//! This module provides the [`KairosError`] type, the error every service
//! method and pipeline stage speaks. Each variant belongs to an
//! [`ErrorCategory`], and the category decides the HTTP status code.
//!
//! | `ErrorCategory` | Status |
//! |---|---|
//! | `Validation` | 400 |
//! | `Authentication` | 401 |
//! | `AccessDenied` | 403 |
//! | `NotFound` | 404 |
//! | `Conflict` | 409 |
//! | `Internal` | 500 |
//! | `External` | 502 |
//! | `Timeout` | 504 |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias using [`KairosError`].
pub type KairosResult<T> = Result<T, KairosError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Request validation errors (missing parameters, invalid fields).
    Validation,
    /// Authentication errors (invalid/missing credentials).
    Authentication,
    /// The caller is authenticated but not allowed to perform the operation.
    AccessDenied,
    /// Resource not found.
    NotFound,
    /// Conflict (e.g., duplicate resource).
    Conflict,
    /// Internal server errors.
    Internal,
    /// External service errors (downstream failures).
    External,
    /// Request timeout.
    Timeout,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::External => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// Standard error type for Kairos.
///
/// # Example
///
/// ```
/// use kairos_core::{KairosError, ErrorCategory};
///
/// fn check_title(title: &str) -> Result<(), KairosError> {
///     if title.is_empty() {
///         return Err(KairosError::validation("title cannot be empty"));
///     }
///     Ok(())
/// }
///
/// assert_eq!(
///     check_title("").unwrap_err().category(),
///     ErrorCategory::Validation
/// );
/// ```
#[derive(Error, Debug)]
pub enum KairosError {
    /// Request validation failed.
    #[error("{message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Field-specific validation errors.
        #[source]
        field_errors: Option<FieldErrors>,
    },

    /// Authentication failed or is missing.
    #[error("{message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The invoked operation rejected the caller.
    ///
    /// This is the condition service methods raise for role or ownership
    /// checks. It always maps to 403, never to 500.
    #[error("{message}")]
    AccessDenied {
        /// Human-readable error message.
        message: String,
        /// The operation that was denied.
        operation: Option<String>,
    },

    /// Resource not found.
    #[error("{message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
        /// The type of resource that was not found.
        resource_type: Option<String>,
        /// The identifier of the resource.
        resource_id: Option<String>,
    },

    /// Conflict error (e.g., duplicate resource).
    #[error("{message}")]
    Conflict {
        /// Human-readable error message.
        message: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// External service error.
    #[error("{message}")]
    External {
        /// Human-readable error message.
        message: String,
        /// The name of the external service.
        service: Option<String>,
    },

    /// Operation timed out.
    #[error("{message}")]
    Timeout {
        /// Human-readable error message.
        message: String,
    },
}

impl KairosError {
    /// Creates a validation error with a message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    /// Creates a validation error with field-specific errors.
    #[must_use]
    pub fn validation_with_fields(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an access denied error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
            operation: None,
        }
    }

    /// Creates an access denied error naming the rejected operation.
    #[must_use]
    pub fn access_denied_for(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource_type: None,
            resource_id: None,
        }
    }

    /// Creates a not found error with resource context.
    #[must_use]
    pub fn not_found_resource(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        let resource_id = resource_id.into();
        Self::NotFound {
            message: format!("{resource_type} '{resource_id}' not found"),
            resource_type: Some(resource_type),
            resource_id: Some(resource_id),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an external service error.
    #[must_use]
    pub fn external(message: impl Into<String>, service: Option<impl Into<String>>) -> Self {
        Self::External {
            message: message.into(),
            service: service.map(Into::into),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::AccessDenied { .. } => ErrorCategory::AccessDenied,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::External { .. } => ErrorCategory::External,
            Self::Timeout { .. } => ErrorCategory::Timeout,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns `true` if the message of this error may be shown to callers
    /// even when error details are suppressed.
    ///
    /// Internal and external faults may carry implementation details, so
    /// hardened deployments replace their message with a generic one.
    #[must_use]
    pub const fn is_client_safe(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Internal | ErrorCategory::External | ErrorCategory::Timeout
        )
    }

    /// Converts this error to the wire body `{error, details?}`.
    ///
    /// When `expose_details` is `false`, faults that are not client safe are
    /// reduced to their generic status text.
    #[must_use]
    pub fn to_body(&self, expose_details: bool) -> ErrorBody {
        if !expose_details && !self.is_client_safe() {
            return ErrorBody {
                error: self.generic_message().to_string(),
                details: None,
            };
        }

        match self {
            Self::Internal { message, source } => ErrorBody {
                error: "internal server error".to_string(),
                details: Some(serde_json::Value::String(
                    source
                        .as_ref()
                        .map_or_else(|| message.clone(), |s| format!("{message}: {s}")),
                )),
            },
            _ => ErrorBody {
                error: self.to_string(),
                details: self.error_details(),
            },
        }
    }

    /// Returns the generic message used when details are hidden.
    #[must_use]
    pub const fn generic_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => "invalid request",
            ErrorCategory::Authentication => "authentication required",
            ErrorCategory::AccessDenied => "access denied",
            ErrorCategory::NotFound => "not found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Internal => "internal server error",
            ErrorCategory::External => "upstream service error",
            ErrorCategory::Timeout => "timeout",
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation {
                field_errors: Some(errors),
                ..
            } => serde_json::to_value(&errors.fields).ok(),
            Self::NotFound {
                resource_type: Some(rt),
                resource_id: Some(rid),
                ..
            } => Some(serde_json::json!({
                "resource_type": rt,
                "resource_id": rid
            })),
            Self::AccessDenied {
                operation: Some(op),
                ..
            } => Some(serde_json::json!({
                "operation": op
            })),
            Self::External {
                service: Some(svc), ..
            } => Some(serde_json::json!({
                "service": svc
            })),
            _ => None,
        }
    }
}

/// Field-specific validation errors.
///
/// Fields are kept in sorted order so that error bodies are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("field validation errors")]
pub struct FieldErrors {
    /// Map of field path to list of error messages.
    pub fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Creates a new empty `FieldErrors`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` if there are no field errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns every message as `field: message`, in field order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{field}: {m}")))
            .collect()
    }

    /// Converts the collected errors into a result.
    ///
    /// Returns `Ok(())` when empty, so validators can end with
    /// `errors.into_result()`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Serializable error body for HTTP responses.
///
/// Every error produced by the dispatch path has this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short human-readable error message.
    pub error: String,
    /// Additional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Creates a body with only a message.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
