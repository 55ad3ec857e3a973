//! Error types and handling
//!
//! Two layers of errors exist:
//! - [`ParamError`] is raised while a declaration is being validated. It names
//!   the offending parameter and value, and its `Display` is the exact
//!   diagnostic shown to the user.
//! - [`AppError`] covers everything that can go wrong afterwards (manifest
//!   loading, openssl invocation, filesystem access).
//!
//! Both convert into a serializable [`ErrorResponse`] for JSON reports.

use serde::Serialize;
use thiserror::Error;

/// Parameter validation failure for a single `x509_cert` declaration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamError {
    /// A path-valued parameter was not absolute
    #[error("Path must be absolute: {value}")]
    NotAbsolute { param: &'static str, value: String },

    /// Wrong shape, or a value outside an enumerated domain
    #[error("Invalid value {value}")]
    InvalidValue { param: &'static str, value: String },

    /// `mode` did not use leading-zero octal notation
    #[error("{value} is not a valid file mode")]
    InvalidMode { value: String },

    /// `owner` is not a valid account name
    #[error("{value} is not a valid user name")]
    InvalidUser { value: String },

    /// `group` is not a valid group name
    #[error("{value} is not a valid group name")]
    InvalidGroup { value: String },

    /// Key not recognised by the resource type
    #[error("Unknown parameter {name}")]
    UnknownParameter { name: String },

    /// Required parameter absent
    #[error("Missing required parameter {param}")]
    MissingParameter { param: &'static str },

    /// A parameter that only makes sense together with another one
    #[error("Parameter {param} requires {requires} to be set")]
    MissingDependency {
        param: &'static str,
        requires: &'static str,
    },
}

impl ParamError {
    /// Name of the parameter this error refers to
    pub fn param(&self) -> &str {
        match self {
            ParamError::NotAbsolute { param, .. }
            | ParamError::InvalidValue { param, .. }
            | ParamError::MissingParameter { param }
            | ParamError::MissingDependency { param, .. } => param,
            ParamError::InvalidMode { .. } => "mode",
            ParamError::InvalidUser { .. } => "owner",
            ParamError::InvalidGroup { .. } => "group",
            ParamError::UnknownParameter { name } => name,
        }
    }

    /// Offending value, rendered the way it appears in the diagnostic
    pub fn value(&self) -> Option<&str> {
        match self {
            ParamError::NotAbsolute { value, .. }
            | ParamError::InvalidValue { value, .. }
            | ParamError::InvalidMode { value }
            | ParamError::InvalidUser { value }
            | ParamError::InvalidGroup { value } => Some(value),
            _ => None,
        }
    }

    /// Shape errors (wrong type or format) as opposed to policy errors
    pub fn is_shape_error(&self) -> bool {
        matches!(self, ParamError::InvalidValue { .. })
    }
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Declaration rejected by the parameter validator
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Manifest could not be read or parsed
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// A file the certificate depends on does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// External command exited unsuccessfully
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// External command did not finish in time
    #[error("Command timed out: {0}")]
    Timeout(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable identifier used in JSON reports
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Param(_) => "validation_error",
            AppError::Manifest(_) => "manifest_error",
            AppError::NotFound(_) => "not_found",
            AppError::CommandFailed(_) => "command_failed",
            AppError::Timeout(_) => "timeout",
            AppError::Io(_) => "io_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Whether the error was raised before any side effect took place
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Param(_))
    }
}

/// Error response body
#[derive(Serialize, Debug, Clone)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error response
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let response = ErrorResponse::new(err.error_type(), err.to_string());

        match err {
            AppError::Param(param_err) => response.with_details(serde_json::json!({
                "param": param_err.param(),
                "value": param_err.value(),
            })),
            _ => response,
        }
    }
}

impl From<serde_norway::Error> for AppError {
    fn from(err: serde_norway::Error) -> Self {
        AppError::Manifest(format!("YAML parsing error: {}", err))
    }
}

/// Result type alias for library operations
pub type AppResult<T> = Result<T, AppError>;
