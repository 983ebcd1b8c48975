//! Error types for the DAL query services.

use thiserror::Error;

/// Result type alias using DalError.
pub type DalResult<T> = Result<T, DalError>;

/// Primary error type for DAL query operations.
///
/// Every failure surfaced by the query engine is one of these variants; the
/// message text is what a client eventually sees in the error document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DalError {
    // === Request Errors ===
    #[error("Invalid range list: {0}")]
    Parse(String),

    #[error("Unsupported coordinate frame '{0}'")]
    UnsupportedFrame(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Result Limits ===
    #[error("Output record limit reached ({0} records)")]
    Overflow(usize),

    // === Collaborator Errors ===
    #[error("Catalog query failed: {0}")]
    ExternalQuery(String),

    #[error("Cutout task failed: {0}")]
    ExternalTask(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DalError {
    /// Create a Parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an ExternalQuery error.
    pub fn external_query(msg: impl Into<String>) -> Self {
        Self::ExternalQuery(msg.into())
    }

    /// Create an ExternalTask error.
    pub fn external_task(msg: impl Into<String>) -> Self {
        Self::ExternalTask(msg.into())
    }

    /// Whether the engine handles this error itself instead of failing the request.
    ///
    /// Overflow truncates the response; a task failure only drops the
    /// virtual record it was computing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DalError::Overflow(_) | DalError::ExternalTask(_))
    }

    /// Value of the QUERY_STATUS info for a response ending with this error.
    pub fn query_status(&self) -> &'static str {
        match self {
            DalError::Overflow(_) => "OVERFLOW",
            _ => "ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            DalError::Parse(_)
            | DalError::UnsupportedFrame(_)
            | DalError::MissingParameter(_)
            | DalError::InvalidParameter { .. } => 400,

            DalError::Overflow(_) => 200,

            DalError::ExternalQuery(_) | DalError::ExternalTask(_) | DalError::Internal(_) => 500,
        }
    }
}

impl From<std::io::Error> for DalError {
    fn from(err: std::io::Error) -> Self {
        DalError::ExternalTask(err.to_string())
    }
}

impl From<serde_json::Error> for DalError {
    fn from(err: serde_json::Error) -> Self {
        DalError::Internal(format!("JSON error: {}", err))
    }
}
