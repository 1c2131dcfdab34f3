//! Error types for webhook dispatch.

use agent_scaler_orchestration::OrchestrationError;
use thiserror::Error;

/// Coarse failure class. All classes map to the same 500 response; the
/// class only shows up in logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request body could not be read as an event.
    Input,
    /// The scaling target is not configured.
    Configuration,
    /// The orchestration control plane call failed.
    Upstream,
}

/// Errors raised while processing one webhook invocation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request body is missing")]
    MissingBody,

    #[error("request body could not be decoded: {0}")]
    BodyEncoding(String),

    #[error("invalid event payload: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("invalid event payload: expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error(transparent)]
    Upstream(#[from] OrchestrationError),

    #[error("desired count {0} cannot be incremented")]
    CountOverflow(u32),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::MissingBody
            | DispatchError::BodyEncoding(_)
            | DispatchError::MalformedBody(_)
            | DispatchError::NotAnObject(_) => ErrorKind::Input,
            DispatchError::MissingConfig(_) => ErrorKind::Configuration,
            DispatchError::Upstream(_) | DispatchError::CountOverflow(_) => ErrorKind::Upstream,
        }
    }

    /// Stable reason code for logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            DispatchError::MissingBody => "missing_body",
            DispatchError::BodyEncoding(_) => "body_encoding",
            DispatchError::MalformedBody(_) => "malformed_body",
            DispatchError::NotAnObject(_) => "not_an_object",
            DispatchError::MissingConfig(_) => "missing_config",
            DispatchError::Upstream(err) => err.reason_code(),
            DispatchError::CountOverflow(_) => "count_overflow",
        }
    }
}
