//! Error types for orchestration calls.

use thiserror::Error;

/// Errors returned by an [`OrchestrationClient`](crate::OrchestrationClient).
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The control plane returned no service matching the request.
    #[error("service {service} not found in cluster {cluster}{}", reason_suffix(.reason))]
    ServiceNotFound {
        cluster: String,
        service: String,
        reason: Option<String>,
    },

    /// The control plane rejected the call.
    #[error("{operation} failed with status {status}: {code}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        code: String,
        message: String,
    },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded.
    #[error("{operation} returned an invalid response: {detail}")]
    InvalidResponse {
        operation: &'static str,
        detail: String,
    },

    /// Signing credentials are missing or unusable.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Injected or otherwise unclassified failure.
    #[error("{0}")]
    Other(String),
}

impl OrchestrationError {
    /// Stable reason code for logs and metrics.
    pub fn reason_code(&self) -> &'static str {
        match self {
            OrchestrationError::ServiceNotFound { .. } => "service_not_found",
            OrchestrationError::Api { .. } => "api_error",
            OrchestrationError::Transport { .. } => "transport_error",
            OrchestrationError::InvalidResponse { .. } => "invalid_response",
            OrchestrationError::Credentials(_) => "credentials_error",
            OrchestrationError::Other(_) => "orchestration_error",
        }
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(" ({reason})"),
        None => String::new(),
    }
}
