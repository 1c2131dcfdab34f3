//! Inbound webhook payloads and the response record returned to the caller.

use std::borrow::Cow;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// Azure DevOps event emitted when a pipeline job is queued for an agent.
pub const JOB_QUEUED: &str = "ms.vss-distributedtask.job-queued";

/// Azure DevOps event emitted when a pipeline job finishes.
pub const JOB_COMPLETED: &str = "ms.vss-distributedtask.job-completed";

/// Request envelope, in the API Gateway / Lambda proxy shape.
///
/// Other proxy fields (headers, path, request context) are accepted and
/// ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    /// Raw request body, expected to be a JSON document.
    #[serde(default)]
    pub body: Option<String>,

    /// Whether `body` is base64 encoded.
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl WebhookRequest {
    /// A request carrying a plain JSON body.
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            is_base64_encoded: false,
        }
    }

    /// The body as text, base64-decoded if needed.
    pub fn decoded_body(&self) -> Result<Cow<'_, str>, DispatchError> {
        let body = self.body.as_deref().ok_or(DispatchError::MissingBody)?;
        if !self.is_base64_encoded {
            return Ok(Cow::Borrowed(body));
        }

        let bytes = STANDARD
            .decode(body.trim())
            .map_err(|e| DispatchError::BodyEncoding(format!("invalid base64 body: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| DispatchError::BodyEncoding(format!("body is not UTF-8: {e}")))?;
        Ok(Cow::Owned(text))
    }
}

/// The part of a service hook notification the dispatcher reads.
///
/// The body must be a JSON object. Only `eventType` is inspected: a string
/// is used as is, `null` or absence reads as empty, and any other JSON value
/// is kept in its JSON text form so it routes as an unrecognized event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookEvent {
    event_type: String,
}

impl WebhookEvent {
    /// Decode a request body.
    pub fn from_json(body: &str) -> Result<Self, DispatchError> {
        let value: Value = serde_json::from_str(body)?;
        Self::try_from(value)
    }

    /// Event type, empty when absent or null.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

impl TryFrom<Value> for WebhookEvent {
    type Error = DispatchError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => return Err(DispatchError::NotAnObject(json_type(&other))),
        };

        let event_type = match fields.remove("eventType") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(event_type)) => event_type,
            Some(other) => other.to_string(),
        };

        Ok(Self { event_type })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Routing class of an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind<'a> {
    JobQueued,
    JobCompleted,
    Other(&'a str),
}

impl<'a> EventKind<'a> {
    pub fn classify(event_type: &'a str) -> Self {
        match event_type {
            JOB_QUEUED => EventKind::JobQueued,
            JOB_COMPLETED => EventKind::JobCompleted,
            other => EventKind::Other(other),
        }
    }
}

/// Response record, in the Lambda proxy shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub status_code: u16,

    /// JSON document: `{"message": ...}` or `{"error": ...}`.
    pub body: String,
}

impl WebhookResponse {
    /// 200 with `{"message": message}`.
    pub fn message(message: &str) -> Self {
        Self {
            status_code: 200,
            body: serde_json::json!({ "message": message }).to_string(),
        }
    }

    /// 500 with `{"error": error}`.
    pub fn error(error: &str) -> Self {
        Self {
            status_code: 500,
            body: serde_json::json!({ "error": error }).to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
