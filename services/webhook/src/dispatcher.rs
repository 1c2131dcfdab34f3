//! Webhook dispatcher.
//!
//! Routes a decoded event to one of three outcomes and, for queued jobs,
//! raises the target service's desired count by one.
//!
//! # Concurrency
//!
//! In [`ScaleMode::LastWriteWins`] the scale-up is a plain describe then
//! update. Two invocations that describe the same count both write
//! `count + 1`, and one increment is lost. [`ScaleMode::Serialized`] holds a
//! process-local lock across the pair. It cannot order writers in other
//! processes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use agent_scaler_orchestration::OrchestrationClient;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::DispatchError;
use crate::event::{EventKind, WebhookEvent, WebhookRequest, WebhookResponse};
use crate::target::{ScalingTarget, TargetSource};

/// How concurrent scale-ups inside one process are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScaleMode {
    /// Unsynchronized describe then update.
    #[default]
    LastWriteWins,
    /// Describe and update run under a process-local lock.
    Serialized,
}

impl FromStr for ScaleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "lww" => Ok(ScaleMode::LastWriteWins),
            "serialized" => Ok(ScaleMode::Serialized),
            other => Err(format!(
                "unknown scale mode '{other}' (expected 'last-write-wins' or 'serialized')"
            )),
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleMode::LastWriteWins => write!(f, "last-write-wins"),
            ScaleMode::Serialized => write!(f, "serialized"),
        }
    }
}

/// Result of one scale-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleUp {
    pub target: ScalingTarget,
    pub from: u32,
    pub to: u32,
}

/// Successful dispatch outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    ScaledUp(ScaleUp),
    JobCompleted,
    Acknowledged { event_type: String },
}

impl DispatchOutcome {
    /// Message returned to the webhook sender.
    pub fn message(&self) -> &'static str {
        match self {
            DispatchOutcome::ScaledUp(_) => "Scaling up ECS service",
            DispatchOutcome::JobCompleted => "Job completed acknowledged",
            DispatchOutcome::Acknowledged { .. } => "Event acknowledged",
        }
    }
}

/// Webhook dispatcher.
///
/// Holds the shared orchestration client; carries no per-invocation state.
pub struct Dispatcher {
    client: Arc<dyn OrchestrationClient>,
    target: TargetSource,
    mode: ScaleMode,
    scale_lock: Mutex<()>,
}

impl Dispatcher {
    /// Create a dispatcher reading its target from the environment.
    pub fn new(client: Arc<dyn OrchestrationClient>) -> Self {
        Self {
            client,
            target: TargetSource::default(),
            mode: ScaleMode::default(),
            scale_lock: Mutex::new(()),
        }
    }

    pub fn with_target_source(mut self, target: TargetSource) -> Self {
        self.target = target;
        self
    }

    pub fn with_scale_mode(mut self, mode: ScaleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn target_source(&self) -> &TargetSource {
        &self.target
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.mode
    }

    /// Process one request and produce the caller-facing response.
    ///
    /// Never fails: every error becomes a 500 response carrying its text.
    pub async fn handle(&self, request: &WebhookRequest) -> WebhookResponse {
        Self::respond(self.dispatch(request).await)
    }

    /// Collapse a dispatch result into the response contract.
    pub fn respond(result: Result<DispatchOutcome, DispatchError>) -> WebhookResponse {
        match result {
            Ok(outcome) => WebhookResponse::message(outcome.message()),
            Err(err) => {
                error!(
                    kind = ?err.kind(),
                    reason = err.reason_code(),
                    error = %err,
                    "Error processing webhook"
                );
                WebhookResponse::error(&err.to_string())
            }
        }
    }

    /// Decode the request and route it.
    pub async fn dispatch(
        &self,
        request: &WebhookRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let body = request.decoded_body()?;
        let event = WebhookEvent::from_json(&body)?;

        match EventKind::classify(event.event_type()) {
            EventKind::JobQueued => {
                info!("Job queued event received");
                let scaled = self.scale_up().await?;
                Ok(DispatchOutcome::ScaledUp(scaled))
            }
            EventKind::JobCompleted => {
                // Scale-down is left to a separately scheduled process.
                info!("Job completed event received");
                Ok(DispatchOutcome::JobCompleted)
            }
            EventKind::Other(event_type) => {
                info!(event_type, "Unhandled event type");
                Ok(DispatchOutcome::Acknowledged {
                    event_type: event_type.to_string(),
                })
            }
        }
    }

    /// Raise the target service's desired count by one.
    pub async fn scale_up(&self) -> Result<ScaleUp, DispatchError> {
        let target = self.target.resolve()?;

        let _guard = match self.mode {
            ScaleMode::Serialized => Some(self.scale_lock.lock().await),
            ScaleMode::LastWriteWins => None,
        };

        let current = self
            .client
            .describe_service(&target.cluster, &target.service)
            .await?;

        let from = current.desired_count;
        let to = from
            .checked_add(1)
            .ok_or(DispatchError::CountOverflow(from))?;

        self.client
            .update_desired_count(&target.cluster, &target.service, to)
            .await?;

        info!(
            cluster = %target.cluster,
            service = %target.service,
            from,
            to,
            "Scaled ECS service from {from} to {to} tasks"
        );

        Ok(ScaleUp { target, from, to })
    }
}
