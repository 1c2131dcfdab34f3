//! agent-scaler webhook library.
//!
//! Receives Azure DevOps job lifecycle notifications and raises the desired
//! task count of one ECS service per queued job. The crate ships an HTTP
//! server binary and a Lambda binary; the library surface exists for both
//! of them and for integration testing.

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod state;
pub mod target;
pub mod telemetry;

pub use dispatcher::{DispatchOutcome, Dispatcher, ScaleMode, ScaleUp};
pub use error::{DispatchError, ErrorKind};
pub use event::{WebhookEvent, WebhookRequest, WebhookResponse, JOB_COMPLETED, JOB_QUEUED};
pub use target::{ScalingTarget, TargetSource};
