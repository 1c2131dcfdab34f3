//! # agent-scaler-orchestration
//!
//! Client side of the container orchestration control plane.
//!
//! The webhook dispatcher only ever needs two calls against a managed
//! service: read its current desired task count, and write a new one.
//! Those two calls form the [`OrchestrationClient`] trait.
//!
//! ## Implementations
//!
//! - [`EcsClient`]: Amazon ECS over the AWS JSON 1.1 protocol, SigV4 signed.
//! - [`InMemoryOrchestrator`]: process-local services for tests and local
//!   development, with call recording and failure injection.

mod ecs;
mod error;
mod memory;
pub mod sigv4;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ecs::{EcsClient, EcsConfig};
pub use error::OrchestrationError;
pub use memory::{InMemoryOrchestrator, RecordedCall};
pub use sigv4::Credentials;

/// Scaling state of one service as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    /// Cluster the service runs in.
    pub cluster: String,

    /// Service name.
    pub service: String,

    /// Number of tasks the platform is asked to keep running.
    pub desired_count: u32,

    /// Number of tasks currently running, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_count: Option<u32>,

    /// Number of tasks pending placement, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_count: Option<u32>,

    /// Platform status string (e.g. `ACTIVE`, `DRAINING`), when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Orchestration control plane interface.
///
/// Implementations are shared across concurrent invocations behind an
/// `Arc`, so they must not hold per-request state.
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Read the current scaling state of `service` in `cluster`.
    ///
    /// Fails with [`OrchestrationError::ServiceNotFound`] when the control
    /// plane reports no matching service.
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceState, OrchestrationError>;

    /// Set the desired task count of `service` in `cluster`.
    async fn update_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
    ) -> Result<(), OrchestrationError>;
}
