//! In-memory orchestrator for testing and local development.
//!
//! Services live in a process-local map keyed by `(cluster, service)`.
//! Every call is recorded so tests can assert exactly what the dispatcher
//! asked of the control plane.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{OrchestrationClient, OrchestrationError, ServiceState};

/// A call observed by the [`InMemoryOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Describe {
        cluster: String,
        service: String,
    },
    Update {
        cluster: String,
        service: String,
        desired_count: u32,
    },
}

/// Process-local orchestrator.
#[derive(Debug, Default)]
pub struct InMemoryOrchestrator {
    services: Mutex<HashMap<(String, String), u32>>,
    calls: Mutex<Vec<RecordedCall>>,
    describe_failure: Option<String>,
    update_failure: Option<String>,

    /// Pause between reading a service and returning it. Lets concurrent
    /// read-modify-write sequences interleave.
    describe_delay: Option<Duration>,
}

impl InMemoryOrchestrator {
    /// Create an orchestrator with no services.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service with an initial desired count.
    pub fn with_service(self, cluster: &str, service: &str, desired_count: u32) -> Self {
        lock(&self.services).insert((cluster.to_string(), service.to_string()), desired_count);
        self
    }

    /// Make every `describe_service` call fail with `message`.
    pub fn failing_describe(mut self, message: impl Into<String>) -> Self {
        self.describe_failure = Some(message.into());
        self
    }

    /// Make every `update_desired_count` call fail with `message`.
    pub fn failing_update(mut self, message: impl Into<String>) -> Self {
        self.update_failure = Some(message.into());
        self
    }

    /// Sleep for `delay` after each read, before returning it.
    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = Some(delay);
        self
    }

    /// Current desired count of a service, if it exists.
    pub fn desired_count(&self, cluster: &str, service: &str) -> Option<u32> {
        lock(&self.services)
            .get(&(cluster.to_string(), service.to_string()))
            .copied()
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Desired counts written by `update_desired_count`, in order.
    pub fn updates(&self) -> Vec<u32> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Update { desired_count, .. } => Some(*desired_count),
                RecordedCall::Describe { .. } => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl OrchestrationClient for InMemoryOrchestrator {
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceState, OrchestrationError> {
        self.record(RecordedCall::Describe {
            cluster: cluster.to_string(),
            service: service.to_string(),
        });

        if let Some(message) = &self.describe_failure {
            return Err(OrchestrationError::Other(message.clone()));
        }

        let desired_count = self.desired_count(cluster, service).ok_or_else(|| {
            OrchestrationError::ServiceNotFound {
                cluster: cluster.to_string(),
                service: service.to_string(),
                reason: Some("MISSING".to_string()),
            }
        })?;

        debug!(cluster, service, desired_count, "[MEMORY] Described service");

        if let Some(delay) = self.describe_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(ServiceState {
            cluster: cluster.to_string(),
            service: service.to_string(),
            desired_count,
            running_count: None,
            pending_count: None,
            status: Some("ACTIVE".to_string()),
        })
    }

    async fn update_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
    ) -> Result<(), OrchestrationError> {
        self.record(RecordedCall::Update {
            cluster: cluster.to_string(),
            service: service.to_string(),
            desired_count,
        });

        if let Some(message) = &self.update_failure {
            return Err(OrchestrationError::Other(message.clone()));
        }

        let mut services = lock(&self.services);
        let Some(current) = services.get_mut(&(cluster.to_string(), service.to_string())) else {
            return Err(OrchestrationError::ServiceNotFound {
                cluster: cluster.to_string(),
                service: service.to_string(),
                reason: Some("MISSING".to_string()),
            });
        };

        info!(cluster, service, from = *current, to = desired_count, "[MEMORY] Updated service");
        *current = desired_count;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
