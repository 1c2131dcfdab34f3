//! Scaling target resolution.
//!
//! The cluster and service are read on every scale-up, never cached, so a
//! configuration change takes effect on the next invocation.

use std::collections::HashMap;

use crate::error::DispatchError;

pub const CLUSTER_VAR: &str = "ECS_CLUSTER";
pub const SERVICE_VAR: &str = "ECS_SERVICE";

/// The service whose desired count is incremented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingTarget {
    pub cluster: String,
    pub service: String,
}

impl ScalingTarget {
    /// Resolve the target through a variable lookup. Empty values count as
    /// missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DispatchError> {
        let var = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(DispatchError::MissingConfig(key))
        };

        Ok(Self {
            cluster: var(CLUSTER_VAR)?,
            service: var(SERVICE_VAR)?,
        })
    }
}

/// Where the scaling target comes from.
#[derive(Debug, Clone, Default)]
pub enum TargetSource {
    /// Process environment, read at invocation time.
    #[default]
    Environment,

    /// A fixed variable set.
    Vars(HashMap<String, String>),
}

impl TargetSource {
    /// A source that always resolves to `cluster` / `service`.
    pub fn fixed(cluster: &str, service: &str) -> Self {
        TargetSource::Vars(HashMap::from([
            (CLUSTER_VAR.to_string(), cluster.to_string()),
            (SERVICE_VAR.to_string(), service.to_string()),
        ]))
    }

    pub fn resolve(&self) -> Result<ScalingTarget, DispatchError> {
        match self {
            TargetSource::Environment => ScalingTarget::from_lookup(|key| std::env::var(key).ok()),
            TargetSource::Vars(vars) => ScalingTarget::from_lookup(|key| vars.get(key).cloned()),
        }
    }
}
