//! Service configuration.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use agent_scaler_orchestration::{EcsClient, EcsConfig, InMemoryOrchestrator, OrchestrationClient};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::dispatcher::ScaleMode;
use crate::target::TargetSource;

/// Which orchestration backend the dispatcher talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrchestratorBackend {
    /// Amazon ECS.
    #[default]
    Ecs,
    /// Process-local services, for running without AWS.
    Memory,
}

impl FromStr for OrchestratorBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ecs" => Ok(OrchestratorBackend::Ecs),
            "memory" => Ok(OrchestratorBackend::Memory),
            other => Err(format!(
                "unknown orchestrator '{other}' (expected 'ecs' or 'memory')"
            )),
        }
    }
}

impl OrchestratorBackend {
    /// Build the shared client for this backend.
    ///
    /// The memory backend is seeded with the configured target at a desired
    /// count of zero, when a target is configured.
    pub fn connect(&self) -> Result<Arc<dyn OrchestrationClient>> {
        match self {
            OrchestratorBackend::Ecs => {
                let ecs_config = EcsConfig::from_env()?;
                info!(
                    region = %ecs_config.region,
                    endpoint = %ecs_config.endpoint,
                    "Using ECS orchestrator"
                );
                Ok(Arc::new(EcsClient::new(ecs_config)?))
            }
            OrchestratorBackend::Memory => {
                let mut orchestrator = InMemoryOrchestrator::new();
                match TargetSource::Environment.resolve() {
                    Ok(target) => {
                        info!(
                            cluster = %target.cluster,
                            service = %target.service,
                            "Using in-memory orchestrator"
                        );
                        orchestrator = orchestrator.with_service(&target.cluster, &target.service, 0);
                    }
                    Err(e) => warn!(error = %e, "In-memory orchestrator started without a service"),
                }
                Ok(Arc::new(orchestrator))
            }
        }
    }
}

/// Webhook service configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address (server binary only).
    pub listen_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Scale-up ordering.
    pub scale_mode: ScaleMode,

    /// Orchestration backend.
    pub orchestrator: OrchestratorBackend,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let listen_addr = lookup("AGENT_SCALER_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .context("AGENT_SCALER_LISTEN_ADDR must be a socket address (host:port).")?;

        let log_level = lookup("AGENT_SCALER_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let scale_mode = lookup("AGENT_SCALER_SCALE_MODE")
            .map(|v| v.parse::<ScaleMode>())
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("Invalid AGENT_SCALER_SCALE_MODE.")?
            .unwrap_or_default();

        let orchestrator = lookup("AGENT_SCALER_ORCHESTRATOR")
            .map(|v| v.parse::<OrchestratorBackend>())
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("Invalid AGENT_SCALER_ORCHESTRATOR.")?
            .unwrap_or_default();

        Ok(Self {
            listen_addr,
            log_level,
            scale_mode,
            orchestrator,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.scale_mode, ScaleMode::LastWriteWins);
        assert_eq!(config.orchestrator, OrchestratorBackend::Ecs);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("AGENT_SCALER_LISTEN_ADDR", "0.0.0.0:9000"),
            ("AGENT_SCALER_LOG_LEVEL", "debug"),
            ("AGENT_SCALER_SCALE_MODE", "serialized"),
            ("AGENT_SCALER_ORCHESTRATOR", "memory"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.scale_mode, ScaleMode::Serialized);
        assert_eq!(config.orchestrator, OrchestratorBackend::Memory);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("AGENT_SCALER_LISTEN_ADDR", "nowhere")]).is_err());
        assert!(config_from(&[("AGENT_SCALER_SCALE_MODE", "eventual")]).is_err());
        assert!(config_from(&[("AGENT_SCALER_ORCHESTRATOR", "k8s")]).is_err());
    }
}
