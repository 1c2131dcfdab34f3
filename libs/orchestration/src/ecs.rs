//! Amazon ECS client.
//!
//! Speaks the AWS JSON 1.1 protocol directly: every operation is a signed
//! `POST /` whose operation name travels in `X-Amz-Target`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::sigv4::{self, Credentials, SigningRequest};
use crate::{OrchestrationClient, OrchestrationError, ServiceState};

const SIGNING_SERVICE: &str = "ecs";
const TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// ECS client configuration (env-driven).
///
/// Credentials are static: `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and
/// the optional `AWS_SESSION_TOKEN`. The rest of the AWS default provider
/// chain (shared profile files, the ECS container-credentials endpoint,
/// EC2 instance metadata) is not consulted. Lambda exports the static
/// variables for its execution role; elsewhere they must be set explicitly.
/// Session credentials are not refreshed, so the process has to be
/// restarted before they expire.
#[derive(Debug, Clone)]
pub struct EcsConfig {
    /// AWS region used for signing and the default endpoint.
    pub region: String,

    /// Endpoint base URL (example: https://ecs.us-east-1.amazonaws.com).
    pub endpoint: String,

    /// Signing credentials.
    pub credentials: Credentials,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl EcsConfig {
    /// Configuration for the public regional endpoint.
    pub fn new(region: impl Into<String>, credentials: Credentials) -> Self {
        let region = region.into();
        Self {
            endpoint: default_endpoint(&region),
            region,
            credentials,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Override the endpoint (LocalStack, VPC endpoints, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let region = var("AWS_REGION")
            .or_else(|| var("AWS_DEFAULT_REGION"))
            .context("Missing AWS region. Set AWS_REGION (or AWS_DEFAULT_REGION).")?;

        let access_key_id = var("AWS_ACCESS_KEY_ID").context("Missing AWS_ACCESS_KEY_ID.")?;
        let secret_access_key =
            var("AWS_SECRET_ACCESS_KEY").context("Missing AWS_SECRET_ACCESS_KEY.")?;
        let session_token = var("AWS_SESSION_TOKEN");

        let endpoint = var("ECS_ENDPOINT_URL").unwrap_or_else(|| default_endpoint(&region));

        let timeout_secs: u64 = var("ECS_REQUEST_TIMEOUT_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("ECS_REQUEST_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(30);

        Ok(Self {
            region,
            endpoint,
            credentials: Credentials {
                access_key_id,
                secret_access_key,
                session_token,
            },
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

fn default_endpoint(region: &str) -> String {
    format!("https://ecs.{region}.amazonaws.com")
}

/// ECS control plane client.
pub struct EcsClient {
    client: reqwest::Client,
    url: Url,
    host: String,
    region: String,
    credentials: Credentials,
}

impl EcsClient {
    /// Create a new ECS client.
    pub fn new(config: EcsConfig) -> Result<Self> {
        let url: Url = config
            .endpoint
            .parse()
            .with_context(|| format!("invalid ECS endpoint URL: {}", config.endpoint))?;

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => anyhow::bail!("ECS endpoint URL has no host: {}", config.endpoint),
        };

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url,
            host,
            region: config.region,
            credentials: config.credentials,
        })
    }

    async fn call<Req, Resp>(
        &self,
        operation: &'static str,
        request: &Req,
    ) -> Result<Resp, OrchestrationError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).map_err(|e| {
            OrchestrationError::Other(format!("failed to encode {operation} request: {e}"))
        })?;

        let now = Utc::now();
        let mut headers = vec![
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("host".to_string(), self.host.clone()),
            ("x-amz-date".to_string(), sigv4::amz_date(now)),
            ("x-amz-target".to_string(), format!("{TARGET_PREFIX}.{operation}")),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let signature = sigv4::sign(
            &SigningRequest {
                method: "POST",
                path: self.url.path(),
                query: "",
                headers: &headers,
                payload: &payload,
            },
            &self.credentials,
            &self.region,
            SIGNING_SERVICE,
            now,
        );

        debug!(operation, endpoint = %self.url, "Calling ECS");

        let mut builder = self.client.post(self.url.clone());
        for (name, value) in headers.iter().filter(|(name, _)| name != "host") {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .header("authorization", signature.authorization)
            .body(payload)
            .send()
            .await
            .map_err(|source| OrchestrationError::Transport { operation, source })?;

        let status = response.status();
        let error_type_header = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|source| OrchestrationError::Transport { operation, source })?;

        if !status.is_success() {
            let err = api_error(operation, status.as_u16(), error_type_header, &body);
            error!(operation, status = %status, error = %err, "ECS call failed");
            return Err(err);
        }

        serde_json::from_slice(&body).map_err(|e| OrchestrationError::InvalidResponse {
            operation,
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl OrchestrationClient for EcsClient {
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceState, OrchestrationError> {
        let request = DescribeServicesRequest {
            cluster,
            services: [service],
        };
        let response: DescribeServicesResponse = self.call("DescribeServices", &request).await?;

        let Some(found) = response.services.into_iter().next() else {
            let reason = response
                .failures
                .into_iter()
                .next()
                .and_then(|f| f.reason.or(f.detail));
            return Err(OrchestrationError::ServiceNotFound {
                cluster: cluster.to_string(),
                service: service.to_string(),
                reason,
            });
        };

        debug!(
            cluster,
            service,
            desired_count = found.desired_count,
            running_count = ?found.running_count,
            "Described ECS service"
        );

        Ok(ServiceState {
            cluster: cluster.to_string(),
            service: found.service_name.unwrap_or_else(|| service.to_string()),
            desired_count: found.desired_count,
            running_count: found.running_count,
            pending_count: found.pending_count,
            status: found.status,
        })
    }

    async fn update_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
    ) -> Result<(), OrchestrationError> {
        let request = UpdateServiceRequest {
            cluster,
            service,
            desired_count,
        };
        let response: UpdateServiceResponse = self.call("UpdateService", &request).await?;

        debug!(
            cluster,
            service,
            desired_count,
            acknowledged = ?response.service.map(|s| s.desired_count),
            "Updated ECS service"
        );

        Ok(())
    }
}

fn api_error(
    operation: &'static str,
    status: u16,
    error_type_header: Option<String>,
    body: &[u8],
) -> OrchestrationError {
    let document: ErrorDocument = serde_json::from_slice(body).unwrap_or_default();

    let code = document
        .error_type
        .or(error_type_header)
        .map(|raw| short_error_code(&raw))
        .unwrap_or_else(|| "UnknownError".to_string());

    let message = document
        .message
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    OrchestrationError::Api {
        operation,
        status,
        code,
        message,
    }
}

/// `com.amazonaws.ecs#ClusterNotFoundException` and
/// `ClusterNotFoundException:http://internal/` both become
/// `ClusterNotFoundException`.
fn short_error_code(raw: &str) -> String {
    let after_hash = raw.rsplit('#').next().unwrap_or(raw);
    after_hash
        .split(':')
        .next()
        .unwrap_or(after_hash)
        .to_string()
}

#[derive(Debug, Serialize)]
struct DescribeServicesRequest<'a> {
    cluster: &'a str,
    services: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct DescribeServicesResponse {
    #[serde(default)]
    services: Vec<EcsService>,
    #[serde(default)]
    failures: Vec<EcsFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsService {
    service_name: Option<String>,
    desired_count: u32,
    running_count: Option<u32>,
    pending_count: Option<u32>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EcsFailure {
    reason: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateServiceRequest<'a> {
    cluster: &'a str,
    service: &'a str,
    desired_count: u32,
}

#[derive(Debug, Deserialize)]
struct UpdateServiceResponse {
    service: Option<EcsService>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDocument {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
        }
    }

    fn client_for(server: &MockServer, credentials: Credentials) -> EcsClient {
        let config = EcsConfig::new("us-east-1", credentials).with_endpoint(server.uri());
        EcsClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_describe_service_returns_desired_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header(
                "x-amz-target",
                "AmazonEC2ContainerServiceV20141113.DescribeServices",
            ))
            .and(header("content-type", CONTENT_TYPE))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .and(body_json(json!({"cluster": "agents", "services": ["ado-agent"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [{
                    "serviceName": "ado-agent",
                    "desiredCount": 3,
                    "runningCount": 2,
                    "pendingCount": 1,
                    "status": "ACTIVE"
                }],
                "failures": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, test_credentials());
        let state = client.describe_service("agents", "ado-agent").await.unwrap();

        assert_eq!(state.cluster, "agents");
        assert_eq!(state.service, "ado-agent");
        assert_eq!(state.desired_count, 3);
        assert_eq!(state.running_count, Some(2));
        assert_eq!(state.pending_count, Some(1));
        assert_eq!(state.status.as_deref(), Some("ACTIVE"));
    }

    #[tokio::test]
    async fn test_describe_service_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [],
                "failures": [{
                    "arn": "arn:aws:ecs:us-east-1:123456789012:service/agents/ado-agent",
                    "reason": "MISSING"
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, test_credentials());
        let err = client.describe_service("agents", "ado-agent").await.unwrap_err();

        match err {
            OrchestrationError::ServiceNotFound {
                cluster,
                service,
                reason,
            } => {
                assert_eq!(cluster, "agents");
                assert_eq!(service, "ado-agent");
                assert_eq!(reason.as_deref(), Some("MISSING"));
            }
            other => panic!("expected ServiceNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_sends_desired_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(
                "x-amz-target",
                "AmazonEC2ContainerServiceV20141113.UpdateService",
            ))
            .and(body_json(json!({
                "cluster": "agents",
                "service": "ado-agent",
                "desiredCount": 4
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "service": {"serviceName": "ado-agent", "desiredCount": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, test_credentials());
        client
            .update_desired_count("agents", "ado-agent", 4)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_error_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "com.amazonaws.ecs#ClusterNotFoundException",
                "message": "Cluster not found."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, test_credentials());
        let err = client.describe_service("missing", "ado-agent").await.unwrap_err();

        match err {
            OrchestrationError::Api {
                operation,
                status,
                code,
                message,
            } => {
                assert_eq!(operation, "DescribeServices");
                assert_eq!(status, 400);
                assert_eq!(code, "ClusterNotFoundException");
                assert_eq!(message, "Cluster not found.");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_error_without_document_uses_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503)
                    .insert_header("x-amzn-ErrorType", "ServiceUnavailable:http://internal/")
                    .set_body_string("try again later"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, test_credentials());
        let err = client
            .update_desired_count("agents", "ado-agent", 2)
            .await
            .unwrap_err();

        match err {
            OrchestrationError::Api { code, message, status, .. } => {
                assert_eq!(status, 503);
                assert_eq!(code, "ServiceUnavailable");
                assert_eq!(message, "try again later");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-security-token", "session-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [{"desiredCount": 0}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Credentials {
            session_token: Some("session-token".to_string()),
            ..test_credentials()
        };
        let client = client_for(&server, credentials);
        let state = client.describe_service("agents", "ado-agent").await.unwrap();

        assert_eq!(state.desired_count, 0);
        assert_eq!(state.service, "ado-agent");
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server, test_credentials());
        let err = client.describe_service("agents", "ado-agent").await.unwrap_err();
        assert_eq!(err.reason_code(), "invalid_response");
    }

    #[rstest]
    #[case("com.amazonaws.ecs#AccessDeniedException", "AccessDeniedException")]
    #[case("ThrottlingException:http://internal.amazon.com/", "ThrottlingException")]
    #[case("InvalidParameterException", "InvalidParameterException")]
    fn test_short_error_code(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(short_error_code(raw), expected);
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AWS_DEFAULT_REGION", "eu-central-1"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("ECS_REQUEST_TIMEOUT_SECS", "5"),
        ]);
        let config = EcsConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.region, "eu-central-1");
        assert_eq!(config.endpoint, "https://ecs.eu-central-1.amazonaws.com");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.credentials.session_token.is_none());
    }

    #[test]
    fn test_config_endpoint_override_and_missing_credentials() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AWS_REGION", "us-west-2"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("ECS_ENDPOINT_URL", "http://localhost:4566"),
        ]);
        let config = EcsConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.endpoint, "http://localhost:4566");

        let missing: HashMap<&str, &str> = HashMap::from([("AWS_REGION", "us-west-2")]);
        let err = EcsConfig::from_lookup(|k| missing.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(err.to_string().contains("AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_client_rejects_invalid_endpoint() {
        let config = EcsConfig::new("us-east-1", test_credentials()).with_endpoint("not a url");
        assert!(EcsClient::new(config).is_err());
    }
}
