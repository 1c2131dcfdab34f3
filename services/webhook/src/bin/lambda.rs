//! agent-scaler webhook dispatcher, Lambda host.
//!
//! The invocation event is the API Gateway proxy request; the return value
//! is the proxy response (`statusCode` + JSON `body`).

use std::sync::Arc;

use agent_scaler_webhook::{config, telemetry, Dispatcher, WebhookRequest};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = config::Config::from_env()?;
    telemetry::init(&config.log_level);

    info!(
        orchestrator = ?config.orchestrator,
        scale_mode = %config.scale_mode,
        "Starting agent-scaler webhook lambda"
    );

    // Built once per execution environment, reused across invocations.
    let client = config.orchestrator.connect()?;
    let dispatcher = Arc::new(Dispatcher::new(client).with_scale_mode(config.scale_mode));

    run(service_fn(move |event: LambdaEvent<WebhookRequest>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move {
            info!(request_id = %event.context.request_id, "Processing webhook");
            Ok::<_, Error>(dispatcher.handle(&event.payload).await)
        }
    }))
    .await
}
