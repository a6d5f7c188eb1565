//! Runcast notifier binary: sends one lifecycle notification for a run resource.

use std::sync::Arc;

use runcast_common::config::NotifierConfig;
use runcast_notifier::{DeliveryPipeline, HttpTransport, RetryPolicy, TracingSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runcast_notifier=info,runcast_engine=debug".into()),
        )
        .json()
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: runcast-notifier <resource.json>"))?;

    // Load configuration
    let config = NotifierConfig::from_env()?;

    let raw = tokio::fs::read_to_string(&path).await?;
    let resource: serde_json::Value = serde_json::from_str(&raw)?;

    let mut pipeline = DeliveryPipeline::new(RetryPolicy::from_config(&config))
        .with_diagnostic_sink(Arc::new(TracingSink));
    match &config.sink_url {
        Some(url) => {
            tracing::info!(sink = %url, "Using HTTP CloudEvents sink");
            pipeline =
                pipeline.with_transport(Arc::new(HttpTransport::new(url, config.http_timeout())?));
        }
        None => tracing::warn!("CLOUD_EVENTS_SINK not set, no transport configured"),
    }

    let handle = pipeline.send_resource_with_retries(resource).await?;
    tracing::info!(event_id = %handle.envelope_id(), "Cloud event scheduled");

    // Wait for the terminal state; Ctrl+C cancels outstanding retries
    let state = handle.wait_or_cancel_on(tokio::signal::ctrl_c()).await;

    match state {
        Some(state) => tracing::info!(state = %state, "Delivery finished"),
        None => tracing::error!("Delivery task aborted"),
    }
    Ok(())
}
