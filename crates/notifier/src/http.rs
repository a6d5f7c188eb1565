//! CloudEvents HTTP transport (binary content mode).
//!
//! Envelope attributes travel as `ce-*` headers; the body is the JSON object
//! of the envelope data.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use runcast_common::types::Envelope;

use crate::transport::{Outcome, Transport};

/// Extension header carrying the lifecycle status.
pub const HEADER_STATUS: &str = "ce-status";

/// HTTP transport posting to a single sink URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    sink_url: String,
}

impl HttpTransport {
    pub fn new(sink_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            sink_url: sink_url.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, envelope: &Envelope) -> Outcome {
        let result = self
            .client
            .post(&self.sink_url)
            .header("ce-id", envelope.id.to_string())
            .header("ce-specversion", envelope.spec_version)
            .header("ce-type", envelope.kind.as_str())
            .header("ce-source", envelope.source.as_str())
            .header("ce-subject", envelope.subject.as_str())
            .header("ce-time", envelope.time.to_rfc3339())
            .header(HEADER_STATUS, envelope.status.to_string())
            .json(&envelope.data)
            .send()
            .await;

        match result {
            Ok(response) => outcome_for_status(response.status()),
            // A request that cannot even be built will not build next time either
            Err(e) if e.is_builder() => Outcome::fatal(e.to_string()),
            Err(e) => Outcome::retryable(e.to_string()),
        }
    }
}

/// Map a sink response status to an outcome.
///
/// Server errors, timeouts and throttling are worth retrying; other client
/// errors are not.
pub fn outcome_for_status(status: StatusCode) -> Outcome {
    if status.is_success() {
        return Outcome::Acknowledged;
    }
    let reason = format!("sink responded with {}", status);
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        Outcome::retryable(reason)
    } else {
        Outcome::fatal(reason)
    }
}
