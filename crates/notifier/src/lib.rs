//! Notification delivery.
//!
//! [`DeliveryPipeline`] turns a work item into an envelope and hands it to a
//! background task that sends it through a [`Transport`] with exponential
//! backoff. The caller only waits for that task to start. Terminal delivery
//! failures are logged and reported to a [`DiagnosticSink`]; they never reach
//! the caller.

pub mod diagnostics;
pub mod http;
pub mod pipeline;
pub mod retry;
pub mod transport;

pub use diagnostics::{DiagnosticSink, TracingSink};
pub use http::HttpTransport;
pub use pipeline::{DeliveryHandle, DeliveryPipeline};
pub use retry::RetryPolicy;
pub use transport::{Outcome, Transport};
