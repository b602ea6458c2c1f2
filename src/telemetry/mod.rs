pub mod metrics;
pub mod tracing;

pub use metrics::{
    metrics_handler, record_auth_attempt, record_permission_check, record_request_latency,
    AuthOutcome, MetricsState,
};
pub use tracing::init_telemetry;
