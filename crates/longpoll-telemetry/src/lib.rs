mod logging;
mod metrics;

pub use logging::{init_telemetry, TelemetryConfig};
pub use metrics::{HistogramSummary, MetricType, MetricValue, MetricsRecorder};
