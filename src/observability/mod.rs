//! Observability: structured logging and per-instance metrics

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{MetricsCollector, MetricsSnapshot, ProfileMetrics, SessionMetrics};

// Span macros for structured logging
pub use logging::{session_span, task_span, tool_span};
