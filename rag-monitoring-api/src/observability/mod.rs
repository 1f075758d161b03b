//! Observability pipeline: logging, tracing, and process lifecycle.
//!
//! # Data Flow
//! ```text
//! startup:
//!     ObservabilityContext::initialize
//!         → logging.rs  (setup + application fmt layers, telemetry slot)
//!         → tracing.rs  (OTLP/HTTP exporter, W3C propagator, provider)
//!
//! per request:
//!     CORS → request-received log → tracing span → router
//! ```
//!
//! # Design Decisions
//! - One `ObservabilityContext` owns the tracer provider and lifecycle
//!   stage; globals are installed exactly once through it
//! - Tracing is optional: no exporter endpoint means spans are no-ops
//! - The telemetry layer is hot-swapped into the running subscriber so
//!   logging comes up before tracing

pub mod context;
pub mod logging;
pub mod tracing;

use thiserror::Error;

pub use context::{LifecycleStage, ObservabilityConfig, ObservabilityContext};
pub use logging::{
    init_logging, request_received_middleware, AppLogFormat, LogConfig, SetupLogFormat,
    ACCESS_TARGET, SETUP_TARGET,
};
pub use tracing::{extract_parent_context, init_tracer_provider, tracing_middleware, TracingConfig};

/// Errors raised while bringing the observability pipeline up or down.
///
/// Any of these is fatal at startup: a misconfigured pipeline should block
/// deployment rather than degrade silently.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid log level or filter directive: {0}")]
    InvalidLogFilter(String),

    #[error("failed to build OTLP span exporter: {0}")]
    ExporterInit(String),

    #[error("failed to install telemetry layer: {0}")]
    TelemetryInstall(String),

    #[error("observability already initialized")]
    AlreadyInitialized,

    #[error("failed to flush spans on shutdown: {0}")]
    Shutdown(String),
}

/// Result type for observability operations.
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;
