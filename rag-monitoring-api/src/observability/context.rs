//! Process lifecycle: single-shot observability initialization and the
//! flush-on-shutdown hook.
//!
//! `ObservabilityContext` is the unit of ownership for everything the
//! pipeline installs process-wide: it runs "logging, then tracing" exactly
//! once before the listener accepts connections, holds the tracer provider
//! so buffered spans can be flushed when serving ends, and tracks where in
//! that lifecycle the process currently is.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::logging::{init_logging, LogConfig, SETUP_TARGET};
use super::tracing::{init_tracer_provider, TracingConfig};
use super::{ObservabilityError, ObservabilityResult};

/// Configuration for the whole observability pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log: LogConfig,
    pub tracing: TracingConfig,
}

/// Where the process is in its startup sequence.
///
/// Transitions only move forward: `NotStarted → LoggingInitialized →
/// TracingInitialized → Serving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    NotStarted,
    LoggingInitialized,
    TracingInitialized,
    Serving,
}

/// Owns the observability pipeline for the lifetime of the process.
///
/// Constructed once in `main`, initialized before the first request is
/// accepted, and asked to flush spans after the server drains.
pub struct ObservabilityContext {
    config: ObservabilityConfig,
    stage: LifecycleStage,
    provider: Option<TracerProvider>,
}

impl ObservabilityContext {
    pub fn new(config: ObservabilityConfig) -> Self {
        Self {
            config,
            stage: LifecycleStage::NotStarted,
            provider: None,
        }
    }

    /// Bring logging and tracing up, in that order.
    ///
    /// Logging must be live first so the tracing initializer's milestone
    /// and skip notices are formatted. When tracing is enabled, the
    /// telemetry layer is swapped into the already-running subscriber
    /// through the reload slot `init_logging` reserved for it.
    ///
    /// At most once per context: a second call returns
    /// [`ObservabilityError::AlreadyInitialized`].
    pub fn initialize(&mut self) -> ObservabilityResult<()> {
        if self.stage != LifecycleStage::NotStarted {
            return Err(ObservabilityError::AlreadyInitialized);
        }

        let telemetry_slot = init_logging(&self.config.log)?;
        info!(target: SETUP_TARGET, "Logging initialized.");
        self.stage = LifecycleStage::LoggingInitialized;

        if let Some(provider) = init_tracer_provider(&self.config.tracing)? {
            if let Some(slot) = telemetry_slot {
                let layer = tracing_opentelemetry::layer()
                    .with_tracer(provider.tracer("rag_monitoring"));
                slot.reload(Some(layer))
                    .map_err(|e| ObservabilityError::TelemetryInstall(e.to_string()))?;
            }
            self.provider = Some(provider);
            info!(target: SETUP_TARGET, "Tracing initialized.");
        }
        self.stage = LifecycleStage::TracingInitialized;

        Ok(())
    }

    /// Record that the listener has started accepting connections.
    pub fn mark_serving(&mut self) {
        self.stage = LifecycleStage::Serving;
    }

    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Whether a tracer provider was installed (an endpoint was configured).
    pub fn tracing_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Flush buffered spans and shut the exporter down.
    ///
    /// Called after the server drains; without it, spans batched but not
    /// yet exported would be lost on exit. A no-op when tracing was never
    /// enabled.
    pub fn shutdown(&mut self) -> ObservabilityResult<()> {
        if let Some(provider) = self.provider.take() {
            provider
                .shutdown()
                .map_err(|e| ObservabilityError::Shutdown(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order_and_reinitialization_is_rejected() {
        let mut context = ObservabilityContext::new(ObservabilityConfig::default());
        assert_eq!(context.stage(), LifecycleStage::NotStarted);

        context.initialize().expect("first initialization");
        assert_eq!(context.stage(), LifecycleStage::TracingInitialized);
        assert!(!context.tracing_enabled());

        let err = context.initialize().expect_err("second initialization");
        assert!(matches!(err, ObservabilityError::AlreadyInitialized));

        context.mark_serving();
        assert_eq!(context.stage(), LifecycleStage::Serving);
    }

    #[test]
    fn shutdown_without_a_provider_is_a_noop() {
        let mut context = ObservabilityContext::new(ObservabilityConfig::default());
        context.shutdown().expect("nothing to flush");
    }
}
