//! Log formatting and the request-received access log.
//!
//! Two line formats share stdout: setup/teardown milestones in a
//! process-manager style (`INFO:     message`), and application logs that
//! stay line-compatible with the companion Java backend
//! (`HH:MM:SS.mmm LEVEL target [trace_id=.. span_id=..] message`).
//! Each format is carried by its own `fmt` layer, split on the event
//! target, so a milestone line is never re-emitted in the application
//! format.

use std::fmt;

use axum::{extract::Request, middleware::Next, response::Response};
use chrono::Utc;
use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};
use opentelemetry_sdk::trace::Tracer;
use serde::{Deserialize, Serialize};
use tracing::{info, Event, Subscriber};
use tracing_opentelemetry::{OpenTelemetryLayer, OtelData};
use tracing_subscriber::{
    filter::{filter_fn, LevelFilter},
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use super::{ObservabilityError, ObservabilityResult};

/// Event target for setup/teardown milestone lines.
pub const SETUP_TARGET: &str = "rag_monitoring::setup";

/// Event target for the request-received access log.
pub const ACCESS_TARGET: &str = "rag_monitoring::access";

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Verbosity for both line formats. Accepts a bare level (`INFO`) or
    /// `EnvFilter` directives (`info,tower_http=debug`).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
        }
    }
}

/// Formatter for process lifecycle milestones: `LEVEL:` padded to a fixed
/// column, then the message.
#[derive(Debug, Clone, Default)]
pub struct SetupLogFormat;

impl<S, N> FormatEvent<S, N> for SetupLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let prefix = format!("{}:", event.metadata().level());
        write!(writer, "{prefix:<9} ")?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Formatter for application logs, line-compatible with the Java backend:
/// UTC `HH:MM:SS.mmm`, level right-aligned to 5, target right-aligned to
/// 30, the trace/span id segment, then the message.
///
/// The id segment is always present; without an active span both ids
/// render as all-zero hex.
#[derive(Debug, Clone, Default)]
pub struct AppLogFormat;

impl<S, N> FormatEvent<S, N> for AppLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let (trace_id, span_id) = current_otel_ids(ctx);

        write!(
            writer,
            "{} {:>5} {:>30} [trace_id={} span_id={}] ",
            Utc::now().format("%H:%M:%S%.3f"),
            metadata.level().to_string(),
            metadata.target(),
            trace_id,
            span_id,
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Read the OpenTelemetry ids of the span the event was emitted in.
///
/// Falls back to the invalid (all-zero) ids when no span is active or the
/// telemetry layer is not installed.
fn current_otel_ids<S, N>(ctx: &FmtContext<'_, S, N>) -> (TraceId, SpanId)
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    ctx.lookup_current()
        .and_then(|span| {
            let extensions = span.extensions();
            extensions.get::<OtelData>().map(|otel| {
                let trace_id = otel
                    .builder
                    .trace_id
                    .unwrap_or_else(|| otel.parent_cx.span().span_context().trace_id());
                let span_id = otel.builder.span_id.unwrap_or(SpanId::INVALID);
                (trace_id, span_id)
            })
        })
        .unwrap_or((TraceId::INVALID, SpanId::INVALID))
}

/// Handle for swapping the telemetry layer into the running subscriber
/// once the tracer provider exists.
pub type TelemetryReloadHandle =
    reload::Handle<Option<OpenTelemetryLayer<Registry, Tracer>>, Registry>;

/// Install the process-wide subscriber: an empty telemetry slot, the setup
/// fmt layer, and the application fmt layer, each bound to stdout.
///
/// Idempotent: if a subscriber is already installed this attaches nothing
/// and returns `Ok(None)`, so stdout never gains a second handler.
pub fn init_logging(config: &LogConfig) -> ObservabilityResult<Option<TelemetryReloadHandle>> {
    let setup_level = config
        .level
        .parse::<LevelFilter>()
        .map_err(|e| ObservabilityError::InvalidLogFilter(e.to_string()))?;
    let app_filter = EnvFilter::try_new(&config.level)
        .map_err(|e| ObservabilityError::InvalidLogFilter(e.to_string()))?;

    let (telemetry_layer, telemetry_handle) =
        reload::Layer::new(None::<OpenTelemetryLayer<Registry, Tracer>>);

    let setup_layer = tracing_subscriber::fmt::layer()
        .event_format(SetupLogFormat)
        .with_writer(std::io::stdout)
        .with_filter(filter_fn(|metadata| metadata.target() == SETUP_TARGET))
        .with_filter(setup_level);

    let app_layer = tracing_subscriber::fmt::layer()
        .event_format(AppLogFormat)
        .with_writer(std::io::stdout)
        .with_filter(filter_fn(|metadata| metadata.target() != SETUP_TARGET))
        .with_filter(app_filter);

    match tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(setup_layer)
        .with(app_layer)
        .try_init()
    {
        Ok(()) => Ok(Some(telemetry_handle)),
        Err(_) => Ok(None),
    }
}

/// Log the incoming request method and path, then delegate unchanged.
///
/// Must sit outside the tracing middleware: the received-request line is
/// emitted before any span exists for the request, while every downstream
/// log line carries the ids of the span opened afterwards.
pub async fn request_received_middleware(request: Request, next: Next) -> Response {
    info!(
        target: ACCESS_TARGET,
        "received request \"{} {}\"",
        request.method(),
        request.uri().path(),
    );
    next.run(request).await
}
