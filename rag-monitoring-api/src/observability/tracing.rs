//! OpenTelemetry tracing: provider initialization and per-request spans.
//!
//! Tracing is opt-in through the OTLP endpoint setting. Without it, the
//! middleware still runs but its spans are no-ops; with it, finished spans
//! are batched in the background and shipped over OTLP/HTTP, and W3C
//! `traceparent` headers connect spans across service boundaries.

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::{
    global, propagation::TextMapPropagator, trace::TraceContextExt, Context as OtelContext,
    KeyValue,
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{RandomIdGenerator, TracerProvider},
    Resource,
};
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::logging::SETUP_TARGET;
use super::{ObservabilityError, ObservabilityResult};

/// Tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Resource attribute `service.name` carried by every exported span.
    pub service_name: String,

    /// OTLP/HTTP collector endpoint. Empty means tracing stays disabled.
    pub exporter_otlp_endpoint: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "rag-monitoring".to_string(),
            exporter_otlp_endpoint: String::new(),
        }
    }
}

/// Build and install the process-wide tracer provider and W3C propagator.
///
/// Returns `Ok(None)` when no endpoint is configured; that is a supported
/// mode, not an error. Exporter construction failures propagate and abort
/// startup. At-most-once invocation is the caller's contract; calling
/// this twice would register a second provider.
pub fn init_tracer_provider(
    config: &TracingConfig,
) -> ObservabilityResult<Option<TracerProvider>> {
    if config.exporter_otlp_endpoint.is_empty() {
        info!(
            target: SETUP_TARGET,
            "No OTLP export endpoint set. Skipping tracing initialization."
        );
        return Ok(None);
    }

    info!(target: SETUP_TARGET, "Initializing tracing.");

    let resource = Resource::new(vec![KeyValue::new(SERVICE_NAME, config.service_name.clone())]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(&config.exporter_otlp_endpoint)
        .build()
        .map_err(|e| ObservabilityError::ExporterInit(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build();

    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());

    Ok(Some(provider))
}

/// Extract a remote parent context from W3C trace-context headers.
pub fn extract_parent_context(headers: &HeaderMap) -> Option<OtelContext> {
    let propagator = TraceContextPropagator::new();
    let context = propagator.extract(&HeaderMapExtractor { headers });
    let is_valid = context.span().span_context().is_valid();
    is_valid.then_some(context)
}

struct HeaderMapExtractor<'a> {
    headers: &'a HeaderMap,
}

impl opentelemetry::propagation::Extractor for HeaderMapExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|key| key.as_str()).collect()
    }
}

/// Open one server span per request and run the rest of the pipeline
/// inside it.
pub async fn tracing_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let span = tracing::info_span!(
        "http_request",
        otel.kind = "server",
        http.request.method = %method,
        http.route = %route,
        http.response.status_code = tracing::field::Empty,
    );
    if let Some(parent) = extract_parent_context(request.headers()) {
        span.set_parent(parent);
    }

    async move {
        let response = next.run(request).await;

        let status = response.status();
        Span::current().record("http.response.status_code", status.as_u16());
        if status.is_server_error() {
            tracing::error!("request failed with server error: {status}");
        } else if status.is_client_error() {
            tracing::warn!("request failed with client error: {status}");
        }

        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[test]
    fn skips_initialization_without_endpoint() {
        let config = TracingConfig::default();
        let provider = init_tracer_provider(&config).expect("disabled mode is not an error");
        assert!(provider.is_none());
    }

    #[tokio::test]
    async fn installs_provider_when_endpoint_configured() {
        let config = TracingConfig {
            service_name: "rag-monitoring-test".to_string(),
            exporter_otlp_endpoint: "http://127.0.0.1:4318".to_string(),
        };
        let provider = init_tracer_provider(&config).expect("exporter should build");
        assert!(provider.is_some());
    }

    #[test]
    fn extracts_valid_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            HeaderValue::from_static("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"),
        );
        assert!(extract_parent_context(&headers).is_some());
    }

    #[test]
    fn rejects_malformed_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert("traceparent", HeaderValue::from_static("not-a-context"));
        assert!(extract_parent_context(&headers).is_none());
    }

    #[tokio::test]
    async fn tracing_middleware_passes_response_through() {
        let app = Router::new()
            .route("/probe", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn(tracing_middleware));

        let response = app
            .oneshot(Request::builder().uri("/probe").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
