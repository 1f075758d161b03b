use anyhow::Result;
use config::{Config as ConfigLoader, Environment, File};
use rag_monitoring_api::observability::TracingConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub port: u16,
    pub rag_log_level: String,
    pub otel: TracingConfig,
}

impl Config {
    /// Defaults, then optional config files, then `RAG_MONITORING_*`
    /// environment variables (`__` separates nesting, e.g.
    /// `RAG_MONITORING_OTEL__SERVICE_NAME`).
    pub fn load() -> Result<Self> {
        let config = ConfigLoader::builder()
            .set_default("port", 8080)?
            .set_default("rag_log_level", "INFO")?
            .set_default("otel.exporter_otlp_endpoint", "")?
            .set_default("otel.service_name", "rag-monitoring")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("RAG_MONITORING")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
