//! Tracing setup for the restaking services: compact stdout logs filtered through `RUST_LOG`, plus
//! an optional OpenTelemetry exporter.
use std::{env, fmt};

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use thiserror::Error;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variable holding the OTLP collector endpoint.
pub const OTLP_URL_ENVVAR: &str = "RESTAKING_OTLP_URL";

/// Environment variable name for the service label, which is appended to the whoami string.
pub const SVC_LABEL_ENVVAR: &str = "RESTAKING_SVC_LABEL";

/// Set to `1` to print the source file of each event.
pub const LOG_FILE_ENVVAR: &str = "LOG_FILE";

/// Set to `1` to print the source line of each event.
pub const LOG_LINE_NUM_ENVVAR: &str = "LOG_LINE_NUM";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The OTLP exporter could not be built.
    #[error("could not build otlp exporter: {0}")]
    Exporter(String),

    /// A global subscriber was already installed.
    #[error("could not install subscriber: {0}")]
    Install(String),
}

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Identifies the service in logs and in exported traces.
    whoami: String,

    /// The OpenTelemetry URL for exporting traces.
    otel_url: Option<String>,

    /// Whether events carry their source file.
    with_file: bool,

    /// Whether events carry their source line.
    with_line_number: bool,
}

impl LoggerConfig {
    /// Creates a new instance with whoami set and everything else off.
    pub const fn new(whoami: String) -> Self {
        Self {
            whoami,
            otel_url: None,
            with_file: false,
            with_line_number: false,
        }
    }

    /// Creates a config for the service `base`, picking up the label, OTLP endpoint and the
    /// file/line toggles from the environment.
    pub fn from_env(base: &str) -> Self {
        let mut config = Self::new(get_whoami_string(base));
        config.otel_url = get_otlp_url_from_env();
        config.with_file = env_flag(LOG_FILE_ENVVAR);
        config.with_line_number = env_flag(LOG_LINE_NUM_ENVVAR);
        config
    }

    /// Sets the opentelemetry URL to the provided string.
    pub fn set_otlp_url(&mut self, url: String) {
        self.otel_url = Some(url);
    }

    /// The whoami string this config reports.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new("(restaking)".to_owned())
    }
}

/// Keeps the trace exporter alive; pending spans are flushed when this is dropped.
pub struct LoggingGuard {
    provider: Option<SdkTracerProvider>,
}

impl fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("exporting", &self.provider.is_some())
            .finish()
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush trace exporter: {e}");
            }
        }
    }
}

/// Installs the global subscriber described by `config`.
pub fn init(config: LoggerConfig) -> Result<LoggingGuard, LoggingError> {
    let filt = tracing_subscriber::EnvFilter::from_default_env();

    let stdout_sub = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(config.with_file)
                .with_line_number(config.with_line_number),
        )
        .with_filter(filt);

    let guard = if let Some(otel_url) = &config.otel_url {
        let resource = Resource::builder()
            .with_attribute(KeyValue::new("service.name", config.whoami.clone()))
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otel_url)
            .build()
            .map_err(|e| LoggingError::Exporter(e.to_string()))?;

        let provider = SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();

        let otel_sub = tracing_opentelemetry::layer().with_tracer(provider.tracer("restaking"));

        tracing_subscriber::registry()
            .with(stdout_sub)
            .with(otel_sub)
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()))?;

        LoggingGuard {
            provider: Some(provider),
        }
    } else {
        tracing_subscriber::registry()
            .with(stdout_sub)
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()))?;

        LoggingGuard { provider: None }
    };

    info!(whoami = %config.whoami, otlp = config.otel_url.is_some(), "logging started");

    Ok(guard)
}

/// Gets the OTLP URL from the standard envvar.
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Gets the service label from the standard envvar, which should be included in the whoami
/// string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}

fn env_flag(var: &str) -> bool {
    env::var(var).is_ok_and(|v| v == "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_exports_nothing() {
        let config = LoggerConfig::default();
        assert_eq!(config.whoami(), "(restaking)");
        assert!(config.otel_url.is_none());
        assert!(!config.with_file && !config.with_line_number);
    }

    #[test]
    fn otlp_url_can_be_set() {
        let mut config = LoggerConfig::new("devnet".to_owned());
        config.set_otlp_url("http://localhost:4317".to_owned());
        assert_eq!(config.otel_url.as_deref(), Some("http://localhost:4317"));
    }
}
