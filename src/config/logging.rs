use serde::Deserialize;

/// Request and background-task logging.
///
/// `level` is an `EnvFilter` directive such as `info` or
/// `sluice=debug,rama=warn`; `RUST_LOG` replaces it when set. Span export
/// is switched on separately through `OTEL_EXPORTER_OTLP_ENDPOINT`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// One flattened JSON object per event, for log shippers that index the
    /// `cache_status` and `duration_ms` fields of "request handled".
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".into()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}
