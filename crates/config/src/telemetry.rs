//! Structured logging configuration. Narrowed from the teacher's
//! OpenTelemetry tracing/metrics stack down to `log`+`logforth` (see
//! DESIGN.md's telemetry scope-narrowing decision): RouteCodex's spec has
//! no span-export surface, only `logs/*.log` (spec §6).

use serde::Deserialize;

/// Minimum level logged, as accepted by `log::LevelFilter::from_str`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum log level (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Emit newline-delimited JSON records instead of the human layout.
    pub json: bool,
    /// Optional file path logs are additionally written to (spec §6
    /// `logs/*.log`); stdout is always written regardless.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}
