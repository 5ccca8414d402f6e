//! Structured logging for RouteCodex.
//!
//! Narrowed from the teacher's OpenTelemetry tracing/metrics/logs stack
//! down to plain `log`+`logforth` (see DESIGN.md): RouteCodex's spec has
//! no span-export surface, only the `request_id`/`component` key-value
//! fields every component attaches to its log records (spec §7).

pub mod attributes;

use std::{
    fmt::Write as _,
    fs::OpenOptions,
    io::{IsTerminal, Write as _},
    str::FromStr,
    sync::{Mutex, Once},
};

use config::LoggingConfig;
use jiff::{Zoned, tz::TimeZone};
use logforth::{
    append::{Append, Stderr},
    filter::EnvFilter,
    layout::{JsonLayout, Layout},
};

static INIT: Once = Once::new();

/// Layout that formats timestamps in UTC, matching the rest of
/// RouteCodex's `request_id`-tagged log lines.
#[derive(Debug)]
struct UtcLayout {
    no_color: bool,
}

impl UtcLayout {
    fn new() -> Self {
        Self { no_color: false }
    }

    fn no_color(mut self) -> Self {
        self.no_color = true;
        self
    }
}

impl Layout for UtcLayout {
    fn format(
        &self,
        record: &log::Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let mut output = String::new();

        let now = Zoned::now().with_time_zone(TimeZone::UTC);
        write!(output, "{} ", now.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level_str = if self.no_color {
            format!("{:>5}", record.level())
        } else {
            match record.level() {
                log::Level::Error => format!("\x1b[31m{:>5}\x1b[0m", record.level()),
                log::Level::Warn => format!("\x1b[33m{:>5}\x1b[0m", record.level()),
                log::Level::Info => format!("\x1b[32m{:>5}\x1b[0m", record.level()),
                log::Level::Debug => format!("\x1b[34m{:>5}\x1b[0m", record.level()),
                log::Level::Trace => format!("\x1b[35m{:>5}\x1b[0m", record.level()),
            }
        };

        write!(output, "{level_str}  ")?;
        write!(output, "{}", record.args())?;

        Ok(output.into_bytes())
    }
}

/// Initializes the global logger from configuration. Idempotent: later
/// calls in the same process are no-ops, so test binaries that build a
/// `Config` repeatedly never panic on double-init.
pub fn init(config: &LoggingConfig) {
    let config = config.clone();
    INIT.call_once(move || apply_logger(config));
}

fn apply_logger(config: LoggingConfig) {
    let filter_str = config.level.clone();

    let mut builder = logforth::builder();

    builder = builder.dispatch(move |d| {
        let filter =
            EnvFilter::from_str(&filter_str).unwrap_or_else(|_| EnvFilter::from_str("info").expect("valid filter"));

        let stderr = if config.json {
            Stderr::default().with_layout(JsonLayout::default())
        } else {
            let layout = if std::io::stderr().is_terminal() {
                UtcLayout::new()
            } else {
                UtcLayout::new().no_color()
            };
            Stderr::default().with_layout(layout)
        };

        d.filter(filter).append(stderr)
    });

    if let Some(path) = config.file.clone() {
        match AppendOnlyFile::open(&path) {
            Ok(file_appender) => {
                let filter_str = config.level.clone();
                builder = builder.dispatch(move |d| {
                    let filter = EnvFilter::from_str(&filter_str)
                        .unwrap_or_else(|_| EnvFilter::from_str("info").expect("valid filter"));

                    d.filter(filter).append(file_appender)
                });
            }
            Err(err) => {
                eprintln!("failed to open log file {path}: {err}");
            }
        }
    }

    builder.apply();
}

/// Newline-delimited JSON appender writing to a fixed path (spec §6
/// `logs/*.log`). A plain `std::fs::File` behind a mutex, matching the
/// teacher's habit of hand-rolling small `Append` impls (see its
/// `TuiAppender`) rather than reaching for a heavier file-rotation crate
/// this spec has no use for.
#[derive(Debug)]
struct AppendOnlyFile {
    file: Mutex<std::fs::File>,
    layout: JsonLayout,
}

impl AppendOnlyFile {
    fn open(path: &str) -> std::io::Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            layout: JsonLayout::default(),
        })
    }
}

impl Append for AppendOnlyFile {
    fn append(&self, record: &log::Record<'_>, diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>]) -> anyhow::Result<()> {
        let mut bytes = self.layout.format(record, diagnostics)?;
        bytes.push(b'\n');

        let mut file = self.file.lock().expect("log file mutex poisoned");
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }
}
