//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Tee output to stderr and the rotating log file
//! - Configure log level from `RUST_LOG` or config
//! - Write request records as nested JSON objects
//!
//! # Design Decisions
//! - JSON format by default so captured records stay machine readable
//! - ANSI colours only when writing to stderr alone

use std::fmt::{self, Write as _};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::value::RawValue;
use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::observability::rotation::RotatingFile;
use crate::observability::sink::{RECORD_FIELD, REQUEST_TARGET};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let file = match &config.file {
        Some(path) => Some(RotatingFile::open(
            path,
            config.max_size_mb * BYTES_PER_MB,
            config.compress,
        )?),
        None => None,
    };

    let ansi = file.is_none() && config.stderr;
    let writer = match (file, config.stderr) {
        (Some(file), true) => BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file))),
        (Some(file), false) => BoxMakeWriter::new(Mutex::new(file)),
        (None, _) => BoxMakeWriter::new(std::io::stderr),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(json_layer(writer)).try_init()?;
    } else {
        let fmt = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(ansi);
        registry.with(fmt).try_init()?;
    }
    Ok(())
}

/// JSON fmt layer writing to `writer`, with request records nested under `req`.
pub fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .event_format(RecordJson::new(tracing_subscriber::fmt::format().json()))
        .with_writer(writer)
        .with_ansi(false)
}

/// Event format for request records.
///
/// Events on [`REQUEST_TARGET`] carry the record as serialized JSON text; this
/// splices that text in as an object instead of quoting it. Every other event
/// is handed to `inner`.
pub struct RecordJson<F> {
    inner: F,
}

impl<F> RecordJson<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

#[derive(Serialize)]
struct RecordLine<'a> {
    timestamp: String,
    level: &'static str,
    target: &'a str,
    req: &'a RawValue,
}

#[derive(Default)]
struct RecordField {
    json: Option<String>,
}

impl Visit for RecordField {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == RECORD_FIELD {
            self.json = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

impl<S, N, F> FormatEvent<S, N> for RecordJson<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        if meta.target() != REQUEST_TARGET {
            return self.inner.format_event(ctx, writer, event);
        }

        let mut field = RecordField::default();
        event.record(&mut field);
        let Some(req) = field.json.and_then(|json| RawValue::from_string(json).ok()) else {
            return self.inner.format_event(ctx, writer, event);
        };

        let mut timestamp = String::new();
        SystemTime.format_time(&mut Writer::new(&mut timestamp))?;

        let line = RecordLine {
            timestamp,
            level: meta.level().as_str(),
            target: meta.target(),
            req: &req,
        };
        let json = serde_json::to_string(&line).map_err(|_| fmt::Error)?;
        writeln!(writer, "{json}")
    }
}
