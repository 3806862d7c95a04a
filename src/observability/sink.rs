//! Record sinks.
//!
//! A sink receives one finished [`RequestRecord`] per request, synchronously.
//! Sinks never report failure back to the caller; a record that cannot be
//! written is dropped with a warning.

use std::sync::Mutex;

use tracing::Level;

use crate::capture::RequestRecord;

/// Target of the events written by [`TracingSink`].
pub const REQUEST_TARGET: &str = "httpnote::request";

/// Event field holding the serialized record.
pub const RECORD_FIELD: &str = "req";

/// Consumer of captured requests.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: &RequestRecord);
}

/// Emits each record as a tracing event on target `httpnote::request`, with
/// the record's JSON in the `req` field. The JSON log layer writes it as a
/// nested object.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    level: Level,
}

impl TracingSink {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl RecordSink for TracingSink {
    fn emit(&self, record: &RequestRecord) {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, method = %record.method, "Failed to serialize request record");
                return;
            }
        };

        let req = json.as_str();
        match self.level {
            Level::ERROR => tracing::error!(target: REQUEST_TARGET, req),
            Level::WARN => tracing::warn!(target: REQUEST_TARGET, req),
            Level::INFO => tracing::info!(target: REQUEST_TARGET, req),
            Level::DEBUG => tracing::debug!(target: REQUEST_TARGET, req),
            _ => tracing::trace!(target: REQUEST_TARGET, req),
        }
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<RequestRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    pub fn records(&self) -> Vec<RequestRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Remove and return everything emitted so far.
    pub fn take(&self) -> Vec<RequestRecord> {
        self.records
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: &RequestRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(_) => tracing::warn!("Memory sink poisoned, dropping record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::UrlRecord;
    use crate::observability::logging::json_layer;
    use serde_json::{json, Value};
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;
    use tracing_subscriber::layer::SubscriberExt;

    /// Collects everything the fmt layer writes.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn lines(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn record(method: &str) -> RequestRecord {
        RequestRecord {
            method: method.into(),
            url: Some(UrlRecord {
                path: Some("/".into()),
                ..Default::default()
            }),
            proto: "HTTP/1.1".into(),
            proto_major: 1,
            proto_minor: 1,
            header: None,
            body: None,
            content_length: None,
            transfer_encoding: None,
            close: false,
            host: "localhost".into(),
            form: None,
            form_encoded: None,
            post_form: None,
            post_form_encoded: None,
            multipart_form: None,
            trailer: None,
            remote_addr: String::new(),
            request_uri: "/".into(),
        }
    }

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.emit(&record("GET"));
        sink.emit(&record("POST"));

        let methods: Vec<_> = sink.records().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec!["GET", "POST"]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_tracing_sink_emits_without_subscriber() {
        TracingSink::new(Level::INFO).emit(&record("GET"));
    }

    #[test]
    fn test_tracing_sink_writes_record_as_object() {
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::registry().with(json_layer(log.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let sink = TracingSink::new(Level::WARN);
            sink.emit(&record("GET"));
            sink.emit(&record("POST"));
            tracing::info!("unrelated");
        });

        let lines = log.lines();
        assert_eq!(lines.len(), 3);

        let first = &lines[0];
        assert_eq!(first["target"], "httpnote::request");
        assert_eq!(first["level"], "WARN");
        assert!(first["timestamp"].is_string());
        assert_eq!(
            first["req"],
            json!({
                "method": "GET",
                "url": {"path": "/"},
                "proto": "HTTP/1.1",
                "proto_major": 1,
                "proto_minor": 1,
                "host": "localhost",
                "remote_addr": "",
                "request_uri": "/",
            })
        );
        assert_eq!(lines[1]["req"]["method"], "POST");

        assert_eq!(lines[2]["fields"]["message"], "unrelated");
        assert!(lines[2].get("req").is_none());
    }
}
