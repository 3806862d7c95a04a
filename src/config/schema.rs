//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for httpnote.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::capture::ByteEncoding;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NoteConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// What gets captured and how.
    pub capture: CaptureConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Store bodies and uploads as base64 text instead of raw bytes.
    pub encode_bytes: bool,

    /// Parse urlencoded and multipart forms before capture.
    pub parse_forms: bool,

    /// Upload bytes held in memory before spilling to disk.
    pub multipart_max_memory: usize,

    /// Level records are logged at (trace, debug, info, warn, error).
    pub level: String,
}

impl CaptureConfig {
    pub fn encoding(&self) -> ByteEncoding {
        ByteEncoding::from_flag(self.encode_bytes)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            encode_bytes: false,
            parse_forms: true,
            multipart_max_memory: 32 * 1024 * 1024,
            level: "debug".to_string(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file path; `None` logs to stderr only.
    pub file: Option<PathBuf>,

    /// Size in megabytes before the log file rotates (0 disables rotation).
    pub max_size_mb: u64,

    /// Gzip rotated files.
    pub compress: bool,

    /// Emit JSON lines.
    pub json: bool,

    /// Also write to stderr.
    pub stderr: bool,

    /// Filter directives used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("./logs/httpnote-access.log")),
            max_size_mb: 20,
            compress: true,
            json: true,
            stderr: true,
            filter: "httpnote=debug,tower_http=info".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 32 * 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
