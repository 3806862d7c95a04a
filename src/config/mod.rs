//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, or defaults)
//!     → loader.rs (PORT / ENCODE_BYTES / LOG_FILENAME overrides)
//!     → validation.rs (semantic checks)
//!     → NoteConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError, Overrides};
pub use schema::{
    CaptureConfig, LimitsConfig, ListenerConfig, LoggingConfig, NoteConfig, ObservabilityConfig,
    TimeoutConfig,
};
