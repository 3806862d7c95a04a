//! httpnote: records the full structure of every HTTP request it receives.

pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use capture::{map_request, ByteEncoding, RequestRecord};
pub use config::NoteConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
