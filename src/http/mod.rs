//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, peer address)
//!     → middleware.rs
//!         → form.rs (parse query/urlencoded/multipart into extensions)
//!         → capture::map_request (body drained via body.rs and replayed)
//!         → RecordSink
//!     → note handler (empty 200)
//! ```

pub mod body;
pub mod form;
pub mod middleware;
pub mod server;

pub use form::{parse_form, FileHeader, FormError, FormLimits, MultipartForm, ParsedForm};
pub use server::HttpServer;
