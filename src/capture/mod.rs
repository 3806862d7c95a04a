//! Request capture subsystem.
//!
//! # Data Flow
//! ```text
//! live Request<Body>
//!     → request.rs (method, protocol, headers, body, forms, trailers)
//!         → url.rs (request target → UrlRecord)
//!         → multipart.rs (MultipartForm → MultipartRecord, upload contents)
//!     → RequestRecord (record.rs)
//!     → handed to a RecordSink
//! ```
//!
//! # Design Decisions
//! - Mapping never fails: read errors leave fields out
//! - Byte payloads hold exactly one of raw or base64, chosen by ByteEncoding
//! - Empty values are `None` and never serialized

pub mod multipart;
pub mod record;
pub mod request;
pub mod url;

pub use record::{
    BodyContent, ByteEncoding, FileContent, FileRecord, MultipartRecord, RequestRecord, UrlRecord,
    UserInfoRecord, ValueMap,
};
pub use request::{map_request, map_request_opt};
