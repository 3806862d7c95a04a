//! Form and multipart parsing.
//!
//! Parsing is a separate step from capture: it runs first and leaves its
//! results in the request extensions, where the capture mappers pick them
//! up. The request body is replayed so the final handler still sees it.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request};
use bytes::Bytes;
use futures_util::stream;
use thiserror::Error;
use url::form_urlencoded;

use crate::capture::record::ValueMap;
use crate::http::body::buffer_body;

/// Default in-memory budget for uploaded file contents.
pub const DEFAULT_MAX_MEMORY: usize = 32 << 20;

/// Errors raised while parsing a request form.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] multer::Error),

    #[error("failed to spill upload to disk: {0}")]
    Io(#[from] std::io::Error),
}

/// Limits applied while parsing.
#[derive(Debug, Clone, Copy)]
pub struct FormLimits {
    /// Upload bytes kept in memory before further files spill to disk.
    pub max_memory: usize,
}

impl Default for FormLimits {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

/// Decoded urlencoded form data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedForm {
    /// Body values followed by query-string values.
    pub form: ValueMap,
    /// Body values only.
    pub post_form: ValueMap,
}

/// Parsed `multipart/form-data` body. Shared through the request
/// extensions as `Arc<MultipartForm>`; spilled files are removed when the
/// last handle drops.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub value: ValueMap,
    pub file: BTreeMap<String, Vec<FileHeader>>,
}

impl Drop for MultipartForm {
    fn drop(&mut self) {
        for header in self.file.values().flatten() {
            if let FileSource::Disk(path) = &header.source {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::debug!(path = %path.display(), error = %e, "Spilled upload already gone");
                }
            }
        }
    }
}

/// One uploaded file.
#[derive(Debug)]
pub struct FileHeader {
    pub filename: String,
    pub header: ValueMap,
    pub size: u64,
    source: FileSource,
}

#[derive(Debug)]
enum FileSource {
    Memory(Bytes),
    Disk(PathBuf),
}

impl FileHeader {
    /// An upload held in memory.
    pub fn in_memory(filename: impl Into<String>, header: ValueMap, content: Bytes) -> Self {
        Self {
            filename: filename.into(),
            header,
            size: content.len() as u64,
            source: FileSource::Memory(content),
        }
    }

    /// An upload stored at `path`.
    pub fn on_disk(filename: impl Into<String>, header: ValueMap, size: u64, path: PathBuf) -> Self {
        Self {
            filename: filename.into(),
            header,
            size,
            source: FileSource::Disk(path),
        }
    }

    /// Read the whole upload.
    pub async fn read(&self) -> std::io::Result<Bytes> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Disk(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}

/// Convert a header map to sorted multi-value text keyed by canonical name.
pub fn header_values(headers: &HeaderMap) -> ValueMap {
    let mut values = ValueMap::new();
    for (name, value) in headers {
        values
            .entry(canonical_key(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    values
}

/// `content-type` becomes `Content-Type`: each hyphen-separated word is
/// capitalised.
pub fn canonical_key(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Parse query string and body form data into the request extensions.
///
/// Inserts `ParsedForm` always, and `Arc<MultipartForm>` for multipart
/// bodies. Bodies of other content types are left untouched.
pub async fn parse_form(req: &mut Request<Body>, limits: &FormLimits) -> Result<(), FormError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let accepts_body = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH);

    let mut parsed = ParsedForm::default();
    let mut multipart = None;

    if accepts_body && mime == "application/x-www-form-urlencoded" {
        let buffered = buffer_body(req).await?;
        append_pairs(&mut parsed.post_form, &buffered.bytes);
    } else if mime == "multipart/form-data" {
        let boundary = multer::parse_boundary(&content_type)?;
        let buffered = buffer_body(req).await?;
        let form = parse_multipart(buffered.bytes, boundary, limits).await?;
        for (name, values) in &form.value {
            parsed
                .post_form
                .entry(name.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
        multipart = Some(Arc::new(form));
    }

    parsed.form = parsed.post_form.clone();
    if let Some(query) = req.uri().query() {
        append_pairs(&mut parsed.form, query.as_bytes());
    }

    tracing::trace!(
        form_keys = parsed.form.len(),
        multipart = multipart.is_some(),
        "Parsed request form"
    );

    req.extensions_mut().insert(parsed);
    if let Some(multipart) = multipart {
        req.extensions_mut().insert(multipart);
    }
    Ok(())
}

fn append_pairs(values: &mut ValueMap, input: &[u8]) {
    for (key, value) in form_urlencoded::parse(input) {
        values.entry(key.into_owned()).or_default().push(value.into_owned());
    }
}

async fn parse_multipart(
    body: Bytes,
    boundary: String,
    limits: &FormLimits,
) -> Result<MultipartForm, FormError> {
    let mut multipart = multer::Multipart::new(
        stream::once(async move { Ok::<_, Infallible>(body) }),
        boundary,
    );
    let mut form = MultipartForm::default();
    let mut memory_left = limits.max_memory;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        // an empty file input arrives with filename="" and is kept as a value
        let filename = field.file_name().filter(|f| !f.is_empty()).map(str::to_string);
        let header = header_values(field.headers());
        let content = field.bytes().await?;

        let Some(filename) = filename else {
            form.value
                .entry(name)
                .or_default()
                .push(String::from_utf8_lossy(&content).into_owned());
            continue;
        };

        let upload = if content.len() <= memory_left {
            memory_left -= content.len();
            FileHeader::in_memory(filename, header, content)
        } else {
            let path = std::env::temp_dir().join(format!("httpnote-upload-{}", uuid::Uuid::new_v4()));
            tokio::fs::write(&path, &content).await?;
            tracing::debug!(field = %name, path = %path.display(), size = content.len(), "Spilled upload to disk");
            FileHeader::on_disk(filename, header, content.len() as u64, path)
        };
        form.file.entry(name).or_default().push(upload);
    }

    Ok(form)
}
