//! Form/multipart sub-mapper.

use std::collections::BTreeMap;

use crate::capture::record::{sparse, ByteEncoding, FileContent, FileRecord, MultipartRecord};
use crate::http::form::{FileHeader, MultipartForm};

/// Map a parsed multipart form. Upload contents are read here; an upload
/// that cannot be read still yields its metadata.
pub async fn map_form(form: Option<&MultipartForm>, encoding: ByteEncoding) -> Option<MultipartRecord> {
    let form = form?;

    let mut files = BTreeMap::new();
    for (name, headers) in &form.file {
        let mut records = Vec::with_capacity(headers.len());
        for header in headers {
            if let Some(record) = map_file(Some(header), encoding).await {
                records.push(record);
            }
        }
        if !records.is_empty() {
            files.insert(name.clone(), records);
        }
    }

    Some(MultipartRecord {
        value: sparse(form.value.clone()),
        file: sparse(files),
    })
}

/// Map one uploaded file.
pub async fn map_file(header: Option<&FileHeader>, encoding: ByteEncoding) -> Option<FileRecord> {
    let header = header?;

    let content = match header.read().await {
        Ok(bytes) => FileContent::capture(bytes, encoding),
        Err(e) => {
            tracing::debug!(filename = %header.filename, error = %e, "Upload content not captured");
            None
        }
    };

    Some(FileRecord {
        filename: sparse(header.filename.clone()),
        mime_header: sparse(header.header.clone()),
        size: sparse(header.size),
        content,
    })
}
