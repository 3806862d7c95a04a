//! Snapshot records produced by the capture mappers.
//!
//! Every optional field is an `Option` that is `Some` only when the source
//! value was non-empty, and serialization skips `None`. Downstream log
//! consumers rely on that: an empty field is absent, never `null` or `""`.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Serialize, Serializer};

/// Ordered multi-value mapping used for headers, trailers and form data.
pub type ValueMap = BTreeMap<String, Vec<String>>;

/// Values that have an "empty" state which must not reach the log.
pub trait Sparse {
    fn is_empty_value(&self) -> bool;
}

impl Sparse for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Sparse for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Sparse for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Sparse for u64 {
    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

/// Wrap a value for a sparse field: `None` when the value is empty.
pub fn sparse<T: Sparse>(value: T) -> Option<T> {
    if value.is_empty_value() {
        None
    } else {
        Some(value)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// How captured byte payloads are represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ByteEncoding {
    /// Keep the bytes as they are.
    #[default]
    Raw,
    /// Store standard base64 text instead of the bytes.
    Base64,
}

impl ByteEncoding {
    /// Map the `encode_bytes` configuration flag to an encoding.
    pub fn from_flag(encode_bytes: bool) -> Self {
        if encode_bytes {
            ByteEncoding::Base64
        } else {
            ByteEncoding::Raw
        }
    }
}

/// Raw bytes go out as text so log lines stay readable.
fn bytes_as_text<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

/// Declares a byte payload with exactly one representation and the record
/// keys each representation is written under.
macro_rules! byte_payload {
    ($(#[$meta:meta])* $name:ident, $raw:literal, $base64:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        pub enum $name {
            #[serde(rename = $raw, serialize_with = "bytes_as_text")]
            Raw(Bytes),
            #[serde(rename = $base64)]
            Base64(String),
        }

        impl $name {
            /// Capture `bytes` in the requested encoding. Empty input captures nothing.
            pub fn capture(bytes: Bytes, encoding: ByteEncoding) -> Option<Self> {
                if bytes.is_empty() {
                    return None;
                }
                Some(match encoding {
                    ByteEncoding::Raw => $name::Raw(bytes),
                    ByteEncoding::Base64 => $name::Base64(STANDARD.encode(&bytes)),
                })
            }

            /// The original bytes, whichever representation holds them.
            #[cfg(test)]
            pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
                match self {
                    $name::Raw(bytes) => Ok(bytes.to_vec()),
                    $name::Base64(text) => STANDARD.decode(text),
                }
            }
        }
    };
}

byte_payload!(
    /// Captured request body, written as `body` or `body_base64`.
    BodyContent,
    "body",
    "body_base64"
);

byte_payload!(
    /// Captured upload content, written as `file` or `file_base64`.
    FileContent,
    "file",
    "file_base64"
);

/// Snapshot of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestRecord {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<UrlRecord>,
    pub proto: String,
    pub proto_major: u8,
    pub proto_minor: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<ValueMap>,
    #[serde(flatten)]
    pub body: Option<BodyContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_encoding: Option<Vec<String>>,
    #[serde(skip_serializing_if = "is_false")]
    pub close: bool,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<ValueMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_encoded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_form: Option<ValueMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_form_encoded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multipart_form: Option<MultipartRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailer: Option<ValueMap>,
    pub remote_addr: String,
    pub request_uri: String,
}

/// Parsed request URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opaque: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfoRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub force_query: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_fragment: Option<String>,
}

/// Credentials embedded in a URL.
///
/// `password` is `Some("")` for `user:@host` and `None` for `user@host`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserInfoRecord {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub encoded: String,
}

/// Parsed `multipart/form-data` submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MultipartRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<BTreeMap<String, Vec<FileRecord>>>,
}

/// One uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_header: Option<ValueMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub content: Option<FileContent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bare_record() -> RequestRecord {
        RequestRecord {
            method: "GET".into(),
            url: Some(UrlRecord {
                path: Some("/test".into()),
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
            host: "example.com".into(),
            form: None,
            form_encoded: None,
            post_form: None,
            post_form_encoded: None,
            multipart_form: None,
            trailer: None,
            remote_addr: "192.0.2.1:1234".into(),
            request_uri: "/test".into(),
        }
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let value = serde_json::to_value(bare_record()).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "GET",
                "url": {"path": "/test"},
                "proto": "HTTP/1.1",
                "proto_major": 1,
                "proto_minor": 1,
                "host": "example.com",
                "remote_addr": "192.0.2.1:1234",
                "request_uri": "/test",
            })
        );
    }

    #[test]
    fn test_always_present_fields_survive_when_empty() {
        let mut record = bare_record();
        record.host.clear();
        record.remote_addr.clear();
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(value["host"], json!(""));
        assert_eq!(value["remote_addr"], json!(""));
    }

    #[test]
    fn test_body_keys_follow_representation() {
        let mut record = bare_record();
        record.body = BodyContent::capture(Bytes::from_static(b"hello"), ByteEncoding::Base64);
        record.close = true;
        record.content_length = Some(5);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["body_base64"], json!("aGVsbG8="));
        assert!(value.get("body").is_none());
        assert_eq!(value["close"], json!(true));
        assert_eq!(value["content_length"], json!(5));

        record.body = BodyContent::capture(Bytes::from_static(b"hello"), ByteEncoding::Raw);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["body"], json!("hello"));
        assert!(value.get("body_base64").is_none());
    }

    #[test]
    fn test_empty_payload_is_not_captured() {
        assert_eq!(BodyContent::capture(Bytes::new(), ByteEncoding::Raw), None);
        assert_eq!(FileContent::capture(Bytes::new(), ByteEncoding::Base64), None);
    }

    #[test]
    fn test_payload_decodes_to_original_bytes() {
        let bytes = Bytes::from_static(&[0, 159, 146, 150, 255]);
        for encoding in [ByteEncoding::Raw, ByteEncoding::Base64] {
            let content = FileContent::capture(bytes.clone(), encoding).unwrap();
            assert_eq!(content.decode().unwrap(), bytes.to_vec());
        }
    }

    #[test]
    fn test_file_record_shape() {
        let record = FileRecord {
            filename: Some("a.txt".into()),
            mime_header: None,
            size: Some(3),
            content: FileContent::capture(Bytes::from_static(b"abc"), ByteEncoding::Raw),
        };
        assert_eq!(
            serde_json::to_value(record).unwrap(),
            json!({"filename": "a.txt", "size": 3, "file": "abc"})
        );
    }

    #[test]
    fn test_user_info_keeps_empty_password() {
        let with_empty = UserInfoRecord {
            username: "u".into(),
            password: Some(String::new()),
            encoded: "u:".into(),
        };
        let without = UserInfoRecord {
            username: "u".into(),
            password: None,
            encoded: "u".into(),
        };
        assert_eq!(serde_json::to_value(with_empty).unwrap()["password"], json!(""));
        assert!(serde_json::to_value(without).unwrap().get("password").is_none());
    }

    #[test]
    fn test_sparse_helper() {
        assert_eq!(sparse(String::new()), None);
        assert_eq!(sparse(0u64), None);
        assert_eq!(sparse(vec!["x".to_string()]), Some(vec!["x".to_string()]));
        assert_eq!(sparse(ValueMap::new()), None);
    }

    #[test]
    fn test_encoding_from_flag() {
        assert_eq!(ByteEncoding::from_flag(false), ByteEncoding::Raw);
        assert_eq!(ByteEncoding::from_flag(true), ByteEncoding::Base64);
    }
}
