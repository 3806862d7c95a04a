//! Request mapper.
//!
//! Turns a live request into a [`RequestRecord`]. The request stays usable:
//! its body is drained and replaced by a replay of the same bytes and
//! trailers. Nothing here fails; whatever cannot be read is left out of the
//! record.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, OriginalUri};
use axum::http::{header, HeaderMap, Method, Request, Uri, Version};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::capture::multipart::map_form;
use crate::capture::record::{sparse, BodyContent, ByteEncoding, RequestRecord, ValueMap};
use crate::capture::url::map_url;
use crate::http::body::buffer_body;
use crate::http::form::{canonical_key, header_values, MultipartForm, ParsedForm};
use crate::observability::metrics;

/// Everything but unreserved characters is escaped in form keys and values.
const FORM_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Map a request that may not exist.
pub async fn map_request_opt(
    req: Option<&mut Request<Body>>,
    encoding: ByteEncoding,
) -> Option<RequestRecord> {
    match req {
        Some(req) => Some(map_request(req, encoding).await),
        None => None,
    }
}

/// Snapshot `req`, leaving its body readable for the next consumer.
pub async fn map_request(req: &mut Request<Body>, encoding: ByteEncoding) -> RequestRecord {
    let (proto, proto_major, proto_minor) = protocol(req.version());
    let target = request_target(req.method(), req.uri(), req.version());
    let request_uri = match req.extensions().get::<OriginalUri>() {
        Some(OriginalUri(original)) => request_target(req.method(), original, req.version()),
        None => target.clone(),
    };

    let url = if *req.method() == Method::CONNECT && !target.starts_with('/') {
        // authority-form: the whole target is the host
        map_url(Some(&format!("//{target}")))
    } else {
        map_url(Some(&target))
    };

    let mut header = header_values(req.headers());
    header.remove(&canonical_key(header::HOST.as_str()));
    header.remove(&canonical_key(header::TRANSFER_ENCODING.as_str()));

    let (body, trailers) = match buffer_body(req).await {
        Ok(buffered) => (BodyContent::capture(buffered.bytes, encoding), buffered.trailers),
        Err(e) => {
            tracing::debug!(error = %e, "Request body not captured");
            metrics::record_body_capture_failure();
            (None, None)
        }
    };

    let parsed = req.extensions().get::<ParsedForm>();
    let form = parsed.and_then(|p| sparse(p.form.clone()));
    let post_form = parsed.and_then(|p| sparse(p.post_form.clone()));
    let multipart = req.extensions().get::<Arc<MultipartForm>>().map(Arc::as_ref);
    let multipart_form = map_form(multipart, encoding).await;

    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    RequestRecord {
        method: req.method().to_string(),
        url,
        proto: proto.to_string(),
        proto_major,
        proto_minor,
        header: sparse(header),
        body,
        content_length: content_length(req.headers()),
        transfer_encoding: sparse(transfer_encoding(req.headers())),
        close: wants_close(req.version(), req.headers()),
        host: host(req),
        form_encoded: form.as_ref().map(encode_form),
        form,
        post_form_encoded: post_form.as_ref().map(encode_form),
        post_form,
        multipart_form,
        trailer: trailers.as_ref().map(header_values).and_then(sparse),
        remote_addr,
        request_uri,
    }
}

fn protocol(version: Version) -> (&'static str, u8, u8) {
    match version {
        Version::HTTP_09 => ("HTTP/0.9", 0, 9),
        Version::HTTP_10 => ("HTTP/1.0", 1, 0),
        Version::HTTP_2 => ("HTTP/2.0", 2, 0),
        Version::HTTP_3 => ("HTTP/3.0", 3, 0),
        _ => ("HTTP/1.1", 1, 1),
    }
}

/// The target as a client would have sent it. HTTP/2 and later carry the
/// authority separately, so only path and query count, except for CONNECT
/// whose target is the authority itself.
fn request_target(method: &Method, uri: &Uri, version: Version) -> String {
    if version >= Version::HTTP_2 {
        if *method == Method::CONNECT {
            return uri.authority().map(|a| a.to_string()).unwrap_or_default();
        }
        return uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
    }
    uri.to_string()
}

fn host(req: &Request<Body>) -> String {
    if let Some(authority) = req.uri().authority() {
        return authority.host().to_string()
            + &authority.port().map(|p| format!(":{p}")).unwrap_or_default();
    }
    req.headers()
        .get(header::HOST)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .and_then(sparse)
}

fn transfer_encoding(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn connection_has(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

fn wants_close(version: Version, headers: &HeaderMap) -> bool {
    match version {
        Version::HTTP_09 => true,
        Version::HTTP_10 => !connection_has(headers, "keep-alive"),
        Version::HTTP_11 => connection_has(headers, "close"),
        _ => false,
    }
}

/// Key-sorted urlencoded form of `values`. Spaces become `+`, `~` stays
/// literal and `*` is escaped.
fn encode_form(values: &ValueMap) -> String {
    let mut pairs = Vec::new();
    for (key, list) in values {
        let key = escape_form_component(key);
        for value in list {
            pairs.push(format!("{key}={}", escape_form_component(value)));
        }
    }
    pairs.join("&")
}

fn escape_form_component(text: &str) -> String {
    // a literal "%20" in the input is escaped to "%2520", so this only hits spaces
    utf8_percent_encode(text, FORM_COMPONENT)
        .to_string()
        .replace("%20", "+")
}
