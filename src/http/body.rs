//! Buffer-and-replay of request bodies.
//!
//! A request body is a one-shot stream. Anything that needs to look at the
//! bytes before the final handler (form parsing, capture) drains it here and
//! gets a replay body put back in its place, with the same data and trailers.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};

/// A fully drained body.
#[derive(Debug, Clone, Default)]
pub struct BufferedBody {
    pub bytes: Bytes,
    pub trailers: Option<HeaderMap>,
}

/// Drain the request body and put a replay of it back into the request.
///
/// The original stream is owned by this call and dropped on every path. When
/// reading fails, the request is left with an empty body.
pub async fn buffer_body(req: &mut Request<Body>) -> Result<BufferedBody, axum::Error> {
    let body = std::mem::take(req.body_mut());
    let collected = body.collect().await?;

    let trailers = collected.trailers().cloned();
    let bytes = collected.to_bytes();
    *req.body_mut() = replay(bytes.clone(), trailers.clone());

    Ok(BufferedBody { bytes, trailers })
}

/// A body yielding `bytes` and then `trailers`.
pub fn replay(bytes: Bytes, trailers: Option<HeaderMap>) -> Body {
    match trailers {
        None => Body::from(bytes),
        Some(trailers) => Body::new(
            Full::new(bytes).with_trailers(async move { Some(Ok::<_, Infallible>(trailers)) }),
        ),
    }
}
