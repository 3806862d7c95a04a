//! Capture middleware.
//! Records every request to the configured sink, then hands it on unchanged.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::capture::{map_request, ByteEncoding};
use crate::http::form::{parse_form, FormLimits};
use crate::observability::{metrics, RecordSink};

/// State shared by the capture middleware.
#[derive(Clone)]
pub struct CaptureState {
    pub encoding: ByteEncoding,
    pub parse_forms: bool,
    pub form_limits: FormLimits,
    pub sink: Arc<dyn RecordSink>,
}

pub async fn capture_middleware(
    State(state): State<CaptureState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if state.parse_forms {
        if let Err(e) = parse_form(&mut req, &state.form_limits).await {
            tracing::warn!(error = %e, uri = %req.uri(), "Form parsing failed, capturing without form data");
            metrics::record_form_parse_failure();
        }
    }

    let record = map_request(&mut req, state.encoding).await;
    state.sink.emit(&record);
    metrics::record_capture(&record.method);

    next.run(req).await
}
