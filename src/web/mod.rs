//! HTTP adapter
//!
//! Exposes the distributor behind an axum router. Supported alert paths are
//! captured into request envelopes and handed to the distributor; everything
//! else is answered here.

use crate::client::{FORWARDED_FOR_HEADER, ORG_ID_HEADER, TRACEPARENT_HEADER};
use crate::core::{DistributorError, HttpRequest, HttpResponse, headers_from_map};
use crate::distributor::{Distributor, RequestContext};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Level, event};

/// Largest request body accepted for distribution.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn build_router(distributor: Arc<Distributor>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/ready", get(ready))
        .fallback(distribute)
        .layer(TraceLayer::new_for_http())
        .with_state(distributor)
}

/// Builds the distribution context from inbound headers.
pub fn request_context(headers: &HeaderMap) -> RequestContext {
    let mut ctx = RequestContext::new();
    if let Some(tenant_id) = header_str(headers, ORG_ID_HEADER) {
        ctx = ctx.with_tenant(tenant_id);
    }
    if let Some(trace_parent) = header_str(headers, TRACEPARENT_HEADER) {
        ctx = ctx.with_trace_parent(trace_parent);
    }
    if let Some(source_ips) = header_str(headers, FORWARDED_FOR_HEADER) {
        ctx = ctx.with_source_ips(source_ips);
    }
    ctx
}

/// Converts an envelope response into an axum response, header values included.
pub fn into_axum(response: HttpResponse) -> Response {
    let status = StatusCode::from_u16(response.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = status;

    for header in response.headers {
        let Ok(name) = HeaderName::from_bytes(header.key.as_bytes()) else {
            event!(Level::WARN, header = %header.key, "dropping response header with invalid name");
            continue;
        };
        for value in header.values {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    out.headers_mut().append(name.clone(), value);
                }
                Err(_) => {
                    event!(Level::WARN, header = %name, "dropping invalid response header value");
                }
            }
        }
    }
    out
}

async fn distribute(State(distributor): State<Arc<Distributor>>, request: Request) -> Response {
    if !distributor.is_path_supported(request.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let ctx = request_context(request.headers());
    if let Err(err) = ctx.tenant_id() {
        return (StatusCode::UNAUTHORIZED, err.to_string()).into_response();
    }

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(err) => {
            let err = DistributorError::BodyRead(err.to_string());
            event!(Level::ERROR, error = %err, "failed to read the request body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let url = parts
        .uri
        .path_and_query()
        .map(|target| target.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let envelope = HttpRequest::new(parts.method.as_str(), url)
        .with_headers(headers_from_map(&parts.headers))
        .with_body(body.to_vec());

    into_axum(distributor.distribute_request(&ctx, envelope).await)
}

async fn metrics(State(distributor): State<Arc<Distributor>>) -> Response {
    (
        [(CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        distributor.metrics().render_text(),
    )
        .into_response()
}

async fn ready(State(distributor): State<Arc<Distributor>>) -> Response {
    let state = distributor.state();
    if state.accepts_requests() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, format!("distributor is {}", state)).into_response()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers
        .get(key)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
