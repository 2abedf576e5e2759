//! HTTP-shaped envelopes exchanged with replicas.
//!
//! Requests are captured once from the inbound call and shared by every
//! replica call of a write, so they are immutable after construction.

use http::HeaderMap;
use serde::{Deserialize, Serialize};

pub const STATUS_OK: u16 = 200;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// A header key with every value sent for it, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub key: String,
    pub values: Vec<String>,
}

impl HttpHeader {
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }
}

/// Outbound request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    /// Full request target: path plus query string.
    pub url: String,
    pub headers: Vec<HttpHeader>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        push_header_value(&mut self.headers, key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Vec<HttpHeader>) -> Self {
        self.headers = headers;
        self
    }

    /// Reads are the only requests proxied to a single replica.
    pub fn is_read(&self) -> bool {
        self.method == "GET"
    }
}

/// HTTP-shaped response, either relayed from a replica or synthesized locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub code: u16,
    pub headers: Vec<HttpHeader>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Response carrying only a status code.
    pub fn status(code: u16) -> Self {
        Self::new(code, Vec::new())
    }

    pub fn ok() -> Self {
        Self::status(STATUS_OK)
    }

    /// Plain-text error response, the shape used for every locally generated failure.
    pub fn text(code: u16, message: impl Into<String>) -> Self {
        Self::new(code, message.into().into_bytes())
            .with_header("Content-Type", "text/plain; charset=utf-8")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::text(STATUS_INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        push_header_value(&mut self.headers, key.into(), value.into());
        self
    }

    /// Appends a value to `key`, keeping any values already present.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        push_header_value(&mut self.headers, key.into(), value.into());
    }

    /// Every value recorded for `key`, matched case-insensitively.
    pub fn header_values(&self, key: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|header| header.key.eq_ignore_ascii_case(key))
            .flat_map(|header| header.values.iter().map(String::as_str))
            .collect()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaStatus {
    Ok,
    Error,
}

/// What a replica declared in answer to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaResponse {
    pub status: ReplicaStatus,
    pub http_response: Option<HttpResponse>,
    pub error: String,
}

impl ReplicaResponse {
    pub fn ok(http_response: HttpResponse) -> Self {
        Self {
            status: ReplicaStatus::Ok,
            http_response: Some(http_response),
            error: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplicaStatus::Error,
            http_response: None,
            error: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplicaStatus::Ok
    }
}

/// Converts a header map into envelope headers, grouping repeated keys.
pub fn headers_from_map(map: &HeaderMap) -> Vec<HttpHeader> {
    let mut headers = Vec::with_capacity(map.keys_len());
    for key in map.keys() {
        let values = map
            .get_all(key)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        headers.push(HttpHeader::new(key.as_str(), values));
    }
    headers
}

fn push_header_value(headers: &mut Vec<HttpHeader>, key: String, value: String) {
    if let Some(existing) = headers
        .iter_mut()
        .find(|header| header.key.eq_ignore_ascii_case(&key))
    {
        existing.values.push(value);
    } else {
        headers.push(HttpHeader::new(key, vec![value]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn header_map_keeps_every_value_per_key() {
        let mut map = HeaderMap::new();
        map.append("accept", HeaderValue::from_static("application/json"));
        map.append("accept", HeaderValue::from_static("text/plain"));
        map.insert("x-scope-orgid", HeaderValue::from_static("tenant-1"));

        let headers = headers_from_map(&map);
        assert_eq!(headers.len(), 2);
        let accept = headers.iter().find(|h| h.key == "accept").unwrap();
        assert_eq!(accept.values, vec!["application/json", "text/plain"]);
    }

    #[test]
    fn response_headers_accumulate_values() {
        let mut response = HttpResponse::status(429).with_header("Retry-After", "5");
        response.add_header("retry-after", "10");
        assert_eq!(response.header_values("RETRY-AFTER"), vec!["5", "10"]);
        assert_eq!(response.headers.len(), 1);
    }

    #[test]
    fn only_get_is_a_read() {
        assert!(HttpRequest::new("GET", "/api/v1/alerts").is_read());
        assert!(!HttpRequest::new("POST", "/api/v1/alerts").is_read());
        assert!(!HttpRequest::new("DELETE", "/api/v1/alerts").is_read());
        assert!(!HttpRequest::new("get", "/api/v1/alerts").is_read());
    }
}
