use super::{CallMetadata, ReplicaClient};
use crate::core::{HttpHeader, HttpRequest, HttpResponse, ReplicaFailure, ReplicaResponse};
use async_trait::async_trait;

/// Headers owned by the transport connection, never replayed to replicas.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
];

/// Replica client that replays the envelope as a plain HTTP request.
///
/// Replies with a 5xx status are returned as structured failures so the
/// caller can relay them; any other reply is an OK response.
pub struct HttpReplicaClient {
    client: reqwest::Client,
    addr: String,
    base_url: String,
}

impl HttpReplicaClient {
    pub fn new(client: reqwest::Client, addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let base_url = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr)
        };
        Self {
            client,
            addr,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn is_forwardable(key: &str, metadata_keys: &[&str]) -> bool {
        !HOP_BY_HOP_HEADERS
            .iter()
            .chain(metadata_keys.iter())
            .any(|skip| skip.eq_ignore_ascii_case(key))
    }
}

#[async_trait]
impl ReplicaClient for HttpReplicaClient {
    async fn handle_request(
        &self,
        metadata: &CallMetadata,
        request: &HttpRequest,
    ) -> Result<ReplicaResponse, ReplicaFailure> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|err| {
            ReplicaFailure::message(format!("invalid request method '{}': {}", request.method, err))
        })?;

        let metadata_headers = metadata.headers();
        let metadata_keys: Vec<&str> = metadata_headers.iter().map(|(key, _)| *key).collect();

        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, request.url));
        for header in &request.headers {
            if !Self::is_forwardable(&header.key, &metadata_keys) {
                continue;
            }
            for value in &header.values {
                builder = builder.header(header.key.as_str(), value.as_str());
            }
        }
        for (key, value) in metadata_headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|err| ReplicaFailure::message(err.to_string()))?;

        let code = response.status().as_u16();
        let mut headers: Vec<HttpHeader> = Vec::with_capacity(response.headers().keys_len());
        for key in response.headers().keys() {
            let values = response
                .headers()
                .get_all(key)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect();
            headers.push(HttpHeader::new(key.as_str(), values));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| ReplicaFailure::message(format!("failed to read response body: {}", err)))?
            .to_vec();

        let http_response = HttpResponse {
            code,
            headers,
            body,
        };
        if code >= 500 {
            return Err(ReplicaFailure::Response(http_response));
        }
        Ok(ReplicaResponse::ok(http_response))
    }

    fn remote_address(&self) -> &str {
        &self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FORWARDED_FOR_HEADER, ORG_ID_HEADER};

    #[test]
    fn base_url_defaults_to_http() {
        let client = reqwest::Client::new();
        assert_eq!(
            HttpReplicaClient::new(client.clone(), "10.0.0.1:9094").base_url(),
            "http://10.0.0.1:9094"
        );
        assert_eq!(
            HttpReplicaClient::new(client, "https://am-0.example:9094/").base_url(),
            "https://am-0.example:9094"
        );
    }

    #[test]
    fn hop_by_hop_and_metadata_headers_are_not_replayed() {
        let metadata_keys = [ORG_ID_HEADER, FORWARDED_FOR_HEADER];
        assert!(!HttpReplicaClient::is_forwardable("Host", &metadata_keys));
        assert!(!HttpReplicaClient::is_forwardable("x-scope-orgid", &metadata_keys));
        assert!(HttpReplicaClient::is_forwardable("Content-Type", &metadata_keys));
    }

    #[tokio::test]
    async fn unreachable_replica_is_a_plain_failure() {
        let client = HttpReplicaClient::new(reqwest::Client::new(), "127.0.0.1:1");
        let failure = client
            .handle_request(&CallMetadata::new("tenant-1"), &HttpRequest::new("GET", "/api/v1/alerts"))
            .await
            .unwrap_err();
        assert!(matches!(failure, ReplicaFailure::Message(_)));
    }
}
