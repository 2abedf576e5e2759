use crate::core::{HttpResponse, ReplicaFailure};

/// Turns a replica failure into the response the caller sees.
///
/// Structured replica responses are replayed with their code, every header
/// value and body. Anything else becomes a plain-text 500 carrying the message.
pub fn respond_from_failure(failure: &ReplicaFailure) -> HttpResponse {
    match failure {
        ReplicaFailure::Response(response) => {
            let mut relayed = HttpResponse::new(response.code, response.body.clone());
            for header in &response.headers {
                for value in &header.values {
                    relayed.add_header(header.key.clone(), value.clone());
                }
            }
            relayed
        }
        ReplicaFailure::Message(message) => HttpResponse::internal_error(message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HttpHeader;

    #[test]
    fn structured_failure_is_replayed_exactly() {
        let mut upstream = HttpResponse::new(429, b"rate limited".to_vec());
        upstream.headers.push(HttpHeader::new(
            "Retry-After",
            vec!["5".to_string(), "10".to_string()],
        ));
        upstream.headers.push(HttpHeader::new("X-Limit", vec!["100".to_string()]));

        let response = respond_from_failure(&ReplicaFailure::Response(upstream));
        assert_eq!(response.code, 429);
        assert_eq!(response.body_text(), "rate limited");
        assert_eq!(response.header_values("retry-after"), vec!["5", "10"]);
        assert_eq!(response.header_values("x-limit"), vec!["100"]);
    }

    #[test]
    fn plain_failure_becomes_internal_error() {
        let response = respond_from_failure(&ReplicaFailure::message("connection refused"));
        assert_eq!(response.code, 500);
        assert_eq!(response.body_text(), "connection refused");
    }
}
