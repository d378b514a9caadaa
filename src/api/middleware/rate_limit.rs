//! Rate limiting middleware over the session store.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::api::AppState;
use crate::config::{RATE_LIMIT_AUTH_REQUESTS, RATE_LIMIT_AUTH_WINDOW_SECONDS};

/// Rate limit error response
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from(self.retry_after));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));

        (
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            "Too many requests. Please try again later.",
        )
            .into_response()
    }
}

/// Client identifier for rate limiting.
///
/// Forwarding headers are client-controlled, so they count only when a
/// trusted proxy sits in front. That proxy appends the peer it saw as the
/// last `X-Forwarded-For` hop.
fn client_identifier(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let proxy_hop = request
            .headers()
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|forwarded| forwarded.rsplit(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());

        if let Some(hop) = proxy_hop {
            return hop.to_string();
        }
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting for authentication endpoints.
/// Limits requests to RATE_LIMIT_AUTH_REQUESTS per RATE_LIMIT_AUTH_WINDOW_SECONDS.
pub async fn rate_limit_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let client_id = client_identifier(&request, state.trust_forwarded_for);
    let key = format!("auth:{}", client_id);

    let (count, allowed) = match state
        .sessions
        .check_rate_limit(&key, RATE_LIMIT_AUTH_REQUESTS, RATE_LIMIT_AUTH_WINDOW_SECONDS)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            // Fail closed
            tracing::error!(error = %e, "Auth rate limit check failed - denying request");
            return Err(RateLimitError {
                retry_after: RATE_LIMIT_AUTH_WINDOW_SECONDS,
            });
        }
    };

    if !allowed {
        tracing::warn!(client = %client_id, count = count, "Auth rate limit exceeded");
        return Err(RateLimitError {
            retry_after: RATE_LIMIT_AUTH_WINDOW_SECONDS,
        });
    }

    let mut response = next.run(request).await;

    let remaining = RATE_LIMIT_AUTH_REQUESTS.saturating_sub(count);
    response.headers_mut().insert(
        "X-RateLimit-Limit",
        HeaderValue::from(RATE_LIMIT_AUTH_REQUESTS),
    );
    response
        .headers_mut()
        .insert("X-RateLimit-Remaining", HeaderValue::from(remaining));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_rate_limit_error_response() {
        let error = RateLimitError { retry_after: 60 };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "60");
    }

    fn request_from(peer: &str, forwarded: Option<&str>) -> Request {
        let mut builder = Request::builder();
        if let Some(forwarded) = forwarded {
            builder = builder.header("X-Forwarded-For", forwarded);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_forwarded_header_is_ignored_without_trusted_proxy() {
        let request = request_from("198.51.100.4:5000", Some("203.0.113.7"));
        assert_eq!(client_identifier(&request, false), "198.51.100.4");
    }

    #[test]
    fn test_trusted_proxy_hop_is_the_last_entry() {
        let request = request_from("10.0.0.1:443", Some("1.2.3.4, 203.0.113.7"));
        assert_eq!(client_identifier(&request, true), "203.0.113.7");

        let bare = request_from("10.0.0.1:443", None);
        assert_eq!(client_identifier(&bare, true), "10.0.0.1");
    }

    #[test]
    fn test_client_identifier_without_hints() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_identifier(&request, false), "unknown");
    }
}
