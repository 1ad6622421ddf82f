//! CORS headers attached to every relayed response.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, Session-ID";
pub const MAX_AGE: &str = "86400";

/// Origin policy.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed: Vec<HeaderValue>,
}

impl CorsPolicy {
    /// Empty `origins` allows any origin.
    pub fn new(origins: &[String]) -> Self {
        let allowed = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o.trim_end_matches('/')).ok())
            .collect();
        Self { allowed }
    }

    /// Returns the `Access-Control-Allow-Origin` value for a request.
    ///
    /// Listed origins are echoed back; any other origin gets the first
    /// listed one, which browsers then reject.
    pub fn allow_origin(&self, origin: Option<&HeaderValue>) -> HeaderValue {
        let Some(first) = self.allowed.first() else {
            return HeaderValue::from_static("*");
        };
        match origin {
            Some(origin) if self.allowed.contains(origin) => origin.clone(),
            _ => first.clone(),
        }
    }

    fn is_wildcard(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Sets all CORS headers on `headers`.
    pub fn apply(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin(origin),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE));
        if !self.is_wildcard() {
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
    }
}

/// Answers preflight requests and decorates every other response.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req.headers().get(header::ORIGIN).cloned();

    let mut response = if req.method() == Method::OPTIONS {
        let mut preflight = Response::new(Body::empty());
        *preflight.status_mut() = StatusCode::NO_CONTENT;
        preflight
    } else {
        next.run(req).await
    };

    policy.apply(origin.as_ref(), response.headers_mut());
    response
}
