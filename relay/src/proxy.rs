//! Request forwarding.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request, State},
    http::{HeaderMap, HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::{RelayState, error::Result};

/// Headers that describe one connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forwards `/api/*` requests to the upstream origin.
pub async fn relay(State(state): State<RelayState>, req: Request) -> Result<Response> {
    let path = req.uri().path().to_string();
    if !path.starts_with("/api/") {
        return Ok((StatusCode::NOT_FOUND, "Not Found").into_response());
    }

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let target = format!("{}{}", state.upstream, path_and_query);
    let method = req.method().clone();
    info!("{} {} -> {}", method, path, target);

    let headers = forwarded_headers(req.headers());
    let body = if method == Method::GET || method == Method::HEAD {
        None
    } else {
        Some(Bytes::from_request(req, &state).await?)
    };

    let mut upstream = state.client.request(method.clone(), &target).headers(headers);
    if let Some(body) = body {
        upstream = upstream.body(body);
    }
    let upstream = upstream.send().await?;

    let status = upstream.status();
    info!("{} {} <- {}", method, path, status.as_u16());

    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let body = upstream.bytes().await?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

/// Copies inbound headers minus host, length and hop-by-hop headers.
pub fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if name == header::HOST || name == header::CONTENT_LENGTH || HOP_BY_HOP.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}
