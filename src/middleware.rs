use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::GateError;
use crate::handlers::SharedState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logging middleware for request/response tracking.
///
/// Every request runs inside its own span carrying a fresh request id, so log
/// lines that mention an identity are never attributed to another request.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
        peer = %peer_addr(&request),
    );

    async move {
        info!(target: "fitgate::middleware", "Incoming request");

        let mut response = next.run(request).await;

        info!(
            target: "fitgate::middleware",
            status = %response.status(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

/// First hop of `x-forwarded-for` when behind a proxy, else the socket peer.
fn peer_addr(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());

    match (forwarded, request.extensions().get::<ConnectInfo<SocketAddr>>()) {
        (Some(hop), _) => hop.to_string(),
        (None, Some(ConnectInfo(addr))) => addr.ip().to_string(),
        (None, None) => "-".to_string(),
    }
}

/// Verify the bearer credential and spend quota before a protected handler runs.
///
/// The admitted [`Caller`](crate::gate::Caller) is handed to the handler as a
/// typed request extension.
pub async fn gate_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let caller = state.gate.admit(auth_header.as_deref(), &route).await?;
    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_addr_prefers_first_forwarded_hop() {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000))));
        assert_eq!(peer_addr(&request), "10.0.0.9");

        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.7, 10.0.0.1"),
        );
        assert_eq!(peer_addr(&request), "198.51.100.7");
    }

    #[test]
    fn test_peer_addr_unknown_without_connection_info() {
        let request = Request::new(axum::body::Body::empty());
        assert_eq!(peer_addr(&request), "-");
    }
}
