//! Gateway error types and how they surface over HTTP.
//!
//! Handshake-level failures never carry a body: the client only learns that
//! the upgrade did not happen.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Bearer credential could not be verified.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("bearer token has expired")]
    Expired,
    #[error("bearer token is invalid: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("bearer credential is malformed: {0}")]
    Malformed(&'static str),
    #[error("failed to sign bearer token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "upgrade rejected: credential verification failed");
        silent(StatusCode::UNAUTHORIZED)
    }
}

/// Upgrade request refused by the gatekeeper before any handshake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeRejected {
    #[error("path {0:?} is not the gateway endpoint")]
    PathMismatch(String),
    #[error("origin {0:?} is not allowed")]
    OriginNotAllowed(String),
    /// Right path and origin, but not a valid WebSocket upgrade. Answered
    /// like an unknown path.
    #[error("not a websocket upgrade: {0}")]
    NotUpgrade(String),
}

impl IntoResponse for HandshakeRejected {
    fn into_response(self) -> Response {
        tracing::debug!(reason = %self, "upgrade rejected by gatekeeper");
        match self {
            Self::PathMismatch(_) | Self::NotUpgrade(_) => silent(StatusCode::NOT_FOUND),
            Self::OriginNotAllowed(_) => silent(StatusCode::FORBIDDEN),
        }
    }
}

/// Cross-instance bus failure. Always absorbed by the fanout bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmitterError {
    #[error("emitter is already bound to a running gateway")]
    AlreadyBound,
}

/// Empty response that asks the peer to drop the transport.
fn silent(status: StatusCode) -> Response {
    let mut response = status.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
