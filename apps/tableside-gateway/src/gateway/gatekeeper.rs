//! Upgrade request screening: fixed endpoint path and origin allowlist.

use axum::http::header::ORIGIN;
use axum::http::HeaderMap;

use crate::config::Config;
use crate::error::HandshakeRejected;

pub struct Gatekeeper {
    path: String,
    allowed_origins: Vec<String>,
}

impl Gatekeeper {
    pub fn new(path: impl Into<String>, allowed_origins: Vec<String>) -> Self {
        Self {
            path: path.into(),
            allowed_origins,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gateway_path.clone(), config.allowed_origins.clone())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decide whether an upgrade request may proceed to the handshake.
    ///
    /// Requests without an `Origin` header (non-browser clients) pass the
    /// origin check.
    pub fn admit(&self, path: &str, headers: &HeaderMap) -> Result<(), HandshakeRejected> {
        if path != self.path {
            return Err(HandshakeRejected::PathMismatch(path.to_string()));
        }

        if let Some(origin) = headers.get(ORIGIN) {
            let origin = String::from_utf8_lossy(origin.as_bytes());
            if !self.origin_allowed(&origin) {
                return Err(HandshakeRejected::OriginNotAllowed(origin.into_owned()));
            }
        }

        Ok(())
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty()
            || self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }
}
