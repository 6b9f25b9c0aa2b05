//! Bearer credential extraction for the upgrade request.
//!
//! The `Authorization: Bearer <token>` header wins; browsers that cannot set
//! headers on a WebSocket fall back to a `token` query parameter. A `token`
//! parameter that cannot be read unambiguously is an error, not anonymity.

use axum::extract::Query;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Uri};

use super::tokens::TokenVerifier;
use super::Identity;
use crate::error::AuthError;

const TOKEN_PARAM: &str = "token";

/// Derives an [`Identity`] from an upgrade request.
#[derive(Clone)]
pub struct Authenticator {
    verifier: TokenVerifier,
}

impl Authenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            verifier: TokenVerifier::new(secret),
        }
    }

    /// `Ok(None)` when no credential was presented. A credential that is
    /// present but fails verification is an error, never anonymous.
    pub fn authenticate(&self, headers: &HeaderMap, uri: &Uri) -> Result<Option<Identity>, AuthError> {
        match bearer_token(headers, uri)? {
            Some(token) => self.verifier.verify(&token).map(Some),
            None => Ok(None),
        }
    }
}

/// Pull the raw bearer token out of the header or the query string.
/// `Ok(None)` only when neither carries one.
pub fn bearer_token(headers: &HeaderMap, uri: &Uri) -> Result<Option<String>, AuthError> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = from_header {
        return Ok(Some(token.to_string()));
    }

    let Some(raw) = uri.query() else {
        return Ok(None);
    };

    let pairs = match Query::<Vec<(String, String)>>::try_from_uri(uri) {
        Ok(Query(pairs)) => pairs,
        Err(_) if mentions_token(raw) => return Err(AuthError::Malformed("unreadable token parameter")),
        Err(_) => return Ok(None),
    };

    let mut tokens = pairs.into_iter().filter(|(key, _)| key == TOKEN_PARAM).map(|(_, v)| v);
    match (tokens.next(), tokens.next()) {
        (None, _) => Ok(None),
        (Some(_), Some(_)) => Err(AuthError::Malformed("more than one token parameter")),
        (Some(token), None) if token.is_empty() => Ok(None),
        (Some(token), None) => Ok(Some(token)),
    }
}

/// Raw check used when the query string does not decode at all.
fn mentions_token(raw_query: &str) -> bool {
    raw_query
        .split('&')
        .any(|pair| pair.split('=').next() == Some(TOKEN_PARAM))
}
