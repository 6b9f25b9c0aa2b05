//! HS256 bearer tokens carried by staff clients.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::Identity;
use crate::error::AuthError;

/// Lifetime of tokens minted by the dev tooling (12 hours).
pub const DEFAULT_TTL_SECS: i64 = 12 * 3600;

/// Upper bound on a requested token lifetime (30 days).
pub const MAX_TTL_HOURS: i64 = 30 * 24;

/// Token lifetime for a requested number of hours, clamped to
/// `1..=MAX_TTL_HOURS`.
pub fn ttl_hours(hours: i64) -> Duration {
    Duration::hours(hours.clamp(1, MAX_TTL_HOURS))
}

/// Claims embedded in a staff bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the staff user id.
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Verifies signature and expiry against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims.into())
    }
}

/// Mint a signed bearer token for `identity`, valid for `ttl`.
pub fn mint(secret: &str, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: identity.id.clone(),
        email: identity.email.clone(),
        role: identity.role.clone(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AuthError::Signing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    fn staff() -> Identity {
        Identity {
            id: "usr_1".into(),
            email: "cook@example.test".into(),
            role: "staff".into(),
        }
    }

    #[test]
    fn mint_then_verify_yields_identity() {
        let token = mint(SECRET, &staff(), Duration::minutes(5)).unwrap();
        let identity = TokenVerifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(identity, staff());
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = mint("other-secret", &staff(), Duration::minutes(5)).unwrap();
        let err = TokenVerifier::new(SECRET).verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint(SECRET, &staff(), Duration::minutes(-10)).unwrap();
        let err = TokenVerifier::new(SECRET).verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn garbage_is_invalid() {
        let err = TokenVerifier::new(SECRET).verify("not.a.jwt").unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[test]
    fn requested_lifetime_is_clamped() {
        assert_eq!(ttl_hours(12), Duration::hours(12));
        assert_eq!(ttl_hours(0), Duration::hours(1));
        assert_eq!(ttl_hours(-5), Duration::hours(1));
        assert_eq!(ttl_hours(i64::MAX), Duration::hours(MAX_TTL_HOURS));
        assert!(mint(SECRET, &staff(), ttl_hours(i64::MAX)).is_ok());
    }
}
