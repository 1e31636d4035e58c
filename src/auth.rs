//! Bearer credential verification.
//!
//! Tokens are HMAC-signed JWTs carrying an `email` claim, which becomes the
//! caller [`Identity`]. The verifier is CPU-only and never touches the store.

use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";
const HMAC_FAMILY: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing or invalid Authorization header")]
    MalformedHeader,

    #[error("Token signed with an unexpected algorithm")]
    InvalidSignature,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Missing email in token")]
    MissingIdentityClaim,

    #[error("Server misconfigured: missing JWT secret")]
    ServerMisconfigured,
}

/// Authenticated caller, derived from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AuthError::MissingIdentityClaim);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    email: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct Verifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl Verifier {
    /// Build a verifier for `secret`. An absent or empty secret yields a verifier
    /// that answers every well-formed request with `ServerMisconfigured`.
    pub fn new(secret: Option<&str>, leeway_secs: u64) -> Self {
        let key = secret
            .filter(|s| !s.is_empty())
            .map(|s| DecodingKey::from_secret(s.as_bytes()));

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_FAMILY.to_vec();
        validation.leeway = leeway_secs;

        Self { key, validation }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    /// Verify a raw `Authorization` header value and extract the caller identity.
    pub fn verify(&self, raw_header: &str) -> Result<Identity, AuthError> {
        let token = raw_header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MalformedHeader)?;

        let key = self.key.as_ref().ok_or(AuthError::ServerMisconfigured)?;

        let header = decode_header(token).map_err(|_| AuthError::InvalidOrExpiredToken)?;
        if !HMAC_FAMILY.contains(&header.alg) {
            return Err(AuthError::InvalidSignature);
        }

        let data = decode::<Claims>(token, key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
            _ => AuthError::InvalidOrExpiredToken,
        })?;

        let email = data
            .claims
            .email
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or(AuthError::MissingIdentityClaim)?;

        Identity::new(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-secret";

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn token_with(alg: Algorithm, secret: &str, claims: serde_json::Value) -> String {
        encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[test]
    fn test_valid_token_yields_identity() {
        let verifier = Verifier::new(Some(SECRET), 0);
        let token = token_with(
            Algorithm::HS256,
            SECRET,
            json!({ "email": "lifter@example.com", "exp": now() + 3600 }),
        );

        let identity = verifier.verify(&bearer(&token)).unwrap();
        assert_eq!(identity.as_str(), "lifter@example.com");
    }

    #[test]
    fn test_other_hmac_algorithms_accepted() {
        let verifier = Verifier::new(Some(SECRET), 0);
        let token = token_with(
            Algorithm::HS512,
            SECRET,
            json!({ "email": "a@b.c", "exp": now() + 60 }),
        );
        assert!(verifier.verify(&bearer(&token)).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        let verifier = Verifier::new(Some(SECRET), 0);
        for header in ["", "Token abc", "Bearer", "Bearer    ", "bearer abc"] {
            assert_eq!(verifier.verify(header), Err(AuthError::MalformedHeader), "{header:?}");
        }
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let verifier = Verifier::new(Some(SECRET), 0);
        let token = token_with(
            Algorithm::HS256,
            "other-secret",
            json!({ "email": "a@b.c", "exp": now() + 60 }),
        );
        assert_eq!(verifier.verify(&bearer(&token)), Err(AuthError::InvalidOrExpiredToken));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let verifier = Verifier::new(Some(SECRET), 0);
        let token = token_with(
            Algorithm::HS256,
            SECRET,
            json!({ "email": "a@b.c", "exp": now() - 3600 }),
        );
        assert_eq!(verifier.verify(&bearer(&token)), Err(AuthError::InvalidOrExpiredToken));
    }

    #[test]
    fn test_token_without_expiry_is_invalid() {
        let verifier = Verifier::new(Some(SECRET), 0);
        let token = token_with(Algorithm::HS256, SECRET, json!({ "email": "a@b.c" }));
        assert_eq!(verifier.verify(&bearer(&token)), Err(AuthError::InvalidOrExpiredToken));
    }

    #[test]
    fn test_non_hmac_algorithm_is_rejected() {
        let verifier = Verifier::new(Some(SECRET), 0);
        // {"alg":"RS256","typ":"JWT"} with an arbitrary payload and signature
        let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.eyJlbWFpbCI6ImFAYi5jIn0.c2ln";
        assert_eq!(verifier.verify(&bearer(token)), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let verifier = Verifier::new(Some(SECRET), 0);
        assert_eq!(
            verifier.verify("Bearer not.a.jwt"),
            Err(AuthError::InvalidOrExpiredToken)
        );
    }

    #[test]
    fn test_missing_or_empty_email_claim() {
        let verifier = Verifier::new(Some(SECRET), 0);
        for claims in [
            json!({ "exp": now() + 60 }),
            json!({ "email": "", "exp": now() + 60 }),
            json!({ "email": "   ", "exp": now() + 60 }),
            json!({ "email": 42, "exp": now() + 60 }),
        ] {
            let token = token_with(Algorithm::HS256, SECRET, claims);
            assert_eq!(verifier.verify(&bearer(&token)), Err(AuthError::MissingIdentityClaim));
        }
    }

    #[test]
    fn test_missing_secret_is_misconfigured() {
        let verifier = Verifier::new(None, 0);
        assert!(!verifier.is_configured());
        assert_eq!(verifier.verify("Bearer abc"), Err(AuthError::ServerMisconfigured));
        assert_eq!(verifier.verify("Token abc"), Err(AuthError::MalformedHeader));

        assert!(!Verifier::new(Some(""), 0).is_configured());
    }
}
