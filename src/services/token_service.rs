//! Session token issuance and verification.
//!
//! Tokens are HS256 JWTs signed with a single shared secret. Verification
//! pins the algorithm and checks expiry against the caller's clock rather
//! than relying on the library's own `exp` handling.

use crate::{
    models::session::{SessionClaims, UserProfile},
    services::auth_service::AuthError,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use tracing::{debug, warn};

/// Issuer tag stamped on every session token.
pub const SESSION_ISSUER: &str = "rice-notes";

/// Validity window of a session token, and of the cookie that carries it.
pub const SESSION_TTL_HOURS: i64 = 24;

const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    has_secret: bool,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            has_secret: !secret.is_empty(),
        }
    }

    pub fn issue(&self, profile: &UserProfile) -> Result<String, AuthError> {
        self.issue_at(profile, Utc::now())
    }

    /// Sign a token for `profile` that is valid from `now` for 24 hours.
    pub fn issue_at(&self, profile: &UserProfile, now: DateTime<Utc>) -> Result<String, AuthError> {
        if !self.has_secret {
            return Err(AuthError::Signing("session secret is not configured".into()));
        }

        let expires_at = now + Duration::hours(SESSION_TTL_HOURS);
        let claims = SessionClaims {
            email: profile.email.clone(),
            name: profile.name.clone(),
            picture: profile.picture.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: SESSION_ISSUER.to_string(),
        };

        let token = encode(&Header::new(SESSION_ALGORITHM), &claims, &self.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))?;

        debug!(email = %profile.email, expires = %expires_at, "session token issued");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Validate signature, algorithm and issuer, then reject the token if
    /// `now` is past its expiry.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        if !self.has_secret {
            return Err(AuthError::SignatureInvalid);
        }

        let mut validation = Validation::new(SESSION_ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|err| {
            warn!(error = %err, "session token rejected");
            match err.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::SignatureInvalid
                }
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::MalformedToken,
            }
        })?;

        let claims = data.claims;
        if now.timestamp() > claims.exp {
            warn!(email = %claims.email, "expired session token");
            return Err(AuthError::TokenExpired);
        }

        debug!(email = %claims.email, "session token verified");
        Ok(claims)
    }
}
