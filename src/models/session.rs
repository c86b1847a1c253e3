//! Identity data produced by the OAuth flow and carried in session tokens.

use serde::{Deserialize, Serialize};

/// Profile returned by the identity provider after a code exchange.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub email: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub picture: String,

    #[serde(rename = "verified_email", alias = "email_verified", default)]
    pub email_verified: bool,
}

/// Claims embedded in every session token.
///
/// `iat` and `exp` are Unix timestamps in seconds. Never persisted; every
/// protected request re-derives them from the token.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionClaims {
    pub email: String,
    pub name: String,
    pub picture: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Public view of the signed-in user, returned by `GET /api/auth/me`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
    pub picture: String,
}

impl From<SessionClaims> for UserResponse {
    fn from(claims: SessionClaims) -> Self {
        Self {
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        }
    }
}
