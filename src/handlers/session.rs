//! Session extraction and the `jwt` cookie.
//!
//! A request is authenticated by an `Authorization: Bearer` header or, when
//! that is absent, by the `jwt` cookie set at the end of the OAuth callback.

use crate::{
    errors::AppError,
    models::session::SessionClaims,
    services::{auth_service::AuthError, token_service::SESSION_TTL_HOURS},
    state::AppState,
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use tracing::debug;

pub const SESSION_COOKIE: &str = "jwt";

/// Verified session claims of the caller.
#[derive(Debug, Clone)]
pub struct Principal(pub SessionClaims);

impl Principal {
    pub fn email(&self) -> &str {
        &self.0.email
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            debug!(path = %parts.uri.path(), "request without session token");
            return Err(AuthError::MissingToken.into());
        };

        let claims = state.tokens.verify(&token)?;
        Ok(Principal(claims))
    }
}

/// Bearer token first, then the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str) -> Result<HeaderValue, AppError> {
    let max_age = SESSION_TTL_HOURS * 60 * 60;
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=Strict",
        SESSION_COOKIE, token, max_age
    ))
    .map_err(|_| AppError::from(AuthError::Signing("token is not a valid cookie value".into())))
}

/// `Set-Cookie` value that removes the session cookie.
pub fn cleared_session_cookie() -> HeaderValue {
    HeaderValue::from_static("jwt=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Strict")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let h = headers(&[
            (header::AUTHORIZATION, "Bearer header-token"),
            (header::COOKIE, "jwt=cookie-token"),
        ]);
        assert_eq!(session_token(&h).as_deref(), Some("header-token"));
    }

    #[test]
    fn cookie_is_found_among_others() {
        let h = headers(&[(header::COOKIE, "theme=dark; jwt=abc.def.ghi; lang=en")]);
        assert_eq!(session_token(&h).as_deref(), Some("abc.def.ghi"));

        let h = headers(&[
            (header::AUTHORIZATION, "Basic dXNlcjpwYXNz"),
            (header::COOKIE, "jwt=abc"),
        ]);
        assert_eq!(session_token(&h).as_deref(), Some("abc"));
    }

    #[test]
    fn nothing_usable() {
        assert!(session_token(&HeaderMap::new()).is_none());
        assert!(session_token(&headers(&[(header::AUTHORIZATION, "Bearer ")])).is_none());
        assert!(session_token(&headers(&[(header::COOKIE, "jwt=; other=1")])).is_none());
        assert!(session_token(&headers(&[(header::COOKIE, "notjwt=abc")])).is_none());
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("tok").unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("jwt=tok;"));
        for attr in ["Path=/", "Max-Age=86400", "HttpOnly", "Secure", "SameSite=Strict"] {
            assert!(cookie.contains(attr), "missing {attr}");
        }
        assert!(cleared_session_cookie().to_str().unwrap().contains("Max-Age=0"));
    }
}
