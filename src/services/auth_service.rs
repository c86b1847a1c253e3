//! OAuth login flow: provider code exchange, domain policy, session issuance.
//!
//! The flow moves `Unauthenticated → AwaitingProviderCode → CodeReceived →
//! IdentityVerified → TokenIssued`. Any failure returns the caller to
//! `Unauthenticated`; nothing is stored until a token has been issued.

use crate::{
    models::session::UserProfile,
    services::token_service::TokenService,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("code exchange failed: {0}")]
    CodeExchange(String),
    #[error("profile fetch failed: {0}")]
    ProfileFetch(String),
    #[error("email `{0}` is outside the allowed domain")]
    DomainRejected(String),
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("session token missing")]
    MissingToken,
    #[error("session token malformed")]
    MalformedToken,
    #[error("session token signature invalid")]
    SignatureInvalid,
    #[error("session token expired")]
    TokenExpired,
}

/// Access token returned by the provider's code exchange.
#[derive(Debug, Clone)]
pub struct ProviderToken {
    pub access_token: String,
}

/// An OAuth2 identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent URL embedding the anti-CSRF `state`.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, AuthError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, AuthError>;
}

/// Restricts sign-in to one institutional email domain and its subdomains.
#[derive(Debug, Clone)]
pub struct DomainPolicy {
    domain: String,
}

impl DomainPolicy {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.trim().trim_start_matches('@').to_ascii_lowercase(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Case-insensitive: `a@rice.edu` and `a@cs.rice.edu` match `rice.edu`;
    /// `a@notrice.edu` does not.
    pub fn is_trusted(&self, email: &str) -> bool {
        let Some((local, domain)) = email.rsplit_once('@') else {
            return false;
        };
        if local.is_empty() || self.domain.is_empty() {
            return false;
        }
        let domain = domain.to_ascii_lowercase();
        domain == self.domain
            || domain
                .strip_suffix(&self.domain)
                .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
    }

    /// Emails outside the domain are refused whatever the provider says about
    /// verification. Inside it, the provider's ownership of the domain is
    /// enough and the verified flag is not consulted.
    pub fn admit(&self, profile: &UserProfile) -> Result<(), AuthError> {
        if !self.is_trusted(&profile.email) {
            warn!(email = %profile.email, verified = profile.email_verified, "sign-in from outside the allowed domain");
            return Err(AuthError::DomainRejected(profile.email.clone()));
        }
        Ok(())
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub profile: UserProfile,
    pub token: String,
}

pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    tokens: Arc<TokenService>,
    policy: DomainPolicy,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        tokens: Arc<TokenService>,
        policy: DomainPolicy,
    ) -> Self {
        Self {
            provider,
            tokens,
            policy,
        }
    }

    /// Consent URL for `state`, generating a random state when none is given.
    pub fn authorization_url(&self, state: Option<&str>) -> String {
        let state = match state.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => Uuid::new_v4().simple().to_string(),
        };
        let url = self.provider.authorization_url(&state);
        info!(state = %state, url_length = url.len(), "generated provider auth URL");
        url
    }

    /// Exchange an authorization code for a verified, domain-checked identity
    /// and a fresh session token.
    pub async fn login(&self, code: &str) -> Result<AuthResult, AuthError> {
        info!(code_length = code.len(), "starting code exchange");

        let token = self.provider.exchange_code(code).await?;
        let profile = self.provider.fetch_profile(&token.access_token).await?;

        self.policy.admit(&profile)?;

        let session = self.tokens.issue(&profile)?;
        info!(email = %profile.email, "successful authentication");

        Ok(AuthResult {
            profile,
            token: session,
        })
    }
}
