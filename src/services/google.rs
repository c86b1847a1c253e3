//! Google implementation of `IdentityProvider`.

use crate::{
    models::session::UserProfile,
    services::auth_service::{AuthError, IdentityProvider, ProviderToken},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPES: &str = "openid email profile";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleProvider {
    client: Client,
    auth_url: Url,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

impl GoogleProvider {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            auth_url: Url::parse(GOOGLE_AUTH_URL)?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("access_type", "offline")
            .append_pair("state", state);
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, AuthError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let resp = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "failed to exchange code for token");
                AuthError::CodeExchange(err.to_string())
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            error!(%status, "token endpoint rejected the code");
            return Err(AuthError::CodeExchange(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token: TokenResponse = resp.json().await.map_err(|err| {
            error!(error = %err, "failed to decode token response");
            AuthError::CodeExchange(err.to_string())
        })?;

        Ok(ProviderToken {
            access_token: token.access_token,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let resp = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "failed to get user info");
                AuthError::ProfileFetch(err.to_string())
            })?;

        if resp.status() != StatusCode::OK {
            let status = resp.status();
            error!(%status, "userinfo request returned non-200 status");
            return Err(AuthError::ProfileFetch(format!(
                "userinfo returned {}",
                status
            )));
        }

        let profile: UserProfile = resp.json().await.map_err(|err| {
            error!(error = %err, "failed to decode user info");
            AuthError::ProfileFetch(err.to_string())
        })?;

        debug!(email = %profile.email, verified = profile.email_verified, "retrieved user info");
        Ok(profile)
    }
}
