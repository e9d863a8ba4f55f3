//! Identity provider: interactive token acquisition and revocation.
//!
//! [`GoogleIdentity`] runs the installed-app authorization-code flow. The
//! part that needs a human (opening the consent page, receiving the
//! redirect) is delegated to a [`ConsentPrompt`] supplied by the host app.

use crate::config::DriveConfig;
use crate::error::{DriveError, DriveResult};
use crate::types::{AccessRequest, ConsentPromptMode, TokenGrant};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Identity capability the session manager depends on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Obtains a fresh access token, prompting the user as requested.
    async fn request_access_token(&self, request: AccessRequest) -> DriveResult<TokenGrant>;

    /// Revokes `token` with the provider.
    async fn revoke(&self, token: &str) -> DriveResult<()>;
}

/// Host-side half of the consent flow.
#[async_trait]
pub trait ConsentPrompt: Send + Sync {
    /// Sends the user to `authorization_url` and returns the authorization
    /// code delivered to the redirect URI.
    async fn authorize(&self, authorization_url: &str) -> DriveResult<String>;
}

/// Token endpoint reply; errors come back as JSON with a 4xx status.
#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Google OAuth 2.0 identity provider.
pub struct GoogleIdentity {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
    auth_url: String,
    token_url: String,
    revoke_url: String,
    redirect_uri: String,
    scope: String,
    prompt: Arc<dyn ConsentPrompt>,
}

impl GoogleIdentity {
    pub fn new(config: &DriveConfig, prompt: Arc<dyn ConsentPrompt>) -> DriveResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            revoke_url: config.revoke_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            prompt,
        })
    }

    /// Builds the consent page URL for the given prompt mode.
    pub fn authorization_url(&self, mode: ConsentPromptMode) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&prompt={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope),
            mode.as_str(),
        )
    }

    async fn exchange_code(&self, code: &str) -> DriveResult<TokenGrant> {
        let mut form = vec![
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let resp = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| DriveError::Auth(format!("token request failed: {e}")))?;

        let status = resp.status();
        let body: TokenEndpointResponse = resp.json().await.map_err(|e| {
            DriveError::Auth(format!("unreadable token response ({status}): {e}"))
        })?;

        if let Some(error) = body.error {
            let detail = body.error_description.unwrap_or_default();
            return Err(DriveError::Auth(format!("{error} {detail}").trim_end().to_string()));
        }
        if !status.is_success() {
            return Err(DriveError::Auth(format!("token endpoint returned {status}")));
        }

        match (body.access_token, body.expires_in) {
            (Some(access_token), Some(expires_in)) => Ok(TokenGrant {
                access_token,
                expires_in,
            }),
            _ => Err(DriveError::Auth(
                "token response missing access_token or expires_in".to_string(),
            )),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    async fn request_access_token(&self, request: AccessRequest) -> DriveResult<TokenGrant> {
        if self.client_id.trim().is_empty() {
            return Err(DriveError::Configuration("missing OAuth client_id".to_string()));
        }
        let url = self.authorization_url(request.prompt);
        let code = self.prompt.authorize(&url).await?;
        let grant = self.exchange_code(&code).await?;
        debug!("obtained access token valid for {}s", grant.expires_in);
        Ok(grant)
    }

    async fn revoke(&self, token: &str) -> DriveResult<()> {
        let resp = self
            .client
            .post(&self.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| DriveError::Auth(format!("revoke request failed: {e}")))?;

        if !resp.status().is_success() {
            warn!("token revocation rejected: {}", resp.status());
            return Err(DriveError::Auth(format!(
                "revocation rejected with {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
