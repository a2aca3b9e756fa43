//! OAuth2 access tokens.

use crate::config::{Credentials, DEFAULT_AUTH_URI};
use crate::error::{Error, Result};
use diagnostics::*;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl, basic::BasicClient,
    reqwest::async_http_client,
};
use tokio::sync::RwLock;

/// Holds the current access token and replaces it through the refresh
/// token when the backend rejects it.
pub(crate) struct TokenSource {
    credentials: Credentials,
    current: RwLock<Option<String>>,
}

impl TokenSource {
    pub(crate) fn new(credentials: &Credentials) -> Self {
        Self {
            current: RwLock::new(credentials.access_token.clone()),
            credentials: credentials.clone(),
        }
    }

    pub(crate) fn can_refresh(&self) -> bool {
        self.credentials.can_refresh()
    }

    /// The current token, fetching one first if none is held.
    pub(crate) async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.current.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.refresh().await
    }

    /// Exchanges the refresh token for a new access token.
    pub(crate) async fn refresh(&self) -> Result<String> {
        let creds = &self.credentials;
        let (Some(refresh_token), Some(client_id)) = (&creds.refresh_token, &creds.client_id)
        else {
            return Err(Error::config(
                "access token rejected and no refresh token configured",
            ));
        };

        let oauth_client = BasicClient::new(
            ClientId::new(client_id.clone()),
            creds.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(DEFAULT_AUTH_URI.to_string())
                .map_err(|e| Error::config(format!("Invalid authorization URL: {e}")))?,
            Some(
                TokenUrl::new(creds.token_uri.clone())
                    .map_err(|e| Error::config(format!("Invalid token URL: {e}")))?,
            ),
        );

        let token = oauth_client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::api(401, format!("OAuth2 token refresh failed: {e}")))?;

        let secret = token.access_token().secret().clone();
        *self.current.write().await = Some(secret.clone());
        debug!("refreshed access token");
        Ok(secret)
    }
}
