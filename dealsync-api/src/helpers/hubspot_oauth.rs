use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use std::time::Duration;

use crate::config::OAuthConfig;

const HUBSPOT_AUTH_URL: &str = "https://app.hubspot.com/oauth/authorize";
const HUBSPOT_TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";

#[derive(Debug, thiserror::Error)]
pub enum OAuthExchangeError {
    #[error("Invalid OAuth configuration: {0}")]
    Configuration(String),

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("No refresh token received")]
    MissingRefreshToken,
}

/// Tokens returned by the authorization-code exchange
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<Duration>,
}

pub struct HubSpotOAuthClient {
    client: BasicClient,
    scopes: Vec<String>,
}

impl HubSpotOAuthClient {
    pub fn new(config: &OAuthConfig) -> Result<Self, OAuthExchangeError> {
        Self::with_endpoints(config, HUBSPOT_AUTH_URL, HUBSPOT_TOKEN_URL)
    }

    pub fn with_endpoints(
        config: &OAuthConfig,
        auth_url: &str,
        token_url: &str,
    ) -> Result<Self, OAuthExchangeError> {
        let invalid = |e: oauth2::url::ParseError| OAuthExchangeError::Configuration(e.to_string());

        // HubSpot expects the client credentials in the form body
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            config.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(auth_url.to_string()).map_err(invalid)?,
            Some(TokenUrl::new(token_url.to_string()).map_err(invalid)?),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(RedirectUrl::new(config.redirect_uri.clone()).map_err(invalid)?);

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
        })
    }

    pub fn authorize_url(&self) -> (String, CsrfToken) {
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url();

        (auth_url.to_string(), csrf_token)
    }

    pub async fn exchange_code(&self, code: String) -> Result<TokenPair, OAuthExchangeError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| OAuthExchangeError::Exchange(e.to_string()))?;

        let refresh_token = token
            .refresh_token()
            .ok_or(OAuthExchangeError::MissingRefreshToken)?
            .secret()
            .to_string();

        Ok(TokenPair {
            access_token: token.access_token().secret().to_string(),
            refresh_token,
            expires_in: token.expires_in(),
        })
    }
}
