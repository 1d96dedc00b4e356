use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::options::{OptionStore, OptionStoreExt};
use crate::settings::OAuthCredentials;
use crate::sheets::tokens::{TokenRecord, TokenState, TokenStore};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::redirect::Policy;
use std::sync::Arc;
use tiny_http::{Response, Server};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub(crate) const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

// Pending CSRF state between `authorize` and the callback
const STATE_KEY: &str = "oauth_state";

// Google always sends expires_in, but fall back to its usual lifetime
const DEFAULT_EXPIRES_IN: i64 = 3600;

// Type alias for the client when Auth and Token URLs are set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Accepts the full redirect URL, its query string, or a bare code.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.starts_with("http://") || input.starts_with("https://") {
            let url = Url::parse(input).map_err(|e| {
                AppError::AuthorizationCallback(format!("Failed to parse callback URL: {}", e))
            })?;
            return Ok(Self::from_url(&url));
        }

        if input.contains('=') {
            let query = input.trim_start_matches('?');
            let url = Url::parse(&format!("http://localhost/?{}", query)).map_err(|e| {
                AppError::AuthorizationCallback(format!("Failed to parse callback query: {}", e))
            })?;
            return Ok(Self::from_url(&url));
        }

        Ok(Self {
            code: Some(input.to_string()).filter(|code| !code.is_empty()),
            ..Default::default()
        })
    }
}

pub struct GoogleAuth {
    client: ConfiguredClient,
    http_client: reqwest::Client,
    token_endpoint: String,
    redirect_uri: String,
    options: Arc<dyn OptionStore>,
    tokens: TokenStore,
    expiry_margin_secs: i64,
}

impl GoogleAuth {
    pub fn new(
        config: &GoogleConfig,
        credentials: &OAuthCredentials,
        options: Arc<dyn OptionStore>,
    ) -> Result<Self> {
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| AppError::Config(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| AppError::Config(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| AppError::Config(format!("Invalid redirect URL: {}", e)))?;

        // Google expects the client credentials in the form body
        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
            .set_auth_type(AuthType::RequestBody);

        let mut builder = reqwest::ClientBuilder::new().redirect(Policy::none());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
            token_endpoint: config.token_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
            tokens: TokenStore::new(options.clone()),
            options,
            expiry_margin_secs: config.expiry_margin_secs,
        })
    }

    pub(super) fn http_client(&self) -> reqwest::Client {
        self.http_client.clone()
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn token_state(&self) -> Result<TokenState> {
        self.tokens.state(self.expiry_margin_secs)
    }

    /// Build the consent URL and remember its state for the callback.
    pub fn authorization_url(&self) -> Result<Url> {
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(SHEETS_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("include_granted_scopes", "true")
            .add_extra_param("prompt", "consent")
            .url();

        self.options.set_as(STATE_KEY, csrf_token.secret())?;

        Ok(auth_url)
    }

    fn authorization_required(&self) -> Result<AppError> {
        let url = self.authorization_url()?;
        info!(%url, "Google authorization required");
        Ok(AppError::AuthorizationRequired {
            url: url.to_string(),
        })
    }

    /// Exchange a one-time authorization code for a new token record
    #[instrument(name = "Exchanging authorization code", skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| self.token_error(e))?;

        Ok(Self::parse_tokens(&token_result, None))
    }

    /// Mint a new access token. The refresh token is kept unless Google rotates it.
    #[instrument(name = "Refreshing Google access token", skip_all)]
    pub async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord> {
        let refresh_token = record.refresh_token.as_deref().ok_or_else(|| {
            AppError::TokenExchange {
                endpoint: self.token_endpoint.clone(),
                message: "No refresh token stored".to_string(),
            }
        })?;

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| self.token_error(e))?;

        Ok(Self::parse_tokens(&token_result, Some(refresh_token)))
    }

    /// Parse token response into a record issued now
    ///
    /// If `fallback_refresh_token` is provided, it will be used if the token response
    /// doesn't include a refresh token (common in refresh flows).
    fn parse_tokens(
        token_result: &BasicTokenResponse,
        fallback_refresh_token: Option<&str>,
    ) -> TokenRecord {
        let refresh_token = token_result
            .refresh_token()
            .map(|token| token.secret().clone())
            .or_else(|| fallback_refresh_token.map(str::to_string));

        let expires_in = token_result
            .expires_in()
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(DEFAULT_EXPIRES_IN);

        TokenRecord::new(
            token_result.access_token().secret().clone(),
            refresh_token,
            expires_in,
        )
    }

    fn token_error<RE>(&self, err: RequestTokenError<RE, BasicErrorResponse>) -> AppError
    where
        RE: std::error::Error + 'static,
    {
        let message = match err {
            RequestTokenError::ServerResponse(response) => {
                format!("server returned {}", response)
            }
            RequestTokenError::Request(e) => format!("request failed: {}", e),
            RequestTokenError::Parse(e, _) => format!("invalid token response: {}", e),
            RequestTokenError::Other(message) => message,
        };

        AppError::TokenExchange {
            endpoint: self.token_endpoint.clone(),
            message,
        }
    }

    /// Complete the out-of-band flow with the parameters Google redirected back with.
    #[instrument(name = "Handling authorization callback", skip_all)]
    pub async fn handle_callback(&self, params: &CallbackParams) -> Result<TokenRecord> {
        if let Some(error) = &params.error {
            return Err(AppError::AuthorizationCallback(format!(
                "Authorization was not granted: {}",
                error
            )));
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AppError::AuthorizationCallback("Authorization code missing".into()))?;

        self.verify_state(params.state.as_deref())?;

        let record = self.exchange_code(code).await?;
        self.tokens.save(&record)?;
        self.options.remove(STATE_KEY)?;

        info!("Google authorization complete");
        Ok(record)
    }

    fn verify_state(&self, received: Option<&str>) -> Result<()> {
        let expected: Option<String> = self.options.get_as(STATE_KEY)?;

        match (expected, received) {
            (Some(expected), Some(received)) if expected != received => Err(
                AppError::AuthorizationCallback("CSRF state mismatch".to_string()),
            ),
            (Some(_), None) => Err(AppError::AuthorizationCallback(
                "No state in callback".to_string(),
            )),
            (None, Some(_)) => {
                warn!("No authorization in progress, accepting callback without state check");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Get a usable access token, refreshing it when expired
    ///
    /// When no token can be obtained without the operator, returns
    /// `AuthorizationRequired` carrying the URL to visit.
    pub async fn get_valid_token(&self) -> Result<TokenRecord> {
        match self.token_state()? {
            TokenState::Valid(record) => {
                debug!("Using stored Google token");
                Ok(record)
            }
            TokenState::Expired(record) if record.refresh_token.is_some() => {
                debug!("Access token expired, refreshing...");
                let refreshed = self.refresh(&record).await?;
                self.tokens.save(&refreshed)?;
                debug!("Token refresh successful");
                Ok(refreshed)
            }
            TokenState::Expired(_) => {
                debug!("Access token expired and no refresh token stored");
                Err(self.authorization_required()?)
            }
            TokenState::NoToken => {
                debug!("No stored Google token");
                Err(self.authorization_required()?)
            }
        }
    }
}

/// Serve the redirect URI once and return the callback parameters.
///
/// Requests to other paths (favicons and the like) get a 404 and are skipped.
pub fn wait_for_callback(redirect_uri: &str) -> Result<CallbackParams> {
    let redirect = Url::parse(redirect_uri)
        .map_err(|e| AppError::Config(format!("Invalid redirect URL: {}", e)))?;
    let port = redirect.port_or_known_default().ok_or_else(|| {
        AppError::Config(format!("Redirect URL has no port: {}", redirect_uri))
    })?;

    let bind_addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&bind_addr)
        .map_err(|e| AppError::AuthorizationCallback(format!("Failed to bind to {}: {}", bind_addr, e)))?;

    info!(addr = %bind_addr, "Waiting for authorization...");

    loop {
        let request = server.recv().map_err(|e| {
            AppError::AuthorizationCallback(format!("Failed to receive request: {}", e))
        })?;

        let url = redirect.join(request.url()).map_err(|e| {
            AppError::AuthorizationCallback(format!("Failed to parse callback URL: {}", e))
        })?;

        if url.path() != redirect.path() {
            debug!(path = url.path(), "Ignoring request outside the redirect path");
            request
                .respond(Response::from_string("Not found").with_status_code(404))
                .map_err(|e| {
                    AppError::AuthorizationCallback(format!("Failed to send response: {}", e))
                })?;
            continue;
        }

        let params = CallbackParams::from_url(&url);
        let body = match params.code {
            Some(_) => "Authentication successful! You can close this window.",
            None => "Authentication failed, check the terminal for details.",
        };
        request.respond(Response::from_string(body)).map_err(|e| {
            AppError::AuthorizationCallback(format!("Failed to send response: {}", e))
        })?;

        return Ok(params);
    }
}
