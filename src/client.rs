use crate::config::BackendConfig;
use crate::cookie_jar::SessionCookies;
use crate::errors::AuthError;
use crate::models::{Credentials, Profile, TokenGrant};
use crate::traits::{AuthBackend, TokenStore};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// HTTP transport for the admin backend
///
/// Every mutating request carries whatever token is in the slot at send time.
pub struct BackendClient {
    client: Client,
    base_url: Url,
    config: BackendConfig,
    token_store: Arc<dyn TokenStore>,
    cookies: SessionCookies,
}

impl BackendClient {
    /// Client whose session cookies live only as long as the process
    pub fn new(config: BackendConfig, token_store: Arc<dyn TokenStore>) -> Result<Self, AuthError> {
        let base_url = Url::parse(&config.base_url)?;
        let cookies = SessionCookies::in_memory(base_url.join(&config.endpoints.profile)?);
        Self::build(config, base_url, token_store, cookies)
    }

    /// Client that saves session cookies to `cookie_file` after every response
    pub fn with_cookie_file(
        config: BackendConfig,
        token_store: Arc<dyn TokenStore>,
        cookie_file: PathBuf,
    ) -> Result<Self, AuthError> {
        let base_url = Url::parse(&config.base_url)?;
        let cookies =
            SessionCookies::with_file(base_url.join(&config.endpoints.profile)?, cookie_file)?;
        Self::build(config, base_url, token_store, cookies)
    }

    fn build(
        config: BackendConfig,
        base_url: Url,
        token_store: Arc<dyn TokenStore>,
        cookies: SessionCookies,
    ) -> Result<Self, AuthError> {
        let client = Client::builder()
            .user_agent(format!("kbadmin/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .cookie_provider(cookies.jar())
            .build()?;

        Ok(BackendClient {
            client,
            base_url,
            config,
            token_store,
            cookies,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, AuthError> {
        Ok(self.base_url.join(path)?)
    }

    /// Builds a request, attaching the current token on mutating methods
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AuthError> {
        let mutating = is_mutating(&method);
        let mut builder = self
            .client
            .request(method, self.url(path)?)
            .header("Accept", "application/json");

        if mutating {
            match self.token_store.load() {
                Ok(Some(token)) => {
                    builder = builder.header(self.config.token_header.as_str(), token.expose_secret())
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Could not read security token: {}", e),
            }
        }

        Ok(builder)
    }

    /// Sends the request and saves whatever cookies the backend set
    async fn send(&self, builder: RequestBuilder) -> Result<Response, AuthError> {
        let response = builder.send().await?;
        if let Err(e) = self.cookies.persist() {
            tracing::warn!("Failed to save session cookies: {}", e);
        }
        Ok(response)
    }

    /// Send an arbitrary request and return the JSON body (Null when empty)
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, AuthError> {
        let mut builder = self.request(method, path)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = check_status(self.send(builder).await?).await?;
        read_json(response).await
    }

    /// Pull the token candidates out of a login or refresh response
    async fn read_grant(&self, response: Response) -> Result<TokenGrant, AuthError> {
        let header_token = header_token(response.headers(), &self.config.token_header);
        let body = read_json(response).await?;
        Ok(TokenGrant {
            header_token,
            body_token: body_token(&body, &self.config.token_body_field),
        })
    }
}

impl AuthBackend for BackendClient {
    async fn fetch_profile(&self) -> Result<Option<Profile>, AuthError> {
        let builder = self.request(Method::GET, &self.config.endpoints.profile)?;
        let response = check_status(self.send(builder).await?).await?;
        let text = response.text().await?;
        Ok(parse_profile(&text))
    }

    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, AuthError> {
        let builder = self
            .request(Method::POST, &self.config.endpoints.login)?
            .json(credentials);
        self.read_grant(check_status(self.send(builder).await?).await?)
            .await
    }

    async fn refresh(&self) -> Result<TokenGrant, AuthError> {
        let builder = self.request(Method::POST, &self.config.endpoints.refresh)?;
        self.read_grant(check_status(self.send(builder).await?).await?)
            .await
    }

    async fn logout_remote(&self) -> Result<(), AuthError> {
        let builder = self.request(Method::POST, &self.config.endpoints.logout)?;
        let result = match self.send(builder).await {
            Ok(response) => check_status(response).await.map(drop),
            Err(e) => Err(e),
        };

        if let Err(e) = self.cookies.clear() {
            tracing::warn!("Failed to delete saved session cookies: {}", e);
        }
        result
    }
}

/// Profile from a success body. The status already proved the session, so a
/// body that does not describe a profile yields None rather than an error.
fn parse_profile(text: &str) -> Option<Profile> {
    if text.trim().is_empty() {
        return None;
    }

    let body: Value = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Profile response is not JSON: {}", e);
            return None;
        }
    };

    // Some deployments wrap payloads as {"data": {...}}
    let payload = match body.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => body,
    };
    if !payload.is_object() {
        tracing::warn!("Profile response is not an object");
        return None;
    }

    match serde_json::from_value(payload) {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::warn!("Could not read profile from response: {}", e);
            None
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

async fn check_status(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AuthError::HttpStatus {
        status: status.as_u16(),
        message,
    })
}

async fn read_json(response: Response) -> Result<Value, AuthError> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Token from the named response header, if present and readable
pub fn header_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Token at a dotted path inside a JSON body, e.g. "data.csrfToken"
pub fn body_token(body: &Value, path: &str) -> Option<String> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(body, |value, segment| value.get(segment))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
