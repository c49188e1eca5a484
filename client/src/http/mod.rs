//! Preconfigured HTTP client for the Timekeeper REST backend.
//!
//! Wraps a [`reqwest::Client`] with the backend base URL, JWT bearer-token
//! injection and the single refresh-and-retry pass performed when an
//! authenticated request comes back 401. The browser original forced a hard
//! redirect to the login page when refresh failed; here that is a
//! forced-logout signal on a watch channel that the routing layer observes.

use crate::auth::models::{RefreshRequest, RefreshResponse, TokenPair};
use crate::auth::store::TokenStore;
use crate::errors::{ServiceError, ServiceResult};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<RwLock<Option<TokenPair>>>,
    store: Arc<dyn TokenStore>,
    logout_tx: watch::Sender<bool>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn TokenStore>) -> ServiceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let (logout_tx, _) = watch::channel(false);

        Ok(ApiClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: Arc::new(RwLock::new(None)),
            store,
            logout_tx,
        })
    }

    /// Channel that flips to `true` when the session is unrecoverable and
    /// the caller must navigate back to the login page.
    pub fn forced_logout(&self) -> watch::Receiver<bool> {
        self.logout_tx.subscribe()
    }

    /// Loads a previously persisted token pair into memory.
    ///
    /// Returns whether a pair was found.
    pub async fn restore_tokens(&self) -> ServiceResult<bool> {
        let stored = self.store.load().await?;
        let found = stored.is_some();
        *self.tokens.write().await = stored;
        Ok(found)
    }

    /// Stores a fresh token pair in memory and in the persistent store.
    pub async fn set_tokens(&self, tokens: TokenPair) -> ServiceResult<()> {
        self.store.save(&tokens).await?;
        *self.tokens.write().await = Some(tokens);
        Ok(())
    }

    /// Drops all tokens from memory and from the persistent store.
    pub async fn clear_tokens(&self) -> ServiceResult<()> {
        *self.tokens.write().await = None;
        self.store.clear().await
    }

    pub async fn has_tokens(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Authenticated GET returning a deserialized JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        let response = self.request_with_retry(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    /// Unauthenticated POST; used by login, registration and token refresh.
    /// No bearer header is attached and no refresh retry is attempted.
    pub async fn post_public<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ServiceResult<T> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ServiceResult<reqwest::Response> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(tokens) = self.tokens.read().await.as_ref() {
            request = request.header("Authorization", format!("JWT {}", tokens.access));
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Sends an authenticated request, refreshing the access token and
    /// replaying the request exactly once if the first attempt returns 401.
    async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ServiceResult<reqwest::Response> {
        let response = self.execute(method.clone(), path, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_status(response).await;
        }

        self.refresh_access_token().await?;

        let retried = self.execute(method, path, body).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            self.force_logout().await;
            return Err(ServiceError::SessionExpired);
        }
        Self::check_status(retried).await
    }

    /// Exchanges the stored refresh token for a new access token. Failure
    /// at any step tears the session down and signals a forced logout.
    async fn refresh_access_token(&self) -> ServiceResult<()> {
        let refresh = match self.tokens.read().await.as_ref() {
            Some(tokens) => tokens.refresh.clone(),
            None => {
                self.force_logout().await;
                return Err(ServiceError::SessionExpired);
            }
        };

        let refreshed: ServiceResult<RefreshResponse> = self
            .post_public("/auth/jwt/refresh/", &RefreshRequest { refresh: refresh.clone() })
            .await;

        match refreshed {
            Ok(RefreshResponse { access }) => {
                let pair = TokenPair { access, refresh };
                self.set_tokens(pair).await?;
                tracing::debug!("access token refreshed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("token refresh failed: {}", e);
                self.force_logout().await;
                Err(ServiceError::SessionExpired)
            }
        }
    }

    async fn force_logout(&self) {
        if let Err(e) = self.clear_tokens().await {
            tracing::warn!("failed to clear stored tokens: {}", e);
        }
        self.logout_tx.send_replace(true);
    }

    async fn check_status(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::status_error(response).await)
        }
    }

    async fn status_error(response: reqwest::Response) -> ServiceError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            ServiceError::unauthorized(format!("{}: {}", status, body))
        } else {
            ServiceError::external_service(format!("{}: {}", status, body))
        }
    }
}
