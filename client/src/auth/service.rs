//! Core business logic for the session lifecycle.

use crate::auth::models::{LoginRequest, RegisterRequest, TokenPair, User};
use crate::errors::{ServiceError, ServiceResult};
use crate::http::ApiClient;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use validator::Validate;

/// Session service handling login, registration and profile loading.
///
/// Tokens live in the [`ApiClient`] (which injects them into requests); the
/// user profile lives here and is never persisted, only re-fetched when a
/// stored token pair exists.
pub struct SessionService {
    api: Arc<ApiClient>,
    user: RwLock<Option<User>>,
}

impl SessionService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        SessionService {
            api,
            user: RwLock::new(None),
        }
    }

    /// Exchanges credentials for a token pair, then loads the user profile.
    ///
    /// Any failure clears partial auth state before propagating, so a half
    /// logged-in session can never be observed.
    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<TokenPair> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        if let Err(validation_errors) = request.validate() {
            return Err(ServiceError::validation(validation_errors.to_string()));
        }

        match self.login_inner(&request).await {
            Ok(tokens) => Ok(tokens),
            Err(e) => {
                tracing::warn!("login failed for {}: {}", request.username, e);
                self.clear_auth().await;
                Err(e)
            }
        }
    }

    async fn login_inner(&self, request: &LoginRequest) -> ServiceResult<TokenPair> {
        let tokens: TokenPair = self.api.post_public("/auth/jwt/create/", request).await?;
        self.api.set_tokens(tokens.clone()).await?;

        let user: User = self.api.get_json("/auth/users/me/").await?;
        tracing::info!(
            "session established for {} (staff {:?})",
            request.username,
            user.staff_uuid()
        );
        *self.user.write().await = Some(user);

        Ok(tokens)
    }

    /// Creates an account, then immediately logs in with the same
    /// credentials. Returns the registration payload. A login failure after
    /// a successful registration is not rolled back; the account persists
    /// and the error propagates.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ServiceResult<Value> {
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        if let Err(validation_errors) = request.validate() {
            return Err(ServiceError::validation(validation_errors.to_string()));
        }

        let payload: Value = self.api.post_public("/auth/users/", &request).await?;
        self.login(username, password).await?;
        Ok(payload)
    }

    /// Clears tokens and the user profile. No network call is made.
    pub async fn logout(&self) {
        self.clear_auth().await;
    }

    /// Fetches the profile for an already-held token. On failure the auth
    /// state is cleared and the error propagates so the route guard can
    /// redirect to the login page.
    pub async fn fetch_user(&self) -> ServiceResult<User> {
        match self.api.get_json::<User>("/auth/users/me/").await {
            Ok(user) => {
                *self.user.write().await = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                self.clear_auth().await;
                Err(e)
            }
        }
    }

    /// Lazily initializes the session from a persisted token pair. Returns
    /// the loaded user, or `None` when no tokens are stored.
    pub async fn initialize(&self) -> ServiceResult<Option<User>> {
        if !self.api.restore_tokens().await? {
            return Ok(None);
        }
        self.fetch_user().await.map(Some)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.api.has_tokens().await
    }

    pub async fn user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    /// Staff identifier of the current session's user, if any.
    pub async fn staff_uuid(&self) -> Option<String> {
        self.user
            .read()
            .await
            .as_ref()
            .and_then(|u| u.staff_uuid().map(str::to_string))
    }

    pub async fn is_admin(&self) -> bool {
        self.user
            .read()
            .await
            .as_ref()
            .is_some_and(User::is_admin)
    }

    async fn clear_auth(&self) {
        if let Err(e) = self.api.clear_tokens().await {
            tracing::warn!("failed to clear stored tokens: {}", e);
        }
        *self.user.write().await = None;
    }
}
