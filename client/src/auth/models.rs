//! Data structures for authentication-related entities.
//!
//! This module defines models for credentials, the persisted token pair and
//! the user profile returned by the backend, used for data transfer and
//! internal representation within the authentication flow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Login request payload
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Registration request payload
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Access/refresh token pair as returned by `POST /auth/jwt/create/`.
///
/// This is also the exact shape persisted by the token store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Token refresh request
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Token refresh response
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// User record returned by `GET /auth/users/me/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Profile sub-record carrying the role and the staff identifier used to
/// filter the "my jobs" view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_uuid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Staff identifier from the profile, if any.
    pub fn staff_uuid(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.staff_uuid.as_deref())
    }

    /// Whether the profile role grants access to admin routes.
    pub fn is_admin(&self) -> bool {
        self.profile
            .as_ref()
            .and_then(|p| p.role.as_deref())
            .is_some_and(|role| role.eq_ignore_ascii_case("admin"))
    }
}
