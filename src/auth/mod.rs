//! Bearer-token authentication and router access policies.
//!
//! Identity is issued elsewhere; this service only validates HS256 JWTs and
//! turns their claims into an [`AuthUser`]. A request without an
//! `Authorization` header proceeds anonymously, and the [`AccessPolicy`]
//! attached to each router decides whether that is acceptable.

use crate::config::AppConfig;
use crate::context::RequestKind;
use crate::entities::user;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub mod permissions;

pub use permissions::{consts, AccessPolicy};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,              // Subject (user ID)
    pub username: String,         // Login name
    pub is_staff: bool,           // Staff flag
    pub permissions: Vec<String>, // Explicit permission codes
    pub jti: String,              // JWT ID
    pub iat: i64,                 // Issued at time
    pub exp: i64,                 // Expiration time
    pub iss: String,              // Issuer
    pub aud: String,              // Audience
}

/// Authenticated caller extracted from a validated token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub is_staff: bool,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if the user has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthUser {
            user_id,
            username: claims.username,
            is_staff: claims.is_staff,
            permissions: claims.permissions,
        })
    }
}

/// Token validation settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_lifetime: Duration,
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            issuer: cfg.auth_issuer.clone(),
            audience: cfg.auth_audience.clone(),
            token_lifetime: Duration::from_secs(cfg.jwt_expiration as u64),
        }
    }
}

pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Signs an access token for `user` with the given permission codes.
    pub fn issue_token(
        &self,
        user: &user::Model,
        permissions: &[String],
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_lifetime)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            is_staff: user.is_staff,
            permissions: permissions.to_vec(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Resolves the caller from request headers.
    ///
    /// `Ok(None)` means no credentials were presented.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<AuthUser>, AuthError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidToken)?;

        let user = AuthUser::try_from(self.validate_token(token)?)?;
        Ok(Some(user))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication credentials were not provided".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::TokenCreation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                msg.clone(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_FORBIDDEN",
                "You do not have permission to perform this action".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Attaches the caller to request extensions when a valid token is presented.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth.authenticate(request.headers()) {
        Ok(Some(user)) => {
            debug!(user_id = user.user_id, "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Enforces an [`AccessPolicy`] for the wrapped routes.
pub async fn policy_middleware(
    State(policy): State<AccessPolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let kind = RequestKind::from_method(request.method());
    policy.check(kind, request.extensions().get::<AuthUser>())?;
    Ok(next.run(request).await)
}

pub trait AuthRouterExt {
    fn with_policy(self, policy: AccessPolicy) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_policy(self, policy: AccessPolicy) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            policy,
            policy_middleware,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: "test_secret_that_is_long_enough_for_hs256_signatures_in_unit_tests".into(),
            issuer: "storefront-api".into(),
            audience: "storefront-clients".into(),
            token_lifetime: Duration::from_secs(600),
        })
    }

    fn staff_user() -> user::Model {
        user::Model {
            id: 42,
            username: "admin".into(),
            email: "admin@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            is_staff: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_round_trip_into_auth_user() {
        let auth = service();
        let token = auth
            .issue_token(&staff_user(), &[consts::CUSTOMERS_VIEW_HISTORY.to_string()])
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let user = auth.authenticate(&headers).unwrap().unwrap();
        assert_eq!(user.user_id, 42);
        assert!(user.is_staff);
        assert!(user.has_permission(consts::CUSTOMERS_VIEW_HISTORY));
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert_matches!(service().authenticate(&HeaderMap::new()), Ok(None));
    }

    #[test]
    fn malformed_or_foreign_tokens_are_rejected() {
        let auth = service();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_matches!(auth.authenticate(&headers), Err(AuthError::InvalidToken));

        let other = AuthService::new(AuthConfig {
            jwt_secret: "a_completely_different_secret_that_is_also_long_enough_to_sign".into(),
            ..service().config.clone()
        });
        let token = other.issue_token(&staff_user(), &[]).unwrap();
        assert_matches!(auth.validate_token(&token), Err(AuthError::InvalidToken));
    }
}
