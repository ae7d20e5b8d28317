//! Per-request context handed explicitly to services.

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::tracing::RequestId;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::Method};
use std::convert::Infallible;
use strum::Display;

/// Closed set of request kinds, resolved once from the HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RequestKind {
    Read,
    Create,
    Update,
    Delete,
}

impl RequestKind {
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::POST => RequestKind::Create,
            Method::PUT | Method::PATCH => RequestKind::Update,
            Method::DELETE => RequestKind::Delete,
            _ => RequestKind::Read,
        }
    }

    pub fn is_read(self) -> bool {
        matches!(self, RequestKind::Read)
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: Option<AuthUser>,
    pub kind: RequestKind,
    pub request_id: Option<RequestId>,
}

impl RequestContext {
    pub fn anonymous(kind: RequestKind) -> Self {
        Self {
            caller: None,
            kind,
            request_id: None,
        }
    }

    pub fn for_user(user: AuthUser, kind: RequestKind) -> Self {
        Self {
            caller: Some(user),
            kind,
            request_id: None,
        }
    }

    /// The authenticated caller, or `Unauthorized` for anonymous requests
    pub fn caller(&self) -> Result<&AuthUser, ServiceError> {
        self.caller.as_ref().ok_or_else(|| {
            ServiceError::Unauthorized("Authentication credentials were not provided".to_string())
        })
    }

    pub fn is_staff(&self) -> bool {
        self.caller.as_ref().is_some_and(|user| user.is_staff)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            caller: parts.extensions.get::<AuthUser>().cloned(),
            kind: RequestKind::from_method(&parts.method),
            request_id: parts.extensions.get::<RequestId>().cloned(),
        })
    }
}
