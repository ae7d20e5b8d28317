//! Permission codes and per-router access policies.

use super::{AuthError, AuthUser};
use crate::context::RequestKind;

/// Permission string constants carried in token claims
pub mod consts {
    /// View another customer's order history
    pub const CUSTOMERS_VIEW_HISTORY: &str = "customers:view_history";
}

/// Access rule attached to a router with [`super::AuthRouterExt::with_policy`].
///
/// Evaluated once per request against the [`RequestKind`] derived from the
/// HTTP method and the (optional) authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Anyone, including anonymous callers
    AllowAny,
    /// Any authenticated caller
    Authenticated,
    /// Reads are public; writes require staff
    AdminOrReadOnly,
    /// Staff only, for every kind of request
    Staff,
    /// Authenticated callers may read and create; updates and deletes need staff
    StaffWrites,
    /// Caller must hold the given permission code (staff always pass)
    Permission(&'static str),
}

impl AccessPolicy {
    pub fn check(self, kind: RequestKind, caller: Option<&AuthUser>) -> Result<(), AuthError> {
        match self {
            AccessPolicy::AllowAny => Ok(()),
            AccessPolicy::AdminOrReadOnly if kind.is_read() => Ok(()),
            AccessPolicy::Authenticated => caller.map(|_| ()).ok_or(AuthError::MissingAuth),
            AccessPolicy::AdminOrReadOnly | AccessPolicy::Staff => require_staff(caller),
            AccessPolicy::StaffWrites => match kind {
                RequestKind::Read | RequestKind::Create => {
                    caller.map(|_| ()).ok_or(AuthError::MissingAuth)
                }
                RequestKind::Update | RequestKind::Delete => require_staff(caller),
            },
            AccessPolicy::Permission(code) => {
                let user = caller.ok_or(AuthError::MissingAuth)?;
                if user.is_staff || user.has_permission(code) {
                    Ok(())
                } else {
                    Err(AuthError::InsufficientPermissions)
                }
            }
        }
    }
}

fn require_staff(caller: Option<&AuthUser>) -> Result<(), AuthError> {
    match caller {
        None => Err(AuthError::MissingAuth),
        Some(user) if user.is_staff => Ok(()),
        Some(_) => Err(AuthError::InsufficientPermissions),
    }
}
