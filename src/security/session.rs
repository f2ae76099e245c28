use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::security::token::{TokenError, TokenService};
use crate::store::{CredentialStore, Role};

/// Per-request authorization state. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub authenticated: bool,
    pub user_id: Option<i64>,
    pub role: Option<Role>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
            role: None,
        }
    }

    pub fn authenticated(user_id: i64, role: Role) -> Self {
        Self {
            authenticated: true,
            user_id: Some(user_id),
            role: Some(role),
        }
    }

    /// The caller's id, if the session is authenticated.
    pub fn principal(&self) -> Option<i64> {
        if self.authenticated {
            self.user_id
        } else {
            None
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.authenticated && self.role == Some(role)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Why a presented credential did not produce a session.
#[derive(Debug)]
pub enum Rejection {
    Token(TokenError),
    UnknownUser(i64),
}

/// Outcome of resolving a credential, before collapsing to a context.
#[derive(Debug)]
pub enum Resolution {
    NoCredential,
    Rejected(Rejection),
    Authenticated(SessionContext),
}

impl Resolution {
    /// Absent and rejected credentials both become the anonymous context.
    pub fn into_context(self) -> SessionContext {
        match self {
            Resolution::Authenticated(context) => context,
            Resolution::NoCredential | Resolution::Rejected(_) => SessionContext::anonymous(),
        }
    }
}

/// Turns a raw `Authorization` value into a [`SessionContext`].
#[derive(Debug, Clone)]
pub struct SessionResolver {
    tokens: Arc<TokenService>,
    credentials: Arc<CredentialStore>,
}

impl SessionResolver {
    pub fn new(tokens: Arc<TokenService>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            tokens,
            credentials,
        }
    }

    /// Never fails: invalid credentials fall back to an anonymous session.
    pub fn resolve(&self, raw_credential: Option<&str>) -> SessionContext {
        self.resolve_detailed(raw_credential).into_context()
    }

    pub fn resolve_detailed(&self, raw_credential: Option<&str>) -> Resolution {
        let Some(token) = raw_credential.map(strip_bearer).filter(|t| !t.is_empty()) else {
            return Resolution::NoCredential;
        };

        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(reason = %err, "credential rejected, continuing anonymously");
                return Resolution::Rejected(Rejection::Token(err));
            }
        };

        match self.credentials.find_by_id(claims.user_id) {
            Some(identity) => {
                Resolution::Authenticated(SessionContext::authenticated(identity.id, identity.role))
            }
            None => {
                debug!(user_id = claims.user_id, "token subject not registered, continuing anonymously");
                Resolution::Rejected(Rejection::UnknownUser(claims.user_id))
            }
        }
    }
}

fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim_start();
    raw.strip_prefix("Bearer ").unwrap_or(raw).trim()
}
