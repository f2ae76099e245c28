use serde::{Deserialize, Serialize};
use std::fmt;

/// Registered role. `Admiin` is a distinct role with no elevated privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Admiin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Admiin => "admiin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered principal. The secret is accepted from configuration but
/// never written back out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(alias = "password", skip_serializing)]
    pub secret: String,
    pub role: Role,
}

impl Identity {
    pub fn new(id: i64, username: impl Into<String>, secret: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            secret: secret.into(),
            role,
        }
    }
}

// identities registered at startup
pub fn default_identities() -> Vec<Identity> {
    vec![
        Identity::new(1, "user1", "password1", Role::User),
        Identity::new(2, "user2", "password2", Role::User),
        Identity::new(3, "admin", "admin", Role::Admiin),
    ]
}

/// Read-only set of identities, fixed for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    identities: Vec<Identity>,
}

impl CredentialStore {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Identity> {
        self.identities.iter().find(|identity| identity.id == id)
    }

    // plain equality on username and secret
    pub fn authenticate(&self, username: &str, secret: &str) -> Option<&Identity> {
        self.identities
            .iter()
            .find(|identity| identity.username == username && identity.secret == secret)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }
}
