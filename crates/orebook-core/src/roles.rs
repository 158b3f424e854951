//! Session roles.

use serde::{Deserialize, Serialize};

/// Role attached to an authenticated session.
///
/// `Administrator` and `Investor` gate routes; any other role name from
/// `roles.csv` is an ordinary authenticated role that can still be named in a
/// dataset share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Administrator,
    Investor,
    Other(String),
}

impl Role {
    /// Map a `RoleName` cell to a role. Matching is case-sensitive.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Administrator" => Role::Administrator,
            "Investor" => Role::Investor,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Administrator => "Administrator",
            Role::Investor => "Investor",
            Role::Other(name) => name,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Administrator)
    }

    /// Administrator satisfies every role check.
    pub fn satisfies(&self, allowed: &[Role]) -> bool {
        self.is_admin() || allowed.contains(self)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Role::from_name(&name)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
