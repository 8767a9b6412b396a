//! Portal roles

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role the authenticated viewer acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Hr,
    #[serde(alias = "organization")]
    Client,
    #[serde(alias = "staff")]
    Candidate,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Client => "client",
            Role::Candidate => "candidate",
        }
    }

    /// Admin and HR may change ticket status and assignment.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "hr" => Ok(Role::Hr),
            "client" | "organization" => Ok(Role::Client),
            "candidate" | "staff" => Ok(Role::Candidate),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Who sent a ticket message. Tags are matched case-insensitively; tags
/// outside the role set (`system`, integrations) are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SenderType {
    Role(Role),
    Other(String),
}

impl SenderType {
    pub fn as_str(&self) -> &str {
        match self {
            SenderType::Role(role) => role.as_str(),
            SenderType::Other(tag) => tag,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            SenderType::Role(role) => Some(*role),
            SenderType::Other(_) => None,
        }
    }
}

impl From<Role> for SenderType {
    fn from(role: Role) -> Self {
        SenderType::Role(role)
    }
}

impl From<String> for SenderType {
    fn from(value: String) -> Self {
        value
            .parse::<Role>()
            .map(SenderType::Role)
            .unwrap_or(SenderType::Other(value))
    }
}

impl From<SenderType> for String {
    fn from(value: SenderType) -> Self {
        match value {
            SenderType::Role(role) => role.as_str().to_string(),
            SenderType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
