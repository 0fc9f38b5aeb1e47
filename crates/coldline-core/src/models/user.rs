use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{Fields, STORE_FIELD, ZONE_FIELD};

/// Collection holding one profile document per signed-in identity
pub const USERS_COLLECTION: &str = "users";
pub const ROLE_FIELD: &str = "role";
pub const PIN_FIELD: &str = "pin";
pub const NAME_FIELD: &str = "nombre";
pub const PHONE_FIELD: &str = "telefono";

/// Authorization role of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    /// Store manager ("gerente")
    Manager,
    /// Zone manager ("gerentezona")
    ZoneManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Manager => "gerente",
            Role::ZoneManager => "gerentezona",
        }
    }

    /// Parse a stored role, degrading anything unrecognised to `User`.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Role::User)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "usuario" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "gerente" => Ok(Role::Manager),
            "gerentezona" => Ok(Role::ZoneManager),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

/// Store/zone a manager profile is bound to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileScope {
    pub store: Option<String>,
    pub zone: Option<String>,
}

/// Signed-in identity as reported by the auth session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub role: Role,
    pub scope: ProfileScope,
    pub pin: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

impl UserProfile {
    /// Profile used when no stored profile exists for `uid`.
    pub fn least_privilege(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            role: Role::User,
            scope: ProfileScope::default(),
            pin: None,
            display_name: None,
            phone: None,
        }
    }

    /// Read a stored profile. Never fails: missing or unrecognised values
    /// degrade to least privilege, and scope is only kept for manager roles.
    pub fn from_fields(uid: &str, fields: &Fields) -> Self {
        let text = |field: &str| match fields.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let role = text(ROLE_FIELD)
            .map(|r| Role::parse_lenient(&r))
            .unwrap_or(Role::User);

        let scope = match role {
            Role::Manager | Role::ZoneManager => ProfileScope {
                store: text(STORE_FIELD),
                zone: text(ZONE_FIELD),
            },
            Role::User | Role::Admin => ProfileScope::default(),
        };

        Self {
            uid: uid.to_string(),
            role,
            scope,
            pin: text(PIN_FIELD),
            display_name: text(NAME_FIELD),
            phone: text(PHONE_FIELD),
        }
    }
}
