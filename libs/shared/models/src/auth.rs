use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Authenticated caller, as extracted from a validated token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Parse the role claim into a typed role, if it names one we know.
    pub fn auth_role(&self) -> Option<AuthRole> {
        self.role.as_deref().and_then(AuthRole::parse)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.auth_role(), Some(AuthRole::Admin))
    }
}

/// Roles issued by the identity provider. Frontline workers authenticate
/// like everyone else but hold no appointment-scoped permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthRole {
    Patient,
    Doctor,
    Admin,
    Frontline,
}

impl AuthRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "patient" => Some(AuthRole::Patient),
            "doctor" => Some(AuthRole::Doctor),
            "admin" => Some(AuthRole::Admin),
            "frontline" => Some(AuthRole::Frontline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthRole::Patient => "patient",
            AuthRole::Doctor => "doctor",
            AuthRole::Admin => "admin",
            AuthRole::Frontline => "frontline",
        }
    }
}

impl fmt::Display for AuthRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
