use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FreightError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

impl Role {
    pub fn can_edit(self) -> bool {
        matches!(self, Role::Admin | Role::Operator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
        }
    }
}

impl FromStr for Role {
    type Err = FreightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "viewer" => Ok(Role::Viewer),
            other => Err(FreightError::ValidationFailure(format!(
                "unknown role `{other}` (expected admin, operator or viewer)"
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored at `users/{uid}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub company: String,
}

/// The signed-in identity, passed explicitly to every action that needs one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub profile: UserProfile,
}

impl Session {
    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn can_edit(&self) -> bool {
        self.profile.role.can_edit()
    }

    /// Name written on comments.
    pub fn author_label(&self) -> &str {
        if self.profile.display_name.trim().is_empty() {
            &self.profile.email
        } else {
            &self.profile.display_name
        }
    }
}

/// The session, if it exists and may change shipment data.
pub fn require_editor(session: Option<&Session>) -> Result<&Session> {
    match session {
        None => Err(FreightError::PermissionDenied("sign in first".into())),
        Some(s) if !s.can_edit() => Err(FreightError::PermissionDenied(format!(
            "role `{}` is read-only",
            s.role()
        ))),
        Some(s) => Ok(s),
    }
}
