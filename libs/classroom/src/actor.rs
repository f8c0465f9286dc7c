//! Actor context threaded explicitly through every operation

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Role claim carried by an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Tutor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Tutor => "tutor",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "tutor" => Ok(Role::Tutor),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::InvalidArgument(format!("Unknown role: {}", other))),
        }
    }
}

/// Authenticated caller: identity, role and the approval flag minted with the
/// token. The flag is informational; tutor approval is always re-read from the
/// tutor profile before a privileged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub tutor_approved: bool,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            tutor_approved: false,
        }
    }

    pub fn student(id: Uuid) -> Self {
        Self::new(id, Role::Student)
    }

    pub fn tutor(id: Uuid) -> Self {
        Self::new(id, Role::Tutor)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Pick the strongest recognised role out of a token's role list
    pub fn from_roles<S: AsRef<str>>(id: Uuid, roles: &[S], tutor_approved: bool) -> Option<Self> {
        let parsed: Vec<Role> = roles
            .iter()
            .filter_map(|r| r.as_ref().parse().ok())
            .collect();

        let role = [Role::Admin, Role::Tutor, Role::Student]
            .into_iter()
            .find(|candidate| parsed.contains(candidate))?;

        Some(Self {
            id,
            role,
            tutor_approved,
        })
    }

    pub(crate) fn require(&self, role: Role) -> Result<(), CoreError> {
        if self.role == role {
            Ok(())
        } else {
            let reason = match role {
                Role::Student => "Student role required",
                Role::Tutor => "Tutor role required",
                Role::Admin => "Admin role required",
            };
            Err(CoreError::denied(reason))
        }
    }
}
