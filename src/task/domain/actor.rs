//! Users, roles and the acting identity supplied by the identity collaborator.

use super::{DepartmentId, ParseTaskEnumError, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Organisational role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Organisation-wide administrator.
    Admin,
    /// Head of one or more departments.
    HeadOfDepartment,
    /// Regular staff member.
    Employee,
}

impl Role {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::HeadOfDepartment => "HEAD_OF_DEPARTMENT",
            Self::Employee => "EMPLOYEE",
        }
    }

    /// Returns `true` when the role may raise requests on tasks it does not
    /// hold.
    #[must_use]
    pub const fn may_act_on_any_task(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = ParseTaskEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "HEAD_OF_DEPARTMENT" | "HOD" => Ok(Self::HeadOfDepartment),
            "EMPLOYEE" => Ok(Self::Employee),
            _ => Err(ParseTaskEnumError::new("role", value)),
        }
    }
}

/// Identity of the caller of a workflow operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Actor {
    id: UserId,
    role: Role,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Returns the acting user.
    #[must_use]
    pub const fn id(self) -> UserId {
        self.id
    }

    /// Returns the acting role.
    #[must_use]
    pub const fn role(self) -> Role {
        self.role
    }
}

/// User record read from the directory collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Directory identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address for optional notifications.
    pub email: Option<String>,
    /// Organisational role.
    pub role: Role,
    /// Departments the user belongs to.
    pub departments: BTreeSet<DepartmentId>,
}

impl User {
    /// Creates a user without email or department membership.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            role,
            departments: BTreeSet::new(),
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Adds department membership.
    #[must_use]
    pub fn with_department(mut self, department: DepartmentId) -> Self {
        self.departments.insert(department);
        self
    }

    /// Returns the acting identity for this user.
    #[must_use]
    pub const fn as_actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}
