//! RBAC data models: permission codes, roles, assignments, and grant expansions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Code
// ═══════════════════════════════════════════════════════════════════════════════

/// An atomic capability, identified by a dotted code of the form
/// `category.action`, for example:
/// - `users.delete`
/// - `requests.assign`
/// - `documents.generate`
///
/// Codes are flat and compared by exact string equality; the category is
/// derived from the substring before the first dot and is never stored as
/// authoritative state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(pub String);

impl PermissionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The category portion of the code (everything before the first dot).
    pub fn category(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// The action portion of the code (everything after the first dot).
    pub fn action(&self) -> &str {
        self.0.splitn(2, '.').nth(1).unwrap_or("")
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PermissionCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PermissionCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A permission catalog row: a code plus its human description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub code: PermissionCode,
    pub description: Option<String>,
}

impl Permission {
    pub fn new(code: impl Into<PermissionCode>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: Some(description.into()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Legacy Role
// ═══════════════════════════════════════════════════════════════════════════════

/// The single scalar role retained on user records from before the
/// normalized role/permission graph existed.
///
/// Users who predate normalized RBAC data may carry only this value; the
/// resolver falls back to the registry's static set for it when no
/// normalized assignments exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegacyRole {
    Customer,
    Staff,
    Admin,
    SuperAdmin,
}

impl LegacyRole {
    /// The stable wire name, which doubles as the builtin role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Staff => "STAFF",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Parse a stored scalar value. Unknown values map to `None` so that
    /// corrupt legacy records degrade to "no grants" rather than erroring.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CUSTOMER" => Some(Self::Customer),
            "STAFF" => Some(Self::Staff),
            "ADMIN" => Some(Self::Admin),
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for LegacyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// A named, reusable permission bundle.
///
/// The `name` is the stable identifier (e.g. `ADMIN`) and must not change
/// once referenced by assignments; `display_name` is free to evolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    /// Whether this is a built-in system role (cannot be deleted).
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Create a new role with a fresh identifier.
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            display_name: display_name.into(),
            description: None,
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this as a system role.
    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// A role summary with usage counts, as returned by role listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleOverview {
    pub role: Role,
    /// Number of permissions granted to the role.
    pub permission_count: u64,
    /// Number of users currently assigned the role.
    pub assignment_count: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role Assignment
// ═══════════════════════════════════════════════════════════════════════════════

/// A fact that a user holds a role.
///
/// At most one assignment exists per (user, role) pair; re-assigning the
/// same role is a no-op, not a duplicate row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role_id: Uuid,
    /// Who granted this assignment (None for system-initiated grants).
    pub granted_by: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(user_id: Uuid, role_id: Uuid) -> Self {
        Self {
            user_id,
            role_id,
            granted_by: None,
            granted_at: Utc::now(),
        }
    }

    /// Record who granted this assignment.
    pub fn granted_by(mut self, user_id: Uuid) -> Self {
        self.granted_by = Some(user_id);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Grant Expansion
// ═══════════════════════════════════════════════════════════════════════════════

/// One assignment expanded to its role and the permission codes the role
/// grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
    pub permissions: Vec<PermissionCode>,
}

/// Everything the resolver needs to know about one user, fetched from the
/// store in a single query shape (assignments with nested role and
/// permission expansion, plus the legacy scalar role).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGrants {
    pub legacy_role: Option<LegacyRole>,
    pub grants: Vec<RoleGrant>,
}

impl UserGrants {
    /// Whether any normalized RBAC data exists for the user.
    pub fn has_rbac_data(&self) -> bool {
        !self.grants.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
