//! The compiled-in permission registry: the permission catalog, category
//! labels, and the builtin roles with their default permission sets.
//!
//! Atrium ships with four built-in roles:
//!
//! | Role        | Description                                                 |
//! |-------------|-------------------------------------------------------------|
//! | SUPER_ADMIN | Full access, including site configuration and role editing  |
//! | ADMIN       | Full operational access; cannot edit roles or site config   |
//! | STAFF       | Work service requests, documents, and support chat          |
//! | CUSTOMER    | Self-service: own requests, documents, invoices, and chat   |
//!
//! The registry is process-wide immutable data with no lifecycle. It is also
//! the fallback source of truth for users who predate normalized RBAC data:
//! the resolver consults [`permissions_for`] when a user has a legacy scalar
//! role and no role assignments.

use std::collections::{BTreeMap, HashSet};

use super::models::{LegacyRole, Permission, PermissionCode, Role};

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// Every permission code the platform defines, with its description.
///
/// Codes are the only cross-system string contract besides role names and
/// must remain stable once referenced by any stored grant.
pub const CATALOG: &[(&str, &str)] = &[
    ("users.view", "View user accounts"),
    ("users.create", "Create user accounts"),
    ("users.update", "Update user accounts"),
    ("users.delete", "Delete user accounts"),
    ("users.export", "Export user data"),
    ("services.view", "View the service catalog"),
    ("services.create", "Create catalog services"),
    ("services.update", "Update catalog services"),
    ("services.delete", "Delete catalog services"),
    ("requests.view", "View service requests"),
    ("requests.create", "Submit service requests"),
    ("requests.update", "Update service requests"),
    ("requests.assign", "Assign service requests to staff"),
    ("requests.status", "Change service request status"),
    ("subscriptions.view", "View subscriptions"),
    ("subscriptions.create", "Create subscriptions"),
    ("subscriptions.update", "Update subscriptions"),
    ("invoices.view", "View invoices"),
    ("invoices.create", "Create invoices"),
    ("documents.view", "View documents"),
    ("documents.generate", "Generate documents from templates"),
    ("documents.template", "Manage document templates"),
    ("chat.view", "View support chat sessions"),
    ("chat.respond", "Respond in support chat sessions"),
    ("roles.view", "View roles and permissions"),
    ("roles.manage", "Create, edit, and assign roles"),
    ("config.view", "View site configuration"),
    ("config.update", "Update site configuration"),
    ("audit.view", "View the audit trail"),
];

/// Display labels for permission categories (the substring before the first
/// dot of a code). Purely presentational; categories are derived from codes,
/// never stored.
pub const CATEGORIES: &[(&str, &str)] = &[
    ("users", "User Management"),
    ("services", "Service Catalog"),
    ("requests", "Service Requests"),
    ("subscriptions", "Subscriptions"),
    ("invoices", "Billing"),
    ("documents", "Documents"),
    ("chat", "Support Chat"),
    ("roles", "Roles & Permissions"),
    ("config", "Site Configuration"),
    ("audit", "Audit Trail"),
];

/// Look up the display label for a category.
pub fn category_label(category: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, label)| *label)
}

/// The full catalog as `Permission` values (used for seeding and listings).
pub fn catalog() -> Vec<Permission> {
    CATALOG
        .iter()
        .map(|(code, description)| Permission::new(*code, *description))
        .collect()
}

/// Group a permission listing by derived category, for display.
pub fn group_by_category(permissions: Vec<Permission>) -> BTreeMap<String, Vec<Permission>> {
    let mut grouped: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
    for permission in permissions {
        grouped
            .entry(permission.code.category().to_string())
            .or_default()
            .push(permission);
    }
    grouped
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builtin Roles
// ═══════════════════════════════════════════════════════════════════════════════

/// Permissions reserved to SUPER_ADMIN.
const SUPER_ADMIN_ONLY: &[&str] = &["roles.manage", "config.update"];

/// Default permission set for STAFF.
const STAFF_PERMISSIONS: &[&str] = &[
    "users.view",
    "services.view",
    "requests.view",
    "requests.update",
    "requests.assign",
    "requests.status",
    "subscriptions.view",
    "invoices.view",
    "documents.view",
    "documents.generate",
    "chat.view",
    "chat.respond",
];

/// Default permission set for CUSTOMER.
const CUSTOMER_PERMISSIONS: &[&str] = &[
    "services.view",
    "requests.view",
    "requests.create",
    "subscriptions.view",
    "invoices.view",
    "documents.view",
    "chat.view",
];

/// Built-in role templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinRole {
    Customer,
    Staff,
    Admin,
    SuperAdmin,
}

impl BuiltinRole {
    /// Get the stable role name (shared with [`LegacyRole`] wire names).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Staff => "STAFF",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Get the human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Staff => "Staff",
            Self::Admin => "Administrator",
            Self::SuperAdmin => "Super Administrator",
        }
    }

    /// Get the description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Customer => "Self-service access to own requests, documents, and billing",
            Self::Staff => "Work service requests, documents, and support chat",
            Self::Admin => "Full operational access without role or site configuration editing",
            Self::SuperAdmin => "Full access to all resources and platform settings",
        }
    }

    /// Return the set of permission codes for this builtin role.
    ///
    /// Sets are explicit enumerations over the catalog; there is no wildcard
    /// expansion anywhere in the platform.
    pub fn permissions(&self) -> HashSet<PermissionCode> {
        match self {
            Self::SuperAdmin => CATALOG
                .iter()
                .map(|(code, _)| PermissionCode::new(*code))
                .collect(),
            Self::Admin => CATALOG
                .iter()
                .filter(|(code, _)| !SUPER_ADMIN_ONLY.contains(code))
                .map(|(code, _)| PermissionCode::new(*code))
                .collect(),
            Self::Staff => STAFF_PERMISSIONS
                .iter()
                .map(|code| PermissionCode::new(*code))
                .collect(),
            Self::Customer => CUSTOMER_PERMISSIONS
                .iter()
                .map(|code| PermissionCode::new(*code))
                .collect(),
        }
    }

    /// Build a full `Role` struct from this builtin role.
    pub fn to_role(&self) -> Role {
        Role::new(self.name(), self.display_name())
            .with_description(self.description())
            .system()
    }

    /// The builtin role matching a legacy scalar role.
    pub fn from_legacy(role: LegacyRole) -> Self {
        match role {
            LegacyRole::Customer => Self::Customer,
            LegacyRole::Staff => Self::Staff,
            LegacyRole::Admin => Self::Admin,
            LegacyRole::SuperAdmin => Self::SuperAdmin,
        }
    }

    /// Return all builtin roles.
    pub fn all() -> [BuiltinRole; 4] {
        [Self::Customer, Self::Staff, Self::Admin, Self::SuperAdmin]
    }
}

/// The exact permission set defined for a role name.
///
/// Returns the empty set, not an error, for unrecognized names. This is the
/// legacy-fallback entry point: resolution consults it when a user has no
/// normalized role assignments.
pub fn permissions_for(role_name: &str) -> HashSet<PermissionCode> {
    BuiltinRole::all()
        .into_iter()
        .find(|role| role.name() == role_name)
        .map(|role| role.permissions())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_super_admin_covers_catalog() {
        let perms = BuiltinRole::SuperAdmin.permissions();
        assert_eq!(perms.len(), CATALOG.len());
        assert!(perms.contains(&PermissionCode::new("config.update")));
        assert!(perms.contains(&PermissionCode::new("roles.manage")));
    }

    #[test]
    fn test_admin_excludes_reserved_permissions() {
        let perms = BuiltinRole::Admin.permissions();
        assert!(perms.contains(&PermissionCode::new("users.delete")));
        assert!(perms.contains(&PermissionCode::new("roles.view")));
        assert!(!perms.contains(&PermissionCode::new("roles.manage")));
        assert!(!perms.contains(&PermissionCode::new("config.update")));
    }

    #[test]
    fn test_staff_permissions() {
        let perms = BuiltinRole::Staff.permissions();
        assert!(perms.contains(&PermissionCode::new("requests.assign")));
        assert!(perms.contains(&PermissionCode::new("chat.respond")));
        assert!(!perms.contains(&PermissionCode::new("users.delete")));
        assert!(!perms.contains(&PermissionCode::new("requests.create")));
    }

    #[test]
    fn test_customer_permissions() {
        let perms = BuiltinRole::Customer.permissions();
        assert!(perms.contains(&PermissionCode::new("requests.create")));
        assert!(perms.contains(&PermissionCode::new("invoices.view")));
        assert!(!perms.contains(&PermissionCode::new("requests.assign")));
        assert!(!perms.contains(&PermissionCode::new("users.view")));
    }

    #[test]
    fn test_permissions_for_unknown_role_is_empty() {
        assert!(permissions_for("NOT_A_ROLE").is_empty());
        assert!(permissions_for("").is_empty());
    }

    #[test]
    fn test_permissions_for_matches_builtin() {
        assert_eq!(permissions_for("STAFF"), BuiltinRole::Staff.permissions());
        assert_eq!(
            permissions_for("SUPER_ADMIN"),
            BuiltinRole::SuperAdmin.permissions()
        );
    }

    #[test]
    fn test_every_catalog_category_has_a_label() {
        for (code, _) in CATALOG {
            let category = PermissionCode::new(*code);
            assert!(
                category_label(category.category()).is_some(),
                "missing label for category of {}",
                code
            );
        }
    }

    #[test]
    fn test_builtin_roles_are_system_roles() {
        for builtin in BuiltinRole::all() {
            let role = builtin.to_role();
            assert!(role.is_system);
            assert_eq!(role.name, builtin.name());
        }
    }

    #[test]
    fn test_group_by_category() {
        let grouped = group_by_category(catalog());
        assert_eq!(grouped.len(), CATEGORIES.len());
        assert_eq!(grouped["users"].len(), 5);
        assert!(grouped["audit"]
            .iter()
            .all(|permission| permission.code.category() == "audit"));
    }

    #[test]
    fn test_catalog_codes_are_unique() {
        let mut seen = HashSet::new();
        for (code, _) in CATALOG {
            assert!(seen.insert(*code), "duplicate catalog code: {}", code);
        }
    }
}
