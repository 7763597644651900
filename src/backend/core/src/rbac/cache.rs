//! Client-side permission cache.
//!
//! The UI layer cannot query the store directly; it fetches the resolver's
//! output once per session through the permissions endpoint and gates
//! controls against this cached snapshot. Because the cache cannot assume
//! the server-side legacy fallback already happened (the fetch may fail, or
//! an older server may return an empty set for a legacy-only user), it
//! recomputes the registry fallback independently.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::models::LegacyRole;
use super::registry;

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot (wire shape)
// ═══════════════════════════════════════════════════════════════════════════════

/// The JSON shape of the permissions endpoint:
/// `{ "permissions": [...], "roles": [...], "userId": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSnapshot {
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
    pub user_id: Uuid,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Cache
// ═══════════════════════════════════════════════════════════════════════════════

/// An immutable per-session view of a user's permissions and roles.
///
/// Exposes the same query shape as the resolver, operating over the cached
/// sets instead of live store reads.
#[derive(Debug, Clone)]
pub struct PermissionCache {
    user_id: Uuid,
    permissions: HashSet<String>,
    roles: HashSet<String>,
}

impl PermissionCache {
    /// Build from a fetched snapshot.
    ///
    /// When the snapshot carries an empty permission set and a legacy role
    /// is known, the registry fallback is recomputed here, mirroring the
    /// resolver's two-branch strategy.
    pub fn from_snapshot(snapshot: PermissionSnapshot, legacy_role: Option<LegacyRole>) -> Self {
        if snapshot.permissions.is_empty() {
            if let Some(legacy) = legacy_role {
                return Self::from_legacy(snapshot.user_id, legacy);
            }
        }

        Self {
            user_id: snapshot.user_id,
            permissions: snapshot.permissions.into_iter().collect(),
            roles: snapshot.roles.into_iter().collect(),
        }
    }

    /// Build from the legacy role alone (used when the fetch itself failed).
    pub fn from_legacy(user_id: Uuid, role: LegacyRole) -> Self {
        Self {
            user_id,
            permissions: registry::permissions_for(role.as_str())
                .into_iter()
                .map(|code| code.0)
                .collect(),
            roles: HashSet::from([role.as_str().to_string()]),
        }
    }

    /// An empty cache (anonymous or fetch failed with no legacy role known).
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            permissions: HashSet::new(),
            roles: HashSet::new(),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn permissions(&self) -> &HashSet<String> {
        &self.permissions
    }

    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries (same shape as the resolver)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(code)
    }

    pub fn has_any_permission(&self, codes: &[&str]) -> bool {
        codes.iter().any(|code| self.permissions.contains(*code))
    }

    pub fn has_all_permissions(&self, codes: &[&str]) -> bool {
        codes.iter().all(|code| self.permissions.contains(*code))
    }

    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.contains(role_name)
    }

    /// Fixed convenience check: SUPER_ADMIN or ADMIN.
    pub fn is_admin(&self) -> bool {
        self.has_role("SUPER_ADMIN") || self.has_role("ADMIN")
    }

    /// Fixed convenience check: SUPER_ADMIN, ADMIN, or STAFF.
    pub fn is_staff(&self) -> bool {
        self.is_admin() || self.has_role("STAFF")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(permissions: &[&str], roles: &[&str]) -> PermissionSnapshot {
        PermissionSnapshot {
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_snapshot_data_is_used_as_is() {
        let cache = PermissionCache::from_snapshot(
            snapshot(&["users.view", "users.delete"], &["ADMIN"]),
            Some(LegacyRole::Customer),
        );

        assert!(cache.has_permission("users.delete"));
        assert!(cache.has_role("ADMIN"));
        // Legacy CUSTOMER permissions are NOT merged in.
        assert!(!cache.has_permission("requests.create"));
    }

    #[test]
    fn test_empty_snapshot_falls_back_to_legacy() {
        let cache =
            PermissionCache::from_snapshot(snapshot(&[], &[]), Some(LegacyRole::Staff));

        assert!(cache.has_permission("requests.assign"));
        assert!(cache.has_role("STAFF"));
        assert!(cache.is_staff());
        assert!(!cache.is_admin());
    }

    #[test]
    fn test_empty_snapshot_without_legacy_stays_empty() {
        let cache = PermissionCache::from_snapshot(snapshot(&[], &[]), None);
        assert!(!cache.has_permission("requests.view"));
        assert!(cache.roles().is_empty());
        assert!(!cache.is_staff());
    }

    #[test]
    fn test_from_legacy_constructor() {
        let cache = PermissionCache::from_legacy(Uuid::new_v4(), LegacyRole::SuperAdmin);
        assert!(cache.has_permission("config.update"));
        assert!(cache.is_admin());
        assert!(cache.is_staff());
    }

    #[test]
    fn test_query_shape_matches_resolver() {
        let cache = PermissionCache::from_snapshot(
            snapshot(&["chat.view", "chat.respond"], &["STAFF"]),
            None,
        );

        assert!(cache.has_any_permission(&["users.delete", "chat.view"]));
        assert!(!cache.has_any_permission(&["users.delete", "config.update"]));
        assert!(cache.has_all_permissions(&["chat.view", "chat.respond"]));
        assert!(!cache.has_all_permissions(&["chat.view", "users.delete"]));
    }

    #[test]
    fn test_is_admin_role_combinations() {
        for (role, admin, staff) in [
            ("SUPER_ADMIN", true, true),
            ("ADMIN", true, true),
            ("STAFF", false, true),
            ("CUSTOMER", false, false),
        ] {
            let cache = PermissionCache::from_snapshot(snapshot(&["services.view"], &[role]), None);
            assert_eq!(cache.is_admin(), admin, "is_admin for {}", role);
            assert_eq!(cache.is_staff(), staff, "is_staff for {}", role);
        }
    }
}
