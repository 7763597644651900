//! Permission and role resolution.
//!
//! The resolver answers the question: "which permissions and roles does user
//! X effectively hold?" by combining two disjoint sources:
//!
//! 1. **Normalized RBAC data**: role assignments expanded through
//!    role-permission grants, fetched from the [`AuthStore`].
//! 2. **Legacy scalar role**: the single role value retained on user
//!    records from before the normalized graph existed, expanded through the
//!    static [`registry`].
//!
//! Resolution is an ordered fallback, never a merge: normalized data wins
//! whenever it yields any permission; only a user with an empty normalized
//! set and a non-null legacy role gets the registry's static set. This keeps
//! behavior predictable while both data shapes coexist indefinitely, since
//! some users may never receive a normalized assignment.
//!
//! The resolver owns no mutable state; every operation is a pure function of
//! the store snapshot and the registry, so calls may run fully in parallel.

use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AtriumError, Result};
use crate::store::AuthStore;

use super::models::PermissionCode;
use super::registry;

// ═══════════════════════════════════════════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes effective permission and role sets for users.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn AuthStore>,
}

impl Resolver {
    /// Create a resolver over the given store.
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve the user's effective permission set.
    ///
    /// Unions every permission granted through role assignments. If that
    /// union is empty and the user carries a non-null legacy role, the
    /// registry's static set for that role is returned instead, so users who
    /// predate normalized RBAC data are not silently locked out. An
    /// assignment to a role that grants no permissions contributes nothing
    /// and therefore still falls back.
    pub async fn resolve_permissions(&self, user_id: Uuid) -> Result<HashSet<PermissionCode>> {
        let grants = self.store.user_grants(user_id).await?;

        let resolved: HashSet<PermissionCode> = grants
            .grants
            .iter()
            .flat_map(|grant| grant.permissions.iter().cloned())
            .collect();

        if !resolved.is_empty() {
            counter!("atrium_permission_resolutions_total", "source" => "rbac").increment(1);
            debug!(
                user_id = %user_id,
                permissions = resolved.len(),
                "Resolved permissions from role assignments"
            );
            return Ok(resolved);
        }

        if let Some(legacy) = grants.legacy_role {
            let fallback = registry::permissions_for(legacy.as_str());
            counter!("atrium_permission_resolutions_total", "source" => "legacy").increment(1);
            debug!(
                user_id = %user_id,
                legacy_role = %legacy,
                permissions = fallback.len(),
                "Resolved permissions from legacy role fallback"
            );
            return Ok(fallback);
        }

        counter!("atrium_permission_resolutions_total", "source" => "none").increment(1);
        Ok(HashSet::new())
    }

    /// Resolve the names of all roles the user holds.
    ///
    /// Assignment-backed role names when any exist; otherwise the singleton
    /// legacy role name, or the empty set when the legacy role is null.
    pub async fn resolve_roles(&self, user_id: Uuid) -> Result<HashSet<String>> {
        let grants = self.store.user_grants(user_id).await?;

        if grants.has_rbac_data() {
            return Ok(grants
                .grants
                .iter()
                .map(|grant| grant.role.name.clone())
                .collect());
        }

        Ok(grants
            .legacy_role
            .map(|legacy| HashSet::from([legacy.as_str().to_string()]))
            .unwrap_or_default())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived checks
    // ─────────────────────────────────────────────────────────────────────────

    /// Check a single permission.
    pub async fn has_permission(&self, user_id: Uuid, code: &PermissionCode) -> Result<bool> {
        Ok(self.resolve_permissions(user_id).await?.contains(code))
    }

    /// Check whether the user holds ANY of the given permissions.
    ///
    /// One resolution round trip regardless of how many codes are checked.
    pub async fn has_any_permission(
        &self,
        user_id: Uuid,
        codes: &[PermissionCode],
    ) -> Result<bool> {
        let resolved = self.resolve_permissions(user_id).await?;
        Ok(codes.iter().any(|code| resolved.contains(code)))
    }

    /// Check whether the user holds ALL of the given permissions.
    pub async fn has_all_permissions(
        &self,
        user_id: Uuid,
        codes: &[PermissionCode],
    ) -> Result<bool> {
        let resolved = self.resolve_permissions(user_id).await?;
        Ok(codes.iter().all(|code| resolved.contains(code)))
    }

    /// Check whether the user holds a role by name.
    pub async fn has_role(&self, user_id: Uuid, role_name: &str) -> Result<bool> {
        Ok(self.resolve_roles(user_id).await?.contains(role_name))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Assignment mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Assign a role to a user by role name.
    ///
    /// Fails with `RoleNotFound` if no role carries the name. The underlying
    /// upsert is atomic and idempotent: assigning an already-held role is a
    /// silent no-op, including under concurrent duplicate calls.
    pub async fn assign_role(
        &self,
        user_id: Uuid,
        role_name: &str,
        granted_by: Option<Uuid>,
    ) -> Result<()> {
        let role = self
            .store
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AtriumError::role_not_found(role_name))?;

        self.store
            .upsert_assignment(user_id, role.id, granted_by)
            .await?;

        debug!(user_id = %user_id, role = %role_name, "Role assigned");
        counter!("atrium_role_assignments_total", "op" => "assign").increment(1);
        Ok(())
    }

    /// Remove a role from a user by role name.
    ///
    /// Fails with `RoleNotFound` if no role carries the name. Removing an
    /// assignment that does not exist is a silent no-op.
    pub async fn remove_role(&self, user_id: Uuid, role_name: &str) -> Result<()> {
        let role = self
            .store
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AtriumError::role_not_found(role_name))?;

        self.store.delete_assignment(user_id, role.id).await?;

        debug!(user_id = %user_id, role = %role_name, "Role removed");
        counter!("atrium_role_assignments_total", "op" => "remove").increment(1);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rbac::models::{LegacyRole, Role};
    use crate::store::MemoryStore;

    fn codes(list: &[&str]) -> Vec<PermissionCode> {
        list.iter().map(|code| PermissionCode::new(*code)).collect()
    }

    async fn seed_role(store: &MemoryStore, name: &str, perms: &[&str]) -> Role {
        let role = store.upsert_role(Role::new(name, name)).await.unwrap();
        store
            .set_role_permissions(role.id, &codes(perms))
            .await
            .unwrap();
        role
    }

    fn setup() -> (Arc<MemoryStore>, Resolver) {
        let store = Arc::new(MemoryStore::new());
        let resolver = Resolver::new(store.clone());
        (store, resolver)
    }

    #[tokio::test]
    async fn test_rbac_data_is_authoritative_and_exclusive() {
        let (store, resolver) = setup();
        let admin = seed_role(&store, "ADMIN", &["users.delete", "users.view"]).await;
        let user = Uuid::new_v4();

        // Legacy CUSTOMER would grant requests.create; the assignment must win.
        store.set_legacy_role(user, Some(LegacyRole::Customer));
        store.upsert_assignment(user, admin.id, None).await.unwrap();

        let perms = resolver.resolve_permissions(user).await.unwrap();
        assert_eq!(
            perms,
            codes(&["users.delete", "users.view"]).into_iter().collect()
        );
        assert!(!perms.contains(&PermissionCode::new("requests.create")));
    }

    #[tokio::test]
    async fn test_legacy_fallback_when_no_assignments() {
        let (store, resolver) = setup();
        let user = Uuid::new_v4();
        store.set_legacy_role(user, Some(LegacyRole::Staff));

        let perms = resolver.resolve_permissions(user).await.unwrap();
        assert_eq!(perms, registry::permissions_for("STAFF"));

        let roles = resolver.resolve_roles(user).await.unwrap();
        assert_eq!(roles, HashSet::from(["STAFF".to_string()]));
    }

    #[tokio::test]
    async fn test_null_legacy_role_yields_empty_sets() {
        let (_store, resolver) = setup();
        let user = Uuid::new_v4();

        assert!(resolver.resolve_permissions(user).await.unwrap().is_empty());
        assert!(resolver.resolve_roles(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_assignments_union() {
        let (store, resolver) = setup();
        let staff = seed_role(&store, "STAFF", &["requests.view", "chat.view"]).await;
        let billing = seed_role(&store, "BILLING", &["invoices.view", "invoices.create"]).await;
        let user = Uuid::new_v4();

        store.upsert_assignment(user, staff.id, None).await.unwrap();
        store
            .upsert_assignment(user, billing.id, None)
            .await
            .unwrap();

        let perms = resolver.resolve_permissions(user).await.unwrap();
        assert_eq!(perms.len(), 4);
        assert!(perms.contains(&PermissionCode::new("invoices.create")));
        assert!(perms.contains(&PermissionCode::new("chat.view")));

        let roles = resolver.resolve_roles(user).await.unwrap();
        assert_eq!(
            roles,
            HashSet::from(["STAFF".to_string(), "BILLING".to_string()])
        );
    }

    #[tokio::test]
    async fn test_assign_role_is_idempotent() {
        let (store, resolver) = setup();
        seed_role(&store, "ADMIN", &["users.view"]).await;
        let user = Uuid::new_v4();

        resolver.assign_role(user, "ADMIN", None).await.unwrap();
        resolver.assign_role(user, "ADMIN", None).await.unwrap();

        assert_eq!(store.assignment_count(user), 1);
    }

    #[tokio::test]
    async fn test_assign_role_concurrent_duplicates_converge() {
        let (store, resolver) = setup();
        seed_role(&store, "ADMIN", &["users.view"]).await;
        let user = Uuid::new_v4();

        let a = resolver.assign_role(user, "ADMIN", None);
        let b = resolver.assign_role(user, "ADMIN", None);
        let (ra, rb) = tokio::join!(a, b);
        ra.unwrap();
        rb.unwrap();

        assert_eq!(store.assignment_count(user), 1);
    }

    #[tokio::test]
    async fn test_remove_role_noop_when_not_assigned() {
        let (store, resolver) = setup();
        seed_role(&store, "STAFF", &["requests.view"]).await;
        let user = Uuid::new_v4();

        // Never assigned: must not error, must not change anything.
        resolver.remove_role(user, "STAFF").await.unwrap();
        assert_eq!(store.assignment_count(user), 0);
    }

    #[tokio::test]
    async fn test_assign_unknown_role_fails() {
        let (_store, resolver) = setup();
        let user = Uuid::new_v4();

        let err = resolver.assign_role(user, "AUDITOR", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RoleNotFound);

        let err = resolver.remove_role(user, "AUDITOR").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RoleNotFound);
    }

    #[tokio::test]
    async fn test_remove_last_role_restores_legacy_fallback() {
        let (store, resolver) = setup();
        seed_role(&store, "ADMIN", &["users.delete"]).await;
        let user = Uuid::new_v4();
        store.set_legacy_role(user, Some(LegacyRole::Customer));

        resolver.assign_role(user, "ADMIN", None).await.unwrap();
        assert!(resolver
            .has_permission(user, &PermissionCode::new("users.delete"))
            .await
            .unwrap());

        resolver.remove_role(user, "ADMIN").await.unwrap();
        let perms = resolver.resolve_permissions(user).await.unwrap();
        assert_eq!(perms, registry::permissions_for("CUSTOMER"));
    }

    #[tokio::test]
    async fn test_any_and_all_checks_match_set_membership() {
        let (store, resolver) = setup();
        let staff = seed_role(&store, "STAFF", &["requests.view", "chat.view"]).await;
        let user = Uuid::new_v4();
        store.upsert_assignment(user, staff.id, None).await.unwrap();

        let held = PermissionCode::new("requests.view");
        let missing = PermissionCode::new("users.delete");

        assert!(resolver
            .has_any_permission(user, &[held.clone(), missing.clone()])
            .await
            .unwrap());
        assert!(!resolver
            .has_all_permissions(user, &[held.clone(), missing.clone()])
            .await
            .unwrap());
        assert!(resolver
            .has_all_permissions(user, &[held, PermissionCode::new("chat.view")])
            .await
            .unwrap());
        assert!(!resolver
            .has_any_permission(user, &[missing])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_has_role_via_assignments_and_legacy() {
        let (store, resolver) = setup();
        let staff = seed_role(&store, "STAFF", &["requests.view"]).await;
        let assigned = Uuid::new_v4();
        let legacy_only = Uuid::new_v4();

        store
            .upsert_assignment(assigned, staff.id, None)
            .await
            .unwrap();
        store.set_legacy_role(legacy_only, Some(LegacyRole::Admin));

        assert!(resolver.has_role(assigned, "STAFF").await.unwrap());
        assert!(!resolver.has_role(assigned, "ADMIN").await.unwrap());
        assert!(resolver.has_role(legacy_only, "ADMIN").await.unwrap());
    }
}
