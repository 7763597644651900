//! Integration tests for the Atrium authorization core.
//!
//! These tests verify end-to-end behavior across the registry, store,
//! resolver, guard, and client cache, using the in-memory store.

use std::collections::HashSet;
use std::sync::Arc;

use atrium_core::error::ErrorCode;
use atrium_core::rbac::{
    registry, seed_builtin_roles, Guard, LegacyRole, PermissionCache, PermissionCode,
    PermissionSnapshot, Resolver, Role, Session,
};
use atrium_core::store::{AuthStore, MemoryStore};
use uuid::Uuid;

// ============================================================================
// Test Utilities
// ============================================================================

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed_builtin_roles(store.as_ref()).await.unwrap();
    store
}

async fn custom_role(store: &MemoryStore, name: &str, perms: &[&str]) -> Role {
    let role = store.upsert_role(Role::new(name, name)).await.unwrap();
    let codes: Vec<PermissionCode> = perms.iter().map(|p| PermissionCode::new(*p)).collect();
    store.set_role_permissions(role.id, &codes).await.unwrap();
    role
}

fn set(codes: &[&str]) -> HashSet<PermissionCode> {
    codes.iter().map(|code| PermissionCode::new(*code)).collect()
}

// ============================================================================
// Resolution Scenarios
// ============================================================================

#[tokio::test]
async fn legacy_staff_user_resolves_registry_set() {
    // u1: legacy role STAFF, no RBAC rows.
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let u1 = Uuid::new_v4();
    store.set_legacy_role(u1, Some(LegacyRole::Staff));

    let roles = resolver.resolve_roles(u1).await.unwrap();
    assert_eq!(roles, HashSet::from(["STAFF".to_string()]));

    let perms = resolver.resolve_permissions(u1).await.unwrap();
    assert_eq!(perms, registry::permissions_for("STAFF"));
}

#[tokio::test]
async fn assignment_shadows_different_legacy_role() {
    // u2: one assignment to a role granting users.delete + users.view,
    // legacy role CUSTOMER. The CUSTOMER set must not be merged in.
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let u2 = Uuid::new_v4();
    store.set_legacy_role(u2, Some(LegacyRole::Customer));

    let role = custom_role(&store, "USER_ADMIN", &["users.delete", "users.view"]).await;
    store.upsert_assignment(u2, role.id, None).await.unwrap();

    let perms = resolver.resolve_permissions(u2).await.unwrap();
    assert_eq!(perms, set(&["users.delete", "users.view"]));
}

#[tokio::test]
async fn user_without_any_data_resolves_empty() {
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let user = Uuid::new_v4();

    assert!(resolver.resolve_permissions(user).await.unwrap().is_empty());
    assert!(resolver.resolve_roles(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn seeded_builtin_roles_are_assignable() {
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let user = Uuid::new_v4();

    resolver.assign_role(user, "ADMIN", None).await.unwrap();

    let perms = resolver.resolve_permissions(user).await.unwrap();
    assert_eq!(perms, registry::permissions_for("ADMIN"));
    assert!(perms.contains(&PermissionCode::new("users.delete")));
    assert!(!perms.contains(&PermissionCode::new("config.update")));
}

// ============================================================================
// Assignment Idempotence
// ============================================================================

#[tokio::test]
async fn double_assignment_converges_to_one_row() {
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let u2 = Uuid::new_v4();

    resolver.assign_role(u2, "ADMIN", None).await.unwrap();
    resolver.assign_role(u2, "ADMIN", None).await.unwrap();
    assert_eq!(store.assignment_count(u2), 1);

    // Removing a role that was never assigned: no error, no row change.
    resolver.remove_role(u2, "STAFF").await.unwrap();
    assert_eq!(store.assignment_count(u2), 1);
}

#[tokio::test]
async fn concurrent_duplicate_assignments_converge() {
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let user = Uuid::new_v4();

    let results = futures::future::join_all(
        (0..8).map(|_| resolver.assign_role(user, "STAFF", None)),
    )
    .await;
    for result in results {
        result.unwrap();
    }

    assert_eq!(store.assignment_count(user), 1);
}

#[tokio::test]
async fn unknown_role_name_is_a_configuration_error() {
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let user = Uuid::new_v4();

    let err = resolver.assign_role(user, "NOT_A_ROLE", None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RoleNotFound);
}

// ============================================================================
// Guard Outcomes
// ============================================================================

#[tokio::test]
async fn guard_outcomes_for_services_delete() {
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let guard = Guard::new(resolver.clone());

    // No session -> Unauthorized.
    let err = guard
        .require_permission(&Session::anonymous(), "services.delete")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);

    // Session lacking the permission -> Forbidden.
    let customer = Uuid::new_v4();
    resolver.assign_role(customer, "CUSTOMER", None).await.unwrap();
    let err = guard
        .require_permission(&Session::authenticated(customer), "services.delete")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    // Session holding it -> pass-through.
    let admin = Uuid::new_v4();
    resolver.assign_role(admin, "ADMIN", None).await.unwrap();
    let session = Session::authenticated(admin);
    let passed = guard
        .require_permission(&session, "services.delete")
        .await
        .unwrap();
    assert_eq!(passed.user_id, Some(admin));
}

#[tokio::test]
async fn guard_role_check_honors_legacy_fallback() {
    let store = seeded_store().await;
    let guard = Guard::new(Resolver::new(store.clone()));
    let user = Uuid::new_v4();
    store.set_legacy_role(user, Some(LegacyRole::SuperAdmin));

    let session = Session::authenticated(user);
    assert!(guard.require_role(&session, "SUPER_ADMIN").await.is_ok());
    assert!(guard
        .require_permission(&session, "config.update")
        .await
        .is_ok());
}

// ============================================================================
// Client Cache Round Trip
// ============================================================================

#[tokio::test]
async fn snapshot_feeds_client_cache() {
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let user = Uuid::new_v4();
    resolver.assign_role(user, "STAFF", None).await.unwrap();

    // Shape the snapshot the way the endpoint does.
    let permissions: Vec<String> = resolver
        .resolve_permissions(user)
        .await
        .unwrap()
        .into_iter()
        .map(|code| code.0)
        .collect();
    let roles: Vec<String> = resolver.resolve_roles(user).await.unwrap().into_iter().collect();
    let snapshot = PermissionSnapshot {
        permissions,
        roles,
        user_id: user,
    };

    let cache = PermissionCache::from_snapshot(snapshot, None);
    assert!(cache.is_staff());
    assert!(!cache.is_admin());
    assert!(cache.has_permission("requests.assign"));
    assert!(cache.has_all_permissions(&["chat.view", "chat.respond"]));
    assert!(!cache.has_permission("users.delete"));
}

#[tokio::test]
async fn client_cache_recomputes_fallback_like_server() {
    let store = seeded_store().await;
    let resolver = Resolver::new(store.clone());
    let user = Uuid::new_v4();
    store.set_legacy_role(user, Some(LegacyRole::Customer));

    // Server-side resolution and client-side fallback must agree.
    let server: HashSet<String> = resolver
        .resolve_permissions(user)
        .await
        .unwrap()
        .into_iter()
        .map(|code| code.0)
        .collect();

    let empty_snapshot = PermissionSnapshot {
        permissions: vec![],
        roles: vec![],
        user_id: user,
    };
    let cache = PermissionCache::from_snapshot(empty_snapshot, Some(LegacyRole::Customer));

    assert_eq!(cache.permissions(), &server);
    assert!(cache.has_role("CUSTOMER"));
}
