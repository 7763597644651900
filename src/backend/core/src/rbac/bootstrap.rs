//! Bootstrap seeding of the builtin roles.
//!
//! Fresh databases have no normalized RBAC rows at all; seeding the builtin
//! roles and the permission catalog at process start gives administrators a
//! working baseline to assign from. Safe to run on every boot: every write
//! is an upsert.

use tracing::info;

use crate::error::Result;
use crate::store::AuthStore;

use super::models::PermissionCode;
use super::registry::{self, BuiltinRole};

/// Seed the permission catalog and the four builtin roles into the store.
pub async fn seed_builtin_roles(store: &dyn AuthStore) -> Result<()> {
    store.upsert_permissions(&registry::catalog()).await?;

    for builtin in BuiltinRole::all() {
        let role = store.upsert_role(builtin.to_role()).await?;
        let mut codes: Vec<PermissionCode> = builtin.permissions().into_iter().collect();
        codes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        store.set_role_permissions(role.id, &codes).await?;

        info!(
            role = builtin.name(),
            permissions = codes.len(),
            "Seeded builtin role"
        );
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_seed_creates_builtin_roles_and_catalog() {
        let store = MemoryStore::new();
        seed_builtin_roles(&store).await.unwrap();

        let roles = store.list_roles().await.unwrap();
        assert_eq!(roles.len(), 4);
        assert!(roles.iter().all(|overview| overview.role.is_system));

        let permissions = store.list_permissions().await.unwrap();
        assert_eq!(permissions.len(), registry::CATALOG.len());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        seed_builtin_roles(&store).await.unwrap();
        seed_builtin_roles(&store).await.unwrap();

        assert_eq!(store.list_roles().await.unwrap().len(), 4);
        assert_eq!(
            store.list_permissions().await.unwrap().len(),
            registry::CATALOG.len()
        );
    }

    #[tokio::test]
    async fn test_seeded_role_permission_counts() {
        let store = MemoryStore::new();
        seed_builtin_roles(&store).await.unwrap();

        let roles = store.list_roles().await.unwrap();
        let admin = roles
            .iter()
            .find(|overview| overview.role.name == "ADMIN")
            .unwrap();
        assert_eq!(
            admin.permission_count,
            BuiltinRole::Admin.permissions().len() as u64
        );
    }
}
