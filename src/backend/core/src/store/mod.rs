//! The persistence seam of the authorization core.
//!
//! This module provides pluggable authorization stores:
//! - **MemoryStore**: in-process store for tests and single-node development
//! - **PgStore**: PostgreSQL store using sqlx
//!
//! The core consumes the [`AuthStore`] trait and never a concrete database;
//! the surrounding application decides which implementation to wire in.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditFilter, AuditLogEntry};
use crate::error::Result;
use crate::rbac::models::{Permission, PermissionCode, Role, RoleOverview, UserGrants};

// ═══════════════════════════════════════════════════════════════════════════════
// Auth Store Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Trait for authorization stores.
///
/// The store is the single source of truth for roles, permissions, role
/// assignments, and the audit trail. Contract notes:
///
/// - `upsert_assignment` and `delete_assignment` must be single atomic
///   operations so that concurrent identical calls converge to one row; a
///   duplicate upsert or a missing delete is success, never an error.
/// - `user_grants` must expand assignments → role → permissions in a single
///   query shape (no per-role round trips).
/// - `append_audit` is the only audit write; the core never updates or
///   deletes audit rows.
#[async_trait]
pub trait AuthStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Roles and permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Find a role by its stable name.
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// List all roles with permission and assignment counts.
    async fn list_roles(&self) -> Result<Vec<RoleOverview>>;

    /// List the permission catalog. Callers group by the derived category.
    async fn list_permissions(&self) -> Result<Vec<Permission>>;

    /// Insert a role, or return the existing role with the same name.
    async fn upsert_role(&self, role: Role) -> Result<Role>;

    /// Insert catalog permissions, ignoring codes that already exist.
    async fn upsert_permissions(&self, permissions: &[Permission]) -> Result<()>;

    /// Replace the permission set granted to a role.
    async fn set_role_permissions(&self, role_id: Uuid, codes: &[PermissionCode]) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // User grants
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch everything the resolver needs about one user: the legacy scalar
    /// role plus all role assignments expanded to their granted permission
    /// codes.
    async fn user_grants(&self, user_id: Uuid) -> Result<UserGrants>;

    /// Record that a user holds a role. Idempotent: if the (user, role) pair
    /// already exists this is a silent no-op, including under concurrent
    /// duplicate calls.
    async fn upsert_assignment(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        granted_by: Option<Uuid>,
    ) -> Result<()>;

    /// Delete a role assignment if present. Deleting a non-existent pair is
    /// a silent no-op.
    async fn delete_assignment(&self, user_id: Uuid, role_id: Uuid) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Audit trail
    // ─────────────────────────────────────────────────────────────────────────

    /// Append one audit entry. The store assigns the creation timestamp.
    async fn append_audit(&self, event: AuditEvent) -> Result<AuditLogEntry>;

    /// List audit entries matching a filter, newest first.
    async fn list_audit(
        &self,
        filter: &AuditFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>>;

    /// Get the store name (for logs and metrics labels).
    fn name(&self) -> &'static str;
}
