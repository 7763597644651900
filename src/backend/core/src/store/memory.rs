//! In-process authorization store.
//!
//! Backs the core with `DashMap`s so that reads run lock-free and the
//! assignment upsert is a single atomic entry operation, matching the
//! concurrency contract of [`AuthStore`]. Used by the test suite and by
//! single-node development setups that do not want a database.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditFilter, AuditLogEntry};
use crate::error::{AtriumError, ErrorCode, Result};
use crate::rbac::models::{
    LegacyRole, Permission, PermissionCode, Role, RoleAssignment, RoleGrant, RoleOverview,
    UserGrants,
};

use super::AuthStore;

// ═══════════════════════════════════════════════════════════════════════════════
// Memory Store
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory implementation of [`AuthStore`].
#[derive(Default)]
pub struct MemoryStore {
    /// Roles indexed by id.
    roles: DashMap<Uuid, Role>,

    /// Permission codes granted per role id.
    role_permissions: DashMap<Uuid, Vec<PermissionCode>>,

    /// Permission catalog indexed by code.
    permissions: DashMap<String, Permission>,

    /// Assignments keyed by (user, role); the entry API gives the atomic
    /// idempotent upsert the contract requires.
    assignments: DashMap<(Uuid, Uuid), RoleAssignment>,

    /// Legacy scalar roles, read-only from the core's point of view.
    legacy_roles: DashMap<Uuid, LegacyRole>,

    /// Append-only audit log.
    audit_log: RwLock<Vec<AuditLogEntry>>,

    /// Fault injection: when set, audit appends fail. Lets tests verify the
    /// recorder's fail-soft contract without a real store outage.
    fail_audit: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or clear) a user's legacy scalar role. The identity subsystem
    /// owns this field in production; tests use this to model legacy users.
    pub fn set_legacy_role(&self, user_id: Uuid, role: Option<LegacyRole>) {
        match role {
            Some(role) => {
                self.legacy_roles.insert(user_id, role);
            }
            None => {
                self.legacy_roles.remove(&user_id);
            }
        }
    }

    /// Toggle audit append failure injection.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Number of assignment rows for a user (test observability).
    pub fn assignment_count(&self, user_id: Uuid) -> usize {
        self.assignments
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .count()
    }

    /// Number of audit entries appended so far (test observability).
    pub fn audit_len(&self) -> usize {
        self.audit_log.read().len()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self
            .roles
            .iter()
            .find(|entry| entry.value().name == name)
            .map(|entry| entry.value().clone()))
    }

    async fn list_roles(&self) -> Result<Vec<RoleOverview>> {
        let mut overviews: Vec<RoleOverview> = self
            .roles
            .iter()
            .map(|entry| {
                let role = entry.value().clone();
                let permission_count = self
                    .role_permissions
                    .get(&role.id)
                    .map(|codes| codes.len() as u64)
                    .unwrap_or(0);
                let assignment_count = self
                    .assignments
                    .iter()
                    .filter(|a| a.key().1 == role.id)
                    .count() as u64;
                RoleOverview {
                    role,
                    permission_count,
                    assignment_count,
                }
            })
            .collect();
        overviews.sort_by(|a, b| a.role.name.cmp(&b.role.name));
        Ok(overviews)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let mut permissions: Vec<Permission> = self
            .permissions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        permissions.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        Ok(permissions)
    }

    async fn upsert_role(&self, role: Role) -> Result<Role> {
        if let Some(existing) = self.find_role_by_name(&role.name).await? {
            return Ok(existing);
        }
        self.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn upsert_permissions(&self, permissions: &[Permission]) -> Result<()> {
        for permission in permissions {
            self.permissions
                .entry(permission.code.as_str().to_string())
                .or_insert_with(|| permission.clone());
        }
        Ok(())
    }

    async fn set_role_permissions(&self, role_id: Uuid, codes: &[PermissionCode]) -> Result<()> {
        self.role_permissions.insert(role_id, codes.to_vec());
        Ok(())
    }

    async fn user_grants(&self, user_id: Uuid) -> Result<UserGrants> {
        let legacy_role = self.legacy_roles.get(&user_id).map(|r| *r.value());

        let mut grants = Vec::new();
        for entry in self.assignments.iter() {
            if entry.key().0 != user_id {
                continue;
            }
            let role_id = entry.key().1;
            if let Some(role) = self.roles.get(&role_id) {
                let permissions = self
                    .role_permissions
                    .get(&role_id)
                    .map(|codes| codes.clone())
                    .unwrap_or_default();
                grants.push(RoleGrant {
                    role: role.value().clone(),
                    permissions,
                });
            }
        }
        grants.sort_by(|a, b| a.role.name.cmp(&b.role.name));

        Ok(UserGrants {
            legacy_role,
            grants,
        })
    }

    async fn upsert_assignment(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        granted_by: Option<Uuid>,
    ) -> Result<()> {
        // Atomic: the entry either exists (no-op) or is created exactly once,
        // even under concurrent duplicate calls.
        self.assignments
            .entry((user_id, role_id))
            .or_insert_with(|| RoleAssignment {
                user_id,
                role_id,
                granted_by,
                granted_at: Utc::now(),
            });
        Ok(())
    }

    async fn delete_assignment(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        // Absent pairs are success, not an error.
        self.assignments.remove(&(user_id, role_id));
        Ok(())
    }

    async fn append_audit(&self, event: AuditEvent) -> Result<AuditLogEntry> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(AtriumError::with_internal(
                ErrorCode::DatabaseError,
                "A database error occurred",
                "injected audit write failure",
            ));
        }

        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            actor_id: event.actor_id,
            action: event.action,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            before: event.before,
            after: event.after,
            ip_address: event.origin.ip_or_unknown().to_string(),
            user_agent: event.origin.user_agent_or_unknown().to_string(),
            metadata: event.metadata,
            created_at: Utc::now(),
        };

        self.audit_log.write().push(entry.clone());
        Ok(entry)
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        let log = self.audit_log.read();
        let entries = log
            .iter()
            .rev()
            .filter(|entry| {
                filter
                    .actor_id
                    .map_or(true, |actor| entry.actor_id == Some(actor))
                    && filter
                        .entity_type
                        .map_or(true, |ty| entry.entity_type == ty)
                    && filter.action.map_or(true, |action| entry.action == action)
            })
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
