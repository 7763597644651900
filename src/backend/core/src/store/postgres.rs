//! PostgreSQL authorization store.
//!
//! Uses sqlx with runtime-bound queries. The two mutation paths the
//! concurrency model cares about are single atomic statements:
//! `ON CONFLICT (user_id, role_id) DO NOTHING` for the assignment upsert and
//! a plain `DELETE` for removal, so concurrent duplicate calls converge
//! without surfacing uniqueness violations.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditFilter, AuditLogEntry, EntityType};
use crate::error::{AtriumError, ErrorCode, Result};
use crate::rbac::models::{
    LegacyRole, Permission, PermissionCode, Role, RoleGrant, RoleOverview, UserGrants,
};

use super::AuthStore;

// ═══════════════════════════════════════════════════════════════════════════════
// Pg Store
// ═══════════════════════════════════════════════════════════════════════════════

/// PostgreSQL implementation of [`AuthStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store with its own connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (shared with the host application).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AtriumError::from(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn role_from_row(row: &sqlx::postgres::PgRow) -> Role {
        Role {
            id: row.get("id"),
            name: row.get("name"),
            display_name: row.get("display_name"),
            description: row.get("description"),
            is_system: row.get("is_system"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn audit_entry_from_row(row: &sqlx::postgres::PgRow) -> Result<AuditLogEntry> {
        let action_str: String = row.get("action");
        let entity_str: String = row.get("entity_type");

        let action = AuditAction::parse(&action_str).ok_or_else(|| {
            AtriumError::with_internal(
                ErrorCode::SerializationError,
                "Failed to process JSON data",
                format!("unknown audit action in store: {}", action_str),
            )
        })?;
        let entity_type = EntityType::parse(&entity_str).ok_or_else(|| {
            AtriumError::with_internal(
                ErrorCode::SerializationError,
                "Failed to process JSON data",
                format!("unknown audit entity type in store: {}", entity_str),
            )
        })?;

        Ok(AuditLogEntry {
            id: row.get("id"),
            actor_id: row.get("actor_id"),
            action,
            entity_type,
            entity_id: row.get("entity_id"),
            before: row.get("before_state"),
            after: row.get("after_state"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, display_name, description, is_system, created_at, updated_at
            FROM roles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::role_from_row))
    }

    async fn list_roles(&self) -> Result<Vec<RoleOverview>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.display_name, r.description, r.is_system,
                   r.created_at, r.updated_at,
                   (SELECT COUNT(*) FROM role_permissions rp WHERE rp.role_id = r.id) AS permission_count,
                   (SELECT COUNT(*) FROM role_assignments ra WHERE ra.role_id = r.id) AS assignment_count
            FROM roles r
            ORDER BY r.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RoleOverview {
                role: Self::role_from_row(row),
                permission_count: row.get::<i64, _>("permission_count") as u64,
                assignment_count: row.get::<i64, _>("assignment_count") as u64,
            })
            .collect())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let rows = sqlx::query(
            r#"
            SELECT code, description
            FROM permissions
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Permission {
                code: PermissionCode::new(row.get::<String, _>("code")),
                description: row.get("description"),
            })
            .collect())
    }

    async fn upsert_role(&self, role: Role) -> Result<Role> {
        // The no-op DO UPDATE keeps the existing row while letting RETURNING
        // yield it, so both branches come back in one statement.
        let row = sqlx::query(
            r#"
            INSERT INTO roles (id, name, display_name, description, is_system, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, display_name, description, is_system, created_at, updated_at
            "#,
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.display_name)
        .bind(&role.description)
        .bind(role.is_system)
        .bind(role.created_at)
        .bind(role.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::role_from_row(&row))
    }

    async fn upsert_permissions(&self, permissions: &[Permission]) -> Result<()> {
        for permission in permissions {
            sqlx::query(
                r#"
                INSERT INTO permissions (code, description)
                VALUES ($1, $2)
                ON CONFLICT (code) DO NOTHING
                "#,
            )
            .bind(permission.code.as_str())
            .bind(&permission.description)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn set_role_permissions(&self, role_id: Uuid, codes: &[PermissionCode]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for code in codes {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_code)
                VALUES ($1, $2)
                ON CONFLICT (role_id, permission_code) DO NOTHING
                "#,
            )
            .bind(role_id)
            .bind(code.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn user_grants(&self, user_id: Uuid) -> Result<UserGrants> {
        let legacy_role = sqlx::query("SELECT legacy_role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .and_then(|row| row.get::<Option<String>, _>("legacy_role"))
            .and_then(|value| LegacyRole::parse(&value));

        // One query for the whole assignment -> role -> permission expansion.
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.display_name, r.description, r.is_system,
                   r.created_at, r.updated_at,
                   rp.permission_code
            FROM role_assignments ra
            JOIN roles r ON r.id = ra.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            WHERE ra.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grants: Vec<RoleGrant> = Vec::new();
        for row in &rows {
            let role_id: Uuid = row.get("id");
            let code: Option<String> = row.get("permission_code");

            if grants.last().map(|g| g.role.id) != Some(role_id) {
                grants.push(RoleGrant {
                    role: Self::role_from_row(row),
                    permissions: Vec::new(),
                });
            }
            if let (Some(grant), Some(code)) = (grants.last_mut(), code) {
                grant.permissions.push(PermissionCode::new(code));
            }
        }

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
        sqlx::query(
            r#"
            INSERT INTO role_assignments (user_id, role_id, granted_by, granted_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(granted_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_assignment(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM role_assignments WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn append_audit(&self, event: AuditEvent) -> Result<AuditLogEntry> {
        let id = Uuid::new_v4();
        let ip_address = event.origin.ip_or_unknown().to_string();
        let user_agent = event.origin.user_agent_or_unknown().to_string();

        let row = sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, actor_id, action, entity_type, entity_id,
                 before_state, after_state, ip_address, user_agent, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(event.actor_id)
        .bind(event.action.as_str())
        .bind(event.entity_type.as_str())
        .bind(event.entity_id)
        .bind(&event.before)
        .bind(&event.after)
        .bind(&ip_address)
        .bind(&user_agent)
        .bind(&event.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(AuditLogEntry {
            id,
            actor_id: event.actor_id,
            action: event.action,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            before: event.before,
            after: event.after,
            ip_address,
            user_agent,
            metadata: event.metadata,
            created_at: row.get("created_at"),
        })
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, actor_id, action, entity_type, entity_id,
                   before_state, after_state, ip_address, user_agent, metadata, created_at
            FROM audit_log
            WHERE ($1::uuid IS NULL OR actor_id = $1)
              AND ($2::text IS NULL OR entity_type = $2)
              AND ($3::text IS NULL OR action = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.actor_id)
        .bind(filter.entity_type.map(|ty| ty.as_str()))
        .bind(filter.action.map(|action| action.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::audit_entry_from_row).collect()
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
