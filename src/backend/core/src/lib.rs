//! # Atrium Core
//!
//! The authorization core of the Atrium business services platform.
//!
//! ## Architecture
//!
//! - **Registry**: compiled-in permission catalog and builtin role sets
//! - **Store**: the persistence seam (`AuthStore`), with PostgreSQL and
//!   in-memory implementations
//! - **Resolver**: deterministic permission/role resolution combining
//!   normalized role assignments with legacy scalar-role fallback
//! - **Guard**: request-scoped enforcement with `Unauthorized`/`Forbidden`
//!   outcomes
//! - **Audit**: append-only, fail-soft audit trail for privileged mutations
//! - **Cache**: snapshot-backed permission mirror for UI-side gating
//! - **API**: the permissions endpoint the host application mounts
//!
//! The surrounding application (page rendering, session cookies, form
//! handling, chat UI, document templating, billing flows) is an external
//! caller: it invokes the guard before performing an action and the audit
//! recorder after, and owns authentication entirely.

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod rbac;
pub mod store;
pub mod telemetry;

pub use error::{AtriumError, ErrorCode, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::audit::{
        AuditAction, AuditEvent, AuditFilter, AuditLogEntry, EntityType, Recorder, RequestOrigin,
    };
    pub use crate::config::CoreConfig;
    pub use crate::error::{AtriumError, ErrorCode, ErrorSeverity, Result};
    pub use crate::rbac::{
        seed_builtin_roles, BuiltinRole, Guard, LegacyRole, Permission, PermissionCache,
        PermissionCode, PermissionSnapshot, Resolver, Role, RoleAssignment, RoleGrant,
        RoleOverview, Session, UserGrants,
    };
    pub use crate::store::{AuthStore, MemoryStore, PgStore};
}
