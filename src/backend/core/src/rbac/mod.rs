//! Role-Based Access Control: resolution, enforcement, and the static
//! permission registry.
//!
//! This module provides:
//! - **Models**: Role, PermissionCode, RoleAssignment, and grant expansions
//! - **Registry**: the compiled-in permission catalog and builtin role sets
//! - **Resolver**: effective permission/role computation with legacy-role
//!   fallback
//! - **Guard**: request-scoped enforcement (`Unauthorized` / `Forbidden`)
//! - **Cache**: a snapshot-backed mirror of the resolver for UI-side gating
//! - **Bootstrap**: builtin role seeding
//!
//! # Usage
//!
//! ```rust,ignore
//! use atrium_core::rbac::{Guard, Resolver, Session};
//! use atrium_core::store::PgStore;
//!
//! let store = Arc::new(PgStore::connect(&cfg.database.url, 20).await?);
//! let resolver = Resolver::new(store.clone());
//! let guard = Guard::new(resolver.clone());
//!
//! // In a privileged handler:
//! guard.require_permission(&session, "services.delete").await?;
//! ```

pub mod bootstrap;
pub mod cache;
pub mod guard;
pub mod models;
pub mod registry;
pub mod resolver;

pub use bootstrap::seed_builtin_roles;
pub use cache::{PermissionCache, PermissionSnapshot};
pub use guard::{Guard, Session};
pub use models::{
    LegacyRole, Permission, PermissionCode, Role, RoleAssignment, RoleGrant, RoleOverview,
    UserGrants,
};
pub use registry::BuiltinRole;
pub use resolver::Resolver;
