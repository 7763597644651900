//! The HTTP surface the authorization core exposes to the host application.
//!
//! The host mounts this router next to its own routes and injects a
//! [`Session`] into request extensions from its authentication middleware.
//! Everything else (page rendering, form handling, the CRUD endpoints whose
//! handlers call the guard) lives in the host application, not here.

use axum::{extract::State, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::rbac::{PermissionSnapshot, Resolver, Session};

// ═══════════════════════════════════════════════════════════════════════════════
// Router
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
struct ApiState {
    resolver: Resolver,
}

/// Build the authorization API router.
pub fn router(resolver: Resolver) -> Router {
    Router::new()
        .route("/api/v1/me/permissions", get(current_user_permissions))
        .layer(TraceLayer::new_for_http())
        .with_state(ApiState { resolver })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Handlers
// ═══════════════════════════════════════════════════════════════════════════════

/// `GET /api/v1/me/permissions`: the resolved permission and role sets of
/// the authenticated caller, in the snapshot shape the client cache
/// consumes. Responds 401 when the session carries no user.
async fn current_user_permissions(
    State(state): State<ApiState>,
    session: Session,
) -> Result<Json<PermissionSnapshot>> {
    let user_id = session.require_user()?;

    let mut permissions: Vec<String> = state
        .resolver
        .resolve_permissions(user_id)
        .await?
        .into_iter()
        .map(|code| code.0)
        .collect();
    permissions.sort();

    let mut roles: Vec<String> = state
        .resolver
        .resolve_roles(user_id)
        .await?
        .into_iter()
        .collect();
    roles.sort();

    Ok(Json(PermissionSnapshot {
        permissions,
        roles,
        user_id,
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
