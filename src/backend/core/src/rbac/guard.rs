//! Request-scoped enforcement primitives built on the resolver.
//!
//! The guard does not authenticate anyone: the surrounding application
//! verifies credentials against its identity provider and injects a
//! [`Session`] into request extensions. The guard only answers "may this
//! session do X?", with exactly two failure states:
//!
//! - `Unauthorized`: no authenticated user in the session
//! - `Forbidden`: authenticated, but the resolved grant is insufficient
//!
//! On success the session is passed through unchanged so handlers can keep
//! using the session data they already had.

use axum::{extract::FromRequestParts, http::request::Parts};
use metrics::counter;
use std::convert::Infallible;
use tracing::warn;
use uuid::Uuid;

use crate::audit::RequestOrigin;
use crate::error::{AtriumError, Result};

use super::models::{LegacyRole, PermissionCode};
use super::resolver::Resolver;

// ═══════════════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════════════

/// The ambient identity of one request, as supplied by the caller.
///
/// `user_id` is `None` for anonymous requests. The legacy role and origin
/// ride along so that downstream code (client cache priming, audit wrappers)
/// does not need extra lookups.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user_id: Option<Uuid>,
    pub legacy_role: Option<LegacyRole>,
    pub origin: RequestOrigin,
}

impl Session {
    /// A session for an authenticated user.
    pub fn authenticated(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            legacy_role: None,
            origin: RequestOrigin::unknown(),
        }
    }

    /// A session with no authenticated user.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attach the legacy scalar role known to the identity subsystem.
    pub fn with_legacy_role(mut self, role: LegacyRole) -> Self {
        self.legacy_role = Some(role);
        self
    }

    /// Attach the request origin.
    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The authenticated user id, or `Unauthorized`.
    pub fn require_user(&self) -> Result<Uuid> {
        self.user_id.ok_or_else(AtriumError::unauthorized)
    }
}

/// Axum extractor: reads the session the host application injected into
/// request extensions. A request with no session extension is anonymous.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Session>()
            .cloned()
            .unwrap_or_else(Session::anonymous))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Guard
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluate-and-decide enforcement over the resolver.
#[derive(Clone)]
pub struct Guard {
    resolver: Resolver,
}

impl Guard {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Require a single permission; pass the session through on success.
    pub async fn require_permission<'s>(
        &self,
        session: &'s Session,
        code: &str,
    ) -> Result<&'s Session> {
        let user_id = self.authenticated_user(session)?;
        let allowed = self
            .resolver
            .has_permission(user_id, &PermissionCode::new(code))
            .await?;
        self.decide(session, user_id, allowed, code)
    }

    /// Require ANY of the given permissions; pass the session through on
    /// success. One resolution round trip for the whole set.
    pub async fn require_any_permission<'s>(
        &self,
        session: &'s Session,
        codes: &[&str],
    ) -> Result<&'s Session> {
        let user_id = self.authenticated_user(session)?;
        let codes: Vec<PermissionCode> =
            codes.iter().map(|code| PermissionCode::new(*code)).collect();
        let allowed = self.resolver.has_any_permission(user_id, &codes).await?;
        self.decide(session, user_id, allowed, "any-of")
    }

    /// Require a role by name; pass the session through on success.
    pub async fn require_role<'s>(
        &self,
        session: &'s Session,
        role_name: &str,
    ) -> Result<&'s Session> {
        let user_id = self.authenticated_user(session)?;
        let allowed = self.resolver.has_role(user_id, role_name).await?;
        self.decide(session, user_id, allowed, role_name)
    }

    fn authenticated_user(&self, session: &Session) -> Result<Uuid> {
        session.user_id.ok_or_else(|| {
            counter!("atrium_authz_denials_total", "reason" => "unauthorized").increment(1);
            AtriumError::unauthorized()
        })
    }

    fn decide<'s>(
        &self,
        session: &'s Session,
        user_id: Uuid,
        allowed: bool,
        requirement: &str,
    ) -> Result<&'s Session> {
        if allowed {
            return Ok(session);
        }

        warn!(
            user_id = %user_id,
            requirement = requirement,
            "Access denied"
        );
        counter!("atrium_authz_denials_total", "reason" => "forbidden").increment(1);
        Err(AtriumError::forbidden(format!(
            "You do not have the required access: {}",
            requirement
        )))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
