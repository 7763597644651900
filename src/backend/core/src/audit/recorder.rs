//! The fail-soft audit recorder.
//!
//! `record` performs exactly one store append per call (or zero, on internal
//! failure). Audit writes are a non-critical effect: any store error or
//! timeout is caught here, logged for operational visibility, counted, and
//! converted to `None`. Nothing ever unwinds into the primary mutation the
//! entry describes. Audit completeness is best-effort, not guaranteed.
//!
//! The read side (`recent`) is NOT fail-soft; listing failures propagate
//! like any other store error.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

use crate::error::Result;
use crate::store::AuthStore;

use super::{AuditAction, AuditEvent, AuditFilter, AuditLogEntry, EntityType, RequestOrigin};

// ═══════════════════════════════════════════════════════════════════════════════
// Sensitive Field Redaction
// ═══════════════════════════════════════════════════════════════════════════════

const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "credential",
    "private_key",
    "access_token",
    "refresh_token",
    "authorization",
];

/// Whether a snapshot field name should be redacted before persisting.
pub fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|needle| lower.contains(needle))
}

/// Replace the values of sensitive keys with `"[REDACTED]"`, recursively.
fn redact_in_place(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if is_sensitive_field(key) {
                    *entry = serde_json::Value::String("[REDACTED]".to_string());
                } else {
                    redact_in_place(entry);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                redact_in_place(item);
            }
        }
        _ => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Recorder
// ═══════════════════════════════════════════════════════════════════════════════

/// Default bound on how long one audit append may block its caller.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Appends structured audit events to the store, absorbing write failures.
#[derive(Clone)]
pub struct Recorder {
    store: Arc<dyn AuthStore>,
    write_timeout: Duration,
}

impl Recorder {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self {
            store,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Override the append timeout (from `AuditConfig`).
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Record one audit event.
    ///
    /// Returns the persisted entry, or `None` if the append failed or timed
    /// out. Never returns an error: audit failures must not become a source
    /// of user-visible failure for the mutation being described.
    pub async fn record(&self, mut event: AuditEvent) -> Option<AuditLogEntry> {
        for snapshot in [&mut event.before, &mut event.after, &mut event.metadata] {
            if let Some(value) = snapshot {
                redact_in_place(value);
            }
        }

        let action = event.action;
        let entity_type = event.entity_type;

        match tokio::time::timeout(self.write_timeout, self.store.append_audit(event)).await {
            Ok(Ok(entry)) => {
                counter!("atrium_audit_events_total", "result" => "ok").increment(1);
                Some(entry)
            }
            Ok(Err(err)) => {
                error!(
                    action = %action,
                    entity_type = %entity_type,
                    error = %err,
                    "Audit write failed; event dropped"
                );
                counter!("atrium_audit_events_total", "result" => "error").increment(1);
                None
            }
            Err(_) => {
                error!(
                    action = %action,
                    entity_type = %entity_type,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Audit write timed out; event dropped"
                );
                counter!("atrium_audit_events_total", "result" => "timeout").increment(1);
                None
            }
        }
    }

    /// List recent audit entries, newest first. Not fail-soft.
    pub async fn recent(
        &self,
        filter: &AuditFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        self.store.list_audit(filter, limit, offset).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Convenience wrappers
    //
    // Each wrapper only shapes parameters for `record`; none carries logic or
    // state of its own.
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn user_created(
        &self,
        actor: Option<Uuid>,
        user_id: Uuid,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Create, EntityType::User)
            .entity(user_id)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn user_updated(
        &self,
        actor: Option<Uuid>,
        user_id: Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Update, EntityType::User)
            .entity(user_id)
            .before(before)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn user_deleted(
        &self,
        actor: Option<Uuid>,
        user_id: Uuid,
        before: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Delete, EntityType::User)
            .entity(user_id)
            .before(before)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn login(&self, user_id: Uuid, origin: RequestOrigin) -> Option<AuditLogEntry> {
        self.record(
            AuditEvent::new(AuditAction::Login, EntityType::User)
                .actor(user_id)
                .entity(user_id)
                .origin(origin),
        )
        .await
    }

    pub async fn logout(&self, user_id: Uuid, origin: RequestOrigin) -> Option<AuditLogEntry> {
        self.record(
            AuditEvent::new(AuditAction::Logout, EntityType::User)
                .actor(user_id)
                .entity(user_id)
                .origin(origin),
        )
        .await
    }

    pub async fn service_created(
        &self,
        actor: Option<Uuid>,
        service_id: Uuid,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Create, EntityType::Service)
            .entity(service_id)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn service_updated(
        &self,
        actor: Option<Uuid>,
        service_id: Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Update, EntityType::Service)
            .entity(service_id)
            .before(before)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn service_deleted(
        &self,
        actor: Option<Uuid>,
        service_id: Uuid,
        before: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Delete, EntityType::Service)
            .entity(service_id)
            .before(before)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn request_created(
        &self,
        actor: Option<Uuid>,
        request_id: Uuid,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Create, EntityType::ServiceRequest)
            .entity(request_id)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn request_updated(
        &self,
        actor: Option<Uuid>,
        request_id: Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Update, EntityType::ServiceRequest)
            .entity(request_id)
            .before(before)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn request_status_changed(
        &self,
        actor: Option<Uuid>,
        request_id: Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::StatusChange, EntityType::ServiceRequest)
            .entity(request_id)
            .before(before)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn request_assigned(
        &self,
        actor: Option<Uuid>,
        request_id: Uuid,
        assignee_id: Uuid,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Assign, EntityType::ServiceRequest)
            .entity(request_id)
            .metadata(serde_json::json!({ "assignee_id": assignee_id }))
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn role_assigned(
        &self,
        actor: Option<Uuid>,
        user_id: Uuid,
        role_name: &str,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::PermissionChange, EntityType::User)
            .entity(user_id)
            .metadata(serde_json::json!({ "role": role_name, "change": "assigned" }))
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn role_removed(
        &self,
        actor: Option<Uuid>,
        user_id: Uuid,
        role_name: &str,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::PermissionChange, EntityType::User)
            .entity(user_id)
            .metadata(serde_json::json!({ "role": role_name, "change": "removed" }))
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn subscription_created(
        &self,
        actor: Option<Uuid>,
        subscription_id: Uuid,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Create, EntityType::Subscription)
            .entity(subscription_id)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn subscription_updated(
        &self,
        actor: Option<Uuid>,
        subscription_id: Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Update, EntityType::Subscription)
            .entity(subscription_id)
            .before(before)
            .after(after)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }

    pub async fn data_exported(
        &self,
        actor: Option<Uuid>,
        entity_type: EntityType,
        metadata: serde_json::Value,
        origin: RequestOrigin,
    ) -> Option<AuditLogEntry> {
        let mut event = AuditEvent::new(AuditAction::Export, entity_type)
            .metadata(metadata)
            .origin(origin);
        event.actor_id = actor;
        self.record(event).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
