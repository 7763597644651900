//! Audit trail types and the fail-soft recorder.
//!
//! Every privileged mutation in the platform is followed by one audit event
//! describing it. The write path is deliberately an isolated failure domain:
//! a failing audit append is logged and swallowed, never propagated, so that
//! audit problems can never abort the mutation they describe (see
//! [`recorder::Recorder`]).

pub mod recorder;

pub use recorder::Recorder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// Action Taxonomy
// ═══════════════════════════════════════════════════════════════════════════════

/// The kind of privileged operation an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    View,
    Export,
    Assign,
    StatusChange,
    PermissionChange,
}

impl AuditAction {
    /// The stable string stored for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::View => "VIEW",
            Self::Export => "EXPORT",
            Self::Assign => "ASSIGN",
            Self::StatusChange => "STATUS_CHANGE",
            Self::PermissionChange => "PERMISSION_CHANGE",
        }
    }

    /// Parse a stored action string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(Self::Create),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "LOGIN" => Some(Self::Login),
            "LOGOUT" => Some(Self::Logout),
            "VIEW" => Some(Self::View),
            "EXPORT" => Some(Self::Export),
            "ASSIGN" => Some(Self::Assign),
            "STATUS_CHANGE" => Some(Self::StatusChange),
            "PERMISSION_CHANGE" => Some(Self::PermissionChange),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Entity Taxonomy
// ═══════════════════════════════════════════════════════════════════════════════

/// The kind of entity an audit entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    Service,
    ServiceRequest,
    Subscription,
    Role,
    Permission,
    Invoice,
    Document,
    ChatSession,
    GeneratedDocument,
    SiteConfig,
}

impl EntityType {
    /// The stable string stored for this entity type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Service => "Service",
            Self::ServiceRequest => "ServiceRequest",
            Self::Subscription => "Subscription",
            Self::Role => "Role",
            Self::Permission => "Permission",
            Self::Invoice => "Invoice",
            Self::Document => "Document",
            Self::ChatSession => "ChatSession",
            Self::GeneratedDocument => "GeneratedDocument",
            Self::SiteConfig => "SiteConfig",
        }
    }

    /// Parse a stored entity type string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "User" => Some(Self::User),
            "Service" => Some(Self::Service),
            "ServiceRequest" => Some(Self::ServiceRequest),
            "Subscription" => Some(Self::Subscription),
            "Role" => Some(Self::Role),
            "Permission" => Some(Self::Permission),
            "Invoice" => Some(Self::Invoice),
            "Document" => Some(Self::Document),
            "ChatSession" => Some(Self::ChatSession),
            "GeneratedDocument" => Some(Self::GeneratedDocument),
            "SiteConfig" => Some(Self::SiteConfig),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request Origin
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a request came from, as far as the caller knows.
///
/// Both fields are optional; absent values are stored as `"unknown"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestOrigin {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            user_agent: Some(user_agent.into()),
        }
    }

    /// An origin with no information (stored as `"unknown"`/`"unknown"`).
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn ip_or_unknown(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }

    pub fn user_agent_or_unknown(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("unknown")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Audit Event (input) and Log Entry (persisted fact)
// ═══════════════════════════════════════════════════════════════════════════════

/// The parameters of one audit append, shaped by the caller (usually through
/// one of the recorder's convenience wrappers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The acting user (None for system-initiated actions).
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    /// The affected entity (None when no single entity applies, e.g. exports).
    pub entity_id: Option<Uuid>,
    /// Opaque serialized state before the operation.
    pub before: Option<serde_json::Value>,
    /// Opaque serialized state after the operation.
    pub after: Option<serde_json::Value>,
    pub origin: RequestOrigin,
    /// Free-form structured context.
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    /// Start an event for the given action and entity type.
    pub fn new(action: AuditAction, entity_type: EntityType) -> Self {
        Self {
            actor_id: None,
            action,
            entity_type,
            entity_id: None,
            before: None,
            after: None,
            origin: RequestOrigin::unknown(),
            metadata: None,
        }
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn entity(mut self, entity_id: Uuid) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn before(mut self, snapshot: serde_json::Value) -> Self {
        self.before = Some(snapshot);
        self
    }

    pub fn after(mut self, snapshot: serde_json::Value) -> Self {
        self.after = Some(snapshot);
        self
    }

    pub fn origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// An immutable fact describing a privileged operation.
///
/// Entries are write-once: the core appends them and never updates or
/// deletes them. The creation timestamp is assigned by the store at insert
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: Option<Uuid>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub ip_address: String,
    pub user_agent: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Filter for audit listings. All fields are conjunctive; `None` matches
/// everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor_id: Option<Uuid>,
    pub entity_type: Option<EntityType>,
    pub action: Option<AuditAction>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
