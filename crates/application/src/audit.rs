use async_trait::async_trait;
use drivelane_core::AppResult;
use drivelane_domain::AuditAction;

/// One administrative audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Email of the acting administrator.
    pub actor_email: String,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Kind of resource the event touched.
    pub resource_type: String,
    /// Identifier of the touched resource.
    pub resource_id: String,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

/// Repository port for the append-only audit trail.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends one event to the trail.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
