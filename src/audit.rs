use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// One audit record per state transition (and one summary per bulk
/// operation). Storage of the trail is an external concern.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_user_id: u64,
    pub actor_role: String,
    pub changes: Value,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl ToString,
        actor_user_id: u64,
        actor_role: impl Into<String>,
        changes: Value,
    ) -> Self {
        AuditEvent {
            event_id: Uuid::new_v4(),
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            actor_user_id,
            actor_role: actor_role.into(),
            changes,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Sink(String),
}

/// Audit sink collaborator. Writes are best-effort from the core's point of
/// view: a failing sink is logged and never fails the business operation
/// (the transaction has already committed by the time events are emitted).
#[async_trait]
pub trait AuditLog: Send + Sync + 'static {
    async fn log(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Emits audit events as structured tracing records under the `audit`
/// target, for deployments that collect the trail from logs.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            event_id = %event.event_id,
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            actor_user_id = event.actor_user_id,
            actor_role = %event.actor_role,
            changes = %event.changes,
            at = %event.at,
            "audit event"
        );
        Ok(())
    }
}

/// In-process sink that records every event; used by tests and embedders
/// that flush the trail themselves.
#[derive(Debug, Default)]
pub struct RecordingAuditLog {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditLog {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit log poisoned").clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().expect("audit log poisoned").push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn recording_log_keeps_order() {
        let log = RecordingAuditLog::default();
        for action in ["leave_request.created", "leave_request.submitted"] {
            log.log(AuditEvent::new(
                action,
                "leave_request",
                1u64,
                10,
                "employee",
                json!({}),
            ))
            .await
            .unwrap();
        }
        assert_eq!(
            log.actions(),
            vec!["leave_request.created", "leave_request.submitted"]
        );
    }
}
