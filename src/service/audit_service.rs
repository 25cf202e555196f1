// service/audit_service.rs
//
// System-wide audit log for account management. Writes are secondary to the
// action they describe: failures are logged and never undo the action.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::userdb::UserExt,
    models::usermodel::{NewSystemAuditEntry, SystemAuditEntry, User, UserRole},
    service::error::ServiceError,
};

pub const USER_CREATED: &str = "User Created";
pub const USER_ROLE_UPDATED: &str = "User Role Updated";
pub const USER_DELETED: &str = "User Deleted";

const LOG_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AuditService {
    users: Arc<dyn UserExt>,
}

impl AuditService {
    pub fn new(users: Arc<dyn UserExt>) -> Self {
        Self { users }
    }

    pub async fn log_user_created(&self, actor: &User, created: &User) {
        self.log_audit_event(
            actor,
            USER_CREATED,
            Some(created.id),
            json!({
                "email": created.email,
                "role": created.role.to_str(),
                "department": created.department.map(|d| d.to_str().to_string()),
            }),
        )
        .await
    }

    pub async fn log_role_updated(&self, actor: &User, target: &User, previous: UserRole) {
        self.log_audit_event(
            actor,
            USER_ROLE_UPDATED,
            Some(target.id),
            json!({
                "email": target.email,
                "from": previous.to_str(),
                "to": target.role.to_str(),
                "department": target.department.map(|d| d.to_str().to_string()),
            }),
        )
        .await
    }

    pub async fn log_user_deleted(&self, actor: &User, target: &User) {
        self.log_audit_event(
            actor,
            USER_DELETED,
            Some(target.id),
            json!({
                "email": target.email,
                "role": target.role.to_str(),
            }),
        )
        .await
    }

    pub async fn entries(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SystemAuditEntry>, ServiceError> {
        Ok(self.users.get_system_audit_log(since, LOG_LIMIT).await?)
    }

    async fn log_audit_event(
        &self,
        actor: &User,
        action: &str,
        target_id: Option<Uuid>,
        details: serde_json::Value,
    ) {
        let entry = NewSystemAuditEntry {
            action: action.to_string(),
            actor_id: Some(actor.id),
            actor_email: Some(actor.email.clone()),
            target_type: "user".to_string(),
            target_id,
            details: Some(details),
            created_at: Utc::now(),
        };

        if let Err(e) = self.users.log_system_action(entry).await {
            tracing::warn!("Failed to record '{}' in the system audit log: {}", action, e);
        }
    }
}
