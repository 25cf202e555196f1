// service/account_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::userdb::UserExt,
    error::ErrorMessage,
    models::{
        complaintmodel::Department,
        usermodel::{NewUser, SystemAuditEntry, User, UserRole},
    },
    service::{audit_service::AuditService, error::ServiceError},
    utils::{password, token},
};

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub department: Option<Department>,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserExt>,
    audit: AuditService,
    jwt_secret: String,
    jwt_maxage: i64,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserExt>, jwt_secret: impl Into<String>, jwt_maxage: i64) -> Self {
        Self {
            audit: AuditService::new(users.clone()),
            users,
            jwt_secret: jwt_secret.into(),
            jwt_maxage,
        }
    }

    pub fn jwt_maxage(&self) -> i64 {
        self.jwt_maxage
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.users
            .get_user(Some(user_id), None)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))
    }

    /// Self-service sign-up, always as a student.
    pub async fn register_student(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        let user = self
            .insert_account(NewAccount {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: UserRole::Student,
                department: None,
            })
            .await?;

        tracing::info!("Student account registered: {}", user.email);
        Ok(user)
    }

    /// Verifies credentials and issues a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), ServiceError> {
        let wrong_credentials =
            || ServiceError::Unauthorized(ErrorMessage::WrongCredentials.to_string());

        let user = self
            .users
            .get_user(None, Some(email.trim()))
            .await?
            .ok_or_else(wrong_credentials)?;

        let hashed = user.password.as_deref().ok_or_else(wrong_credentials)?;
        let matched = password::compare(password, hashed).map_err(|_| wrong_credentials())?;
        if !matched {
            return Err(wrong_credentials());
        }

        let token = token::create_token(
            &user.id.to_string(),
            self.jwt_secret.as_bytes(),
            self.jwt_maxage,
        )
        .map_err(|e| ServiceError::Dependency(format!("Failed to issue token: {}", e)))?;

        tracing::info!("User {} signed in", user.email);
        Ok((user, token))
    }

    pub async fn create_user(&self, actor: &User, account: NewAccount) -> Result<User, ServiceError> {
        ensure_super_admin(actor)?;
        let created = self.insert_account(account).await?;

        self.audit.log_user_created(actor, &created).await;
        tracing::info!(
            "User {} created as {} by {}",
            created.email,
            created.role.to_str(),
            actor.email
        );
        Ok(created)
    }

    pub async fn update_role(
        &self,
        actor: &User,
        target_id: Uuid,
        role: UserRole,
        department: Option<Department>,
    ) -> Result<User, ServiceError> {
        ensure_super_admin(actor)?;
        let department = department_for(role, department)?;
        let previous = self.get_user(target_id).await?;

        let updated = self
            .users
            .update_user_role(target_id, role, department)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

        self.audit.log_role_updated(actor, &updated, previous.role).await;
        tracing::info!(
            "User {} role changed {} -> {} by {}",
            updated.email,
            previous.role.to_str(),
            updated.role.to_str(),
            actor.email
        );
        Ok(updated)
    }

    pub async fn delete_user(&self, actor: &User, target_id: Uuid) -> Result<(), ServiceError> {
        ensure_super_admin(actor)?;
        if actor.id == target_id {
            return Err(ServiceError::Validation(
                "You cannot delete your own account".to_string(),
            ));
        }

        let target = self.get_user(target_id).await?;
        if !self.users.delete_user(target_id).await? {
            return Err(ServiceError::NotFound("User".to_string()));
        }

        self.audit.log_user_deleted(actor, &target).await;
        tracing::info!("User {} deleted by {}", target.email, actor.email);
        Ok(())
    }

    pub async fn list_users(
        &self,
        role: Option<UserRole>,
        search: Option<&str>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<User>, ServiceError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        Ok(self
            .users
            .get_users(role, search, limit as i64, ((page - 1) as i64) * limit as i64)
            .await?)
    }

    pub async fn system_audit_log(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SystemAuditEntry>, ServiceError> {
        self.audit.entries(since).await
    }

    async fn insert_account(&self, account: NewAccount) -> Result<User, ServiceError> {
        let email = account.email.trim().to_lowercase();
        let name = account.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Validation("Name is required".to_string()));
        }
        let department = department_for(account.role, account.department)?;

        if self.users.get_user(None, Some(&email)).await?.is_some() {
            return Err(ServiceError::AlreadyExists(ErrorMessage::EmailExist.to_string()));
        }

        let hashed = password::hash(account.password)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        self.users
            .save_user(NewUser {
                name,
                email,
                password: Some(hashed),
                role: account.role,
                department,
            })
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db_err) if db_err.is_unique_violation() => {
                    ServiceError::AlreadyExists(ErrorMessage::EmailExist.to_string())
                }
                _ => ServiceError::Database(e),
            })
    }
}

fn ensure_super_admin(actor: &User) -> Result<(), ServiceError> {
    if actor.role == UserRole::SuperAdmin {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(
            ErrorMessage::PermissionDenied.to_string(),
        ))
    }
}

/// Department accounts must carry a department; other roles never do.
fn department_for(
    role: UserRole,
    department: Option<Department>,
) -> Result<Option<Department>, ServiceError> {
    match (role, department) {
        (UserRole::Department, Some(d)) => Ok(Some(d)),
        (UserRole::Department, None) => Err(ServiceError::Validation(
            "Department accounts must be assigned a department".to_string(),
        )),
        _ => Ok(None),
    }
}
