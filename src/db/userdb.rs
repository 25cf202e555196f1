// db/userdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::complaintdb::contains_pattern;
use super::db::DBClient;
use crate::models::{
    complaintmodel::Department,
    usermodel::{NewSystemAuditEntry, NewUser, SystemAuditEntry, User, UserRole},
};

#[async_trait]
pub trait UserExt: Send + Sync {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn get_users(
        &self,
        role: Option<UserRole>,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn save_user(&self, user: NewUser) -> Result<User, sqlx::Error>;

    async fn update_user_role(
        &self,
        user_id: Uuid,
        role: UserRole,
        department: Option<Department>,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn log_system_action(&self, entry: NewSystemAuditEntry) -> Result<(), sqlx::Error>;

    async fn get_system_audit_log(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<SystemAuditEntry>, sqlx::Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn get_users(
        &self,
        role: Option<UserRole>,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, sqlx::Error> {
        let pattern = search
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(contains_pattern);

        sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::text IS NULL OR email ILIKE $2 OR name ILIKE $2)
            ORDER BY created_at DESC, seq DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(role)
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn save_user(&self, user: NewUser) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, role, department)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password)
        .bind(user.role)
        .bind(user.department)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user_role(
        &self,
        user_id: Uuid,
        role: UserRole,
        department: Option<Department>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $2, department = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(role)
        .bind(department)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn log_system_action(&self, entry: NewSystemAuditEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO system_audit_log (action, actor_id, actor_email, target_type, target_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.action)
        .bind(entry.actor_id)
        .bind(entry.actor_email)
        .bind(entry.target_type)
        .bind(entry.target_id)
        .bind(entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_system_audit_log(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<SystemAuditEntry>, sqlx::Error> {
        sqlx::query_as::<_, SystemAuditEntry>(
            r#"
            SELECT * FROM system_audit_log
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
            ORDER BY created_at DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
