// src/db/complaintdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::complaintmodel::*;

#[async_trait]
pub trait ComplaintExt: Send + Sync {
    /// Inserts the complaint and, when given, its origin fingerprint as one unit.
    async fn insert_complaint(
        &self,
        complaint: NewComplaint,
        fingerprint: Option<NewFingerprint>,
    ) -> Result<InsertOutcome, sqlx::Error>;

    async fn get_complaint(&self, complaint_id: Uuid) -> Result<Option<Complaint>, sqlx::Error>;

    async fn get_complaint_by_reference(
        &self,
        reference_number: &str,
    ) -> Result<Option<Complaint>, sqlx::Error>;

    /// Newest first, with the total row count before pagination.
    async fn list_complaints(
        &self,
        scope: ComplaintScope,
        filter: &ComplaintFilter,
    ) -> Result<(Vec<Complaint>, i64), sqlx::Error>;

    async fn count_by_status(&self, scope: ComplaintScope) -> Result<Vec<StatusCount>, sqlx::Error>;

    /// Applies `patch` and appends `audit` only if the complaint is still in
    /// `expected`. `Ok(None)` means the status moved underneath the caller.
    async fn apply_transition(
        &self,
        complaint_id: Uuid,
        expected: ComplaintStatus,
        patch: ComplaintPatch,
        audit: NewAuditEntry,
    ) -> Result<Option<Complaint>, sqlx::Error>;

    async fn get_audit_trail(&self, complaint_id: Uuid) -> Result<Vec<AuditEntry>, sqlx::Error>;

    async fn add_comment(&self, comment: NewComment) -> Result<Comment, sqlx::Error>;

    async fn get_comments(
        &self,
        complaint_id: Uuid,
        include_internal: bool,
    ) -> Result<Vec<Comment>, sqlx::Error>;

    async fn find_lapsed_resolutions(
        &self,
        resolved_before: DateTime<Utc>,
    ) -> Result<Vec<Complaint>, sqlx::Error>;

    async fn list_submissions(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<SubmissionRecord>, sqlx::Error>;
}

fn scope_params(scope: ComplaintScope) -> (Option<Uuid>, Option<Department>) {
    match scope {
        ComplaintScope::All => (None, None),
        ComplaintScope::Department(department) => (None, Some(department)),
        ComplaintScope::Owner(user_id) => (Some(user_id), None),
    }
}

fn search_pattern(filter: &ComplaintFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(contains_pattern)
}

/// `%q%` for ILIKE with `\`, `%` and `_` in `q` matched literally.
pub(crate) fn contains_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for ch in q.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

const SCOPED_WHERE: &str = r#"
    WHERE ($1::uuid IS NULL OR user_id = $1)
      AND ($2::department IS NULL OR (assigned_department = $2 AND status <> 'submitted'))
"#;

#[async_trait]
impl ComplaintExt for DBClient {
    async fn insert_complaint(
        &self,
        complaint: NewComplaint,
        fingerprint: Option<NewFingerprint>,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Complaint>(
            r#"
            INSERT INTO complaints (
                reference_number, category, description, attachment_url,
                name, email, student_id, is_anonymous, user_id,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'submitted', $10, $10)
            ON CONFLICT (reference_number) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&complaint.reference_number)
        .bind(complaint.category)
        .bind(&complaint.description)
        .bind(&complaint.attachment_url)
        .bind(&complaint.name)
        .bind(&complaint.email)
        .bind(&complaint.student_id)
        .bind(complaint.is_anonymous)
        .bind(complaint.user_id)
        .bind(complaint.created_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(created) = inserted else {
            tx.rollback().await?;
            return Ok(InsertOutcome::DuplicateReference);
        };

        if let Some(fingerprint) = fingerprint {
            // The unique (ip_address, day_bucket) key makes the check and the
            // record a single step; a concurrent winner leaves zero rows here.
            let recorded = sqlx::query(
                r#"
                INSERT INTO complaint_submissions (
                    ip_address, complaint_id, reference_number, user_agent, day_bucket, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (ip_address, day_bucket) DO NOTHING
                "#,
            )
            .bind(&fingerprint.ip_address)
            .bind(created.id)
            .bind(&created.reference_number)
            .bind(&fingerprint.user_agent)
            .bind(fingerprint.day_bucket)
            .bind(created.created_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if recorded == 0 {
                tx.rollback().await?;
                return Ok(InsertOutcome::RateLimited);
            }
        }

        tx.commit().await?;

        Ok(InsertOutcome::Created(created))
    }

    async fn get_complaint(&self, complaint_id: Uuid) -> Result<Option<Complaint>, sqlx::Error> {
        sqlx::query_as::<_, Complaint>("SELECT * FROM complaints WHERE id = $1")
            .bind(complaint_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_complaint_by_reference(
        &self,
        reference_number: &str,
    ) -> Result<Option<Complaint>, sqlx::Error> {
        sqlx::query_as::<_, Complaint>("SELECT * FROM complaints WHERE reference_number = $1")
            .bind(reference_number)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_complaints(
        &self,
        scope: ComplaintScope,
        filter: &ComplaintFilter,
    ) -> Result<(Vec<Complaint>, i64), sqlx::Error> {
        let (owner, department) = scope_params(scope);
        let pattern = search_pattern(filter);

        let filtered_where = format!(
            r#"{}
              AND ($3::complaint_status IS NULL OR status = $3)
              AND ($4::text IS NULL
                   OR reference_number ILIKE $4
                   OR name ILIKE $4
                   OR category::text ILIKE $4
                   OR description ILIKE $4)
            "#,
            SCOPED_WHERE
        );

        let complaints = sqlx::query_as::<_, Complaint>(&format!(
            "SELECT * FROM complaints {} ORDER BY created_at DESC, seq DESC LIMIT $5 OFFSET $6",
            filtered_where
        ))
        .bind(owner)
        .bind(department)
        .bind(filter.status)
        .bind(pattern.as_deref())
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM complaints {}",
            filtered_where
        ))
        .bind(owner)
        .bind(department)
        .bind(filter.status)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok((complaints, total))
    }

    async fn count_by_status(&self, scope: ComplaintScope) -> Result<Vec<StatusCount>, sqlx::Error> {
        let (owner, department) = scope_params(scope);

        sqlx::query_as::<_, StatusCount>(&format!(
            "SELECT status, COUNT(*) AS count FROM complaints {} GROUP BY status",
            SCOPED_WHERE
        ))
        .bind(owner)
        .bind(department)
        .fetch_all(&self.pool)
        .await
    }

    async fn apply_transition(
        &self,
        complaint_id: Uuid,
        expected: ComplaintStatus,
        patch: ComplaintPatch,
        audit: NewAuditEntry,
    ) -> Result<Option<Complaint>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Complaint>(
            r#"
            UPDATE complaints SET
                status = COALESCE($3::complaint_status, status),
                assigned_department = COALESCE($4::department, assigned_department),
                admin_remarks = COALESCE($5, admin_remarks),
                department_remarks = COALESCE($6, department_remarks),
                resolution_details = COALESCE($7, resolution_details),
                resolution_image_url = COALESCE($8, resolution_image_url),
                dispute_reason = COALESCE($9, dispute_reason),
                user_verified = COALESCE($10, user_verified),
                verified_by = COALESCE($11, verified_by),
                verified_at = COALESCE($12, verified_at),
                started_by = COALESCE($13, started_by),
                started_at = COALESCE($14, started_at),
                resolved_by = COALESCE($15, resolved_by),
                resolved_at = COALESCE($16, resolved_at),
                closed_at = COALESCE($17, closed_at),
                disputed_at = COALESCE($18, disputed_at),
                updated_at = COALESCE($19, NOW())
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(complaint_id)
        .bind(expected)
        .bind(patch.status)
        .bind(patch.assigned_department)
        .bind(patch.admin_remarks)
        .bind(patch.department_remarks)
        .bind(patch.resolution_details)
        .bind(patch.resolution_image_url)
        .bind(patch.dispute_reason)
        .bind(patch.user_verified)
        .bind(patch.verified_by)
        .bind(patch.verified_at)
        .bind(patch.started_by)
        .bind(patch.started_at)
        .bind(patch.resolved_by)
        .bind(patch.resolved_at)
        .bind(patch.closed_at)
        .bind(patch.disputed_at)
        .bind(patch.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(complaint) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO audit_trail (complaint_id, action, performed_by, details, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(audit.complaint_id)
        .bind(&audit.action)
        .bind(audit.performed_by)
        .bind(&audit.details)
        .bind(audit.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(complaint))
    }

    async fn get_audit_trail(&self, complaint_id: Uuid) -> Result<Vec<AuditEntry>, sqlx::Error> {
        sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT * FROM audit_trail
            WHERE complaint_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(complaint_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn add_comment(&self, comment: NewComment) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO ticket_comments (complaint_id, author_name, author_type, content, is_internal, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(comment.complaint_id)
        .bind(comment.author_name)
        .bind(comment.author_type)
        .bind(comment.content)
        .bind(comment.is_internal)
        .bind(comment.created_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_comments(
        &self,
        complaint_id: Uuid,
        include_internal: bool,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT * FROM ticket_comments
            WHERE complaint_id = $1 AND ($2 OR is_internal = FALSE)
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(complaint_id)
        .bind(include_internal)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_lapsed_resolutions(
        &self,
        resolved_before: DateTime<Utc>,
    ) -> Result<Vec<Complaint>, sqlx::Error> {
        sqlx::query_as::<_, Complaint>(
            r#"
            SELECT * FROM complaints
            WHERE status = 'resolved' AND resolved_at <= $1
            ORDER BY resolved_at ASC, seq ASC
            "#,
        )
        .bind(resolved_before)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_submissions(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<SubmissionRecord>, sqlx::Error> {
        sqlx::query_as::<_, SubmissionRecord>(
            r#"
            SELECT s.*, c.category, c.status, c.name
            FROM complaint_submissions s
            JOIN complaints c ON c.id = s.complaint_id
            WHERE ($1::timestamptz IS NULL OR s.created_at >= $1)
            ORDER BY s.created_at DESC, s.seq DESC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
