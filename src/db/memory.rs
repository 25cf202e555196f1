// db/memory.rs
//
// In-process store with the same observable semantics as the Postgres client:
// unique references, one fingerprint per origin and day, and transitions that
// only apply while the complaint is still in the expected status.
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{complaintdb::ComplaintExt, userdb::UserExt};
use crate::models::{
    complaintmodel::*,
    usermodel::{NewSystemAuditEntry, NewUser, SystemAuditEntry, User, UserRole},
};

#[derive(Default)]
struct State {
    complaints: Vec<Complaint>,
    audit_trail: Vec<AuditEntry>,
    comments: Vec<Comment>,
    fingerprints: Vec<SubmissionFingerprint>,
    users: Vec<User>,
    system_log: Vec<SystemAuditEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complaint_count(&self) -> usize {
        self.state.lock().unwrap().complaints.len()
    }

    pub fn fingerprints(&self) -> Vec<SubmissionFingerprint> {
        self.state.lock().unwrap().fingerprints.clone()
    }

    pub fn system_log(&self) -> Vec<SystemAuditEntry> {
        self.state.lock().unwrap().system_log.clone()
    }

    pub fn put_user(&self, user: User) {
        self.state.lock().unwrap().users.push(user);
    }

    /// Edits a stored complaint directly, bypassing the lifecycle.
    pub fn edit_complaint(&self, complaint_id: Uuid, edit: impl FnOnce(&mut Complaint)) {
        let mut state = self.state.lock().unwrap();
        if let Some(complaint) = state.complaints.iter_mut().find(|c| c.id == complaint_id) {
            edit(complaint);
        }
    }
}

#[async_trait]
impl ComplaintExt for MemoryStore {
    async fn insert_complaint(
        &self,
        complaint: NewComplaint,
        fingerprint: Option<NewFingerprint>,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let mut state = self.state.lock().unwrap();

        if state
            .complaints
            .iter()
            .any(|c| c.reference_number == complaint.reference_number)
        {
            return Ok(InsertOutcome::DuplicateReference);
        }

        if let Some(fp) = &fingerprint {
            if state
                .fingerprints
                .iter()
                .any(|f| f.ip_address == fp.ip_address && f.day_bucket == fp.day_bucket)
            {
                return Ok(InsertOutcome::RateLimited);
            }
        }

        let created = Complaint {
            id: Uuid::new_v4(),
            reference_number: complaint.reference_number,
            category: complaint.category,
            description: complaint.description,
            attachment_url: complaint.attachment_url,
            name: complaint.name,
            email: complaint.email,
            student_id: complaint.student_id,
            is_anonymous: complaint.is_anonymous,
            user_id: complaint.user_id,
            status: ComplaintStatus::Submitted,
            assigned_department: None,
            admin_remarks: None,
            department_remarks: None,
            resolution_details: None,
            resolution_image_url: None,
            dispute_reason: None,
            user_verified: false,
            verified_by: None,
            verified_at: None,
            started_by: None,
            started_at: None,
            resolved_by: None,
            resolved_at: None,
            closed_at: None,
            disputed_at: None,
            created_at: complaint.created_at,
            updated_at: complaint.created_at,
        };

        if let Some(fp) = fingerprint {
            state.fingerprints.push(SubmissionFingerprint {
                id: Uuid::new_v4(),
                ip_address: fp.ip_address,
                complaint_id: created.id,
                reference_number: created.reference_number.clone(),
                user_agent: fp.user_agent,
                day_bucket: fp.day_bucket,
                created_at: created.created_at,
            });
        }
        state.complaints.push(created.clone());

        Ok(InsertOutcome::Created(created))
    }

    async fn get_complaint(&self, complaint_id: Uuid) -> Result<Option<Complaint>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.complaints.iter().find(|c| c.id == complaint_id).cloned())
    }

    async fn get_complaint_by_reference(
        &self,
        reference_number: &str,
    ) -> Result<Option<Complaint>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .complaints
            .iter()
            .find(|c| c.reference_number == reference_number)
            .cloned())
    }

    async fn list_complaints(
        &self,
        scope: ComplaintScope,
        filter: &ComplaintFilter,
    ) -> Result<(Vec<Complaint>, i64), sqlx::Error> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<Complaint> = state
            .complaints
            .iter()
            .rev()
            .filter(|c| scope.includes(c) && filter.matches(c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }

    async fn count_by_status(&self, scope: ComplaintScope) -> Result<Vec<StatusCount>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(ComplaintStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: state
                    .complaints
                    .iter()
                    .filter(|c| c.status == status && scope.includes(c))
                    .count() as i64,
            })
            .filter(|sc| sc.count > 0)
            .collect())
    }

    async fn apply_transition(
        &self,
        complaint_id: Uuid,
        expected: ComplaintStatus,
        patch: ComplaintPatch,
        audit: NewAuditEntry,
    ) -> Result<Option<Complaint>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();

        let Some(complaint) = state
            .complaints
            .iter_mut()
            .find(|c| c.id == complaint_id && c.status == expected)
        else {
            return Ok(None);
        };

        patch.apply_to(complaint);
        let updated = complaint.clone();

        state.audit_trail.push(AuditEntry {
            id: Uuid::new_v4(),
            complaint_id: audit.complaint_id,
            action: audit.action,
            performed_by: audit.performed_by,
            details: audit.details,
            created_at: audit.created_at,
        });

        Ok(Some(updated))
    }

    async fn get_audit_trail(&self, complaint_id: Uuid) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<AuditEntry> = state
            .audit_trail
            .iter()
            .filter(|e| e.complaint_id == complaint_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn add_comment(&self, comment: NewComment) -> Result<Comment, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let stored = Comment {
            id: Uuid::new_v4(),
            complaint_id: comment.complaint_id,
            author_name: comment.author_name,
            author_type: comment.author_type,
            content: comment.content,
            is_internal: comment.is_internal,
            created_at: comment.created_at,
        };
        state.comments.push(stored.clone());
        Ok(stored)
    }

    async fn get_comments(
        &self,
        complaint_id: Uuid,
        include_internal: bool,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.complaint_id == complaint_id && (include_internal || !c.is_internal))
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn find_lapsed_resolutions(
        &self,
        resolved_before: DateTime<Utc>,
    ) -> Result<Vec<Complaint>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .complaints
            .iter()
            .filter(|c| {
                c.status == ComplaintStatus::Resolved
                    && c.resolved_at.is_some_and(|at| at <= resolved_before)
            })
            .cloned()
            .collect())
    }

    async fn list_submissions(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<SubmissionRecord>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<SubmissionRecord> = state
            .fingerprints
            .iter()
            .rev()
            .filter(|f| since.map_or(true, |s| f.created_at >= s))
            .filter_map(|f| {
                let complaint = state.complaints.iter().find(|c| c.id == f.complaint_id)?;
                Some(SubmissionRecord {
                    fingerprint: f.clone(),
                    category: complaint.category,
                    status: complaint.status,
                    name: complaint.name.clone(),
                })
            })
            .collect();
        records.sort_by(|a, b| b.fingerprint.created_at.cmp(&a.fingerprint.created_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}

#[async_trait]
impl UserExt for MemoryStore {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let found = if let Some(user_id) = user_id {
            state.users.iter().find(|u| u.id == user_id)
        } else if let Some(email) = email {
            state.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
        } else {
            None
        };
        Ok(found.cloned())
    }

    async fn get_users(
        &self,
        role: Option<UserRole>,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let mut users: Vec<User> = state
            .users
            .iter()
            .rev()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .filter(|u| {
                needle.as_ref().map_or(true, |n| {
                    u.email.to_lowercase().contains(n) || u.name.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn save_user(&self, user: NewUser) -> Result<User, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(sqlx::Error::Protocol(format!("duplicate email {}", user.email)));
        }
        let now = Utc::now();
        let saved = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password: user.password,
            role: user.role,
            department: user.department,
            created_at: now,
            updated_at: now,
        };
        state.users.push(saved.clone());
        Ok(saved)
    }

    async fn update_user_role(
        &self,
        user_id: Uuid,
        role: UserRole,
        department: Option<Department>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        Ok(state.users.iter_mut().find(|u| u.id == user_id).map(|u| {
            u.role = role;
            u.department = department;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.users.len();
        state.users.retain(|u| u.id != user_id);
        Ok(state.users.len() < before)
    }

    async fn log_system_action(&self, entry: NewSystemAuditEntry) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.system_log.push(SystemAuditEntry {
            id: Uuid::new_v4(),
            action: entry.action,
            actor_id: entry.actor_id,
            actor_email: entry.actor_email,
            target_type: entry.target_type,
            target_id: entry.target_id,
            details: entry.details,
            created_at: entry.created_at,
        });
        Ok(())
    }

    async fn get_system_audit_log(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<SystemAuditEntry>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<SystemAuditEntry> = state
            .system_log
            .iter()
            .rev()
            .filter(|e| since.map_or(true, |s| e.created_at >= s))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::student;

    #[tokio::test]
    async fn newest_first_listings_break_timestamp_ties_by_insertion() {
        let store = MemoryStore::new();
        let (first, second, third) = (student(), student(), student());
        for u in [&first, &second, &third] {
            store.put_user(u.clone());
        }

        let listed = store.get_users(None, None, 10, 0).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }
}
