// service/complaint_service.rs
use std::{collections::HashMap, str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    db::complaintdb::ComplaintExt,
    mail::sendmail::validate_email,
    models::complaintmodel::*,
    service::{
        error::ServiceError,
        lifecycle::{Actor, Lifecycle, Transition, TransitionKind},
        notification_service::NotificationService,
        storage_service::AttachmentStorage,
    },
    utils::{
        image_utils::parse_image_data_url,
        reference::{normalize_reference, ReferenceSource},
    },
};

pub const MAX_REFERENCE_ATTEMPTS: usize = 5;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_COMMENT_CHARS: usize = 2000;
const REPORT_LIMIT: i64 = 100;

/// Caller identity and clock for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Actor,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(actor: Actor, now: DateTime<Utc>) -> Self {
        Self { actor, now }
    }

    pub fn system(now: DateTime<Utc>) -> Self {
        Self {
            actor: Actor::System,
            now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSubmission {
    pub category: String,
    pub description: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub is_anonymous: bool,
    /// `data:image/...;base64,` payload.
    pub attachment: Option<String>,
    pub origin: SubmissionOrigin,
}

#[derive(Debug, Clone, Default)]
pub struct NewCommentInput {
    pub content: String,
    pub is_internal: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ComplaintQuery {
    pub status: Option<ComplaintStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplaintDetails {
    pub complaint: Complaint,
    pub audit_trail: Vec<AuditEntry>,
    pub comments: Vec<Comment>,
    /// Only set while the complaint is resolved.
    pub remaining_days: Option<i64>,
    pub allowed_transitions: Vec<TransitionKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplaintPage {
    pub complaints: Vec<Complaint>,
    pub total: i64,
    pub page: u32,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplaintStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportRange {
    #[default]
    Today,
    Week,
    Month,
    All,
}

impl ReportRange {
    /// Lower bound of the range; `Today` starts at local midnight in `offset`.
    pub fn since(&self, now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        match self {
            ReportRange::Today => {
                let local_midnight = now.with_timezone(&offset).date_naive().and_hms_opt(0, 0, 0)?;
                offset
                    .from_local_datetime(&local_midnight)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
            }
            ReportRange::Week => Some(now - Duration::days(7)),
            ReportRange::Month => Some(now - Duration::days(30)),
            ReportRange::All => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComplaintSettings {
    pub window_days: i64,
    pub utc_offset_hours: i32,
    pub max_attachment_mb: usize,
}

impl ComplaintSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_days: config.verification_window_days,
            utc_offset_hours: config.rate_limit_utc_offset_hours,
            max_attachment_mb: config.max_attachment_mb,
        }
    }
}

impl Default for ComplaintSettings {
    fn default() -> Self {
        Self {
            window_days: 7,
            utc_offset_hours: 8,
            max_attachment_mb: 5,
        }
    }
}

#[derive(Clone)]
pub struct ComplaintService {
    store: Arc<dyn ComplaintExt>,
    references: Arc<dyn ReferenceSource>,
    storage: Arc<dyn AttachmentStorage>,
    notifications: NotificationService,
    lifecycle: Lifecycle,
    day_offset: FixedOffset,
    max_attachment_mb: usize,
}

impl ComplaintService {
    pub fn new(
        store: Arc<dyn ComplaintExt>,
        references: Arc<dyn ReferenceSource>,
        storage: Arc<dyn AttachmentStorage>,
        notifications: NotificationService,
        settings: ComplaintSettings,
    ) -> Self {
        let day_offset = FixedOffset::east_opt(settings.utc_offset_hours * 3600).unwrap_or_else(|| {
            tracing::warn!(
                "Invalid rate limit UTC offset {}h, falling back to UTC",
                settings.utc_offset_hours
            );
            Utc.fix()
        });

        Self {
            store,
            references,
            storage,
            notifications,
            lifecycle: Lifecycle::new(settings.window_days),
            day_offset,
            max_attachment_mb: settings.max_attachment_mb,
        }
    }

    pub fn day_offset(&self) -> FixedOffset {
        self.day_offset
    }

    /// Calendar day of `now` in the limiter's timezone.
    pub fn day_bucket(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.day_offset).date_naive()
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        submission: NewSubmission,
    ) -> Result<Complaint, ServiceError> {
        let category = ComplaintCategory::from_str(submission.category.trim())
            .map_err(|_| ServiceError::Validation("Please select a category".to_string()))?;

        let description = submission.description.trim().to_string();
        if description.is_empty() {
            return Err(ServiceError::Validation(
                "Please describe your complaint".to_string(),
            ));
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ServiceError::Validation(format!(
                "Description must not exceed {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }

        let email = normalize_email(submission.email)?;
        let is_anonymous = submission.is_anonymous;
        let name = match trimmed(submission.name) {
            Some(name) if !is_anonymous => name,
            _ => ANONYMOUS_NAME.to_string(),
        };
        let student_id = if is_anonymous {
            None
        } else {
            trimmed(submission.student_id)
        };
        let user_id = match ctx.actor {
            Actor::Submitter { account_id } => account_id,
            _ => None,
        };

        let attachment_url = self
            .store_attachment("complaints", submission.attachment)
            .await?;

        let fingerprint = match submission.origin.ip_address {
            Some(ip_address) => Some(NewFingerprint {
                ip_address,
                user_agent: submission.origin.user_agent,
                day_bucket: self.day_bucket(ctx.now),
            }),
            None => {
                tracing::warn!("Submission origin unknown, daily limit not applied");
                None
            }
        };

        for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
            let reference_number = normalize_reference(&self.references.next_reference(ctx.now));
            let complaint = NewComplaint {
                reference_number: reference_number.clone(),
                category,
                description: description.clone(),
                attachment_url: attachment_url.clone(),
                name: name.clone(),
                email: email.clone(),
                student_id: student_id.clone(),
                is_anonymous,
                user_id,
                created_at: ctx.now,
            };

            match self.store.insert_complaint(complaint, fingerprint.clone()).await? {
                InsertOutcome::Created(created) => {
                    tracing::info!(
                        "Complaint {} submitted ({})",
                        created.reference_number,
                        created.category.to_str()
                    );
                    self.notifications.notify_submission(&created);
                    return Ok(created);
                }
                InsertOutcome::DuplicateReference => {
                    tracing::warn!(
                        "Reference {} already taken (attempt {}/{})",
                        reference_number,
                        attempt,
                        MAX_REFERENCE_ATTEMPTS
                    );
                }
                InsertOutcome::RateLimited => {
                    tracing::warn!(
                        "Submission refused, origin already submitted on {}",
                        self.day_bucket(ctx.now)
                    );
                    return Err(ServiceError::RateLimited);
                }
            }
        }

        tracing::error!(
            "Could not allocate a unique reference after {} attempts",
            MAX_REFERENCE_ATTEMPTS
        );
        Err(ServiceError::DuplicateReference)
    }

    /// Checks and uploads a data-URL image. Anything else, links included, is refused
    /// so every stored attachment went through the type and size checks.
    pub async fn store_attachment(
        &self,
        folder: &str,
        attachment: Option<String>,
    ) -> Result<Option<String>, ServiceError> {
        let Some(raw) = trimmed(attachment) else {
            return Ok(None);
        };

        let image = parse_image_data_url(&raw, self.max_attachment_mb)
            .map_err(ServiceError::Validation)?;
        let url = self.storage.upload(folder, image).await?;
        Ok(Some(url))
    }

    pub async fn transition(
        &self,
        ctx: &RequestContext,
        complaint_id: Uuid,
        transition: Transition,
    ) -> Result<Complaint, ServiceError> {
        let complaint = self.get(complaint_id).await?;
        self.apply(ctx, complaint, transition).await
    }

    pub async fn transition_by_reference(
        &self,
        ctx: &RequestContext,
        reference: &str,
        transition: Transition,
    ) -> Result<Complaint, ServiceError> {
        let complaint = self.find_by_reference(reference).await?;
        self.apply(ctx, complaint, transition).await
    }

    async fn apply(
        &self,
        ctx: &RequestContext,
        complaint: Complaint,
        transition: Transition,
    ) -> Result<Complaint, ServiceError> {
        let plan = self
            .lifecycle
            .plan(&complaint, &ctx.actor, transition, ctx.now)?;
        let kind = plan.kind;

        let updated = self
            .store
            .apply_transition(complaint.id, plan.expected_status, plan.patch, plan.audit)
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    "Complaint {} left {} before '{}' was applied",
                    complaint.reference_number,
                    plan.expected_status,
                    kind.action_label()
                );
                ServiceError::Conflict
            })?;

        tracing::info!(
            "Complaint {}: {} by {}",
            updated.reference_number,
            kind.action_label(),
            ctx.actor.describe()
        );

        self.notifications.notify_transition(&updated, kind);

        Ok(updated)
    }

    pub async fn get(&self, complaint_id: Uuid) -> Result<Complaint, ServiceError> {
        self.store
            .get_complaint(complaint_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Complaint".to_string()))
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Complaint, ServiceError> {
        self.store
            .get_complaint_by_reference(&normalize_reference(reference))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Complaint".to_string()))
    }

    /// Loads a complaint the caller may see through the authenticated views.
    pub async fn visible_complaint(
        &self,
        ctx: &RequestContext,
        complaint_id: Uuid,
    ) -> Result<Complaint, ServiceError> {
        let scope = scope_for(&ctx.actor)?;
        let complaint = self.get(complaint_id).await?;
        if !scope.includes(&complaint) {
            return Err(ServiceError::Unauthorized(
                "This complaint is outside your view".to_string(),
            ));
        }
        Ok(complaint)
    }

    /// Public tracking view: no internal comments. A signed-in submitter must own the
    /// complaint when an owner is recorded, as for comments and confirmation.
    pub async fn track(
        &self,
        ctx: &RequestContext,
        reference: &str,
    ) -> Result<ComplaintDetails, ServiceError> {
        let complaint = self.find_by_reference(reference).await?;
        if let Actor::Submitter { account_id } = &ctx.actor {
            ensure_submitter_access(&complaint, *account_id)?;
        }
        self.details(ctx, complaint, false).await
    }

    pub async fn details_for_staff(
        &self,
        ctx: &RequestContext,
        complaint_id: Uuid,
    ) -> Result<ComplaintDetails, ServiceError> {
        let complaint = self.visible_complaint(ctx, complaint_id).await?;
        let include_internal = ctx.actor.is_staff();
        self.details(ctx, complaint, include_internal).await
    }

    async fn details(
        &self,
        ctx: &RequestContext,
        complaint: Complaint,
        include_internal: bool,
    ) -> Result<ComplaintDetails, ServiceError> {
        let audit_trail = self.store.get_audit_trail(complaint.id).await?;
        let comments = self.store.get_comments(complaint.id, include_internal).await?;
        let remaining_days = (complaint.status == ComplaintStatus::Resolved)
            .then(|| self.lifecycle.remaining_days(complaint.resolved_at, ctx.now));
        let allowed_transitions = self.lifecycle.allowed(&complaint, &ctx.actor, ctx.now);

        Ok(ComplaintDetails {
            complaint,
            audit_trail,
            comments,
            remaining_days,
            allowed_transitions,
        })
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        query: ComplaintQuery,
    ) -> Result<ComplaintPage, ServiceError> {
        let scope = scope_for(&ctx.actor)?;
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);

        let filter = ComplaintFilter {
            status: query.status,
            search: trimmed(query.search),
            limit: limit as i64,
            offset: ((page - 1) as i64) * limit as i64,
        };

        let (complaints, total) = self.store.list_complaints(scope, &filter).await?;

        Ok(ComplaintPage {
            complaints,
            total,
            page,
            limit,
        })
    }

    pub async fn stats(&self, ctx: &RequestContext) -> Result<ComplaintStats, ServiceError> {
        let scope = scope_for(&ctx.actor)?;
        let counts = self.store.count_by_status(scope).await?;

        let by_status: Vec<StatusCount> = ComplaintStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: counts
                    .iter()
                    .find(|c| c.status == status)
                    .map(|c| c.count)
                    .unwrap_or(0),
            })
            .collect();

        Ok(ComplaintStats {
            total: by_status.iter().map(|c| c.count).sum(),
            by_status,
        })
    }

    pub async fn post_comment(
        &self,
        ctx: &RequestContext,
        complaint: &Complaint,
        input: NewCommentInput,
    ) -> Result<Comment, ServiceError> {
        let content = input.content.trim().to_string();
        if content.is_empty() {
            return Err(ServiceError::Validation("Comment cannot be empty".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(ServiceError::Validation(format!(
                "Comment must not exceed {} characters",
                MAX_COMMENT_CHARS
            )));
        }

        let (author_name, author_type, is_internal) = match &ctx.actor {
            Actor::Submitter { account_id } => {
                ensure_submitter_access(complaint, *account_id)?;
                (complaint.name.clone(), AuthorType::Complainant, false)
            }
            Actor::Staff { name, role, .. } => {
                if !scope_for(&ctx.actor)?.includes(complaint) {
                    return Err(ServiceError::Unauthorized(
                        "This complaint is outside your view".to_string(),
                    ));
                }
                (name.clone(), role.author_type(), input.is_internal)
            }
            Actor::System => {
                return Err(ServiceError::Unauthorized(
                    "The system does not post comments".to_string(),
                ))
            }
        };

        let comment = self
            .store
            .add_comment(NewComment {
                complaint_id: complaint.id,
                author_name,
                author_type,
                content,
                is_internal,
                created_at: ctx.now,
            })
            .await?;

        tracing::info!(
            "Comment added to {} by {}{}",
            complaint.reference_number,
            ctx.actor.describe(),
            if comment.is_internal { " (internal)" } else { "" }
        );

        Ok(comment)
    }

    pub async fn comments(
        &self,
        ctx: &RequestContext,
        complaint: &Complaint,
    ) -> Result<Vec<Comment>, ServiceError> {
        let include_internal = match &ctx.actor {
            Actor::Staff { .. } => true,
            Actor::Submitter { account_id } => {
                ensure_submitter_access(complaint, *account_id)?;
                false
            }
            Actor::System => false,
        };

        Ok(self.store.get_comments(complaint.id, include_internal).await?)
    }

    /// Closes every resolved complaint whose verification window has lapsed.
    pub async fn close_lapsed(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let lapsed = self
            .store
            .find_lapsed_resolutions(self.lifecycle.lapsed_before(now))
            .await?;
        let ctx = RequestContext::system(now);
        let mut closed = 0;

        for complaint in lapsed {
            let reference = complaint.reference_number.clone();
            match self.apply(&ctx, complaint, Transition::AutoClose).await {
                Ok(_) => closed += 1,
                Err(ServiceError::Conflict) | Err(ServiceError::InvalidTransition { .. }) => {
                    tracing::debug!("Complaint {} moved on before auto-close", reference);
                }
                Err(e) => {
                    tracing::error!("Failed to auto-close complaint {}: {}", reference, e);
                }
            }
        }

        Ok(closed)
    }

    /// Fingerprints grouped by origin, busiest recent origins first.
    pub async fn submission_report(
        &self,
        range: ReportRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<OriginActivity>, ServiceError> {
        let records = self
            .store
            .list_submissions(range.since(now, self.day_offset), REPORT_LIMIT)
            .await?;

        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<SubmissionRecord>> = HashMap::new();
        for record in records {
            let ip = record.fingerprint.ip_address.clone();
            if !grouped.contains_key(&ip) {
                order.push(ip.clone());
            }
            grouped.entry(ip).or_default().push(record);
        }

        let mut report: Vec<OriginActivity> = order
            .into_iter()
            .filter_map(|ip| {
                let submissions = grouped.remove(&ip)?;
                let last = submissions.iter().map(|s| s.fingerprint.created_at).max()?;
                let first = submissions.iter().map(|s| s.fingerprint.created_at).min()?;
                let user_agent = submissions
                    .iter()
                    .max_by_key(|s| s.fingerprint.created_at)
                    .and_then(|s| s.fingerprint.user_agent.clone());
                Some(OriginActivity {
                    ip_address: ip,
                    user_agent,
                    submission_count: submissions.len(),
                    first_submission: first,
                    last_submission: last,
                    submissions,
                })
            })
            .collect();

        report.sort_by(|a, b| {
            b.submission_count
                .cmp(&a.submission_count)
                .then(b.last_submission.cmp(&a.last_submission))
        });

        Ok(report)
    }
}

/// Which complaints the actor sees in the authenticated list views.
pub fn scope_for(actor: &Actor) -> Result<ComplaintScope, ServiceError> {
    match actor {
        Actor::Staff { role, .. } if role.is_admin() => Ok(ComplaintScope::All),
        Actor::Staff {
            department: Some(department),
            ..
        } => Ok(ComplaintScope::Department(*department)),
        Actor::Staff { .. } => Err(ServiceError::Unauthorized(
            "Department account has no department assigned".to_string(),
        )),
        Actor::Submitter {
            account_id: Some(user_id),
        } => Ok(ComplaintScope::Owner(*user_id)),
        _ => Err(ServiceError::Unauthorized(
            "Sign in to view complaints".to_string(),
        )),
    }
}

fn ensure_submitter_access(
    complaint: &Complaint,
    account_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    match (complaint.user_id, account_id) {
        (Some(owner), Some(account)) if owner != account => Err(ServiceError::Unauthorized(
            "This complaint belongs to another account".to_string(),
        )),
        _ => Ok(()),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_email(email: Option<String>) -> Result<Option<String>, ServiceError> {
    match trimmed(email) {
        Some(email) => {
            let email = email.to_lowercase();
            validate_email(&email)
                .map_err(|_| ServiceError::Validation("Please enter a valid email address".to_string()))?;
            Ok(Some(email))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        db::memory::MemoryStore,
        mail::sendmail::testing::RecordingMailer,
        service::storage_service::testing::FakeStorage,
        test_utils::{admin, department_staff, student, ts},
    };

    struct SequenceReference {
        queue: Mutex<Vec<String>>,
    }

    impl SequenceReference {
        fn new(references: &[&str]) -> Self {
            let mut queue: Vec<String> = references.iter().map(|r| r.to_string()).collect();
            queue.reverse();
            Self {
                queue: Mutex::new(queue),
            }
        }
    }

    impl ReferenceSource for SequenceReference {
        fn next_reference(&self, now: DateTime<Utc>) -> String {
            let mut queue = self.queue.lock().unwrap();
            match queue.len() {
                0 => crate::utils::reference::generate_reference("LDCU", now),
                1 => queue[0].clone(),
                _ => queue.pop().unwrap(),
            }
        }
    }

    fn service_with(store: Arc<MemoryStore>, references: Arc<dyn ReferenceSource>) -> ComplaintService {
        ComplaintService::new(
            store,
            references,
            Arc::new(FakeStorage::default()),
            NotificationService::new(Arc::new(RecordingMailer::default()), "http://desk.test", 7),
            ComplaintSettings::default(),
        )
    }

    fn service(store: Arc<MemoryStore>) -> ComplaintService {
        service_with(
            store,
            Arc::new(crate::utils::reference::RandomReference::new("LDCU")),
        )
    }

    fn submission(ip: Option<&str>) -> NewSubmission {
        NewSubmission {
            category: "facilities".to_string(),
            description: "Broken chair in room 204".to_string(),
            name: Some("Maria Santos".to_string()),
            email: Some("Maria@Campus.test".to_string()),
            student_id: Some("2021-00123".to_string()),
            is_anonymous: false,
            attachment: None,
            origin: SubmissionOrigin {
                ip_address: ip.map(str::to_string),
                user_agent: Some("test-agent".to_string()),
            },
        }
    }

    fn anon(now: DateTime<Utc>) -> RequestContext {
        RequestContext::new(Actor::anonymous(), now)
    }

    fn as_user(user: &crate::models::usermodel::User, now: DateTime<Utc>) -> RequestContext {
        RequestContext::new(Actor::from_user(user), now)
    }

    #[tokio::test]
    async fn full_lifecycle_from_submission_to_confirmation() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        let admin = admin();
        let staff = department_staff(Department::Facilities);

        let complaint = service.submit(&anon(ts(0)), submission(Some("10.0.0.1"))).await.unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Submitted);
        assert!(complaint.reference_number.starts_with("LDCU-"));
        assert_eq!(complaint.reference_number, complaint.reference_number.to_uppercase());
        assert_eq!(complaint.email.as_deref(), Some("maria@campus.test"));
        assert!(store.get_audit_trail(complaint.id).await.unwrap().is_empty());

        let verified = service
            .transition(
                &as_user(&admin, ts(10)),
                complaint.id,
                Transition::Verify {
                    department: Some(Department::Facilities),
                    remarks: Some("please check".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(verified.status, ComplaintStatus::Verified);
        assert_eq!(verified.assigned_department, Some(Department::Facilities));
        assert_eq!(store.get_audit_trail(complaint.id).await.unwrap().len(), 1);

        service
            .transition(&as_user(&staff, ts(20)), complaint.id, Transition::Start { remarks: None })
            .await
            .unwrap();

        let resolved = service
            .transition(
                &as_user(&staff, ts(30)),
                complaint.id,
                Transition::Resolve {
                    details: Some("replaced chair".into()),
                    attachment_url: Some("https://storage.test/fix.png".into()),
                    remarks: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resolved.resolved_at, Some(ts(30)));

        let tracked = service.track(&anon(ts(40)), &complaint.reference_number.to_lowercase()).await.unwrap();
        assert_eq!(tracked.remaining_days, Some(7));
        assert_eq!(
            tracked.allowed_transitions,
            vec![TransitionKind::Confirm, TransitionKind::Dispute]
        );

        let closed = service
            .transition_by_reference(&anon(ts(24 * 60 * 3)), &complaint.reference_number, Transition::Confirm)
            .await
            .unwrap();
        assert_eq!(closed.status, ComplaintStatus::Closed);
        assert!(closed.user_verified);

        let actions: Vec<String> = store
            .get_audit_trail(complaint.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                "Complaint Verified",
                "Started Processing",
                "Complaint Resolved",
                "Resolution Confirmed by User"
            ]
        );
    }

    #[tokio::test]
    async fn second_submission_from_the_same_origin_on_the_same_day_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        service.submit(&anon(ts(0)), submission(Some("10.0.0.1"))).await.unwrap();
        let err = service
            .submit(&anon(ts(60)), submission(Some("10.0.0.1")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited));
        assert_eq!(store.complaint_count(), 1);

        service.submit(&anon(ts(60)), submission(Some("10.0.0.2"))).await.unwrap();
        service.submit(&anon(ts(24 * 60)), submission(Some("10.0.0.1"))).await.unwrap();
        assert_eq!(store.complaint_count(), 3);
    }

    #[tokio::test]
    async fn the_limiter_day_follows_the_configured_offset() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        // 15:59 UTC is 23:59 at +08:00; 16:01 UTC is already the next day there.
        service.submit(&anon(ts(15 * 60 + 59)), submission(Some("10.0.0.9"))).await.unwrap();
        service.submit(&anon(ts(16 * 60 + 1)), submission(Some("10.0.0.9"))).await.unwrap();

        let buckets: Vec<NaiveDate> = store.fingerprints().iter().map(|f| f.day_bucket).collect();
        assert_eq!(
            buckets,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
            ]
        );
    }

    #[tokio::test]
    async fn unknown_origin_fails_open() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        service.submit(&anon(ts(1)), submission(None)).await.unwrap();
        assert_eq!(store.complaint_count(), 2);
        assert!(store.fingerprints().is_empty());
    }

    #[tokio::test]
    async fn reference_collisions_are_retried() {
        let store = Arc::new(MemoryStore::new());
        let references = Arc::new(SequenceReference::new(&[
            "ldcu-a-0001",
            "LDCU-A-0001",
            "LDCU-A-0002",
        ]));
        let service = service_with(store.clone(), references);

        let first = service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        let second = service.submit(&anon(ts(1)), submission(None)).await.unwrap();

        assert_eq!(first.reference_number, "LDCU-A-0001");
        assert_eq!(second.reference_number, "LDCU-A-0002");
    }

    #[tokio::test]
    async fn exhausted_reference_attempts_surface_as_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), Arc::new(SequenceReference::new(&["LDCU-SAME"])));

        service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        let err = service.submit(&anon(ts(1)), submission(None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateReference));
        assert_eq!(store.complaint_count(), 1);
    }

    #[tokio::test]
    async fn submission_validation() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let mut blank = submission(None);
        blank.description = "   ".into();
        assert!(matches!(
            service.submit(&anon(ts(0)), blank).await.unwrap_err(),
            ServiceError::Validation(_)
        ));

        let mut bad_category = submission(None);
        bad_category.category = "cafeteria".into();
        assert!(matches!(
            service.submit(&anon(ts(0)), bad_category).await.unwrap_err(),
            ServiceError::Validation(_)
        ));

        let mut bad_email = submission(None);
        bad_email.email = Some("not-an-email".into());
        assert!(matches!(
            service.submit(&anon(ts(0)), bad_email).await.unwrap_err(),
            ServiceError::Validation(_)
        ));

        assert_eq!(store.complaint_count(), 0);
    }

    #[tokio::test]
    async fn anonymous_submissions_hide_identity() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);

        let mut input = submission(None);
        input.is_anonymous = true;
        let complaint = service.submit(&anon(ts(0)), input).await.unwrap();
        assert_eq!(complaint.name, ANONYMOUS_NAME);
        assert_eq!(complaint.student_id, None);

        let mut nameless = submission(None);
        nameless.name = Some("  ".into());
        let complaint = service.submit(&anon(ts(0)), nameless).await.unwrap();
        assert_eq!(complaint.name, ANONYMOUS_NAME);
    }

    #[tokio::test]
    async fn signed_in_students_own_their_submissions() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);
        let student = student();

        let complaint = service
            .submit(&as_user(&student, ts(0)), submission(None))
            .await
            .unwrap();
        assert_eq!(complaint.user_id, Some(student.id));

        let mine = service
            .list(&as_user(&student, ts(1)), ComplaintQuery::default())
            .await
            .unwrap();
        assert_eq!(mine.total, 1);

        let other = crate::test_utils::student();
        let theirs = service
            .list(&as_user(&other, ts(1)), ComplaintQuery::default())
            .await
            .unwrap();
        assert_eq!(theirs.total, 0);
    }

    #[tokio::test]
    async fn tracking_and_comments_share_the_ownership_rule() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);
        let owner = student();
        let stranger = student();

        let complaint = service
            .submit(&as_user(&owner, ts(0)), submission(None))
            .await
            .unwrap();
        let reference = complaint.reference_number.clone();

        // The tracking routes act as the submitter for whoever is signed in.
        let stranger_ctx = RequestContext::new(
            Actor::Submitter { account_id: Some(stranger.id) },
            ts(1),
        );
        assert!(matches!(
            service.track(&stranger_ctx, &reference).await.unwrap_err(),
            ServiceError::Unauthorized(_)
        ));
        assert!(matches!(
            service.comments(&stranger_ctx, &complaint).await.unwrap_err(),
            ServiceError::Unauthorized(_)
        ));

        assert!(service.track(&as_user(&owner, ts(1)), &reference).await.is_ok());
        assert!(service.track(&anon(ts(1)), &reference).await.is_ok());
        assert!(service.comments(&anon(ts(1)), &complaint).await.is_ok());
    }

    #[tokio::test]
    async fn attachments_are_uploaded_before_insert() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);

        let mut input = submission(None);
        input.attachment = Some("data:image/png;base64,iVBORw0KGgo=".into());
        let complaint = service.submit(&anon(ts(0)), input).await.unwrap();
        assert_eq!(
            complaint.attachment_url.as_deref(),
            Some("https://storage.test/complaints/1.png")
        );

        let mut bad = submission(None);
        bad.attachment = Some("data:application/pdf;base64,JVBERi0=".into());
        assert!(matches!(
            service.submit(&anon(ts(0)), bad).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn external_links_are_not_accepted_as_attachments() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let mut input = submission(None);
        input.attachment = Some("http://evil.example/malware.exe".into());
        assert!(matches!(
            service.submit(&anon(ts(0)), input).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
        assert_eq!(store.complaint_count(), 0);

        let err = service
            .store_attachment("resolutions", Some("https://cdn.example/fix.png".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn stale_status_is_a_conflict_and_leaves_one_audit_entry() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        let admin = admin();

        let complaint = service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        let stale = complaint.clone();

        service
            .transition(
                &as_user(&admin, ts(1)),
                complaint.id,
                Transition::Reject { remarks: Some("duplicate".into()) },
            )
            .await
            .unwrap();

        let err = service
            .apply(
                &as_user(&admin, ts(2)),
                stale,
                Transition::Verify {
                    department: Some(Department::Finance),
                    remarks: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict));

        let trail = store.get_audit_trail(complaint.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(service.get(complaint.id).await.unwrap().status, ComplaintStatus::Rejected);
    }

    #[tokio::test]
    async fn rejected_transitions_change_nothing() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        let staff = department_staff(Department::Facilities);

        let complaint = service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        let err = service
            .transition(&as_user(&staff, ts(1)), complaint.id, Transition::Start { remarks: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
        assert_eq!(service.get(complaint.id).await.unwrap(), complaint);
        assert!(store.get_audit_trail(complaint.id).await.unwrap().is_empty());

        let missing = service
            .transition(&as_user(&staff, ts(1)), Uuid::new_v4(), Transition::Start { remarks: None })
            .await
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn department_views_only_their_verified_work() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        let admin = admin();
        let facilities = department_staff(Department::Facilities);

        let a = service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        let b = service.submit(&anon(ts(1)), submission(None)).await.unwrap();
        let c = service.submit(&anon(ts(2)), submission(None)).await.unwrap();

        for (id, department) in [(a.id, Department::Facilities), (b.id, Department::Finance)] {
            service
                .transition(
                    &as_user(&admin, ts(5)),
                    id,
                    Transition::Verify { department: Some(department), remarks: None },
                )
                .await
                .unwrap();
        }

        let page = service
            .list(&as_user(&facilities, ts(6)), ComplaintQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.complaints[0].id, a.id);

        assert!(matches!(
            service.visible_complaint(&as_user(&facilities, ts(6)), c.id).await.unwrap_err(),
            ServiceError::Unauthorized(_)
        ));

        let all = service.list(&as_user(&admin, ts(6)), ComplaintQuery::default()).await.unwrap();
        assert_eq!(all.total, 3);

        let stats = service.stats(&as_user(&admin, ts(6))).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status.len(), ComplaintStatus::ALL.len());
        let verified = stats
            .by_status
            .iter()
            .find(|s| s.status == ComplaintStatus::Verified)
            .unwrap();
        assert_eq!(verified.count, 2);

        assert!(matches!(
            service.list(&anon(ts(6)), ComplaintQuery::default()).await.unwrap_err(),
            ServiceError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn search_and_status_filters_apply_within_scope() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        let admin = admin();

        service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        let mut other = submission(None);
        other.description = "Scholarship refund delayed".into();
        other.category = "finance".into();
        service.submit(&anon(ts(1)), other).await.unwrap();

        let found = service
            .list(
                &as_user(&admin, ts(2)),
                ComplaintQuery {
                    search: Some("refund".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.complaints[0].category, ComplaintCategory::Finance);

        let none = service
            .list(
                &as_user(&admin, ts(2)),
                ComplaintQuery {
                    status: Some(ComplaintStatus::Resolved),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn submitters_never_see_or_write_internal_comments() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        let admin = admin();

        let complaint = service.submit(&anon(ts(0)), submission(None)).await.unwrap();

        service
            .post_comment(
                &as_user(&admin, ts(1)),
                &complaint,
                NewCommentInput { content: "check CCTV first".into(), is_internal: true },
            )
            .await
            .unwrap();
        let public = service
            .post_comment(
                &anon(ts(2)),
                &complaint,
                NewCommentInput { content: "any update?".into(), is_internal: true },
            )
            .await
            .unwrap();
        assert!(!public.is_internal);
        assert_eq!(public.author_type, AuthorType::Complainant);
        assert_eq!(public.author_name, "Maria Santos");

        let seen_by_submitter = service.comments(&anon(ts(3)), &complaint).await.unwrap();
        assert_eq!(seen_by_submitter.len(), 1);

        let seen_by_staff = service.comments(&as_user(&admin, ts(3)), &complaint).await.unwrap();
        assert_eq!(seen_by_staff.len(), 2);
        assert_eq!(seen_by_staff[0].content, "check CCTV first");

        let tracked = service.track(&anon(ts(3)), &complaint.reference_number).await.unwrap();
        assert_eq!(tracked.comments.len(), 1);

        assert!(matches!(
            service
                .post_comment(&anon(ts(4)), &complaint, NewCommentInput::default())
                .await
                .unwrap_err(),
            ServiceError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn sweep_closes_only_lapsed_resolutions() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let old = service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        let fresh = service.submit(&anon(ts(0)), submission(None)).await.unwrap();
        for (id, resolved_at) in [(old.id, ts(0)), (fresh.id, ts(24 * 60 * 6))] {
            store.edit_complaint(id, |c| {
                c.status = ComplaintStatus::Resolved;
                c.assigned_department = Some(Department::Facilities);
                c.resolution_details = Some("fixed".into());
                c.resolution_image_url = Some("https://storage.test/x.png".into());
                c.resolved_at = Some(resolved_at);
            });
        }

        let closed = service.close_lapsed(ts(24 * 60 * 8)).await.unwrap();
        assert_eq!(closed, 1);

        let old = service.get(old.id).await.unwrap();
        assert_eq!(old.status, ComplaintStatus::Closed);
        assert!(!old.user_verified);
        assert_eq!(
            store.get_audit_trail(old.id).await.unwrap()[0].action,
            "Complaint Auto-Closed"
        );
        assert_eq!(service.get(fresh.id).await.unwrap().status, ComplaintStatus::Resolved);

        assert_eq!(service.close_lapsed(ts(24 * 60 * 8)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn report_groups_submissions_by_origin() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);

        service.submit(&anon(ts(0)), submission(Some("10.0.0.1"))).await.unwrap();
        service.submit(&anon(ts(24 * 60)), submission(Some("10.0.0.1"))).await.unwrap();
        service.submit(&anon(ts(24 * 60 + 5)), submission(Some("10.0.0.2"))).await.unwrap();

        let report = service
            .submission_report(ReportRange::All, ts(24 * 60 + 10))
            .await
            .unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].ip_address, "10.0.0.1");
        assert_eq!(report[0].submission_count, 2);
        assert_eq!(report[0].first_submission, ts(0));
        assert_eq!(report[0].last_submission, ts(24 * 60));

        let week = service
            .submission_report(ReportRange::Week, ts(24 * 60 * 8))
            .await
            .unwrap();
        assert_eq!(week.iter().map(|o| o.submission_count).sum::<usize>(), 2);
    }

    #[test]
    fn today_starts_at_local_midnight() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        // 2024-03-01 02:00 UTC is 10:00 local; local midnight is 2024-02-29 16:00 UTC.
        assert_eq!(
            ReportRange::Today.since(ts(120), offset),
            Some(ts(0) - Duration::hours(8))
        );
        assert_eq!(ReportRange::All.since(ts(0), offset), None);
    }
}
