// src/models/complaintmodel.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

pub const ANONYMOUS_NAME: &str = "Anonymous";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "complaint_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Submitted,
    Verified,
    Rejected,
    InProgress,
    Resolved,
    Closed,
    Disputed,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 7] = [
        ComplaintStatus::Submitted,
        ComplaintStatus::Verified,
        ComplaintStatus::Rejected,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
        ComplaintStatus::Closed,
        ComplaintStatus::Disputed,
    ];

    pub fn to_str(&self) -> &str {
        match self {
            ComplaintStatus::Submitted => "submitted",
            ComplaintStatus::Verified => "verified",
            ComplaintStatus::Rejected => "rejected",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Closed => "closed",
            ComplaintStatus::Disputed => "disputed",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ComplaintStatus::Submitted => "Submitted",
            ComplaintStatus::Verified => "Verified",
            ComplaintStatus::Rejected => "Rejected",
            ComplaintStatus::InProgress => "In Progress",
            ComplaintStatus::Resolved => "Resolved",
            ComplaintStatus::Closed => "Closed",
            ComplaintStatus::Disputed => "Disputed",
        }
    }

    /// No outgoing edges. `Disputed` waits for manual review outside this service.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ComplaintStatus::Rejected | ComplaintStatus::Closed | ComplaintStatus::Disputed
        )
    }
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "department", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Academic,
    Facilities,
    Finance,
    Hr,
    Security,
    Registrar,
    StudentAffairs,
}

impl Department {
    pub fn to_str(&self) -> &str {
        match self {
            Department::Academic => "academic",
            Department::Facilities => "facilities",
            Department::Finance => "finance",
            Department::Hr => "hr",
            Department::Security => "security",
            Department::Registrar => "registrar",
            Department::StudentAffairs => "student_affairs",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Department::Academic => "Academic Affairs",
            Department::Facilities => "Facilities Management",
            Department::Finance => "Finance Office",
            Department::Hr => "Human Resources",
            Department::Security => "Security Office",
            Department::Registrar => "Registrar",
            Department::StudentAffairs => "Student Affairs",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "complaint_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintCategory {
    Academic,
    Facilities,
    Finance,
    Hr,
    Security,
    Registrar,
    StudentAffairs,
    Other,
}

impl ComplaintCategory {
    pub fn to_str(&self) -> &str {
        match self {
            ComplaintCategory::Academic => "academic",
            ComplaintCategory::Facilities => "facilities",
            ComplaintCategory::Finance => "finance",
            ComplaintCategory::Hr => "hr",
            ComplaintCategory::Security => "security",
            ComplaintCategory::Registrar => "registrar",
            ComplaintCategory::StudentAffairs => "student_affairs",
            ComplaintCategory::Other => "other",
        }
    }
}

impl std::str::FromStr for ComplaintCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "academic" => Ok(ComplaintCategory::Academic),
            "facilities" => Ok(ComplaintCategory::Facilities),
            "finance" => Ok(ComplaintCategory::Finance),
            "hr" => Ok(ComplaintCategory::Hr),
            "security" => Ok(ComplaintCategory::Security),
            "registrar" => Ok(ComplaintCategory::Registrar),
            "student_affairs" => Ok(ComplaintCategory::StudentAffairs),
            "other" => Ok(ComplaintCategory::Other),
            other => Err(format!("Unknown complaint category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "author_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthorType {
    Complainant,
    Admin,
    Department,
    SuperAdmin,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Complaint {
    pub id: Uuid,
    pub reference_number: String,
    pub category: ComplaintCategory,
    pub description: String,
    pub attachment_url: Option<String>,

    // Submitter
    pub name: String,
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub is_anonymous: bool,
    pub user_id: Option<Uuid>,

    // Workflow
    pub status: ComplaintStatus,
    pub assigned_department: Option<Department>,
    pub admin_remarks: Option<String>,
    pub department_remarks: Option<String>,
    pub resolution_details: Option<String>,
    pub resolution_image_url: Option<String>,
    pub dispute_reason: Option<String>,
    pub user_verified: bool,

    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub started_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row to insert at submission time. The reference is already upper-cased.
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub reference_number: String,
    pub category: ComplaintCategory,
    pub description: String,
    pub attachment_url: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub is_anonymous: bool,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Field writes of one transition. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplaintPatch {
    pub status: Option<ComplaintStatus>,
    pub assigned_department: Option<Department>,
    pub admin_remarks: Option<String>,
    pub department_remarks: Option<String>,
    pub resolution_details: Option<String>,
    pub resolution_image_url: Option<String>,
    pub dispute_reason: Option<String>,
    pub user_verified: Option<bool>,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub started_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ComplaintPatch {
    pub fn apply_to(&self, complaint: &mut Complaint) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut complaint.status, &self.status);
        set_opt(&mut complaint.assigned_department, &self.assigned_department);
        set_opt(&mut complaint.admin_remarks, &self.admin_remarks);
        set_opt(&mut complaint.department_remarks, &self.department_remarks);
        set_opt(&mut complaint.resolution_details, &self.resolution_details);
        set_opt(&mut complaint.resolution_image_url, &self.resolution_image_url);
        set_opt(&mut complaint.dispute_reason, &self.dispute_reason);
        set(&mut complaint.user_verified, &self.user_verified);
        set_opt(&mut complaint.verified_by, &self.verified_by);
        set_opt(&mut complaint.verified_at, &self.verified_at);
        set_opt(&mut complaint.started_by, &self.started_by);
        set_opt(&mut complaint.started_at, &self.started_at);
        set_opt(&mut complaint.resolved_by, &self.resolved_by);
        set_opt(&mut complaint.resolved_at, &self.resolved_at);
        set_opt(&mut complaint.closed_at, &self.closed_at);
        set_opt(&mut complaint.disputed_at, &self.disputed_at);
        set(&mut complaint.updated_at, &self.updated_at);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub complaint_id: Uuid,
    pub action: String,
    pub performed_by: Option<Uuid>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub complaint_id: Uuid,
    pub action: String,
    pub performed_by: Option<Uuid>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub complaint_id: Uuid,
    pub author_name: String,
    pub author_type: AuthorType,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub complaint_id: Uuid,
    pub author_name: String,
    pub author_type: AuthorType,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct SubmissionFingerprint {
    pub id: Uuid,
    pub ip_address: String,
    pub complaint_id: Uuid,
    pub reference_number: String,
    pub user_agent: Option<String>,
    pub day_bucket: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFingerprint {
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub day_bucket: NaiveDate,
}

/// Fingerprint joined with the complaint it produced, for abuse review.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct SubmissionRecord {
    #[sqlx(flatten)]
    pub fingerprint: SubmissionFingerprint,
    pub category: ComplaintCategory,
    pub status: ComplaintStatus,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OriginActivity {
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub submission_count: usize,
    pub first_submission: DateTime<Utc>,
    pub last_submission: DateTime<Utc>,
    pub submissions: Vec<SubmissionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct StatusCount {
    pub status: ComplaintStatus,
    pub count: i64,
}

/// Outcome of inserting a complaint together with its fingerprint.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Created(Complaint),
    DuplicateReference,
    RateLimited,
}

/// Which complaints a caller may list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComplaintScope {
    All,
    Department(Department),
    Owner(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ComplaintFilter {
    pub fn matches(&self, complaint: &Complaint) -> bool {
        if let Some(status) = self.status {
            if complaint.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                complaint.reference_number.to_lowercase().contains(&q)
                    || complaint.name.to_lowercase().contains(&q)
                    || complaint.category.to_str().contains(&q)
                    || complaint.description.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }
}

impl ComplaintScope {
    pub fn includes(&self, complaint: &Complaint) -> bool {
        match self {
            ComplaintScope::All => true,
            ComplaintScope::Department(d) => {
                complaint.assigned_department == Some(*d)
                    && complaint.status != ComplaintStatus::Submitted
            }
            ComplaintScope::Owner(user_id) => complaint.user_id == Some(*user_id),
        }
    }
}
