// service/lifecycle.rs
//
// Complaint status graph and its role-gated transition rules. Planning is pure:
// it reads a snapshot and returns the field writes plus the audit entry, which the
// store then applies as one unit guarded by the expected current status.
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{
        complaintmodel::{Complaint, ComplaintPatch, ComplaintStatus, Department, NewAuditEntry},
        usermodel::{User, UserRole},
    },
    service::error::ServiceError,
};

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Who is asking. Built explicitly per request, never looked up ambiently.
#[derive(Debug, Clone, PartialEq)]
pub enum Actor {
    /// Self-service through the tracking page. Holding the reference number is the
    /// capability; a signed-in account must also match the owner when one is recorded.
    Submitter { account_id: Option<Uuid> },
    Staff {
        user_id: Uuid,
        name: String,
        role: UserRole,
        department: Option<Department>,
    },
    System,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        match user.role {
            UserRole::Student => Actor::Submitter {
                account_id: Some(user.id),
            },
            role => Actor::Staff {
                user_id: user.id,
                name: user.display_name().to_string(),
                role,
                department: user.department,
            },
        }
    }

    pub fn anonymous() -> Self {
        Actor::Submitter { account_id: None }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Actor::Submitter { account_id } => *account_id,
            Actor::Staff { user_id, .. } => Some(*user_id),
            Actor::System => None,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::Staff { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Actor::Submitter { account_id: Some(id) } => format!("submitter {}", id),
            Actor::Submitter { account_id: None } => "anonymous submitter".to_string(),
            Actor::Staff { user_id, role, .. } => format!("{} {}", role.to_str(), user_id),
            Actor::System => "system".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Verify,
    Reject,
    Start,
    Resolve,
    Confirm,
    Dispute,
    AutoClose,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 7] = [
        TransitionKind::Verify,
        TransitionKind::Reject,
        TransitionKind::Start,
        TransitionKind::Resolve,
        TransitionKind::Confirm,
        TransitionKind::Dispute,
        TransitionKind::AutoClose,
    ];

    pub fn from_status(&self) -> ComplaintStatus {
        match self {
            TransitionKind::Verify | TransitionKind::Reject => ComplaintStatus::Submitted,
            TransitionKind::Start => ComplaintStatus::Verified,
            TransitionKind::Resolve => ComplaintStatus::InProgress,
            TransitionKind::Confirm | TransitionKind::Dispute | TransitionKind::AutoClose => {
                ComplaintStatus::Resolved
            }
        }
    }

    pub fn to_status(&self) -> ComplaintStatus {
        match self {
            TransitionKind::Verify => ComplaintStatus::Verified,
            TransitionKind::Reject => ComplaintStatus::Rejected,
            TransitionKind::Start => ComplaintStatus::InProgress,
            TransitionKind::Resolve => ComplaintStatus::Resolved,
            TransitionKind::Confirm | TransitionKind::AutoClose => ComplaintStatus::Closed,
            TransitionKind::Dispute => ComplaintStatus::Disputed,
        }
    }

    pub fn action_label(&self) -> &'static str {
        match self {
            TransitionKind::Verify => "Complaint Verified",
            TransitionKind::Reject => "Complaint Rejected",
            TransitionKind::Start => "Started Processing",
            TransitionKind::Resolve => "Complaint Resolved",
            TransitionKind::Confirm => "Resolution Confirmed by User",
            TransitionKind::Dispute => "Resolution Disputed by User",
            TransitionKind::AutoClose => "Complaint Auto-Closed",
        }
    }
}

/// A requested transition with its caller-supplied fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Verify {
        department: Option<Department>,
        remarks: Option<String>,
    },
    Reject {
        remarks: Option<String>,
    },
    Start {
        remarks: Option<String>,
    },
    Resolve {
        details: Option<String>,
        attachment_url: Option<String>,
        remarks: Option<String>,
    },
    Confirm,
    Dispute {
        reason: Option<String>,
    },
    AutoClose,
}

impl Transition {
    pub fn kind(&self) -> TransitionKind {
        match self {
            Transition::Verify { .. } => TransitionKind::Verify,
            Transition::Reject { .. } => TransitionKind::Reject,
            Transition::Start { .. } => TransitionKind::Start,
            Transition::Resolve { .. } => TransitionKind::Resolve,
            Transition::Confirm => TransitionKind::Confirm,
            Transition::Dispute { .. } => TransitionKind::Dispute,
            Transition::AutoClose => TransitionKind::AutoClose,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub kind: TransitionKind,
    pub expected_status: ComplaintStatus,
    pub patch: ComplaintPatch,
    pub audit: NewAuditEntry,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    window_days: i64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_DAYS)
    }
}

impl Lifecycle {
    pub fn new(window_days: i64) -> Self {
        Self { window_days }
    }

    /// Whole days left to confirm or dispute, rounded up and floored at zero.
    pub fn remaining_days(&self, resolved_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
        let Some(resolved_at) = resolved_at else {
            return 0;
        };
        let remaining_ms =
            (resolved_at + Duration::days(self.window_days) - now).num_milliseconds();
        if remaining_ms <= 0 {
            0
        } else {
            (remaining_ms + DAY_MS - 1) / DAY_MS
        }
    }

    /// Cut-off for the auto-close sweep: anything resolved at or before this has lapsed.
    pub fn lapsed_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.window_days)
    }

    /// Transitions `actor` may perform on `complaint` right now.
    pub fn allowed(
        &self,
        complaint: &Complaint,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Vec<TransitionKind> {
        if complaint.status.is_terminal() {
            return Vec::new();
        }

        TransitionKind::ALL
            .into_iter()
            .filter(|kind| kind.from_status() == complaint.status)
            .filter(|kind| authorize(*kind, actor, complaint).is_ok())
            .filter(|kind| self.check_window(*kind, complaint, now).is_ok())
            .collect()
    }

    pub fn plan(
        &self,
        complaint: &Complaint,
        actor: &Actor,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, ServiceError> {
        let kind = transition.kind();

        if complaint.status != kind.from_status() {
            return Err(ServiceError::InvalidTransition {
                from: complaint.status,
                to: kind.to_status(),
            });
        }

        authorize(kind, actor, complaint)?;
        self.check_window(kind, complaint, now)?;

        let actor_id = actor.id();
        let mut patch = ComplaintPatch {
            status: Some(kind.to_status()),
            updated_at: Some(now),
            ..Default::default()
        };

        let details = match transition {
            Transition::Verify { department, remarks } => {
                let department = department.ok_or_else(|| {
                    ServiceError::Validation("Please select a department".to_string())
                })?;
                let remarks = non_empty(remarks);

                patch.assigned_department = Some(department);
                patch.admin_remarks = remarks.clone();
                patch.verified_by = actor_id;
                patch.verified_at = Some(now);

                match remarks {
                    Some(r) => format!("Assigned to {}. Remarks: {}", department.label(), r),
                    None => format!("Assigned to {}.", department.label()),
                }
            }
            Transition::Reject { remarks } => {
                let remarks = non_empty(remarks).ok_or_else(|| {
                    ServiceError::Validation("Please provide a reason for rejection".to_string())
                })?;

                patch.admin_remarks = Some(remarks.clone());
                patch.verified_by = actor_id;
                patch.verified_at = Some(now);

                format!("Reason: {}", remarks)
            }
            Transition::Start { remarks } => {
                let remarks = non_empty(remarks);

                patch.department_remarks = remarks.clone();
                patch.started_by = actor_id;
                patch.started_at = Some(now);

                match remarks {
                    Some(r) => format!("Remarks: {}", r),
                    None => "Department started working on the complaint".to_string(),
                }
            }
            Transition::Resolve {
                details,
                attachment_url,
                remarks,
            } => {
                let details = non_empty(details).ok_or_else(|| {
                    ServiceError::Validation("Please provide resolution details".to_string())
                })?;
                let attachment_url = non_empty(attachment_url).ok_or_else(|| {
                    ServiceError::Validation(
                        "Please upload an image as proof of resolution".to_string(),
                    )
                })?;

                patch.resolution_details = Some(details.clone());
                patch.resolution_image_url = Some(attachment_url);
                patch.department_remarks = non_empty(remarks);
                patch.resolved_by = actor_id;
                patch.resolved_at = Some(now);

                format!("Resolution: {}", details)
            }
            Transition::Confirm => {
                patch.closed_at = Some(now);
                patch.user_verified = Some(true);

                "The complainant confirmed that the issue was resolved satisfactorily.".to_string()
            }
            Transition::Dispute { reason } => {
                let reason = non_empty(reason).ok_or_else(|| {
                    ServiceError::Validation(
                        "Please provide a reason for disputing the resolution".to_string(),
                    )
                })?;

                patch.dispute_reason = Some(reason.clone());
                patch.disputed_at = Some(now);

                format!("Reason: {}", reason)
            }
            Transition::AutoClose => {
                patch.closed_at = Some(now);
                patch.user_verified = Some(false);

                format!(
                    "No response within the {}-day verification window; the complaint was closed automatically.",
                    self.window_days
                )
            }
        };

        Ok(TransitionPlan {
            kind,
            expected_status: complaint.status,
            patch,
            audit: NewAuditEntry {
                complaint_id: complaint.id,
                action: kind.action_label().to_string(),
                performed_by: actor_id,
                details: Some(details),
                created_at: now,
            },
        })
    }

    fn check_window(
        &self,
        kind: TransitionKind,
        complaint: &Complaint,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let remaining = self.remaining_days(complaint.resolved_at, now);
        match kind {
            TransitionKind::Confirm | TransitionKind::Dispute if remaining == 0 => {
                Err(ServiceError::Validation(format!(
                    "The {}-day verification window has lapsed",
                    self.window_days
                )))
            }
            TransitionKind::AutoClose if remaining > 0 => Err(ServiceError::Validation(format!(
                "The verification window is still open ({} day(s) remaining)",
                remaining
            ))),
            _ => Ok(()),
        }
    }
}

fn authorize(
    kind: TransitionKind,
    actor: &Actor,
    complaint: &Complaint,
) -> Result<(), ServiceError> {
    let allowed = match (kind, actor) {
        (TransitionKind::Verify | TransitionKind::Reject, Actor::Staff { role, .. }) => {
            role.is_admin()
        }
        (
            TransitionKind::Start | TransitionKind::Resolve,
            Actor::Staff {
                role: UserRole::Department,
                department: Some(department),
                ..
            },
        ) => complaint.assigned_department == Some(*department),
        (TransitionKind::Confirm | TransitionKind::Dispute, Actor::Submitter { account_id }) => {
            match (complaint.user_id, account_id) {
                (Some(owner), Some(account)) => owner == *account,
                _ => true,
            }
        }
        (TransitionKind::AutoClose, Actor::System) => true,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(format!(
            "{} may not perform '{}' on this complaint",
            actor.describe(),
            kind.action_label()
        )))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
