// service/notification_service.rs
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    mail::{
        mails::{complaint_received_email, status_update_email, tracking_link},
        sendmail::{Mailer, OutgoingEmail},
    },
    models::complaintmodel::Complaint,
    service::lifecycle::TransitionKind,
};

/// Best-effort email to submitters. Sends run detached and never fail a request.
#[derive(Clone)]
pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
    app_url: String,
    window_days: i64,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>, app_url: impl Into<String>, window_days: i64) -> Self {
        Self {
            mailer,
            app_url: app_url.into(),
            window_days,
        }
    }

    pub fn notify_submission(&self, complaint: &Complaint) -> Option<JoinHandle<()>> {
        let to = complaint.email.as_deref()?;
        let link = tracking_link(&self.app_url, &complaint.reference_number);

        match complaint_received_email(to, &complaint.name, &complaint.reference_number, &link) {
            Ok(email) => Some(self.dispatch(email)),
            Err(e) => {
                tracing::warn!(
                    "Could not prepare receipt email for {}: {}",
                    complaint.reference_number,
                    e
                );
                None
            }
        }
    }

    pub fn notify_transition(
        &self,
        complaint: &Complaint,
        kind: TransitionKind,
    ) -> Option<JoinHandle<()>> {
        let to = complaint.email.as_deref()?;
        let link = tracking_link(&self.app_url, &complaint.reference_number);
        let message = self.status_message(complaint, kind);

        match status_update_email(
            to,
            &complaint.name,
            &complaint.reference_number,
            complaint.status.label(),
            &message,
            &link,
        ) {
            Ok(email) => Some(self.dispatch(email)),
            Err(e) => {
                tracing::warn!(
                    "Could not prepare status email for {}: {}",
                    complaint.reference_number,
                    e
                );
                None
            }
        }
    }

    fn status_message(&self, complaint: &Complaint, kind: TransitionKind) -> String {
        let department = complaint
            .assigned_department
            .map(|d| d.label().to_string())
            .unwrap_or_else(|| "the assigned department".to_string());

        match kind {
            TransitionKind::Verify => format!(
                "Your complaint has been verified and assigned to {}.",
                department
            ),
            TransitionKind::Reject => format!(
                "Your complaint was reviewed and could not be accepted. Reason: {}",
                complaint.admin_remarks.as_deref().unwrap_or("not specified")
            ),
            TransitionKind::Start => format!("{} has started working on your complaint.", department),
            TransitionKind::Resolve => format!(
                "Your complaint has been marked as resolved. Please confirm or dispute the resolution within {} days.",
                self.window_days
            ),
            TransitionKind::Confirm => {
                "Thank you for confirming the resolution. Your complaint is now closed.".to_string()
            }
            TransitionKind::Dispute => {
                "We received your dispute. The resolution will be reviewed again.".to_string()
            }
            TransitionKind::AutoClose => format!(
                "Your complaint was closed automatically because no response was received within {} days of its resolution.",
                self.window_days
            ),
        }
    }

    fn dispatch(&self, email: OutgoingEmail) -> JoinHandle<()> {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            let to = email.to.clone();
            if let Err(e) = mailer.send(email).await {
                tracing::warn!("Notification to {} was not delivered: {}", to, e);
            }
        })
    }
}
