use super::sendmail::{render_template, OutgoingEmail};

pub fn tracking_link(app_url: &str, reference: &str) -> String {
    format!("{}/track?ref={}", app_url.trim_end_matches('/'), reference)
}

pub fn complaint_received_email(
    to_email: &str,
    name: &str,
    reference: &str,
    tracking_link: &str,
) -> Result<OutgoingEmail, String> {
    let template_path = "src/mail/templates/complaint-received.html";
    let placeholders = vec![
        ("{{name}}".to_string(), name.to_string()),
        ("{{reference}}".to_string(), reference.to_string()),
        ("{{tracking_link}}".to_string(), tracking_link.to_string()),
    ];

    Ok(OutgoingEmail {
        to: to_email.to_string(),
        subject: format!("Complaint received - {}", reference),
        html_body: render_template(template_path, &placeholders)?,
    })
}

pub fn status_update_email(
    to_email: &str,
    name: &str,
    reference: &str,
    status_label: &str,
    message: &str,
    tracking_link: &str,
) -> Result<OutgoingEmail, String> {
    let template_path = "src/mail/templates/status-update.html";
    let placeholders = vec![
        ("{{name}}".to_string(), name.to_string()),
        ("{{reference}}".to_string(), reference.to_string()),
        ("{{status}}".to_string(), status_label.to_string()),
        ("{{message}}".to_string(), message.to_string()),
        ("{{tracking_link}}".to_string(), tracking_link.to_string()),
    ];

    Ok(OutgoingEmail {
        to: to_email.to_string(),
        subject: format!("Complaint {} - {}", reference, status_label),
        html_body: render_template(template_path, &placeholders)?,
    })
}
