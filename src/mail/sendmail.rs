use std::fs;
use std::path::Path;

use ammonia::{Builder, UrlRelative};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use regex::Regex;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;
const TEMPLATE_DIR: &str = "src/mail/templates";

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    username: String,
    password: String,
    from: String,
}

impl SmtpMailer {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            from: from.into(),
        }
    }

    fn send_blocking(&self, email: &OutgoingEmail) -> Result<(), String> {
        let message = Message::builder()
            .from(self.from.parse().map_err(|e| format!("Invalid sender: {}", e))?)
            .to(email.to.parse().map_err(|e| format!("Invalid recipient: {}", e))?)
            .subject(email.subject.as_str())
            .multipart(
                MultiPart::alternative().singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.html_body.clone()),
                ),
            )
            .map_err(|e| format!("Failed to build message: {}", e))?;

        let creds = Credentials::new(self.username.clone(), self.password.clone());
        let transport = if self.port == 465 {
            SmtpTransport::relay(&self.host)
        } else {
            SmtpTransport::starttls_relay(&self.host)
        }
        .map_err(|e| format!("SMTP relay error: {}", e))?
        .port(self.port)
        .credentials(creds)
        .build();

        transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| format!("SMTP send failed: {}", e))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), String> {
        validate_email(&email.to)?;

        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            let mailer = self.clone();
            let outgoing = email.clone();
            let result = tokio::task::spawn_blocking(move || mailer.send_blocking(&outgoing))
                .await
                .map_err(|e| format!("Mail task failed: {}", e))
                .and_then(|r| r);

            match result {
                Ok(()) => {
                    info!("Email '{}' sent to {}", email.subject, email.to);
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        let delay = RETRY_DELAY_MS * (2_u64.pow(attempt - 1));
                        warn!(
                            "Email send attempt {} failed for {}. Retrying in {}ms...",
                            attempt, email.to, delay
                        );
                        sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        let error_msg = last_error
            .map(|e| format!("Failed after {} retries: {}", MAX_RETRIES, e))
            .unwrap_or_else(|| "Unknown email sending error".to_string());
        error!("Email failed for {}: {}", email.to, error_msg);
        Err(error_msg)
    }
}

fn sanitize_html(input: &str) -> String {
    let mut builder = Builder::default();
    builder
        .add_tags(&["p", "br", "strong", "em", "span"])
        .url_relative(UrlRelative::PassThrough)
        .link_rel(None);

    builder.clean(input).to_string()
}

fn validate_template_path(template_path: &str) -> Result<(), String> {
    let full_path = Path::new(template_path);

    if !full_path.starts_with(TEMPLATE_DIR) || template_path.contains("..") {
        return Err("Invalid template path: path traversal detected".to_string());
    }
    if full_path.extension() != Some(std::ffi::OsStr::new("html")) {
        return Err("Template must be an HTML file".to_string());
    }
    if !full_path.exists() {
        return Err(format!("Template not found: {}", template_path));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map_err(|_| "Invalid regex pattern".to_string())?;

    if email_regex.is_match(email) {
        Ok(())
    } else {
        Err(format!("Invalid email address: {}", email))
    }
}

/// Reads a template and fills `{{key}}` placeholders with sanitized values.
pub fn render_template(
    template_path: &str,
    placeholders: &[(String, String)],
) -> Result<String, String> {
    validate_template_path(template_path)?;

    let mut html = fs::read_to_string(template_path).map_err(|e| {
        error!("Failed to read email template {}: {}", template_path, e);
        format!("Template not found: {}", template_path)
    })?;

    for (key, value) in placeholders {
        html = html.replace(key, &sanitize_html(value));
    }

    Ok(html)
}
