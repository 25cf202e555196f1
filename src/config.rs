// config.rs
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    // Complaint workflow
    pub reference_prefix: String,
    pub rate_limit_utc_offset_hours: i32,
    pub verification_window_days: i64,
    pub auto_close_interval_secs: u64,
    // Email
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    // Attachment storage
    pub storage_url: String,
    pub storage_bucket: String,
    pub storage_key: String,
    pub max_attachment_mb: usize,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE")
            .expect("JWT_MAXAGE must be set")
            .parse::<i64>()
            .expect("JWT_MAXAGE must be a number of minutes");

        let cors_origins = env_or("CORS_ORIGINS", "http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Config {
            database_url,
            app_url: env_or("APP_URL", "http://localhost:5173".to_string()),
            jwt_secret,
            jwt_maxage,
            port: env_or("PORT", 8000),
            reference_prefix: env_or("REFERENCE_PREFIX", "LDCU".to_string()),
            rate_limit_utc_offset_hours: env_or("RATE_LIMIT_UTC_OFFSET_HOURS", 8),
            verification_window_days: env_or("VERIFICATION_WINDOW_DAYS", 7),
            auto_close_interval_secs: env_or("AUTO_CLOSE_INTERVAL_SECS", 3600),
            smtp_host: env_or("SMTP_HOST", "localhost".to_string()),
            smtp_port: env_or("SMTP_PORT", 465),
            smtp_username: env_or("SMTP_USERNAME", String::new()),
            smtp_password: env_or("SMTP_PASSWORD", String::new()),
            from_email: env_or(
                "FROM_EMAIL",
                "Complaint Desk <noreply@localhost>".to_string(),
            ),
            storage_url: env_or("STORAGE_URL", String::new()),
            storage_bucket: env_or("STORAGE_BUCKET", "attachments".to_string()),
            storage_key: env_or("STORAGE_KEY", String::new()),
            max_attachment_mb: env_or("MAX_ATTACHMENT_MB", 5),
            cors_origins,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Config {
        Config {
            database_url: "postgres://localhost/complaintdesk_test".to_string(),
            app_url: "http://localhost:5173".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_maxage: 60,
            port: 8000,
            reference_prefix: "LDCU".to_string(),
            rate_limit_utc_offset_hours: 8,
            verification_window_days: 7,
            auto_close_interval_secs: 3600,
            smtp_host: "localhost".to_string(),
            smtp_port: 465,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "Complaint Desk <noreply@localhost>".to_string(),
            storage_url: "http://storage.test".to_string(),
            storage_bucket: "attachments".to_string(),
            storage_key: "key".to_string(),
            max_attachment_mb: 5,
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}
