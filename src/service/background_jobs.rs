// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::AppState;

/// Closes resolved complaints whose verification window lapsed without a response.
pub async fn start_auto_close_job(app_state: Arc<AppState>) {
    let period = Duration::from_secs(app_state.env.auto_close_interval_secs.max(60));
    let mut interval = interval(period);

    loop {
        interval.tick().await;

        let now = Utc::now();
        tracing::info!("Running auto-close job at {}", now);

        match app_state.complaint_service.close_lapsed(now).await {
            Ok(0) => tracing::debug!("Auto-close job found nothing to close"),
            Ok(closed) => tracing::info!("Auto-close job closed {} complaint(s)", closed),
            Err(e) => tracing::error!("Auto-close job failed: {}", e),
        }
    }
}
