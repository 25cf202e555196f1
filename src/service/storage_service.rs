// service/storage_service.rs
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{service::error::ServiceError, utils::image_utils::ImagePayload};

/// Object storage for complaint and resolution images.
#[async_trait]
pub trait AttachmentStorage: Send + Sync {
    /// Stores the payload under `folder` and returns its public URL.
    async fn upload(&self, folder: &str, image: ImagePayload) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct HttpStorage {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl HttpStorage {
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            api_key: api_key.into(),
        }
    }

    fn object_name(folder: &str, image: &ImagePayload) -> String {
        format!(
            "{}/{}-{}.{}",
            folder,
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            image.extension()
        )
    }
}

#[async_trait]
impl AttachmentStorage for HttpStorage {
    async fn upload(&self, folder: &str, image: ImagePayload) -> Result<String, ServiceError> {
        if self.base_url.is_empty() {
            return Err(ServiceError::Dependency(
                "Attachment storage is not configured".to_string(),
            ));
        }

        let object = Self::object_name(folder, &image);
        let response = self
            .client
            .post(format!("{}/object/{}/{}", self.base_url, self.bucket, object))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", image.content_type.clone())
            .body(image.bytes)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Attachment upload failed: {}", e);
                ServiceError::Dependency("Failed to upload attachment".to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Attachment upload rejected ({}): {}", status, body);
            return Err(ServiceError::Dependency(
                "Failed to upload attachment".to_string(),
            ));
        }

        Ok(format!(
            "{}/object/public/{}/{}",
            self.base_url, self.bucket, object
        ))
    }
}
