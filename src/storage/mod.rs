use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::error::{AppError, AppResult};

/// External binary-object store for bill attachments, consumed only as
/// "upload(file) -> URL". Callers own the spooled file and must remove it
/// after the upload completes (or fails).
#[async_trait]
pub trait BillStore: Send + Sync {
    async fn upload(&self, path: &Path, file_name: &str, content_type: &str)
        -> AppResult<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Bill store backed by an HTTP object-storage endpoint that accepts a
/// multipart upload and answers `{ "url": "..." }`.
pub struct HttpBillStore {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpBillStore {
    pub fn new(upload_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url,
        }
    }
}

#[async_trait]
impl BillStore for HttpBillStore {
    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        content_type: &str,
    ) -> AppResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read spooled bill: {}", e)))?;

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| AppError::Storage(format!("Invalid content type: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Storage(format!("Bill store rejected upload: {}", e)))?;

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Malformed bill store response: {}", e)))?;

        info!("Bill uploaded: {}", uploaded.url);

        Ok(uploaded.url)
    }
}
