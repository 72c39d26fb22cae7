//! Media uploader over HTTP
//!
//! Posts the attachment as a multipart form and expects a JSON body carrying
//! the public URL, either as `url` or nested as `data.url`.

use async_trait::async_trait;
use chat_common::UploadConfig;
use chat_core::{DomainError, MediaUploader, RepoResult};
use reqwest::multipart;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Response bodies longer than this are cut in error messages
const ERROR_BODY_LIMIT: usize = 200;

/// Uploads attachments to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpMediaUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMediaUploader {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Build from configuration; `None` when no endpoint is configured
    pub fn from_config(config: &UploadConfig) -> RepoResult<Option<Self>> {
        let Some(endpoint) = config.endpoint.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DomainError::InternalError(format!("HTTP client: {e}")))?;
        Ok(Some(Self::new(client, endpoint)))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MediaUploader for HttpMediaUploader {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> RepoResult<String> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| DomainError::UploadFailed(format!("invalid MIME type: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::UploadFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DomainError::UploadFailed(e.to_string()))?;

        if !status.is_success() {
            warn!(%status, "Upload rejected");
            return Err(DomainError::UploadFailed(format!(
                "status={status} body={}",
                truncate(&body)
            )));
        }

        let url = parse_upload_response(&body)?;
        debug!(url = %url, "Upload accepted");
        Ok(url)
    }
}

/// Extract the URL from an upload response body
pub fn parse_upload_response(body: &str) -> Result<String, DomainError> {
    let malformed = || DomainError::MalformedUploadResponse(truncate(body).to_string());

    let value: Value = serde_json::from_str(body).map_err(|_| malformed())?;
    value
        .get("url")
        .or_else(|| value.get("data").and_then(|data| data.get("url")))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(malformed)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}
