//! Core `CaptionService` trait and its `reqwest` implementation.
//!
//! One async method per pipeline stage.  [`CaptionService::upload`] takes no
//! credential parameter: the storage host is a different authority and must
//! never see the user's bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::session::AuthError;

use super::types::{
    CaptionsResponse, GenerateRequest, GeneratedCaption, PresignRequest, PresignedTarget,
    RegisterRequest, RegisterResponse,
};

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the captioning service or the
/// storage host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}{}", body_suffix(.body))]
    Status { status: u16, body: String },

    /// HTTP transport or connection error.
    #[error("request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The response body was not the expected JSON.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// No bearer credential was available.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ServiceError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Parse(e.to_string())
        } else {
            ServiceError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// CaptionService trait
// ---------------------------------------------------------------------------

/// The four remote operations of the upload pipeline.
#[async_trait]
pub trait CaptionService: Send + Sync {
    /// Request an upload target for `content_type`.
    async fn presign(&self, token: &str, content_type: &str)
        -> Result<PresignedTarget, ServiceError>;

    /// Write `bytes` to the presigned target.  No credential is attached.
    async fn upload(
        &self,
        target: &PresignedTarget,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ServiceError>;

    /// Register the public image URL; returns the service's image id.
    async fn register(&self, token: &str, image_url: &str) -> Result<String, ServiceError>;

    /// Generate captions for a registered image.
    async fn generate(
        &self,
        token: &str,
        image_id: &str,
    ) -> Result<Vec<GeneratedCaption>, ServiceError>;
}

// ---------------------------------------------------------------------------
// HttpCaptionService
// ---------------------------------------------------------------------------

/// Talks to the captioning API over HTTPS.
///
/// All connection details come from the [`ServiceConfig`] passed to
/// [`HttpCaptionService::from_config`].
pub struct HttpCaptionService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpCaptionService {
    /// Build a client with the per-request timeout from `config.timeout_secs`.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/pipeline/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn presign_request(&self, token: &str, content_type: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint("generate-presigned-url"))
            .bearer_auth(token)
            .json(&PresignRequest { content_type })
    }

    fn upload_request(
        &self,
        target: &PresignedTarget,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> reqwest::RequestBuilder {
        self.client
            .put(&target.presigned_url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
    }

    fn register_request(&self, token: &str, image_url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint("upload-image-from-url"))
            .bearer_auth(token)
            .json(&RegisterRequest {
                image_url,
                is_common_use: self.config.is_common_use,
            })
    }

    fn generate_request(&self, token: &str, image_id: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint("generate-captions"))
            .bearer_auth(token)
            .json(&GenerateRequest { image_id })
    }
}

/// Turn a non-2xx response into [`ServiceError::Status`] with its body text.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

#[async_trait]
impl CaptionService for HttpCaptionService {
    async fn presign(
        &self,
        token: &str,
        content_type: &str,
    ) -> Result<PresignedTarget, ServiceError> {
        let response = self.presign_request(token, content_type).send().await?;
        let target = ensure_success(response).await?.json().await?;
        Ok(target)
    }

    async fn upload(
        &self,
        target: &PresignedTarget,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ServiceError> {
        let response = self.upload_request(target, content_type, bytes).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn register(&self, token: &str, image_url: &str) -> Result<String, ServiceError> {
        let response = self.register_request(token, image_url).send().await?;
        let registered: RegisterResponse = ensure_success(response).await?.json().await?;
        Ok(registered.image_id)
    }

    async fn generate(
        &self,
        token: &str,
        image_id: &str,
    ) -> Result<Vec<GeneratedCaption>, ServiceError> {
        let response = self.generate_request(token, image_id).send().await?;
        let captions: CaptionsResponse = ensure_success(response).await?.json().await?;
        Ok(captions.into_captions())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
