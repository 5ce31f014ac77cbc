//! HTTP generation backend client implementation

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::client::traits::{GenerationBackend, GenerationError, ImageRequest, VideoRequest};
use crate::config::GenerationConfig;
use crate::error::{AppError, Result};

/// HTTP-based generation backend
///
/// Talks to a provider that accepts JSON generation requests and returns the
/// artifact base64-encoded. Video calls are single-shot from our side; the
/// provider holds the connection until synthesis completes, which is why the
/// client timeout is measured in minutes.
pub struct HttpGenerationBackend {
    name: String,
    client: Client,
    base_url: String,
    api_key: String,
    image_model: String,
    video_model: String,
}

#[derive(Debug, Serialize)]
struct ApiImageRequest {
    model: String,
    prompt: String,
    aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reference_images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ApiVideoRequest {
    model: String,
    prompt: String,
    aspect_ratio: String,
    duration_seconds: String,
    resolution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiGenerateResponse {
    #[serde(default)]
    data: Vec<ApiArtifact>,
}

#[derive(Debug, Deserialize)]
struct ApiArtifact {
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl HttpGenerationBackend {
    /// Create a new HTTP backend from configuration
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: "http-provider".to_string(),
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            image_model: config.image_model.clone(),
            video_model: config.video_model.clone(),
        })
    }

    async fn read_as_base64(path: &Path) -> std::result::Result<String, GenerationError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            // A missing local input cannot recover by retrying.
            GenerationError::Terminal(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(BASE64.encode(bytes))
    }

    async fn post_generation<T: Serialize>(
        &self,
        endpoint: &str,
        request: &T,
    ) -> std::result::Result<Vec<u8>, GenerationError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(backend = %self.name, url = %url, "sending generation request");

        let mut builder = self.client.post(&url).json(request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            // Connect failures and timeouts are transient by definition.
            GenerationError::Retryable(format!("request to {} failed: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &body));
        }

        let parsed: ApiGenerateResponse = response.json().await.map_err(|e| {
            GenerationError::Retryable(format!("failed to parse provider response: {}", e))
        })?;

        let artifact = parsed
            .data
            .into_iter()
            .find_map(|a| a.b64_json)
            .ok_or_else(|| {
                GenerationError::Terminal("provider returned no artifact".to_string())
            })?;

        BASE64
            .decode(artifact.as_bytes())
            .map_err(|e| GenerationError::Terminal(format!("invalid artifact encoding: {}", e)))
    }
}

/// Map a non-success provider status to the retry taxonomy.
///
/// 429 and 5xx are worth retrying; everything else in 4xx (content policy,
/// invalid argument, auth) will fail the same way every time.
fn classify_http_failure(status: StatusCode, body: &str) -> GenerationError {
    let detail = serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| match e.code {
            Some(code) => format!("{} ({})", e.message, code),
            None => e.message,
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());

    let message = format!("provider returned {}: {}", status, detail);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        GenerationError::Retryable(message)
    } else {
        GenerationError::Terminal(message)
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> std::result::Result<Vec<u8>, GenerationError> {
        let mut reference_images = Vec::with_capacity(request.reference_images.len());
        for path in &request.reference_images {
            reference_images.push(Self::read_as_base64(path).await?);
        }

        let api_request = ApiImageRequest {
            model: self.image_model.clone(),
            prompt: request.prompt.clone(),
            aspect_ratio: request.aspect_ratio.clone(),
            image_size: request.image_size.clone(),
            reference_images,
        };

        self.post_generation("/v1/images/generations", &api_request)
            .await
    }

    async fn generate_video(
        &self,
        request: &VideoRequest,
    ) -> std::result::Result<Vec<u8>, GenerationError> {
        let start_image = match &request.start_image {
            Some(path) => Some(Self::read_as_base64(path).await?),
            None => None,
        };

        let api_request = ApiVideoRequest {
            model: self.video_model.clone(),
            prompt: request.prompt.clone(),
            aspect_ratio: request.aspect_ratio.clone(),
            duration_seconds: request.duration_seconds.clone(),
            resolution: request.resolution.clone(),
            start_image,
            negative_prompt: request.negative_prompt.clone(),
        };

        self.post_generation("/v1/videos/generations", &api_request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_status_is_retryable() {
        let err = classify_http_failure(StatusCode::TOO_MANY_REQUESTS, "{}");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_server_error_is_retryable() {
        let err = classify_http_failure(StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_error_is_terminal() {
        let body = r#"{"error":{"message":"content policy violation","code":"content_policy"}}"#;
        let err = classify_http_failure(StatusCode::BAD_REQUEST, body);
        assert!(!err.is_retryable());
        assert!(err.message().contains("content policy violation"));
        assert!(err.message().contains("content_policy"));
    }
}
