//! Common traits and types for generation backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome classification for one provider call.
///
/// Retryable failures (network trouble, 5xx, provider rate-limit pushback)
/// are worth another attempt after a backoff. Terminal failures (content
/// policy rejection, invalid argument) will fail identically on every
/// attempt, so they are surfaced immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    Retryable(String),
    Terminal(String),
}

impl GenerationError {
    pub fn message(&self) -> &str {
        match self {
            GenerationError::Retryable(msg) | GenerationError::Terminal(msg) => msg,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Retryable(_))
    }
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Retryable(msg) => write!(f, "retryable provider error: {}", msg),
            GenerationError::Terminal(msg) => write!(f, "terminal provider error: {}", msg),
        }
    }
}

/// Request to synthesize one image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,

    /// Absolute paths of reference images (character/prop consistency).
    #[serde(default)]
    pub reference_images: Vec<PathBuf>,

    pub aspect_ratio: String,

    /// Size hint such as "2K"; provider default when absent.
    pub image_size: Option<String>,
}

/// Request to synthesize one video clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRequest {
    pub prompt: String,

    /// Absolute path of the start frame (image-to-video mode).
    pub start_image: Option<PathBuf>,

    /// Provider accepts "4", "6" or "8".
    pub duration_seconds: String,

    pub aspect_ratio: String,

    pub resolution: String,

    pub negative_prompt: Option<String>,
}

/// Clamp a requested duration to the provider-supported "4"/"6"/"8" steps.
pub fn normalize_duration_seconds(duration_seconds: Option<u32>) -> String {
    let value = duration_seconds.unwrap_or(4);
    if value <= 4 {
        "4".to_string()
    } else if value <= 6 {
        "6".to_string()
    } else {
        "8".to_string()
    }
}

/// Trait for generation backends
///
/// One call maps to one remote invocation returning the artifact bytes or a
/// classified error; retry handling lives above this trait.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Synthesize one image and return its bytes.
    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> std::result::Result<Vec<u8>, GenerationError>;

    /// Synthesize one video clip and return its bytes.
    async fn generate_video(
        &self,
        request: &VideoRequest,
    ) -> std::result::Result<Vec<u8>, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_normalization() {
        assert_eq!(normalize_duration_seconds(None), "4");
        assert_eq!(normalize_duration_seconds(Some(0)), "4");
        assert_eq!(normalize_duration_seconds(Some(4)), "4");
        assert_eq!(normalize_duration_seconds(Some(5)), "6");
        assert_eq!(normalize_duration_seconds(Some(7)), "8");
        assert_eq!(normalize_duration_seconds(Some(30)), "8");
    }

    #[test]
    fn test_error_classification_accessors() {
        assert!(GenerationError::Retryable("503".into()).is_retryable());
        assert!(!GenerationError::Terminal("policy".into()).is_retryable());
        assert_eq!(GenerationError::Terminal("policy".into()).message(), "policy");
    }
}
