//! Generation provider client: backend trait, retry policy, HTTP implementation

pub mod http_backend;
pub mod retry;
pub mod traits;

pub use http_backend::HttpGenerationBackend;
pub use retry::{call_with_retry, CallFailure, CallOutcome, RetryPolicy};
pub use traits::{GenerationBackend, GenerationError, ImageRequest, VideoRequest};
