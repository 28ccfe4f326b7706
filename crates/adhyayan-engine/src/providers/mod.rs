//! Generation strategies.
//!
//! Every provider — remote or local — is adapted behind one trait with a
//! single `attempt` method, so the orchestrator can iterate an ordered
//! strategy list instead of duplicating the fallback cascade per call site.

use anyhow::Result;
use async_trait::async_trait;

pub mod gemini;
pub mod local;
pub mod openai;

pub use gemini::GeminiProvider;
pub use local::LocalHeuristicStrategy;
pub use openai::OpenAiCompatibleProvider;

use crate::assemble::ContextBundle;
use crate::params::NormalizedParams;
use crate::types::{OperationKind, ProviderResult};

/// Everything a strategy needs to make one attempt: the operation, the
/// rendered prompt, the bounded raw text (for local analysis), an optional
/// resolved image URL, normalized parameters, and the assembled context.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub operation: OperationKind,
    pub prompt: String,
    pub raw_text: String,
    pub image_url: Option<String>,
    pub params: NormalizedParams,
    pub context: ContextBundle,
}

#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    /// Stable tag recorded as `method_used` when this strategy produces the
    /// final result.
    fn tag(&self) -> &str;

    fn supports_vision(&self) -> bool {
        false
    }

    /// Make one attempt. Errors are soft: the orchestrator logs them and
    /// advances to the next strategy.
    async fn attempt(&self, request: &PreparedRequest) -> Result<ProviderResult>;
}

/// Resolves an opaque image reference to a retrievable URL. A `None` means
/// the image is unavailable and the request degrades to text-only.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, image_ref: &str) -> Option<String>;
}
