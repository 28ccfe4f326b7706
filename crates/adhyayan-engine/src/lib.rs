//! adhyayan-engine — resilient multi-provider content generation for
//! study-aid backends.
//!
//! Given a unit of work (OCR an image, summarize notes, build a quiz or
//! mindmap, answer a grounded chat query), the pipeline normalizes
//! parameters, consults a TTL cache and per-provider rate windows, then
//! cascades through remote providers in priority order before falling back
//! to a fully local heuristic extractor. Callers always receive a
//! structurally valid result; only configuration errors and rate-limit
//! exhaustion surface as failures.

pub mod assemble;
pub mod cache;
pub mod chunker;
pub mod clock;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod heuristic;
pub mod limiter;
pub mod orchestrator;
pub mod params;
pub mod prompt;
pub mod providers;
pub mod types;

// Re-export primary types for convenience
pub use assemble::{
    ChatStore, ContextAssembler, ContextBundle, ContextItem, EvidenceStore, SessionStore,
    SourceKind,
};
pub use config::{PipelineConfig, ProviderConfig, ProviderKind};
pub use error::PipelineError;
pub use orchestrator::GenerationPipeline;
pub use providers::{GenerationStrategy, ImageResolver, PreparedRequest};
pub use types::{
    ContentType, EvidenceRecord, GenerationParams, GenerationRequest, GenerationResult,
    InputPayload, Mindmap, OperationKind, ProviderResult, Quiz, QuizQuestion, ResultPayload,
    StructuredArtifact, TopicNode,
};

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;
