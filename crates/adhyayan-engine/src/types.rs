use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The unit of work the pipeline is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Ocr,
    Summarize,
    QuizGen,
    MindmapGen,
    RagChat,
}

impl OperationKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Summarize => "summarize",
            Self::QuizGen => "quiz_gen",
            Self::MindmapGen => "mindmap_gen",
            Self::RagChat => "rag_chat",
        }
    }

    /// OCR is the only operation that cannot run without a vision-capable
    /// provider; everything else degrades to text-only processing.
    pub fn requires_vision(&self) -> bool {
        matches!(self, Self::Ocr)
    }
}

/// Raw input handed to the pipeline: text, an opaque image reference, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputPayload {
    pub text: Option<String>,
    pub image_ref: Option<String>,
}

/// Caller-supplied generation parameters. All optional; the normalizer
/// applies defaults and clamps out-of-range values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: Option<i64>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

/// Identifiers for the stored context a request may pull from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRefs {
    pub session_id: Option<String>,
    pub image_id: Option<String>,
    pub limit: Option<usize>,
}

impl ContextRefs {
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.image_id.is_none()
    }
}

/// One incoming call into the pipeline. Created per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub operation: OperationKind,
    #[serde(default)]
    pub input: InputPayload,
    #[serde(default)]
    pub params: GenerationParams,
    #[serde(default)]
    pub context_refs: ContextRefs,
}

impl GenerationRequest {
    pub fn new(operation: OperationKind) -> Self {
        Self {
            operation,
            input: InputPayload::default(),
            params: GenerationParams::default(),
            context_refs: ContextRefs::default(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.input.text = Some(text.into());
        self
    }

    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.input.image_ref = Some(image_ref.into());
        self
    }
}

/// What a generation produced: plain text or a structured artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultPayload {
    Text(String),
    Artifact(StructuredArtifact),
}

impl ResultPayload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Artifact(_) => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&StructuredArtifact> {
        match self {
            Self::Text(_) => None,
            Self::Artifact(a) => Some(a),
        }
    }
}

/// The pipeline's answer. Immutable once constructed; `method_used` names
/// the strategy that actually produced the payload so downstream consumers
/// can show a lower-confidence indicator without special-casing errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub payload: ResultPayload,
    pub method_used: String,
    pub confidence: f32,
    pub from_cache: bool,
    pub processing_time_ms: u64,
}

/// Non-text output shapes: topic trees, question skeletons, evidence lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredArtifact {
    Mindmap(Mindmap),
    Quiz(Quiz),
    Evidence(Vec<EvidenceRecord>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mindmap {
    pub root: String,
    pub topics: Vec<TopicNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicNode {
    pub label: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

/// A multiple-choice skeleton: exactly four options, one designated correct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuizQuestion {
    /// Structural validity: four non-empty options and an in-range answer.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == 4
            && self.correct_index < 4
            && !self.prompt.trim().is_empty()
            && self.options.iter().all(|o| !o.trim().is_empty())
    }
}

/// Rough shape of a piece of extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Equation,
    Diagram,
    Mixed,
}

/// One chunk of extracted text with confidence and source-location metadata.
/// Created per chunk by the pipeline and owned by it until handed to the
/// persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: Uuid,
    pub text: String,
    pub confidence: f32,
    pub content_type: ContentType,
    pub source_locator: String,
    pub method: String,
}

/// Common shape every provider adapter returns before results re-enter the
/// orchestrator, regardless of the wire format it spoke.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub success: bool,
    pub text: String,
    pub raw: Option<serde_json::Value>,
}

impl ProviderResult {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            raw: None,
        }
    }
}

/// A prior study session as read from the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One stored chat exchange entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: String,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_tags_are_distinct() {
        let ops = [
            OperationKind::Ocr,
            OperationKind::Summarize,
            OperationKind::QuizGen,
            OperationKind::MindmapGen,
            OperationKind::RagChat,
        ];
        let tags: std::collections::HashSet<&str> = ops.iter().map(|o| o.tag()).collect();
        assert_eq!(tags.len(), ops.len());
    }

    #[test]
    fn test_only_ocr_requires_vision() {
        assert!(OperationKind::Ocr.requires_vision());
        assert!(!OperationKind::Summarize.requires_vision());
        assert!(!OperationKind::RagChat.requires_vision());
    }

    #[test]
    fn test_quiz_question_well_formed() {
        let q = QuizQuestion {
            prompt: "What is osmosis?".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 2,
            explanation: None,
        };
        assert!(q.is_well_formed());

        let bad = QuizQuestion {
            options: vec!["a".into(), "b".into()],
            ..q.clone()
        };
        assert!(!bad.is_well_formed());

        let out_of_range = QuizQuestion {
            correct_index: 4,
            ..q
        };
        assert!(!out_of_range.is_well_formed());
    }

    #[test]
    fn test_request_builder() {
        let req = GenerationRequest::new(OperationKind::Ocr)
            .with_image_ref("img-123")
            .with_text("scanned page");
        assert_eq!(req.input.image_ref.as_deref(), Some("img-123"));
        assert_eq!(req.input.text.as_deref(), Some("scanned page"));
    }
}
