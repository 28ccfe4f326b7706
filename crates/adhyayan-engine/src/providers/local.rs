//! Local heuristic strategy — the guaranteed terminal step of the cascade.
//!
//! Wraps the offline concept/structure extractor behind the same strategy
//! interface the remote providers use. Performs no I/O and has no failure
//! path: structured operations emit the same JSON shape providers are
//! prompted for, so the orchestrator's single parse path applies everywhere.

use anyhow::Result;
use async_trait::async_trait;

use super::{GenerationStrategy, PreparedRequest};
use crate::heuristic;
use crate::types::{OperationKind, ProviderResult};

pub const LOCAL_METHOD_TAG: &str = "local-heuristic";

const SUMMARY_LEAD_SENTENCES: usize = 3;
const QUIZ_QUESTION_COUNT: usize = 5;

#[derive(Debug, Default)]
pub struct LocalHeuristicStrategy;

impl LocalHeuristicStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenerationStrategy for LocalHeuristicStrategy {
    fn tag(&self) -> &str {
        LOCAL_METHOD_TAG
    }

    async fn attempt(&self, request: &PreparedRequest) -> Result<ProviderResult> {
        let text = match request.operation {
            OperationKind::Ocr => {
                if request.raw_text.trim().is_empty() {
                    "No text could be extracted from the image without a vision provider."
                        .to_string()
                } else {
                    request.raw_text.clone()
                }
            }
            OperationKind::Summarize => {
                heuristic::summarize(&request.raw_text, SUMMARY_LEAD_SENTENCES)
            }
            OperationKind::QuizGen => {
                let quiz = heuristic::build_quiz(&request.raw_text, QUIZ_QUESTION_COUNT);
                serde_json::to_string(&quiz)?
            }
            OperationKind::MindmapGen => {
                let mindmap = heuristic::build_mindmap(&request.raw_text);
                serde_json::to_string(&mindmap)?
            }
            // For chat the raw text field carries the user's question, not
            // the rendered provider prompt.
            OperationKind::RagChat => {
                heuristic::answer(&request.raw_text, &request.context, "")
            }
        };

        Ok(ProviderResult::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::ContextBundle;
    use crate::params::NormalizedParams;
    use crate::prompt::parse_payload;

    fn request(operation: OperationKind, raw_text: &str) -> PreparedRequest {
        PreparedRequest {
            operation,
            prompt: String::new(),
            raw_text: raw_text.to_string(),
            image_url: None,
            params: NormalizedParams {
                max_tokens: 1024,
                temperature: 0.7,
                top_p: 0.95,
            },
            context: ContextBundle::default(),
        }
    }

    const NOTES: &str = "Acids donate protons in solution. Bases accept protons. \
        The pH scale measures hydrogen ion concentration. Buffers resist pH change.";

    #[tokio::test]
    async fn test_quiz_output_parses_through_shared_path() {
        let strategy = LocalHeuristicStrategy::new();
        let result = strategy
            .attempt(&request(OperationKind::QuizGen, NOTES))
            .await
            .unwrap();
        let payload = parse_payload(OperationKind::QuizGen, &result.text).unwrap();
        assert!(payload.as_artifact().is_some());
    }

    #[tokio::test]
    async fn test_mindmap_output_parses_through_shared_path() {
        let strategy = LocalHeuristicStrategy::new();
        let result = strategy
            .attempt(&request(OperationKind::MindmapGen, NOTES))
            .await
            .unwrap();
        assert!(parse_payload(OperationKind::MindmapGen, &result.text).is_ok());
    }

    #[tokio::test]
    async fn test_ocr_without_text_yields_placeholder() {
        let strategy = LocalHeuristicStrategy::new();
        let result = strategy
            .attempt(&request(OperationKind::Ocr, ""))
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.text.trim().is_empty());
    }

    #[tokio::test]
    async fn test_degenerate_quiz_input_still_valid() {
        let strategy = LocalHeuristicStrategy::new();
        let result = strategy
            .attempt(&request(OperationKind::QuizGen, "x"))
            .await
            .unwrap();
        assert!(parse_payload(OperationKind::QuizGen, &result.text).is_ok());
    }
}
