//! Prompt construction and structured-output parsing.
//!
//! One builder per operation kind; providers receive bounded input text and
//! numbered context documents. Structured responses (quiz, mindmap) are
//! parsed strictly into typed artifacts — a parse failure is a soft provider
//! error that feeds the fallback cascade, never a best-effort string scrape.

use anyhow::{anyhow, Result};

use crate::assemble::ContextBundle;
use crate::types::{Mindmap, OperationKind, Quiz, ResultPayload, StructuredArtifact};

/// Build the provider prompt for an operation.
pub fn build_prompt(
    operation: OperationKind,
    input_text: &str,
    context: &ContextBundle,
    has_image: bool,
) -> String {
    match operation {
        OperationKind::Ocr => ocr_prompt(input_text, has_image),
        OperationKind::Summarize => summarize_prompt(input_text),
        OperationKind::QuizGen => quiz_prompt(input_text),
        OperationKind::MindmapGen => mindmap_prompt(input_text),
        OperationKind::RagChat => chat_prompt(input_text, context),
    }
}

fn ocr_prompt(input_text: &str, has_image: bool) -> String {
    let mut prompt = String::from(
        "Extract every piece of text from the provided study material. \
         Preserve line breaks, equations, and labels exactly as written. \
         Transcribe equations in plain notation. \
         Output only the extracted text with no commentary.",
    );
    if !has_image && !input_text.is_empty() {
        prompt.push_str("\n\nMaterial:\n");
        prompt.push_str(input_text);
    }
    prompt
}

fn summarize_prompt(input_text: &str) -> String {
    format!(
        "Summarize the following study material for revision. \
         Start with a two-sentence overview, then list the key points. \
         Keep the summary faithful to the material; do not invent facts.\n\n\
         Material:\n{}",
        input_text
    )
}

fn quiz_prompt(input_text: &str) -> String {
    format!(
        "Create multiple-choice questions from the following study material. \
         Respond with ONLY a JSON object in exactly this shape:\n\
         {{\"questions\":[{{\"prompt\":\"...\",\"options\":[\"a\",\"b\",\"c\",\"d\"],\"correct_index\":0,\"explanation\":\"...\"}}]}}\n\
         Each question must have exactly four options and one correct answer \
         drawn from the material.\n\n\
         Material:\n{}",
        input_text
    )
}

fn mindmap_prompt(input_text: &str) -> String {
    format!(
        "Build a mindmap of the following study material. \
         Respond with ONLY a JSON object in exactly this shape:\n\
         {{\"root\":\"main subject\",\"topics\":[{{\"label\":\"topic\",\"children\":[\"sub-concept\"]}}]}}\n\
         Use at most six topics with at most five children each.\n\n\
         Material:\n{}",
        input_text
    )
}

fn chat_prompt(query: &str, context: &ContextBundle) -> String {
    let context_block = if context.is_empty() {
        "No stored context is available for this question.".to_string()
    } else {
        context.render()
    };
    format!(
        "You are a study assistant answering from the student's own material. \
         Ground every claim in the context documents below and say so when \
         the context does not cover the question.\n\n\
         === CONTEXT ===\n{}\n=== END CONTEXT ===\n\n\
         Question: {}\n\nAnswer:",
        context_block, query
    )
}

// ── Structured-output parsing ─────────────────────────────────────────────

/// Interpret a provider's raw text as the payload for `operation`.
/// Text operations pass through; structured operations require valid JSON
/// of the documented shape.
pub fn parse_payload(operation: OperationKind, raw: &str) -> Result<ResultPayload> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("provider returned empty payload"));
    }

    match operation {
        OperationKind::Ocr | OperationKind::Summarize | OperationKind::RagChat => {
            Ok(ResultPayload::Text(trimmed.to_string()))
        }
        OperationKind::QuizGen => {
            let quiz = parse_quiz(trimmed)?;
            Ok(ResultPayload::Artifact(StructuredArtifact::Quiz(quiz)))
        }
        OperationKind::MindmapGen => {
            let mindmap = parse_mindmap(trimmed)?;
            Ok(ResultPayload::Artifact(StructuredArtifact::Mindmap(mindmap)))
        }
    }
}

pub fn parse_quiz(raw: &str) -> Result<Quiz> {
    let json = extract_json_object(raw)?;
    let quiz: Quiz = serde_json::from_str(json)
        .map_err(|e| anyhow!("quiz payload did not match expected shape: {}", e))?;

    if quiz.questions.is_empty() {
        return Err(anyhow!("quiz payload contained no questions"));
    }
    for (i, question) in quiz.questions.iter().enumerate() {
        if !question.is_well_formed() {
            return Err(anyhow!(
                "quiz question {} is malformed (needs 4 options and an in-range answer)",
                i
            ));
        }
    }
    Ok(quiz)
}

pub fn parse_mindmap(raw: &str) -> Result<Mindmap> {
    let json = extract_json_object(raw)?;
    let mindmap: Mindmap = serde_json::from_str(json)
        .map_err(|e| anyhow!("mindmap payload did not match expected shape: {}", e))?;

    if mindmap.root.trim().is_empty() {
        return Err(anyhow!("mindmap payload has an empty root"));
    }
    if mindmap.topics.is_empty() {
        return Err(anyhow!("mindmap payload contained no topics"));
    }
    if mindmap
        .topics
        .iter()
        .any(|t| t.label.trim().is_empty() || t.children.is_empty())
    {
        return Err(anyhow!("mindmap payload has an empty topic"));
    }
    Ok(mindmap)
}

/// Locate the JSON object in a model response, stripping markdown fences and
/// surrounding prose.
fn extract_json_object(raw: &str) -> Result<&str> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&cleaned[start..=end]),
        _ => Err(anyhow!("no JSON object found in provider response")),
    }
}
