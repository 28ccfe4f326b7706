//! Offline concept and structure extraction.
//!
//! The terminal fallback of the generation cascade: a deterministic,
//! heuristic analyzer that turns raw text into evidence chunks, mindmap
//! trees, quiz skeletons, summaries, and grounded answers. No network, no
//! failure path — degenerate input yields static placeholder content, so a
//! structurally valid, non-empty artifact is always produced.

use uuid::Uuid;

use crate::assemble::ContextBundle;
use crate::chunker::{split_sentences, TextChunker};
use crate::types::{ContentType, EvidenceRecord, Mindmap, Quiz, QuizQuestion, TopicNode};

/// Confidence attached to artifacts produced without any provider.
pub const HEURISTIC_CONFIDENCE: f32 = 0.35;

const MIN_CONCEPT_LEN: usize = 4;
const MAX_CONCEPTS: usize = 16;
const EVIDENCE_CHUNK_SIZE: usize = 400;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are",
    "because", "been", "before", "being", "below", "between", "both", "but", "can",
    "could", "did", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "her", "here", "hers", "him", "his",
    "how", "into", "its", "itself", "just", "more", "most", "not", "now", "off",
    "once", "only", "other", "our", "ours", "out", "over", "own", "same", "she",
    "should", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "then", "there", "these", "they", "this", "those", "through", "too", "under",
    "until", "very", "was", "were", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
];

// ── Concept extraction ────────────────────────────────────────────────────

/// Pick up to `max` key concepts: whitespace tokens stripped of punctuation,
/// filtered by length and stopword set, deduplicated case-insensitively,
/// ranked by order of first appearance rather than frequency.
pub fn key_concepts(text: &str, max: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut concepts = Vec::new();

    for token in text.split_whitespace() {
        let cleaned = token.trim_matches(|c: char| !c.is_alphanumeric());
        if cleaned.len() < MIN_CONCEPT_LEN {
            continue;
        }
        if cleaned.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let lower = cleaned.to_lowercase();
        if STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        if seen.insert(lower) {
            concepts.push(cleaned.to_string());
            if concepts.len() >= max {
                break;
            }
        }
    }

    concepts
}

// ── Content classification ────────────────────────────────────────────────

/// Rough shape detection for a piece of extracted text.
pub fn classify_content(text: &str) -> ContentType {
    let has_equation = looks_like_equation(text);
    let has_diagram = looks_like_diagram(text);
    match (has_equation, has_diagram) {
        (true, true) => ContentType::Mixed,
        (true, false) => ContentType::Equation,
        (false, true) => ContentType::Diagram,
        (false, false) => ContentType::Text,
    }
}

fn looks_like_equation(text: &str) -> bool {
    if text.contains('=') && text.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    const MATH_SYMBOLS: &[char] = &['∫', '√', '∑', '≈', '≤', '≥', '±', '×', '÷', '^'];
    text.chars().any(|c| MATH_SYMBOLS.contains(&c))
}

fn looks_like_diagram(text: &str) -> bool {
    let lower = text.to_lowercase();
    const DIAGRAM_MARKERS: &[&str] = &["figure", "diagram", "chart", "graph", "flowchart"];
    DIAGRAM_MARKERS.iter().any(|m| lower.contains(m)) || text.contains("->") || text.contains('→')
}

// ── Artifact builders ─────────────────────────────────────────────────────

/// Split extracted text into evidence records, one per chunk, with content
/// classification and source-position locators.
pub fn build_evidence(text: &str, method: &str, confidence: f32) -> Vec<EvidenceRecord> {
    let chunker = TextChunker::new(EVIDENCE_CHUNK_SIZE);
    let chunks = chunker.chunk(text);

    if chunks.is_empty() {
        return vec![EvidenceRecord {
            id: Uuid::new_v4(),
            text: "No readable text was found in the source.".to_string(),
            confidence: 0.0,
            content_type: ContentType::Text,
            source_locator: "segment 1".to_string(),
            method: method.to_string(),
        }];
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| EvidenceRecord {
            id: Uuid::new_v4(),
            content_type: classify_content(&chunk),
            text: chunk,
            confidence: confidence.clamp(0.0, 1.0),
            source_locator: format!("segment {}", i + 1),
            method: method.to_string(),
        })
        .collect()
}

/// Extractive summary: lead sentences plus a key-concept line.
pub fn summarize(text: &str, max_sentences: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return "The provided material contains no summarizable text.".to_string();
    }

    let lead: Vec<&str> = sentences.iter().take(max_sentences.max(1)).copied().collect();
    let mut summary = lead.join(" ");

    let concepts = key_concepts(text, 6);
    if !concepts.is_empty() {
        summary.push_str("\n\nKey concepts: ");
        summary.push_str(&concepts.join(", "));
        summary.push('.');
    }

    summary
}

/// Group key concepts into a small topic tree. The first concept (or the
/// most prominent line) becomes the root; the rest are bucketed into at
/// most four topics with a handful of sub-concepts each.
pub fn build_mindmap(text: &str) -> Mindmap {
    let concepts = key_concepts(text, MAX_CONCEPTS);

    if concepts.is_empty() {
        return Mindmap {
            root: "Study Notes".to_string(),
            topics: vec![TopicNode {
                label: "Review".to_string(),
                children: vec!["Re-read the source material".to_string()],
            }],
        };
    }

    let root = title_case(&concepts[0]);
    let rest = &concepts[1..];

    let mut topics = Vec::new();
    for group in rest.chunks(4).take(4) {
        let label = title_case(&group[0]);
        let children: Vec<String> = if group.len() > 1 {
            group[1..].iter().map(|c| c.to_string()).collect()
        } else {
            vec![group[0].to_string()]
        };
        topics.push(TopicNode { label, children });
    }

    if topics.is_empty() {
        topics.push(TopicNode {
            label: root.clone(),
            children: vec![concepts[0].to_string()],
        });
    }

    Mindmap { root, topics }
}

/// Turn each key concept into a templated four-option multiple-choice
/// skeleton. The sentence that first mentions the concept is the designated
/// correct option; the remaining options are built from other concepts.
pub fn build_quiz(text: &str, count: usize) -> Quiz {
    let concepts = key_concepts(text, MAX_CONCEPTS);
    let sentences = split_sentences(text);

    if concepts.is_empty() || sentences.is_empty() {
        return Quiz {
            questions: vec![placeholder_question()],
        };
    }

    let mut questions = Vec::new();
    for (i, concept) in concepts.iter().take(count.max(1)).enumerate() {
        let correct = sentence_mentioning(&sentences, concept)
            .unwrap_or(sentences[0])
            .trim()
            .to_string();
        let correct = clip(&correct, 160);

        let mut distractors: Vec<String> = concepts
            .iter()
            .filter(|c| !c.eq_ignore_ascii_case(concept))
            .take(3)
            .map(|other| format!("It is primarily a property of {}", other.to_lowercase()))
            .collect();
        while distractors.len() < 3 {
            distractors.push("It is not covered in the studied material".to_string());
        }

        let correct_index = i % 4;
        let mut options = Vec::with_capacity(4);
        let mut d = distractors.into_iter();
        for slot in 0..4 {
            if slot == correct_index {
                options.push(correct.clone());
            } else if let Some(distractor) = d.next() {
                options.push(distractor);
            }
        }

        questions.push(QuizQuestion {
            prompt: format!(
                "Which statement best describes \"{}\" in the studied material?",
                concept
            ),
            options,
            correct_index,
            explanation: Some("Derived directly from the study text.".to_string()),
        });
    }

    Quiz { questions }
}

/// Templated grounded reply used when no provider can answer a chat query.
pub fn answer(query: &str, context: &ContextBundle, text: &str) -> String {
    let mut corpus = String::new();
    if !context.is_empty() {
        corpus.push_str(&context.render());
        corpus.push('\n');
    }
    corpus.push_str(text);

    let sentences = split_sentences(&corpus);
    if sentences.is_empty() {
        return format!(
            "I could not find stored material related to \"{}\". Try uploading notes or re-asking after a study session.",
            clip(query.trim(), 120)
        );
    }

    let relevant = top_relevant_sentences(&sentences, query, 3);
    let body = if relevant.is_empty() {
        sentences.iter().take(2).copied().collect::<Vec<_>>().join(" ")
    } else {
        relevant.join(" ")
    };

    format!("Based on the stored study material: {}", body)
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Score sentences by query-term overlap and return the best `max` in their
/// original order.
fn top_relevant_sentences<'a>(sentences: &[&'a str], query: &str, max: usize) -> Vec<&'a str> {
    let query_terms: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.len() > 2)
        .collect();

    if query_terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, usize, &str)> = sentences
        .iter()
        .enumerate()
        .map(|(idx, &s)| {
            let lower = s.to_lowercase();
            let score = query_terms.iter().filter(|t| lower.contains(t.as_str())).count();
            (idx, score, s)
        })
        .filter(|(_, score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut selected: Vec<(usize, &str)> =
        scored.into_iter().take(max).map(|(idx, _, s)| (idx, s)).collect();
    selected.sort_by_key(|(idx, _)| *idx);
    selected.into_iter().map(|(_, s)| s).collect()
}

fn sentence_mentioning<'a>(sentences: &[&'a str], concept: &str) -> Option<&'a str> {
    let needle = concept.to_lowercase();
    sentences
        .iter()
        .find(|s| s.to_lowercase().contains(&needle))
        .copied()
}

fn placeholder_question() -> QuizQuestion {
    QuizQuestion {
        prompt: "What is the best next step for studying this material?".to_string(),
        options: vec![
            "Review the uploaded notes and try again".to_string(),
            "Skip the material entirely".to_string(),
            "Delete the study session".to_string(),
            "Ignore the source document".to_string(),
        ],
        correct_index: 0,
        explanation: Some("The material was too short to generate topical questions.".to_string()),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", clipped.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES: &str = "Osmosis moves water across a semipermeable membrane. \
        Diffusion spreads particles from high to low concentration. \
        The membrane potential depends on ion gradients. \
        Active transport requires energy in the form of ATP.";

    #[test]
    fn test_concepts_ranked_by_first_appearance() {
        let concepts = key_concepts(NOTES, 16);
        assert_eq!(concepts[0], "Osmosis");
        let osmosis_pos = concepts.iter().position(|c| c == "Osmosis").unwrap();
        let transport_pos = concepts.iter().position(|c| c == "transport").unwrap();
        assert!(osmosis_pos < transport_pos);
    }

    #[test]
    fn test_concepts_filter_stopwords_and_short_tokens() {
        let concepts = key_concepts("the and from with a an of to osmosis", 10);
        assert_eq!(concepts, vec!["osmosis"]);
    }

    #[test]
    fn test_concepts_deduplicate_case_insensitively() {
        let concepts = key_concepts("Enzyme enzyme ENZYME substrate", 10);
        assert_eq!(concepts, vec!["Enzyme", "substrate"]);
    }

    #[test]
    fn test_classify_equation() {
        assert_eq!(classify_content("F = ma where m is 2 kg"), ContentType::Equation);
        assert_eq!(classify_content("√2 is irrational"), ContentType::Equation);
    }

    #[test]
    fn test_classify_diagram_and_mixed() {
        assert_eq!(
            classify_content("See Figure 3 for the cell wall layout"),
            ContentType::Diagram
        );
        assert_eq!(
            classify_content("Figure 2 shows E = mc2 in context"),
            ContentType::Mixed
        );
    }

    #[test]
    fn test_classify_plain_text() {
        assert_eq!(classify_content("Plants absorb sunlight"), ContentType::Text);
    }

    #[test]
    fn test_evidence_records_cover_text() {
        let records = build_evidence(NOTES, "local-heuristic", HEURISTIC_CONFIDENCE);
        assert!(!records.is_empty());
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.source_locator, format!("segment {}", i + 1));
            assert_eq!(record.method, "local-heuristic");
            assert!(record.confidence >= 0.0 && record.confidence <= 1.0);
        }
    }

    #[test]
    fn test_evidence_from_empty_text_is_placeholder() {
        let records = build_evidence("", "local-heuristic", HEURISTIC_CONFIDENCE);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].confidence, 0.0);
        assert!(!records[0].text.is_empty());
    }

    #[test]
    fn test_summary_has_lead_and_concepts() {
        let summary = summarize(NOTES, 2);
        assert!(summary.starts_with("Osmosis moves water"));
        assert!(summary.contains("Key concepts:"));
    }

    #[test]
    fn test_summary_of_empty_text_is_placeholder() {
        let summary = summarize("", 3);
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_mindmap_buckets_are_bounded() {
        let mindmap = build_mindmap(NOTES);
        assert!(!mindmap.root.is_empty());
        assert!(!mindmap.topics.is_empty());
        assert!(mindmap.topics.len() <= 4);
        for topic in &mindmap.topics {
            assert!(!topic.label.is_empty());
            assert!(!topic.children.is_empty());
            assert!(topic.children.len() <= 4);
        }
    }

    #[test]
    fn test_mindmap_degenerate_input_gets_placeholder() {
        let mindmap = build_mindmap("a b c");
        assert_eq!(mindmap.root, "Study Notes");
        assert_eq!(mindmap.topics.len(), 1);
    }

    #[test]
    fn test_quiz_questions_are_well_formed() {
        let quiz = build_quiz(NOTES, 4);
        assert!(!quiz.questions.is_empty());
        for question in &quiz.questions {
            assert!(question.is_well_formed());
        }
    }

    #[test]
    fn test_quiz_correct_option_comes_from_source() {
        let quiz = build_quiz(NOTES, 1);
        let q = &quiz.questions[0];
        assert!(q.options[q.correct_index].contains("Osmosis"));
    }

    #[test]
    fn test_quiz_degenerate_input_gets_placeholder() {
        let quiz = build_quiz("", 5);
        assert_eq!(quiz.questions.len(), 1);
        assert!(quiz.questions[0].is_well_formed());
    }

    #[test]
    fn test_answer_picks_relevant_sentences() {
        let reply = answer("how does active transport work", &ContextBundle::default(), NOTES);
        assert!(reply.contains("Active transport"));
    }

    #[test]
    fn test_answer_with_no_material_is_apologetic() {
        let reply = answer("what is entropy", &ContextBundle::default(), "");
        assert!(reply.contains("entropy"));
        assert!(reply.to_lowercase().contains("could not find"));
    }
}
