//! Cache keys.
//!
//! A fingerprint is a SHA-256 digest over the operation kind, the normalized
//! input, and the normalized generation parameters. Semantically different
//! requests never share a key.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::params::NormalizedParams;
use crate::types::{InputPayload, OperationKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest `(operation, normalized input, normalized parameters)` into a
/// stable cache key. Input text is whitespace-normalized first so trailing
/// blanks and line-ending differences don't split the cache.
pub fn fingerprint(
    operation: OperationKind,
    input: &InputPayload,
    params: &NormalizedParams,
) -> Fingerprint {
    let mut hasher = Sha256::new();

    hasher.update(operation.tag().as_bytes());
    hasher.update([0u8]);

    if let Some(text) = &input.text {
        let normalized: Vec<&str> = text.split_whitespace().collect();
        hasher.update(normalized.join(" ").as_bytes());
    }
    hasher.update([0u8]);

    if let Some(image_ref) = &input.image_ref {
        hasher.update(image_ref.as_bytes());
    }
    hasher.update([0u8]);

    hasher.update(params.max_tokens.to_le_bytes());
    hasher.update(params.temperature.to_bits().to_le_bytes());
    hasher.update(params.top_p.to_bits().to_le_bytes());

    Fingerprint(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NormalizedParams {
        NormalizedParams {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.95,
        }
    }

    fn text_input(text: &str) -> InputPayload {
        InputPayload {
            text: Some(text.to_string()),
            image_ref: None,
        }
    }

    #[test]
    fn test_identical_requests_share_a_fingerprint() {
        let a = fingerprint(OperationKind::Summarize, &text_input("photosynthesis"), &params());
        let b = fingerprint(OperationKind::Summarize, &text_input("photosynthesis"), &params());
        assert_eq!(a, b);
    }

    #[test]
    fn test_whitespace_variants_share_a_fingerprint() {
        let a = fingerprint(OperationKind::Summarize, &text_input("cell  division\n"), &params());
        let b = fingerprint(OperationKind::Summarize, &text_input("cell division"), &params());
        assert_eq!(a, b);
    }

    #[test]
    fn test_operation_kind_separates_keys() {
        let a = fingerprint(OperationKind::Summarize, &text_input("mitosis"), &params());
        let b = fingerprint(OperationKind::QuizGen, &text_input("mitosis"), &params());
        assert_ne!(a, b);
    }

    #[test]
    fn test_parameters_separate_keys() {
        let a = fingerprint(OperationKind::Summarize, &text_input("mitosis"), &params());
        let mut other = params();
        other.max_tokens = 2048;
        let b = fingerprint(OperationKind::Summarize, &text_input("mitosis"), &other);
        assert_ne!(a, b);
    }

    #[test]
    fn test_image_ref_separates_keys() {
        let with_image = InputPayload {
            text: None,
            image_ref: Some("img-1".into()),
        };
        let other_image = InputPayload {
            text: None,
            image_ref: Some("img-2".into()),
        };
        let a = fingerprint(OperationKind::Ocr, &with_image, &params());
        let b = fingerprint(OperationKind::Ocr, &other_image, &params());
        assert_ne!(a, b);
    }
}
