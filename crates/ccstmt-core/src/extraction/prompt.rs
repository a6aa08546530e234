//! Deterministic extraction prompt construction.

use std::fmt::Write;

use super::parser::NOT_FOUND_MARKER;
use crate::models::field::FieldSelection;

/// Builds the instruction sent to the completion endpoint.
///
/// The prompt is a pure function of the document text, the selected fields
/// and the truncation limit.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_document_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_document_chars: usize) -> Self {
        Self { max_document_chars }
    }

    pub fn max_document_chars(&self) -> usize {
        self.max_document_chars
    }

    pub fn build(&self, document_text: &str, selection: &FieldSelection) -> String {
        let text = truncate_chars(document_text, self.max_document_chars);
        let keys = selection
            .iter()
            .map(|f| format!("\"{}\"", f.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut prompt = String::new();
        prompt.push_str("You are a financial data extraction system.\n");
        prompt.push_str("From the credit card statement below, extract the following fields:\n");
        for field in selection.iter() {
            // Writing to a String cannot fail.
            let _ = writeln!(prompt, "- {}: {}", field.as_str(), field.description());
        }
        prompt.push('\n');
        let _ = writeln!(
            prompt,
            "Return only a single flat JSON object with exactly these keys: {}.",
            keys
        );
        prompt.push_str("Every value must be a JSON string. Do not add markdown or explanations.\n");
        let _ = writeln!(
            prompt,
            "If a field cannot be found in the statement, use the value \"{}\".",
            NOT_FOUND_MARKER
        );
        prompt.push_str("\nStatement text:\n");
        prompt.push_str(text);
        prompt.push('\n');
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(7000)
    }
}

/// The first `max` characters of `s`, cut on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((at, _)) => &s[..at],
        None => s,
    }
}
