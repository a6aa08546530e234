//! Model-driven field extraction: prompt, completion call, parsing and normalization.

mod client;
mod normalizer;
mod parser;
mod prompt;
pub mod rules;

pub use client::{CompletionClient, OpenAiClient};
pub use normalizer::{Normalizer, clean_text};
pub use parser::{NOT_FOUND_MARKER, ParsedResponse, ResponseParser, is_not_found};
pub use prompt::PromptBuilder;
