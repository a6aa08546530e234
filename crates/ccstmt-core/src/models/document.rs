//! Ingested statement document and its per-page text.

use serde::{Deserialize, Serialize};

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSource {
    /// Embedded text layer of the PDF.
    Digital,
    /// Optical character recognition of the rendered page.
    Ocr,
}

/// Text of a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// Page number (1-indexed).
    pub index: u32,
    /// Extracted text.
    pub text: String,
    /// Extraction source.
    pub source: PageSource,
}

impl PageText {
    pub fn digital(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            source: PageSource::Digital,
        }
    }

    pub fn ocr(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            source: PageSource::Ocr,
        }
    }

    /// Number of non-whitespace characters, the measure used for the OCR decision.
    pub fn significant_chars(&self) -> usize {
        significant_chars(&self.text)
    }
}

/// Count characters that are not whitespace.
pub fn significant_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// A statement PDF together with the text of all of its pages.
#[derive(Debug, Clone)]
pub struct Document {
    raw: Vec<u8>,
    pages: Vec<PageText>,
}

impl Document {
    /// Assemble a document. Pages are kept sorted by index.
    pub fn new(raw: Vec<u8>, mut pages: Vec<PageText>) -> Self {
        pages.sort_by_key(|p| p.index);
        Self { raw, pages }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    /// Full text with a boundary marker before every page, in page order.
    ///
    /// Pages with empty text still get their marker so the page sequence
    /// stays complete.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|p| format!("--- Page {} ---\n{}", p.index, p.text.trim_end()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
