//! Core library for credit-card statement extraction.
//!
//! This crate provides:
//! - PDF ingestion with per-page digital text extraction
//! - OCR fallback for scanned or low-text pages (tesseract CLI or PaddleOCR ONNX models)
//! - Prompt construction and a blocking client for OpenAI-compatible completion endpoints
//! - Tolerant parsing of model responses and normalization of amounts, dates and names
//! - CSV, plain text and JSON export of the extracted record

pub mod error;
pub mod export;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{
    IngestionError, OcrError, Result, SelectionError, StatementError, UpstreamError,
};
pub use extraction::{
    CompletionClient, Normalizer, OpenAiClient, PromptBuilder, ResponseParser,
};
pub use models::config::StatementConfig;
pub use models::document::{Document, PageSource, PageText};
pub use models::field::{FieldSelection, FieldSpec};
pub use models::record::{ExtractedRecord, FieldOutcome, FieldValue};
pub use ocr::{OcrFallback, PageRecognizer, TesseractOcr};
pub use pdf::{LoadedPdf, TextExtractor};
pub use pipeline::{
    DocumentIngestor, ExtractionRequest, ExtractionResult, IngestedDocument, PageSummary,
    StatementPipeline,
};
