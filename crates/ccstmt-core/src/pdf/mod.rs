//! PDF ingestion: loading, per-page digital text and page images.

mod extractor;

pub use extractor::{LoadedPdf, TextExtractor};

use crate::error::IngestionError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
