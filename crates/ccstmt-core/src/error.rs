//! Error types for the ccstmt-core library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the ccstmt library.
#[derive(Error, Debug)]
pub enum StatementError {
    /// The requested field selection was rejected.
    #[error("invalid field selection: {0}")]
    InvalidSelection(#[from] SelectionError),

    /// The document could not be ingested.
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// The completion endpoint failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// The completion endpoint did not answer within the configured bound.
    #[error("no response from completion endpoint within {waited:?}")]
    Timeout { waited: Duration },

    /// Record export failed.
    #[error("export error: {0}")]
    Export(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to field selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// No fields were requested.
    #[error("no fields selected")]
    Empty,

    /// An identifier outside the supported field set.
    #[error("unrecognized field identifier: {0:?}")]
    UnknownField(String),
}

/// Errors related to PDF ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// Failed to open/parse the PDF.
    #[error("not a readable PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// An external OCR tool is missing.
    #[error("OCR tool not available: {0}")]
    ToolUnavailable(String),

    /// Page rasterization failed.
    #[error("failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// OCR did not finish within the configured bound.
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors returned by the completion endpoint.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Transport(String),

    /// The credential was rejected.
    #[error("authentication failed (HTTP {0})")]
    Unauthorized(u16),

    /// The endpoint is throttling requests.
    #[error("rate limited")]
    RateLimited,

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body did not contain a completion.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for the ccstmt library.
pub type Result<T> = std::result::Result<T, StatementError>;
