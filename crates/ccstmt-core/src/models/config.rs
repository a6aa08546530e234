//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::record::DEFAULT_DATE_FORMAT;

/// Main configuration for the ccstmt pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    /// PDF ingestion configuration.
    pub pdf: PdfConfig,

    /// OCR fallback configuration.
    pub ocr: OcrConfig,

    /// Completion endpoint configuration.
    pub llm: LlmConfig,

    /// Value normalization configuration.
    pub normalize: NormalizeConfig,
}

/// PDF ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Pages with fewer non-whitespace characters than this are sent to OCR.
    pub min_page_chars: usize,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_page_chars: 40,
            max_pages: 0,
        }
    }
}

/// Which recognizer handles low-text pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackendKind {
    /// `pdftoppm` + `tesseract` command line tools.
    Tesseract,
    /// PaddleOCR ONNX models through `pure-onnx-ocr`.
    Onnx,
    /// Never run OCR.
    Disabled,
}

/// OCR fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Recognizer backend.
    pub backend: OcrBackendKind,

    /// DPI for rendering pages.
    pub render_dpi: u32,

    /// Tesseract language code.
    pub language: String,

    /// Upper bound for rendering plus recognition of one page, in seconds.
    pub timeout_secs: u64,

    /// Directory with det.onnx, latin_rec.onnx and latin_dict.txt for the ONNX backend.
    pub model_dir: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackendKind::Tesseract,
            render_dpi: 300,
            language: "eng".to_string(),
            timeout_secs: 120,
            model_dir: PathBuf::from("models"),
        }
    }
}

/// Completion endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum completion tokens.
    pub max_tokens: u32,

    /// Overall request timeout in seconds.
    pub timeout_secs: u64,

    /// Document text beyond this many characters is not sent.
    pub max_document_chars: usize,

    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.0,
            max_tokens: 1500,
            timeout_secs: 60,
            max_document_chars: 7000,
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

/// Value normalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// chrono format string for rendering dates.
    pub date_format: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl StatementConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: StatementConfig =
            serde_json::from_str(r#"{ "llm": { "model": "llama-3.3-70b-versatile" }, "ocr": { "backend": "disabled" } }"#)
                .unwrap();

        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.llm.max_tokens, 1500);
        assert_eq!(config.ocr.backend, OcrBackendKind::Disabled);
        assert_eq!(config.pdf.min_page_chars, 40);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = StatementConfig::default();
        config.normalize.date_format = "%Y-%m-%d".to_string();
        config.save(&path).unwrap();

        let loaded = StatementConfig::from_file(&path).unwrap();
        assert_eq!(loaded.normalize.date_format, "%Y-%m-%d");
        assert_eq!(loaded.ocr.render_dpi, 300);
    }
}
