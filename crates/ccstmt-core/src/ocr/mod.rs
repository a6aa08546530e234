//! OCR fallback for pages whose text layer is missing or too short.

#[cfg(feature = "native")]
mod pure_engine;
mod tesseract;

#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;
pub use tesseract::TesseractOcr;

use tracing::{debug, info, warn};

use crate::error::OcrError;
use crate::models::config::{OcrBackendKind, OcrConfig};
use crate::models::document::{PageSource, PageText};
use crate::pdf::{LoadedPdf, TextExtractor};

/// Something that can turn one PDF page into text.
pub trait PageRecognizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Rasterize `page` (1-indexed) and recognize its text.
    fn recognize_page(&self, pdf: &LoadedPdf, page: u32) -> Result<String, OcrError>;
}

/// Outcome of running the fallback over a document's pages.
#[derive(Debug, Clone)]
pub struct FallbackOutput {
    /// Pages in index order, each either digital or OCR sourced.
    pub pages: Vec<PageText>,
    /// Pages where OCR was needed but produced nothing usable.
    pub warnings: Vec<String>,
}

/// Replaces low-text digital pages with OCR output.
pub struct OcrFallback {
    recognizer: Option<Box<dyn PageRecognizer>>,
}

impl OcrFallback {
    pub fn new(recognizer: Box<dyn PageRecognizer>) -> Self {
        Self {
            recognizer: Some(recognizer),
        }
    }

    /// A fallback that keeps every page's digital text.
    pub fn disabled() -> Self {
        Self { recognizer: None }
    }

    /// Build the recognizer selected in the configuration.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        match config.backend {
            OcrBackendKind::Tesseract => Ok(Self::new(Box::new(TesseractOcr::new(config)))),
            #[cfg(feature = "native")]
            OcrBackendKind::Onnx => Ok(Self::new(Box::new(PureOcrEngine::from_dir(
                &config.model_dir,
            )?))),
            #[cfg(not(feature = "native"))]
            OcrBackendKind::Onnx => Err(OcrError::ModelLoad(
                "ONNX backend requires the `native` feature".to_string(),
            )),
            OcrBackendKind::Disabled => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Run OCR on every page the extractor flags as low confidence.
    ///
    /// Page indices are preserved. A page whose OCR fails or comes back empty
    /// contributes an empty string and a warning instead of an error.
    pub fn apply(
        &self,
        pdf: &LoadedPdf,
        extractor: &TextExtractor,
        pages: Vec<PageText>,
    ) -> FallbackOutput {
        let mut warnings = Vec::new();

        let Some(recognizer) = self.recognizer.as_deref() else {
            return FallbackOutput { pages, warnings };
        };

        let pages = pages
            .into_iter()
            .map(|page| {
                if !extractor.is_low_confidence(&page.text) {
                    return page;
                }

                debug!(
                    "Page {} has {} significant chars, running {} OCR",
                    page.index,
                    page.significant_chars(),
                    recognizer.name()
                );

                match recognizer.recognize_page(pdf, page.index) {
                    Ok(text) if !text.trim().is_empty() => PageText::ocr(page.index, text),
                    Ok(_) => {
                        warnings.push(format!("page {}: OCR found no text", page.index));
                        PageText::ocr(page.index, String::new())
                    }
                    Err(e) => {
                        warn!("OCR failed for page {}: {}", page.index, e);
                        warnings.push(format!("page {}: OCR failed: {}", page.index, e));
                        PageText::ocr(page.index, String::new())
                    }
                }
            })
            .collect::<Vec<_>>();

        let ocr_pages = pages.iter().filter(|p| p.source == PageSource::Ocr).count();
        if ocr_pages > 0 {
            info!("OCR fallback used for {} of {} pages", ocr_pages, pages.len());
        }

        FallbackOutput { pages, warnings }
    }
}
