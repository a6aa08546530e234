//! End-to-end extraction: ingestion, OCR fallback, prompt, completion, parsing, normalization.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extraction::{CompletionClient, Normalizer, PromptBuilder, ResponseParser};
use crate::models::config::{PdfConfig, StatementConfig};
use crate::models::document::{Document, PageSource};
use crate::models::field::FieldSelection;
use crate::models::record::ExtractedRecord;
use crate::ocr::OcrFallback;
use crate::pdf::{LoadedPdf, TextExtractor};

/// One statement and the fields wanted from it.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    bytes: Vec<u8>,
    fields: FieldSelection,
}

impl ExtractionRequest {
    pub fn new(bytes: impl Into<Vec<u8>>, fields: FieldSelection) -> Self {
        Self {
            bytes: bytes.into(),
            fields,
        }
    }

    /// Build a request from field identifiers. The selection is validated
    /// before anything else looks at the bytes.
    pub fn from_ids<S: AsRef<str>>(bytes: impl Into<Vec<u8>>, ids: &[S]) -> Result<Self> {
        let fields = FieldSelection::parse(ids)?;
        Ok(Self::new(bytes, fields))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn fields(&self) -> &FieldSelection {
        &self.fields
    }
}

/// Where one page's text came from and how much of it there was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub index: u32,
    pub source: PageSource,
    pub chars: usize,
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Normalized values for exactly the requested fields.
    pub record: ExtractedRecord,
    /// Unmodified model output.
    pub raw_response: String,
    /// Per-page provenance.
    pub pages: Vec<PageSummary>,
    /// Non-fatal problems: degraded OCR pages, unstructured model output.
    pub warnings: Vec<String>,
    /// The model answered without a JSON object or any labelled line.
    pub unstructured: bool,
    pub processing_time_ms: u64,
}

impl ExtractionResult {
    pub fn ocr_page_count(&self) -> usize {
        self.pages.iter().filter(|p| p.source == PageSource::Ocr).count()
    }
}

/// A document after ingestion, with any OCR warnings.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub document: Document,
    pub warnings: Vec<String>,
}

impl IngestedDocument {
    pub fn page_summaries(&self) -> Vec<PageSummary> {
        self.document
            .pages()
            .iter()
            .map(|p| PageSummary {
                index: p.index,
                source: p.source,
                chars: p.significant_chars(),
            })
            .collect()
    }
}

/// PDF loading, digital text extraction and the per-page OCR decision.
pub struct DocumentIngestor {
    extractor: TextExtractor,
    ocr: OcrFallback,
}

impl DocumentIngestor {
    pub fn new(config: &PdfConfig, ocr: OcrFallback) -> Self {
        Self {
            extractor: TextExtractor::new(config),
            ocr,
        }
    }

    pub fn ingest(&self, bytes: &[u8]) -> Result<IngestedDocument> {
        let pdf = LoadedPdf::load(bytes)?;
        let pages = self.extractor.extract_pages(&pdf);

        let low = pages
            .iter()
            .filter(|p| self.extractor.is_low_confidence(&p.text))
            .count();
        debug!(
            "{} of {} pages below {} chars",
            low,
            pages.len(),
            self.extractor.min_page_chars()
        );

        let output = self.ocr.apply(&pdf, &self.extractor, pages);
        let document = Document::new(pdf.raw().to_vec(), output.pages);

        Ok(IngestedDocument {
            document,
            warnings: output.warnings,
        })
    }
}

/// The extraction pipeline for a single statement at a time.
///
/// Holds no per-request state, so one pipeline can serve many requests.
pub struct StatementPipeline<C: CompletionClient> {
    ingestor: DocumentIngestor,
    prompt: PromptBuilder,
    client: C,
    parser: ResponseParser,
    normalizer: Normalizer,
}

impl<C: CompletionClient> StatementPipeline<C> {
    pub fn new(config: &StatementConfig, client: C, ocr: OcrFallback) -> Self {
        Self {
            ingestor: DocumentIngestor::new(&config.pdf, ocr),
            prompt: PromptBuilder::new(config.llm.max_document_chars),
            client,
            parser: ResponseParser::new(),
            normalizer: Normalizer::new(&config.normalize),
        }
    }

    pub fn ingestor(&self) -> &DocumentIngestor {
        &self.ingestor
    }

    /// Ingest and build the prompt without calling the model.
    pub fn prompt_for(&self, request: &ExtractionRequest) -> Result<String> {
        let ingested = self.ingestor.ingest(request.bytes())?;
        Ok(self.prompt.build(&ingested.document.text(), request.fields()))
    }

    pub fn run(&self, request: &ExtractionRequest) -> Result<ExtractionResult> {
        let start = Instant::now();
        let ingested = self.ingestor.ingest(request.bytes())?;
        self.extract_from(ingested, request.fields(), start)
    }

    /// Run the model stages on a document that was ingested separately.
    pub fn extract(&self, ingested: IngestedDocument, fields: &FieldSelection) -> Result<ExtractionResult> {
        self.extract_from(ingested, fields, Instant::now())
    }

    fn extract_from(
        &self,
        ingested: IngestedDocument,
        fields: &FieldSelection,
        start: Instant,
    ) -> Result<ExtractionResult> {
        let pages = ingested.page_summaries();
        let mut warnings = ingested.warnings;

        if pages.iter().all(|p| p.chars == 0) {
            warn!("No text could be extracted from the document");
            warnings.push("no text could be extracted from the document; model not called".to_string());
            return Ok(ExtractionResult {
                record: ExtractedRecord::new(fields)
                    .with_date_format(self.normalizer.date_format()),
                raw_response: String::new(),
                pages,
                warnings,
                unstructured: false,
                processing_time_ms: start.elapsed().as_millis() as u64,
            });
        }

        let prompt = self.prompt.build(&ingested.document.text(), fields);
        debug!("Prompt: {} chars for {} fields", prompt.chars().count(), fields.len());

        let raw_response = self.client.complete(&prompt)?;
        let parsed = self.parser.parse(&raw_response, fields);
        if parsed.unstructured {
            warn!("Model returned unstructured output");
            warnings.push("model returned unstructured output; raw response retained".to_string());
        }

        let record = self.normalizer.normalize_all(fields, &parsed);
        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "Extracted {} of {} fields in {}ms",
            record.found_count(),
            record.len(),
            processing_time_ms
        );

        Ok(ExtractionResult {
            record,
            raw_response,
            pages,
            warnings,
            unstructured: parsed.unstructured,
            processing_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IngestionError, StatementError, UpstreamError};
    use crate::models::field::FieldSpec;
    use crate::ocr::tests::ScriptedRecognizer;
    use crate::testing::{blank_pdf, text_pdf};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    /// Answers every prompt with a fixed response and remembers the prompts.
    struct MockClient {
        answer: std::result::Result<String, fn() -> StatementError>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockClient {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(answer.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: fn() -> StatementError) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(error),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl CompletionClient for MockClient {
        fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.answer {
                Ok(answer) => Ok(answer.clone()),
                Err(error) => Err(error()),
            }
        }
    }

    fn hdfc_statement() -> Vec<u8> {
        text_pdf(&[&[
            "HDFC Bank Credit Card Statement",
            "Name: Mr. Rupal Patel",
            "Statement Date: 15/10/2024  Payment Due Date: 05/11/2024",
            "Total Amount Due: Rs. 13,429.57",
        ]])
    }

    fn pipeline(client: Arc<MockClient>, ocr: OcrFallback) -> StatementPipeline<Arc<MockClient>> {
        StatementPipeline::new(&StatementConfig::default(), client, ocr)
    }

    #[test]
    fn test_end_to_end_digital_statement() {
        let client = MockClient::answering(
            r#"{"issuer": "HDFC Bank", "customer_name": "Mr. Rupal Patel", "total_amount_due": "₹13,429.57"}"#,
        );
        let recognizer = Arc::new(ScriptedRecognizer::new(|_| Ok("unused".into())));
        let pipeline = pipeline(client.clone(), OcrFallback::new(Box::new(recognizer.clone())));

        let request = ExtractionRequest::from_ids(
            hdfc_statement(),
            &["issuer", "customer_name", "total_amount_due"],
        )
        .unwrap();
        let result = pipeline.run(&request).unwrap();

        assert_eq!(
            crate::export::to_json(&result.record).unwrap(),
            serde_json::json!({
                "issuer": "HDFC Bank",
                "customer_name": "Mr. Rupal Patel",
                "total_amount_due": "13429.57",
            })
        );
        assert!(recognizer.calls.lock().unwrap().is_empty());
        assert_eq!(result.ocr_page_count(), 0);
        assert!(result.warnings.is_empty());
        assert!(!result.unstructured);
        assert_eq!(client.calls(), 1);

        let prompt = &client.prompts.lock().unwrap()[0];
        assert!(prompt.contains("--- Page 1 ---"));
        assert!(prompt.contains("Mr. Rupal Patel"));
        assert!(!prompt.contains("- due_date:"));
    }

    #[test]
    fn test_corrupt_input_never_reaches_upstream() {
        let client = MockClient::answering("{}");
        let pipeline = pipeline(client.clone(), OcrFallback::disabled());

        let request =
            ExtractionRequest::new(b"%PDF-1.4 garbage".to_vec(), FieldSelection::all());
        let err = pipeline.run(&request).unwrap_err();

        assert!(matches!(err, StatementError::Ingestion(IngestionError::Parse(_))));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn test_empty_selection_is_rejected_first() {
        let empty: [&str; 0] = [];
        let err = ExtractionRequest::from_ids(b"not even a pdf".to_vec(), &empty).unwrap_err();
        assert!(matches!(err, StatementError::InvalidSelection(_)));
    }

    #[test]
    fn test_scanned_statement_uses_ocr_pages_in_order() {
        let client = MockClient::answering(r#"{"card_last4": "XXXX XXXX XXXX 4821", "due_date": "05/11/2024"}"#);
        let recognizer = Arc::new(ScriptedRecognizer::new(|page| {
            Ok(format!("scanned text of page {}", page))
        }));
        let pipeline = pipeline(client.clone(), OcrFallback::new(Box::new(recognizer.clone())));

        let request = ExtractionRequest::new(
            blank_pdf(3),
            FieldSelection::new([FieldSpec::CardLast4, FieldSpec::DueDate]).unwrap(),
        );
        let result = pipeline.run(&request).unwrap();

        assert_eq!(*recognizer.calls.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(result.ocr_page_count(), 3);
        assert_eq!(
            result.pages.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let prompt = &client.prompts.lock().unwrap()[0];
        let first = prompt.find("scanned text of page 1").unwrap();
        let second = prompt.find("scanned text of page 2").unwrap();
        let third = prompt.find("scanned text of page 3").unwrap();
        assert!(first < second && second < third);

        assert_eq!(
            result.record.rendered(FieldSpec::CardLast4),
            Some(Some("4821".to_string()))
        );
        assert_eq!(
            result.record.rendered(FieldSpec::DueDate),
            Some(Some("05-11-2024".to_string()))
        );
    }

    #[test]
    fn test_three_of_five_fields_found() {
        let client = MockClient::answering(
            "Issuer: HDFC Bank\nCustomer Name: Mr. Rupal Patel\nTotal Amount Due: Rs. 13,429.57\nDue Date: NOT_FOUND",
        );
        let pipeline = pipeline(client, OcrFallback::disabled());

        let request = ExtractionRequest::from_ids(
            hdfc_statement(),
            &["issuer", "customer_name", "total_amount_due", "due_date", "card_last4"],
        )
        .unwrap();
        let result = pipeline.run(&request).unwrap();

        assert_eq!(result.record.len(), 5);
        assert_eq!(result.record.found_count(), 3);
        assert_eq!(result.record.rendered(FieldSpec::DueDate), Some(None));
        assert_eq!(result.record.rendered(FieldSpec::CardLast4), Some(None));
        assert_eq!(result.record.rendered(FieldSpec::BillingCycleTo), None);
    }

    #[test]
    fn test_unstructured_response_is_flagged() {
        let client = MockClient::answering("Sorry, I cannot help with that.");
        let pipeline = pipeline(client, OcrFallback::disabled());

        let request = ExtractionRequest::new(hdfc_statement(), FieldSelection::all());
        let result = pipeline.run(&request).unwrap();

        assert_eq!(result.record.found_count(), 0);
        assert_eq!(result.raw_response, "Sorry, I cannot help with that.");
        assert!(result.unstructured);
        assert!(result.warnings.iter().any(|w| w.contains("unstructured")));
    }

    #[test]
    fn test_upstream_errors_propagate() {
        let client = MockClient::failing(|| UpstreamError::RateLimited.into());
        let pipeline = pipeline(client, OcrFallback::disabled());

        let request = ExtractionRequest::new(hdfc_statement(), FieldSelection::all());
        let err = pipeline.run(&request).unwrap_err();
        assert!(matches!(err, StatementError::Upstream(UpstreamError::RateLimited)));
    }

    #[test]
    fn test_textless_document_skips_model() {
        let client = MockClient::answering("{}");
        let pipeline = pipeline(client.clone(), OcrFallback::disabled());

        let request = ExtractionRequest::new(blank_pdf(2), FieldSelection::all());
        let result = pipeline.run(&request).unwrap();

        assert_eq!(client.calls(), 0);
        assert_eq!(result.record.len(), FieldSpec::ALL.len());
        assert_eq!(result.record.found_count(), 0);
        assert_eq!(result.pages.len(), 2);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_prompt_for_dry_run() {
        let client = MockClient::answering("{}");
        let pipeline = pipeline(client.clone(), OcrFallback::disabled());

        let request = ExtractionRequest::from_ids(hdfc_statement(), &["issuer"]).unwrap();
        let prompt = pipeline.prompt_for(&request).unwrap();

        assert!(prompt.contains("HDFC Bank Credit Card Statement"));
        assert_eq!(client.calls(), 0);
    }
}
