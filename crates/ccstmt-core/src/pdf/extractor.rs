//! Per-page text and image extraction using lopdf and pdf-extract.

use std::panic::{self, AssertUnwindSafe};

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::Result;
use crate::error::IngestionError;
use crate::models::config::PdfConfig;
use crate::models::document::{PageText, significant_chars};

/// A parsed PDF ready for text and image extraction.
pub struct LoadedPdf {
    document: Document,
    raw: Vec<u8>,
}

impl LoadedPdf {
    /// Parse PDF bytes. Documents protected by an empty password are decrypted.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut document =
            Document::load_mem(data).map_err(|e| IngestionError::Parse(e.to_string()))?;

        let raw = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(IngestionError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes.
            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| IngestionError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        if document.get_pages().is_empty() {
            return Err(IngestionError::NoPages);
        }

        debug!("Loaded PDF with {} pages", document.get_pages().len());
        Ok(Self { document, raw })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Raw (decrypted) PDF bytes.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Extract the text layer of one page with lopdf.
    pub fn page_text(&self, page: u32) -> Result<String> {
        if !self.document.get_pages().contains_key(&page) {
            return Err(IngestionError::InvalidPage(page));
        }
        Ok(self.document.extract_text(&[page]).unwrap_or_default())
    }

    /// Raster images drawn on a page, largest first.
    ///
    /// Scanned statements carry each page as one embedded image, so the
    /// largest image is the page itself.
    pub fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = &self.document;
        let page_id = *doc
            .get_pages()
            .get(&page)
            .ok_or(IngestionError::InvalidPage(page))?;

        let mut images = Vec::new();

        if let Some(resources) = page_resources(doc, page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = doc.dereference(obj_ref) {
                            if let Some(img) = decode_image_object(doc, obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }

        images.sort_by_key(|img| std::cmp::Reverse(u64::from(img.width()) * u64::from(img.height())));
        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }
}

/// Digital text extractor with the low-text threshold that triggers OCR.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    min_page_chars: usize,
    max_pages: usize,
}

impl TextExtractor {
    pub fn new(config: &PdfConfig) -> Self {
        Self {
            min_page_chars: config.min_page_chars,
            max_pages: config.max_pages,
        }
    }

    /// Override the low-text threshold.
    pub fn with_min_page_chars(mut self, min_page_chars: usize) -> Self {
        self.min_page_chars = min_page_chars;
        self
    }

    pub fn min_page_chars(&self) -> usize {
        self.min_page_chars
    }

    /// Extract the text layer of every page, in page order, as digital pages.
    pub fn extract_pages(&self, pdf: &LoadedPdf) -> Vec<PageText> {
        let mut page_count = pdf.page_count();
        if self.max_pages > 0 && page_count as usize > self.max_pages {
            debug!("Limiting extraction to {} of {} pages", self.max_pages, page_count);
            page_count = self.max_pages as u32;
        }

        let texts = match extract_with_pdf_extract(pdf.raw()) {
            Some(pages) if pages.len() == pdf.page_count() as usize => pages,
            Some(pages) => {
                debug!(
                    "pdf-extract returned {} pages for a {}-page document, using lopdf",
                    pages.len(),
                    pdf.page_count()
                );
                extract_with_lopdf(pdf)
            }
            None => extract_with_lopdf(pdf),
        };

        let pages: Vec<PageText> = texts
            .into_iter()
            .take(page_count as usize)
            .enumerate()
            .map(|(i, text)| PageText::digital(i as u32 + 1, text))
            .collect();

        debug!(
            "Digital text: {} pages, {} significant chars",
            pages.len(),
            pages.iter().map(|p| p.significant_chars()).sum::<usize>()
        );
        pages
    }

    /// Whether a page's digital text is too short to trust.
    pub fn is_low_confidence(&self, text: &str) -> bool {
        significant_chars(text) < self.min_page_chars
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(&PdfConfig::default())
    }
}

fn extract_with_pdf_extract(raw: &[u8]) -> Option<Vec<String>> {
    // pdf-extract panics on some malformed font programs.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(raw)
    }));

    match outcome {
        Ok(Ok(pages)) => Some(pages),
        Ok(Err(e)) => {
            debug!("pdf-extract failed: {}", e);
            None
        }
        Err(_) => {
            warn!("pdf-extract panicked, falling back to lopdf text extraction");
            None
        }
    }
}

fn extract_with_lopdf(pdf: &LoadedPdf) -> Vec<String> {
    (1..=pdf.page_count())
        .map(|page| pdf.page_text(page).unwrap_or_default())
        .collect()
}

/// Get the resources dictionary of a page, following inheritance.
fn page_resources(doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
    let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
        return None;
    };

    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
            return Some(res_dict.clone());
        }
    }

    match dict.get(b"Parent") {
        Ok(Object::Reference(parent_id)) => page_resources(doc, *parent_id),
        _ => None,
    }
}

fn decode_image_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                    .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter {:?}", filter_name.map(String::from_utf8_lossy));
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    image_from_raw(&data, width, height, color_space)
}

fn image_from_raw(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize) * (height as usize);
    let channels = match color_space {
        b"DeviceRGB" | b"RGB" => 3,
        b"DeviceGray" | b"G" => 1,
        _ => return None,
    };

    if data.len() < pixels * channels {
        trace!("Image data too short: {} < {}", data.len(), pixels * channels);
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in data[..pixels * channels].chunks_exact(channels) {
        match px {
            [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
            [gray] => rgba.extend_from_slice(&[*gray, *gray, *gray, 255]),
            _ => return None,
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}
