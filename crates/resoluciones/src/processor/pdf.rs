use std::path::Path;

use tracing::debug;

use crate::error::ExtractionError;
use crate::processor::TextExtractor;

/// Extracts embedded page text with lopdf. No OCR: a scanned page without a
/// text layer contributes an empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ExtractionError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes).map_err(|e| ExtractionError::PdfParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let text = extract_text_from_pdf(&doc);
        debug!(
            "Extracted {} characters from {}",
            text.chars().count(),
            path.display()
        );
        Ok(text)
    }
}

fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let pages = doc.get_pages();
    let total = pages.len();
    let mut text = String::new();

    // get_pages is keyed by page number, so iteration is in page order.
    for (page_num, _) in pages {
        let page_text = doc.extract_text(&[page_num]).unwrap_or_default();
        debug!(
            "Page {}/{}: {} characters",
            page_num,
            total,
            page_text.chars().count()
        );
        text.push_str(&page_text);
    }

    text.trim().to_string()
}
