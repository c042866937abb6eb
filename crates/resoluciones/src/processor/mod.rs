pub mod pdf;

use std::path::Path;

use crate::error::ExtractionError;

pub use pdf::PdfTextExtractor;

/// Source of full document text for the reconciler's backfill phase.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError>;
}

impl<F> TextExtractor for F
where
    F: Fn(&Path) -> Result<String, ExtractionError> + Send + Sync,
{
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        self(path)
    }
}
