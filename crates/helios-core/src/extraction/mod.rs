pub mod pdftotext;
pub mod table;
pub mod tabular;

use crate::error::HeliosError;
use std::path::Path;

/// Text extracted from a single page of a PDF.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub page_number: usize,
    pub lines: Vec<String>,
}

impl PageContent {
    /// True when the page yielded no non-blank text.
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}

/// Trait for PDF text extraction backends.
pub trait PdfExtractor: Send + Sync {
    /// Extract text content from the PDF at `path`, returning one PageContent per page.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, HeliosError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
