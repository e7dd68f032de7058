use helios_core::error::HeliosError;
use helios_core::extraction::pdftotext::PdftotextExtractor;
use helios_core::loader::{extract_pdf, FileInput};
use std::path::PathBuf;

use crate::output;

pub fn run(pdf_file: PathBuf, output_format: &str) -> Result<(), HeliosError> {
    let extractor = PdftotextExtractor::new();
    let invoice = extract_pdf(&FileInput::Path(pdf_file), &extractor)?;

    match output_format {
        "json" => output::json::print(&invoice)?,
        _ => output::table::print_invoice(&invoice),
    }

    for w in &invoice.warnings {
        eprintln!("  warning: page {}: {}", w.page_number, w.reason);
    }
    Ok(())
}
