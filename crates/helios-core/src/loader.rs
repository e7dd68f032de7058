use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::HeliosError;
use crate::extraction::table::{extract_invoice, ExtractedInvoice};
use crate::extraction::tabular::{read_csv, read_workbook};
use crate::extraction::{PageContent, PdfExtractor};
use crate::model::{LoadedData, SourceFormat};

/// A file to load, either on disk or already in memory.
#[derive(Debug, Clone)]
pub enum FileInput {
    Path(PathBuf),
    /// In-memory content with its declared name; the name's extension
    /// selects the reader.
    Bytes { name: String, bytes: Vec<u8> },
}

impl FileInput {
    /// Declared name used for format detection and diagnostics.
    pub fn name(&self) -> String {
        match self {
            FileInput::Path(path) => path.display().to_string(),
            FileInput::Bytes { name, .. } => name.clone(),
        }
    }

    fn format(&self) -> Result<SourceFormat, HeliosError> {
        let name = self.name();
        SourceFormat::from_name(&name).ok_or(HeliosError::UnsupportedFormat { name })
    }

    /// File content; in-memory input is borrowed, not copied.
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, HeliosError> {
        match self {
            FileInput::Path(path) => Ok(Cow::Owned(std::fs::read(path)?)),
            FileInput::Bytes { bytes, .. } => Ok(Cow::Borrowed(bytes)),
        }
    }
}

impl From<PathBuf> for FileInput {
    fn from(path: PathBuf) -> Self {
        FileInput::Path(path)
    }
}

/// Load one file into a raw table, dispatching on its extension.
///
/// PDFs go through `extractor`; CSV and Excel files are read directly.
pub fn load(input: &FileInput, extractor: &dyn PdfExtractor) -> Result<LoadedData, HeliosError> {
    let format = input.format()?;
    let name = input.name();
    log::debug!("loading {name} as {format}");

    match format {
        SourceFormat::Pdf => Ok(extract_pdf(input, extractor)?.into_loaded_data(name)),
        SourceFormat::Csv => read_csv(&name, &input.read_bytes()?),
        SourceFormat::Xlsx | SourceFormat::Xls => {
            read_workbook(&name, format, &input.read_bytes()?)
        }
    }
}

/// Run PDF table extraction on one input, keeping the per-page detail.
///
/// In-memory PDFs are spilled to a temporary file for the extractor; the
/// file is removed before this returns, whatever the outcome.
pub fn extract_pdf(
    input: &FileInput,
    extractor: &dyn PdfExtractor,
) -> Result<ExtractedInvoice, HeliosError> {
    let format = input.format()?;
    if format != SourceFormat::Pdf {
        return Err(HeliosError::UnsupportedFormat { name: input.name() });
    }

    let pages = match input {
        FileInput::Path(path) => extract_with(extractor, path)?,
        FileInput::Bytes { bytes, .. } => {
            let mut tmp = tempfile::Builder::new()
                .prefix("helios-")
                .suffix(".pdf")
                .tempfile()?;
            tmp.write_all(bytes)?;
            tmp.flush()?;
            extract_with(extractor, tmp.path())?
        }
    };

    Ok(extract_invoice(&pages))
}

fn extract_with(
    extractor: &dyn PdfExtractor,
    path: &Path,
) -> Result<Vec<PageContent>, HeliosError> {
    log::debug!(
        "extracting {} with {}",
        path.display(),
        extractor.backend_name()
    );
    extractor.extract_pages(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPdf;

    impl PdfExtractor for NoPdf {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<PageContent>, HeliosError> {
            Err(HeliosError::Extraction("not expected".into()))
        }

        fn backend_name(&self) -> &str {
            "none"
        }
    }

    fn bytes(name: &str, content: &[u8]) -> FileInput {
        FileInput::Bytes {
            name: name.into(),
            bytes: content.to_vec(),
        }
    }

    #[test]
    fn test_in_memory_content_is_borrowed() {
        let input = bytes("ventes.csv", b"Date,Montant\n2024-01-05,10\n");
        let FileInput::Bytes { bytes: held, .. } = &input else {
            unreachable!()
        };
        let content = input.read_bytes().unwrap();
        assert!(matches!(content, Cow::Borrowed(_)));
        assert_eq!(content.as_ptr(), held.as_ptr());
    }

    #[test]
    fn test_path_content_is_read_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"Date,Montant\n2024-01-05,10\n").unwrap();
        let input = FileInput::Path(file.path().to_path_buf());
        assert_eq!(&*input.read_bytes().unwrap(), b"Date,Montant\n2024-01-05,10\n");
        assert_eq!(load(&input, &NoPdf).unwrap().len(), 1);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load(&bytes("notes.txt", b"hello"), &NoPdf).unwrap_err();
        match err {
            HeliosError::UnsupportedFormat { name } => assert_eq!(name, "notes.txt"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let data = load(&bytes("EXPORT.CSV", b"Date,Montant\n2024-01-05,3\n"), &NoPdf).unwrap();
        assert_eq!(data.format(), SourceFormat::Csv);
        assert_eq!(data.source(), "EXPORT.CSV");
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_csv_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ventes.csv");
        std::fs::write(&path, "Date;Montant\n05/01/2024;12,50\n").unwrap();
        let data = load(&FileInput::Path(path), &NoPdf).unwrap();
        assert_eq!(data.column_names(), ["Date", "Montant"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load(&FileInput::Path("/nonexistent/ventes.csv".into()), &NoPdf).unwrap_err();
        assert!(matches!(err, HeliosError::Io(_)));
    }

    #[test]
    fn test_extract_pdf_rejects_other_formats() {
        let err = extract_pdf(&bytes("ventes.csv", b"a,b\n"), &NoPdf).unwrap_err();
        assert!(matches!(err, HeliosError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_extractor_errors_propagate() {
        let err = load(&bytes("facture.pdf", b"%PDF-1.4"), &NoPdf).unwrap_err();
        assert!(matches!(err, HeliosError::Extraction(_)));
    }
}
