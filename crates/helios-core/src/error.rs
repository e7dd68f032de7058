use std::path::PathBuf;

use crate::model::CanonicalField;

#[derive(Debug, thiserror::Error)]
pub enum HeliosError {
    #[error("unsupported file format: '{name}'. Accepted extensions: .pdf, .csv, .xlsx, .xls")]
    UnsupportedFormat { name: String },

    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("pdftotext failed with exit code {code}: {stderr}")]
    PdftotextFailed { code: i32, stderr: String },

    #[error("failed to parse '{source_name}': {reason}")]
    ParseError { source_name: String, reason: String },

    #[error(
        "could not detect {} column(s) in '{}' (columns: {})",
        join_fields(.missing),
        .source_name,
        .columns.join(", ")
    )]
    ColumnDetection {
        source_name: String,
        columns: Vec<String>,
        missing: Vec<CanonicalField>,
    },

    #[error(
        "ambiguous {} column in '{}': candidates {}",
        .field,
        .source_name,
        .candidates.join(", ")
    )]
    AmbiguousColumns {
        source_name: String,
        field: CanonicalField,
        candidates: Vec<String>,
    },

    #[error("failed to load detection config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid detection config: {0}")]
    ConfigInvalid(String),

    #[error("invalid month '{0}' (expected YYYY-MM)")]
    InvalidMonth(String),

    #[error("amount overflow while {0}")]
    AmountOverflow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl HeliosError {
    /// Name of the file this error is attributable to, when it has one.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            HeliosError::UnsupportedFormat { name } => Some(name),
            HeliosError::ParseError { source_name, .. }
            | HeliosError::ColumnDetection { source_name, .. }
            | HeliosError::AmbiguousColumns { source_name, .. } => Some(source_name),
            _ => None,
        }
    }
}
