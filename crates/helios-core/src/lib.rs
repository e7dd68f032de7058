pub mod aggregate;
pub mod detection;
pub mod error;
pub mod extraction;
pub mod loader;
pub mod model;

pub use aggregate::{build_report, RecordFilter, SalesReport};
pub use detection::config::DetectionConfig;
pub use detection::{normalize, NormalizeOptions};
pub use error::HeliosError;
pub use extraction::PdfExtractor;
pub use loader::FileInput;
pub use model::{CanonicalRecord, NormalizedTable, YearMonth};

/// Load and normalize one file.
pub fn process_file(
    input: &FileInput,
    extractor: &dyn PdfExtractor,
    config: &DetectionConfig,
    options: &NormalizeOptions,
) -> Result<NormalizedTable, HeliosError> {
    let data = loader::load(input, extractor)?;
    normalize(&data, config, options)
}

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub source: String,
    pub result: Result<NormalizedTable, HeliosError>,
}

/// Per-file results of a batch run, in input order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchResult {
    /// Records of every successful file, concatenated in input order.
    pub fn records(&self) -> Vec<CanonicalRecord> {
        self.tables()
            .flat_map(|t| t.records.iter().cloned())
            .collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &NormalizedTable> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> Vec<(&str, &HeliosError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.source.as_str(), e)))
            .collect()
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.result.is_err())
    }
}

/// Process files independently; one file's failure never stops the rest.
pub fn process_batch(
    inputs: &[FileInput],
    extractor: &dyn PdfExtractor,
    config: &DetectionConfig,
    options: &NormalizeOptions,
) -> BatchResult {
    let outcomes = inputs
        .iter()
        .map(|input| {
            let source = input.name();
            let result = process_file(input, extractor, config, options);
            match &result {
                Ok(table) => log::info!(
                    "{}: {} record(s), {} dropped",
                    source,
                    table.records.len(),
                    table.warnings.len()
                ),
                Err(e) => log::warn!("{source}: {e}"),
            }
            FileOutcome { source, result }
        })
        .collect();
    BatchResult { outcomes }
}
