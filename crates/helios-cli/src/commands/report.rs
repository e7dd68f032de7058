use helios_core::detection::config::load_config;
use helios_core::error::HeliosError;
use helios_core::extraction::pdftotext::PdftotextExtractor;
use helios_core::{
    build_report, process_batch, DetectionConfig, FileInput, NormalizeOptions, RecordFilter,
    YearMonth,
};
use std::path::PathBuf;

use crate::output;

pub struct ReportArgs {
    pub files: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub months: Vec<YearMonth>,
    pub categories: Vec<String>,
    pub default_month: Option<YearMonth>,
    pub output: String,
}

pub fn run(args: ReportArgs) -> Result<(), HeliosError> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => DetectionConfig::default(),
    };
    let options = NormalizeOptions {
        default_month: args.default_month,
    };
    let inputs: Vec<FileInput> = args.files.into_iter().map(FileInput::Path).collect();
    let extractor = PdftotextExtractor::new();

    let batch = process_batch(&inputs, &extractor, &config, &options);

    for table in batch.tables() {
        if !table.warnings.is_empty() {
            eprintln!(
                "{}: {} row(s) skipped",
                table.source,
                table.warnings.len()
            );
            for w in &table.warnings {
                eprintln!("  warning: row {}: {}", w.row_index + 1, w.reason);
            }
        }
    }
    for (source, e) in batch.failures() {
        eprintln!("Skipped {source}: {e}");
    }
    if batch.all_failed() {
        if let Some(first) = batch.outcomes.into_iter().find_map(|o| o.result.err()) {
            return Err(first);
        }
        return Ok(());
    }

    let filter = RecordFilter {
        months: (!args.months.is_empty()).then(|| args.months.into_iter().collect()),
        categories: (!args.categories.is_empty()).then(|| args.categories.into_iter().collect()),
    };
    let records = filter.apply(&batch.records());
    let report = build_report(&records)?;

    match args.output.as_str() {
        "json" => output::json::print(&report)?,
        _ => output::table::print_report(&report, records.len()),
    }

    Ok(())
}
