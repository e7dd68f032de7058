pub mod columns;
pub mod config;
pub mod values;

use std::collections::BTreeMap;

use crate::error::HeliosError;
use crate::model::{
    CanonicalField, CanonicalRecord, ColumnMapping, LoadedData, NormalizedTable, RawRecord,
    RowWarning, YearMonth,
};
use columns::detect_columns;
use config::DetectionConfig;
use values::{cell_amount, cell_month};

/// Caller-supplied knobs for one normalization run.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Month assigned to every record when no month column can be resolved,
    /// e.g. for a monthly invoice PDF that carries no per-line date.
    pub default_month: Option<YearMonth>,
}

/// Map a raw table onto `month, category, amount` plus passthrough columns.
///
/// Fails with `ColumnDetection` naming every load-bearing field (month,
/// amount) that could not be resolved. Rows whose month or amount does not
/// coerce are dropped and reported in `warnings`. Row order is preserved.
pub fn normalize(
    data: &LoadedData,
    config: &DetectionConfig,
    options: &NormalizeOptions,
) -> Result<NormalizedTable, HeliosError> {
    if data.is_empty() {
        log::info!("{} has no rows, nothing to normalize", data.source());
        return Ok(NormalizedTable {
            source: data.source().to_string(),
            format: data.format(),
            mapping: None,
            extra_columns: Vec::new(),
            records: Vec::new(),
            warnings: Vec::new(),
        });
    }

    let detected = detect_columns(data, config)?;

    let mut missing = Vec::new();
    if detected.month.is_none() && options.default_month.is_none() {
        missing.push(CanonicalField::Month);
    }
    let Some(amount) = detected.amount else {
        missing.push(CanonicalField::Amount);
        return Err(detection_error(data, missing));
    };
    if !missing.is_empty() {
        return Err(detection_error(data, missing));
    }

    let mapping = ColumnMapping {
        month: detected.month.map(|m| m.column),
        category: detected.category.map(|m| m.column),
        amount: amount.column,
    };
    if mapping.category.is_none() {
        log::info!(
            "no category column in {}, using '{}'",
            data.source(),
            config.uncategorized_label
        );
    }

    let mapped = [
        mapping.month.as_deref(),
        mapping.category.as_deref(),
        Some(mapping.amount.as_str()),
    ];
    let extra_columns: Vec<String> = data
        .column_names()
        .iter()
        .filter(|c| !mapped.contains(&Some(c.as_str())))
        .cloned()
        .collect();

    let mut records = Vec::with_capacity(data.len());
    let mut warnings = Vec::new();
    for (row_index, row) in data.rows().iter().enumerate() {
        match normalize_row(row, &mapping, &extra_columns, config, options) {
            Ok(record) => records.push(record),
            Err(reason) => {
                log::warn!("{}: dropped row {}: {}", data.source(), row_index, reason);
                warnings.push(RowWarning { row_index, reason });
            }
        }
    }

    log::debug!(
        "normalized {} of {} row(s) from {}",
        records.len(),
        data.len(),
        data.source()
    );

    Ok(NormalizedTable {
        source: data.source().to_string(),
        format: data.format(),
        mapping: Some(mapping),
        extra_columns,
        records,
        warnings,
    })
}

fn normalize_row(
    row: &RawRecord,
    mapping: &ColumnMapping,
    extra_columns: &[String],
    config: &DetectionConfig,
    options: &NormalizeOptions,
) -> Result<CanonicalRecord, String> {
    let raw_amount = row.get(&mapping.amount);
    let amount = cell_amount(raw_amount).ok_or_else(|| {
        format!(
            "amount '{}' in column '{}' is not a number",
            raw_amount, mapping.amount
        )
    })?;

    let month = match (&mapping.month, options.default_month) {
        (Some(column), _) => {
            let raw_month = row.get(column);
            cell_month(raw_month, config).ok_or_else(|| {
                format!("date '{raw_month}' in column '{column}' is not a recognized date")
            })?
        }
        (None, Some(default)) => default,
        (None, None) => return Err("no month column".into()),
    };

    let category = mapping
        .category
        .as_ref()
        .map(|c| row.get(c).to_string().trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| config.uncategorized_label.clone());

    let extra: BTreeMap<String, String> = extra_columns
        .iter()
        .filter(|c| !row.get(c).is_empty())
        .map(|c| (c.clone(), row.get(c).to_string()))
        .collect();

    Ok(CanonicalRecord {
        month,
        category,
        amount,
        extra,
    })
}

fn detection_error(data: &LoadedData, missing: Vec<CanonicalField>) -> HeliosError {
    log::warn!(
        "column detection failed for {}: missing {:?}",
        data.source(),
        missing
    );
    HeliosError::ColumnDetection {
        source_name: data.source().to_string(),
        columns: data.column_names().to_vec(),
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::config::builtin;
    use crate::model::{CellValue, SourceFormat};
    use rust_decimal_macros::dec;

    fn table<R: AsRef<[&'static str]>>(columns: &[&str], rows: &[R]) -> LoadedData {
        LoadedData::from_rows(
            "ventes.csv",
            SourceFormat::Csv,
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.as_ref().iter().map(|v| CellValue::text(*v)).collect())
                .collect(),
        )
    }

    fn month(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalize_basic() {
        let data = table(
            &["Date", "Type", "Montant TTC"],
            &[
                ["2024-01-05", "Abonnement", "49.90"],
                ["2024-01-20", "Boutique", "12.00"],
                ["2024-02-02", "Abonnement", "49.90"],
            ],
        );
        let out = normalize(&data, builtin(), &NormalizeOptions::default()).unwrap();
        let months: Vec<String> = out.records.iter().map(|r| r.month.to_string()).collect();
        assert_eq!(months, ["2024-01", "2024-01", "2024-02"]);
        assert_eq!(out.records[1].category, "Boutique");
        assert_eq!(out.records[2].amount, dec!(49.90));
        assert!(out.warnings.is_empty());
        assert!(out.extra_columns.is_empty());
        let mapping = out.mapping.unwrap();
        assert_eq!(mapping.amount, "Montant TTC");
        assert_eq!(mapping.month.as_deref(), Some("Date"));
    }

    #[test]
    fn test_bad_rows_dropped_with_warning() {
        let data = table(
            &["Date", "Montant"],
            &[
                ["2024-01-05", "10,00"],
                ["2024-01-06", "n/a"],
                ["pas une date", "5,00"],
                ["2024-01-07", "2,50"],
            ],
        );
        let out = normalize(&data, builtin(), &NormalizeOptions::default()).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[1].amount, dec!(2.50));
        let dropped: Vec<usize> = out.warnings.iter().map(|w| w.row_index).collect();
        assert_eq!(dropped, [1, 2]);
        assert!(out.warnings[0].reason.contains("n/a"));
    }

    #[test]
    fn test_missing_category_uses_sentinel() {
        let data = table(&["Date", "Montant"], &[["2024-01-05", "10"]]);
        let out = normalize(&data, builtin(), &NormalizeOptions::default()).unwrap();
        assert_eq!(out.records[0].category, "Uncategorized");
        assert_eq!(out.mapping.unwrap().category, None);
    }

    #[test]
    fn test_blank_category_cell_uses_sentinel() {
        let data = table(
            &["Date", "Catégorie", "Montant"],
            &[["2024-01-05", "  ", "10"], ["2024-01-06", "Boutique", "5"]],
        );
        let out = normalize(&data, builtin(), &NormalizeOptions::default()).unwrap();
        assert_eq!(out.records[0].category, "Uncategorized");
        assert_eq!(out.records[1].category, "Boutique");
    }

    #[test]
    fn test_missing_month_and_amount_named_together() {
        let data = table(&["Nom", "Commentaire"], &[["Alice", "ok"]]);
        let err = normalize(&data, builtin(), &NormalizeOptions::default()).unwrap_err();
        match err {
            HeliosError::ColumnDetection {
                source_name,
                columns,
                missing,
            } => {
                assert_eq!(source_name, "ventes.csv");
                assert_eq!(columns, ["Nom", "Commentaire"]);
                assert_eq!(missing, [CanonicalField::Month, CanonicalField::Amount]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_month_fills_missing_month() {
        let data = table(
            &["designation", "gross_total"],
            &[["Abonnement", "49,90"]],
        );
        assert!(normalize(&data, builtin(), &NormalizeOptions::default()).is_err());

        let options = NormalizeOptions {
            default_month: Some(month("2024-03")),
        };
        let out = normalize(&data, builtin(), &options).unwrap();
        assert_eq!(out.records[0].month, month("2024-03"));
        assert_eq!(out.records[0].category, "Abonnement");
        assert_eq!(out.mapping.unwrap().month, None);
    }

    #[test]
    fn test_passthrough_columns() {
        let data = table(
            &["Date", "Type", "Montant", "Vendeur", "Note"],
            &[["2024-01-05", "Boutique", "12", "Marie", ""]],
        );
        let out = normalize(&data, builtin(), &NormalizeOptions::default()).unwrap();
        assert_eq!(out.extra_columns, ["Vendeur", "Note"]);
        assert_eq!(out.records[0].extra.get("Vendeur").map(String::as_str), Some("Marie"));
        assert!(!out.records[0].extra.contains_key("Note"));
    }

    #[test]
    fn test_renormalizing_is_a_no_op() {
        let data = table(
            &["Date", "Type", "Montant TTC", "Vendeur"],
            &[
                ["05/01/2024", "Abonnement", "49,90", "Marie"],
                ["20/01/2024", "", "1.234,50", ""],
            ],
        );
        let first = normalize(&data, builtin(), &NormalizeOptions::default()).unwrap();
        let second = normalize(
            &first.to_loaded_data(),
            builtin(),
            &NormalizeOptions::default(),
        )
        .unwrap();
        assert_eq!(first.records, second.records);
        let mapping = second.mapping.unwrap();
        assert_eq!(mapping.month.as_deref(), Some("month"));
        assert_eq!(mapping.category.as_deref(), Some("category"));
        assert_eq!(mapping.amount, "amount");
    }

    #[test]
    fn test_rendering_keeps_source_format() {
        let data = LoadedData::from_rows(
            "facture.pdf",
            SourceFormat::Pdf,
            vec!["section".into(), "designation".into(), "gross_total".into()],
            vec![vec![
                CellValue::text("OFFRES"),
                CellValue::text("Abonnement Premium"),
                CellValue::text("49,90"),
            ]],
        );
        let options = NormalizeOptions {
            default_month: Some(month("2024-03")),
        };
        let first = normalize(&data, builtin(), &options).unwrap();
        assert_eq!(first.format, SourceFormat::Pdf);

        let rendered = first.to_loaded_data();
        assert_eq!(rendered.format(), SourceFormat::Pdf);
        assert_eq!(rendered.source(), "facture.pdf");
        let second = normalize(&rendered, builtin(), &NormalizeOptions::default()).unwrap();
        assert_eq!(second.records, first.records);
    }

    #[test]
    fn test_empty_table_is_not_an_error() {
        let data = table::<[&str; 0]>(&["section", "designation", "gross_total"], &[]);
        let out = normalize(&data, builtin(), &NormalizeOptions::default()).unwrap();
        assert!(out.records.is_empty());
        assert!(out.mapping.is_none());
    }
}
