use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use calamine::{Data, Range, Reader, Xls, Xlsx};
use chrono::{Days, NaiveDate};

use crate::error::HeliosError;
use crate::model::{CellValue, LoadedData, SourceFormat};

/// Delimiters considered when sniffing a CSV header line.
const CSV_DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// Largest serial date Excel can represent (9999-12-31).
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

/// Read a CSV export into a raw table.
pub fn read_csv(source: &str, bytes: &[u8]) -> Result<LoadedData, HeliosError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let delimiter = sniff_delimiter(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers().map_err(|e| parse_error(source, e))?;
    let column_names = unique_column_names(headers.iter().map(|h| h.to_string()));

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_error(source, e))?;
        let row: Vec<CellValue> = record.iter().map(|v| CellValue::text(v.trim())).collect();
        if row.iter().all(CellValue::is_empty) {
            continue;
        }
        rows.push(row);
    }

    log::debug!(
        "read {} row(s) x {} column(s) from {} (delimiter {:?})",
        rows.len(),
        column_names.len(),
        source,
        delimiter as char
    );
    Ok(LoadedData::from_rows(source, SourceFormat::Csv, column_names, rows))
}

/// Read the first worksheet of an XLSX or XLS workbook into a raw table.
///
/// The first non-empty row is the header row.
pub fn read_workbook(
    source: &str,
    format: SourceFormat,
    bytes: &[u8],
) -> Result<LoadedData, HeliosError> {
    let cursor = Cursor::new(bytes);
    let range = match format {
        SourceFormat::Xlsx => {
            let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(cursor)
                .map_err(|e| parse_error(source, format!("failed to open xlsx: {e}")))?;
            first_sheet(&mut workbook, source)?
        }
        SourceFormat::Xls => {
            let mut workbook: Xls<_> = calamine::open_workbook_from_rs(cursor)
                .map_err(|e| parse_error(source, format!("failed to open xls: {e}")))?;
            first_sheet(&mut workbook, source)?
        }
        other => {
            return Err(parse_error(
                source,
                format!("{other} is not a workbook format"),
            ))
        }
    };

    let mut sheet_rows = range
        .rows()
        .map(|r| r.iter().map(cell_value).collect::<Vec<_>>())
        .skip_while(|r| r.iter().all(CellValue::is_empty));

    let Some(header) = sheet_rows.next() else {
        return Ok(LoadedData::from_rows(source, format, Vec::new(), Vec::new()));
    };
    let column_names = unique_column_names(header.iter().map(|c| c.to_string()));
    let rows: Vec<Vec<CellValue>> = sheet_rows
        .filter(|r| !r.iter().all(CellValue::is_empty))
        .collect();

    log::debug!(
        "read {} row(s) x {} column(s) from {}",
        rows.len(),
        column_names.len(),
        source
    );
    Ok(LoadedData::from_rows(source, format, column_names, rows))
}

fn first_sheet<RS, R>(workbook: &mut R, source: &str) -> Result<Range<Data>, HeliosError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => Ok(range),
        Some(Err(e)) => Err(parse_error(source, format!("failed to read first sheet: {e}"))),
        None => Err(parse_error(source, "workbook has no worksheets")),
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.trim()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => CellValue::text(s.trim()),
        _ => CellValue::text(cell.to_string()),
    }
}

/// Convert an Excel serial day number (1900 date system) to a calendar date.
///
/// Serial 60 is Excel's phantom 1900-02-29; anchoring on 1899-12-30 gives
/// the right date for every serial after it.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.trunc() as u64))
}

/// Pick the delimiter that occurs most often in the header line.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let mut best = (b',', 0usize);
    for delimiter in CSV_DELIMITERS {
        let count = header.iter().filter(|b| **b == delimiter).count();
        if count > best.1 || (count == best.1 && count > 0 && delimiter == b',') {
            best = (delimiter, count);
        }
    }
    best.0
}

/// Trim header labels, name blank ones `column_<n>` and suffix duplicates.
fn unique_column_names(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.enumerate()
        .map(|(i, name)| {
            let name = name.trim();
            let base = if name.is_empty() {
                format!("column_{}", i + 1)
            } else {
                name.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{base}_{count}")
            }
        })
        .collect()
}

fn parse_error(source: &str, reason: impl ToString) -> HeliosError {
    HeliosError::ParseError {
        source_name: source.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_comma() {
        let csv = b"Date,Type,Montant TTC\n2024-01-05,Abonnement,49.90\n2024-01-20,Boutique,12.00\n";
        let data = read_csv("ventes.csv", csv).unwrap();
        assert_eq!(data.column_names(), ["Date", "Type", "Montant TTC"]);
        assert_eq!(data.len(), 2);
        assert_eq!(
            data.rows()[1].get("Type"),
            &CellValue::Text("Boutique".into())
        );
    }

    #[test]
    fn test_read_csv_semicolon_with_decimal_comma() {
        let csv = "\u{feff}Date;Catégorie;Montant\n05/01/2024;Boutique;12,50\n".as_bytes();
        let data = read_csv("export.csv", csv).unwrap();
        assert_eq!(data.column_names(), ["Date", "Catégorie", "Montant"]);
        assert_eq!(
            data.rows()[0].get("Montant"),
            &CellValue::Text("12,50".into())
        );
    }

    #[test]
    fn test_read_csv_ragged_and_blank_rows() {
        let csv = b"a,b,c\n1,2\n,,\n4,5,6,7\n";
        let data = read_csv("r.csv", csv).unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.rows()[0].get("c").is_empty());
        assert_eq!(data.rows()[1].get("c"), &CellValue::Text("6".into()));
    }

    #[test]
    fn test_header_only_csv_is_empty_table() {
        let data = read_csv("h.csv", b"Date,Montant\n").unwrap();
        assert!(data.is_empty());
        assert_eq!(data.column_names().len(), 2);
    }

    #[test]
    fn test_unique_column_names() {
        let names = unique_column_names(
            ["Total", " ", "Total", "Date ", "Total"]
                .iter()
                .map(|s| s.to_string()),
        );
        assert_eq!(names, ["Total", "column_2", "Total_2", "Date", "Total_3"]);
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter(b"a;b;c\n1,5;2;3"), b';');
        assert_eq!(sniff_delimiter(b"a,b,c\n"), b',');
        assert_eq!(sniff_delimiter(b"a\tb\n"), b'\t');
        assert_eq!(sniff_delimiter(b"single\n"), b',');
    }

    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(
            excel_serial_to_date(45296.0),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(
            excel_serial_to_date(45296.75),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(excel_serial_to_date(0.0), None);
        assert_eq!(excel_serial_to_date(f64::NAN), None);
    }

    #[test]
    fn test_read_xlsx_first_sheet() {
        let bytes = include_bytes!("../../tests/fixtures/ventes.xlsx");
        let data = read_workbook("ventes.xlsx", SourceFormat::Xlsx, bytes).unwrap();

        assert_eq!(data.format(), SourceFormat::Xlsx);
        // The blank first row is skipped before the header.
        assert_eq!(
            data.column_names(),
            ["Date", "Type", "Montant TTC", "Quantité"]
        );
        assert_eq!(data.len(), 3);

        let first = &data.rows()[0];
        assert_eq!(
            first.get("Date"),
            &CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
        assert_eq!(first.get("Type"), &CellValue::Text("Abonnement".into()));
        assert_eq!(first.get("Montant TTC"), &CellValue::Number(49.9));
        assert_eq!(data.rows()[1].get("Quantité"), &CellValue::Number(2.0));
    }

    #[test]
    fn test_invalid_workbook_is_parse_error() {
        let err = read_workbook("broken.xlsx", SourceFormat::Xlsx, b"not a zip").unwrap_err();
        assert!(matches!(err, HeliosError::ParseError { .. }));
        assert_eq!(err.source_name(), Some("broken.xlsx"));
    }
}
