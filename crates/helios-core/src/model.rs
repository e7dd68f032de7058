use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::HeliosError;

/// A single cell as read from the source, before any semantic typing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    /// Build a text cell, collapsing blank strings to `Empty`.
    pub fn text(s: impl Into<String>) -> CellValue {
        let s = s.into();
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// One row of a raw table, keyed by column label.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    cells: BTreeMap<String, CellValue>,
}

impl RawRecord {
    /// Value of `column`, or `Empty` if the row has no such column.
    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY_CELL)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(CellValue::is_empty)
    }
}

/// Input formats the loader knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Csv,
    Xlsx,
    Xls,
}

impl SourceFormat {
    /// Detect the format from a declared file name's extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<SourceFormat> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "csv" => Some(SourceFormat::Csv),
            "xlsx" => Some(SourceFormat::Xlsx),
            "xls" => Some(SourceFormat::Xls),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Pdf => write!(f, "pdf"),
            SourceFormat::Csv => write!(f, "csv"),
            SourceFormat::Xlsx => write!(f, "xlsx"),
            SourceFormat::Xls => write!(f, "xls"),
        }
    }
}

/// A raw table loaded from one file.
///
/// Every row carries exactly the columns listed in `column_names`; the
/// constructor pads short rows with `Empty` and drops surplus cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedData {
    source: String,
    format: SourceFormat,
    column_names: Vec<String>,
    table: Vec<RawRecord>,
}

impl LoadedData {
    pub fn from_rows(
        source: impl Into<String>,
        format: SourceFormat,
        column_names: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> LoadedData {
        let table = rows
            .into_iter()
            .map(|mut row| {
                row.resize(column_names.len(), CellValue::Empty);
                RawRecord {
                    cells: column_names.iter().cloned().zip(row).collect(),
                }
            })
            .collect();

        LoadedData {
            source: source.into(),
            format,
            column_names,
            table,
        }
    }

    /// Declared name of the file this table came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn rows(&self) -> &[RawRecord] {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// All values of one column, in row order.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CellValue> + 'a {
        self.table.iter().map(move |r| r.get(name))
    }
}

/// A calendar month, displayed and parsed as `YYYY-MM`.
///
/// Ordering is chronological, which matches lexicographic order of the
/// `YYYY-MM` rendering for four-digit years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<YearMonth> {
        if (0..=9999).contains(&year) && (1..=12).contains(&month) {
            Some(YearMonth { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Option<YearMonth> {
        YearMonth::new(date.year(), date.month())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = HeliosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HeliosError::InvalidMonth(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 || !y.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = y.parse().map_err(|_| invalid())?;
        let month = m.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The fields of the canonical reporting schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalField {
    Month,
    Category,
    Amount,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Month => "month",
            CanonicalField::Category => "category",
            CanonicalField::Amount => "amount",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub month: YearMonth,
    /// Never empty: unresolved categories carry the configured sentinel.
    pub category: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Which raw columns were mapped onto the canonical fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// `None` when the month came from `NormalizeOptions::default_month`.
    pub month: Option<String>,
    /// `None` when every record carries the sentinel category.
    pub category: Option<String>,
    pub amount: String,
}

/// A row dropped (or degraded) during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowWarning {
    /// Zero-based index of the row in the raw table.
    pub row_index: usize,
    pub reason: String,
}

/// The normalized output for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub source: String,
    /// Format of the file the rows were loaded from.
    pub format: SourceFormat,
    /// `None` for an empty input table, where nothing was detected.
    pub mapping: Option<ColumnMapping>,
    pub extra_columns: Vec<String>,
    pub records: Vec<CanonicalRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RowWarning>,
}

impl NormalizedTable {
    /// Render back to a raw table with `month, category, amount` followed by
    /// the passthrough columns, tagged with the original source format.
    pub fn to_loaded_data(&self) -> LoadedData {
        let canonical = [
            CanonicalField::Month,
            CanonicalField::Category,
            CanonicalField::Amount,
        ];
        let extras: Vec<&String> = self
            .extra_columns
            .iter()
            .filter(|c| !canonical.iter().any(|f| f.as_str() == c.as_str()))
            .collect();

        let mut column_names: Vec<String> =
            canonical.iter().map(|f| f.as_str().to_string()).collect();
        column_names.extend(extras.iter().map(|c| c.to_string()));

        let rows = self
            .records
            .iter()
            .map(|r| {
                let mut row = vec![
                    CellValue::Text(r.month.to_string()),
                    CellValue::Text(r.category.clone()),
                    CellValue::Text(r.amount.to_string()),
                ];
                row.extend(
                    extras
                        .iter()
                        .map(|c| r.extra.get(*c).map(CellValue::text).unwrap_or_default()),
                );
                row
            })
            .collect();

        LoadedData::from_rows(self.source.clone(), self.format, column_names, rows)
    }
}
