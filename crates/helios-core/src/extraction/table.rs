//! Reconstruct invoice line items from pdftotext output.
//!
//! Text extraction keeps the left-to-right token order of a table row but
//! not its column boundaries, so rows are anchored on their fixed numeric
//! tail rather than on the free-text designation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extraction::PageContent;
use crate::model::{CellValue, LoadedData, SourceFormat};

/// Raw column labels of an extracted invoice table, in output order.
pub const INVOICE_COLUMNS: [&str; 7] = [
    "section",
    "designation",
    "quantity",
    "gross_total",
    "tax_rate",
    "tax_amount",
    "net_total",
];

/// Number of trailing tokens assigned positionally to numeric fields.
const NUMERIC_TAIL: usize = 5;

/// Structural block of an invoice that scopes the rows following its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Section {
    Offres,
    Produits,
    Totaux,
}

impl Section {
    /// Markers in the order they are tested against a line.
    const MARKERS: [Section; 3] = [Section::Offres, Section::Produits, Section::Totaux];

    pub fn label(&self) -> &'static str {
        match self {
            Section::Offres => "OFFRES",
            Section::Produits => "PRODUITS",
            Section::Totaux => "TOTAUX",
        }
    }

    /// The section whose marker occurs in `line` (case-sensitive).
    pub fn detect(line: &str) -> Option<Section> {
        Self::MARKERS
            .into_iter()
            .find(|s| line.contains(s.label()))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One invoice line item. All numeric fields stay raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub section: Option<Section>,
    pub designation: String,
    pub quantity: String,
    pub gross_total: String,
    pub tax_rate: String,
    pub tax_amount: String,
    pub net_total: String,
}

impl InvoiceLine {
    fn into_cells(self) -> Vec<CellValue> {
        vec![
            self.section
                .map(|s| CellValue::text(s.label()))
                .unwrap_or_default(),
            CellValue::text(self.designation),
            CellValue::text(self.quantity),
            CellValue::text(self.gross_total),
            CellValue::text(self.tax_rate),
            CellValue::text(self.tax_amount),
            CellValue::text(self.net_total),
        ]
    }
}

/// Result of classifying one line of page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// A section marker; the line itself carries no data.
    Marker(Section),
    Row(InvoiceLine),
    NoMatch,
}

/// Classify one line of extracted text given the active section.
///
/// A line is a data row when it splits into at least five whitespace tokens
/// and its last token contains a digit. The last five tokens are, in order,
/// quantity, gross total, tax rate, tax amount and net total; everything
/// before them is the designation.
pub fn parse_line(line: &str, section: Option<Section>) -> LineOutcome {
    if let Some(marker) = Section::detect(line) {
        return LineOutcome::Marker(marker);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let numeric_last = tokens
        .last()
        .is_some_and(|t| t.chars().any(|c| c.is_ascii_digit()));
    if tokens.len() < NUMERIC_TAIL || !numeric_last {
        return LineOutcome::NoMatch;
    }

    let (head, tail) = tokens.split_at(tokens.len() - NUMERIC_TAIL);
    match tail {
        [quantity, gross_total, tax_rate, tax_amount, net_total] => {
            LineOutcome::Row(InvoiceLine {
                section,
                designation: head.join(" "),
                quantity: quantity.to_string(),
                gross_total: gross_total.to_string(),
                tax_rate: tax_rate.to_string(),
                tax_amount: tax_amount.to_string(),
                net_total: net_total.to_string(),
            })
        }
        _ => LineOutcome::NoMatch,
    }
}

/// A page that contributed nothing because it had no extractable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWarning {
    pub page_number: usize,
    pub reason: String,
}

/// All line items recovered from one PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    pub pages_scanned: usize,
    pub rows: Vec<InvoiceLine>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PageWarning>,
}

impl ExtractedInvoice {
    /// Convert to a raw table with the `INVOICE_COLUMNS` layout.
    pub fn into_loaded_data(self, source: impl Into<String>) -> LoadedData {
        LoadedData::from_rows(
            source,
            SourceFormat::Pdf,
            INVOICE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            self.rows.into_iter().map(InvoiceLine::into_cells).collect(),
        )
    }
}

/// Accumulator threaded through the page/line scan.
#[derive(Debug, Default)]
struct ScanState {
    section: Option<Section>,
    invoice: ExtractedInvoice,
}

impl ScanState {
    fn scan_line(mut self, line: &str) -> Self {
        match parse_line(line, self.section) {
            LineOutcome::Marker(section) => self.section = Some(section),
            LineOutcome::Row(row) => self.invoice.rows.push(row),
            LineOutcome::NoMatch => {}
        }
        self
    }

    fn scan_page(mut self, page: &PageContent) -> Self {
        self.invoice.pages_scanned += 1;
        if page.is_blank() {
            log::warn!("page {} has no extractable text", page.page_number);
            self.invoice.warnings.push(PageWarning {
                page_number: page.page_number,
                reason: "no extractable text".into(),
            });
            return self;
        }
        page.lines
            .iter()
            .fold(self, |state, line| state.scan_line(line))
    }
}

/// Scan pages in document order and collect every matched line item.
///
/// The active section carries over page boundaries until the next marker.
pub fn extract_invoice(pages: &[PageContent]) -> ExtractedInvoice {
    let state = pages.iter().fold(ScanState::default(), ScanState::scan_page);
    log::debug!(
        "extracted {} invoice row(s) from {} page(s)",
        state.invoice.rows.len(),
        state.invoice.pages_scanned
    );
    state.invoice
}
