use helios_core::aggregate::SalesReport;
use helios_core::extraction::table::{ExtractedInvoice, INVOICE_COLUMNS};
use rust_decimal::Decimal;

pub fn print_invoice(invoice: &ExtractedInvoice) {
    println!(
        "{} row(s) from {} page(s)\n",
        invoice.rows.len(),
        invoice.pages_scanned
    );
    if invoice.rows.is_empty() {
        return;
    }

    let rows: Vec<[String; 7]> = invoice
        .rows
        .iter()
        .map(|r| {
            [
                r.section.map(|s| s.to_string()).unwrap_or_default(),
                r.designation.clone(),
                r.quantity.clone(),
                r.gross_total.clone(),
                r.tax_rate.clone(),
                r.tax_amount.clone(),
                r.net_total.clone(),
            ]
        })
        .collect();

    let widths: Vec<usize> = (0..INVOICE_COLUMNS.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain([INVOICE_COLUMNS[i].len()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    print_row(INVOICE_COLUMNS.iter().copied(), &widths);
    for row in &rows {
        print_row(row.iter().map(String::as_str), &widths);
    }
}

fn print_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = w))
        .collect();
    println!("  {}", line.join("  ").trim_end());
}

pub fn print_report(report: &SalesReport, record_count: usize) {
    println!("{record_count} record(s)\n");

    println!("=== Monthly summary ===\n");
    let max_cat = report
        .monthly_summary
        .iter()
        .map(|r| r.category.chars().count())
        .max()
        .unwrap_or(8);
    for row in &report.monthly_summary {
        println!(
            "  {}  {:<width$}  {:>12}",
            row.month,
            row.category,
            money(row.total_amount),
            width = max_cat
        );
    }
    println!();

    println!("=== Month over month ===\n");
    for row in &report.month_over_month {
        let delta = format_delta(row.delta_amount, row.delta_percent);
        println!("  {}  {:>12}  {}", row.month, money(row.total_amount), delta);
    }
    println!();

    println!("=== Totals by category ===\n");
    let max_cat = report
        .category_totals
        .iter()
        .map(|r| r.category.chars().count())
        .max()
        .unwrap_or(8);
    for row in &report.category_totals {
        println!(
            "  {:<width$}  {:>12}",
            row.category,
            money(row.total_amount),
            width = max_cat
        );
    }
}

/// Percentage is left out when the ratio is too large to scale.
fn format_delta(amount: Option<Decimal>, ratio: Option<Decimal>) -> String {
    let Some(d) = amount else {
        return String::new();
    };
    match ratio.and_then(|p| p.checked_mul(Decimal::ONE_HUNDRED)).map(|p| p.round_dp(1)) {
        Some(percent) => format!("{:>+12}  ({:+.1}%)", money(d), percent),
        None => format!("{:>+12}", money(d)),
    }
}

fn money(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}
