use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::HeliosError;
use crate::model::{CanonicalRecord, YearMonth};

/// Total revenue for one category in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummaryRow {
    pub month: YearMonth,
    pub category: String,
    pub total_amount: Decimal,
}

/// Monthly total compared with the preceding month present in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthOverMonthRow {
    pub month: YearMonth,
    pub total_amount: Decimal,
    /// `None` for the first month.
    pub delta_amount: Option<Decimal>,
    /// Ratio of `delta_amount` to the previous total (`-0.1939`, not `-19.39`).
    /// `None` for the first month and when the previous total is zero.
    pub delta_percent: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotalRow {
    pub category: String,
    pub total_amount: Decimal,
}

/// Every table derived from one selection of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesReport {
    pub monthly_summary: Vec<MonthlySummaryRow>,
    pub month_over_month: Vec<MonthOverMonthRow>,
    pub category_totals: Vec<CategoryTotalRow>,
}

/// Month/category selection applied before aggregation.
///
/// `None` selects everything along that axis; an empty set selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub months: Option<BTreeSet<YearMonth>>,
    pub categories: Option<BTreeSet<String>>,
}

impl RecordFilter {
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        self.months
            .as_ref()
            .is_none_or(|m| m.contains(&record.month))
            && self
                .categories
                .as_ref()
                .is_none_or(|c| c.contains(&record.category))
    }

    /// Records passing the filter, in input order.
    pub fn apply(&self, records: &[CanonicalRecord]) -> Vec<CanonicalRecord> {
        records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}

/// Add `amount` to the running total under `key`.
fn accumulate<K: Ord>(
    totals: &mut BTreeMap<K, Decimal>,
    key: K,
    amount: Decimal,
    what: impl FnOnce() -> String,
) -> Result<(), HeliosError> {
    let total = totals.entry(key).or_default();
    *total = total
        .checked_add(amount)
        .ok_or_else(|| HeliosError::AmountOverflow(what()))?;
    Ok(())
}

/// Sum `amount` per `(month, category)`, ordered by month then category.
pub fn monthly_summary(
    records: &[CanonicalRecord],
) -> Result<Vec<MonthlySummaryRow>, HeliosError> {
    let mut totals: BTreeMap<(YearMonth, &str), Decimal> = BTreeMap::new();
    for record in records {
        accumulate(
            &mut totals,
            (record.month, record.category.as_str()),
            record.amount,
            || format!("summing {} / {}", record.month, record.category),
        )?;
    }
    Ok(totals
        .into_iter()
        .map(|((month, category), total_amount)| MonthlySummaryRow {
            month,
            category: category.to_string(),
            total_amount,
        })
        .collect())
}

/// Sum `amount` per month in chronological order, with the change from the
/// previous month.
pub fn month_over_month(
    records: &[CanonicalRecord],
) -> Result<Vec<MonthOverMonthRow>, HeliosError> {
    let mut totals: BTreeMap<YearMonth, Decimal> = BTreeMap::new();
    for record in records {
        accumulate(&mut totals, record.month, record.amount, || {
            format!("summing {}", record.month)
        })?;
    }

    let mut rows = Vec::with_capacity(totals.len());
    let mut previous: Option<Decimal> = None;
    for (month, total_amount) in totals {
        let delta_amount = previous
            .map(|p| {
                total_amount.checked_sub(p).ok_or_else(|| {
                    HeliosError::AmountOverflow(format!("comparing {month} with the previous month"))
                })
            })
            .transpose()?;
        let delta_percent = previous
            .zip(delta_amount)
            .and_then(|(p, d)| d.checked_div(p));
        previous = Some(total_amount);
        rows.push(MonthOverMonthRow {
            month,
            total_amount,
            delta_amount,
            delta_percent,
        });
    }
    Ok(rows)
}

/// Sum `amount` per category, largest total first, ties by name.
pub fn category_totals(records: &[CanonicalRecord]) -> Result<Vec<CategoryTotalRow>, HeliosError> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for record in records {
        accumulate(&mut totals, record.category.as_str(), record.amount, || {
            format!("summing {}", record.category)
        })?;
    }
    let mut rows: Vec<CategoryTotalRow> = totals
        .into_iter()
        .map(|(category, total_amount)| CategoryTotalRow {
            category: category.to_string(),
            total_amount,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.category.cmp(&b.category))
    });
    Ok(rows)
}

/// Months present in `records`, in chronological order.
pub fn distinct_months(records: &[CanonicalRecord]) -> Vec<YearMonth> {
    records
        .iter()
        .map(|r| r.month)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Categories present in `records`, sorted by name.
pub fn distinct_categories(records: &[CanonicalRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.category.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn build_report(records: &[CanonicalRecord]) -> Result<SalesReport, HeliosError> {
    log::debug!("aggregating {} record(s)", records.len());
    Ok(SalesReport {
        monthly_summary: monthly_summary(records)?,
        month_over_month: month_over_month(records)?,
        category_totals: category_totals(records)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn month(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    fn record(m: &str, category: &str, amount: Decimal) -> CanonicalRecord {
        CanonicalRecord {
            month: month(m),
            category: category.into(),
            amount,
            extra: BTreeMap::new(),
        }
    }

    fn sales() -> Vec<CanonicalRecord> {
        vec![
            record("2024-01", "Abonnement", dec!(49.90)),
            record("2024-01", "Boutique", dec!(12.00)),
            record("2024-02", "Abonnement", dec!(49.90)),
        ]
    }

    #[test]
    fn test_monthly_summary() {
        let rows = monthly_summary(&sales()).unwrap();
        let got: Vec<(String, &str, Decimal)> = rows
            .iter()
            .map(|r| (r.month.to_string(), r.category.as_str(), r.total_amount))
            .collect();
        assert_eq!(
            got,
            [
                ("2024-01".to_string(), "Abonnement", dec!(49.90)),
                ("2024-01".to_string(), "Boutique", dec!(12.00)),
                ("2024-02".to_string(), "Abonnement", dec!(49.90)),
            ]
        );
    }

    #[test]
    fn test_monthly_summary_groups_exact_category() {
        let records = vec![
            record("2024-01", "Boutique", dec!(1)),
            record("2024-01", "boutique", dec!(2)),
            record("2024-01", "Boutique", dec!(3)),
        ];
        let rows = monthly_summary(&records).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "Boutique");
        assert_eq!(rows[0].total_amount, dec!(4));
    }

    #[test]
    fn test_month_over_month() {
        let rows = month_over_month(&sales()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_amount, dec!(61.90));
        assert_eq!(rows[0].delta_amount, None);
        assert_eq!(rows[0].delta_percent, None);
        assert_eq!(rows[1].total_amount, dec!(49.90));
        assert_eq!(rows[1].delta_amount, Some(dec!(-12.00)));
        assert_eq!(rows[1].delta_percent.map(|p| p.round_dp(4)), Some(dec!(-0.1939)));
    }

    #[test]
    fn test_month_over_month_sorts_unordered_input() {
        let records = vec![
            record("2024-03", "A", dec!(30)),
            record("2023-12", "A", dec!(10)),
            record("2024-01", "A", dec!(20)),
        ];
        let rows = month_over_month(&records).unwrap();
        let months: Vec<String> = rows.iter().map(|r| r.month.to_string()).collect();
        assert_eq!(months, ["2023-12", "2024-01", "2024-03"]);
        for pair in rows.windows(2) {
            assert_eq!(
                pair[1].delta_amount,
                Some(pair[1].total_amount - pair[0].total_amount)
            );
        }
    }

    #[test]
    fn test_zero_previous_total_has_no_percent() {
        let records = vec![
            record("2024-01", "A", dec!(10)),
            record("2024-01", "A", dec!(-10)),
            record("2024-02", "A", dec!(5)),
        ];
        let rows = month_over_month(&records).unwrap();
        assert_eq!(rows[0].total_amount, dec!(0));
        assert_eq!(rows[1].delta_amount, Some(dec!(5)));
        assert_eq!(rows[1].delta_percent, None);
    }

    #[test]
    fn test_empty_input() {
        let report = build_report(&[]).unwrap();
        assert!(report.monthly_summary.is_empty());
        assert!(report.month_over_month.is_empty());
        assert!(report.category_totals.is_empty());
    }

    #[test]
    fn test_sum_overflow_is_an_error() {
        let records = vec![
            record("2024-01", "Gros", Decimal::MAX),
            record("2024-01", "Gros", Decimal::MAX),
        ];
        for err in [
            monthly_summary(&records).unwrap_err(),
            month_over_month(&records).unwrap_err(),
            category_totals(&records).unwrap_err(),
            build_report(&records).unwrap_err(),
        ] {
            assert!(matches!(err, HeliosError::AmountOverflow(_)), "{err}");
        }
    }

    #[test]
    fn test_delta_overflow_is_an_error() {
        let records = vec![
            record("2024-01", "A", Decimal::MIN),
            record("2024-02", "A", Decimal::MAX),
        ];
        let err = month_over_month(&records).unwrap_err();
        assert!(err.to_string().contains("2024-02"));
        // Each month on its own still sums fine.
        assert_eq!(monthly_summary(&records).unwrap().len(), 2);
    }

    #[test]
    fn test_category_totals_order() {
        let mut records = sales();
        records.push(record("2024-02", "Atelier", dec!(12.00)));
        let rows = category_totals(&records).unwrap();
        let got: Vec<(&str, Decimal)> = rows
            .iter()
            .map(|r| (r.category.as_str(), r.total_amount))
            .collect();
        assert_eq!(
            got,
            [
                ("Abonnement", dec!(99.80)),
                ("Atelier", dec!(12.00)),
                ("Boutique", dec!(12.00)),
            ]
        );
    }

    #[test]
    fn test_filter() {
        let records = sales();
        let filter = RecordFilter {
            months: Some([month("2024-01")].into()),
            categories: None,
        };
        assert_eq!(filter.apply(&records).len(), 2);

        let filter = RecordFilter {
            months: None,
            categories: Some(["Abonnement".to_string()].into()),
        };
        let kept = filter.apply(&records);
        assert!(kept.iter().all(|r| r.category == "Abonnement"));
        assert_eq!(kept.len(), 2);

        let nothing = RecordFilter {
            months: Some(BTreeSet::new()),
            categories: None,
        };
        assert!(nothing.apply(&records).is_empty());
        assert_eq!(RecordFilter::default().apply(&records), records);
    }

    #[test]
    fn test_distinct_values() {
        let records = sales();
        assert_eq!(distinct_months(&records), [month("2024-01"), month("2024-02")]);
        assert_eq!(distinct_categories(&records), ["Abonnement", "Boutique"]);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let records = sales();
        assert_eq!(build_report(&records).unwrap(), build_report(&records).unwrap());
    }
}
