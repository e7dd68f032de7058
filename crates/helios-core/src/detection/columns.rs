use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::detection::config::DetectionConfig;
use crate::detection::values::{cell_amount, cell_month, parse_month};
use crate::error::HeliosError;
use crate::model::{CanonicalField, CellValue, LoadedData};

/// How a column was matched to a canonical field. Earlier variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Column key equals a synonym key.
    Exact,
    /// Synonym tokens appear as a contiguous run of the column key's tokens.
    Token,
    /// No name matched; the column's values looked right.
    Sniffed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub column: String,
    pub method: DetectionMethod,
}

/// Columns resolved for each canonical field, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedColumns {
    pub month: Option<ColumnMatch>,
    pub category: Option<ColumnMatch>,
    pub amount: Option<ColumnMatch>,
}

/// Fold a column label or synonym to a comparison key.
///
/// "Montant TTC (€)" -> "montant_ttc", "Catégorie" -> "categorie".
pub fn column_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'a'..='z' | '0'..='9' => Some(c.to_string()),
            other => fold_accent(other).map(str::to_string),
        };
        match folded {
            Some(part) => {
                if pending_sep && !key.is_empty() {
                    key.push('_');
                }
                pending_sep = false;
                key.push_str(&part);
            }
            None => pending_sep = true,
        }
    }
    key
}

fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => "a",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'œ' => "oe",
        'æ' => "ae",
        _ => return None,
    };
    Some(folded)
}

/// Best name match of `column` against an ordered synonym list.
///
/// Scores order by method first, then by synonym position.
fn name_score(column: &str, synonyms: &[String]) -> Option<(DetectionMethod, usize)> {
    let key = column_key(column);
    if key.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = key.split('_').collect();

    synonyms
        .iter()
        .enumerate()
        .filter_map(|(i, synonym)| {
            let syn_key = column_key(synonym);
            if syn_key == key {
                return Some((DetectionMethod::Exact, i));
            }
            let syn_tokens: Vec<&str> = syn_key.split('_').collect();
            tokens
                .windows(syn_tokens.len())
                .any(|w| w == syn_tokens.as_slice())
                .then_some((DetectionMethod::Token, i))
        })
        .min()
}

/// Map a raw table's columns onto the canonical fields.
///
/// Names are matched first, in the order amount, month, category; a column
/// taken by one field is unavailable to the next. A month or amount name
/// match counts only if its values fit. Month and amount then fall back to
/// value sniffing. Unresolved fields are left as `None`; two equally
/// good candidates for one field are an error.
pub fn detect_columns(
    data: &LoadedData,
    config: &DetectionConfig,
) -> Result<DetectedColumns, HeliosError> {
    let mut claimed: Vec<String> = Vec::new();
    let mut detected = DetectedColumns::default();

    for field in [
        CanonicalField::Amount,
        CanonicalField::Month,
        CanonicalField::Category,
    ] {
        if let Some(m) = match_by_name(data, field, config, &claimed)? {
            claimed.push(m.column.clone());
            *slot(&mut detected, field) = Some(m);
        }
    }

    let date_like: Vec<&String> = data
        .column_names()
        .iter()
        .filter(|c| !claimed.contains(*c))
        .filter(|c| qualifies(data, c, config.sniff_sample_size, config.date_sniff_ratio, |v| {
            sniff_date(v, config)
        }))
        .collect();

    if detected.month.is_none() {
        detected.month = single_candidate(data, CanonicalField::Month, &date_like)?;
        if let Some(ref m) = detected.month {
            claimed.push(m.column.clone());
        }
    }

    if detected.amount.is_none() {
        let numeric: Vec<&String> = data
            .column_names()
            .iter()
            .filter(|c| !claimed.contains(*c) && !date_like.contains(c))
            .filter(|c| {
                qualifies(data, c, config.sniff_sample_size, config.amount_sniff_ratio, |v| {
                    cell_amount(v).is_some()
                })
            })
            .collect();
        detected.amount = single_candidate(data, CanonicalField::Amount, &numeric)?;
    }

    log::debug!(
        "detected columns for {}: month={:?} category={:?} amount={:?}",
        data.source(),
        detected.month,
        detected.category,
        detected.amount
    );
    Ok(detected)
}

fn slot(detected: &mut DetectedColumns, field: CanonicalField) -> &mut Option<ColumnMatch> {
    match field {
        CanonicalField::Month => &mut detected.month,
        CanonicalField::Category => &mut detected.category,
        CanonicalField::Amount => &mut detected.amount,
    }
}

/// Best-ranked name match whose values back it up.
///
/// Candidates are tried rank by rank. At a rank, month and amount columns
/// are kept only if enough of their values coerce; if none survive, the next
/// rank is tried. Two survivors at the same rank are ambiguous.
fn match_by_name(
    data: &LoadedData,
    field: CanonicalField,
    config: &DetectionConfig,
    claimed: &[String],
) -> Result<Option<ColumnMatch>, HeliosError> {
    let synonyms = config.synonyms_for(field);
    let mut scored: Vec<(&String, (DetectionMethod, usize))> = data
        .column_names()
        .iter()
        .filter(|c| !claimed.contains(*c))
        .filter_map(|c| name_score(c, synonyms).map(|score| (c, score)))
        .collect();
    scored.sort_by_key(|(_, score)| *score);

    for rank in scored.chunk_by(|a, b| a.1 == b.1) {
        let winners: Vec<&String> = rank
            .iter()
            .map(|(c, _)| *c)
            .filter(|c| values_confirm(data, c, field, config))
            .collect();
        match winners.as_slice() {
            [] => {
                log::debug!(
                    "{}: {} name match(es) {:?} rejected, values do not fit",
                    data.source(),
                    field,
                    rank.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>()
                );
            }
            [only] => {
                return Ok(Some(ColumnMatch {
                    column: only.to_string(),
                    method: rank[0].1 .0,
                }))
            }
            _ => return Err(ambiguous(data, field, &winners)),
        }
    }
    Ok(None)
}

/// Whether a name-matched column holds values of the field's type.
fn values_confirm(
    data: &LoadedData,
    column: &str,
    field: CanonicalField,
    config: &DetectionConfig,
) -> bool {
    let ratio = config.name_match_ratio;
    let size = config.sniff_sample_size;
    match field {
        CanonicalField::Month => {
            qualifies(data, column, size, ratio, |v| cell_month(v, config).is_some())
        }
        CanonicalField::Amount => qualifies(data, column, size, ratio, |v| cell_amount(v).is_some()),
        CanonicalField::Category => true,
    }
}

fn single_candidate(
    data: &LoadedData,
    field: CanonicalField,
    candidates: &[&String],
) -> Result<Option<ColumnMatch>, HeliosError> {
    match candidates {
        [] => Ok(None),
        [only] => Ok(Some(ColumnMatch {
            column: only.to_string(),
            method: DetectionMethod::Sniffed,
        })),
        _ => Err(ambiguous(data, field, candidates)),
    }
}

fn ambiguous(data: &LoadedData, field: CanonicalField, candidates: &[&String]) -> HeliosError {
    HeliosError::AmbiguousColumns {
        source_name: data.source().to_string(),
        field,
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
    }
}

/// True when at least `ratio` of the first `sample_size` non-empty values pass `accept`.
fn qualifies(
    data: &LoadedData,
    column: &str,
    sample_size: usize,
    ratio: Decimal,
    accept: impl Fn(&CellValue) -> bool,
) -> bool {
    let sample: Vec<&CellValue> = data
        .column(column)
        .filter(|v| !v.is_empty())
        .take(sample_size)
        .collect();
    if sample.is_empty() {
        return false;
    }
    let accepted = sample.iter().filter(|&&v| accept(v)).count();
    Decimal::from(accepted) >= ratio * Decimal::from(sample.len())
}

/// Date sniffing ignores bare numbers: any amount would pass as an Excel serial.
fn sniff_date(cell: &CellValue, config: &DetectionConfig) -> bool {
    match cell {
        CellValue::Date(_) => true,
        CellValue::Text(s) => parse_month(s, config).is_some(),
        CellValue::Number(_) | CellValue::Empty => false,
    }
}
