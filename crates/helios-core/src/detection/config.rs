use chrono::format::{Item, StrftimeItems};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::detection::columns::column_key;
use crate::error::HeliosError;
use crate::model::CanonicalField;

const BUILTIN_JSON: &str = include_str!("../../../../config/detection.json");

static BUILTIN: LazyLock<DetectionConfig> = LazyLock::new(|| {
    serde_json::from_str(BUILTIN_JSON).expect("embedded detection.json is valid")
});

/// Column-detection settings: synonym lists, date formats and sniffing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub synonyms: SynonymLists,
    /// chrono formats tried, in order, on date-only values.
    pub date_formats: Vec<String>,
    /// chrono formats tried, in order, on values carrying a time of day.
    #[serde(default)]
    pub datetime_formats: Vec<String>,
    /// Share of sampled values that must coerce to a decimal for a column
    /// to be sniffed as the amount.
    pub amount_sniff_ratio: Decimal,
    /// Share of sampled values that must parse as dates for a column to be
    /// sniffed as the month source.
    pub date_sniff_ratio: Decimal,
    /// Share of sampled values that must fit before a month or amount
    /// column matched by name is accepted.
    #[serde(default = "default_name_match_ratio")]
    pub name_match_ratio: Decimal,
    /// Number of non-empty values sampled per column when sniffing.
    pub sniff_sample_size: usize,
    /// Category given to records whose category cannot be resolved.
    pub uncategorized_label: String,
}

/// Synonyms per canonical field, highest priority first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymLists {
    pub month: Vec<String>,
    pub category: Vec<String>,
    pub amount: Vec<String>,
}

fn default_name_match_ratio() -> Decimal {
    Decimal::new(5, 1)
}

impl DetectionConfig {
    pub fn synonyms_for(&self, field: CanonicalField) -> &[String] {
        match field {
            CanonicalField::Month => &self.synonyms.month,
            CanonicalField::Category => &self.synonyms.category,
            CanonicalField::Amount => &self.synonyms.amount,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        builtin().clone()
    }
}

/// The embedded default configuration.
pub fn builtin() -> &'static DetectionConfig {
    &BUILTIN
}

/// Load a detection config from a JSON file.
pub fn load_config(path: &Path) -> Result<DetectionConfig, HeliosError> {
    let content = std::fs::read_to_string(path).map_err(|e| HeliosError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_config(&content, path)
}

/// Parse a detection config from a JSON string.
pub fn parse_config(json: &str, source: &Path) -> Result<DetectionConfig, HeliosError> {
    let config: DetectionConfig =
        serde_json::from_str(json).map_err(|e| HeliosError::ConfigLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a detection config from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<DetectionConfig, HeliosError> {
    let config: DetectionConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate that a detection config is well-formed.
pub fn validate_config(config: &DetectionConfig) -> Result<(), HeliosError> {
    let mut owner: HashMap<String, CanonicalField> = HashMap::new();
    for field in [
        CanonicalField::Month,
        CanonicalField::Category,
        CanonicalField::Amount,
    ] {
        let synonyms = config.synonyms_for(field);
        if synonyms.is_empty() {
            return Err(HeliosError::ConfigInvalid(format!(
                "{field} synonyms must not be empty"
            )));
        }
        for synonym in synonyms {
            let key = column_key(synonym);
            if key.is_empty() {
                return Err(HeliosError::ConfigInvalid(format!(
                    "{field} synonym '{synonym}' has no letters or digits"
                )));
            }
            match owner.get(&key) {
                Some(other) if *other != field => {
                    return Err(HeliosError::ConfigInvalid(format!(
                        "synonym '{synonym}' is listed under both {other} and {field}"
                    )));
                }
                _ => {
                    owner.insert(key, field);
                }
            }
        }
    }

    if config.date_formats.is_empty() {
        return Err(HeliosError::ConfigInvalid(
            "date_formats must not be empty".into(),
        ));
    }
    for format in config.date_formats.iter().chain(&config.datetime_formats) {
        if StrftimeItems::new(format).any(|item| item == Item::Error) {
            return Err(HeliosError::ConfigInvalid(format!(
                "invalid date format '{format}'"
            )));
        }
    }

    for (name, ratio) in [
        ("amount_sniff_ratio", config.amount_sniff_ratio),
        ("date_sniff_ratio", config.date_sniff_ratio),
        ("name_match_ratio", config.name_match_ratio),
    ] {
        if ratio <= Decimal::ZERO || ratio > Decimal::ONE {
            return Err(HeliosError::ConfigInvalid(format!(
                "{name} must be in (0, 1], got {ratio}"
            )));
        }
    }

    if config.sniff_sample_size == 0 {
        return Err(HeliosError::ConfigInvalid(
            "sniff_sample_size must be at least 1".into(),
        ));
    }

    if config.uncategorized_label.trim().is_empty() {
        return Err(HeliosError::ConfigInvalid(
            "uncategorized_label must not be empty".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config_json(amount: &str, ratio: &str) -> String {
        format!(
            r#"{{
                "name": "Test",
                "version": "1.0",
                "synonyms": {{
                    "month": ["date"],
                    "category": ["type"],
                    "amount": [{amount}]
                }},
                "date_formats": ["%Y-%m-%d"],
                "amount_sniff_ratio": "{ratio}",
                "date_sniff_ratio": "0.8",
                "sniff_sample_size": 10,
                "uncategorized_label": "Autre"
            }}"#
        )
    }

    #[test]
    fn test_builtin_config_is_valid() {
        let config = builtin();
        validate_config(config).unwrap();
        assert_eq!(config.uncategorized_label, "Uncategorized");
        assert_eq!(config.synonyms.amount[0], "amount");
        assert_eq!(config.amount_sniff_ratio, dec!(0.9));
    }

    #[test]
    fn test_parse_valid_config() {
        let config = parse_config_str(&config_json(r#""montant""#, "0.75")).unwrap();
        assert_eq!(config.name, "Test");
        assert_eq!(config.synonyms.amount, vec!["montant"]);
        assert!(config.datetime_formats.is_empty());
        assert_eq!(config.name_match_ratio, dec!(0.5));
        assert_eq!(config.uncategorized_label, "Autre");
    }

    #[test]
    fn test_empty_synonyms_rejected() {
        assert!(parse_config_str(&config_json("", "0.75")).is_err());
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        assert!(parse_config_str(&config_json(r#""montant""#, "0")).is_err());
        assert!(parse_config_str(&config_json(r#""montant""#, "1.5")).is_err());
        assert!(parse_config_str(&config_json(r#""montant""#, "1")).is_ok());
    }

    #[test]
    fn test_name_match_ratio_out_of_range_rejected() {
        let json = config_json(r#""montant""#, "0.9").replace(
            r#""sniff_sample_size""#,
            r#""name_match_ratio": "0", "sniff_sample_size""#,
        );
        let err = parse_config_str(&json).unwrap_err();
        assert!(err.to_string().contains("name_match_ratio"));
    }

    #[test]
    fn test_synonym_shared_between_fields_rejected() {
        let err = parse_config_str(&config_json(r#""montant", "Type""#, "0.9")).unwrap_err();
        assert!(err.to_string().contains("both category and amount"));
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        let json = config_json(r#""montant""#, "0.9").replace("%Y-%m-%d", "%Q-%m");
        assert!(parse_config_str(&json).is_err());
    }
}
