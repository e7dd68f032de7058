use helios_core::detection::config::{builtin, load_config};
use helios_core::error::HeliosError;
use std::path::Path;

pub fn show() -> Result<(), HeliosError> {
    let json = serde_json::to_string_pretty(builtin())?;
    println!("{json}");
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), HeliosError> {
    let config = load_config(file)?;

    println!("Config '{}' (v{}) is valid.", config.name, config.version);
    println!(
        "  Synonyms: {} month, {} category, {} amount",
        config.synonyms.month.len(),
        config.synonyms.category.len(),
        config.synonyms.amount.len()
    );
    println!(
        "  Date formats: {}",
        config
            .date_formats
            .iter()
            .chain(&config.datetime_formats)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Uncategorized label: {}", config.uncategorized_label);

    Ok(())
}
