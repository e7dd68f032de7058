use helios_core::error::HeliosError;
use serde::Serialize;

pub fn print<T: Serialize>(value: &T) -> Result<(), HeliosError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
