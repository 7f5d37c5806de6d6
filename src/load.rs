use crate::announce::MessagePayload;
use crate::error::Result;
use crate::structs::HistoryEntry;
use chrono::{DateTime, Utc};
use csv::Writer;
use std::{fs::File, path::Path};

/// Writes the history log to a CSV file, newest first.
///
/// # Arguments
/// * `histories` - History entries in store order
/// * `output_path` - Path where the CSV file will be created
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_history_csv(histories: &[HistoryEntry], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(["Position", "Date", "Epoch_Ms", "Weather", "Conditions"])?;

    for (position, entry) in histories.iter().enumerate() {
        let date = DateTime::<Utc>::from_timestamp_millis(entry.date)
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        writer.write_record(&[
            position.to_string(),
            date,
            entry.date.to_string(),
            entry.weather.name.clone(),
            serde_json::to_string(&entry.weather.conditions)?,
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the chat message payload as pretty-formatted JSON.
///
/// # Errors
/// Returns error if file cannot be created or serialization fails.
pub fn write_payload(payload: &MessagePayload, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, payload)?;
    Ok(())
}
