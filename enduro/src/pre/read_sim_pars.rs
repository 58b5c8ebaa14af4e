use crate::core::race::RaceConfig;
use anyhow::Context;
use std::fs::OpenOptions;
use std::path::Path;

/// read_race_config reads the JSON file and decodes the JSON string into the race configuration.
pub fn read_race_config(filepath: &Path) -> anyhow::Result<RaceConfig> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let config = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    Ok(config)
}

/// parse_race_config decodes a race configuration from a JSON string.
pub fn parse_race_config(json: &str) -> anyhow::Result<RaceConfig> {
    serde_json::from_str(json).context("Failed to parse race configuration!")
}
