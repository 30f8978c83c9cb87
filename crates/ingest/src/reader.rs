use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;

/// Loads tabular rows exported by the cleaning and tagging stages.
///
/// `.json` files hold a single array of rows; `.jsonl` / `.ndjson` files hold
/// one row per line. Blank lines are skipped.
pub struct RowReader;

impl RowReader {
    pub async fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let content = fs::read_to_string(path)
            .await
            .context(format!("Failed to read file: {:?}", path))?;
        // Spreadsheet exports often carry a UTF-8 byte order mark.
        let content = content.trim_start_matches('\u{feff}');

        match extension {
            "json" => serde_json::from_str(content)
                .context(format!("Failed to parse JSON rows: {:?}", path)),
            "jsonl" | "ndjson" => Self::parse_lines(content, path),
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    fn parse_lines<T: DeserializeOwned>(content: &str, path: &Path) -> Result<Vec<T>> {
        let mut rows = Vec::new();

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = serde_json::from_str(line)
                .context(format!("Failed to parse line {} of {:?}", index + 1, path))?;
            rows.push(row);
        }

        Ok(rows)
    }
}
