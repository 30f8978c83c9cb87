pub mod record;
pub mod reader;

pub use record::{Reliability, ReportRecord};
pub use reader::RowReader;

use anyhow::Result;
use std::path::Path;

/// Load the cleaned report set handed over by the cleaning stage.
pub async fn load_reports(path: &Path) -> Result<Vec<ReportRecord>> {
    let reports: Vec<ReportRecord> = RowReader::read_rows(path).await?;
    tracing::info!(count = reports.len(), path = %path.display(), "loaded report records");
    Ok(reports)
}
