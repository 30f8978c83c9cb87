use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use uuid::Uuid;

use crate::evaluator::{ErrorKind, EvaluationReport};
use crate::stratify::ErrorTally;
use extract::Validity;
use ingest::{Reliability, ReportRecord};

/// One FP or FN case laid out for manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRow {
    pub error_type: ErrorKind,
    pub report_id: String,
    pub value_mismatch: bool,
    pub excerpt: String,
    pub raw_span: Option<String>,
    pub extracted: Option<String>,
    pub tagged: Option<String>,
    pub rule_id: Option<String>,
    pub sector: String,
    pub urgency: String,
    pub reliability: Reliability,
    pub validity: Validity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSheet {
    pub run_id: Uuid,
    pub rows: Vec<ErrorRow>,
    pub by_reliability: BTreeMap<Reliability, ErrorTally>,
    pub by_sector: BTreeMap<String, ErrorTally>,
}

impl ErrorSheet {
    pub const EXCERPT_CHARS: usize = 120;

    /// Rows come out ordered by reliability, then sector, then report id.
    pub fn build(report: &EvaluationReport, records: &[ReportRecord]) -> Self {
        let content: HashMap<&str, &ReportRecord> =
            records.iter().map(|r| (r.report_id.as_str(), r)).collect();

        let mut rows: Vec<ErrorRow> = report
            .errors
            .iter()
            .map(|case| {
                let excerpt = match content.get(case.report_id.as_str()) {
                    Some(record) => record.excerpt(Self::EXCERPT_CHARS),
                    None => {
                        tracing::warn!(report = %case.report_id, "no record for error case");
                        String::new()
                    }
                };
                ErrorRow {
                    error_type: case.kind,
                    report_id: case.report_id.clone(),
                    value_mismatch: case.value_mismatch,
                    excerpt,
                    raw_span: case.raw_span.clone(),
                    extracted: case.predicted.as_ref().map(ToString::to_string),
                    tagged: case.expected.as_ref().map(ToString::to_string),
                    rule_id: case.rule_id.clone(),
                    sector: case.keys.sector.clone(),
                    urgency: case.keys.urgency.clone(),
                    reliability: case.keys.reliability.clone(),
                    validity: case.validity,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            (&a.reliability, &a.sector, &a.report_id).cmp(&(&b.reliability, &b.sector, &b.report_id))
        });

        let mut by_reliability: BTreeMap<Reliability, ErrorTally> = BTreeMap::new();
        let mut by_sector: BTreeMap<String, ErrorTally> = BTreeMap::new();
        for row in &rows {
            by_reliability
                .entry(row.reliability.clone())
                .or_default()
                .record(row.error_type.into());
            by_sector
                .entry(row.sector.clone())
                .or_default()
                .record(row.error_type.into());
        }

        Self { run_id: report.run_id, rows, by_reliability, by_sector }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write error sheet to {}", path.display()))?;
        tracing::info!(rows = self.rows.len(), path = %path.display(), "error sheet written");
        Ok(())
    }
}
