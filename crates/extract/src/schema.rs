use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::coordinate::CanonicalCoordinate;
use crate::error::Rejection;
use ingest::{Reliability, ReportRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Valid,
    Suspect,
}

/// Categorical keys carried over from the report so evaluation can stratify
/// without going back to the record set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportKeys {
    pub sector: String,
    pub urgency: String,
    pub reliability: Reliability,
}

impl From<&ReportRecord> for ReportKeys {
    fn from(report: &ReportRecord) -> Self {
        Self {
            sector: report.sector.clone(),
            urgency: report.urgency.clone(),
            reliability: report.reliability.clone(),
        }
    }
}

/// What the extractor concluded for one report. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionResult {
    pub report_id: String,
    pub found: bool,
    pub value: Option<CanonicalCoordinate>,
    pub matched_rule_id: Option<String>,
    pub raw_span: Option<String>,
    pub validity: Validity,
    #[serde(flatten)]
    pub keys: ReportKeys,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<Rejection>,
}

/// Batch-level statistics over a set of extraction results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionSummary {
    pub registry_fingerprint: String,
    pub total_reports: usize,
    pub with_coordinate: usize,
    pub without_coordinate: usize,
    /// `None` when there were no reports.
    pub extraction_rate: Option<f64>,
    pub suspect: usize,
    pub wins_by_rule: BTreeMap<String, usize>,
    pub rejections_by_reason: BTreeMap<String, usize>,
}

impl ExtractionSummary {
    pub fn from_results(results: &[ExtractionResult], registry_fingerprint: String) -> Self {
        let mut wins_by_rule = BTreeMap::new();
        let mut rejections_by_reason = BTreeMap::new();
        let mut with_coordinate = 0;
        let mut suspect = 0;

        for result in results {
            if result.found {
                with_coordinate += 1;
            }
            if result.validity == Validity::Suspect {
                suspect += 1;
            }
            if let Some(rule) = &result.matched_rule_id {
                *wins_by_rule.entry(rule.clone()).or_insert(0) += 1;
            }
            for rejection in &result.rejections {
                *rejections_by_reason
                    .entry(rejection.reason.code().to_string())
                    .or_insert(0) += 1;
            }
        }

        let total_reports = results.len();
        Self {
            registry_fingerprint,
            total_reports,
            with_coordinate,
            without_coordinate: total_reports - with_coordinate,
            extraction_rate: (total_reports > 0)
                .then(|| with_coordinate as f64 / total_reports as f64),
            suspect,
            wins_by_rule,
            rejections_by_reason,
        }
    }
}
