pub mod config;
pub mod coordinate;
pub mod error;
pub mod normalizer;
pub mod pattern;
pub mod schema;

pub use config::{ExtractionConfig, default_rules};
pub use coordinate::{CanonicalCoordinate, DigitBounds, GridComponent};
pub use error::{ConfigurationError, Rejection, RejectionReason};
pub use normalizer::{GlyphTable, Normalizer};
pub use pattern::{
    AxisOrder, Candidate, CoordinateForm, PatternRegistry, PatternRule, PrecisionTier, TokenGrammar,
};
pub use schema::{ExtractionResult, ExtractionSummary, ReportKeys, Validity};

use ingest::{Reliability, ReportRecord};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::HashSet;

/// Scans report text against the pattern registry and reduces the matches to
/// at most one coordinate per report.
///
/// Holds no per-report state: `extract` can be called from any number of
/// threads on a shared reference.
pub struct Extractor {
    registry: PatternRegistry,
    normalizer: Normalizer,
    suspect_from: Reliability,
}

impl Extractor {
    /// Build the registry from configuration. Any malformed rule or setting
    /// is returned as a [`ConfigurationError`] and nothing is built.
    pub fn new(config: &ExtractionConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let mut registry = PatternRegistry::new(config.glyphs.clone());
        for rule in &config.rules {
            registry.register(rule.clone())?;
        }

        tracing::info!(
            rules = registry.len(),
            fingerprint = %registry.fingerprint(),
            "pattern registry loaded"
        );

        Ok(Self {
            registry,
            normalizer: Normalizer::new(config.digits, config.glyphs.clone()),
            suspect_from: config.suspect_threshold()?,
        })
    }

    pub fn with_defaults() -> Result<Self, ConfigurationError> {
        Self::new(&ExtractionConfig::default())
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Extract the coordinate mention of one report.
    ///
    /// Candidates are ranked by priority (highest first), then position
    /// (earliest first), then registration order; the first one that
    /// normalizes wins. Failing to find anything is a normal outcome.
    pub fn extract(&self, report: &ReportRecord) -> ExtractionResult {
        let mut candidates = self.registry.match_candidates(&report.content);
        candidates.sort_by_key(|c| (Reverse(c.priority), c.start, c.rule_index));

        let mut winner = None;
        let mut rejections = Vec::new();
        let mut rejected_regions = HashSet::new();

        for candidate in &candidates {
            let Some(rule) = self.registry.rule(candidate.rule_index) else {
                continue;
            };
            match self.normalizer.normalize(candidate, &rule.grammar) {
                Ok(value) => {
                    if winner.is_none() {
                        winner = Some((candidate, rule, value));
                    }
                }
                Err(rejection) => {
                    if rejected_regions.insert(candidate.coordinate_range()) {
                        tracing::debug!(
                            report = %report.report_id,
                            rule = %rejection.rule_id,
                            reason = %rejection.reason,
                            "candidate rejected"
                        );
                        rejections.push(rejection);
                    }
                }
            }
        }

        let low_reliability = report.reliability.ranks_at_or_below(&self.suspect_from);
        let keys = ReportKeys::from(report);

        match winner {
            Some((candidate, rule, value)) => {
                let validity = if rule.precision == PrecisionTier::Loose || low_reliability {
                    Validity::Suspect
                } else {
                    Validity::Valid
                };
                ExtractionResult {
                    report_id: report.report_id.clone(),
                    found: true,
                    value: Some(value),
                    matched_rule_id: Some(rule.id.clone()),
                    raw_span: Some(candidate.span.clone()),
                    validity,
                    keys,
                    rejections,
                }
            }
            None => ExtractionResult {
                report_id: report.report_id.clone(),
                found: false,
                value: None,
                matched_rule_id: None,
                raw_span: None,
                validity: if low_reliability { Validity::Suspect } else { Validity::Valid },
                keys,
                rejections,
            },
        }
    }

    /// Extract every report in parallel. Output order follows input order,
    /// though consumers join on `report_id`.
    pub fn extract_batch(&self, reports: &[ReportRecord]) -> Vec<ExtractionResult> {
        let results: Vec<ExtractionResult> =
            reports.par_iter().map(|report| self.extract(report)).collect();

        let found = results.iter().filter(|r| r.found).count();
        tracing::info!(reports = results.len(), found, "batch extraction finished");
        results
    }

    pub fn summarize(&self, results: &[ExtractionResult]) -> ExtractionSummary {
        ExtractionSummary::from_results(results, self.registry.fingerprint())
    }
}
