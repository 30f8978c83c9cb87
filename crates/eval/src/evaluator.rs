use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::confusion::{ConfusionCounts, Outcome, ScoredPair};
use crate::labels::GroundTruthLabel;
use crate::metrics::Metrics;
use crate::stratify::{CrossTab, Dimension, ReliabilityComparison, Stratification};
use extract::{CanonicalCoordinate, ConfigurationError, ExtractionResult, ReportKeys, Validity};
use ingest::Reliability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "FP")]
    FalsePositive,
    #[serde(rename = "FN")]
    FalseNegative,
}

impl ErrorKind {
    pub fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::FalsePositive => Some(ErrorKind::FalsePositive),
            Outcome::FalseNegative => Some(ErrorKind::FalseNegative),
            Outcome::TruePositive | Outcome::TrueNegative => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FalsePositive => "FP",
            ErrorKind::FalseNegative => "FN",
        }
    }
}

impl From<ErrorKind> for Outcome {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::FalsePositive => Outcome::FalsePositive,
            ErrorKind::FalseNegative => Outcome::FalseNegative,
        }
    }
}

/// A retained FP or FN pair with everything needed to review it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCase {
    pub report_id: String,
    pub kind: ErrorKind,
    /// Found a coordinate, but not the tagged one.
    pub value_mismatch: bool,
    pub raw_span: Option<String>,
    pub predicted: Option<CanonicalCoordinate>,
    pub expected: Option<CanonicalCoordinate>,
    pub rule_id: Option<String>,
    pub validity: Validity,
    #[serde(flatten)]
    pub keys: ReportKeys,
}

impl ErrorCase {
    fn from_pair(pair: &ScoredPair<'_>) -> Option<Self> {
        let kind = ErrorKind::from_outcome(pair.outcome())?;
        let prediction = pair.prediction;
        Some(Self {
            report_id: prediction.report_id.clone(),
            kind,
            value_mismatch: pair.classification.value_mismatch,
            raw_span: prediction.raw_span.clone(),
            predicted: prediction.value.clone(),
            expected: pair.label.true_value.clone(),
            rule_id: prediction.matched_rule_id.clone(),
            validity: prediction.validity,
            keys: prediction.keys.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub total: usize,
    pub confusion: ConfusionCounts,
    pub metrics: Metrics,
    pub stratified: Vec<Stratification>,
    pub cross_tab: CrossTab,
    pub reliability_comparison: ReliabilityComparison,
    pub errors: Vec<ErrorCase>,
}

impl EvaluationReport {
    pub fn stratification(&self, dimension: Dimension) -> Option<&Stratification> {
        self.stratified.iter().find(|s| s.dimension == dimension)
    }

    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &ErrorCase> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

/// Scores extraction results against a labeled subset.
#[derive(Debug, Clone)]
pub struct Evaluator {
    dimensions: Vec<Dimension>,
    low_reliability: Reliability,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            dimensions: Dimension::ALL.to_vec(),
            low_reliability: Reliability::parse("D1"),
        }
    }
}

impl Evaluator {
    pub fn new(low_reliability: Reliability) -> Self {
        Self { low_reliability, ..Self::default() }
    }

    pub fn with_dimensions(mut self, dimensions: &[Dimension]) -> Self {
        self.dimensions = dimensions.to_vec();
        self
    }

    /// Join on report id, classify each pair, then fold into the overall and
    /// per-dimension counts. Fails if the labels cannot be joined one-to-one.
    pub fn evaluate(
        &self,
        predictions: &[ExtractionResult],
        labels: &[GroundTruthLabel],
    ) -> Result<EvaluationReport, ConfigurationError> {
        let pairs = join(predictions, labels)
            .inspect_err(|e| tracing::error!(error = %e, "predictions and labels do not join"))?;

        let confusion: ConfusionCounts = pairs.iter().map(ScoredPair::outcome).collect();
        let stratified: Vec<Stratification> = self
            .dimensions
            .iter()
            .map(|dimension| Stratification::fold(*dimension, &pairs))
            .collect();

        for strat in stratified.iter().filter(|s| !s.is_partition_of(&confusion)) {
            tracing::error!(
                dimension = ?strat.dimension,
                strata = ?strat.total(),
                overall = ?confusion,
                "strata do not sum to the overall counts"
            );
        }

        let errors: Vec<ErrorCase> = pairs.iter().filter_map(ErrorCase::from_pair).collect();
        let report = EvaluationReport {
            run_id: Uuid::new_v4(),
            total: pairs.len(),
            metrics: confusion.metrics(),
            confusion,
            stratified,
            cross_tab: CrossTab::from_pairs(&pairs),
            reliability_comparison: ReliabilityComparison::from_pairs(&pairs, &self.low_reliability),
            errors,
        };

        tracing::info!(
            run_id = %report.run_id,
            labeled = report.total,
            tp = confusion.tp,
            fp = confusion.fp,
            tn = confusion.tn,
            fn_ = confusion.fn_,
            accuracy = %report.metrics.accuracy,
            f1 = %report.metrics.f1,
            "evaluation finished"
        );

        Ok(report)
    }
}

/// Pair every label with its prediction. Predictions without a label are
/// simply not part of the labeled subset.
fn join<'a>(
    predictions: &'a [ExtractionResult],
    labels: &'a [GroundTruthLabel],
) -> Result<Vec<ScoredPair<'a>>, ConfigurationError> {
    let mut by_id: HashMap<&str, &ExtractionResult> = HashMap::with_capacity(predictions.len());
    for prediction in predictions {
        if by_id.insert(prediction.report_id.as_str(), prediction).is_some() {
            return Err(ConfigurationError::DuplicatePrediction(prediction.report_id.clone()));
        }
    }

    let mut seen = HashSet::with_capacity(labels.len());
    let mut pairs = Vec::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.report_id.as_str()) {
            return Err(ConfigurationError::DuplicateLabel(label.report_id.clone()));
        }
        let prediction = by_id
            .get(label.report_id.as_str())
            .copied()
            .ok_or_else(|| ConfigurationError::MissingPrediction(label.report_id.clone()))?;
        pairs.push(ScoredPair::new(prediction, label));
    }

    let unlabeled = predictions.len() - pairs.len();
    if unlabeled > 0 {
        tracing::debug!(unlabeled, "predictions outside the labeled subset");
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{DigitBounds, Extractor};
    use ingest::ReportRecord;

    fn record(id: usize, reliability: &str, content: &str) -> ReportRecord {
        let sector = if id % 2 == 0 { "צפון" } else { "דרום" };
        ReportRecord::new(id.to_string(), sector, "רגיל", reliability, content)
    }

    /// 45 TP, 5 FP (all D4), 45 TN, 5 FN.
    fn scenario() -> (Vec<ExtractionResult>, Vec<GroundTruthLabel>) {
        let extractor = Extractor::with_defaults().unwrap();
        let mut records = Vec::new();
        let mut labels = Vec::new();

        for id in 0..100 {
            let (reliability, content, label) = match id {
                0..45 => ("A1", "נ.צ 123456", GroundTruthLabel::presence_only(id.to_string())),
                45..50 => ("D4", "נ.צ 654321", GroundTruthLabel::negative(id.to_string())),
                50..95 => ("B2", "שקט באזור", GroundTruthLabel::negative(id.to_string())),
                _ => ("C3", "אין מיקום", GroundTruthLabel::presence_only(id.to_string())),
            };
            records.push(record(id, reliability, content));
            labels.push(label);
        }

        (extractor.extract_batch(&records), labels)
    }

    #[test]
    fn test_hundred_row_scenario() {
        let (predictions, labels) = scenario();
        let report = Evaluator::default().evaluate(&predictions, &labels).unwrap();

        assert_eq!(report.total, 100);
        assert_eq!(report.confusion, ConfusionCounts::new(45, 5, 45, 5));
        for (name, metric) in report.metrics.named() {
            assert!((metric.value().unwrap() - 0.90).abs() < 1e-9, "{name}");
        }
        assert_eq!(report.errors.len(), 10);
        assert_eq!(report.errors_of(ErrorKind::FalsePositive).count(), 5);
    }

    #[test]
    fn test_all_false_positives_land_in_d4() {
        let (predictions, labels) = scenario();
        let report = Evaluator::default().evaluate(&predictions, &labels).unwrap();
        let by_reliability = report.stratification(Dimension::Reliability).unwrap();

        for stratum in &by_reliability.strata {
            let expected = if stratum.value == "D4" { report.confusion.fp } else { 0 };
            assert_eq!(stratum.counts.fp, expected, "{}", stratum.value);
        }
    }

    #[test]
    fn test_every_dimension_partitions() {
        let (predictions, labels) = scenario();
        let report = Evaluator::default().evaluate(&predictions, &labels).unwrap();

        assert_eq!(report.stratified.len(), Dimension::ALL.len());
        for strat in &report.stratified {
            assert!(strat.is_partition_of(&report.confusion), "{:?}", strat.dimension);
        }
        assert_eq!(report.cross_tab.total(), report.errors.len());
    }

    #[test]
    fn test_low_reliability_comparison() {
        let (predictions, labels) = scenario();
        let report = Evaluator::default().evaluate(&predictions, &labels).unwrap();
        let cmp = &report.reliability_comparison;

        assert_eq!(cmp.threshold, "D1");
        assert_eq!((cmp.low.reports, cmp.low.errors), (5, 5));
        assert_eq!((cmp.rest.reports, cmp.rest.errors), (95, 5));
    }

    #[test]
    fn test_value_mismatch_is_a_flagged_false_positive() {
        let extractor = Extractor::with_defaults().unwrap();
        let predictions = vec![extractor.extract(&record(1, "A1", "נ.צ 123/456"))];
        let truth = CanonicalCoordinate::try_new(&["999", "888"], None, &DigitBounds::default()).unwrap();
        let labels = vec![GroundTruthLabel::positive("1", truth.clone())];

        let report = Evaluator::default().evaluate(&predictions, &labels).unwrap();
        assert_eq!(report.confusion, ConfusionCounts::new(0, 1, 0, 0));

        let case = &report.errors[0];
        assert_eq!(case.kind, ErrorKind::FalsePositive);
        assert!(case.value_mismatch);
        assert_eq!(case.expected, Some(truth));
        assert_eq!(case.rule_id.as_deref(), Some("grid-ref-separated"));
        assert_eq!(case.raw_span.as_deref(), Some("נ.צ 123/456"));
    }

    #[test]
    fn test_join_failures_are_configuration_errors() {
        let extractor = Extractor::with_defaults().unwrap();
        let one = extractor.extract(&record(1, "A1", "שקט"));
        let evaluator = Evaluator::default();

        let err = evaluator
            .evaluate(&[one.clone()], &[GroundTruthLabel::negative("2")])
            .unwrap_err();
        assert_eq!(err, ConfigurationError::MissingPrediction("2".into()));

        let err = evaluator
            .evaluate(&[one.clone(), one.clone()], &[GroundTruthLabel::negative("1")])
            .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicatePrediction("1".into()));

        let err = evaluator
            .evaluate(
                &[one],
                &[GroundTruthLabel::negative("1"), GroundTruthLabel::negative("1")],
            )
            .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateLabel("1".into()));
    }

    #[test]
    fn test_empty_labels_give_undefined_metrics() {
        let report = Evaluator::default().evaluate(&[], &[]).unwrap();
        assert_eq!(report.total, 0);
        assert!(!report.metrics.accuracy.is_defined());
        assert!(!report.metrics.f1.is_defined());
        assert!(report.stratified.iter().all(|s| s.strata.is_empty()));
    }
}
