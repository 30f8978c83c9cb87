use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

use crate::labels::GroundTruthLabel;
use crate::metrics::Metrics;
use extract::ExtractionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "TP")]
    TruePositive,
    #[serde(rename = "FP")]
    FalsePositive,
    #[serde(rename = "TN")]
    TrueNegative,
    #[serde(rename = "FN")]
    FalseNegative,
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::FalsePositive | Outcome::FalseNegative)
    }
}

/// The outcome of one prediction/label pair, plus whether a positive
/// prediction disagreed with the tagged value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    pub value_mismatch: bool,
}

/// Place a pair in exactly one confusion cell.
///
/// A found coordinate that does not match the tagged one counts as a false
/// positive only, flagged as a mismatch.
pub fn classify(prediction: &ExtractionResult, label: &GroundTruthLabel) -> Classification {
    let (outcome, value_mismatch) = match (label.has_coordinate, prediction.found) {
        (true, true) => {
            let agrees = match (&label.true_value, &prediction.value) {
                (None, _) => true,
                (Some(truth), Some(predicted)) => truth.same_location(predicted),
                (Some(_), None) => false,
            };
            if agrees {
                (Outcome::TruePositive, false)
            } else {
                (Outcome::FalsePositive, true)
            }
        }
        (false, true) => (Outcome::FalsePositive, false),
        (true, false) => (Outcome::FalseNegative, false),
        (false, false) => (Outcome::TrueNegative, false),
    };
    Classification { outcome, value_mismatch }
}

/// One joined prediction/label pair and where it landed. Derived fresh on
/// every evaluation run.
#[derive(Debug, Clone, Copy)]
pub struct ScoredPair<'a> {
    pub prediction: &'a ExtractionResult,
    pub label: &'a GroundTruthLabel,
    pub classification: Classification,
}

impl<'a> ScoredPair<'a> {
    pub fn new(prediction: &'a ExtractionResult, label: &'a GroundTruthLabel) -> Self {
        Self { prediction, label, classification: classify(prediction, label) }
    }

    pub fn outcome(&self) -> Outcome {
        self.classification.outcome
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn new(tp: usize, fp: usize, tn: usize, fn_: usize) -> Self {
        Self { tp, fp, tn, fn_ }
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::TruePositive => self.tp += 1,
            Outcome::FalsePositive => self.fp += 1,
            Outcome::TrueNegative => self.tn += 1,
            Outcome::FalseNegative => self.fn_ += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn errors(&self) -> usize {
        self.fp + self.fn_
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::from_counts(self)
    }
}

impl FromIterator<Outcome> for ConfusionCounts {
    fn from_iter<I: IntoIterator<Item = Outcome>>(iter: I) -> Self {
        let mut counts = ConfusionCounts::default();
        for outcome in iter {
            counts.record(outcome);
        }
        counts
    }
}

impl Add for ConfusionCounts {
    type Output = ConfusionCounts;

    fn add(self, other: ConfusionCounts) -> ConfusionCounts {
        ConfusionCounts {
            tp: self.tp + other.tp,
            fp: self.fp + other.fp,
            tn: self.tn + other.tn,
            fn_: self.fn_ + other.fn_,
        }
    }
}

impl AddAssign for ConfusionCounts {
    fn add_assign(&mut self, other: ConfusionCounts) {
        *self = *self + other;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{Extractor, Normalizer};
    use ingest::ReportRecord;

    fn predict(content: &str) -> ExtractionResult {
        let extractor = Extractor::with_defaults().unwrap();
        extractor.extract(&ReportRecord::new("r", "s", "u", "A1", content))
    }

    #[test]
    fn test_each_cell() {
        let n = Normalizer::default();
        let truth = GroundTruthLabel::positive("r", n.parse_value("123456").unwrap());

        let hit = classify(&predict("נ.צ 123/456"), &truth);
        assert_eq!(hit, Classification { outcome: Outcome::TruePositive, value_mismatch: false });

        let miss = classify(&predict("אין נתונים"), &truth);
        assert_eq!(miss.outcome, Outcome::FalseNegative);

        let spurious = classify(&predict("נ.צ 123456"), &GroundTruthLabel::negative("r"));
        assert_eq!(spurious, Classification { outcome: Outcome::FalsePositive, value_mismatch: false });

        let quiet = classify(&predict("אין נתונים"), &GroundTruthLabel::negative("r"));
        assert_eq!(quiet.outcome, Outcome::TrueNegative);
    }

    #[test]
    fn test_wrong_value_is_a_flagged_false_positive() {
        let n = Normalizer::default();
        let truth = GroundTruthLabel::positive("r", n.parse_value("111222").unwrap());

        let result = classify(&predict("נ.צ 123456"), &truth);
        assert_eq!(result, Classification { outcome: Outcome::FalsePositive, value_mismatch: true });
    }

    #[test]
    fn test_presence_only_label_accepts_any_value() {
        let result = classify(&predict("נ.צ 123456"), &GroundTruthLabel::presence_only("r"));
        assert_eq!(result.outcome, Outcome::TruePositive);
    }

    #[test]
    fn test_counts() {
        let counts: ConfusionCounts = [
            Outcome::TruePositive,
            Outcome::TruePositive,
            Outcome::FalseNegative,
            Outcome::TrueNegative,
        ]
        .into_iter()
        .collect();

        assert_eq!(counts, ConfusionCounts::new(2, 0, 1, 1));
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.errors(), 1);
        assert_eq!(counts + ConfusionCounts::new(0, 3, 0, 0), ConfusionCounts::new(2, 3, 1, 1));
        assert_eq!(serde_json::to_value(counts).unwrap()["fn"], 1);
    }
}
