use serde::{Deserialize, Serialize};
use std::fmt;

use crate::confusion::ConfusionCounts;

/// A ratio that is explicitly undefined when its denominator is zero.
/// Serializes as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metric(Option<f64>);

impl Metric {
    pub const UNDEFINED: Metric = Metric(None);

    pub fn ratio(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            Metric::UNDEFINED
        } else {
            Metric(Some(numerator as f64 / denominator as f64))
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn is_defined(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.1}%", v * 100.0),
            None => write!(f, "undefined"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: Metric,
    pub precision: Metric,
    pub recall: Metric,
    pub f1: Metric,
    pub specificity: Metric,
    pub error_rate: Metric,
}

impl Metrics {
    pub fn from_counts(c: &ConfusionCounts) -> Self {
        let precision = Metric::ratio(c.tp, c.tp + c.fp);
        let recall = Metric::ratio(c.tp, c.tp + c.fn_);

        // Harmonic mean; undefined whenever either input is, or both are zero.
        let f1 = match (precision.value(), recall.value()) {
            (Some(p), Some(r)) if p + r > 0.0 => Metric(Some(2.0 * p * r / (p + r))),
            _ => Metric::UNDEFINED,
        };

        Self {
            accuracy: Metric::ratio(c.tp + c.tn, c.total()),
            precision,
            recall,
            f1,
            specificity: Metric::ratio(c.tn, c.tn + c.fp),
            error_rate: Metric::ratio(c.errors(), c.total()),
        }
    }

    pub fn named(&self) -> [(&'static str, Metric); 5] {
        [
            ("Accuracy", self.accuracy),
            ("Precision", self.precision),
            ("Recall", self.recall),
            ("F1", self.f1),
            ("Specificity", self.specificity),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(metric: Metric, expected: f64) -> bool {
        metric.value().is_some_and(|v| (v - expected).abs() < 1e-9)
    }

    #[test]
    fn test_balanced_ninety_percent() {
        let m = ConfusionCounts::new(45, 5, 45, 5).metrics();
        assert!(close(m.accuracy, 0.90));
        assert!(close(m.precision, 0.90));
        assert!(close(m.recall, 0.90));
        assert!(close(m.f1, 0.90));
        assert!(close(m.specificity, 0.90));
        assert!(close(m.error_rate, 0.10));
    }

    #[test]
    fn test_zero_denominators_are_undefined() {
        let m = ConfusionCounts::new(0, 0, 7, 3).metrics();
        assert_eq!(m.precision, Metric::UNDEFINED);
        assert!(close(m.recall, 0.0));
        assert_eq!(m.f1, Metric::UNDEFINED);
        assert!(close(m.accuracy, 0.7));

        let empty = ConfusionCounts::default().metrics();
        assert!(!empty.accuracy.is_defined());
        assert!(!empty.specificity.is_defined());
        assert_eq!(empty.accuracy.to_string(), "undefined");
        assert_eq!(serde_json::to_value(empty.accuracy).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_f1_undefined_when_precision_and_recall_are_zero() {
        let m = ConfusionCounts::new(0, 4, 0, 6).metrics();
        assert!(close(m.precision, 0.0));
        assert!(close(m.recall, 0.0));
        assert_eq!(m.f1, Metric::UNDEFINED);
    }

    #[test]
    fn test_metrics_stay_in_unit_interval() {
        for tp in 0..5 {
            for fp in 0..5 {
                for tn in 0..5 {
                    for fn_ in 0..5 {
                        let m = ConfusionCounts::new(tp, fp, tn, fn_).metrics();
                        for (name, metric) in m.named() {
                            if let Some(v) = metric.value() {
                                assert!((0.0..=1.0).contains(&v), "{name} = {v}");
                            }
                        }
                    }
                }
            }
        }
    }
}
