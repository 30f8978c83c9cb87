//! Per-category breakdowns of the confusion set.
//!
//! Each dimension is an independent fold over every scored pair, keyed by
//! the pair's category value, so the strata of one dimension always add up to
//! the overall counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::confusion::{ConfusionCounts, Outcome, ScoredPair};
use crate::metrics::{Metric, Metrics};
use extract::{ExtractionResult, Validity};
use ingest::Reliability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Sector,
    Urgency,
    Reliability,
    Validity,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Sector,
        Dimension::Urgency,
        Dimension::Reliability,
        Dimension::Validity,
    ];

    pub fn key(&self, prediction: &ExtractionResult) -> String {
        match self {
            Dimension::Sector => prediction.keys.sector.clone(),
            Dimension::Urgency => prediction.keys.urgency.clone(),
            Dimension::Reliability => prediction.keys.reliability.to_string(),
            Dimension::Validity => match prediction.validity {
                Validity::Valid => "valid".to_string(),
                Validity::Suspect => "suspect".to_string(),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Sector => "Sector",
            Dimension::Urgency => "Urgency",
            Dimension::Reliability => "Reliability",
            Dimension::Validity => "Validity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stratum {
    pub value: String,
    pub counts: ConfusionCounts,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stratification {
    pub dimension: Dimension,
    pub strata: Vec<Stratum>,
}

impl Stratification {
    pub fn fold(dimension: Dimension, pairs: &[ScoredPair<'_>]) -> Self {
        let by_value = pairs.iter().fold(
            BTreeMap::<String, ConfusionCounts>::new(),
            |mut acc, pair| {
                acc.entry(dimension.key(pair.prediction))
                    .or_default()
                    .record(pair.outcome());
                acc
            },
        );

        let mut strata: Vec<Stratum> = by_value
            .into_iter()
            .map(|(value, counts)| Stratum { metrics: counts.metrics(), value, counts })
            .collect();

        if dimension == Dimension::Reliability {
            strata.sort_by_cached_key(|s| Reliability::parse(&s.value));
        }

        Self { dimension, strata }
    }

    pub fn total(&self) -> ConfusionCounts {
        self.strata
            .iter()
            .fold(ConfusionCounts::default(), |acc, s| acc + s.counts)
    }

    pub fn is_partition_of(&self, overall: &ConfusionCounts) -> bool {
        self.total() == *overall
    }

    pub fn get(&self, value: &str) -> Option<&Stratum> {
        self.strata.iter().find(|s| s.value == value)
    }

    /// Stratum with the most errors; the earliest one on ties.
    pub fn worst(&self) -> Option<&Stratum> {
        self.strata.iter().rev().max_by_key(|s| s.counts.errors())
    }

    /// Stratum with the fewest errors; the earliest one on ties.
    pub fn best(&self) -> Option<&Stratum> {
        self.strata.iter().min_by_key(|s| s.counts.errors())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTally {
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ErrorTally {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::FalsePositive => self.fp += 1,
            Outcome::FalseNegative => self.fn_ += 1,
            Outcome::TruePositive | Outcome::TrueNegative => {}
        }
    }

    pub fn total(&self) -> usize {
        self.fp + self.fn_
    }
}

/// Sector × reliability tally of error cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossTab {
    pub cells: BTreeMap<String, BTreeMap<String, ErrorTally>>,
}

impl CrossTab {
    pub fn from_pairs(pairs: &[ScoredPair<'_>]) -> Self {
        let mut cells: BTreeMap<String, BTreeMap<String, ErrorTally>> = BTreeMap::new();
        for pair in pairs.iter().filter(|p| p.outcome().is_error()) {
            cells
                .entry(Dimension::Sector.key(pair.prediction))
                .or_default()
                .entry(Dimension::Reliability.key(pair.prediction))
                .or_default()
                .record(pair.outcome());
        }
        Self { cells }
    }

    pub fn get(&self, sector: &str, reliability: &str) -> ErrorTally {
        self.cells
            .get(sector)
            .and_then(|row| row.get(reliability))
            .copied()
            .unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.cells
            .values()
            .flat_map(|row| row.values())
            .map(ErrorTally::total)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupErrorRate {
    pub reports: usize,
    pub errors: usize,
    pub error_rate: Metric,
}

impl GroupErrorRate {
    fn from_counts(counts: &ConfusionCounts) -> Self {
        Self {
            reports: counts.total(),
            errors: counts.errors(),
            error_rate: Metric::ratio(counts.errors(), counts.total()),
        }
    }
}

/// Error rate of low-reliability sources against everyone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityComparison {
    pub threshold: String,
    pub low: GroupErrorRate,
    pub rest: GroupErrorRate,
}

impl ReliabilityComparison {
    pub fn from_pairs(pairs: &[ScoredPair<'_>], threshold: &Reliability) -> Self {
        let (low, rest) = pairs.iter().fold(
            (ConfusionCounts::default(), ConfusionCounts::default()),
            |(mut low, mut rest), pair| {
                if pair.prediction.keys.reliability.ranks_at_or_below(threshold) {
                    low.record(pair.outcome());
                } else {
                    rest.record(pair.outcome());
                }
                (low, rest)
            },
        );

        Self {
            threshold: threshold.to_string(),
            low: GroupErrorRate::from_counts(&low),
            rest: GroupErrorRate::from_counts(&rest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::GroundTruthLabel;
    use extract::Extractor;
    use ingest::ReportRecord;

    fn fixture() -> (Vec<extract::ExtractionResult>, Vec<GroundTruthLabel>) {
        let extractor = Extractor::with_defaults().unwrap();
        let rows = [
            ("1", "north", "A1", "נ.צ 123456", true),
            ("2", "north", "D4", "נ.צ 654321", false),
            ("3", "south", "D4", "שקט", true),
            ("4", "south", "B2", "שקט", false),
            ("5", "south", "B2", "נ.צ 111222", true),
        ];

        let mut predictions = Vec::new();
        let mut labels = Vec::new();
        for (id, sector, reliability, content, has) in rows {
            let record = ReportRecord::new(id, sector, "רגיל", reliability, content);
            predictions.push(extractor.extract(&record));
            labels.push(if has {
                GroundTruthLabel::presence_only(id)
            } else {
                GroundTruthLabel::negative(id)
            });
        }
        (predictions, labels)
    }

    fn score<'a>(p: &'a [extract::ExtractionResult], l: &'a [GroundTruthLabel]) -> Vec<ScoredPair<'a>> {
        p.iter().zip(l).map(|(p, l)| ScoredPair::new(p, l)).collect()
    }

    #[test]
    fn test_every_dimension_partitions_the_total() {
        let (p, l) = fixture();
        let pairs = score(&p, &l);
        let overall: ConfusionCounts = pairs.iter().map(|x| x.outcome()).collect();

        for dimension in Dimension::ALL {
            let strat = Stratification::fold(dimension, &pairs);
            assert!(strat.is_partition_of(&overall), "{dimension:?}");
        }
    }

    #[test]
    fn test_sector_strata_and_extremes() {
        let (p, l) = fixture();
        let pairs = score(&p, &l);
        let strat = Stratification::fold(Dimension::Sector, &pairs);

        assert_eq!(strat.get("north").unwrap().counts, ConfusionCounts::new(1, 1, 0, 0));
        assert_eq!(strat.get("south").unwrap().counts, ConfusionCounts::new(1, 0, 1, 1));
        assert_eq!(strat.worst().unwrap().value, "north");
        assert_eq!(strat.best().unwrap().value, "north");
        assert!(strat.get("west").is_none());
    }

    #[test]
    fn test_reliability_strata_follow_grade_order() {
        let (p, l) = fixture();
        let pairs = score(&p, &l);
        let strat = Stratification::fold(Dimension::Reliability, &pairs);

        let order: Vec<&str> = strat.strata.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(order, vec!["A1", "B2", "D4"]);
        assert_eq!(strat.get("D4").unwrap().counts.errors(), 2);
    }

    #[test]
    fn test_cross_tab_and_reliability_comparison() {
        let (p, l) = fixture();
        let pairs = score(&p, &l);

        let tab = CrossTab::from_pairs(&pairs);
        assert_eq!(tab.get("north", "D4"), ErrorTally { fp: 1, fn_: 0 });
        assert_eq!(tab.get("south", "D4"), ErrorTally { fp: 0, fn_: 1 });
        assert_eq!(tab.get("south", "B2"), ErrorTally::default());
        assert_eq!(tab.total(), 2);

        let cmp = ReliabilityComparison::from_pairs(&pairs, &Reliability::parse("D1"));
        assert_eq!(cmp.low.reports, 2);
        assert_eq!(cmp.low.errors, 2);
        assert_eq!(cmp.rest.reports, 3);
        assert_eq!(cmp.rest.errors, 0);
        assert_eq!(cmp.low.error_rate.value(), Some(1.0));
    }
}
