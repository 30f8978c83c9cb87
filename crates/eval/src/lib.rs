pub mod confusion;
pub mod error_report;
pub mod evaluator;
pub mod labels;
pub mod metrics;
pub mod plots;
pub mod stratify;

pub use confusion::{Classification, ConfusionCounts, Outcome, ScoredPair, classify};
pub use error_report::{ErrorRow, ErrorSheet};
pub use evaluator::{ErrorCase, ErrorKind, EvaluationReport, Evaluator};
pub use labels::{GroundTruthLabel, LabelRow, load_labels};
pub use metrics::{Metric, Metrics};
pub use plots::generate_plots;
pub use stratify::{
    CrossTab, Dimension, ErrorTally, GroupErrorRate, ReliabilityComparison, Stratification, Stratum,
};
