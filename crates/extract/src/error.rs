use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal, startup-time problems: a malformed rule set, or prediction and
/// label sets that do not join one-to-one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("rule id must not be empty")]
    EmptyRuleId,

    #[error("duplicate rule id {0:?}")]
    DuplicateRule(String),

    #[error("rule {rule_id:?}: anchor set is empty or contains a blank anchor")]
    EmptyAnchor { rule_id: String },

    #[error("rule {rule_id:?}: {reason}")]
    InvalidGrammar { rule_id: String, reason: String },

    #[error("rule {rule_id:?}: pattern failed to compile: {message}")]
    Pattern { rule_id: String, message: String },

    #[error("digit bounds {min}..={max} are not admissible")]
    DigitBounds { min: usize, max: usize },

    #[error("glyph table maps {glyph:?} to {target:?}, which is not canonical")]
    GlyphTable { glyph: char, target: char },

    #[error("reliability threshold {0:?} is not a recognised grade")]
    ReliabilityThreshold(String),

    #[error("failed to parse extraction config: {0}")]
    Parse(String),

    #[error("label for report {0:?} has no matching prediction")]
    MissingPrediction(String),

    #[error("report {0:?} has more than one prediction")]
    DuplicatePrediction(String),

    #[error("report {0:?} is labeled more than once")]
    DuplicateLabel(String),
}

/// Why a matched span did not normalize into a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("no coordinate digits in span")]
    EmptyRegion,

    #[error("non-numeric glyph {glyph:?}")]
    NonNumeric { glyph: char },

    #[error("expected {expected} axes, found {found}")]
    MissingAxis { expected: usize, found: usize },

    #[error("digit width {width} outside {min}..={max}")]
    DigitWidth {
        axis: Option<usize>,
        width: usize,
        min: usize,
        max: usize,
    },
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::EmptyRegion => "empty_region",
            RejectionReason::NonNumeric { .. } => "non_numeric",
            RejectionReason::MissingAxis { .. } => "missing_axis",
            RejectionReason::DigitWidth { .. } => "digit_width",
        }
    }
}

/// A candidate span that failed normalization. Recorded on the extraction
/// result for diagnostics, never escalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("rule {rule_id}: {reason} in {span:?}")]
pub struct Rejection {
    pub rule_id: String,
    pub span: String,
    pub start: usize,
    pub reason: RejectionReason,
}
