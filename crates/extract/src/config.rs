use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::coordinate::DigitBounds;
use crate::error::ConfigurationError;
use crate::normalizer::GlyphTable;
use crate::pattern::{PatternRule, PrecisionTier, TokenGrammar};
use ingest::Reliability;

const GRID_REFERENCE_ANCHORS: &[&str] = &["נ.צ.", "נ.צ", "נ\"צ", "נ״צ", "נ צ", "נצ"];
const NAMED_POINT_ANCHORS: &[&str] = &["נקודת ציון", "נק\"צ", "נק״צ", "נק'צ", "נק׳צ"];
const COORDINATE_ANCHORS: &[&str] = &["קואורדינטות", "קואורדינטה", "קורדינטות", "קורדינטה"];
const SEPARATORS: &[char] = &['/', '-', ','];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub digits: DigitBounds,
    pub glyphs: GlyphTable,
    /// Reports whose reliability is this grade or worse are flagged suspect.
    pub suspect_reliability_from: String,
    pub rules: Vec<PatternRule>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            digits: DigitBounds::default(),
            glyphs: GlyphTable::default(),
            suspect_reliability_from: "D1".to_string(),
            rules: default_rules(),
        }
    }
}

impl ExtractionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigurationError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Everything except the rules themselves, which the registry checks as
    /// they are registered.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.digits.is_admissible() {
            return Err(ConfigurationError::DigitBounds {
                min: self.digits.min,
                max: self.digits.max,
            });
        }
        self.glyphs.validate()?;
        self.suspect_threshold()?;
        Ok(())
    }

    pub fn suspect_threshold(&self) -> Result<Reliability, ConfigurationError> {
        match Reliability::parse(&self.suspect_reliability_from) {
            Reliability::Unrated(raw) => Err(ConfigurationError::ReliabilityThreshold(raw)),
            grade => Ok(grade),
        }
    }
}

/// The built-in Hebrew rule set.
pub fn default_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new("grid-ref", GRID_REFERENCE_ANCHORS, TokenGrammar::default(), 100)
            .with_precision(PrecisionTier::Strict),
        PatternRule::new(
            "grid-ref-separated",
            GRID_REFERENCE_ANCHORS,
            TokenGrammar::separated(SEPARATORS),
            95,
        )
        .with_precision(PrecisionTier::Strict),
        PatternRule::new("named-point", NAMED_POINT_ANCHORS, TokenGrammar::default(), 90)
            .with_precision(PrecisionTier::Strict),
        PatternRule::new(
            "named-point-separated",
            NAMED_POINT_ANCHORS,
            TokenGrammar::separated(SEPARATORS),
            85,
        )
        .with_precision(PrecisionTier::Strict),
        PatternRule::new("coordinates", COORDINATE_ANCHORS, TokenGrammar::default().with_gap(1), 60),
        PatternRule::new("location", &["מיקום"], TokenGrammar::default().with_gap(2), 40)
            .with_precision(PrecisionTier::Loose),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.suspect_threshold().unwrap().to_string(), "D1");
        assert_eq!(config.rules.len(), 6);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config = ExtractionConfig::from_json_str(
            r#"{
                "digits": {"min": 4, "max": 4},
                "rules": [
                    {"id": "grid", "anchors": ["נ.צ"], "priority": 10},
                    {"id": "grid-sep", "anchors": ["נ.צ"], "priority": 5, "precision": "loose",
                     "grammar": {"form": {"kind": "separated", "separators": ["/"]}, "axis_order": "northing_first"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.digits, DigitBounds::new(4, 4));
        assert_eq!(config.suspect_reliability_from, "D1");
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].grammar, TokenGrammar::default());
        assert_eq!(config.rules[1].precision, PrecisionTier::Loose);
        assert_eq!(config.rules[1].grammar.separators(), &['/']);
    }

    #[test]
    fn test_invalid_settings() {
        let mut config = ExtractionConfig::default();
        config.digits = DigitBounds::new(5, 3);
        assert!(matches!(config.validate(), Err(ConfigurationError::DigitBounds { .. })));

        let mut config = ExtractionConfig::default();
        config.suspect_reliability_from = "Q".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::ReliabilityThreshold("Q".to_string()))
        );

        assert!(matches!(
            ExtractionConfig::from_json_str("{\"rules\": 3}"),
            Err(ConfigurationError::Parse(_))
        ));
    }
}
