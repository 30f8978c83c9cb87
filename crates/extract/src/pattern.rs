//! Declarative extraction rules and the registry that compiles them.
//!
//! A rule pairs a set of synonymous anchor terms with a token grammar that
//! says how the coordinate is written after the anchor. Every rule goes
//! through the same compiled-regex path; the registry reports every match and
//! leaves conflict resolution to the extractor.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::Range;

use crate::coordinate::CanonicalCoordinate;
use crate::error::ConfigurationError;
use crate::normalizer::GlyphTable;

/// Single-letter Hebrew prefixes (and, the, in, as, to, from, that) that
/// attach directly to an anchor word.
const HEBREW_PREFIXES: &str = "והבכלמש";

/// Punctuation allowed between an anchor and the coordinate.
const FILLER: &str = r"[\s:=\-–.]";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionTier {
    Strict,
    #[default]
    Standard,
    /// Permissive rules; anything they produce is flagged suspect.
    Loose,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinateForm {
    /// One digit run split evenly across the axes ("123456").
    Contiguous,
    /// Axes written apart, joined by one of `separators` ("123/456").
    Separated { separators: Vec<char> },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrder {
    #[default]
    EastingFirst,
    NorthingFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenGrammar {
    pub form: CoordinateForm,
    pub axes: usize,
    /// Non-numeric tokens tolerated between anchor and coordinate.
    pub max_gap_tokens: usize,
    pub axis_order: AxisOrder,
    /// Accept a trailing parenthesized sub-grid qualifier, e.g. "(א)".
    pub qualifier: bool,
}

impl Default for TokenGrammar {
    fn default() -> Self {
        Self {
            form: CoordinateForm::Contiguous,
            axes: 2,
            max_gap_tokens: 0,
            axis_order: AxisOrder::EastingFirst,
            qualifier: true,
        }
    }
}

impl TokenGrammar {
    pub const MAX_AXES: usize = 4;
    pub const MAX_GAP_TOKENS: usize = 8;

    pub fn separated(separators: &[char]) -> Self {
        Self {
            form: CoordinateForm::Separated { separators: separators.to_vec() },
            ..Self::default()
        }
    }

    pub fn with_gap(mut self, tokens: usize) -> Self {
        self.max_gap_tokens = tokens;
        self
    }

    pub fn with_axis_order(mut self, order: AxisOrder) -> Self {
        self.axis_order = order;
        self
    }

    pub fn separators(&self) -> &[char] {
        match &self.form {
            CoordinateForm::Contiguous => &[],
            CoordinateForm::Separated { separators } => separators,
        }
    }

    fn validate(&self, glyphs: &GlyphTable) -> Result<(), String> {
        if !(2..=Self::MAX_AXES).contains(&self.axes) {
            return Err(format!("axes must be within 2..={}, got {}", Self::MAX_AXES, self.axes));
        }
        if self.max_gap_tokens > Self::MAX_GAP_TOKENS {
            return Err(format!(
                "max_gap_tokens must be at most {}, got {}",
                Self::MAX_GAP_TOKENS,
                self.max_gap_tokens
            ));
        }
        if let CoordinateForm::Separated { separators } = &self.form {
            if separators.is_empty() {
                return Err("separated form needs at least one separator".to_string());
            }
            for &sep in separators {
                if sep.is_alphanumeric() || sep == '(' || sep == ')' {
                    return Err(format!("{sep:?} cannot be used as a separator"));
                }
                if glyphs.canonical_separator(sep) != sep {
                    return Err(format!("separator {sep:?} is a glyph variant, list its canonical form"));
                }
            }
        }
        Ok(())
    }

    fn coordinate_pattern(&self, glyphs: &GlyphTable) -> String {
        match &self.form {
            CoordinateForm::Contiguous => r"\d+".to_string(),
            CoordinateForm::Separated { separators } => {
                let class: String = separators
                    .iter()
                    .flat_map(|&sep| std::iter::once(sep).chain(glyphs.variants_of(sep)))
                    .map(|c| regex::escape(&c.to_string()))
                    .collect();
                format!(r"\d+(?:[ \t]*[{class}][ \t]*\d+){{{}}}", self.axes - 1)
            }
        }
    }

    /// Put per-axis values written in this grammar's order into
    /// easting-then-northing order.
    pub fn to_canonical_order<'a>(&self, mut axes: Vec<&'a str>) -> Vec<&'a str> {
        if self.axis_order == AxisOrder::NorthingFirst && axes.len() >= 2 {
            axes.swap(0, 1);
        }
        axes
    }

    /// Write `coordinate` the way this grammar expects to read it.
    pub fn render(&self, coordinate: &CanonicalCoordinate) -> String {
        let mut parts: Vec<String> = coordinate.components().iter().map(|c| c.to_string()).collect();
        if self.axis_order == AxisOrder::NorthingFirst && parts.len() >= 2 {
            parts.swap(0, 1);
        }

        let mut text = match &self.form {
            CoordinateForm::Contiguous => parts.concat(),
            CoordinateForm::Separated { separators } => {
                let sep = separators.first().copied().unwrap_or('/');
                parts.join(&sep.to_string())
            }
        };
        if let (true, Some(q)) = (self.qualifier, coordinate.qualifier()) {
            text.push_str(&format!(" ({q})"));
        }
        text
    }
}

/// One extraction rule as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternRule {
    pub id: String,
    pub anchors: Vec<String>,
    #[serde(default)]
    pub grammar: TokenGrammar,
    /// Larger wins when candidates from different rules compete.
    pub priority: u32,
    #[serde(default)]
    pub precision: PrecisionTier,
}

impl PatternRule {
    pub fn new(id: &str, anchors: &[&str], grammar: TokenGrammar, priority: u32) -> Self {
        Self {
            id: id.to_string(),
            anchors: anchors.iter().map(|a| a.to_string()).collect(),
            grammar,
            priority,
            precision: PrecisionTier::Standard,
        }
    }

    pub fn with_precision(mut self, precision: PrecisionTier) -> Self {
        self.precision = precision;
        self
    }

    /// A full mention: first anchor followed by the rendered coordinate.
    pub fn render(&self, coordinate: &CanonicalCoordinate) -> String {
        let anchor = self.anchors.first().map(String::as_str).unwrap_or_default();
        format!("{} {}", anchor, self.grammar.render(coordinate))
    }

    fn build_pattern(&self, glyphs: &GlyphTable) -> String {
        let mut anchors: Vec<&String> = self.anchors.iter().collect();
        // Alternation is leftmost-first, so longer variants must come first.
        anchors.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        let alternation = anchors
            .iter()
            .map(|anchor| {
                anchor
                    .split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");

        let gap = if self.grammar.max_gap_tokens > 0 {
            format!(r"(?:[^\s\d]+{FILLER}+){{0,{}}}", self.grammar.max_gap_tokens)
        } else {
            String::new()
        };
        let qualifier = if self.grammar.qualifier {
            r"(?:\s*\((?P<qualifier>[^\s()]{1,3})\))?"
        } else {
            ""
        };

        format!(
            r"\b[{HEBREW_PREFIXES}]{{0,2}}(?P<anchor>{alternation}){FILLER}*{gap}(?P<coord>{}){qualifier}",
            self.grammar.coordinate_pattern(glyphs)
        )
    }
}

/// A raw match of one rule against report text. Offsets are byte offsets
/// into the report text; `coord` is relative to `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub rule_id: String,
    pub rule_index: usize,
    pub priority: u32,
    pub start: usize,
    pub end: usize,
    pub span: String,
    pub coord: Range<usize>,
    pub qualifier: Option<String>,
}

impl Candidate {
    pub fn coordinate_region(&self) -> &str {
        &self.span[self.coord.clone()]
    }

    /// Absolute byte range of the coordinate region.
    pub fn coordinate_range(&self) -> Range<usize> {
        self.start + self.coord.start..self.start + self.coord.end
    }
}

struct CompiledRule {
    rule: PatternRule,
    regex: Regex,
}

/// The ordered, read-only rule set shared by every extraction call.
pub struct PatternRegistry {
    rules: Vec<CompiledRule>,
    glyphs: GlyphTable,
}

impl PatternRegistry {
    pub fn new(glyphs: GlyphTable) -> Self {
        Self { rules: Vec::new(), glyphs }
    }

    pub fn register(&mut self, rule: PatternRule) -> Result<(), ConfigurationError> {
        if rule.id.trim().is_empty() {
            return Err(ConfigurationError::EmptyRuleId);
        }
        if self.rules.iter().any(|r| r.rule.id == rule.id) {
            return Err(ConfigurationError::DuplicateRule(rule.id));
        }
        if rule.anchors.is_empty() || rule.anchors.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigurationError::EmptyAnchor { rule_id: rule.id });
        }
        if let Err(reason) = rule.grammar.validate(&self.glyphs) {
            return Err(ConfigurationError::InvalidGrammar { rule_id: rule.id, reason });
        }

        let regex = Regex::new(&rule.build_pattern(&self.glyphs)).map_err(|e| {
            ConfigurationError::Pattern { rule_id: rule.id.clone(), message: e.to_string() }
        })?;

        tracing::debug!(rule = %rule.id, priority = rule.priority, "registered pattern rule");
        self.rules.push(CompiledRule { rule, regex });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    pub fn rule(&self, index: usize) -> Option<&PatternRule> {
        self.rules.get(index).map(|c| &c.rule)
    }

    pub fn find(&self, id: &str) -> Option<&PatternRule> {
        self.rules().find(|r| r.id == id)
    }

    pub fn glyphs(&self) -> &GlyphTable {
        &self.glyphs
    }

    /// Every match of every rule. Matches of one rule never overlap each
    /// other; matches of different rules may.
    ///
    /// A match whose digits run on into `<separator><digit>` is only the
    /// head of a longer coordinate and is dropped.
    pub fn match_candidates(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (rule_index, compiled) in self.rules.iter().enumerate() {
            for caps in compiled.regex.captures_iter(text) {
                let (Some(whole), Some(anchor), Some(coord)) =
                    (caps.get(0), caps.name("anchor"), caps.name("coord"))
                else {
                    continue;
                };

                if self.continues_coordinate(&text[coord.end()..]) {
                    tracing::trace!(rule = %compiled.rule.id, at = coord.start(), "match is a truncated coordinate");
                    continue;
                }

                let start = anchor.start();
                candidates.push(Candidate {
                    rule_id: compiled.rule.id.clone(),
                    rule_index,
                    priority: compiled.rule.priority,
                    start,
                    end: whole.end(),
                    span: text[start..whole.end()].to_string(),
                    coord: coord.start() - start..coord.end() - start,
                    qualifier: caps.name("qualifier").map(|q| q.as_str().to_string()),
                });
            }
        }

        candidates
    }

    fn is_separator(&self, c: char) -> bool {
        self.glyphs.separators.contains_key(&c)
            || self.glyphs.separators.values().any(|&target| target == c)
            || self.rules.iter().any(|r| r.rule.grammar.separators().contains(&c))
    }

    /// True when `rest` starts with a separator followed by another digit.
    fn continues_coordinate(&self, rest: &str) -> bool {
        let rest = rest.trim_start_matches([' ', '\t']);
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if self.is_separator(c) => chars
                .as_str()
                .trim_start_matches([' ', '\t'])
                .starts_with(|c: char| c.is_numeric()),
            _ => false,
        }
    }

    /// SHA-256 over the serialized rules and glyph table, hex encoded.
    pub fn fingerprint(&self) -> String {
        let rules: Vec<&PatternRule> = self.rules().collect();
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&rules).unwrap_or_default());
        hasher.update(serde_json::to_vec(&self.glyphs).unwrap_or_default());
        hex::encode(hasher.finalize())
    }
}
