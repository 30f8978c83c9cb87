use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::coordinate::{CanonicalCoordinate, DigitBounds};
use crate::error::{ConfigurationError, Rejection, RejectionReason};
use crate::pattern::{Candidate, CoordinateForm, TokenGrammar};

/// Canonicalization table: non-Western digit glyphs to ASCII digits, and
/// separator variants to their canonical separator. Extending either map is
/// how new variants are supported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlyphTable {
    pub digits: BTreeMap<char, char>,
    pub separators: BTreeMap<char, char>,
}

impl Default for GlyphTable {
    fn default() -> Self {
        let mut digits = BTreeMap::new();
        // Arabic-Indic, Extended Arabic-Indic (Persian) and fullwidth digits.
        for base in ['\u{0660}', '\u{06F0}', '\u{FF10}'] {
            for offset in 0..10u32 {
                if let (Some(glyph), Some(ascii)) =
                    (char::from_u32(base as u32 + offset), char::from_digit(offset, 10))
                {
                    digits.insert(glyph, ascii);
                }
            }
        }

        let separators = BTreeMap::from([
            ('\u{FF0F}', '/'), // fullwidth solidus
            ('\\', '/'),
            ('\u{2044}', '/'), // fraction slash
            ('\u{05BE}', '-'), // maqaf
            ('\u{2010}', '-'),
            ('\u{2013}', '-'),
            ('\u{2014}', '-'),
            ('\u{FF0C}', ','), // fullwidth comma
            ('\u{060C}', ','), // arabic comma
        ]);

        Self { digits, separators }
    }
}

impl GlyphTable {
    pub fn canonical_digit(&self, c: char) -> Option<char> {
        if c.is_ascii_digit() {
            Some(c)
        } else {
            self.digits.get(&c).copied()
        }
    }

    pub fn canonical_separator(&self, c: char) -> char {
        self.separators.get(&c).copied().unwrap_or(c)
    }

    /// Every glyph that canonicalizes to `canonical`.
    pub fn variants_of(&self, canonical: char) -> impl Iterator<Item = char> + '_ {
        self.separators
            .iter()
            .filter(move |(_, target)| **target == canonical)
            .map(|(glyph, _)| *glyph)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (&glyph, &target) in &self.digits {
            if !target.is_ascii_digit() {
                return Err(ConfigurationError::GlyphTable { glyph, target });
            }
        }
        for (&glyph, &target) in &self.separators {
            if target.is_alphanumeric() || target.is_whitespace() || self.separators.contains_key(&target) {
                return Err(ConfigurationError::GlyphTable { glyph, target });
            }
        }
        Ok(())
    }
}

/// Turns the coordinate region of a matched span into a [`CanonicalCoordinate`].
///
/// Pure and stateless apart from its configuration, so one instance is shared
/// by every extraction call.
#[derive(Debug, Clone)]
pub struct Normalizer {
    bounds: DigitBounds,
    glyphs: GlyphTable,
}

impl Normalizer {
    pub fn new(bounds: DigitBounds, glyphs: GlyphTable) -> Self {
        Self { bounds, glyphs }
    }

    pub fn bounds(&self) -> &DigitBounds {
        &self.bounds
    }

    pub fn normalize(
        &self,
        candidate: &Candidate,
        grammar: &TokenGrammar,
    ) -> Result<CanonicalCoordinate, Rejection> {
        self.normalize_region(
            candidate.coordinate_region(),
            candidate.qualifier.as_deref(),
            grammar,
        )
        .map_err(|reason| Rejection {
            rule_id: candidate.rule_id.clone(),
            span: candidate.span.clone(),
            start: candidate.start,
            reason,
        })
    }

    /// Normalize an anchor-free coordinate region written in `grammar`.
    pub fn normalize_region(
        &self,
        region: &str,
        qualifier: Option<&str>,
        grammar: &TokenGrammar,
    ) -> Result<CanonicalCoordinate, RejectionReason> {
        let canonical = self.canonicalize(region, grammar.separators())?;
        if canonical.trim().is_empty() {
            return Err(RejectionReason::EmptyRegion);
        }

        let qualifier = if grammar.qualifier { qualifier.map(str::to_string) } else { None };

        match &grammar.form {
            CoordinateForm::Contiguous => {
                let digits: String = canonical.split_whitespace().collect();
                let total = digits.len();
                let (min, max) = (self.bounds.min * grammar.axes, self.bounds.max * grammar.axes);
                if total % grammar.axes != 0 || !(min..=max).contains(&total) {
                    return Err(RejectionReason::DigitWidth { axis: None, width: total, min, max });
                }

                let width = total / grammar.axes;
                let axes: Vec<&str> = (0..grammar.axes)
                    .map(|i| &digits[i * width..(i + 1) * width])
                    .collect();
                CanonicalCoordinate::try_new(&grammar.to_canonical_order(axes), qualifier, &self.bounds)
            }
            CoordinateForm::Separated { separators } => {
                let splits_on_space = separators.contains(&' ');
                let axes: Vec<&str> = canonical
                    .split(|c| separators.contains(&c))
                    .map(str::trim)
                    .filter(|piece| !splits_on_space || !piece.is_empty())
                    .collect();
                if axes.len() != grammar.axes {
                    return Err(RejectionReason::MissingAxis {
                        expected: grammar.axes,
                        found: axes.len(),
                    });
                }
                CanonicalCoordinate::try_new(&grammar.to_canonical_order(axes), qualifier, &self.bounds)
            }
        }
    }

    /// Parse a bare, human-entered coordinate such as `"123456"`,
    /// `"123/456"` or `"۱۲۳-۴۵۶ (א)"`.
    pub fn parse_value(&self, text: &str) -> Result<CanonicalCoordinate, RejectionReason> {
        let text = text.trim();
        let (body, qualifier) = match (text.rfind('('), text.ends_with(')')) {
            (Some(open), true) => (text[..open].trim(), Some(&text[open + 1..text.len() - 1])),
            _ => (text, None),
        };

        let separators: Vec<char> = body
            .chars()
            .filter(|c| self.glyphs.canonical_digit(*c).is_none() && !c.is_whitespace())
            .map(|c| self.glyphs.canonical_separator(c))
            .filter(|c| !c.is_alphanumeric())
            .collect();

        let grammar = if !separators.is_empty() {
            TokenGrammar::separated(&separators)
        } else if body.split_whitespace().count() > 1 {
            TokenGrammar::separated(&[' '])
        } else {
            TokenGrammar::default()
        };

        self.normalize_region(body, qualifier, &grammar)
    }

    /// Map digit glyphs to ASCII and separator variants to canonical form.
    /// Whitespace collapses to a single space; anything else is rejected.
    fn canonicalize(&self, region: &str, separators: &[char]) -> Result<String, RejectionReason> {
        let mut out = String::with_capacity(region.len());
        for c in region.chars() {
            if let Some(digit) = self.glyphs.canonical_digit(c) {
                out.push(digit);
            } else if c.is_whitespace() {
                out.push(' ');
            } else {
                let sep = self.glyphs.canonical_separator(c);
                if separators.contains(&sep) {
                    out.push(sep);
                } else {
                    return Err(RejectionReason::NonNumeric { glyph: c });
                }
            }
        }
        Ok(out)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DigitBounds::default(), GlyphTable::default())
    }
}
