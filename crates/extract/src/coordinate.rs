use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RejectionReason;

/// Admissible digit width of a single grid component.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DigitBounds {
    pub min: usize,
    pub max: usize,
}

impl DigitBounds {
    /// Widths above this no longer fit a `u32` component.
    pub const WIDEST: usize = 9;

    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, width: usize) -> bool {
        (self.min..=self.max).contains(&width)
    }

    pub fn is_admissible(&self) -> bool {
        self.min >= 1 && self.min <= self.max && self.max <= Self::WIDEST
    }
}

impl Default for DigitBounds {
    fn default() -> Self {
        Self { min: 3, max: 5 }
    }
}

/// One axis of a grid reference. Leading zeros are significant, so the
/// written width is kept next to the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GridComponent {
    value: u32,
    width: usize,
}

impl GridComponent {
    fn from_ascii_digits(digits: &str) -> Option<Self> {
        if digits.is_empty()
            || digits.len() > DigitBounds::WIDEST
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let value = digits.parse().ok()?;
        Some(Self { value, width: digits.len() })
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl fmt::Display for GridComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.value, width = self.width)
    }
}

impl TryFrom<String> for GridComponent {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::from_ascii_digits(&raw).ok_or_else(|| format!("invalid grid component {raw:?}"))
    }
}

impl From<GridComponent> for String {
    fn from(component: GridComponent) -> Self {
        component.to_string()
    }
}

/// A normalized grid reference: components in easting-then-northing order,
/// each within the configured digit width, plus an optional sub-grid
/// qualifier.
///
/// Instances only come out of [`CanonicalCoordinate::try_new`], which is what
/// the normalizer calls once a span has been canonicalized and split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct CanonicalCoordinate {
    components: Vec<GridComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    qualifier: Option<String>,
}

impl CanonicalCoordinate {
    /// Build from per-axis ASCII digit strings already in canonical axis order.
    pub fn try_new(
        axes: &[&str],
        qualifier: Option<String>,
        bounds: &DigitBounds,
    ) -> Result<Self, RejectionReason> {
        if axes.len() < 2 {
            return Err(RejectionReason::MissingAxis { expected: 2, found: axes.len() });
        }

        let mut components = Vec::with_capacity(axes.len());
        for (axis, digits) in axes.iter().enumerate() {
            if digits.is_empty() {
                return Err(RejectionReason::EmptyRegion);
            }
            if let Some(glyph) = digits.chars().find(|c| !c.is_ascii_digit()) {
                return Err(RejectionReason::NonNumeric { glyph });
            }
            if !bounds.contains(digits.len()) {
                return Err(RejectionReason::DigitWidth {
                    axis: Some(axis),
                    width: digits.len(),
                    min: bounds.min,
                    max: bounds.max,
                });
            }
            let component = GridComponent::from_ascii_digits(digits).ok_or(
                RejectionReason::DigitWidth {
                    axis: Some(axis),
                    width: digits.len(),
                    min: bounds.min,
                    max: bounds.max,
                },
            )?;
            components.push(component);
        }

        let qualifier = qualifier
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        Ok(Self { components, qualifier })
    }

    pub fn components(&self) -> &[GridComponent] {
        &self.components
    }

    pub fn easting(&self) -> Option<GridComponent> {
        self.components.first().copied()
    }

    pub fn northing(&self) -> Option<GridComponent> {
        self.components.get(1).copied()
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Axis-wise equality. The sub-grid qualifier does not take part.
    pub fn same_location(&self, other: &CanonicalCoordinate) -> bool {
        self.components == other.components
    }
}

/// Serialized form, checked before it becomes a [`CanonicalCoordinate`].
#[derive(Deserialize)]
struct RawCoordinate {
    components: Vec<GridComponent>,
    #[serde(default)]
    qualifier: Option<String>,
}

impl TryFrom<RawCoordinate> for CanonicalCoordinate {
    type Error = RejectionReason;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        if raw.components.len() < 2 {
            return Err(RejectionReason::MissingAxis { expected: 2, found: raw.components.len() });
        }
        let qualifier = raw
            .qualifier
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        Ok(Self { components: raw.components, qualifier })
    }
}

impl fmt::Display for CanonicalCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{component}")?;
        }
        if let Some(q) = &self.qualifier {
            write!(f, " ({q})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_leading_zeros() {
        let c = CanonicalCoordinate::try_new(&["012", "450"], None, &DigitBounds::default()).unwrap();
        let easting = c.easting().unwrap();
        assert_eq!(easting.value(), 12);
        assert_eq!(easting.width(), 3);
        assert_eq!(c.to_string(), "012/450");
    }

    #[test]
    fn test_rejects_width_out_of_bounds() {
        let err = CanonicalCoordinate::try_new(&["123", "456789"], None, &DigitBounds::default())
            .unwrap_err();
        assert_eq!(
            err,
            RejectionReason::DigitWidth { axis: Some(1), width: 6, min: 3, max: 5 }
        );
    }

    #[test]
    fn test_rejects_single_axis() {
        let err = CanonicalCoordinate::try_new(&["123"], None, &DigitBounds::default()).unwrap_err();
        assert_eq!(err, RejectionReason::MissingAxis { expected: 2, found: 1 });
    }

    #[test]
    fn test_same_location_ignores_qualifier() {
        let bounds = DigitBounds::default();
        let a = CanonicalCoordinate::try_new(&["123", "456"], Some("א".into()), &bounds).unwrap();
        let b = CanonicalCoordinate::try_new(&["123", "456"], None, &bounds).unwrap();
        let c = CanonicalCoordinate::try_new(&["0123", "456"], None, &bounds).unwrap();

        assert!(a.same_location(&b));
        assert!(!b.same_location(&c));
        assert_eq!(a.to_string(), "123/456 (א)");
    }

    #[test]
    fn test_serde_preserves_width() {
        let c = CanonicalCoordinate::try_new(&["007", "120"], None, &DigitBounds::default()).unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"components":["007","120"]}"#);

        let back: CanonicalCoordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_deserialize_enforces_two_axes() {
        for json in [r#"{"components":["123"]}"#, r#"{"components":[]}"#] {
            assert!(serde_json::from_str::<CanonicalCoordinate>(json).is_err(), "{json}");
        }

        let c: CanonicalCoordinate =
            serde_json::from_str(r#"{"components":["123","456"],"qualifier":"א"}"#).unwrap();
        assert_eq!(c.northing().unwrap().to_string(), "456");
        assert_eq!(c.qualifier(), Some("א"));
    }
}
