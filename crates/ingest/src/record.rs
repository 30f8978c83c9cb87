use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One cleaned intelligence report, as handed over by the cleaning stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRecord {
    #[serde(alias = "Report_ID")]
    pub report_id: String,
    #[serde(alias = "Sector")]
    pub sector: String,
    #[serde(alias = "Report_Urgency")]
    pub urgency: String,
    #[serde(alias = "Reliability_Score")]
    pub reliability: Reliability,
    #[serde(alias = "Content_Body")]
    pub content: String,
}

impl ReportRecord {
    pub fn new(
        report_id: impl Into<String>,
        sector: impl Into<String>,
        urgency: impl Into<String>,
        reliability: impl Into<Reliability>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            report_id: report_id.into(),
            sector: sector.into(),
            urgency: urgency.into(),
            reliability: reliability.into(),
            content: content.into(),
        }
    }

    /// First `max_chars` characters of the content, for review sheets.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

/// Source reliability grade in the Admiralty style: a source letter `A`..`F`
/// optionally followed by a credibility digit `1`..`6`.
///
/// Ordering runs from best to worst: letter first, then digit, a bare letter
/// after every digit of its letter, and unrecognised codes after everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Reliability {
    Graded { source: char, credibility: Option<u8> },
    Unrated(String),
}

impl Reliability {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let upper = trimmed.to_ascii_uppercase();
        let mut chars = upper.chars();

        let source = match chars.next() {
            Some(c @ 'A'..='F') => c,
            _ => return Reliability::Unrated(trimmed.to_string()),
        };

        let rest: String = chars.collect();
        match rest.as_str() {
            "" => Reliability::Graded { source, credibility: None },
            digit if digit.len() == 1 => match digit.parse::<u8>() {
                Ok(n @ 1..=6) => Reliability::Graded { source, credibility: Some(n) },
                _ => Reliability::Unrated(trimmed.to_string()),
            },
            _ => Reliability::Unrated(trimmed.to_string()),
        }
    }

    /// True when this grade is the same as or worse than `threshold`.
    pub fn ranks_at_or_below(&self, threshold: &Reliability) -> bool {
        self >= threshold
    }
}

impl From<String> for Reliability {
    fn from(raw: String) -> Self {
        Reliability::parse(&raw)
    }
}

impl From<&str> for Reliability {
    fn from(raw: &str) -> Self {
        Reliability::parse(raw)
    }
}

impl From<Reliability> for String {
    fn from(value: Reliability) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reliability::Graded { source, credibility: Some(n) } => write!(f, "{source}{n}"),
            Reliability::Graded { source, credibility: None } => write!(f, "{source}"),
            Reliability::Unrated(raw) => write!(f, "{raw}"),
        }
    }
}

impl Ord for Reliability {
    fn cmp(&self, other: &Self) -> Ordering {
        use Reliability::*;
        match (self, other) {
            (
                Graded { source: a, credibility: ca },
                Graded { source: b, credibility: cb },
            ) => a.cmp(b).then_with(|| match (ca, cb) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }),
            (Graded { .. }, Unrated(_)) => Ordering::Less,
            (Unrated(_), Graded { .. }) => Ordering::Greater,
            (Unrated(a), Unrated(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Reliability {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grades() {
        assert_eq!(
            Reliability::parse(" b3 "),
            Reliability::Graded { source: 'B', credibility: Some(3) }
        );
        assert_eq!(
            Reliability::parse("F"),
            Reliability::Graded { source: 'F', credibility: None }
        );
        assert_eq!(Reliability::parse("Z9"), Reliability::Unrated("Z9".to_string()));
        assert_eq!(Reliability::parse("A7"), Reliability::Unrated("A7".to_string()));
        assert_eq!(Reliability::parse("D4").to_string(), "D4");
    }

    #[test]
    fn test_ordering_best_to_worst() {
        let mut grades: Vec<Reliability> = ["F", "D4", "A1", "unknown", "D", "B2", "D1"]
            .into_iter()
            .map(Reliability::from)
            .collect();
        grades.sort();

        let rendered: Vec<String> = grades.iter().map(|g| g.to_string()).collect();
        assert_eq!(rendered, vec!["A1", "B2", "D1", "D4", "D", "F", "unknown"]);
    }

    #[test]
    fn test_threshold() {
        let threshold = Reliability::parse("D1");
        assert!(Reliability::parse("D4").ranks_at_or_below(&threshold));
        assert!(Reliability::parse("D1").ranks_at_or_below(&threshold));
        assert!(Reliability::parse("F").ranks_at_or_below(&threshold));
        assert!(!Reliability::parse("C6").ranks_at_or_below(&threshold));
    }

    #[test]
    fn test_record_accepts_source_column_names() {
        let json = r#"{
            "Report_ID": "R-17",
            "Sector": "צפון",
            "Report_Urgency": "רגיל",
            "Reliability_Score": "C3",
            "Content_Body": "תנועה חשודה בנ.צ 123456"
        }"#;
        let record: ReportRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.report_id, "R-17");
        assert_eq!(record.reliability, Reliability::parse("C3"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["reliability"], "C3");
    }

    #[test]
    fn test_excerpt() {
        let record = ReportRecord::new("1", "s", "u", "A1", "אבגדה");
        assert_eq!(record.excerpt(3), "אבג...");
        assert_eq!(record.excerpt(10), "אבגדה");
    }
}
