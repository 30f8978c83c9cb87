use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use extract::{CanonicalCoordinate, Normalizer, RejectionReason};
use ingest::RowReader;

/// Human verdict for one sampled report. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroundTruthLabel {
    pub report_id: String,
    pub has_coordinate: bool,
    /// `None` with `has_coordinate` set means the tagger only confirmed that
    /// a coordinate is present.
    pub true_value: Option<CanonicalCoordinate>,
}

impl GroundTruthLabel {
    pub fn positive(report_id: impl Into<String>, value: CanonicalCoordinate) -> Self {
        Self { report_id: report_id.into(), has_coordinate: true, true_value: Some(value) }
    }

    pub fn presence_only(report_id: impl Into<String>) -> Self {
        Self { report_id: report_id.into(), has_coordinate: true, true_value: None }
    }

    pub fn negative(report_id: impl Into<String>) -> Self {
        Self { report_id: report_id.into(), has_coordinate: false, true_value: None }
    }

    /// Normalize a tagging row. The tagged coordinate goes through the same
    /// normalizer as extracted spans so the two compare axis-wise.
    pub fn from_row(row: LabelRow, normalizer: &Normalizer) -> Result<Self, RejectionReason> {
        let tagged = row
            .true_value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match (row.has_coordinate, tagged) {
            (true, Some(text)) => Ok(Self::positive(row.report_id, normalizer.parse_value(text)?)),
            (true, None) => Ok(Self::presence_only(row.report_id)),
            (false, Some(text)) => {
                tracing::warn!(report = %row.report_id, value = text, "negative label carries a coordinate, ignoring it");
                Ok(Self::negative(row.report_id))
            }
            (false, None) => Ok(Self::negative(row.report_id)),
        }
    }
}

/// Load the tagging sheet. A tagged coordinate that does not normalize makes
/// the whole sheet unusable.
pub async fn load_labels(path: &Path, normalizer: &Normalizer) -> anyhow::Result<Vec<GroundTruthLabel>> {
    let rows: Vec<LabelRow> = RowReader::read_rows(path).await?;
    let labels = rows
        .into_iter()
        .map(|row| {
            let id = row.report_id.clone();
            GroundTruthLabel::from_row(row, normalizer)
                .with_context(|| format!("Invalid tagged coordinate for report {}", id))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let positives = labels.iter().filter(|l| l.has_coordinate).count();
    tracing::info!(count = labels.len(), positives, path = %path.display(), "loaded ground-truth labels");
    Ok(labels)
}

/// A row from the tagging sheet as the reviewers fill it in.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelRow {
    #[serde(alias = "Report_ID")]
    pub report_id: String,
    #[serde(alias = "Y_N_TAG", deserialize_with = "yes_no")]
    pub has_coordinate: bool,
    #[serde(default, alias = "Tagged_Coordinate")]
    pub true_value: Option<String>,
}

/// Accepts JSON booleans as well as the YES/NO strings of the tagging sheet.
fn yes_no<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(text) => match text.trim().to_ascii_uppercase().as_str() {
            "YES" | "Y" | "TRUE" | "1" | "כן" => Ok(true),
            "NO" | "N" | "FALSE" | "0" | "לא" => Ok(false),
            other => Err(serde::de::Error::custom(format!("expected YES or NO, got {other:?}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sheet_row() {
        let normalizer = Normalizer::default();
        let rows: Vec<LabelRow> = serde_json::from_str(
            r#"[
                {"Report_ID": "1", "Y_N_TAG": " yes ", "Tagged_Coordinate": "123/456"},
                {"Report_ID": "2", "Y_N_TAG": "NO"},
                {"report_id": "3", "has_coordinate": true},
                {"report_id": "4", "has_coordinate": false, "true_value": "123456"}
            ]"#,
        )
        .unwrap();

        let labels: Vec<GroundTruthLabel> = rows
            .into_iter()
            .map(|row| GroundTruthLabel::from_row(row, &normalizer).unwrap())
            .collect();

        let expected = normalizer.parse_value("123456").unwrap();
        assert!(labels[0].true_value.as_ref().unwrap().same_location(&expected));
        assert_eq!(labels[1], GroundTruthLabel::negative("2"));
        assert_eq!(labels[2], GroundTruthLabel::presence_only("3"));
        assert_eq!(labels[3], GroundTruthLabel::negative("4"));
    }

    #[test]
    fn test_rejects_unknown_flag_and_bad_value() {
        let bad_flag = serde_json::from_str::<LabelRow>(r#"{"report_id": "1", "has_coordinate": "maybe"}"#);
        assert!(bad_flag.is_err());

        let row: LabelRow =
            serde_json::from_str(r#"{"report_id": "1", "has_coordinate": true, "true_value": "12"}"#).unwrap();
        assert!(GroundTruthLabel::from_row(row, &Normalizer::default()).is_err());
    }

    #[tokio::test]
    async fn test_load_labels_from_jsonl() {
        let path = std::env::temp_dir().join(format!("labels_{}.jsonl", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            "{\"Report_ID\": \"1\", \"Y_N_TAG\": \"YES\", \"Tagged_Coordinate\": \"۱۲۳/۴۵۶\"}\n\
             {\"Report_ID\": \"2\", \"Y_N_TAG\": \"NO\"}\n",
        )
        .await
        .unwrap();

        let labels = load_labels(&path, &Normalizer::default()).await.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].true_value.as_ref().unwrap().to_string(), "123/456");
        assert!(!labels[1].has_coordinate);

        tokio::fs::remove_file(&path).await.ok();
    }
}
