use serde::{Deserialize, Serialize};

/// Patient/study snapshot fetched once per editing session.
///
/// `date` is whatever the backend sends (often a locale string); use
/// `display_date::normalize_display_date` before printing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StudyMetadata {
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub referring_physician: String,
    #[serde(rename = "studyInstanceUID")]
    pub study_instance_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_sex: Option<String>,
}

impl StudyMetadata {
    /// Age and sex are only tracked by some backends; the header grid
    /// switches layout on this.
    pub fn tracks_age_and_sex(&self) -> bool {
        matches!(
            (&self.patient_age, &self.patient_sex),
            (Some(age), Some(sex)) if !age.trim().is_empty() && !sex.trim().is_empty()
        )
    }
}
