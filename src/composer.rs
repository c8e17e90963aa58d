//! Report composer — template + study metadata → draft text.
//!
//! `merge` is pure and idempotent. `DraftReport::reduce` is the only way a
//! draft changes; selecting no template is the single point where
//! clinician edits are discarded.

use serde::Serialize;

use crate::display_date::normalize_display_date;
use crate::models::{StudyMetadata, Template, TemplateId};

/// Indentation applied to every non-blank section line.
pub const SECTION_INDENT: &str = "    ";

pub const OBSERVATION_HEADER: &str = "OBSERVATION:";
pub const IMPRESSION_HEADER: &str = "IMPRESSION:";
pub const ADVICE_LABEL: &str = "ADVICE:";

/// Merge a template with study metadata into draft text.
///
/// ```text
/// <name>
///
/// OBSERVATION:
///     <observation lines>
///
/// IMPRESSION:
///     <impression lines>
///
/// ADVICE: <advice>          (only when the template has advice)
/// ```
pub fn merge(template: &Template, metadata: &StudyMetadata) -> String {
    let mut lines: Vec<String> = vec![template.name.trim().to_string(), String::new()];

    lines.push(OBSERVATION_HEADER.to_string());
    push_section(&mut lines, &fill_placeholders(&template.sections.observation, metadata));
    lines.push(String::new());

    lines.push(IMPRESSION_HEADER.to_string());
    push_section(&mut lines, &fill_placeholders(&template.sections.impression, metadata));

    if let Some(advice) = template.sections.advice.as_deref() {
        let advice = fill_placeholders(advice, metadata);
        let advice = advice.trim();
        if !advice.is_empty() {
            lines.push(String::new());
            lines.push(format!("{ADVICE_LABEL} {advice}"));
        }
    }

    lines.join("\n")
}

/// Re-indent section text: every line trimmed then indented, leading and
/// trailing blank lines dropped, inner blank lines kept as empty rows.
fn push_section(lines: &mut Vec<String>, text: &str) {
    let rows: Vec<&str> = text.split('\n').map(str::trim).collect();
    let first = rows.iter().position(|r| !r.is_empty());
    let last = rows.iter().rposition(|r| !r.is_empty());

    if let (Some(first), Some(last)) = (first, last) {
        for row in &rows[first..=last] {
            if row.is_empty() {
                lines.push(String::new());
            } else {
                lines.push(format!("{SECTION_INDENT}{row}"));
            }
        }
    }
}

/// Substitute `{patient_name}`-style placeholders in a single pass.
/// Unknown placeholders and unmatched braces are copied verbatim, and
/// substituted values are never re-scanned.
pub fn fill_placeholders(text: &str, metadata: &StudyMetadata) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match placeholder_value(key, metadata) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn placeholder_value(key: &str, metadata: &StudyMetadata) -> Option<String> {
    let value = match key {
        "patient_id" => metadata.patient_id.clone(),
        "patient_name" => metadata.patient_name.clone(),
        "date" => normalize_display_date(&metadata.date),
        "location" => metadata.location.clone(),
        "referring_physician" => metadata.referring_physician.clone(),
        _ => return None,
    };
    Some(value)
}

// ─── Draft state ──────────────────────────────────────────────────────────────

/// The clinician's working draft for one session.
///
/// Invariant: `body_text` is empty whenever `template_ref` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DraftReport {
    template_ref: Option<TemplateId>,
    body_text: String,
}

/// Transitions accepted by `DraftReport::reduce`.
#[derive(Debug, Clone)]
pub enum DraftAction<'a> {
    /// Select a template (recompute from merge) or none (clear the draft).
    SelectTemplate(Option<(&'a Template, &'a StudyMetadata)>),
    /// Replace the body with clinician-edited text.
    EditText(String),
}

impl DraftReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template_ref(&self) -> Option<&TemplateId> {
        self.template_ref.as_ref()
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    /// Editing is only enabled while a template is selected.
    pub fn is_editable(&self) -> bool {
        self.template_ref.is_some()
    }

    /// Empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.body_text.trim().is_empty()
    }

    /// Apply one transition and return the next draft.
    ///
    /// Reselecting a template (even the same one) discards unsaved edits.
    /// Edits while no template is selected are ignored.
    pub fn reduce(&self, action: DraftAction<'_>) -> DraftReport {
        match action {
            DraftAction::SelectTemplate(None) => DraftReport::default(),
            DraftAction::SelectTemplate(Some((template, metadata))) => DraftReport {
                template_ref: Some(template.id.clone()),
                body_text: merge(template, metadata),
            },
            DraftAction::EditText(text) => {
                if !self.is_editable() {
                    tracing::debug!("Ignoring edit: no template selected");
                    return self.clone();
                }
                DraftReport {
                    template_ref: self.template_ref.clone(),
                    body_text: text,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_templates;

    fn metadata() -> StudyMetadata {
        StudyMetadata {
            patient_id: "121".into(),
            patient_name: "Karan".into(),
            date: "8/30/2023, 10:15:00 AM".into(),
            location: "Ward 3".into(),
            referring_physician: "#01112".into(),
            study_instance_uid: "1.2.840.1".into(),
            patient_age: None,
            patient_sex: None,
        }
    }

    fn heel() -> Template {
        Template::new("t-heel", "X-RAY HEEL", "Bones normal.", "No abnormality.")
    }

    #[test]
    fn heel_example_grammar() {
        let draft = merge(&heel(), &metadata());
        assert!(draft.starts_with("X-RAY HEEL\n\n"));
        let obs = draft.find("OBSERVATION:").unwrap();
        let imp = draft.find("IMPRESSION:").unwrap();
        assert!(obs < imp);
        assert_eq!(
            draft,
            "X-RAY HEEL\n\nOBSERVATION:\n    Bones normal.\n\nIMPRESSION:\n    No abnormality."
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let m = metadata();
        for template in builtin_templates() {
            assert_eq!(merge(&template, &m), merge(&template, &m));
        }
    }

    #[test]
    fn merge_does_not_depend_on_unused_metadata() {
        let other = StudyMetadata {
            patient_name: "Someone Else".into(),
            ..metadata()
        };
        assert_eq!(merge(&heel(), &metadata()), merge(&heel(), &other));
    }

    #[test]
    fn sections_are_reindented_consistently() {
        let t = Template::new(
            "t",
            "CT HEAD",
            "\n      Line one.\n\tLine two.\n\n   Line three.\n\n",
            "  Normal.  ",
        );
        let draft = merge(&t, &metadata());
        assert_eq!(
            draft,
            "CT HEAD\n\nOBSERVATION:\n    Line one.\n    Line two.\n\n    Line three.\n\nIMPRESSION:\n    Normal."
        );
    }

    #[test]
    fn advice_line_is_appended() {
        let chest = &builtin_templates()[0];
        let draft = merge(chest, &metadata());
        assert!(draft.starts_with("CHEST X RAY (PA VIEW)"));
        assert!(draft.ends_with("\n\nADVICE: Please Correlate Clinically"));
    }

    #[test]
    fn empty_sections_merge_to_headings_only() {
        let supine = builtin_templates()
            .into_iter()
            .find(|t| t.id.as_str() == "builtin-abdomen-supine")
            .unwrap();
        assert_eq!(
            merge(&supine, &metadata()),
            "X-RAY ABDOMEN (SUPINE VIEW)\n\nOBSERVATION:\n\nIMPRESSION:"
        );
    }

    #[test]
    fn placeholders_are_filled_from_metadata() {
        let t = Template::new(
            "t",
            "USG",
            "Patient {patient_name} ({patient_id}) seen on {date} at {location}.",
            "Referred by {referring_physician}. {unknown} stays, so does {open",
        );
        let draft = merge(&t, &metadata());
        assert!(draft.contains("Patient Karan (121) seen on 30-August-2023 at Ward 3."));
        assert!(draft.contains("Referred by #01112. {unknown} stays, so does {open"));
    }

    #[test]
    fn unparseable_date_placeholder_uses_raw_value() {
        let m = StudyMetadata {
            date: " sometime ".into(),
            ..metadata()
        };
        assert_eq!(fill_placeholders("Seen {date}.", &m), "Seen sometime.");
    }

    #[test]
    fn placeholder_values_are_not_rescanned() {
        let m = StudyMetadata {
            patient_name: "{patient_id}".into(),
            ..metadata()
        };
        assert_eq!(fill_placeholders("{patient_name}", &m), "{patient_id}");
    }

    #[test]
    fn select_template_resets_draft_from_merge() {
        let m = metadata();
        let t = heel();
        let draft = DraftReport::new()
            .reduce(DraftAction::SelectTemplate(Some((&t, &m))))
            .reduce(DraftAction::EditText("edited".into()));
        assert_eq!(draft.body_text(), "edited");

        // Reselecting discards edits
        let draft = draft.reduce(DraftAction::SelectTemplate(Some((&t, &m))));
        assert_eq!(draft.body_text(), merge(&t, &m));
        assert_eq!(draft.template_ref(), Some(&t.id));
    }

    #[test]
    fn select_none_always_clears() {
        let m = metadata();
        let t = heel();
        let starts = [
            DraftReport::new(),
            DraftReport::new().reduce(DraftAction::SelectTemplate(Some((&t, &m)))),
            DraftReport::new()
                .reduce(DraftAction::SelectTemplate(Some((&t, &m))))
                .reduce(DraftAction::EditText("lots of edits\nmore".into())),
        ];
        for start in starts {
            let cleared = start.reduce(DraftAction::SelectTemplate(None));
            assert_eq!(cleared.body_text(), "");
            assert!(cleared.template_ref().is_none());
            assert!(!cleared.is_editable());
        }
    }

    #[test]
    fn edits_ignored_without_template() {
        let draft = DraftReport::new().reduce(DraftAction::EditText("typed".into()));
        assert!(draft.is_blank());
        assert_eq!(draft, DraftReport::new());
    }
}
