//! One editing session: catalog + study metadata + the working draft.
//!
//! Template and metadata loads run concurrently at start and may finish in
//! either order. Either can fail independently; the session degrades
//! (no templates offered, or composer disabled) instead of erroring.

use serde::Serialize;
use uuid::Uuid;

use crate::catalog::TemplateCatalog;
use crate::composer::{DraftAction, DraftReport};
use crate::error::SessionError;
use crate::layout::HeaderBlock;
use crate::models::{StudyMetadata, TemplateId};
use crate::providers::{MetadataSource, TemplateSource};
use crate::save::SaveRequest;

/// What the preview pane shows: the header grid and the current draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub header: HeaderBlock,
    pub body_text: String,
}

impl std::fmt::Display for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for column in &self.header.columns {
            writeln!(f, "{:<14}{}", format!("{}:", column.label), column.value)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.body_text)
    }
}

pub struct ReportSession {
    session_id: Uuid,
    study_uid: String,
    catalog: TemplateCatalog,
    metadata: Option<StudyMetadata>,
    draft: DraftReport,
}

impl ReportSession {
    /// Load the catalog and the study's metadata concurrently.
    pub async fn start(
        templates: &dyn TemplateSource,
        metadata: &dyn MetadataSource,
        study_uid: &str,
    ) -> Self {
        let (catalog, metadata) = tokio::join!(
            TemplateCatalog::load_or_empty(templates),
            metadata.fetch_metadata(study_uid)
        );
        let metadata = match metadata {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(study_uid = study_uid, error = %e, "Study metadata unavailable");
                None
            }
        };
        Self::from_parts(study_uid, catalog, metadata)
    }

    pub fn from_parts(
        study_uid: &str,
        catalog: TemplateCatalog,
        metadata: Option<StudyMetadata>,
    ) -> Self {
        let session = Self {
            session_id: Uuid::new_v4(),
            study_uid: study_uid.to_string(),
            catalog,
            metadata,
            draft: DraftReport::new(),
        };
        tracing::info!(
            session_id = %session.session_id,
            study_uid = %session.study_uid,
            templates = session.catalog.len(),
            metadata_loaded = session.metadata.is_some(),
            "Report session started"
        );
        session
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn study_uid(&self) -> &str {
        &self.study_uid
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn metadata(&self) -> Option<&StudyMetadata> {
        self.metadata.as_ref()
    }

    pub fn draft(&self) -> &DraftReport {
        &self.draft
    }

    /// A template is selected and metadata is loaded.
    pub fn is_composer_active(&self) -> bool {
        self.metadata.is_some() && self.draft.is_editable()
    }

    pub fn can_select_template(&self) -> bool {
        self.catalog.is_available() && self.metadata.is_some()
    }

    /// Select a template by id, or clear the draft with `None`.
    ///
    /// Reselecting the current template discards unsaved edits.
    pub fn select_template(&mut self, id: Option<&TemplateId>) -> Result<(), SessionError> {
        let Some(id) = id else {
            self.draft = self.draft.reduce(DraftAction::SelectTemplate(None));
            return Ok(());
        };
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(SessionError::MetadataUnavailable)?;
        let template = self
            .catalog
            .find_by_id(id)
            .ok_or_else(|| SessionError::TemplateNotFound(id.to_string()))?;

        self.draft = self
            .draft
            .reduce(DraftAction::SelectTemplate(Some((template, metadata))));
        tracing::info!(template_id = %id, "Template selected");
        Ok(())
    }

    /// Replace the draft body with edited text.
    pub fn edit_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if !self.draft.is_editable() {
            return Err(SessionError::EditingDisabled);
        }
        self.draft = self.draft.reduce(DraftAction::EditText(text.into()));
        Ok(())
    }

    /// Header and draft for display. `None` when there is nothing to show.
    pub fn preview(&self) -> Option<Preview> {
        if self.draft.is_blank() {
            return None;
        }
        let metadata = self.metadata.as_ref()?;
        Some(Preview {
            header: HeaderBlock::from_metadata(metadata),
            body_text: self.draft.body_text().to_string(),
        })
    }

    fn template_name(&self) -> String {
        self.draft
            .template_ref()
            .and_then(|id| self.catalog.find_by_id(id))
            .map(|t| t.name.clone())
            .unwrap_or_default()
    }

    /// Snapshot the current draft for the save coordinator.
    pub fn save_request(&self) -> Result<SaveRequest, SessionError> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(SessionError::MetadataUnavailable)?;
        if self.draft.is_blank() {
            return Err(SessionError::NothingToSave);
        }
        Ok(SaveRequest::new(
            self.study_uid.clone(),
            self.template_name(),
            self.draft.body_text(),
            metadata.clone(),
        ))
    }
}
