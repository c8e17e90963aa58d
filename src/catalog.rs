//! Template catalog — the selectable report templates for one session.
//!
//! Fetched once; a failed fetch yields an empty catalog and template
//! selection is reported as unavailable. No retry policy of its own.

use std::collections::HashSet;

use crate::error::FetchError;
use crate::models::{Template, TemplateId};
use crate::providers::TemplateSource;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    /// Build a catalog from a fetched snapshot. Templates are selected by
    /// id, so a repeated id is a duplicate even under another name; the
    /// first occurrence wins.
    pub fn from_templates(templates: Vec<Template>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(templates.len());
        for template in templates {
            if seen.insert(template.id.clone()) {
                unique.push(template);
            } else {
                let (name, id) = template.identity();
                tracing::warn!(
                    template_id = id,
                    template_name = name,
                    "Duplicate template id in catalog snapshot, keeping first"
                );
            }
        }
        Self { templates: unique }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetch the catalog from a template source.
    pub async fn load(source: &dyn TemplateSource) -> Result<Self, FetchError> {
        let templates = source.fetch_templates().await?;
        let catalog = Self::from_templates(templates);
        tracing::info!(count = catalog.len(), "Template catalog loaded");
        Ok(catalog)
    }

    /// Fetch the catalog, degrading to an empty catalog on failure.
    pub async fn load_or_empty(source: &dyn TemplateSource) -> Self {
        match Self::load(source).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(error = %e, "Template catalog unavailable");
                Self::empty()
            }
        }
    }

    pub fn find_by_id(&self, id: &TemplateId) -> Option<&Template> {
        self.templates.iter().find(|t| &t.id == id)
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Display names in fetch order, for the template selector.
    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Template selection is only offered when something was loaded.
    pub fn is_available(&self) -> bool {
        !self.is_empty()
    }

    /// Offline catalog with the stock plain-film templates.
    pub fn builtin() -> Self {
        Self::from_templates(builtin_templates())
    }
}

const CORRELATE_CLINICALLY: &str = "Please Correlate Clinically";

/// Stock plain-film templates shipped with the application. Only the chest
/// and plain heel entries carry findings; the rest start with empty
/// sections for the clinician to fill in.
pub fn builtin_templates() -> Vec<Template> {
    vec![
        Template::new(
            "builtin-chest-pa",
            "CHEST X RAY (PA VIEW)",
            "Bronchovascular markings are prominent.\n\
             Bilateral hila are prominent.\n\
             Both costo-phrenic angles appear clear.\n\
             Cardiothoracic ratio is normal.\n\
             Both domes of diaphragm appear normal.\n\
             Thoracic soft tissue and skeletal system appear unremarkable.",
            "Bronchovascular markings are prominent.\n\
             Bilateral hila are prominent.",
        )
        .with_advice(CORRELATE_CLINICALLY),
        Template::new("builtin-heel-axial-lat", "X-RAY HEEL (AXIAL LAT VIEW)", "", ""),
        Template::new("builtin-abdomen-supine", "X-RAY ABDOMEN (SUPINE VIEW)", "", ""),
        Template::new("builtin-abdomen-standing", "X-RAY ABDOMEN STANDING VIEW", "", ""),
        Template::new(
            "builtin-ankle-heel-lat",
            "X-RAY ANKLE JOINT WITH HEEL (LAT VIEW)",
            "",
            "",
        ),
        Template::new(
            "builtin-heel",
            "X-RAY HEEL",
            "Bones normal.",
            "No abnormality.",
        ),
    ]
}
