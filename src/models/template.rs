use serde::{Deserialize, Serialize};

/// Opaque template identifier as issued by the template backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub String);

impl TemplateId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Structured report skeleton. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub sections: TemplateSections,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSections {
    #[serde(rename = "OBSERVATION")]
    pub observation: String,
    #[serde(rename = "IMPRESSION")]
    pub impression: String,
    #[serde(rename = "ADVICE", default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

impl Template {
    pub fn new(id: &str, name: &str, observation: &str, impression: &str) -> Self {
        Self {
            id: TemplateId::from(id),
            name: name.to_string(),
            sections: TemplateSections {
                observation: observation.to_string(),
                impression: impression.to_string(),
                advice: None,
            },
        }
    }

    pub fn with_advice(mut self, advice: &str) -> Self {
        self.sections.advice = Some(advice.to_string());
        self
    }

    /// Identity within a catalog snapshot.
    pub fn identity(&self) -> (&str, &str) {
        (&self.name, self.id.as_str())
    }
}
