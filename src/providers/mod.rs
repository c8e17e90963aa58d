//! Collaborator seams: where templates and study metadata come from, and
//! where finished reports go.
//!
//! Three traits define the boundaries:
//! - TemplateSource: the template catalog backend
//! - MetadataSource: patient/study metadata for one study
//! - UploadSink: the document store receiving the PDF
//!
//! `HttpBackend` implements all three over `reqwest`; `memory` holds the
//! in-process implementations used offline and in tests.

pub mod http;
pub mod memory;

pub use http::{study_uid_from_url, HttpBackend};
pub use memory::{MockUploadSink, RecordedUpload, StaticMetadataSource, StaticTemplateSource};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, UploadError};
use crate::export::ExportedDocument;
use crate::models::{StudyMetadata, Template};

/// Backend response wrapper: `{ "status": "success" | "error", "response": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEnvelope<T> {
    pub status: String,
    #[serde(default = "Vec::new")]
    pub response: Vec<T>,
}

impl<T> SourceEnvelope<T> {
    pub fn success(response: Vec<T>) -> Self {
        Self {
            status: "success".into(),
            response,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }

    /// Unwrap the payload; any status other than "success" is a fetch error.
    pub fn into_response(self) -> Result<Vec<T>, FetchError> {
        if self.is_success() {
            Ok(self.response)
        } else {
            Err(FetchError::SourceStatus(self.status))
        }
    }
}

/// Store acknowledgement: `{ "success": bool, "id": optional }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReceipt {
    pub success: bool,
    #[serde(default, alias = "remoteRef", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Fetch the full template list.
    async fn fetch_templates(&self) -> Result<Vec<Template>, FetchError>;
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch metadata for a study. Backends return a list; only the first
    /// entry is meaningful.
    async fn fetch_metadata(&self, study_uid: &str) -> Result<StudyMetadata, FetchError>;
}

#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Send one complete document for `record_id`. No partial/resumable sends.
    async fn send(
        &self,
        document: &ExportedDocument,
        record_id: &str,
    ) -> Result<SinkReceipt, UploadError>;
}
