use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{MetadataSource, SinkReceipt, TemplateSource, UploadSink};
use crate::error::{FetchError, UploadError};
use crate::export::ExportedDocument;
use crate::models::{StudyMetadata, Template};

/// Template source backed by a fixed list (or a fixed failure).
pub struct StaticTemplateSource {
    result: Result<Vec<Template>, FetchError>,
}

impl StaticTemplateSource {
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            result: Ok(templates),
        }
    }

    pub fn failing(error: FetchError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl TemplateSource for StaticTemplateSource {
    async fn fetch_templates(&self) -> Result<Vec<Template>, FetchError> {
        self.result.clone()
    }
}

/// Metadata source backed by an in-memory map keyed by study UID.
#[derive(Default)]
pub struct StaticMetadataSource {
    studies: HashMap<String, StudyMetadata>,
    failure: Option<FetchError>,
}

impl StaticMetadataSource {
    pub fn new(studies: Vec<StudyMetadata>) -> Self {
        Self {
            studies: studies
                .into_iter()
                .map(|s| (s.study_instance_uid.clone(), s))
                .collect(),
            failure: None,
        }
    }

    pub fn failing(error: FetchError) -> Self {
        Self {
            studies: HashMap::new(),
            failure: Some(error),
        }
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    async fn fetch_metadata(&self, study_uid: &str) -> Result<StudyMetadata, FetchError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        self.studies
            .get(study_uid)
            .cloned()
            .ok_or_else(|| FetchError::EmptyResponse(study_uid.to_string()))
    }
}

/// One document received by `MockUploadSink`.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub record_id: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Mock document store for testing — records every send and answers with
/// a configurable receipt or error.
///
/// `gated()` makes every send wait for a permit from `release()`, which lets
/// tests hold an upload "in flight".
pub struct MockUploadSink {
    response: Result<SinkReceipt, UploadError>,
    uploads: Mutex<Vec<RecordedUpload>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockUploadSink {
    pub fn accepting() -> Self {
        Self::with_response(Ok(SinkReceipt {
            success: true,
            id: None,
        }))
    }

    pub fn with_response(response: Result<SinkReceipt, UploadError>) -> Self {
        Self {
            response,
            uploads: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` gated sends complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().map(|u| u.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UploadSink for MockUploadSink {
    async fn send(
        &self,
        document: &ExportedDocument,
        record_id: &str,
    ) -> Result<SinkReceipt, UploadError> {
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(RecordedUpload {
                record_id: record_id.to_string(),
                file_name: document.file_name.clone(),
                bytes: document.bytes.clone(),
            });
        }
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.response.clone()
    }
}
