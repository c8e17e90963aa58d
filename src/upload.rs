//! Upload pipeline — hands a finished PDF to the document store.
//!
//! `submit` never returns an error: every failure is folded into an
//! `UploadResult` so the caller can surface it and keep the draft. No
//! automatic retry; a retry is a new save.

use std::sync::Arc;

use serde::Serialize;

use crate::error::UploadError;
use crate::export::ExportedDocument;
use crate::providers::UploadSink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UploadError>,
}

impl UploadResult {
    pub fn succeeded(remote_ref: Option<String>) -> Self {
        Self {
            success: true,
            remote_ref,
            error: None,
        }
    }

    pub fn failed(error: UploadError) -> Self {
        Self {
            success: false,
            remote_ref: None,
            error: Some(error),
        }
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    sink: Arc<dyn UploadSink>,
}

impl UploadPipeline {
    pub fn new(sink: Arc<dyn UploadSink>) -> Self {
        Self { sink }
    }

    /// Send `document` as the report for `study_key`.
    pub async fn submit(&self, document: &ExportedDocument, study_key: &str) -> UploadResult {
        let study_key = study_key.trim();
        if study_key.is_empty() {
            return UploadResult::failed(UploadError::Payload("study key is empty".into()));
        }
        if document.bytes.is_empty() {
            return UploadResult::failed(UploadError::Payload("document is empty".into()));
        }

        tracing::info!(
            study_key = study_key,
            file_name = %document.file_name,
            size_bytes = document.size_bytes(),
            "Uploading report"
        );

        match self.sink.send(document, study_key).await {
            Ok(receipt) if receipt.success => {
                tracing::info!(study_key = study_key, remote_ref = ?receipt.id, "Report uploaded");
                UploadResult::succeeded(receipt.id)
            }
            Ok(_) => {
                tracing::warn!(study_key = study_key, "Document store rejected report");
                UploadResult::failed(UploadError::Rejected(study_key.to_string()))
            }
            Err(e) => {
                tracing::warn!(study_key = study_key, error = %e, "Report upload failed");
                UploadResult::failed(e)
            }
        }
    }
}
