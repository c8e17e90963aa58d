//! Error kinds for the report pipeline.
//!
//! One enum per stage so a failure in one stage never couples callers to
//! another stage's transport. `ReportError` wraps them for the binary and
//! for code that drives the whole chain.

use serde::Serialize;
use thiserror::Error;

/// Template or metadata retrieval failed. Callers degrade to an empty
/// catalog or a disabled composer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Backend is not reachable at {0}")]
    Connection(String),

    #[error("Backend returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Backend reported status \"{0}\"")]
    SourceStatus(String),

    #[error("No study metadata returned for {0}")]
    EmptyResponse(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Pagination failure. Only malformed geometry can produce one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Invalid page geometry: {0}")]
    InvalidGeometry(String),
}

/// PDF serialization failure.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Layout does not fit the page: {0}")]
    Geometry(String),

    #[error("PDF font error: {0}")]
    Font(String),

    #[error("PDF save error: {0}")]
    Save(String),

    #[error("PDF buffer error: {0}")]
    Buffer(String),

    #[error("Cannot write PDF: {0}")]
    Io(#[from] std::io::Error),
}

/// Upload failure. Stored inside `UploadResult`, hence `Clone + Serialize`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UploadError {
    #[error("Document store is not reachable at {0}")]
    Connection(String),

    #[error("Upload timed out after {0}s")]
    Timeout(u64),

    #[error("Document store returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Document store rejected the upload for {0}")]
    Rejected(String),

    #[error("Invalid upload payload: {0}")]
    Payload(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Misuse of the editing session (composer not active, unknown template).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Study metadata is not loaded; the composer is inactive")]
    MetadataUnavailable,

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("No template selected; editing is disabled")]
    EditingDisabled,

    #[error("Draft is empty; nothing to save")]
    NothingToSave,
}

/// Coarse failure category reported to the user after a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Layout,
    Export,
    Upload,
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl ReportError {
    /// Category for display; session misuse is reported as a fetch problem
    /// only when it stems from missing metadata.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Fetch(_) | Self::Session(SessionError::MetadataUnavailable) => Some(ErrorKind::Fetch),
            Self::Layout(_) => Some(ErrorKind::Layout),
            Self::Export(_) => Some(ErrorKind::Export),
            Self::Upload(_) => Some(ErrorKind::Upload),
            Self::Session(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_serializes_with_kind_tag() {
        let err = UploadError::Status {
            status: 503,
            body: "maintenance".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "status");
        assert_eq!(json["detail"]["status"], 503);
    }

    #[test]
    fn report_error_wraps_stage_errors() {
        let err: ReportError = FetchError::SourceStatus("error".into()).into();
        assert!(matches!(err, ReportError::Fetch(_)));
        assert!(err.to_string().contains("status \"error\""));

        let err: ReportError = SessionError::EditingDisabled.into();
        assert!(err.to_string().contains("editing is disabled"));
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn kind_maps_stage_errors() {
        let err: ReportError = LayoutError::InvalidGeometry("x".into()).into();
        assert_eq!(err.kind(), Some(ErrorKind::Layout));
        let err: ReportError = UploadError::Timeout(30).into();
        assert_eq!(err.kind(), Some(ErrorKind::Upload));
        let err: ReportError = SessionError::MetadataUnavailable.into();
        assert_eq!(err.kind(), Some(ErrorKind::Fetch));
    }
}
