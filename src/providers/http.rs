use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;

use super::{MetadataSource, SinkReceipt, SourceEnvelope, TemplateSource, UploadSink};
use crate::config::ServiceConfig;
use crate::error::{FetchError, UploadError};
use crate::export::{ExportedDocument, PDF_MIME_TYPE};
use crate::models::{StudyMetadata, Template};

/// Query parameter carrying the study UID in viewer URLs.
pub const STUDY_UID_PARAM: &str = "StudyInstanceUIDs";

/// HTTP client for the reporting backend: template list, study metadata
/// and the report document store.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
    templates_endpoint: String,
    metadata_endpoint: String,
    upload_endpoint: String,
}

impl HttpBackend {
    pub fn new(config: &ServiceConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: config.timeout_secs,
            templates_endpoint: config.templates_endpoint.trim_matches('/').to_string(),
            metadata_endpoint: config.metadata_endpoint.trim_matches('/').to_string(),
            upload_endpoint: config.upload_endpoint.trim_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url/endpoint[/record_id]`. The record id is a single
    /// percent-encoded segment even if it contains a slash.
    fn endpoint_url(&self, endpoint: &str, record_id: Option<&str>) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| format!("{} cannot be a base URL", self.base_url))?;
            segments.pop_if_empty().extend(endpoint.split('/'));
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn map_fetch_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_connect() {
            FetchError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            FetchError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            FetchError::HttpClient(e.to_string())
        }
    }

    async fn get_envelope<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Vec<T>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_fetch_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: SourceEnvelope<T> = response
            .json()
            .await
            .map_err(|e| FetchError::ResponseParsing(e.to_string()))?;
        envelope.into_response()
    }
}

#[async_trait]
impl TemplateSource for HttpBackend {
    async fn fetch_templates(&self) -> Result<Vec<Template>, FetchError> {
        let url = self
            .endpoint_url(&self.templates_endpoint, None)
            .map_err(FetchError::HttpClient)?;
        self.get_envelope(url).await
    }
}

#[async_trait]
impl MetadataSource for HttpBackend {
    async fn fetch_metadata(&self, study_uid: &str) -> Result<StudyMetadata, FetchError> {
        let mut url = self
            .endpoint_url(&self.metadata_endpoint, None)
            .map_err(FetchError::HttpClient)?;
        url.query_pairs_mut().append_pair(STUDY_UID_PARAM, study_uid);

        let studies: Vec<StudyMetadata> = self.get_envelope(url).await?;
        studies
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::EmptyResponse(study_uid.to_string()))
    }
}

#[async_trait]
impl UploadSink for HttpBackend {
    async fn send(
        &self,
        document: &ExportedDocument,
        record_id: &str,
    ) -> Result<SinkReceipt, UploadError> {
        let url = self
            .endpoint_url(&self.upload_endpoint, Some(record_id))
            .map_err(UploadError::Payload)?;

        let file = Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(PDF_MIME_TYPE)
            .map_err(|e| UploadError::Payload(e.to_string()))?;
        let form = Form::new()
            .part("file", file)
            .text("fileName", document.file_name.clone());

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    UploadError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    UploadError::Timeout(self.timeout_secs)
                } else {
                    UploadError::Payload(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<SinkReceipt>()
            .await
            .map_err(|e| UploadError::ResponseParsing(e.to_string()))
    }
}

/// Extract the study UID from a viewer URL (`?StudyInstanceUIDs=...`).
/// When several UIDs are listed, the first is used.
pub fn study_uid_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let (_, value) = url.query_pairs().find(|(k, _)| k == STUDY_UID_PARAM)?;
    value
        .split(',')
        .map(str::trim)
        .find(|uid| !uid.is_empty())
        .map(str::to_string)
}
