//! End-to-end checks of the reqwest adapters against an in-process axum
//! backend serving the template, study and report endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::Mutex;

use radreport_lib::catalog::{builtin_templates, TemplateCatalog};
use radreport_lib::config::ServiceConfig;
use radreport_lib::error::{FetchError, UploadError};
use radreport_lib::export::ExportedDocument;
use radreport_lib::models::{StudyMetadata, TemplateId};
use radreport_lib::providers::{HttpBackend, MetadataSource, TemplateSource, UploadSink};
use radreport_lib::save::{SaveCoordinator, SaveOutcome};
use radreport_lib::session::ReportSession;
use radreport_lib::upload::UploadPipeline;

const UID: &str = "1.2.840.113619.2.55";

#[derive(Clone, Copy)]
struct Behaviour {
    source_status: &'static str,
    accept_uploads: bool,
    upload_status: StatusCode,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            source_status: "success",
            accept_uploads: true,
            upload_status: StatusCode::OK,
        }
    }
}

#[derive(Debug, Clone)]
struct ReceivedUpload {
    record_id: String,
    file_name: Option<String>,
    content_type: Option<String>,
    field_file_name: Option<String>,
    bytes: Vec<u8>,
}

struct MockBackend {
    behaviour: Behaviour,
    uploads: Mutex<Vec<ReceivedUpload>>,
}

fn study() -> StudyMetadata {
    StudyMetadata {
        patient_id: "121".into(),
        patient_name: "Karan".into(),
        date: "8/30/2023, 10:15:00 AM".into(),
        location: "Ward 3".into(),
        referring_physician: "#01112".into(),
        study_instance_uid: UID.into(),
        patient_age: None,
        patient_sex: None,
    }
}

async fn handle_templates(State(state): State<Arc<MockBackend>>) -> impl IntoResponse {
    Json(json!({
        "status": state.behaviour.source_status,
        "response": builtin_templates(),
    }))
}

async fn handle_studies(
    State(state): State<Arc<MockBackend>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let response: Vec<StudyMetadata> = match params.get("StudyInstanceUIDs") {
        Some(uid) if uid == UID => vec![study()],
        _ => Vec::new(),
    };
    Json(json!({
        "status": state.behaviour.source_status,
        "response": response,
    }))
}

async fn handle_report_upload(
    State(state): State<Arc<MockBackend>>,
    Path(record_id): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if state.behaviour.upload_status != StatusCode::OK {
        return (state.behaviour.upload_status, "store unavailable").into_response();
    }

    let mut received = ReceivedUpload {
        record_id,
        file_name: None,
        content_type: None,
        field_file_name: None,
        bytes: Vec::new(),
    };
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "fileName" => {
                received.field_file_name = Some(field.text().await.unwrap_or_default());
            }
            "file" => {
                received.file_name = field.file_name().map(str::to_string);
                received.content_type = field.content_type().map(str::to_string);
                received.bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            }
            _ => {}
        }
    }

    let id = format!("doc-{}", received.record_id);
    state.uploads.lock().await.push(received);
    Json(json!({ "success": state.behaviour.accept_uploads, "id": id })).into_response()
}

async fn spawn_backend(behaviour: Behaviour) -> (HttpBackend, Arc<MockBackend>) {
    let state = Arc::new(MockBackend {
        behaviour,
        uploads: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/api/templates", get(handle_templates))
        .route("/api/studies", get(handle_studies))
        .route("/api/reports/:record_id", post(handle_report_upload))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let backend = HttpBackend::new(&ServiceConfig {
        api_url: format!("http://{addr}/api"),
        timeout_secs: 5,
        ..ServiceConfig::default()
    })
    .unwrap();
    (backend, state)
}

fn pdf(name: &str) -> ExportedDocument {
    ExportedDocument {
        bytes: b"%PDF-1.3\n%test".to_vec(),
        file_name: name.into(),
    }
}

#[tokio::test]
async fn fetches_template_catalog() {
    let (backend, _) = spawn_backend(Behaviour::default()).await;
    let templates = backend.fetch_templates().await.unwrap();
    assert_eq!(templates, builtin_templates());
}

#[tokio::test]
async fn error_envelope_degrades_to_empty_catalog() {
    let (backend, _) = spawn_backend(Behaviour {
        source_status: "error",
        ..Behaviour::default()
    })
    .await;

    assert_eq!(
        backend.fetch_templates().await.unwrap_err(),
        FetchError::SourceStatus("error".into())
    );
    let catalog = TemplateCatalog::load_or_empty(&backend).await;
    assert!(!catalog.is_available());
}

#[tokio::test]
async fn fetches_metadata_by_study_uid() {
    let (backend, _) = spawn_backend(Behaviour::default()).await;
    assert_eq!(backend.fetch_metadata(UID).await.unwrap(), study());
    assert_eq!(
        backend.fetch_metadata("9.9.9").await.unwrap_err(),
        FetchError::EmptyResponse("9.9.9".into())
    );
}

#[tokio::test]
async fn unreachable_backend_is_connection_error() {
    let backend = HttpBackend::new(&ServiceConfig {
        api_url: "http://127.0.0.1:1/api".into(),
        timeout_secs: 2,
        ..ServiceConfig::default()
    })
    .unwrap();
    assert!(matches!(
        backend.fetch_templates().await,
        Err(FetchError::Connection(_))
    ));
}

#[tokio::test]
async fn uploads_multipart_report() {
    let (backend, state) = spawn_backend(Behaviour::default()).await;
    let receipt = backend.send(&pdf("X-RAY_HEEL.pdf"), UID).await.unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.id.as_deref(), Some(format!("doc-{UID}").as_str()));

    let uploads = state.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert_eq!(upload.record_id, UID);
    assert_eq!(upload.file_name.as_deref(), Some("X-RAY_HEEL.pdf"));
    assert_eq!(upload.field_file_name.as_deref(), Some("X-RAY_HEEL.pdf"));
    assert_eq!(upload.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(upload.bytes, pdf("X-RAY_HEEL.pdf").bytes);
}

#[tokio::test]
async fn store_rejection_is_unsuccessful_result() {
    let (backend, state) = spawn_backend(Behaviour {
        accept_uploads: false,
        ..Behaviour::default()
    })
    .await;

    let pipeline = UploadPipeline::new(Arc::new(backend));
    let result = pipeline.submit(&pdf("X-RAY_HEEL.pdf"), UID).await;
    assert!(!result.success);
    assert_eq!(result.error, Some(UploadError::Rejected(UID.into())));
    // exactly one attempt
    assert_eq!(state.uploads.lock().await.len(), 1);
}

#[tokio::test]
async fn http_error_status_is_upload_error() {
    let (backend, _) = spawn_backend(Behaviour {
        upload_status: StatusCode::SERVICE_UNAVAILABLE,
        ..Behaviour::default()
    })
    .await;

    let err = backend.send(&pdf("X-RAY_HEEL.pdf"), UID).await.unwrap_err();
    assert_eq!(
        err,
        UploadError::Status {
            status: 503,
            body: "store unavailable".into(),
        }
    );
}

#[tokio::test]
async fn session_to_upload_round_trip() {
    let (backend, state) = spawn_backend(Behaviour::default()).await;
    let backend = Arc::new(backend);

    let mut session = ReportSession::start(backend.as_ref(), backend.as_ref(), UID).await;
    assert!(session.can_select_template());
    session
        .select_template(Some(&TemplateId::from("builtin-heel")))
        .unwrap();
    let draft = session.draft().body_text().to_string();
    assert!(draft.starts_with("X-RAY HEEL"));

    let coordinator = SaveCoordinator::new(UploadPipeline::new(backend.clone()));
    let SaveOutcome::Completed(report) = coordinator.save(session.save_request().unwrap()).await
    else {
        panic!("save must run");
    };
    assert!(report.is_saved());
    assert_eq!(report.page_count, 1);
    // the draft survives a save
    assert_eq!(session.draft().body_text(), draft);

    let uploads = state.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].record_id, UID);
    assert_eq!(uploads[0].file_name.as_deref(), Some("X-RAY_HEEL.pdf"));

    let pdf = lopdf::Document::load_mem(&uploads[0].bytes).unwrap();
    assert_eq!(pdf.get_pages().len(), 1);
}
