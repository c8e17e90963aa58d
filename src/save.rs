//! Save coordinator — drives wrap → layout → export → upload for one session.
//!
//! Only one save runs at a time. Requests arriving while a save is in
//! flight are queued in a single slot; a newer request replaces an older
//! queued one, so the follow-up save always carries the latest snapshot.
//! The caller that started the run drives every queued follow-up and
//! receives the final report.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ErrorKind, ReportError};
use crate::export::{file_name_for, DocumentExporter, ExportedDocument};
use crate::layout::{layout_with, wrap_text, PageGeometry, A4_WRAP_COLUMNS};
use crate::models::StudyMetadata;
use crate::upload::{UploadPipeline, UploadResult};

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePhase {
    Idle,
    Rendering,
    Exporting,
    Uploading,
    Done,
    Failed,
}

impl std::fmt::Display for SavePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Rendering => write!(f, "Rendering"),
            Self::Exporting => write!(f, "Exporting"),
            Self::Uploading => write!(f, "Uploading"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Draft snapshot taken when the user asked to save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub snapshot_id: Uuid,
    pub study_key: String,
    pub template_name: String,
    pub body_text: String,
    pub metadata: StudyMetadata,
    pub requested_at: DateTime<Utc>,
}

impl SaveRequest {
    pub fn new(
        study_key: impl Into<String>,
        template_name: impl Into<String>,
        body_text: impl Into<String>,
        metadata: StudyMetadata,
    ) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            study_key: study_key.into(),
            template_name: template_name.into(),
            body_text: body_text.into(),
            metadata,
            requested_at: Utc::now(),
        }
    }
}

/// Outcome of one save run. `phase` is `Done` or `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub snapshot_id: Uuid,
    pub phase: SavePhase,
    pub page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SaveReport {
    pub fn is_saved(&self) -> bool {
        self.phase == SavePhase::Done
    }

    fn failed(snapshot_id: Uuid, page_count: usize, error: ReportError) -> Self {
        Self {
            snapshot_id,
            phase: SavePhase::Failed,
            page_count,
            file_name: None,
            upload: None,
            error_kind: error.kind(),
            message: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SaveOutcome {
    /// This caller ran the chain; the report is for the last snapshot run.
    Completed(SaveReport),
    /// Another save is in flight; this snapshot replaced the queued one.
    Queued { snapshot_id: Uuid },
}

/// Returns the coordinator to `Idle` when the driving future is dropped
/// before the run finishes. The queued snapshot is discarded; the next
/// save carries a newer one.
struct RunGuard<'a> {
    coordinator: &'a SaveCoordinator,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.coordinator.state();
        let discarded = state.pending.take().map(|r| r.snapshot_id);
        tracing::warn!(
            phase = %state.phase,
            discarded = ?discarded,
            "Save abandoned before completion"
        );
        state.running = false;
        state.phase = SavePhase::Idle;
    }
}

// ─── SaveCoordinator ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct SaveState {
    phase: SavePhase,
    running: bool,
    pending: Option<SaveRequest>,
    last: Option<SaveReport>,
}

pub struct SaveCoordinator {
    pipeline: UploadPipeline,
    geometry: PageGeometry,
    exporter: DocumentExporter,
    wrap_columns: usize,
    state: Mutex<SaveState>,
}

impl SaveCoordinator {
    pub fn new(pipeline: UploadPipeline) -> Self {
        Self {
            pipeline,
            geometry: PageGeometry::a4(),
            exporter: DocumentExporter::a4(),
            wrap_columns: A4_WRAP_COLUMNS,
            state: Mutex::new(SaveState {
                phase: SavePhase::Idle,
                running: false,
                pending: None,
                last: None,
            }),
        }
    }

    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_exporter(mut self, exporter: DocumentExporter) -> Self {
        self.exporter = exporter;
        self
    }

    /// `0` disables wrapping.
    pub fn with_wrap_columns(mut self, columns: usize) -> Self {
        self.wrap_columns = columns;
        self
    }

    fn state(&self) -> MutexGuard<'_, SaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> SavePhase {
        self.state().phase
    }

    pub fn is_saving(&self) -> bool {
        self.state().running
    }

    pub fn last_report(&self) -> Option<SaveReport> {
        self.state().last.clone()
    }

    fn set_phase(&self, phase: SavePhase) {
        let mut state = self.state();
        tracing::debug!(from = %state.phase, to = %phase, "Save phase");
        state.phase = phase;
    }

    /// Request a save of `request`.
    pub async fn save(&self, request: SaveRequest) -> SaveOutcome {
        {
            let mut state = self.state();
            if state.running {
                let snapshot_id = request.snapshot_id;
                if let Some(superseded) = state.pending.replace(request) {
                    tracing::info!(
                        superseded = %superseded.snapshot_id,
                        snapshot = %snapshot_id,
                        "Queued save replaced by newer snapshot"
                    );
                } else {
                    tracing::info!(snapshot = %snapshot_id, "Save queued behind in-flight upload");
                }
                return SaveOutcome::Queued { snapshot_id };
            }
            state.running = true;
        }

        let mut guard = RunGuard {
            coordinator: self,
            armed: true,
        };
        let mut request = request;
        loop {
            let report = self.run(&request).await;

            let next = {
                let mut state = self.state();
                state.last = Some(report.clone());
                let next = state.pending.take();
                if next.is_none() {
                    state.running = false;
                    state.phase = SavePhase::Idle;
                    guard.armed = false;
                }
                next
            };
            match next {
                Some(next) => request = next,
                None => return SaveOutcome::Completed(report),
            }
        }
    }

    async fn run(&self, request: &SaveRequest) -> SaveReport {
        let snapshot_id = request.snapshot_id;
        tracing::info!(
            snapshot = %snapshot_id,
            study_key = %request.study_key,
            "Save started"
        );

        self.set_phase(SavePhase::Rendering);
        let body = if self.wrap_columns > 0 {
            wrap_text(&request.body_text, self.wrap_columns)
        } else {
            request.body_text.clone()
        };
        let document = match layout_with(&body, &request.metadata, &self.geometry) {
            Ok(d) => d,
            Err(e) => return self.finish(SaveReport::failed(snapshot_id, 0, e.into())),
        };
        let page_count = document.page_count();

        self.set_phase(SavePhase::Exporting);
        let exported = match self.exporter.render(&document, &request.template_name) {
            Ok(bytes) => ExportedDocument {
                bytes,
                file_name: file_name_for(&request.template_name),
            },
            Err(e) => return self.finish(SaveReport::failed(snapshot_id, page_count, e.into())),
        };

        self.set_phase(SavePhase::Uploading);
        let upload = self.pipeline.submit(&exported, &request.study_key).await;

        let report = SaveReport {
            snapshot_id,
            phase: if upload.success {
                SavePhase::Done
            } else {
                SavePhase::Failed
            },
            page_count,
            file_name: Some(exported.file_name),
            error_kind: upload.error.as_ref().map(|_| ErrorKind::Upload),
            message: upload.error.as_ref().map(ToString::to_string),
            upload: Some(upload),
        };
        self.finish(report)
    }

    fn finish(&self, report: SaveReport) -> SaveReport {
        self.set_phase(report.phase);
        match report.phase {
            SavePhase::Done => tracing::info!(
                snapshot = %report.snapshot_id,
                pages = report.page_count,
                "Report saved"
            ),
            _ => tracing::warn!(
                snapshot = %report.snapshot_id,
                error_kind = ?report.error_kind,
                "Save failed"
            ),
        }
        report
    }
}
