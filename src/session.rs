//! Session state: the single owner of form, status and artifact.
//!
//! Everything the rendering layer shows is derived from one [`Session`],
//! and every change goes through one of its transition methods. The methods
//! are synchronous; the async driver in [`crate::controller`] calls them as
//! network and render completions arrive.
//!
//! ```text
//!            begin_submission            complete_submission
//!   Empty ─────────────────▶ Pending(id) ─────────────────▶ Ready
//!     ▲                         ▲    │                       │
//!     │ teardown                │    └──────────────▶ Failed(message)
//!     │                         └──────── begin_submission ──┘
//! ```
//!
//! Completions carry the [`SubmissionId`] that spawned them. Anything
//! tagged with an id other than the latest one is stale and is dropped
//! without touching state. The one exception is the preview of an artifact
//! that stayed current because a later submission failed; that preview can
//! be restarted with [`Session::restart_preview`].

use crate::artifact::{Artifact, ArtifactManager};
use crate::config::StudioConfig;
use crate::error::{DownloadError, PreviewError, ValidationError};
use crate::form::{SubmissionForm, SubmissionInput};
use crate::pipeline::download::DownloadSink;
use crate::pipeline::render::PreviewPage;
use crate::pipeline::response::SubmissionResult;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Identity of one submission, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubmissionId(u64);

impl SubmissionId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the session is in its request/response cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum Status {
    /// Nothing submitted yet.
    Empty,
    /// A request is outstanding; the submit trigger is disabled.
    Pending(SubmissionId),
    /// The latest submission produced an artifact.
    Ready,
    /// The latest submission failed. Carries no artifact; a previously ready
    /// artifact stays with the artifact manager.
    Failed(String),
}

/// A submission that has passed validation and is now in flight.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub id: SubmissionId,
    pub input: SubmissionInput,
}

/// What [`Session::complete_submission`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A new artifact replaced the old one. Start a preview of `document`
    /// when `render_preview` is set.
    Ready {
        id: SubmissionId,
        filename: String,
        document: Bytes,
        render_preview: bool,
    },
    /// The submission failed; artifact untouched.
    Failed { id: SubmissionId, message: String },
    /// The completion was for a submission that is no longer pending.
    Stale { id: SubmissionId },
}

/// Snapshot of everything a rendering layer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub status: Status,
    pub can_submit: bool,
    pub filename: Option<String>,
    pub download_uri: Option<String>,
    pub artifact_submission: Option<SubmissionId>,
    pub preview_pages: usize,
    pub preview_rendering: bool,
    pub preview_error: Option<String>,
    pub live_references: usize,
}

/// One user's form, request state and current artifact.
#[derive(Debug)]
pub struct Session {
    form: SubmissionForm,
    status: Status,
    artifacts: ArtifactManager,
    render_preview: bool,
    next_id: u64,
    latest: Option<SubmissionId>,
}

impl Session {
    pub fn new(config: &StudioConfig) -> Self {
        Self {
            form: SubmissionForm::new(config.default_template),
            status: Status::Empty,
            artifacts: ArtifactManager::new(),
            render_preview: config.render_preview,
            next_id: 0,
            latest: None,
        }
    }

    pub fn form(&self) -> &SubmissionForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut SubmissionForm {
        &mut self.form
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifacts.current()
    }

    pub fn artifacts(&self) -> &ArtifactManager {
        &self.artifacts
    }

    /// The most recently started submission.
    pub fn latest_submission(&self) -> Option<SubmissionId> {
        self.latest
    }

    /// Whether the submit trigger is enabled.
    pub fn can_submit(&self) -> bool {
        !matches!(self.status, Status::Pending(_))
    }

    /// Validate the form and enter `Pending`.
    ///
    /// Rejections leave the session untouched and never reach the network.
    /// On success a preview still rendering for the current artifact is
    /// interrupted: its remaining pages belong to a superseded submission.
    pub fn begin_submission(&mut self) -> Result<PendingSubmission, ValidationError> {
        if !self.can_submit() {
            return Err(ValidationError::SubmissionInFlight);
        }
        let input = self.form.validate()?;

        if self.artifacts.interrupt_preview() {
            debug!("Interrupted preview of the current artifact");
        }
        self.next_id += 1;
        let id = SubmissionId(self.next_id);
        self.status = Status::Pending(id);
        self.latest = Some(id);
        info!("Submission {} started ({})", id, input.resume.name);

        Ok(PendingSubmission { id, input })
    }

    /// Apply the outcome of submission `id`.
    pub fn complete_submission(&mut self, id: SubmissionId, result: SubmissionResult) -> Transition {
        if self.status != Status::Pending(id) {
            warn!("Dropping stale result for submission {}", id);
            return Transition::Stale { id };
        }

        match result {
            SubmissionResult::Success {
                bytes,
                suggested_name,
            } => {
                let artifact =
                    self.artifacts
                        .replace(id, bytes, suggested_name, self.render_preview);
                let transition = Transition::Ready {
                    id,
                    filename: artifact.filename().to_string(),
                    document: artifact.bytes().clone(),
                    render_preview: self.render_preview,
                };
                self.status = Status::Ready;
                transition
            }
            SubmissionResult::Failure { message } => {
                info!("Submission {} failed: {}", id, message);
                self.status = Status::Failed(message.clone());
                Transition::Failed { id, message }
            }
        }
    }

    /// Add a rendered page for submission `id`. Returns `false` when stale.
    pub fn apply_preview_page(&mut self, id: SubmissionId, page: PreviewPage) -> bool {
        if !self.accepts_preview(id) {
            debug!("Discarding preview page {} of stale submission {}", page.page_num(), id);
            return false;
        }
        self.artifacts.push_preview_page(id, page)
    }

    /// Mark the preview of submission `id` complete. Returns `false` when stale.
    pub fn finish_preview(&mut self, id: SubmissionId) -> bool {
        self.accepts_preview(id) && self.artifacts.finish_preview(id)
    }

    /// Record a preview failure for submission `id`. Returns `false` when stale.
    pub fn fail_preview(&mut self, id: SubmissionId, error: PreviewError) -> bool {
        if !self.accepts_preview(id) {
            return false;
        }
        warn!("Preview of submission {} failed: {}", id, error);
        self.artifacts.fail_preview(id, error)
    }

    /// Preview events belong to the latest submission, or to the artifact
    /// still on display after a later submission failed.
    fn accepts_preview(&self, id: SubmissionId) -> bool {
        if self.latest == Some(id) {
            return true;
        }
        !matches!(self.status, Status::Pending(_))
            && self.artifacts.current().map(Artifact::submission) == Some(id)
    }

    /// Render the current artifact's preview again after it was interrupted
    /// or failed. Returns the submission and document to render, or `None`
    /// when a request is pending or the preview needs no restart.
    pub fn restart_preview(&mut self) -> Option<(SubmissionId, Bytes)> {
        if !self.can_submit() {
            return None;
        }
        self.artifacts.restart_preview()
    }

    /// Save the current artifact through `sink`. No state changes.
    pub fn trigger_download(&self, sink: &dyn DownloadSink) -> Result<PathBuf, DownloadError> {
        self.artifacts.trigger_download(sink)
    }

    /// Release the artifact and forget all submissions.
    pub fn teardown(&mut self) {
        self.artifacts.teardown();
        self.status = Status::Empty;
        self.latest = None;
        debug!("Session torn down");
    }

    pub fn view(&self) -> SessionView {
        let artifact = self.artifacts.current();
        let preview = artifact.map(|a| a.preview());
        SessionView {
            status: self.status.clone(),
            can_submit: self.can_submit(),
            filename: artifact.map(|a| a.filename().to_string()),
            download_uri: artifact.map(|a| a.handle().uri()),
            artifact_submission: artifact.map(Artifact::submission),
            preview_pages: preview.map_or(0, |p| p.pages().len()),
            preview_rendering: preview.is_some_and(|p| p.is_rendering()),
            preview_error: preview.and_then(|p| p.error()).map(|e| e.to_string()),
            live_references: self.artifacts.store().live_count(),
        }
    }
}
