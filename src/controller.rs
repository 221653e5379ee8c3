//! Async driver around a [`Session`].
//!
//! [`Studio`] owns the session and runs the slow work off to the side: the
//! multipart request and the page preview each run as a spawned task and
//! report back over one channel. Events are applied on the caller's task,
//! one at a time, so the session is never touched concurrently.
//!
//! ```text
//!  submit() ──▶ request task ──┐
//!                              ├──▶ StudioEvent ──▶ next_update() ──▶ Session
//!  Ready ────▶ preview task ───┘
//! ```
//!
//! A UI loop calls [`Studio::next_update`] (or polls
//! [`Studio::try_next_update`]) and redraws from [`Session::view`]. One-shot
//! callers use [`Studio::run_until_settled`].

use crate::artifact::PreviewState;
use crate::config::StudioConfig;
use crate::error::{DownloadError, PreviewError, StudioError, SubmitError, ValidationError};
use crate::form::SubmissionForm;
use crate::pipeline::download::DownloadSink;
use crate::pipeline::render::{render_stream, PdfiumRenderer, PreviewPage, PreviewRenderer};
use crate::pipeline::request::GenerationClient;
use crate::pipeline::response::SubmissionResult;
use crate::progress::{NoopObserver, Observer};
use crate::session::{Session, SessionView, Status, SubmissionId, Transition};
use bytes::Bytes;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Completions reported by background tasks.
#[derive(Debug)]
pub enum StudioEvent {
    /// The request for `id` finished.
    Generated {
        id: SubmissionId,
        result: SubmissionResult,
    },
    /// One preview page of `id` was rendered by render number `epoch`.
    PreviewPage {
        id: SubmissionId,
        epoch: u64,
        page: PreviewPage,
    },
    /// Render number `epoch` of `id` ended; `error` is set when it failed.
    PreviewDone {
        id: SubmissionId,
        epoch: u64,
        error: Option<PreviewError>,
    },
}

/// What applying one [`StudioEvent`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Ready { id: SubmissionId, filename: String },
    Failed { id: SubmissionId, message: String },
    PreviewPage {
        id: SubmissionId,
        page_num: usize,
        total_pages: usize,
    },
    PreviewComplete { id: SubmissionId, page_count: usize },
    PreviewFailed { id: SubmissionId, error: String },
    /// The event belonged to a superseded submission and was dropped.
    Discarded { id: SubmissionId },
}

/// Session plus the machinery that feeds it.
///
/// [`Studio::submit`] spawns onto the current Tokio runtime and must be
/// called from within one.
pub struct Studio {
    session: Session,
    client: GenerationClient,
    renderer: Arc<dyn PreviewRenderer>,
    observer: Observer,
    events_tx: mpsc::UnboundedSender<StudioEvent>,
    events_rx: mpsc::UnboundedReceiver<StudioEvent>,
    request_cancel: Option<CancellationToken>,
    preview_cancel: Option<CancellationToken>,
    preview_epoch: u64,
}

impl Studio {
    pub fn new(config: &StudioConfig, renderer: Arc<dyn PreviewRenderer>) -> Result<Self, StudioError> {
        let client = GenerationClient::new(config)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            session: Session::new(config),
            client,
            renderer,
            observer: Arc::new(NoopObserver),
            events_tx,
            events_rx,
            request_cancel: None,
            preview_cancel: None,
            preview_epoch: 0,
        })
    }

    /// A studio previewing through pdfium.
    pub fn with_pdfium(config: &StudioConfig) -> Result<Self, StudioError> {
        Self::new(config, Arc::new(PdfiumRenderer::new(config)))
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn form_mut(&mut self) -> &mut SubmissionForm {
        self.session.form_mut()
    }

    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Validate the form and send it.
    ///
    /// Returns immediately; the outcome arrives through
    /// [`Studio::next_update`]. A rejected form sends nothing.
    pub fn submit(&mut self) -> Result<SubmissionId, ValidationError> {
        let pending = self.session.begin_submission()?;
        let id = pending.id;

        if let Some(token) = self.preview_cancel.take() {
            token.cancel();
        }
        self.observer.on_submission_start(id);

        let cancel = CancellationToken::new();
        self.request_cancel = Some(cancel.clone());
        let client = self.client.clone();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SubmitError::Cancelled),
                outcome = client.generate(&pending.input) => outcome,
            };
            if matches!(outcome, Err(SubmitError::Cancelled)) {
                debug!("Request for submission {} cancelled", id);
                return;
            }
            let _ = events.send(StudioEvent::Generated {
                id,
                result: outcome.into(),
            });
        });

        Ok(id)
    }

    /// Wait for the next background completion and apply it.
    ///
    /// Waits forever when nothing is in flight; check
    /// [`Studio::is_settled`] first.
    pub async fn next_update(&mut self) -> Option<Update> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    /// Apply a completion if one is already queued.
    pub fn try_next_update(&mut self) -> Option<Update> {
        let event = self.events_rx.try_recv().ok()?;
        Some(self.apply(event))
    }

    /// No request outstanding and no preview rendering.
    pub fn is_settled(&self) -> bool {
        let view = self.session.view();
        !matches!(view.status, Status::Pending(_)) && !view.preview_rendering
    }

    /// Apply completions until [`Studio::is_settled`].
    pub async fn run_until_settled(&mut self) -> SessionView {
        while !self.is_settled() {
            if self.next_update().await.is_none() {
                break;
            }
        }
        self.session.view()
    }

    /// Render the current artifact's preview again.
    ///
    /// Applies to a preview that was interrupted by a later submission or
    /// that failed. Returns `false` when there is nothing to restart or a
    /// request is pending.
    pub fn rerender_preview(&mut self) -> bool {
        match self.session.restart_preview() {
            Some((id, document)) => {
                self.start_preview(id, document);
                true
            }
            None => false,
        }
    }

    /// Save the current artifact through `sink`.
    pub fn trigger_download(&self, sink: &dyn DownloadSink) -> Result<PathBuf, DownloadError> {
        self.session.trigger_download(sink)
    }

    /// Check the service's health route.
    pub async fn health(&self) -> Result<bool, SubmitError> {
        self.client.health().await
    }

    /// Abandon in-flight work and release the artifact.
    pub fn shutdown(&mut self) {
        self.cancel_tasks();
        self.session.teardown();
        info!("Studio shut down");
    }

    fn cancel_tasks(&mut self) {
        for token in [self.request_cancel.take(), self.preview_cancel.take()]
            .into_iter()
            .flatten()
        {
            token.cancel();
        }
    }

    fn apply(&mut self, event: StudioEvent) -> Update {
        match event {
            StudioEvent::Generated { id, result } => self.apply_generated(id, result),
            StudioEvent::PreviewPage { id, epoch, .. }
            | StudioEvent::PreviewDone { id, epoch, .. }
                if epoch != self.preview_epoch =>
            {
                debug!("Dropping event of superseded render {} for {}", epoch, id);
                Update::Discarded { id }
            }
            StudioEvent::PreviewPage { id, page, .. } => {
                let (page_num, total_pages) = (page.page_num(), page.page_count);
                if !self.session.apply_preview_page(id, page) {
                    return Update::Discarded { id };
                }
                self.observer.on_preview_page(id, page_num, total_pages);
                Update::PreviewPage {
                    id,
                    page_num,
                    total_pages,
                }
            }
            StudioEvent::PreviewDone {
                id, error: None, ..
            } => {
                if !self.session.finish_preview(id) {
                    return Update::Discarded { id };
                }
                let view = self.session.view();
                if let Some(error) = view.preview_error {
                    self.observer.on_preview_failed(id, &error);
                    return Update::PreviewFailed { id, error };
                }
                self.observer.on_preview_complete(id, view.preview_pages);
                Update::PreviewComplete {
                    id,
                    page_count: view.preview_pages,
                }
            }
            StudioEvent::PreviewDone {
                id,
                error: Some(error),
                ..
            } => {
                let message = error.to_string();
                if !self.session.fail_preview(id, error) {
                    return Update::Discarded { id };
                }
                self.observer.on_preview_failed(id, &message);
                Update::PreviewFailed { id, error: message }
            }
        }
    }

    fn apply_generated(&mut self, id: SubmissionId, result: SubmissionResult) -> Update {
        self.request_cancel = None;
        match self.session.complete_submission(id, result) {
            Transition::Ready {
                id,
                filename,
                document,
                render_preview,
            } => {
                self.observer.on_artifact_ready(id, &filename, document.len());
                if render_preview {
                    self.start_preview(id, document);
                }
                Update::Ready { id, filename }
            }
            Transition::Failed { id, message } => {
                self.observer.on_submission_failed(id, &message);
                let interrupted = matches!(
                    self.session.artifact().map(|a| a.preview()),
                    Some(PreviewState::Interrupted { .. })
                );
                if interrupted && self.rerender_preview() {
                    debug!("Re-rendering preview of the artifact kept after {}", id);
                }
                Update::Failed { id, message }
            }
            Transition::Stale { id } => Update::Discarded { id },
        }
    }

    fn start_preview(&mut self, id: SubmissionId, document: Bytes) {
        let cancel = CancellationToken::new();
        if let Some(old) = self.preview_cancel.replace(cancel.clone()) {
            old.cancel();
        }
        self.preview_epoch += 1;
        let epoch = self.preview_epoch;

        let mut pages = render_stream(self.renderer.clone(), document, cancel);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let mut error = None;
            while let Some(item) = pages.next().await {
                match item {
                    Ok(page) => {
                        if events
                            .send(StudioEvent::PreviewPage { id, epoch, page })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        error = Some(e);
                        break;
                    }
                }
            }
            let _ = events.send(StudioEvent::PreviewDone { id, epoch, error });
        });
        debug!("Preview of submission {} started", id);
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}
