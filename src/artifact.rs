//! Artifact lifecycle: revocable download references and preview state.
//!
//! A generated letter lives in a [`DownloadStore`] behind a
//! [`DownloadHandle`]. Handles are deliberately not `Clone` and
//! [`DownloadStore::revoke`] consumes them, so a handle can be revoked at
//! most once and cannot be used afterwards. The [`ArtifactManager`] owns the
//! single current [`Artifact`] and always revokes the old handle before it
//! creates a new one, which keeps the number of live references per session
//! at zero or one.

use crate::error::{DownloadError, PreviewError};
use crate::pipeline::download::DownloadSink;
use crate::pipeline::render::PreviewPage;
use crate::session::SubmissionId;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A revocable reference to bytes held in a [`DownloadStore`].
pub struct DownloadHandle {
    id: u64,
    revoked: bool,
}

impl DownloadHandle {
    /// Stable identifier, usable as a download target.
    pub fn uri(&self) -> String {
        format!("artifact://{}", self.id)
    }
}

impl fmt::Debug for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DownloadHandle").field(&self.id).finish()
    }
}

impl Drop for DownloadHandle {
    fn drop(&mut self) {
        if !self.revoked {
            warn!("{} dropped without being revoked", self.uri());
        }
    }
}

/// In-memory backing store for download references.
#[derive(Debug, Default)]
pub struct DownloadStore {
    entries: HashMap<u64, Bytes>,
    next_id: u64,
    created: u64,
    revoked: u64,
}

impl DownloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a handle to them.
    pub fn create_download_reference(&mut self, bytes: Bytes) -> DownloadHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(id, bytes);
        self.created += 1;
        debug!("Created artifact://{}", id);
        DownloadHandle { id, revoked: false }
    }

    /// Invalidate `handle` and free its bytes.
    pub fn revoke(&mut self, mut handle: DownloadHandle) {
        handle.revoked = true;
        if self.entries.remove(&handle.id).is_some() {
            self.revoked += 1;
            debug!("Revoked {}", handle.uri());
        }
    }

    /// The bytes behind `handle`, if it is still live.
    pub fn resolve(&self, handle: &DownloadHandle) -> Option<&Bytes> {
        self.entries.get(&handle.id)
    }

    /// Number of un-revoked references.
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Total references ever created.
    pub fn created_count(&self) -> u64 {
        self.created
    }

    /// Total references revoked.
    pub fn revoked_count(&self) -> u64 {
        self.revoked
    }
}

/// Progress of an artifact's page preview.
#[derive(Debug, Clone)]
pub enum PreviewState {
    /// Pages arriving; the list grows in page order.
    Rendering { pages: Vec<PreviewPage> },
    /// Every page rendered.
    Complete { pages: Vec<PreviewPage> },
    /// Decoding or rendering failed; `pages` holds what arrived before.
    Failed {
        pages: Vec<PreviewPage>,
        error: PreviewError,
    },
    /// A newer submission started before rendering finished; later pages
    /// of this render are ignored.
    Interrupted { pages: Vec<PreviewPage> },
    /// Preview rendering is turned off.
    Disabled,
}

impl PreviewState {
    pub fn pages(&self) -> &[PreviewPage] {
        match self {
            PreviewState::Rendering { pages }
            | PreviewState::Complete { pages }
            | PreviewState::Interrupted { pages }
            | PreviewState::Failed { pages, .. } => pages,
            PreviewState::Disabled => &[],
        }
    }

    pub fn error(&self) -> Option<&PreviewError> {
        match self {
            PreviewState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_rendering(&self) -> bool {
        matches!(self, PreviewState::Rendering { .. })
    }
}

/// The generated document plus its download reference and preview.
#[derive(Debug)]
pub struct Artifact {
    submission: SubmissionId,
    handle: DownloadHandle,
    filename: String,
    bytes: Bytes,
    preview: PreviewState,
}

impl Artifact {
    pub fn submission(&self) -> SubmissionId {
        self.submission
    }

    pub fn handle(&self) -> &DownloadHandle {
        &self.handle
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    /// Release the artifact's download reference.
    pub fn release(self, store: &mut DownloadStore) {
        debug!(
            "Releasing artifact '{}' of submission {}",
            self.filename, self.submission
        );
        store.revoke(self.handle);
    }
}

/// Owns the current artifact and the store its handle points into.
#[derive(Debug, Default)]
pub struct ArtifactManager {
    store: DownloadStore,
    current: Option<Artifact>,
}

impl ArtifactManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Artifact> {
        self.current.as_ref()
    }

    pub fn store(&self) -> &DownloadStore {
        &self.store
    }

    /// Supersede the current artifact with freshly generated bytes.
    ///
    /// Order: revoke the previous reference, drop the previous preview,
    /// store the new bytes, create the new reference.
    pub fn replace(
        &mut self,
        submission: SubmissionId,
        bytes: Bytes,
        filename: String,
        render_preview: bool,
    ) -> &Artifact {
        if let Some(previous) = self.current.take() {
            previous.release(&mut self.store);
        }

        let handle = self.store.create_download_reference(bytes.clone());
        info!(
            "Artifact ready: '{}' ({} bytes) as {}",
            filename,
            bytes.len(),
            handle.uri()
        );
        let preview = if render_preview {
            PreviewState::Rendering { pages: Vec::new() }
        } else {
            PreviewState::Disabled
        };

        self.current.insert(Artifact {
            submission,
            handle,
            filename,
            bytes,
            preview,
        })
    }

    /// Append a rendered page to the current artifact's preview.
    ///
    /// Returns `false` (and changes nothing) unless the current artifact
    /// belongs to `submission` and its preview is still rendering.
    pub fn push_preview_page(&mut self, submission: SubmissionId, page: PreviewPage) -> bool {
        match self.rendering_preview(submission) {
            Some(PreviewState::Rendering { pages }) => {
                pages.push(page);
                true
            }
            _ => false,
        }
    }

    /// Mark the preview as complete.
    ///
    /// A render that ended before every page arrived settles as `Failed`.
    pub fn finish_preview(&mut self, submission: SubmissionId) -> bool {
        self.settle_preview(submission, |pages| {
            let expected = pages.first().map_or(0, |p| p.page_count);
            if pages.len() < expected {
                let error = PreviewError::Internal(format!(
                    "Preview stopped after {} of {} pages",
                    pages.len(),
                    expected
                ));
                PreviewState::Failed { pages, error }
            } else {
                PreviewState::Complete { pages }
            }
        })
    }

    /// Mark the preview as failed. The download reference is untouched.
    pub fn fail_preview(&mut self, submission: SubmissionId, error: PreviewError) -> bool {
        self.settle_preview(submission, |pages| PreviewState::Failed { pages, error })
    }

    /// Stop accepting pages for the current preview, keeping what arrived.
    pub fn interrupt_preview(&mut self) -> bool {
        match self.current.as_ref().map(Artifact::submission) {
            Some(submission) => {
                self.settle_preview(submission, |pages| PreviewState::Interrupted { pages })
            }
            None => false,
        }
    }

    /// Start the current preview over from page one.
    ///
    /// Only an interrupted or failed preview can be restarted. Returns the
    /// owning submission and the document to render.
    pub fn restart_preview(&mut self) -> Option<(SubmissionId, Bytes)> {
        let artifact = self.current.as_mut()?;
        if !matches!(
            artifact.preview,
            PreviewState::Interrupted { .. } | PreviewState::Failed { .. }
        ) {
            return None;
        }
        artifact.preview = PreviewState::Rendering { pages: Vec::new() };
        debug!("Restarted preview of submission {}", artifact.submission);
        Some((artifact.submission, artifact.bytes.clone()))
    }

    fn settle_preview(
        &mut self,
        submission: SubmissionId,
        next: impl FnOnce(Vec<PreviewPage>) -> PreviewState,
    ) -> bool {
        let Some(state) = self.rendering_preview(submission) else {
            return false;
        };
        if let PreviewState::Rendering { pages } = state {
            let pages = std::mem::take(pages);
            *state = next(pages);
        }
        true
    }

    fn rendering_preview(&mut self, submission: SubmissionId) -> Option<&mut PreviewState> {
        self.current
            .as_mut()
            .filter(|a| a.submission == submission && a.preview.is_rendering())
            .map(|a| &mut a.preview)
    }

    /// Save the current artifact through `sink`.
    ///
    /// Does not touch the store; calling it repeatedly saves repeatedly.
    pub fn trigger_download(&self, sink: &dyn DownloadSink) -> Result<PathBuf, DownloadError> {
        let artifact = self.current.as_ref().ok_or(DownloadError::NoArtifact)?;
        let bytes = self
            .store
            .resolve(&artifact.handle)
            .ok_or_else(|| DownloadError::Revoked {
                uri: artifact.handle.uri(),
            })?;
        sink.save(&artifact.filename, bytes)
    }

    /// Revoke the outstanding reference, if any.
    pub fn teardown(&mut self) {
        if let Some(artifact) = self.current.take() {
            artifact.release(&mut self.store);
        }
    }
}

impl Drop for ArtifactManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
