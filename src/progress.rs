//! Observer trait for session lifecycle events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::controller::Studio::with_observer`] to follow a submission as it
//! moves through request, artifact and preview. The CLI uses it to drive its
//! progress bar; a GUI would repaint from it.
//!
//! Events are only reported for transitions the session actually applied.
//! Stale completions are dropped before any observer sees them.
//!
//! # Example
//!
//! ```rust
//! use coverletter_studio::{SessionObserver, SubmissionId};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct PageCounter {
//!     pages: AtomicUsize,
//! }
//!
//! impl SessionObserver for PageCounter {
//!     fn on_preview_page(&self, _id: SubmissionId, _page_num: usize, _total: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::session::SubmissionId;
use std::sync::Arc;

/// Called by the studio as a session changes state.
///
/// All methods have default no-op implementations so implementors only
/// override what they care about.
pub trait SessionObserver: Send + Sync {
    /// A submission passed validation and its request is being sent.
    fn on_submission_start(&self, id: SubmissionId) {
        let _ = id;
    }

    /// The service returned a document; it is now the current artifact.
    fn on_artifact_ready(&self, id: SubmissionId, filename: &str, size: usize) {
        let _ = (id, filename, size);
    }

    /// The submission failed with a user-visible message.
    fn on_submission_failed(&self, id: SubmissionId, message: &str) {
        let _ = (id, message);
    }

    /// One preview page was rendered and applied.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: pages in the document
    fn on_preview_page(&self, id: SubmissionId, page_num: usize, total_pages: usize) {
        let _ = (id, page_num, total_pages);
    }

    /// All preview pages were rendered.
    fn on_preview_complete(&self, id: SubmissionId, page_count: usize) {
        let _ = (id, page_count);
    }

    /// The preview could not be produced. The download is unaffected.
    fn on_preview_failed(&self, id: SubmissionId, error: &str) {
        let _ = (id, error);
    }
}

/// A no-op observer. The default when none is configured.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias for the type held by the studio.
pub type Observer = Arc<dyn SessionObserver>;
