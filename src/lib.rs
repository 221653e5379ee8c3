//! # coverletter-studio
//!
//! Client for a cover-letter generation service: upload a PDF resume and a
//! job description, get back a generated PDF, preview it page by page and
//! save it.
//!
//! ## Why this crate?
//!
//! The service call itself is one multipart POST. The hard part is the state
//! around it: only one request may be outstanding, a slow response must not
//! overwrite a newer one, a failure must leave the last good letter in place,
//! and every download reference handed out must be released exactly once.
//! [`Session`] owns that state and [`Studio`] drives it asynchronously.
//!
//! ## Lifecycle
//!
//! ```text
//! form
//!  │
//!  ├─ 1. Validate  resume present, non-empty, a PDF; description not blank
//!  ├─ 2. Submit    multipart POST (resume, job_description, output, template)
//!  ├─ 3. Resolve   document + filename, or one failure message
//!  ├─ 4. Replace   revoke the old download reference, create the new one
//!  ├─ 5. Preview   rasterise pages via pdfium (spawn_blocking), in order
//!  └─ 6. Download  save the current artifact on demand
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coverletter_studio::{DirectorySink, ResumeFile, Studio, StudioConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StudioConfig::builder()
//!         .endpoint("http://localhost:8000/cover-letter")
//!         .build()?;
//!     let mut studio = Studio::with_pdfium(&config)?;
//!
//!     studio.form_mut().set_resume(ResumeFile::open("resume.pdf").await?);
//!     studio.form_mut().set_job_description("Senior Rust engineer, storage team");
//!     studio.submit()?;
//!
//!     let view = studio.run_until_settled().await;
//!     println!("{:?}: {} preview pages", view.status, view.preview_pages);
//!     studio.trigger_download(&DirectorySink::new("."))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `coverletter` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! coverletter-studio = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod controller;
pub mod error;
pub mod form;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{Artifact, ArtifactManager, DownloadHandle, DownloadStore, PreviewState};
pub use config::{OutputFormat, StudioConfig, StudioConfigBuilder, Template};
pub use controller::{Studio, StudioEvent, Update};
pub use error::{DownloadError, PreviewError, StudioError, SubmitError, ValidationError};
pub use form::{ResumeFile, SubmissionForm, SubmissionInput};
pub use pipeline::download::{DirectorySink, DownloadSink};
pub use pipeline::render::{render_stream, PdfiumRenderer, PreviewPage, PreviewRenderer};
pub use pipeline::request::GenerationClient;
pub use pipeline::response::{GeneratedDocument, SubmissionResult};
pub use progress::{NoopObserver, Observer, SessionObserver};
pub use session::{Session, SessionView, Status, SubmissionId, Transition};
