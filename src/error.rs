//! Error types for the coverletter-studio library.
//!
//! Failures are split by where they can happen, because each domain has a
//! different blast radius:
//!
//! * [`ValidationError`]: the form is incomplete. Raised before any network
//!   I/O; nothing in the session changes.
//! * [`SubmitError`]: the request could not be sent, the service answered
//!   with a non-success status, or the body could not be read. All three
//!   collapse into one user-visible string via [`SubmitError::user_message`].
//! * [`PreviewError`]: the returned bytes could not be rendered. Isolated to
//!   the preview; the download reference stays valid.
//! * [`DownloadError`]: saving the artifact failed.
//!
//! [`StudioError`] is the umbrella returned by configuration and by callers
//! that want a single `?`-able type.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown when the service fails without a decodable reason.
pub const GENERIC_FAILURE_MESSAGE: &str = "Cover letter generation failed";

/// Client-side validation failures. Never reach the network layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No resume file has been selected.
    #[error("Please select a resume file.")]
    MissingResume,

    /// The selected resume file has no content.
    #[error("Resume file '{name}' is empty.")]
    EmptyResume { name: String },

    /// The selected resume is not a PDF.
    #[error("Resume file '{name}' is not a PDF (first bytes: {magic:?}).")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// The job description is empty or whitespace only.
    #[error("Please paste a job description.")]
    MissingJobDescription,

    /// A submission is already outstanding; the trigger is disabled.
    #[error("A cover letter is already being generated.")]
    SubmissionInFlight,
}

/// Transport and server failures of a single submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The endpoint URL could not be used to build a request.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The request could not be sent or no response arrived.
    #[error("Could not reach the generation service: {reason}")]
    Transport { reason: String },

    /// The configured request timeout elapsed.
    #[error("The generation service did not answer within {secs}s")]
    Timeout { secs: u64 },

    /// Non-success status. `message` is the decoded server reason when one
    /// was present, otherwise the generic failure message.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The response body could not be read.
    #[error("Failed to read the generated document: {reason}")]
    BodyRead { reason: String },

    /// The request was abandoned because its submission was superseded or
    /// the session was shut down.
    #[error("Submission was cancelled")]
    Cancelled,
}

impl SubmitError {
    /// The single string surfaced to the user for this failure.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// HTTP status code, when the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            SubmitError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A non-fatal preview failure.
///
/// Stored in [`crate::artifact::PreviewState::Failed`]; the artifact's
/// download reference is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PreviewError {
    /// The pdfium library could not be bound.
    #[error(
        "PDF preview engine unavailable: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    EngineUnavailable(String),

    /// The bytes are not a document the renderer understands.
    #[error("Generated document could not be decoded: {detail}")]
    CorruptDocument { detail: String },

    /// A single page failed to rasterise.
    #[error("Page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The render task died.
    #[error("Preview internal error: {0}")]
    Internal(String),
}

/// Failures while handing the artifact to a [`crate::pipeline::download::DownloadSink`].
#[derive(Debug, Error)]
pub enum DownloadError {
    /// There is no ready artifact.
    #[error("No cover letter is ready to download")]
    NoArtifact,

    /// The artifact's download reference was already revoked.
    #[error("Download reference {uri} has been revoked")]
    Revoked { uri: String },

    /// Writing the file failed.
    #[error("Failed to save '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error for configuration and convenience entry points.
#[derive(Debug, Error)]
pub enum StudioError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Preview(#[from] PreviewError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Could not read the resume from disk.
    #[error("Failed to read resume '{path}': {source}")]
    ResumeRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
