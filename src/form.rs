//! Form state: the resume file, the job description and the template choice.
//!
//! [`SubmissionForm`] holds whatever the user has entered so far, including
//! invalid combinations. [`SubmissionForm::validate`] turns it into a
//! [`SubmissionInput`] snapshot, which is the only thing the network layer
//! ever sees.

use crate::config::Template;
use crate::error::{StudioError, ValidationError};
use bytes::Bytes;
use std::path::Path;
use tracing::debug;

/// A selected resume: a name plus its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub name: String,
    pub bytes: Bytes,
    pub content_type: String,
}

impl ResumeFile {
    /// Wrap in-memory bytes.
    ///
    /// The content type is `application/pdf` when the bytes carry the `%PDF`
    /// magic or the name ends in `.pdf`, so an extensionless upload is still
    /// labelled correctly.
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        let content_type = content_type_for(&name, &bytes).to_string();
        Self {
            name,
            bytes,
            content_type,
        }
    }

    /// Read a resume from disk.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StudioError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| StudioError::ResumeRead {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume.pdf".to_string());
        debug!("Loaded resume '{}' ({} bytes)", name, bytes.len());
        Ok(Self::new(name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn content_type_for(name: &str, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") || name.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

/// The mutable form fields, as entered.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    resume: Option<ResumeFile>,
    job_description: String,
    template: Option<Template>,
}

impl SubmissionForm {
    /// A blank form with `template` preselected.
    pub fn new(template: Option<Template>) -> Self {
        Self {
            template,
            ..Self::default()
        }
    }

    pub fn set_resume(&mut self, file: ResumeFile) {
        self.resume = Some(file);
    }

    pub fn clear_resume(&mut self) {
        self.resume = None;
    }

    pub fn set_job_description(&mut self, text: impl Into<String>) {
        self.job_description = text.into();
    }

    pub fn set_template(&mut self, template: Option<Template>) {
        self.template = template;
    }

    pub fn resume(&self) -> Option<&ResumeFile> {
        self.resume.as_ref()
    }

    pub fn job_description(&self) -> &str {
        &self.job_description
    }

    pub fn template(&self) -> Option<Template> {
        self.template
    }

    /// Check required fields and snapshot them for sending.
    pub fn validate(&self) -> Result<SubmissionInput, ValidationError> {
        let resume = self.resume.as_ref().ok_or(ValidationError::MissingResume)?;
        if resume.is_empty() {
            return Err(ValidationError::EmptyResume {
                name: resume.name.clone(),
            });
        }
        if !resume.bytes.starts_with(b"%PDF") {
            let magic = resume.bytes.iter().take(4).copied().collect();
            return Err(ValidationError::NotAPdf {
                name: resume.name.clone(),
                magic,
            });
        }
        if self.job_description.trim().is_empty() {
            return Err(ValidationError::MissingJobDescription);
        }
        Ok(SubmissionInput {
            resume: resume.clone(),
            job_description: self.job_description.clone(),
            template: self.template,
        })
    }
}

/// A validated snapshot of the form, taken when a submission begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionInput {
    pub resume: ResumeFile,
    pub job_description: String,
    pub template: Option<Template>,
}
