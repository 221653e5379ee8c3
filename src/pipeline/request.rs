//! Outbound request: one multipart `POST` per submission.
//!
//! ## No retry
//!
//! Generation is expensive and not idempotent on the service side (every
//! call spends model tokens). A failed submission is reported once and the
//! user decides whether to resubmit.

use crate::config::{OutputFormat, StudioConfig};
use crate::error::SubmitError;
use crate::form::SubmissionInput;
use crate::pipeline::response::{resolve_filename, server_error, GeneratedDocument};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Build the multipart body for a submission.
///
/// Fields: `resume` (file), `job_description`, `output` and, when chosen,
/// `template`.
pub fn build_form(input: &SubmissionInput) -> Result<Form, SubmitError> {
    let resume = Part::bytes(input.resume.bytes.to_vec())
        .file_name(input.resume.name.clone())
        .mime_str(&input.resume.content_type)
        .map_err(|e| SubmitError::Transport {
            reason: format!("invalid content type '{}': {}", input.resume.content_type, e),
        })?;

    let mut form = Form::new()
        .part("resume", resume)
        .text("job_description", input.job_description.clone())
        .text("output", OutputFormat::Pdf.as_str());

    if let Some(template) = input.template {
        form = form.text("template", template.as_str());
    }
    Ok(form)
}

/// HTTP client for the generation service.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: Url,
    default_filename: String,
    timeout_secs: Option<u64>,
}

impl GenerationClient {
    /// Create a client for `config.endpoint`.
    pub fn new(config: &StudioConfig) -> Result<Self, SubmitError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| SubmitError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| SubmitError::Transport {
            reason: e.to_string(),
        })?;

        Ok(Self {
            http,
            endpoint,
            default_filename: config.default_filename.clone(),
            timeout_secs: config.request_timeout.map(|t| t.as_secs().max(1)),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send one submission and wait for the generated document.
    pub async fn generate(&self, input: &SubmissionInput) -> Result<GeneratedDocument, SubmitError> {
        let start = Instant::now();
        info!(
            "Submitting '{}' ({} bytes) to {}",
            input.resume.name,
            input.resume.len(),
            self.endpoint
        );

        let form = build_form(input)?;
        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let err = server_error(status.as_u16(), &body);
            warn!("Generation failed with HTTP {}: {}", status, err);
            return Err(err);
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let suggested_name = resolve_filename(disposition.as_deref(), &self.default_filename);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SubmitError::BodyRead {
                reason: e.to_string(),
            })?;

        info!(
            "Received '{}' ({} bytes) in {}ms",
            suggested_name,
            bytes.len(),
            start.elapsed().as_millis()
        );
        debug!("Content-Disposition: {:?}", disposition);

        Ok(GeneratedDocument {
            bytes,
            suggested_name,
        })
    }

    /// The service's `/health` route on the endpoint's origin.
    ///
    /// The route is absolute, so a path prefix on the endpoint is dropped:
    /// `http://host/api/cover-letter` checks `http://host/health`.
    pub fn health_url(&self) -> Result<Url, SubmitError> {
        self.endpoint
            .join("/health")
            .map_err(|e| SubmitError::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    /// GET [`health_url`](Self::health_url) and read its `ok` flag.
    pub async fn health(&self) -> Result<bool, SubmitError> {
        let url = self.health_url()?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if !response.status().is_success() {
            return Ok(false);
        }

        let body = response.bytes().await.map_err(|e| SubmitError::BodyRead {
            reason: e.to_string(),
        })?;
        let ok = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("ok").and_then(serde_json::Value::as_bool))
            .unwrap_or(false);
        Ok(ok)
    }

    fn transport_error(&self, e: reqwest::Error) -> SubmitError {
        match (e.is_timeout(), self.timeout_secs) {
            (true, Some(secs)) => SubmitError::Timeout { secs },
            _ => SubmitError::Transport {
                reason: e.to_string(),
            },
        }
    }
}
