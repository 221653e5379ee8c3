//! Configuration types for a cover-letter studio session.
//!
//! All behaviour is controlled through [`StudioConfig`], built via its
//! [`StudioConfigBuilder`]. The only environment-facing knob in a deployment
//! is the endpoint address; everything else has a sensible default.

use crate::error::StudioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Endpoint used when none is configured: the generation service's default
/// local address.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/cover-letter";

/// Filename offered for download when the response does not name one.
pub const DEFAULT_FILENAME: &str = "cover_letter.pdf";

/// Configuration for a [`crate::session::Session`] and its driver.
///
/// # Example
/// ```rust
/// use coverletter_studio::{StudioConfig, Template};
///
/// let config = StudioConfig::builder()
///     .endpoint("https://letters.example.com/cover-letter")
///     .default_template(Some(Template::Minimal))
///     .preview_scale(2.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_filename, "cover_letter.pdf");
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Generation endpoint receiving the multipart `POST`.
    pub endpoint: String,

    /// Download filename used when `Content-Disposition` is missing or
    /// unparsable. Default: `cover_letter.pdf`.
    pub default_filename: String,

    /// Template preselected in a fresh form. `None` omits the field from the
    /// request and lets the service pick. Default: `Some(Classic)`.
    pub default_template: Option<Template>,

    /// Page scale factor for preview rendering. Range 0.25–4.0. Default: 1.5.
    ///
    /// 1.5 renders a US-Letter page at roughly 918 × 1188 px, legible on a
    /// laptop screen without zooming.
    pub preview_scale: f32,

    /// Cap on either preview image dimension in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Optional whole-request timeout. Default: none (wait indefinitely).
    pub request_timeout: Option<Duration>,

    /// Render page previews after a successful submission. Default: true.
    pub render_preview: bool,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_filename: DEFAULT_FILENAME.to_string(),
            default_template: Some(Template::default()),
            preview_scale: 1.5,
            max_rendered_pixels: 2000,
            request_timeout: None,
            render_preview: true,
        }
    }
}

impl fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfig")
            .field("endpoint", &self.endpoint)
            .field("default_filename", &self.default_filename)
            .field("default_template", &self.default_template)
            .field("preview_scale", &self.preview_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("request_timeout", &self.request_timeout)
            .field("render_preview", &self.render_preview)
            .finish()
    }
}

impl StudioConfig {
    /// Create a new builder for `StudioConfig`.
    pub fn builder() -> StudioConfigBuilder {
        StudioConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StudioConfig`].
#[derive(Debug)]
pub struct StudioConfigBuilder {
    config: StudioConfig,
}

impl StudioConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn default_filename(mut self, name: impl Into<String>) -> Self {
        self.config.default_filename = name.into();
        self
    }

    pub fn default_template(mut self, template: Option<Template>) -> Self {
        self.config.default_template = template;
        self
    }

    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.preview_scale = scale.clamp(0.25, 4.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn render_preview(mut self, v: bool) -> Self {
        self.config.render_preview = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudioConfig, StudioError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.endpoint).map_err(|e| {
            StudioError::InvalidConfig(format!("endpoint '{}' is not a URL: {}", c.endpoint, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(StudioError::InvalidConfig(format!(
                "endpoint must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.default_filename.trim().is_empty() {
            return Err(StudioError::InvalidConfig(
                "default filename must not be empty".into(),
            ));
        }
        if c.request_timeout == Some(Duration::ZERO) {
            return Err(StudioError::InvalidConfig(
                "request timeout must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Layout template the service renders the letter with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    /// Traditional letterhead layout. (default)
    #[default]
    Classic,
    /// Sparse single-column layout.
    Minimal,
}

impl Template {
    /// Value sent in the `template` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::Classic => "classic",
            Template::Minimal => "minimal",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(Template::Classic),
            "minimal" => Ok(Template::Minimal),
            other => Err(format!("unknown template '{other}' (expected classic or minimal)")),
        }
    }
}

/// Output kind requested from the service. Only PDF is supported here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Pdf,
}

impl OutputFormat {
    /// Value sent in the `output` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
        }
    }
}
