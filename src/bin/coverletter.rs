//! CLI binary for coverletter-studio.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `StudioConfig`, fills the form, submits once and saves the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use coverletter_studio::pipeline::encode::write_pages;
use coverletter_studio::{
    DirectorySink, PdfiumRenderer, ResumeFile, SessionObserver, Status, Studio, StudioConfig,
    SubmissionId, Template,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Spinner while the request is outstanding, then a page bar while the
/// preview renders.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Preview");
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SessionObserver for CliObserver {
    fn on_submission_start(&self, _id: SubmissionId) {
        self.bar.set_prefix("Generating");
        self.bar.set_message("waiting for the service…");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_artifact_ready(&self, _id: SubmissionId, filename: &str, size: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            bold(filename),
            dim(&format!("{size} bytes"))
        ));
        self.bar.set_prefix("Preview");
        self.bar.set_message("opening document…");
    }

    fn on_submission_failed(&self, _id: SubmissionId, message: &str) {
        self.bar.println(format!("  {} {}", red("✗"), red(message)));
    }

    fn on_preview_page(&self, _id: SubmissionId, page_num: usize, total_pages: usize) {
        if self.bar.length() != Some(total_pages as u64) {
            self.activate_bar(total_pages);
        }
        self.bar.set_position(page_num as u64);
    }

    fn on_preview_complete(&self, _id: SubmissionId, page_count: usize) {
        self.bar.println(format!(
            "  {} {} preview pages",
            green("✓"),
            bold(&page_count.to_string())
        ));
    }

    fn on_preview_failed(&self, _id: SubmissionId, error: &str) {
        self.bar
            .println(format!("  {} preview unavailable: {}", cyan("⚠"), dim(error)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate a letter into the current directory
  coverletter --resume cv.pdf --job "Senior Rust engineer, storage team"

  # Job description from a file, minimal template, custom output folder
  coverletter --resume cv.pdf --job-file posting.txt --template minimal -o letters/

  # Save preview pages as PNGs
  coverletter --resume cv.pdf --job-file posting.txt --preview-dir preview/

  # Machine-readable result
  coverletter --resume cv.pdf --job-file posting.txt --json

  # Is the service up? (GET /health on the endpoint's host, path prefix dropped)
  coverletter --check

ENVIRONMENT VARIABLES:
  COVERLETTER_ENDPOINT    Generation endpoint (default http://localhost:8000/cover-letter)
  PDFIUM_LIB_PATH         Path to libpdfium used for previews
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Generate a cover letter from a resume and a job description.
#[derive(Parser, Debug)]
#[command(
    name = "coverletter",
    version,
    about = "Generate a cover letter PDF from a resume and a job description",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Resume PDF to upload.
    #[arg(long, env = "COVERLETTER_RESUME", required_unless_present = "check")]
    resume: Option<PathBuf>,

    /// Job description text.
    #[arg(
        long,
        env = "COVERLETTER_JOB",
        conflicts_with = "job_file",
        required_unless_present_any = ["job_file", "check"]
    )]
    job: Option<String>,

    /// Read the job description from this file.
    #[arg(long, env = "COVERLETTER_JOB_FILE")]
    job_file: Option<PathBuf>,

    /// Letter layout.
    #[arg(long, env = "COVERLETTER_TEMPLATE", value_enum, default_value = "classic")]
    template: TemplateArg,

    /// Generation endpoint URL.
    #[arg(
        long,
        env = "COVERLETTER_ENDPOINT",
        default_value = coverletter_studio::config::DEFAULT_ENDPOINT
    )]
    endpoint: String,

    /// Directory the generated PDF is saved into.
    #[arg(short, long = "output-dir", env = "COVERLETTER_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Also write preview pages as PNG files into this directory.
    #[arg(long, env = "COVERLETTER_PREVIEW_DIR")]
    preview_dir: Option<PathBuf>,

    /// Skip rendering the preview.
    #[arg(long, env = "COVERLETTER_NO_PREVIEW")]
    no_preview: bool,

    /// Preview scale factor (0.25–4.0).
    #[arg(long, env = "COVERLETTER_SCALE", default_value_t = 1.5)]
    scale: f32,

    /// Request timeout in seconds. No timeout when unset.
    #[arg(long, env = "COVERLETTER_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Filename used when the service does not suggest one.
    #[arg(long, env = "COVERLETTER_FILENAME",
          default_value = coverletter_studio::config::DEFAULT_FILENAME)]
    filename: String,

    /// Print the final session state as JSON on stdout.
    #[arg(long, env = "COVERLETTER_JSON")]
    json: bool,

    /// Only check the service: GET /health on the endpoint's origin.
    /// Any path prefix on --endpoint is dropped, so
    /// http://host/api/cover-letter is checked at http://host/health.
    #[arg(long)]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "COVERLETTER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "COVERLETTER_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "COVERLETTER_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TemplateArg {
    Classic,
    Minimal,
}

impl From<TemplateArg> for Template {
    fn from(v: TemplateArg) -> Self {
        match v {
            TemplateArg::Classic => Template::Classic,
            TemplateArg::Minimal => Template::Minimal,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the user-facing feedback; library INFO logs
    // would tear through it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let mut studio = Studio::new(&config, Arc::new(PdfiumRenderer::new(&config)))
        .context("Failed to set up the generation client")?;

    // ── Health check mode ────────────────────────────────────────────────
    if cli.check {
        let url = studio
            .client()
            .health_url()
            .context("Failed to derive the health URL")?;
        let ok = studio
            .health()
            .await
            .with_context(|| format!("Health check against {} failed", url))?;
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "endpoint": cli.endpoint, "health_url": url.as_str(), "ok": ok })
            );
        } else if !cli.quiet {
            eprintln!("{} {}", if ok { green("✔") } else { red("✘") }, url);
        }
        if !ok {
            bail!("Service reported unhealthy");
        }
        return Ok(());
    }

    // ── Fill the form ────────────────────────────────────────────────────
    let resume_path = cli.resume.as_ref().context("--resume is required")?;
    let resume = ResumeFile::open(resume_path)
        .await
        .with_context(|| format!("Failed to load resume {:?}", resume_path))?;
    let job = read_job_description(&cli).await?;

    studio.form_mut().set_resume(resume);
    studio.form_mut().set_job_description(job);

    let observer = show_progress.then(CliObserver::new);
    if let Some(ref o) = observer {
        studio = studio.with_observer(o.clone());
    }

    // ── Submit and wait ──────────────────────────────────────────────────
    studio.submit().context("Form rejected")?;
    let view = studio.run_until_settled().await;
    if let Some(ref o) = observer {
        o.finish();
    }

    if let Status::Failed(message) = &view.status {
        bail!("{message}");
    }

    // ── Save ─────────────────────────────────────────────────────────────
    let saved = studio
        .trigger_download(&DirectorySink::new(&cli.output_dir))
        .context("Failed to save the cover letter")?;

    let mut preview_files = Vec::new();
    if let Some(ref dir) = cli.preview_dir {
        let pages = studio
            .session()
            .artifact()
            .map(|a| a.preview().pages())
            .unwrap_or_default();
        preview_files = write_pages(pages, dir)
            .await
            .with_context(|| format!("Failed to write preview pages to {:?}", dir))?;
    }

    if cli.json {
        let out = serde_json::json!({
            "session": view,
            "saved": saved,
            "preview_files": preview_files,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        eprintln!("{}  →  {}", green("✔"), bold(&saved.display().to_string()));
        if let Some(ref error) = view.preview_error {
            eprintln!("   {} preview: {}", cyan("⚠"), dim(error));
        } else if !preview_files.is_empty() {
            eprintln!("   {} preview pages written", dim(&preview_files.len().to_string()));
        }
    }

    studio.shutdown();
    Ok(())
}

/// Map CLI args to `StudioConfig`.
fn build_config(cli: &Cli) -> Result<StudioConfig> {
    StudioConfig::builder()
        .endpoint(cli.endpoint.clone())
        .default_filename(cli.filename.clone())
        .default_template(Some(cli.template.into()))
        .preview_scale(cli.scale)
        .request_timeout(cli.timeout.map(Duration::from_secs))
        .render_preview(!cli.no_preview)
        .build()
        .context("Invalid configuration")
}

async fn read_job_description(cli: &Cli) -> Result<String> {
    match (&cli.job, &cli.job_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job description from {:?}", path)),
        (None, None) => bail!("one of --job or --job-file is required"),
    }
}
