//! End-to-end session lifecycle against a mock generation service.
//!
//! The preview renderer is faked so these run without pdfium.

use std::ops::ControlFlow;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};

use coverletter_studio::{
    DirectorySink, PreviewError, PreviewPage, PreviewRenderer, PreviewState, ResumeFile, Status,
    Studio, StudioConfig, SubmissionId, Template, Update, ValidationError,
};
use image::{DynamicImage, RgbaImage};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGES: usize = 2;

/// Renders `pages` blank pages. Documents containing `broken` fail to
/// decode; documents containing `slow` wait on the gate after page 1 and
/// documents containing `panic` panic there.
struct FakeRenderer {
    pages: usize,
    gate: Mutex<Option<std_mpsc::Receiver<()>>>,
}

impl Default for FakeRenderer {
    fn default() -> Self {
        Self::with_pages(PAGES)
    }
}

impl FakeRenderer {
    fn with_pages(pages: usize) -> Self {
        Self {
            pages,
            gate: Mutex::new(None),
        }
    }

    fn gated() -> (Arc<Self>, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        let renderer = Self {
            gate: Mutex::new(Some(rx)),
            ..Self::default()
        };
        (Arc::new(renderer), tx)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

impl PreviewRenderer for FakeRenderer {
    fn render_document(
        &self,
        document: &[u8],
        on_page: &mut dyn FnMut(PreviewPage) -> ControlFlow<()>,
    ) -> Result<usize, PreviewError> {
        if contains(document, b"broken") {
            return Err(PreviewError::CorruptDocument {
                detail: "no pages".into(),
            });
        }
        for index in 0..self.pages {
            if index == 1 && contains(document, b"slow") {
                let gate = self.gate.lock().unwrap().take();
                if let Some(rx) = gate {
                    let _ = rx.recv();
                }
            }
            if index == 1 && contains(document, b"panic") {
                panic!("renderer crashed on page 2");
            }
            let page = PreviewPage {
                index,
                page_count: self.pages,
                image: DynamicImage::ImageRgba8(RgbaImage::new(8, 11)),
            };
            if on_page(page).is_break() {
                return Ok(index + 1);
            }
        }
        Ok(self.pages)
    }
}

fn pdf(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(format!("%PDF-1.4 {body}").into_bytes(), "application/pdf")
}

fn pdf_named(body: &str, disposition: &str) -> ResponseTemplate {
    pdf(body).insert_header("content-disposition", disposition)
}

fn config_for(server: &MockServer) -> StudioConfig {
    StudioConfig::builder()
        .endpoint(format!("{}/cover-letter", server.uri()))
        .build()
        .expect("valid config")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn studio_for(server: &MockServer, renderer: Arc<FakeRenderer>) -> Studio {
    init_tracing();
    let mut studio = Studio::new(&config_for(server), renderer).expect("studio");
    studio
        .form_mut()
        .set_resume(ResumeFile::new("cv.pdf", &b"%PDF-1.7 resume"[..]));
    studio
        .form_mut()
        .set_job_description("Backend engineer, payments team");
    studio
}

#[tokio::test]
async fn successful_submission_yields_download_and_preview() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cover-letter"))
        .respond_with(pdf_named("letter", "attachment; filename=\"letter.pdf\""))
        .expect(1)
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    let id = studio.submit().expect("valid form");
    assert!(!studio.view().can_submit);

    let view = studio.run_until_settled().await;
    assert_eq!(view.status, Status::Ready);
    assert!(view.can_submit);
    assert_eq!(view.filename.as_deref(), Some("letter.pdf"));
    assert_eq!(view.artifact_submission, Some(id));
    assert_eq!(view.preview_pages, PAGES);
    assert_eq!(view.live_references, 1);

    let artifact = studio.session().artifact().expect("artifact");
    assert_eq!(artifact.bytes().as_ref(), b"%PDF-1.4 letter");
    assert!(matches!(artifact.preview(), PreviewState::Complete { .. }));
    let pages: Vec<_> = artifact.preview().pages().iter().map(|p| p.index).collect();
    assert_eq!(pages, vec![0, 1]);
}

#[tokio::test]
async fn classic_single_page_letter_is_ready_to_download() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cover-letter"))
        .and(body_string_contains("filename=\"resume.pdf\""))
        .and(body_string_contains("Backend engineer role"))
        .and(body_string_contains("classic"))
        .respond_with(pdf_named("one page", "attachment; filename=\"letter.pdf\""))
        .expect(1)
        .mount(&server)
        .await;

    init_tracing();
    let mut studio = Studio::new(&config_for(&server), Arc::new(FakeRenderer::with_pages(1)))
        .expect("studio");
    studio
        .form_mut()
        .set_resume(ResumeFile::new("resume.pdf", &b"%PDF-1.7 resume"[..]));
    studio.form_mut().set_job_description("Backend engineer role");
    studio.form_mut().set_template(Some(Template::Classic));

    let id = studio.submit().expect("valid form");
    let view = studio.run_until_settled().await;

    assert_eq!(view.status, Status::Ready);
    assert_eq!(view.filename.as_deref(), Some("letter.pdf"));
    assert_eq!(view.artifact_submission, Some(id));
    assert_eq!(view.preview_pages, 1);
    assert_eq!(view.preview_error, None);
    assert_eq!(view.live_references, 1);
    assert!(view.download_uri.is_some());
    assert!(matches!(
        studio.session().artifact().unwrap().preview(),
        PreviewState::Complete { .. }
    ));
}

#[tokio::test]
async fn missing_resume_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.form_mut().clear_resume();
    assert_eq!(studio.submit().unwrap_err(), ValidationError::MissingResume);
    assert_eq!(studio.view().status, Status::Empty);
    assert!(studio.is_settled());
    assert_eq!(studio.view().live_references, 0);
}

#[tokio::test]
async fn extensionless_resume_is_sent_as_pdf() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("filename=\"resume_final\""))
        .and(body_string_contains("application/pdf"))
        .respond_with(pdf("accepted"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "detail": "Resume must be a PDF"
        })))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio
        .form_mut()
        .set_resume(ResumeFile::new("resume_final", &b"%PDF-1.7 resume"[..]));
    studio.submit().unwrap();

    let view = studio.run_until_settled().await;
    assert_eq!(view.status, Status::Ready);
}

#[tokio::test]
async fn multipart_body_carries_every_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cover-letter"))
        .and(body_string_contains("name=\"resume\"; filename=\"cv.pdf\""))
        .and(body_string_contains("application/pdf"))
        .and(body_string_contains("%PDF-1.7 resume"))
        .and(body_string_contains("name=\"job_description\""))
        .and(body_string_contains("Backend engineer, payments team"))
        .and(body_string_contains("name=\"output\""))
        .and(body_string_contains("name=\"template\""))
        .and(body_string_contains("minimal"))
        .respond_with(pdf("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.form_mut().set_template(Some(Template::Minimal));
    studio.submit().unwrap();

    let view = studio.run_until_settled().await;
    assert_eq!(view.status, Status::Ready);
}

#[test]
fn blank_description_never_reaches_the_network() {
    tokio_test::block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(pdf("unused"))
            .expect(0)
            .mount(&server)
            .await;

        let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
        studio.form_mut().set_job_description("  \n\t ");
        assert_eq!(
            studio.submit().unwrap_err(),
            ValidationError::MissingJobDescription
        );
        assert_eq!(studio.view().status, Status::Empty);
        assert!(studio.is_settled());
    });
}

#[tokio::test]
async fn non_pdf_resume_is_rejected() {
    let server = MockServer::start().await;
    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio
        .form_mut()
        .set_resume(ResumeFile::new("cv.pdf", &b"PK\x03\x04 zip"[..]));

    assert!(matches!(
        studio.submit(),
        Err(ValidationError::NotAPdf { .. })
    ));
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
}

#[tokio::test]
async fn missing_disposition_falls_back_to_default_filename() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf("plain"))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.submit().unwrap();
    let view = studio.run_until_settled().await;
    assert_eq!(view.filename.as_deref(), Some("cover_letter.pdf"));
}

#[tokio::test]
async fn unquoted_disposition_filename_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf_named("x", "attachment; filename=acme_letter.pdf"))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.submit().unwrap();
    let view = studio.run_until_settled().await;
    assert_eq!(view.filename.as_deref(), Some("acme_letter.pdf"));
}

#[tokio::test]
async fn server_failure_keeps_previous_artifact() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf_named("first", "attachment; filename=\"first.pdf\""))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "detail": "rate limited"
        })))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    let first = studio.submit().unwrap();
    let before = studio.run_until_settled().await;
    assert_eq!(before.status, Status::Ready);

    let second = studio.submit().unwrap();
    assert_ne!(first, second);
    let after = studio.run_until_settled().await;

    assert_eq!(after.status, Status::Failed("rate limited".into()));
    assert!(after.can_submit);
    assert_eq!(after.filename, before.filename);
    assert_eq!(after.download_uri, before.download_uri);
    assert_eq!(after.artifact_submission, Some(first));
    assert_eq!(after.preview_pages, before.preview_pages);
    assert_eq!(after.live_references, 1);
}

#[tokio::test]
async fn validation_detail_list_is_joined() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "detail": [
                { "loc": ["body", "resume"], "msg": "field required", "type": "missing" },
                { "loc": ["body", "output"], "msg": "bad output", "type": "value_error" }
            ]
        })))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    let id = studio.submit().unwrap();
    match studio.next_update().await {
        Some(Update::Failed { id: failed, message }) => {
            assert_eq!(failed, id);
            assert_eq!(message, "field required; bad output");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn failure_without_detail_uses_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.submit().unwrap();
    let view = studio.run_until_settled().await;
    match view.status {
        Status::Failed(message) => {
            assert!(message.starts_with("Cover letter generation failed"), "got {message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(view.live_references, 0);
}

#[tokio::test]
async fn replacement_revokes_previous_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf("again"))
        .expect(2)
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.submit().unwrap();
    let first = studio.run_until_settled().await;
    studio.submit().unwrap();
    let second = studio.run_until_settled().await;

    assert_ne!(first.download_uri, second.download_uri);
    assert_eq!(second.live_references, 1);

    let store = studio.session().artifacts().store();
    assert_eq!(store.created_count(), 2);
    assert_eq!(store.revoked_count(), 1);
}

#[tokio::test]
async fn superseded_preview_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf_named("slow", "attachment; filename=\"old.pdf\""))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(pdf_named("fast", "attachment; filename=\"new.pdf\""))
        .mount(&server)
        .await;

    let (renderer, gate) = FakeRenderer::gated();
    let mut studio = studio_for(&server, renderer);

    let old = studio.submit().unwrap();
    assert!(matches!(studio.next_update().await, Some(Update::Ready { .. })));
    assert_eq!(
        studio.next_update().await,
        Some(Update::PreviewPage {
            id: old,
            page_num: 1,
            total_pages: PAGES
        })
    );

    let new = studio.submit().unwrap();
    gate.send(()).unwrap();

    let mut updates = Vec::new();
    while !studio.is_settled() {
        updates.push(studio.next_update().await.expect("event"));
    }

    let stale_applied = updates.iter().any(|u| {
        matches!(u, Update::PreviewPage { id, .. } | Update::PreviewComplete { id, .. } if *id == old)
    });
    assert!(!stale_applied, "stale preview leaked: {updates:?}");

    let view = studio.view();
    assert_eq!(view.artifact_submission, Some(new));
    assert_eq!(view.filename.as_deref(), Some("new.pdf"));
    assert_eq!(view.preview_pages, PAGES);
    assert_eq!(view.live_references, 1);
}

#[tokio::test]
async fn failed_resubmission_rerenders_the_interrupted_preview() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf_named("slow", "attachment; filename=\"kept.pdf\""))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "detail": "model overloaded"
        })))
        .mount(&server)
        .await;

    let (renderer, gate) = FakeRenderer::gated();
    let mut studio = studio_for(&server, renderer);

    let first = studio.submit().unwrap();
    assert!(matches!(studio.next_update().await, Some(Update::Ready { .. })));
    assert!(matches!(
        studio.next_update().await,
        Some(Update::PreviewPage { page_num: 1, .. })
    ));

    studio.submit().unwrap();
    gate.send(()).unwrap();
    let view = studio.run_until_settled().await;

    assert_eq!(view.status, Status::Failed("model overloaded".into()));
    assert_eq!(view.artifact_submission, Some(first));
    assert_eq!(view.filename.as_deref(), Some("kept.pdf"));
    assert_eq!(view.preview_pages, PAGES);
    assert!(!view.preview_rendering);
    assert!(matches!(
        studio.session().artifact().unwrap().preview(),
        PreviewState::Complete { .. }
    ));
    assert!(!studio.rerender_preview());
}

#[tokio::test]
async fn renderer_panic_fails_the_preview_but_not_the_download() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf("panic"))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.submit().unwrap();
    let view = studio.run_until_settled().await;

    assert_eq!(view.status, Status::Ready);
    assert_eq!(view.preview_pages, 1);
    assert!(
        view.preview_error
            .as_deref()
            .is_some_and(|e| e.contains("panicked")),
        "got {:?}",
        view.preview_error
    );
    assert!(matches!(
        studio.session().artifact().unwrap().preview(),
        PreviewState::Failed {
            error: PreviewError::Internal(_),
            ..
        }
    ));

    let dir = tempfile::tempdir().unwrap();
    let saved = studio
        .trigger_download(&DirectorySink::new(dir.path()))
        .expect("download still works");
    assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.4 panic");
}

#[tokio::test]
async fn preview_failure_leaves_download_available() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf("broken"))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.submit().unwrap();
    let view = studio.run_until_settled().await;

    assert_eq!(view.status, Status::Ready);
    assert_eq!(view.preview_pages, 0);
    assert!(view
        .preview_error
        .as_deref()
        .is_some_and(|e| e.contains("could not be decoded")));

    let dir = tempfile::tempdir().unwrap();
    let saved = studio
        .trigger_download(&DirectorySink::new(dir.path()))
        .expect("download still works");
    assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.4 broken");
}

#[tokio::test]
async fn repeated_downloads_create_no_references() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf_named("saved", "attachment; filename=\"letter.pdf\""))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.submit().unwrap();
    studio.run_until_settled().await;

    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path());
    let a = studio.trigger_download(&sink).unwrap();
    let b = studio.trigger_download(&sink).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.file_name().unwrap(), "letter.pdf");
    assert_eq!(studio.session().artifacts().store().created_count(), 1);
    assert_eq!(studio.view().live_references, 1);
}

#[tokio::test]
async fn download_before_any_artifact_fails() {
    let server = MockServer::start().await;
    let studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    let dir = tempfile::tempdir().unwrap();
    assert!(studio
        .trigger_download(&DirectorySink::new(dir.path()))
        .is_err());
}

#[tokio::test]
async fn preview_can_be_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf("quiet"))
        .mount(&server)
        .await;

    let config = StudioConfig::builder()
        .endpoint(format!("{}/cover-letter", server.uri()))
        .render_preview(false)
        .build()
        .unwrap();
    let mut studio = Studio::new(&config, Arc::new(FakeRenderer::default())).unwrap();
    studio
        .form_mut()
        .set_resume(ResumeFile::new("cv.pdf", &b"%PDF-1.7"[..]));
    studio.form_mut().set_job_description("role");
    studio.submit().unwrap();

    let view = studio.run_until_settled().await;
    assert_eq!(view.status, Status::Ready);
    assert_eq!(view.preview_pages, 0);
    assert!(matches!(
        studio.session().artifact().unwrap().preview(),
        PreviewState::Disabled
    ));
}

#[tokio::test]
async fn shutdown_revokes_the_live_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(pdf("bye"))
        .mount(&server)
        .await;

    let mut studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    studio.submit().unwrap();
    studio.run_until_settled().await;
    studio.shutdown();

    let view = studio.view();
    assert_eq!(view.status, Status::Empty);
    assert_eq!(view.live_references, 0);
    assert_eq!(view.download_uri, None);
    assert_eq!(studio.session().latest_submission(), None::<SubmissionId>);
}

#[tokio::test]
async fn health_check_reads_ok_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let studio = studio_for(&server, Arc::new(FakeRenderer::default()));
    assert!(studio.health().await.expect("health"));
}
