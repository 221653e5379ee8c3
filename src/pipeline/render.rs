//! Preview rasterisation: render every page of the generated PDF to an image.
//!
//! ## Why one decode, page by page?
//!
//! A preview call decodes the document once and walks its pages in order,
//! handing each finished page to the caller before starting the next. Only
//! one page bitmap is alive at a time, which keeps peak memory flat no
//! matter how long the document is, and gives the caller a point between
//! pages to stop early when the preview is no longer wanted.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. [`render_stream`] moves the walk onto the blocking pool so
//! the session's event loop never stalls on a large page.

use crate::config::StudioConfig;
use crate::error::PreviewError;
use bytes::Bytes;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One rendered page of the preview.
#[derive(Debug, Clone)]
pub struct PreviewPage {
    /// 0-based page index.
    pub index: usize,
    /// Total pages in the document at decode time.
    pub page_count: usize,
    pub image: DynamicImage,
}

impl PreviewPage {
    /// 1-based page number, for display.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Something that can turn document bytes into page images.
///
/// Implementations decode `document` once per call and invoke `on_page` for
/// every page in page order. Returning [`ControlFlow::Break`] from `on_page`
/// stops the walk; the call then returns the number of pages delivered.
pub trait PreviewRenderer: Send + Sync {
    fn render_document(
        &self,
        document: &[u8],
        on_page: &mut dyn FnMut(PreviewPage) -> ControlFlow<()>,
    ) -> Result<usize, PreviewError>;
}

/// [`PreviewRenderer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    scale: f32,
    max_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new(config: &StudioConfig) -> Self {
        Self {
            scale: config.preview_scale,
            max_pixels: config.max_rendered_pixels,
            library_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
        }
    }

    /// Use the pdfium library at `path` instead of `PDFIUM_LIB_PATH` or the
    /// system library.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    fn bind(&self) -> Result<Pdfium, PreviewError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path).map_err(|e| {
                PreviewError::EngineUnavailable(format!("{}: {:?}", path.display(), e))
            })?,
            None => Pdfium::bind_to_system_library()
                .map_err(|e| PreviewError::EngineUnavailable(format!("{:?}", e)))?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl PreviewRenderer for PdfiumRenderer {
    fn render_document(
        &self,
        document: &[u8],
        on_page: &mut dyn FnMut(PreviewPage) -> ControlFlow<()>,
    ) -> Result<usize, PreviewError> {
        let pdfium = self.bind()?;

        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| PreviewError::CorruptDocument {
                detail: format!("{:?}", e),
            })?;

        let pages = doc.pages();
        let page_count = pages.len() as usize;
        info!("Preview: document has {} pages", page_count);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.scale)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut delivered = 0;
        for index in 0..page_count {
            let page = pages
                .get(index as u16)
                .map_err(|e| PreviewError::RenderFailed {
                    page: index + 1,
                    detail: format!("{:?}", e),
                })?;

            let bitmap =
                page.render_with_config(&render_config)
                    .map_err(|e| PreviewError::RenderFailed {
                        page: index + 1,
                        detail: format!("{:?}", e),
                    })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered preview page {} → {}x{} px",
                index + 1,
                image.width(),
                image.height()
            );

            delivered += 1;
            let flow = on_page(PreviewPage {
                index,
                page_count,
                image,
            });
            if flow.is_break() {
                debug!("Preview stopped after {} of {} pages", delivered, page_count);
                break;
            }
        }

        Ok(delivered)
    }
}

/// A boxed stream of preview pages, in page order.
pub type PreviewStream = Pin<Box<dyn Stream<Item = Result<PreviewPage, PreviewError>> + Send>>;

/// Render `document` on the blocking pool, yielding pages as they finish.
///
/// Cancelling `cancel` stops the walk before the next page; pages already
/// in the channel are still yielded, so consumers must check their own
/// staleness. A decode failure is yielded as the last item, and so is
/// [`PreviewError::Internal`] when the render task panics.
pub fn render_stream(
    renderer: Arc<dyn PreviewRenderer>,
    document: Bytes,
    cancel: CancellationToken,
) -> PreviewStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker_tx = tx.clone();

    let worker = tokio::task::spawn_blocking(move || {
        if cancel.is_cancelled() {
            return;
        }
        let mut on_page = |page: PreviewPage| {
            if cancel.is_cancelled() || worker_tx.send(Ok(page)).is_err() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        if let Err(e) = renderer.render_document(&document, &mut on_page) {
            warn!("Preview render failed: {}", e);
            let _ = worker_tx.send(Err(e));
        }
    });

    // The stream stays open until the worker is joined, so a panic is
    // reported after every page it managed to send.
    tokio::spawn(async move {
        if let Err(e) = worker.await {
            warn!("Preview render task panicked: {}", e);
            let _ = tx.send(Err(PreviewError::Internal(format!(
                "Render task panicked: {}",
                e
            ))));
        }
    });

    Box::pin(UnboundedReceiverStream::new(rx))
}
