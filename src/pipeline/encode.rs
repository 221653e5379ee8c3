//! Image encoding for preview pages: PNG bytes and inline `data:` URIs.
//!
//! PNG over JPEG because the pages are mostly text; JPEG ringing around
//! glyph edges is exactly what a reader notices first in a preview.

use crate::pipeline::render::PreviewPage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Encode an image as a `data:image/png;base64,…` URI for inline display.
pub fn encode_data_uri(img: &DynamicImage) -> Result<String, image::ImageError> {
    let png = encode_png(img)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

impl PreviewPage {
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        encode_png(&self.image)
    }

    pub fn to_data_uri(&self) -> Result<String, image::ImageError> {
        encode_data_uri(&self.image)
    }
}

/// Write preview pages into `dir` as `page-001.png`, `page-002.png`, …
///
/// Returns the written paths in page order.
pub async fn write_pages(pages: &[PreviewPage], dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = Vec::with_capacity(pages.len());
    for page in pages {
        let png = page
            .to_png()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let path = dir.join(format!("page-{:03}.png", page.page_num()));
        tokio::fs::write(&path, png).await?;
        written.push(path);
    }
    Ok(written)
}
