//! Pipeline stages between the form and the user.
//!
//! Each submodule implements one step and knows nothing about session
//! state; [`crate::session`] decides what to keep and
//! [`crate::controller`] decides when to run each stage.
//!
//! ## Data Flow
//!
//! ```text
//! request ──▶ response ──▶ render ──▶ encode
//! (multipart)  (filename,   (pdfium)   (PNG / data URI)
//!               errors)
//!                  │
//!                  └──────▶ download
//!                           (save to disk)
//! ```
//!
//! 1. [`request`] : build the multipart body and send it; the only stage
//!    with network I/O
//! 2. [`response`]: turn the HTTP response into a document or a single
//!    user-facing failure message
//! 3. [`render`]  : rasterise the returned PDF page by page; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 4. [`encode`]  : PNG-encode preview pages for display or for disk
//! 5. [`download`]: hand the artifact bytes to a save target

pub mod download;
pub mod encode;
pub mod render;
pub mod request;
pub mod response;
