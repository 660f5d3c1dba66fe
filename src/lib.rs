//! # searchable-pdf
//!
//! Turn scanned PDFs into searchable PDFs with an OCR text layer, plus a
//! plain-text transcript.
//!
//! ## Why this crate?
//!
//! A scanned PDF is a stack of pictures: it cannot be searched, selected or
//! indexed. This crate rasterises every page, cleans the image up for OCR,
//! runs tesseract on the pages in parallel and reassembles the single-page
//! results (each one the original scan plus an invisible, position-aligned
//! text layer) into one document. Page order in the outputs never depends
//! on which page happened to finish first.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       validate the source, isolate a run directory
//!  ├─ 2. Render      rasterise pages via pdfium (spawn_blocking) to PNG on disk
//!  ├─ 3. Preprocess  grayscale / adaptive threshold / denoise + thicken
//!  ├─ 4. OCR         concurrent tesseract calls, bounded by the worker count
//!  ├─ 5. Merge       concatenate single-page PDFs in page order (lopdf)
//!  └─ 6. Output      <name>_searchable.pdf + <name>_text.txt
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use searchable_pdf::{process, NoopProgress, PageRange, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder().language("eng").dpi(300).build()?;
//!     let result = process("scan.pdf", "work", PageRange::default(), &NoopProgress, &config).await?;
//!     println!("{}", result.output_document.display());
//!     print!("{}", result.transcript());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocrpdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! searchable-pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! * **pdfium** shared library for rasterisation (system install, or
//!   `PDFIUM_LIB_PATH=/path/to/libpdfium.so`)
//! * **tesseract** 4+ with the language data you request (`tesseract --list-langs`)
//!
//! Both sit behind traits ([`Rasterizer`], [`OcrEngine`]), so either can be
//! replaced through [`PipelineConfig`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod enhance;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Language, PageRange, PipelineConfig, PipelineConfigBuilder, PreprocessingLevel};
pub use enhance::{inspect, process, process_bytes, process_sync};
pub use error::{OcrPdfError, PageError};
pub use output::{PageOutput, PageResult, PageTask, PipelineResult, RunStats};
pub use pipeline::ocr::{OcrEngine, OcrRequest, Recognition, TesseractEngine};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer, RenderSettings, RenderedPage};
pub use preview::{PreviewCache, PreviewRenderer};
pub use progress::{NoopProgress, ProgressCallback};
