//! Error types for the searchable-pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrPdfError`] is **run-level**: the run cannot produce its artifacts
//!   (bad configuration, missing OCR engine, unreadable source, one or more
//!   pages failed). Returned as `Err(OcrPdfError)` from the top-level
//!   `process*` functions.
//!
//! * [`PageError`] is **page-level**: a single page failed to decode or
//!   recognise. Captured at the page-unit boundary and stored inside
//!   [`crate::output::PageResult`] so sibling pages keep running. The
//!   scheduler folds every page error of a run into
//!   [`OcrPdfError::PagesFailed`] once all pages have been attempted.

use std::path::PathBuf;
use thiserror::Error;

/// All run-level errors returned by the searchable-pdf library.
#[derive(Debug, Error)]
pub enum OcrPdfError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The OCR engine binary could not be executed.
    #[error("OCR engine '{engine}' is not available: {detail}\nInstall tesseract or pass --tesseract <PATH>.")]
    EngineUnavailable { engine: String, detail: String },

    /// The OCR engine runs but lacks the requested language data.
    #[error("Language '{language}' is not installed for the OCR engine (available: {available})")]
    LanguageNotInstalled { language: String, available: String },

    // ── Source document errors ────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The requested page range does not fit the document.
    #[error("Invalid page range {start}-{end} (document has {total} pages)")]
    PageRangeInvalid {
        start: usize,
        end: usize,
        total: usize,
    },

    /// The document (or the requested range) contains no pages.
    #[error("No pages to process in '{path}'")]
    EmptyPageRange { path: PathBuf },

    /// The rasteriser failed on a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Page failures ─────────────────────────────────────────────────────
    /// One or more pages failed. Every selected page was attempted before
    /// this error was raised; `pages` is sorted ascending.
    #[error("{} of {total} pages failed: {}", .pages.len(), format_pages(.pages))]
    PagesFailed {
        pages: Vec<usize>,
        total: usize,
        failures: Vec<PageError>,
    },

    // ── Merge errors ──────────────────────────────────────────────────────
    /// A single-page document could not be appended to the output.
    #[error("Merge failed at page {page} ('{path}'): {detail}")]
    MergeFailed {
        page: usize,
        path: PathBuf,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The working directory could not be created or used.
    #[error("Working directory '{path}' is unusable: {source}")]
    WorkDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
If pdfium is not installed system-wide, set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrPdfError {
    /// True for errors raised before any page reached the OCR engine.
    pub fn is_fail_fast(&self) -> bool {
        !matches!(
            self,
            OcrPdfError::PagesFailed { .. }
                | OcrPdfError::MergeFailed { .. }
                | OcrPdfError::OutputWriteFailed { .. }
                | OcrPdfError::Internal(_)
        )
    }
}

fn format_pages(pages: &[usize]) -> String {
    pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A failure confined to a single page.
///
/// Stored in [`crate::output::PageResult`] instead of being propagated, so
/// that one bad page never aborts its siblings mid-flight.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The rasterised page image could not be read back.
    #[error("Page {page}: image decode failed: {detail}")]
    DecodeFailed { page: usize, detail: String },

    /// The preprocessed image could not be persisted for the engine.
    #[error("Page {page}: preprocessing failed: {detail}")]
    PreprocessFailed { page: usize, detail: String },

    /// The OCR engine failed on this page.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The page worker panicked.
    #[error("Page {page}: worker panicked: {detail}")]
    Panicked { page: usize, detail: String },
}

impl PageError {
    /// The 1-indexed page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::DecodeFailed { page, .. }
            | PageError::PreprocessFailed { page, .. }
            | PageError::OcrFailed { page, .. }
            | PageError::Panicked { page, .. } => *page,
        }
    }
}
