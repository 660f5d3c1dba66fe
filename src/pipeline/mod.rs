//! Pipeline stages for turning a scanned PDF into a searchable one.
//!
//! Each submodule implements exactly one step so it can be tested and
//! swapped on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ schedule ──▶ unit ──▶ merge
//! (path)    (pdfium)   (bounded     (preprocess  (lopdf +
//!                       queue)       + ocr)       transcript)
//! ```
//!
//! 1. [`input`]     : validate the source file, isolate a run directory
//! 2. [`render`]    : rasterise pages to PNG on disk; pdfium is blocking, so
//!    this runs under `spawn_blocking`
//! 3. [`schedule`]  : fan pages out to at most `workers` concurrent units,
//!    collect as they finish, restore page order, fold failures
//! 4. [`unit`]      : one page: decode, [`preprocess`], [`ocr`]
//! 5. [`postprocess`]: deterministic cleanup of engine text
//! 6. [`merge`]     : concatenate single-page PDFs and write the transcript

pub mod input;
pub mod merge;
pub mod ocr;
pub mod postprocess;
pub mod preprocess;
pub mod render;
pub mod schedule;
pub mod unit;
