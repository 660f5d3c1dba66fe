//! Data carried between pipeline stages and returned to the caller.

use crate::error::PageError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One rasterised page waiting for OCR. Consumed exactly once by a page unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    /// 1-indexed page number in the source document.
    pub page_number: usize,
    /// Rasterised page image on disk.
    pub source_image: PathBuf,
    /// Resolution the image was rendered at.
    pub dpi: u32,
}

/// What a page unit produces on success.
#[derive(Debug, Clone)]
pub struct PageOutput {
    /// Recognised text for this page.
    pub text: String,
    /// Single-page searchable PDF (image plus invisible text layer).
    pub document: PathBuf,
    /// The page as rasterised. Absent when `keep_images` is off.
    pub original_image: Option<DynamicImage>,
    /// The page as handed to the OCR engine. Absent when `keep_images` is off.
    pub processed_image: Option<DynamicImage>,
}

/// Result of one page unit: either its outputs or the reason it failed.
#[derive(Debug, Clone)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Outputs, or the page-level failure.
    pub outcome: Result<PageOutput, PageError>,
    /// Wall-clock time spent on this page.
    pub duration_ms: u64,
}

/// Timing summary of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages processed.
    pub pages: usize,
    /// Workers actually used.
    pub workers: usize,
    /// Total wall-clock time.
    pub total_duration_ms: u64,
    /// Time spent rasterising.
    pub render_duration_ms: u64,
    /// Time spent in page units (preprocess + OCR), wall clock.
    pub ocr_duration_ms: u64,
    /// Time spent merging and writing the transcript.
    pub merge_duration_ms: u64,
}

/// Final artifacts of a successful run, owned by the caller.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Merged searchable PDF.
    pub output_document: PathBuf,
    /// UTF-8 transcript file.
    pub text_output: PathBuf,
    /// Directory this run wrote its intermediates and outputs into.
    pub run_dir: PathBuf,
    /// One `--- Page N ---` block per page, ascending page order.
    pub text_blocks: Vec<String>,
    /// Page numbers, ascending; parallel to the other vectors.
    pub page_numbers: Vec<usize>,
    /// Rasterised pages, ascending page order (empty when `keep_images` is off).
    pub original_images: Vec<DynamicImage>,
    /// Preprocessed pages, ascending page order (empty when `keep_images` is off).
    pub processed_images: Vec<DynamicImage>,
    /// Timing summary.
    pub stats: RunStats,
}

impl PipelineResult {
    /// The whole transcript as written to [`text_output`](Self::text_output).
    pub fn transcript(&self) -> String {
        self.text_blocks.concat()
    }
}
