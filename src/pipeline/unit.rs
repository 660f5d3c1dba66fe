//! Page OCR unit: one rasterised page in, one [`PageResult`] out.
//!
//! ## Failure containment
//!
//! Every step of a page (decode, preprocess, OCR) is fallible, and a panic
//! in an image routine or an engine implementation is possible too. All of
//! it is converted to a [`PageError`] here, at the unit boundary, so the
//! scheduler only ever sees values. One bad page never tears down the
//! siblings that are still in flight.
//!
//! ## File layout
//!
//! For page `N` with source image `page_000N.png` the unit writes, next to it:
//!
//! ```text
//! page_000N_processed.png   preprocessed image handed to the engine
//! page_000N.pdf             single-page searchable PDF (engine output)
//! page_000N.txt             recognised text (engine output)
//! ```
//!
//! Every name is derived from the page number, so no two units ever write
//! the same path.

use crate::config::PipelineConfig;
use crate::error::PageError;
use crate::output::{PageOutput, PageResult, PageTask};
use crate::pipeline::ocr::{OcrEngine, OcrRequest};
use crate::pipeline::{postprocess, preprocess};
use futures::FutureExt;
use image::{DynamicImage, ImageFormat};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Run one page through preprocessing and OCR.
///
/// Never fails: errors and panics become `PageResult::outcome = Err(..)`.
pub async fn process_page(
    task: PageTask,
    config: &PipelineConfig,
    engine: &dyn OcrEngine,
) -> PageResult {
    let start = Instant::now();
    let page_number = task.page_number;
    let outcome = run(task, config, engine).await;
    if let Err(ref e) = outcome {
        warn!("{}", e);
    }
    PageResult {
        page_number,
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

async fn run(
    task: PageTask,
    config: &PipelineConfig,
    engine: &dyn OcrEngine,
) -> Result<PageOutput, PageError> {
    let page = task.page_number;
    let processed_path = processed_image_path(&task.source_image);
    let output_base = task.source_image.with_extension("");

    // ── Decode + preprocess (CPU-bound, off the executor) ────────────────
    let level = config.preprocessing;
    let keep_images = config.keep_images;
    let source = task.source_image.clone();
    let target = processed_path.clone();
    let images = tokio::task::spawn_blocking(move || {
        let original = image::open(&source).map_err(|e| PageError::DecodeFailed {
            page,
            detail: format!("{}: {}", source.display(), e),
        })?;
        let processed = preprocess::apply(&original, level);
        processed
            .save_with_format(&target, ImageFormat::Png)
            .map_err(|e| PageError::PreprocessFailed {
                page,
                detail: format!("could not write {}: {}", target.display(), e),
            })?;
        Ok::<_, PageError>(keep_images.then_some((original, processed)))
    })
    .await
    .map_err(|e| PageError::Panicked {
        page,
        detail: if e.is_panic() {
            panic_message(e.into_panic())
        } else {
            e.to_string()
        },
    })??;

    // ── OCR ──────────────────────────────────────────────────────────────
    let request = OcrRequest {
        page_number: page,
        image: &processed_path,
        output_base: &output_base,
        language: &config.language,
        dpi: task.dpi,
    };
    let recognition = AssertUnwindSafe(engine.recognize(request))
        .catch_unwind()
        .await
        .map_err(|payload| PageError::Panicked {
            page,
            detail: panic_message(payload),
        })?
        .map_err(|e| PageError::OcrFailed {
            page,
            detail: format!("{}: {}", engine.name(), e),
        })?;

    let text = if config.clean_text {
        postprocess::clean_text(&recognition.text)
    } else {
        recognition.text
    };
    debug!("Page {}: {} chars recognised", page, text.len());

    let (original_image, processed_image) = split_images(images);
    Ok(PageOutput {
        text,
        document: recognition.document,
        original_image,
        processed_image,
    })
}

fn split_images(
    images: Option<(DynamicImage, DynamicImage)>,
) -> (Option<DynamicImage>, Option<DynamicImage>) {
    match images {
        Some((original, processed)) => (Some(original), Some(processed)),
        None => (None, None),
    }
}

/// `page_0003.png` → `page_0003_processed.png`.
pub fn processed_image_path(source_image: &Path) -> PathBuf {
    let stem = source_image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    source_image.with_file_name(format!("{stem}_processed.png"))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
