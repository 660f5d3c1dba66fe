//! Run orchestration: source PDF in, searchable PDF + transcript out.
//!
//! ## Order of work
//!
//! Everything that can fail without looking at page content is checked
//! before any page is rasterised: the config, the OCR engine (binary and
//! language data), the source file, its page count and the requested range.
//! Only then is a run directory created and the document rendered. If a
//! page cannot be rasterised the run directory is removed again, so a
//! fail-fast error never leaves artifacts behind.
//!
//! ```text
//! validate ─▶ engine check ─▶ source ─▶ page count/range ─▶ run dir
//!    ─▶ rasterise (0.1‥0.2) ─▶ schedule (0.2‥0.9) ─▶ merge + transcript (0.9) ─▶ 1.0
//! ```

use crate::config::{PageRange, PipelineConfig};
use crate::error::OcrPdfError;
use crate::output::{PipelineResult, RunStats};
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer, RenderSettings};
use crate::pipeline::{input, merge, render, schedule};
use crate::progress::{ProgressCallback, PAGES_END, PAGES_START, RENDER_START};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Enhance a scanned PDF into a searchable PDF plus transcript.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `source`     : path to the scanned PDF
/// * `working_dir`: parent directory for this run's isolated `run-*` directory
/// * `pages`      : page range to process (1-indexed, inclusive)
/// * `progress`   : progress sink; use [`crate::NoopProgress`] to ignore
/// * `config`     : run configuration
///
/// # Errors
/// Configuration, engine and source errors are returned before any page is
/// touched. If any page fails, [`OcrPdfError::PagesFailed`] names every
/// failing page once all pages were attempted.
pub async fn process(
    source: impl AsRef<Path>,
    working_dir: impl AsRef<Path>,
    pages: PageRange,
    progress: &dyn ProgressCallback,
    config: &PipelineConfig,
) -> Result<PipelineResult, OcrPdfError> {
    let started = Instant::now();
    progress.on_progress(0.0, "Opening PDF...");

    let engine = prepare(config).await?;
    let source = input::resolve_local(source.as_ref())?;
    let rasterizer = resolve_rasterizer(config);
    let range = plan_range(&rasterizer, &source, pages).await?;
    let run_dir = input::create_run_dir(working_dir.as_ref())?;

    execute(&source, &run_dir, range, progress, config, engine, rasterizer, started).await
}

/// Like [`process`], for a PDF held in memory.
///
/// `name` names the outputs (`<name>_searchable.pdf`); the bytes are written
/// into the run directory before processing.
pub async fn process_bytes(
    bytes: &[u8],
    name: &str,
    working_dir: impl AsRef<Path>,
    pages: PageRange,
    progress: &dyn ProgressCallback,
    config: &PipelineConfig,
) -> Result<PipelineResult, OcrPdfError> {
    let started = Instant::now();
    progress.on_progress(0.0, "Opening PDF...");

    let engine = prepare(config).await?;
    let rasterizer = resolve_rasterizer(config);
    let run_dir = input::create_run_dir(working_dir.as_ref())?;

    let planned = async {
        let source = input::write_source_bytes(&run_dir, name, bytes)?;
        let range = plan_range(&rasterizer, &source, pages).await?;
        Ok::<_, OcrPdfError>((source, range))
    }
    .await;
    let (source, range) = match planned {
        Ok(planned) => planned,
        Err(e) => {
            discard_run_dir(&run_dir);
            return Err(e);
        }
    };

    execute(&source, &run_dir, range, progress, config, engine, rasterizer, started).await
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    source: impl AsRef<Path>,
    working_dir: impl AsRef<Path>,
    pages: PageRange,
    progress: &dyn ProgressCallback,
    config: &PipelineConfig,
) -> Result<PipelineResult, OcrPdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrPdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(source, working_dir, pages, progress, config))
}

/// Page count of a PDF, without processing it.
///
/// Needs neither an OCR engine nor a working directory.
pub async fn inspect(source: impl AsRef<Path>, config: &PipelineConfig) -> Result<usize, OcrPdfError> {
    let source = input::resolve_local(source.as_ref())?;
    render::page_count(resolve_rasterizer(config), &source).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Validate the config and make sure the engine can run, before any page work.
async fn prepare(config: &PipelineConfig) -> Result<Arc<dyn OcrEngine>, OcrPdfError> {
    config.validate()?;
    let engine = resolve_engine(config);
    engine.check(&config.language).await?;
    debug!("Engine '{}' ready for '{}'", engine.name(), config.language);
    Ok(engine)
}

/// Pre-built engine first, then tesseract at the configured path.
fn resolve_engine(config: &PipelineConfig) -> Arc<dyn OcrEngine> {
    match config.engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(TesseractEngine::new(config.tesseract_path.clone())),
    }
}

fn resolve_rasterizer(config: &PipelineConfig) -> Arc<dyn Rasterizer> {
    match config.rasterizer {
        Some(ref rasterizer) => Arc::clone(rasterizer),
        None => Arc::new(PdfiumRasterizer::new()),
    }
}

async fn plan_range(
    rasterizer: &Arc<dyn Rasterizer>,
    source: &Path,
    pages: PageRange,
) -> Result<(usize, usize), OcrPdfError> {
    let total = render::page_count(Arc::clone(rasterizer), source).await?;
    if total == 0 {
        return Err(OcrPdfError::EmptyPageRange {
            path: source.to_path_buf(),
        });
    }
    let range = pages.resolve(total)?;
    info!(
        "PDF has {} pages; processing {}-{}",
        total, range.0, range.1
    );
    Ok(range)
}

/// Remove a run directory after a fail-fast error, along with any pages
/// already rendered into it.
fn discard_run_dir(run_dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(run_dir) {
        warn!("Could not remove {}: {}", run_dir.display(), e);
    }
}

#[allow(clippy::too_many_arguments)]
async fn execute(
    source: &Path,
    run_dir: &Path,
    (first, last): (usize, usize),
    progress: &dyn ProgressCallback,
    config: &PipelineConfig,
    engine: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn Rasterizer>,
    started: Instant,
) -> Result<PipelineResult, OcrPdfError> {
    let page_total = last + 1 - first;

    // ── Rasterise ────────────────────────────────────────────────────────
    progress.on_progress(RENDER_START, "Converting PDF to images...");
    let render_start = Instant::now();
    let settings = RenderSettings {
        dpi: config.dpi,
        max_pixels: config.max_rendered_pixels,
    };
    let rendered =
        render::rasterize_to_dir(rasterizer, source, (first, last), settings, run_dir, progress)
            .await;
    let tasks = match rendered {
        Ok(tasks) => tasks,
        Err(e) => {
            discard_run_dir(run_dir);
            return Err(e);
        }
    };
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", tasks.len(), render_duration_ms);

    // ── OCR ──────────────────────────────────────────────────────────────
    progress.on_progress(
        PAGES_START,
        &format!("Found {} pages to process", page_total),
    );
    let ocr_start = Instant::now();
    let outputs = schedule::run(tasks, config, engine.as_ref(), progress).await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    // ── Merge + transcript ───────────────────────────────────────────────
    progress.on_progress(PAGES_END, "Creating final searchable PDF...");
    let merge_start = Instant::now();
    let stem = input::document_stem(source);
    let output_document = run_dir.join(format!("{stem}_searchable.pdf"));
    let text_output = run_dir.join(format!("{stem}_text.txt"));

    let documents: Vec<(usize, PathBuf)> = outputs
        .iter()
        .map(|(page, out)| (*page, out.document.clone()))
        .collect();
    let target = output_document.clone();
    tokio::task::spawn_blocking(move || merge::merge_documents(&documents, &target))
        .await
        .map_err(|e| OcrPdfError::Internal(format!("Merge task panicked: {}", e)))??;

    let text_blocks: Vec<String> = outputs
        .iter()
        .map(|(page, out)| merge::transcript_block(*page, &out.text))
        .collect();
    merge::write_transcript(&text_blocks, &text_output)?;
    let merge_duration_ms = merge_start.elapsed().as_millis() as u64;

    let page_numbers: Vec<usize> = outputs.iter().map(|(page, _)| *page).collect();
    let mut original_images = Vec::new();
    let mut processed_images = Vec::new();
    for (_, out) in outputs {
        if let (Some(original), Some(processed)) = (out.original_image, out.processed_image) {
            original_images.push(original);
            processed_images.push(processed);
        }
    }

    let stats = RunStats {
        pages: page_total,
        workers: config.effective_workers(page_total),
        total_duration_ms: started.elapsed().as_millis() as u64,
        render_duration_ms,
        ocr_duration_ms,
        merge_duration_ms,
    };
    info!(
        "Enhancement complete: {} pages, {}ms total",
        stats.pages, stats.total_duration_ms
    );
    progress.on_progress(1.0, "Processing complete!");

    Ok(PipelineResult {
        output_document,
        text_output,
        run_dir: run_dir.to_path_buf(),
        text_blocks,
        page_numbers,
        original_images,
        processed_images,
        stats,
    })
}
