//! Parallel page scheduler: bounded fan-out, collect-as-completed, restore order.
//!
//! ## Why `buffer_unordered`?
//!
//! Tasks are pulled lazily from an iterator into a window of
//! `workers + queue_slack` in-flight units. When a unit finishes the next
//! task is started, so at no point are more pages being decoded and OCR'd
//! than the window allows, however long the document is.
//!
//! ## Ordering
//!
//! Completion order is whatever the engine makes it. Results are collected
//! as they arrive (which is what progress reporting wants) and sorted by page
//! number afterwards. Submission order never determines output order.
//!
//! ## Failure policy
//!
//! A failed page does not stop the run early: every task is attempted, then
//! all failures are folded into one [`OcrPdfError::PagesFailed`] naming
//! every failing page. No retry.

use crate::config::PipelineConfig;
use crate::error::{OcrPdfError, PageError};
use crate::output::{PageOutput, PageResult, PageTask};
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::unit;
use crate::progress::{page_fraction, ProgressCallback};
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

/// Run every task and return one result per task, in ascending page order.
///
/// Progress is reported after each completion, from this task only, so the
/// reported fraction is monotonic.
pub async fn run_all(
    tasks: Vec<PageTask>,
    config: &PipelineConfig,
    engine: &dyn OcrEngine,
    progress: &dyn ProgressCallback,
) -> Vec<PageResult> {
    let total = tasks.len();
    let workers = config.effective_workers(total);
    let window = workers + config.queue_slack;
    info!(
        "Processing {} pages with {} workers (window {})",
        total, workers, window
    );

    let mut in_flight = stream::iter(
        tasks
            .into_iter()
            .map(|task| unit::process_page(task, config, engine)),
    )
    .buffer_unordered(window.max(1));

    let mut results = Vec::with_capacity(total);
    while let Some(result) = in_flight.next().await {
        let completed = results.len() + 1;
        match &result.outcome {
            Ok(_) => progress.on_page_complete(result.page_number, completed, total),
            Err(e) => progress.on_page_error(result.page_number, &e.to_string()),
        }
        progress.on_progress(
            page_fraction(completed, total),
            &format!("Processed {}/{} pages", completed, total),
        );
        debug!(
            "Page {} finished in {}ms ({}/{})",
            result.page_number, result.duration_ms, completed, total
        );
        results.push(result);
    }

    results.sort_by_key(|r| r.page_number);
    results
}

/// Run every task; succeed only if every page succeeded.
///
/// Returns `(page_number, output)` pairs in ascending page order, or
/// [`OcrPdfError::PagesFailed`] once all pages were attempted.
pub async fn run(
    tasks: Vec<PageTask>,
    config: &PipelineConfig,
    engine: &dyn OcrEngine,
    progress: &dyn ProgressCallback,
) -> Result<Vec<(usize, PageOutput)>, OcrPdfError> {
    let results = run_all(tasks, config, engine, progress).await;
    fold_failures(results)
}

/// Split results into outputs, or one aggregate error listing every failed page.
pub fn fold_failures(results: Vec<PageResult>) -> Result<Vec<(usize, PageOutput)>, OcrPdfError> {
    let total = results.len();
    let mut outputs = Vec::with_capacity(total);
    let mut failures: Vec<PageError> = Vec::new();
    for result in results {
        match result.outcome {
            Ok(out) => outputs.push((result.page_number, out)),
            Err(e) => failures.push(e),
        }
    }
    if failures.is_empty() {
        return Ok(outputs);
    }
    failures.sort_by_key(PageError::page);
    Err(OcrPdfError::PagesFailed {
        pages: failures.iter().map(PageError::page).collect(),
        total,
        failures,
    })
}
