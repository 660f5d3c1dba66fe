//! Progress-callback trait for run and per-page events.
//!
//! The orchestrator reports a fraction in `[0, 1]` plus a status line:
//!
//! | Fraction      | Stage |
//! |---------------|-------|
//! | `0.0`         | opening the source |
//! | `[0.1, 0.2)`  | rasterisation |
//! | `0.2 – 0.9`   | one report per finished page |
//! | `0.9`         | merging / export |
//! | `1.0`         | complete |
//!
//! Every report comes from the single task that drives the run, in order,
//! so the fraction never goes backwards. The trait is still `Send + Sync`
//! because that task may move between runtime threads.
//!
//! # Example
//!
//! ```rust
//! use searchable_pdf::ProgressCallback;
//! use std::sync::Mutex;
//!
//! let seen = Mutex::new(Vec::new());
//! let cb = |fraction: f32, message: &str| {
//!     seen.lock().unwrap().push((fraction, message.to_string()));
//! };
//! cb.on_progress(0.5, "halfway");
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

/// Start of the per-page band.
pub const PAGES_START: f32 = 0.2;
/// End of the per-page band; merge and export happen above it.
pub const PAGES_END: f32 = 0.9;
/// Start of the rasterisation band.
pub const RENDER_START: f32 = 0.1;

/// Called by the pipeline as a run advances.
///
/// Only [`on_progress`](Self::on_progress) is required; the page hooks have
/// no-op defaults.
pub trait ProgressCallback: Send + Sync {
    /// Overall progress.
    ///
    /// # Arguments
    /// * `fraction`: in `[0, 1]`, non-decreasing within a run
    /// * `message` : human-readable status line
    fn on_progress(&self, fraction: f32, message: &str);

    /// A page finished OCR successfully.
    ///
    /// # Arguments
    /// * `page_number`: 1-indexed page number
    /// * `completed`  : pages finished so far (success or failure)
    /// * `total`      : pages in the run
    fn on_page_complete(&self, page_number: usize, completed: usize, total: usize) {
        let _ = (page_number, completed, total);
    }

    /// A page failed. The run keeps going until every page was attempted.
    fn on_page_error(&self, page_number: usize, error: &str) {
        let _ = (page_number, error);
    }
}

impl<F> ProgressCallback for F
where
    F: Fn(f32, &str) + Send + Sync,
{
    fn on_progress(&self, fraction: f32, message: &str) {
        self(fraction, message)
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_progress(&self, _fraction: f32, _message: &str) {}
}

/// Fraction reported after `completed` of `total` pages have finished.
pub fn page_fraction(completed: usize, total: usize) -> f32 {
    if total == 0 {
        return PAGES_END;
    }
    let done = completed.min(total) as f32 / total as f32;
    PAGES_START + (PAGES_END - PAGES_START) * done
}

/// Fraction reported after `rendered` of `total` pages were rasterised.
/// Stays strictly below [`PAGES_START`].
pub fn render_fraction(rendered: usize, total: usize) -> f32 {
    if total == 0 {
        return RENDER_START;
    }
    let done = rendered.min(total) as f32 / total as f32;
    RENDER_START + (PAGES_START - RENDER_START) * 0.9 * done
}
