//! Configuration types for a searchable-PDF run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. A config is immutable once built and is shared
//! read-only by every page unit of a run; nothing in the pipeline mutates it.
//!
//! The OCR engine binary path lives here as an ordinary field rather than in
//! any process-wide setting, so two runs in one process can point at two
//! different engines.

use crate::error::OcrPdfError;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::render::Rasterizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Lowest accepted rasterisation DPI.
pub const MIN_DPI: u32 = 100;
/// Highest accepted rasterisation DPI.
pub const MAX_DPI: u32 = 600;

/// Configuration for one searchable-PDF run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use searchable_pdf::{PipelineConfig, PreprocessingLevel};
///
/// let config = PipelineConfig::builder()
///     .language("deu")
///     .dpi(300)
///     .preprocessing(PreprocessingLevel::Heavy)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// OCR language code(s), tesseract style. Several languages are joined
    /// with `+` (e.g. `"eng+fra"`). Default: `"eng"`.
    pub language: String,

    /// Rasterisation DPI. Range: 100–600. Default: 300.
    ///
    /// 300 DPI is what tesseract is tuned for. Go higher only for very small
    /// print; lower DPI trades recognition quality for speed.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 10 000.
    ///
    /// Caps oversized pages (posters, plans) independently of DPI.
    pub max_rendered_pixels: u32,

    /// How aggressively each page is cleaned before OCR. Default: [`PreprocessingLevel::Medium`].
    pub preprocessing: PreprocessingLevel,

    /// Number of pages processed concurrently. Default: one less than the
    /// number of logical CPUs, at least 1.
    pub workers: usize,

    /// Extra tasks allowed in flight above `workers`. Default: 0.
    ///
    /// Pages are pulled from a bounded queue of `workers + queue_slack`
    /// slots and refilled as pages complete.
    pub queue_slack: usize,

    /// Explicit path to the tesseract binary. `None` resolves `tesseract`
    /// on `PATH`.
    pub tesseract_path: Option<PathBuf>,

    /// Pre-constructed OCR engine. Takes precedence over `tesseract_path`.
    pub engine: Option<Arc<dyn OcrEngine>>,

    /// Pre-constructed rasteriser. `None` uses pdfium.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Run transcript cleanup on recognised text. Default: true.
    pub clean_text: bool,

    /// Keep the before/after page images in memory on the result. Default: true.
    ///
    /// Turn off for large documents when only the output files are needed.
    pub keep_images: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: Language::English.code().to_string(),
            dpi: 300,
            max_rendered_pixels: 10_000,
            preprocessing: PreprocessingLevel::default(),
            workers: default_workers(),
            queue_slack: 0,
            tesseract_path: None,
            engine: None,
            rasterizer: None,
            clean_text: true,
            keep_images: true,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("language", &self.language)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("preprocessing", &self.preprocessing)
            .field("workers", &self.workers)
            .field("queue_slack", &self.queue_slack)
            .field("tesseract_path", &self.tesseract_path)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field("clean_text", &self.clean_text)
            .field("keep_images", &self.keep_images)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
            preprocessing_raw: None,
        }
    }

    /// Number of units actually run at once: never more than the machine
    /// has cores, never more than there are pages.
    pub fn effective_workers(&self, pages: usize) -> usize {
        self.workers.min(num_cpus::get().max(1)).min(pages).max(1)
    }

    /// Re-check the invariants `build()` enforces. Used by entry points that
    /// accept a hand-assembled config.
    pub fn validate(&self) -> Result<(), OcrPdfError> {
        if !(MIN_DPI..=MAX_DPI).contains(&self.dpi) {
            return Err(OcrPdfError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {}",
                self.dpi
            )));
        }
        if self.workers == 0 {
            return Err(OcrPdfError::InvalidConfig("Worker count must be ≥ 1".into()));
        }
        if self.max_rendered_pixels < 100 {
            return Err(OcrPdfError::InvalidConfig(format!(
                "max_rendered_pixels must be ≥ 100, got {}",
                self.max_rendered_pixels
            )));
        }
        validate_language(&self.language)
    }
}

/// Default worker count: leave one core free for the rest of the system.
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
    preprocessing_raw: Option<String>,
}

impl PipelineConfigBuilder {
    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.config.language = code.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px;
        self
    }

    pub fn preprocessing(mut self, level: PreprocessingLevel) -> Self {
        self.config.preprocessing = level;
        self.preprocessing_raw = None;
        self
    }

    /// Set the preprocessing level from its name (`light`, `medium`, `heavy`).
    /// An unknown name is reported by [`build`](Self::build).
    pub fn preprocessing_name(mut self, name: impl Into<String>) -> Self {
        self.preprocessing_raw = Some(name.into());
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn queue_slack(mut self, n: usize) -> Self {
        self.config.queue_slack = n;
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = Some(path.into());
        self
    }

    pub fn engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn clean_text(mut self, v: bool) -> Self {
        self.config.clean_text = v;
        self
    }

    pub fn keep_images(mut self, v: bool) -> Self {
        self.config.keep_images = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<PipelineConfig, OcrPdfError> {
        if let Some(raw) = self.preprocessing_raw.take() {
            self.config.preprocessing = raw.parse()?;
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Check a tesseract language string such as `eng` or `eng+chi_sim`.
///
/// Only the shape is checked here; whether the engine has the language
/// installed is checked by [`OcrEngine::check`] before page work starts.
pub fn validate_language(code: &str) -> Result<(), OcrPdfError> {
    if code.trim().is_empty() {
        return Err(OcrPdfError::InvalidConfig(
            "Language code must not be empty".into(),
        ));
    }
    for part in code.split('+') {
        let ok = part.len() >= 2
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !ok {
            return Err(OcrPdfError::InvalidConfig(format!(
                "Invalid language code '{part}' in '{code}'"
            )));
        }
    }
    Ok(())
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Named cleanup tier applied to each page before OCR.
///
/// | Level  | Steps |
/// |--------|-------|
/// | light  | grayscale |
/// | medium | grayscale → adaptive threshold (default) |
/// | heavy  | medium → median denoise → stroke thickening |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessingLevel {
    /// Grayscale conversion only. Fastest.
    Light,
    /// Grayscale plus adaptive binarisation. (default)
    #[default]
    Medium,
    /// Medium plus denoising and stroke thickening. Slowest.
    Heavy,
}

impl PreprocessingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreprocessingLevel::Light => "light",
            PreprocessingLevel::Medium => "medium",
            PreprocessingLevel::Heavy => "heavy",
        }
    }
}

impl fmt::Display for PreprocessingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreprocessingLevel {
    type Err = OcrPdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(PreprocessingLevel::Light),
            "medium" => Ok(PreprocessingLevel::Medium),
            "heavy" => Ok(PreprocessingLevel::Heavy),
            other => Err(OcrPdfError::InvalidConfig(format!(
                "Unknown preprocessing level '{other}' (expected light, medium or heavy)"
            ))),
        }
    }
}

/// The languages offered by the front end. Any other tesseract code can be
/// passed to [`PipelineConfigBuilder::language`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    English,
    French,
    German,
    Turkish,
    Russian,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::French,
        Language::German,
        Language::Turkish,
        Language::Russian,
    ];

    /// Tesseract traineddata code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::French => "fra",
            Language::German => "deu",
            Language::Turkish => "tur",
            Language::Russian => "rus",
        }
    }
}

/// Contiguous 1-indexed page range. `end: None` means "to the last page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl Default for PageRange {
    fn default() -> Self {
        Self {
            start: 1,
            end: None,
        }
    }
}

impl PageRange {
    /// Pages `start..=end`.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// A single page.
    pub fn single(page: usize) -> Self {
        Self::new(page, page)
    }

    /// From `start` to the last page of the document.
    pub fn from_page(start: usize) -> Self {
        Self { start, end: None }
    }

    /// Resolve against the document's page count.
    ///
    /// Unlike a clipping selection this rejects anything outside
    /// `1..=total_pages`; a run over a range the caller did not ask for
    /// would be silently wrong.
    pub fn resolve(&self, total_pages: usize) -> Result<(usize, usize), OcrPdfError> {
        let end = self.end.unwrap_or(total_pages);
        if self.start < 1 || self.start > end || end > total_pages {
            return Err(OcrPdfError::PageRangeInvalid {
                start: self.start,
                end,
                total: total_pages,
            });
        }
        Ok((self.start, end))
    }
}

impl FromStr for PageRange {
    type Err = OcrPdfError;

    /// Parse `all`, `5`, `3-15` or `3-` (to the end).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let bad = || OcrPdfError::InvalidConfig(format!("Invalid page range '{s}'"));
        if s == "all" {
            return Ok(PageRange::default());
        }
        if let Some((start, end)) = s.split_once('-') {
            let start: usize = start.trim().parse().map_err(|_| bad())?;
            let end = end.trim();
            if end.is_empty() {
                return Ok(PageRange::from_page(start));
            }
            let end: usize = end.parse().map_err(|_| bad())?;
            return Ok(PageRange::new(start, end));
        }
        let page: usize = s.parse().map_err(|_| bad())?;
        Ok(PageRange::single(page))
    }
}
