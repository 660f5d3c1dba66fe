//! OCR engine seam and the tesseract command-line implementation.
//!
//! The pipeline only needs two things from an engine: a cheap availability
//! check that runs before any page work, and a per-page call that yields the
//! recognised text plus a one-page PDF with an invisible text layer over the
//! page image. [`TesseractEngine`] gets both from a single `tesseract`
//! invocation with the `txt` and `pdf` output configs.
//!
//! Engines are `Send + Sync` and hold no per-run state; everything a call
//! needs arrives in the [`OcrRequest`].

use crate::error::OcrPdfError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Everything one page's OCR call needs.
#[derive(Debug, Clone, Copy)]
pub struct OcrRequest<'a> {
    /// 1-indexed page number (for logging).
    pub page_number: usize,
    /// Preprocessed page image.
    pub image: &'a Path,
    /// Output path without extension; the engine writes `<base>.pdf`.
    pub output_base: &'a Path,
    /// Tesseract language string.
    pub language: &'a str,
    /// Resolution of `image`, so the PDF page gets its physical size right.
    pub dpi: u32,
}

/// What the engine returns for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    /// Recognised text, as produced by the engine.
    pub text: String,
    /// Single-page searchable PDF.
    pub document: PathBuf,
}

/// Failure of a single engine call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not start '{binary}': {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("engine output '{path}' missing: {source}")]
    MissingOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// An OCR backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short name for logs and error messages.
    fn name(&self) -> &str;

    /// Verify the engine can run and has `language` installed.
    ///
    /// Called once per run before any page is rasterised.
    async fn check(&self, language: &str) -> Result<(), OcrPdfError>;

    /// Recognise one preprocessed page.
    async fn recognize(&self, request: OcrRequest<'_>) -> Result<Recognition, EngineError>;
}

/// The `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TesseractEngine {
    /// Use `binary` if given, else `tesseract` from `PATH`.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| PathBuf::from("tesseract")),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        // Pages already run in parallel; tesseract's own OpenMP threads
        // would oversubscribe the CPU.
        cmd.env("OMP_THREAD_LIMIT", "1")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn unavailable(&self, detail: impl Into<String>) -> OcrPdfError {
        OcrPdfError::EngineUnavailable {
            engine: self.binary.display().to_string(),
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn check(&self, language: &str) -> Result<(), OcrPdfError> {
        let version = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;
        if !version.status.success() {
            return Err(self.unavailable(format!("`--version` exited with {}", version.status)));
        }
        let banner = String::from_utf8_lossy(&version.stdout);
        info!(
            "OCR engine: {}",
            banner.lines().next().unwrap_or("tesseract (unknown version)")
        );

        let langs = self
            .command()
            .arg("--list-langs")
            .output()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;
        if !langs.status.success() {
            return Err(self.unavailable(format!("`--list-langs` exited with {}", langs.status)));
        }
        // Older releases print the list on stderr.
        let mut listing = String::from_utf8_lossy(&langs.stdout).into_owned();
        listing.push('\n');
        listing.push_str(&String::from_utf8_lossy(&langs.stderr));
        let installed = parse_language_list(&listing);

        check_languages(language, &installed)
    }

    async fn recognize(&self, request: OcrRequest<'_>) -> Result<Recognition, EngineError> {
        debug!("Page {}: running tesseract", request.page_number);
        let output = self
            .command()
            .arg(request.image)
            .arg(request.output_base)
            .arg("-l")
            .arg(request.language)
            .arg("--dpi")
            .arg(request.dpi.to_string())
            .arg("txt")
            .arg("pdf")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text_path = request.output_base.with_extension("txt");
        let text = tokio::fs::read_to_string(&text_path)
            .await
            .map_err(|source| EngineError::MissingOutput {
                path: text_path.clone(),
                source,
            })?;

        let document = request.output_base.with_extension("pdf");
        tokio::fs::metadata(&document)
            .await
            .map_err(|source| EngineError::MissingOutput {
                path: document.clone(),
                source,
            })?;

        Ok(Recognition { text, document })
    }
}

/// Extract language codes from `tesseract --list-langs` output.
pub fn parse_language_list(listing: &str) -> Vec<String> {
    let mut langs: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.ends_with(':') && !l.contains(' '))
        .map(str::to_string)
        .collect();
    langs.sort();
    langs.dedup();
    langs
}

/// Every `+`-separated part of `language` must be installed.
pub fn check_languages(language: &str, installed: &[String]) -> Result<(), OcrPdfError> {
    for part in language.split('+') {
        if !installed.iter().any(|l| l == part) {
            return Err(OcrPdfError::LanguageNotInstalled {
                language: part.to_string(),
                available: installed.join(", "),
            });
        }
    }
    Ok(())
}
