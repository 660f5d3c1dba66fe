//! PDF rasterisation: render a page range to images via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is blocking and keeps
//! thread-local state. Rendering runs on tokio's blocking pool and hands each
//! finished page back over a channel, so the async side can report progress
//! while the next page renders.
//!
//! ## Why write pages to disk?
//!
//! A 300 DPI letter page is ~25 MB decoded. Each page is written to the run
//! directory as PNG as soon as it is rendered and dropped from memory; page
//! units read it back one at a time.

use crate::error::OcrPdfError;
use crate::output::PageTask;
use crate::progress::{render_fraction, ProgressCallback};
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Resolution settings for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Target resolution.
    pub dpi: u32,
    /// Cap on either output dimension, in pixels.
    pub max_pixels: u32,
}

/// One rendered page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-indexed page number.
    pub page_number: usize,
    pub image: DynamicImage,
    /// Resolution the image was actually rendered at. Lower than the
    /// requested DPI when the pixel cap kicked in.
    pub dpi: u32,
}

/// A page rasteriser. Blocking; callers run it off the async executor.
pub trait Rasterizer: Send + Sync {
    /// Number of pages in `source`. Fails on unreadable or corrupt input.
    fn page_count(&self, source: &Path) -> Result<usize, OcrPdfError>;

    /// Render pages `first..=last` (1-indexed) in ascending order, handing
    /// each page to `sink` as soon as it is ready.
    fn render_pages(
        &self,
        source: &Path,
        first: usize,
        last: usize,
        settings: RenderSettings,
        sink: &mut dyn FnMut(RenderedPage) -> Result<(), OcrPdfError>,
    ) -> Result<(), OcrPdfError>;

    /// Render a single page.
    fn render_page(
        &self,
        source: &Path,
        page: usize,
        settings: RenderSettings,
    ) -> Result<DynamicImage, OcrPdfError> {
        let mut rendered = None;
        self.render_pages(source, page, page, settings, &mut |p| {
            rendered = Some(p.image);
            Ok(())
        })?;
        rendered.ok_or_else(|| OcrPdfError::RasterisationFailed {
            page,
            detail: "renderer produced no image".into(),
        })
    }
}

/// pdfium-backed rasteriser.
///
/// Binds to the library named by `PDFIUM_LIB_PATH` when set, otherwise to
/// the system-wide pdfium.
#[derive(Debug, Default, Clone)]
pub struct PdfiumRasterizer {
    library: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a specific pdfium shared library.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, OcrPdfError> {
        let explicit = self
            .library
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));
        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(&path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| OcrPdfError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

fn load_error(path: &Path, e: PdfiumError) -> OcrPdfError {
    let detail = format!("{:?}", e);
    let detail = if detail.contains("Password") || detail.contains("password") {
        format!("document is encrypted ({detail})")
    } else {
        detail
    };
    OcrPdfError::CorruptPdf {
        path: path.to_path_buf(),
        detail,
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn page_count(&self, source: &Path) -> Result<usize, OcrPdfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(source, None)
            .map_err(|e| load_error(source, e))?;
        Ok(document.pages().len() as usize)
    }

    fn render_pages(
        &self,
        source: &Path,
        first: usize,
        last: usize,
        settings: RenderSettings,
        sink: &mut dyn FnMut(RenderedPage) -> Result<(), OcrPdfError>,
    ) -> Result<(), OcrPdfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(source, None)
            .map_err(|e| load_error(source, e))?;
        let pages = document.pages();
        let total = pages.len() as usize;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(settings.dpi as f32 / 72.0)
            .set_maximum_width(settings.max_pixels as i32)
            .set_maximum_height(settings.max_pixels as i32);

        for page_number in first..=last {
            if page_number == 0 || page_number > total {
                return Err(OcrPdfError::PageRangeInvalid {
                    start: first,
                    end: last,
                    total,
                });
            }
            let page = pages
                .get((page_number - 1) as u16)
                .map_err(|e| OcrPdfError::RasterisationFailed {
                    page: page_number,
                    detail: format!("{:?}", e),
                })?;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                OcrPdfError::RasterisationFailed {
                    page: page_number,
                    detail: format!("{:?}", e),
                }
            })?;
            let image = bitmap.as_image();
            let dpi = effective_dpi(image.height(), page.height().value, settings.dpi);
            debug!(
                "Rendered page {} → {}x{} px at {} DPI",
                page_number,
                image.width(),
                image.height(),
                dpi
            );
            sink(RenderedPage {
                page_number,
                image,
                dpi,
            })?;
        }
        Ok(())
    }
}

/// Resolution of an image `pixels` high rendered from a page `points` high,
/// never above `requested`.
pub fn effective_dpi(pixels: u32, points: f32, requested: u32) -> u32 {
    if points <= 0.0 {
        return requested;
    }
    let dpi = (pixels as f32 * 72.0 / points).round() as u32;
    dpi.clamp(1, requested)
}

/// Path of the rasterised image for `page_number` inside `dir`.
pub fn page_image_path(dir: &Path, page_number: usize) -> PathBuf {
    dir.join(format!("page_{page_number:04}.png"))
}

/// Count the pages of `source` on the blocking pool.
pub async fn page_count(
    rasterizer: Arc<dyn Rasterizer>,
    source: &Path,
) -> Result<usize, OcrPdfError> {
    let source = source.to_path_buf();
    tokio::task::spawn_blocking(move || rasterizer.page_count(&source))
        .await
        .map_err(|e| OcrPdfError::Internal(format!("Page count task panicked: {}", e)))?
}

/// Rasterise `first..=last` into `out_dir`, one PNG per page, and build the
/// page tasks in ascending page order.
///
/// Progress is reported in the rasterisation band after every page.
pub async fn rasterize_to_dir(
    rasterizer: Arc<dyn Rasterizer>,
    source: &Path,
    (first, last): (usize, usize),
    settings: RenderSettings,
    out_dir: &Path,
    progress: &dyn ProgressCallback,
) -> Result<Vec<PageTask>, OcrPdfError> {
    let total = last + 1 - first;
    let source = source.to_path_buf();
    let out_dir = out_dir.to_path_buf();
    let (tx, mut rx) = mpsc::channel::<PageTask>(4);

    let worker = tokio::task::spawn_blocking(move || {
        rasterizer.render_pages(&source, first, last, settings, &mut |page| {
            let page_number = page.page_number;
            let path = page_image_path(&out_dir, page_number);
            page.image
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| OcrPdfError::RasterisationFailed {
                    page: page_number,
                    detail: format!("could not write {}: {}", path.display(), e),
                })?;
            tx.blocking_send(PageTask {
                page_number,
                source_image: path,
                dpi: page.dpi,
            })
            .map_err(|_| OcrPdfError::Internal("render receiver dropped".into()))
        })
    });

    let mut tasks = Vec::with_capacity(total);
    while let Some(task) = rx.recv().await {
        tasks.push(task);
        progress.on_progress(
            render_fraction(tasks.len(), total),
            &format!("Rendered page {}/{}", tasks.len(), total),
        );
    }

    worker
        .await
        .map_err(|e| OcrPdfError::Internal(format!("Render task panicked: {}", e)))??;

    if tasks.len() != total {
        return Err(OcrPdfError::Internal(format!(
            "rasteriser produced {} of {} pages",
            tasks.len(),
            total
        )));
    }
    tasks.sort_by_key(|t| t.page_number);
    info!("Rasterised {} pages at {} DPI", total, settings.dpi);
    Ok(tasks)
}
