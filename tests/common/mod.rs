//! Test doubles shared by the integration tests: a rasteriser that draws
//! synthetic pages and an OCR engine that writes real one-page PDFs with
//! `lopdf`, so the whole pipeline runs without pdfium or tesseract.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use searchable_pdf::pipeline::ocr::EngineError;
use searchable_pdf::{
    OcrEngine, OcrPdfError, OcrRequest, ProgressCallback, Rasterizer, Recognition, RenderSettings,
    RenderedPage,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A file that passes the `%PDF` magic check; the fake rasteriser never parses it.
pub fn fake_source(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4\n% synthetic test input\n%%EOF\n").unwrap();
    path
}

/// Draws a white page with `page_number` dark bars so pages are distinguishable.
/// Can be told to reject the document or to break on one page.
pub struct FakeRasterizer {
    pub pages: usize,
    pub rendered: AtomicUsize,
    pub fail_page: Option<usize>,
    pub corrupt: bool,
}

impl FakeRasterizer {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            rendered: AtomicUsize::new(0),
            fail_page: None,
            corrupt: false,
        }
    }

    pub fn failing_at(pages: usize, page: usize) -> Self {
        Self {
            fail_page: Some(page),
            ..Self::new(pages)
        }
    }

    pub fn corrupt() -> Self {
        Self {
            corrupt: true,
            ..Self::new(3)
        }
    }
}

impl Rasterizer for FakeRasterizer {
    fn page_count(&self, source: &Path) -> Result<usize, OcrPdfError> {
        if self.corrupt {
            return Err(OcrPdfError::CorruptPdf {
                path: source.to_path_buf(),
                detail: "no xref table".into(),
            });
        }
        Ok(self.pages)
    }

    fn render_pages(
        &self,
        _source: &Path,
        first: usize,
        last: usize,
        settings: RenderSettings,
        sink: &mut dyn FnMut(RenderedPage) -> Result<(), OcrPdfError>,
    ) -> Result<(), OcrPdfError> {
        for page in first..=last {
            if self.fail_page == Some(page) {
                return Err(OcrPdfError::RasterisationFailed {
                    page,
                    detail: "bad page stream".into(),
                });
            }
            let mut img = GrayImage::from_pixel(64, 48, Luma([235]));
            for bar in 0..page.min(10) as u32 {
                for y in 8..40 {
                    img.put_pixel(4 + bar * 6, y, Luma([20]));
                    img.put_pixel(5 + bar * 6, y, Luma([20]));
                }
            }
            self.rendered.fetch_add(1, Ordering::SeqCst);
            sink(RenderedPage {
                page_number: page,
                image: DynamicImage::ImageLuma8(img),
                dpi: settings.dpi,
            })?;
        }
        Ok(())
    }
}

/// OCR engine double with per-page latency, forced failures and an
/// availability switch.
pub struct FakeEngine {
    pub delays_ms: HashMap<usize, u64>,
    pub fail_pages: HashSet<usize>,
    pub available: bool,
    pub calls: AtomicUsize,
    pub finished: Mutex<Vec<usize>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            delays_ms: HashMap::new(),
            fail_pages: HashSet::new(),
            available: true,
            calls: AtomicUsize::new(0),
            finished: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEngine {
    pub fn with_delays(delays: &[(usize, u64)]) -> Self {
        Self {
            delays_ms: delays.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn failing(pages: &[usize]) -> Self {
        Self {
            fail_pages: pages.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }
}

#[async_trait]
impl OcrEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn check(&self, _language: &str) -> Result<(), OcrPdfError> {
        if self.available {
            Ok(())
        } else {
            Err(OcrPdfError::EngineUnavailable {
                engine: "fake".into(),
                detail: "switched off".into(),
            })
        }
    }

    async fn recognize(&self, request: OcrRequest<'_>) -> Result<Recognition, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays_ms.get(&request.page_number).copied().unwrap_or(2);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.finished.lock().unwrap().push(request.page_number);

        if self.fail_pages.contains(&request.page_number) {
            return Err(EngineError::Exit {
                status: "exit status: 1".into(),
                stderr: format!("cannot read page {}", request.page_number),
            });
        }
        if !request.image.exists() {
            return Err(EngineError::Other("preprocessed image missing".into()));
        }

        let label = format!("Recognised text of page {}", request.page_number);
        let document = request.output_base.with_extension("pdf");
        one_page_pdf(&document, &label).map_err(EngineError::Other)?;
        Ok(Recognition {
            text: format!("{label}\n\u{000C}"),
            document,
        })
    }
}

/// Write a one-page PDF whose content stream shows `label`.
pub fn one_page_pdf(path: &Path, label: &str) -> Result<(), String> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(label)]),
            Operation::new("ET", vec![]),
        ],
    };
    let encoded = content.encode().map_err(|e| e.to_string())?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| e.to_string())?;
    std::fs::write(path, bytes).map_err(|e| e.to_string())
}

/// Records every progress report.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<(f32, String)>>,
    pub completed: Mutex<Vec<usize>>,
    pub errored: Mutex<Vec<usize>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, fraction: f32, message: &str) {
        self.events.lock().unwrap().push((fraction, message.to_string()));
    }

    fn on_page_complete(&self, page_number: usize, _completed: usize, _total: usize) {
        self.completed.lock().unwrap().push(page_number);
    }

    fn on_page_error(&self, page_number: usize, _error: &str) {
        self.errored.lock().unwrap().push(page_number);
    }
}

impl Recorder {
    pub fn fractions(&self) -> Vec<f32> {
        self.events.lock().unwrap().iter().map(|(f, _)| *f).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

/// Number of entries in `dir` (run directories created so far).
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Page count of a PDF on disk, via lopdf.
pub fn pdf_pages(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}
