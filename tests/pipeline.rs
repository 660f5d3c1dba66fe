//! Integration tests for the full run: source → rasterise → OCR → merge.
//!
//! The rasteriser and engine are test doubles (see `common`), everything
//! else is the real pipeline: run directories, PNG intermediates,
//! preprocessing, the bounded scheduler, lopdf merging and the transcript.

mod common;

use common::{entries, fake_source, pdf_pages, FakeEngine, FakeRasterizer, Recorder};
use searchable_pdf::{
    inspect, process, process_bytes, OcrPdfError, PageRange, PipelineConfig, PreprocessingLevel,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn config(
    engine: Arc<FakeEngine>,
    rasterizer: Arc<FakeRasterizer>,
    workers: usize,
) -> PipelineConfig {
    PipelineConfig::builder()
        .language("eng")
        .dpi(300)
        .preprocessing(PreprocessingLevel::Medium)
        .workers(workers)
        .engine(engine)
        .rasterizer(rasterizer)
        .build()
        .unwrap()
}

// ── Scenario ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ten_pages_four_workers() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "scan.pdf");
    let work = tmp.path().join("work");
    // Early pages are slowest so completion order is scrambled.
    let delays: Vec<(usize, u64)> = (1..=10).map(|p| (p, (11 - p as u64) * 4)).collect();
    let engine = Arc::new(FakeEngine::with_delays(&delays));
    let rasterizer = Arc::new(FakeRasterizer::new(10));
    let progress = Recorder::default();

    let result = process(
        &source,
        &work,
        PageRange::new(1, 10),
        &progress,
        &config(engine.clone(), rasterizer.clone(), 4),
    )
    .await
    .unwrap();

    // Outputs
    assert_eq!(result.page_numbers, (1..=10).collect::<Vec<_>>());
    assert_eq!(pdf_pages(&result.output_document), 10);
    assert_eq!(
        result.output_document.file_name().unwrap(),
        "scan_searchable.pdf"
    );
    assert_eq!(result.text_output.file_name().unwrap(), "scan_text.txt");
    assert!(result.output_document.starts_with(&result.run_dir));

    let transcript = std::fs::read_to_string(&result.text_output).unwrap();
    assert_eq!(transcript, result.transcript());
    let headers: Vec<&str> = transcript
        .lines()
        .filter(|l| l.starts_with("--- Page "))
        .collect();
    let expected: Vec<String> = (1..=10).map(|p| format!("--- Page {p} ---")).collect();
    assert_eq!(headers, expected);
    assert!(transcript.starts_with("--- Page 1 ---\nRecognised text of page 1\n\n--- Page 2 ---"));

    // Before/after images, in page order
    assert_eq!(result.original_images.len(), 10);
    assert_eq!(result.processed_images.len(), 10);
    assert!(result.processed_images.iter().all(|i| i.as_luma8().is_some()));

    // Progress: starts at 0, ends at 1, never goes back
    let fractions = progress.fractions();
    assert_eq!(fractions.first().copied(), Some(0.0));
    assert_eq!(fractions.last().copied(), Some(1.0));
    assert!(
        fractions.windows(2).all(|w| w[0] <= w[1]),
        "progress regressed: {fractions:?}"
    );
    let messages = progress.messages();
    assert!(messages.contains(&"Found 10 pages to process".to_string()));
    assert!(messages.contains(&"Processed 10/10 pages".to_string()));
    assert_eq!(progress.completed.lock().unwrap().len(), 10);

    assert_eq!(engine.calls.load(Ordering::SeqCst), 10);
    assert_eq!(rasterizer.rendered.load(Ordering::SeqCst), 10);
    assert_eq!(result.stats.pages, 10);
    assert!(result.stats.workers >= 1 && result.stats.workers <= 4);
}

// ── Ordering and determinism ────────────────────────────────────────────────

#[tokio::test]
async fn one_worker_matches_many_workers() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let work = tmp.path().join("work");
    let delays = [(1, 30), (2, 1), (3, 20), (4, 5), (5, 1), (6, 12)];

    let serial = process(
        &source,
        &work,
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(
            Arc::new(FakeEngine::with_delays(&delays)),
            Arc::new(FakeRasterizer::new(6)),
            1,
        ),
    )
    .await
    .unwrap();
    let parallel = process(
        &source,
        &work,
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(
            Arc::new(FakeEngine::with_delays(&delays)),
            Arc::new(FakeRasterizer::new(6)),
            6,
        ),
    )
    .await
    .unwrap();

    assert_eq!(serial.page_numbers, parallel.page_numbers);
    assert_eq!(serial.text_blocks, parallel.text_blocks);
    assert_eq!(serial.processed_images, parallel.processed_images);
}

#[tokio::test]
async fn rerun_is_idempotent_and_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let work = tmp.path().join("work");

    let mut runs = Vec::new();
    for _ in 0..2 {
        runs.push(
            process(
                &source,
                &work,
                PageRange::from_page(2),
                &searchable_pdf::NoopProgress,
                &config(
                    Arc::new(FakeEngine::default()),
                    Arc::new(FakeRasterizer::new(4)),
                    2,
                ),
            )
            .await
            .unwrap(),
        );
    }

    assert_ne!(runs[0].run_dir, runs[1].run_dir);
    assert_eq!(entries(&work), 2);
    assert_eq!(
        std::fs::read(&runs[0].text_output).unwrap(),
        std::fs::read(&runs[1].text_output).unwrap()
    );
    assert_eq!(pdf_pages(&runs[0].output_document), 3);
    assert_eq!(pdf_pages(&runs[1].output_document), 3);
}

#[tokio::test]
async fn single_page_run() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let result = process(
        &source,
        tmp.path().join("work"),
        PageRange::single(3),
        &searchable_pdf::NoopProgress,
        &config(
            Arc::new(FakeEngine::default()),
            Arc::new(FakeRasterizer::new(5)),
            4,
        ),
    )
    .await
    .unwrap();

    assert_eq!(result.page_numbers, vec![3]);
    assert_eq!(
        result.transcript(),
        "--- Page 3 ---\nRecognised text of page 3\n\n"
    );
    assert_eq!(pdf_pages(&result.output_document), 1);
    assert_eq!(result.stats.workers, 1);
}

// ── Page failures ────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_pages_are_named_after_all_pages_ran() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let engine = Arc::new(FakeEngine::failing(&[2, 5]));
    let progress = Recorder::default();

    let err = process(
        &source,
        tmp.path().join("work"),
        PageRange::default(),
        &progress,
        &config(engine.clone(), Arc::new(FakeRasterizer::new(5)), 3),
    )
    .await
    .unwrap_err();

    match err {
        OcrPdfError::PagesFailed {
            pages,
            total,
            failures,
        } => {
            assert_eq!(pages, vec![2, 5]);
            assert_eq!(total, 5);
            assert!(failures.iter().all(|f| f.to_string().contains("cannot read page")));
        }
        other => panic!("unexpected: {other}"),
    }

    let mut finished = engine.finished.lock().unwrap().clone();
    finished.sort();
    assert_eq!(finished, vec![1, 2, 3, 4, 5]);
    let mut completed = progress.completed.lock().unwrap().clone();
    completed.sort();
    assert_eq!(completed, vec![1, 3, 4]);
    let mut errored = progress.errored.lock().unwrap().clone();
    errored.sort();
    assert_eq!(errored, vec![2, 5]);
    assert!(!progress.fractions().contains(&1.0));
}

// ── Fail-fast errors ─────────────────────────────────────────────────────────

#[tokio::test]
async fn unavailable_engine_fails_before_rendering() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let work = tmp.path().join("work");
    let rasterizer = Arc::new(FakeRasterizer::new(3));

    let err = process(
        &source,
        &work,
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(Arc::new(FakeEngine::unavailable()), rasterizer.clone(), 2),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, OcrPdfError::EngineUnavailable { .. }));
    assert!(err.is_fail_fast());
    assert_eq!(rasterizer.rendered.load(Ordering::SeqCst), 0);
    assert_eq!(entries(&work), 0);
}

#[tokio::test]
async fn out_of_range_pages_fail_fast() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let work = tmp.path().join("work");
    let engine = Arc::new(FakeEngine::default());

    let err = process(
        &source,
        &work,
        PageRange::new(2, 9),
        &searchable_pdf::NoopProgress,
        &config(engine.clone(), Arc::new(FakeRasterizer::new(4)), 2),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        OcrPdfError::PageRangeInvalid {
            start: 2,
            end: 9,
            total: 4
        }
    ));
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(entries(&work), 0);
}

#[tokio::test]
async fn broken_page_removes_rendered_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let work = tmp.path().join("work");
    let engine = Arc::new(FakeEngine::default());
    let rasterizer = Arc::new(FakeRasterizer::failing_at(4, 3));

    let err = process(
        &source,
        &work,
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(engine.clone(), rasterizer.clone(), 2),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, OcrPdfError::RasterisationFailed { page: 3, .. }));
    assert!(err.is_fail_fast());
    // Pages 1 and 2 were written before page 3 broke.
    assert_eq!(rasterizer.rendered.load(Ordering::SeqCst), 2);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(entries(&work), 0);
}

#[tokio::test]
async fn bytes_input_broken_page_leaves_no_run_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let err = process_bytes(
        b"%PDF-1.4",
        "upload",
        tmp.path(),
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(
            Arc::new(FakeEngine::default()),
            Arc::new(FakeRasterizer::failing_at(3, 2)),
            2,
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OcrPdfError::RasterisationFailed { page: 2, .. }));
    assert_eq!(entries(tmp.path()), 0);
}

#[tokio::test]
async fn corrupt_document_fails_before_any_work() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let work = tmp.path().join("work");
    let engine = Arc::new(FakeEngine::default());
    let rasterizer = Arc::new(FakeRasterizer::corrupt());

    let err = process(
        &source,
        &work,
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(engine.clone(), rasterizer.clone(), 2),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, OcrPdfError::CorruptPdf { .. }));
    assert!(err.is_fail_fast());
    assert_eq!(rasterizer.rendered.load(Ordering::SeqCst), 0);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(entries(&work), 0);
}

#[tokio::test]
async fn empty_document_fails_fast() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "empty.pdf");
    let err = process(
        &source,
        tmp.path().join("work"),
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(
            Arc::new(FakeEngine::default()),
            Arc::new(FakeRasterizer::new(0)),
            2,
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OcrPdfError::EmptyPageRange { .. }));
}

#[tokio::test]
async fn non_pdf_source_fails_fast() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("photo.pdf");
    std::fs::write(&source, b"\x89PNG\r\n").unwrap();
    let err = process(
        &source,
        tmp.path().join("work"),
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(
            Arc::new(FakeEngine::default()),
            Arc::new(FakeRasterizer::new(2)),
            2,
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OcrPdfError::NotAPdf { .. }));
}

#[tokio::test]
async fn hand_built_invalid_config_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let mut cfg = config(
        Arc::new(FakeEngine::default()),
        Arc::new(FakeRasterizer::new(2)),
        2,
    );
    cfg.dpi = 50;
    let err = process(
        &source,
        tmp.path().join("work"),
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &cfg,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OcrPdfError::InvalidConfig(_)));
}

// ── Other entry points ───────────────────────────────────────────────────────

#[tokio::test]
async fn bytes_input_names_outputs_after_the_upload() {
    let tmp = tempfile::tempdir().unwrap();
    let bytes = b"%PDF-1.4\n% uploaded\n%%EOF\n".to_vec();
    let result = process_bytes(
        &bytes,
        "upload.pdf",
        tmp.path(),
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &config(
            Arc::new(FakeEngine::default()),
            Arc::new(FakeRasterizer::new(2)),
            2,
        ),
    )
    .await
    .unwrap();
    assert_eq!(
        result.output_document.file_name().unwrap(),
        "upload_searchable.pdf"
    );
    assert_eq!(result.page_numbers, vec![1, 2]);
}

#[tokio::test]
async fn bytes_input_error_leaves_no_run_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let err = process_bytes(
        b"%PDF-1.4",
        "upload",
        tmp.path(),
        PageRange::new(1, 5),
        &searchable_pdf::NoopProgress,
        &config(
            Arc::new(FakeEngine::default()),
            Arc::new(FakeRasterizer::new(2)),
            2,
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OcrPdfError::PageRangeInvalid { .. }));
    assert_eq!(entries(tmp.path()), 0);
}

#[tokio::test]
async fn inspect_counts_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let cfg = config(
        Arc::new(FakeEngine::unavailable()),
        Arc::new(FakeRasterizer::new(7)),
        1,
    );
    assert_eq!(inspect(&source, &cfg).await.unwrap(), 7);
}

#[tokio::test]
async fn images_can_be_dropped() {
    let tmp = tempfile::tempdir().unwrap();
    let source = fake_source(tmp.path(), "doc.pdf");
    let mut cfg = config(
        Arc::new(FakeEngine::default()),
        Arc::new(FakeRasterizer::new(3)),
        2,
    );
    cfg.keep_images = false;
    let result = process(
        &source,
        tmp.path().join("work"),
        PageRange::default(),
        &searchable_pdf::NoopProgress,
        &cfg,
    )
    .await
    .unwrap();
    assert!(result.original_images.is_empty());
    assert_eq!(result.text_blocks.len(), 3);
}
