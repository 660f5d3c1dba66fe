//! CLI binary for searchable-pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use searchable_pdf::config::{default_workers, MAX_DPI, MIN_DPI};
use searchable_pdf::{
    inspect, process, NoopProgress, OcrPdfError, PageRange, PipelineConfig, PreprocessingLevel,
    ProgressCallback, RunStats,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Resolution of the bar; the library reports fractions.
const BAR_STEPS: u64 = 1000;

/// Terminal progress: one bar driven by the run fraction, plus a log line
/// per finished page printed above it.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(BAR_STEPS);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:42.green/238}] {percent:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for CliProgress {
    fn on_progress(&self, fraction: f32, message: &str) {
        self.bar
            .set_position((fraction.clamp(0.0, 1.0) * BAR_STEPS as f32) as u64);
        self.bar.set_message(message.to_string());
    }

    fn on_page_complete(&self, page_number: usize, completed: usize, total: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            green("✓"),
            page_number,
            dim(&format!("{completed}/{total}")),
        ));
    }

    fn on_page_error(&self, page_number: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(80) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar
            .println(format!("  {} Page {:>3}  {}", red("✗"), page_number, red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole document, English, defaults (300 DPI, medium preprocessing)
  ocrpdf scan.pdf

  # Pages 3-10 of a German document, aggressive cleanup
  ocrpdf --pages 3-10 -l deu --preprocessing heavy scan.pdf

  # Several languages, explicit tesseract binary
  ocrpdf -l eng+fra --tesseract /opt/tesseract/bin/tesseract scan.pdf

  # Page count only
  ocrpdf --inspect-only scan.pdf

  # Machine-readable summary
  ocrpdf --json scan.pdf > summary.json

OUTPUTS (inside a fresh run-XXXXXX directory under --work-dir):
  <name>_searchable.pdf   scanned pages with an invisible text layer
  <name>_text.txt         transcript, one "--- Page N ---" block per page

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise the system library)
  RUST_LOG                Log filter (e.g. searchable_pdf=debug)
"#;

/// Make scanned PDFs searchable with tesseract OCR.
#[derive(Parser, Debug)]
#[command(
    name = "ocrpdf",
    version,
    about = "Make scanned PDFs searchable with tesseract OCR",
    long_about = "Rasterise each page of a scanned PDF, clean it up, run tesseract on the pages \
in parallel, and write a searchable PDF (scan + invisible text layer) and a plain-text transcript.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Scanned PDF to process.
    input: PathBuf,

    /// Directory that receives the run directory. Default: <tmp>/ocrpdf.
    #[arg(short = 'o', long, env = "OCRPDF_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// OCR language(s): eng, fra, deu, tur, rus, or any installed code; join with '+'.
    #[arg(short, long, env = "OCRPDF_LANGUAGE", default_value = "eng")]
    language: String,

    /// Rasterisation DPI (100–600).
    #[arg(long, env = "OCRPDF_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(MIN_DPI as i64..=MAX_DPI as i64))]
    dpi: u32,

    /// Image cleanup before OCR.
    #[arg(long, env = "OCRPDF_PREPROCESSING", value_enum, default_value = "medium")]
    preprocessing: PreprocessingArg,

    /// Pages processed in parallel. Default: CPU count minus one.
    #[arg(short, long, env = "OCRPDF_WORKERS")]
    workers: Option<usize>,

    /// Page range: all, 5, 3-15, or 3- (to the end).
    #[arg(long, env = "OCRPDF_PAGES", default_value = "all")]
    pages: String,

    /// Path to the tesseract binary.
    #[arg(long, env = "OCRPDF_TESSERACT")]
    tesseract: Option<PathBuf>,

    /// Keep tesseract's text exactly as produced (no whitespace cleanup).
    #[arg(long, env = "OCRPDF_RAW_TEXT")]
    raw_text: bool,

    /// Also print the transcript to stdout.
    #[arg(long)]
    print_text: bool,

    /// Print a JSON summary instead of the human-readable one.
    #[arg(long, env = "OCRPDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCRPDF_NO_PROGRESS")]
    no_progress: bool,

    /// Print the page count only, no OCR.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCRPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCRPDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PreprocessingArg {
    Light,
    Medium,
    Heavy,
}

impl From<PreprocessingArg> for PreprocessingLevel {
    fn from(v: PreprocessingArg) -> Self {
        match v {
            PreprocessingArg::Light => PreprocessingLevel::Light,
            PreprocessingArg::Medium => PreprocessingLevel::Medium,
            PreprocessingArg::Heavy => PreprocessingLevel::Heavy,
        }
    }
}

/// What `--json` prints.
#[derive(Serialize)]
struct Summary {
    output_document: PathBuf,
    text_output: PathBuf,
    run_dir: PathBuf,
    pages: Vec<usize>,
    stats: RunStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let pages = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;
        if cli.json {
            println!("{}", serde_json::json!({ "file": cli.input, "pages": pages }));
        } else {
            println!("File:   {}", cli.input.display());
            println!("Pages:  {}", pages);
        }
        return Ok(());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let range: PageRange = cli.pages.parse().context("Invalid --pages")?;
    let work_dir = cli
        .work_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("ocrpdf"));

    let bar = show_progress.then(CliProgress::new);
    let progress: &dyn ProgressCallback = match bar {
        Some(ref bar) => bar,
        None => &NoopProgress,
    };
    let outcome = process(&cli.input, &work_dir, range, progress, &config).await;
    if let Some(ref bar) = bar {
        bar.finish();
    }

    let result = match outcome {
        Ok(result) => result,
        Err(OcrPdfError::PagesFailed { pages, total, failures }) => {
            for failure in &failures {
                eprintln!("  {} {}", red("✗"), failure);
            }
            anyhow::bail!(
                "{} of {} pages failed ({}); no output was written",
                pages.len(),
                total,
                pages
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Err(e) => return Err(e).context("OCR run failed"),
    };

    if cli.print_text {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.transcript().as_bytes())
            .context("Failed to write to stdout")?;
    }

    if cli.json {
        let summary = Summary {
            output_document: result.output_document.clone(),
            text_output: result.text_output.clone(),
            run_dir: result.run_dir.clone(),
            pages: result.page_numbers.clone(),
            stats: result.stats.clone(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {} workers  {}ms",
            green("✔"),
            result.stats.pages,
            result.stats.workers,
            result.stats.total_duration_ms,
        );
        eprintln!("   PDF:  {}", bold(&result.output_document.display().to_string()));
        eprintln!("   Text: {}", bold(&result.text_output.display().to_string()));
        eprintln!(
            "   {}",
            dim(&format!(
                "render {}ms  /  ocr {}ms  /  merge {}ms",
                result.stats.render_duration_ms,
                result.stats.ocr_duration_ms,
                result.stats.merge_duration_ms
            ))
        );
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .language(cli.language.trim())
        .dpi(cli.dpi)
        .preprocessing(cli.preprocessing.into())
        .workers(cli.workers.unwrap_or_else(default_workers))
        .clean_text(!cli.raw_text)
        .keep_images(false);

    if let Some(ref path) = cli.tesseract {
        builder = builder.tesseract_path(path.clone());
    }

    builder.build().context("Invalid configuration")
}
