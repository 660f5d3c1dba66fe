//! Input resolution: validate the source document and isolate a run directory.
//!
//! ## Why check magic bytes?
//!
//! pdfium reports a non-PDF as a generic load failure. Reading the first four
//! bytes (`%PDF`) up front gives callers a precise error before anything
//! else is touched, and it costs one `read`.
//!
//! ## Why a directory per run?
//!
//! Intermediates are named by page number only (`page_0003.png`,
//! `page_0003.pdf`), so two runs sharing a directory would overwrite each
//! other. Each run gets a fresh `run-XXXXXX` subdirectory of the working
//! directory. It is kept after the run because the outputs live there.

use crate::error::OcrPdfError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Validate a local PDF path: it exists, is readable and starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, OcrPdfError> {
    let path = path.to_path_buf();
    if !path.exists() {
        return Err(OcrPdfError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(OcrPdfError::PermissionDenied { path });
        }
        Err(_) => return Err(OcrPdfError::FileNotFound { path }),
    };

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) if &magic == PDF_MAGIC => {}
        Ok(()) => return Err(OcrPdfError::NotAPdf { path, magic }),
        Err(e) => {
            return Err(OcrPdfError::CorruptPdf {
                path,
                detail: format!("could not read header: {}", e),
            })
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Create a fresh, uniquely named run directory under `working_dir`.
pub fn create_run_dir(working_dir: &Path) -> Result<PathBuf, OcrPdfError> {
    std::fs::create_dir_all(working_dir).map_err(|source| OcrPdfError::WorkDirUnavailable {
        path: working_dir.to_path_buf(),
        source,
    })?;
    let dir = tempfile::Builder::new()
        .prefix("run-")
        .tempdir_in(working_dir)
        .map_err(|source| OcrPdfError::WorkDirUnavailable {
            path: working_dir.to_path_buf(),
            source,
        })?
        .keep();
    info!("Run directory: {}", dir.display());
    Ok(dir)
}

/// Persist an in-memory PDF into `run_dir` as `<name>.pdf`.
///
/// The bytes are checked for the PDF magic first so nothing is written for
/// obviously wrong input.
pub fn write_source_bytes(run_dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, OcrPdfError> {
    let path = run_dir.join(format!("{}.pdf", sanitize_stem(name)));
    if bytes.len() < 4 || &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(OcrPdfError::NotAPdf { path, magic });
    }
    std::fs::write(&path, bytes).map_err(|source| OcrPdfError::OutputWriteFailed {
        path: path.clone(),
        source,
    })?;
    debug!("Wrote {} source bytes to {}", bytes.len(), path.display());
    Ok(path)
}

/// File stem used to name the run's outputs.
pub fn document_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| sanitize_stem(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

fn sanitize_stem(name: &str) -> String {
    let stem = name.strip_suffix(".pdf").unwrap_or(name);
    let cleaned: String = stem
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    if cleaned.trim().is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
