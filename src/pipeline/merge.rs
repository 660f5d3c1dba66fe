//! Document merger: single-page searchable PDFs → one PDF, page texts → one transcript.
//!
//! ## How pages are copied
//!
//! Each single-page document is loaded with `lopdf` and its page object is
//! deep-copied into a fresh output document, following every indirect
//! reference (content streams, image XObjects, the GlyphLessFont tesseract
//! embeds for its invisible text). A per-source map from old to new object
//! ids keeps shared objects shared and terminates on reference cycles.
//! `/Parent` links are not followed; every copied page is re-parented onto
//! the output's single page tree node.
//!
//! Page attributes a producer may have put on the page tree node instead of
//! the page (`/Resources`, `/MediaBox`, `/CropBox`, `/Rotate`) are copied
//! down onto the page first, so nothing is lost when the old tree is dropped.
//!
//! ## Failure policy
//!
//! Hard stop, the same as for page failures: if any input cannot be loaded
//! or copied the merge fails with [`OcrPdfError::MergeFailed`] naming the
//! page, and no output document is written. A merged PDF silently missing
//! pages is worse than a clear error.
//!
//! ## Atomic writes
//!
//! Outputs are written to a `.tmp` sibling and renamed into place, so a
//! reader never sees a half-written file.

use crate::error::OcrPdfError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Attributes a page inherits from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Concatenate single-page documents, in the given order, into `output`.
///
/// `documents` pairs each page number (for error reporting) with its
/// single-page PDF. Returns the number of pages written.
pub fn merge_documents(documents: &[(usize, PathBuf)], output: &Path) -> Result<usize, OcrPdfError> {
    let mut merged = Document::with_version("1.5");
    let pages_id = merged.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(documents.len());

    for (page_number, path) in documents {
        let fail = |detail: String| OcrPdfError::MergeFailed {
            page: *page_number,
            path: path.clone(),
            detail,
        };

        let source = Document::load(path).map_err(|e| fail(format!("cannot open: {}", e)))?;
        let source_pages = source.get_pages();
        if source_pages.is_empty() {
            return Err(fail("document has no pages".into()));
        }

        let mut copied: HashMap<ObjectId, ObjectId> = HashMap::new();
        for page_id in source_pages.values() {
            let mut page = source
                .get_dictionary(*page_id)
                .map_err(|e| fail(format!("bad page object {:?}: {}", page_id, e)))?
                .clone();
            inherit_attributes(&source, &mut page);

            let mut page = copy_dictionary(&source, &mut merged, &page, &mut copied);
            page.set("Parent", Object::Reference(pages_id));
            kids.push(Object::Reference(merged.add_object(page)));
        }
        debug!("Merged page {} from {}", page_number, path.display());
    }

    let count = kids.len();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|e| OcrPdfError::Internal(format!("failed to serialise merged PDF: {}", e)))?;
    write_atomic(output, &bytes)?;

    info!("Wrote {} pages to {}", count, output.display());
    Ok(count)
}

/// Copy attributes the page inherits from its page-tree ancestors onto the
/// page itself. The page's own value wins.
fn inherit_attributes(source: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(id) = parent {
        // Malformed trees can loop.
        depth += 1;
        if depth > 64 {
            break;
        }
        let Ok(node) = source.get_dictionary(id) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}

fn copy_dictionary(
    source: &Document,
    target: &mut Document,
    dict: &Dictionary,
    copied: &mut HashMap<ObjectId, ObjectId>,
) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        if key == b"Parent" {
            continue;
        }
        out.set(key.clone(), copy_object(source, target, value, copied));
    }
    out
}

fn copy_object(
    source: &Document,
    target: &mut Document,
    object: &Object,
    copied: &mut HashMap<ObjectId, ObjectId>,
) -> Object {
    match object {
        Object::Reference(id) => {
            if let Some(new_id) = copied.get(id) {
                return Object::Reference(*new_id);
            }
            let Ok(referenced) = source.get_object(*id) else {
                debug!("Dangling reference {:?} replaced with null", id);
                return Object::Null;
            };
            // Reserve the id before descending so cycles resolve to it.
            let new_id = target.new_object_id();
            copied.insert(*id, new_id);
            let value = copy_object(source, target, referenced, copied);
            target.objects.insert(new_id, value);
            Object::Reference(new_id)
        }
        Object::Dictionary(dict) => Object::Dictionary(copy_dictionary(source, target, dict, copied)),
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| copy_object(source, target, item, copied))
                .collect(),
        ),
        Object::Stream(stream) => {
            let mut stream = stream.clone();
            stream.dict = copy_dictionary(source, target, &stream.dict, copied);
            Object::Stream(stream)
        }
        other => other.clone(),
    }
}

/// One transcript block: `--- Page N ---\n<text>\n\n`.
pub fn transcript_block(page_number: usize, text: &str) -> String {
    format!("--- Page {} ---\n{}\n\n", page_number, text)
}

/// Write the transcript (already ordered blocks) as UTF-8.
pub fn write_transcript(blocks: &[String], output: &Path) -> Result<(), OcrPdfError> {
    write_atomic(output, blocks.concat().as_bytes())?;
    info!("Wrote transcript ({} pages) to {}", blocks.len(), output.display());
    Ok(())
}

/// Write to a temp sibling, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), OcrPdfError> {
    let write_err = |source| OcrPdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, bytes).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(write_err)
}
