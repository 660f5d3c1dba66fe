//! Low-resolution page previews with a bounded cache.
//!
//! Previews are for showing a user what they are about to process; they
//! play no part in the pipeline's output. Rendering at 100 DPI is cheap, but
//! a UI asks for the same pages over and over as the range changes, so
//! results are kept in a [`PreviewCache`].
//!
//! The cache is an insertion-ordered map with a fixed capacity. When an
//! insert pushes it over capacity the oldest-inserted entry is evicted.
//! Reads do not refresh an entry's position.

use crate::error::OcrPdfError;
use crate::pipeline::render::{Rasterizer, RenderSettings};
use image::DynamicImage;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Resolution previews are rendered at.
pub const PREVIEW_DPI: u32 = 100;
/// Entries a cache holds before evicting.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;
/// Most pages [`PreviewRenderer::preview_range`] renders in one call.
pub const MAX_PREVIEW_PAGES: usize = 10;

/// Cache key: which document, which page, at what resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewKey {
    pub document: PathBuf,
    pub page: usize,
    pub dpi: u32,
}

/// Bounded, insertion-ordered preview cache.
#[derive(Debug)]
pub struct PreviewCache {
    entries: IndexMap<PreviewKey, Arc<DynamicImage>>,
    capacity: usize,
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl PreviewCache {
    /// A cache holding at most `capacity` previews (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexMap::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn get(&self, key: &PreviewKey) -> Option<Arc<DynamicImage>> {
        self.entries.get(key).cloned()
    }

    /// Insert, evicting the oldest entries once over capacity.
    ///
    /// Replacing an existing key keeps its original insertion position.
    pub fn insert(&mut self, key: PreviewKey, image: Arc<DynamicImage>) {
        self.entries.insert(key, image);
        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                debug!("Evicted preview {}#{}", evicted.document.display(), evicted.page);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop everything, e.g. when a new document is loaded.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Renders previews through a [`Rasterizer`], serving repeats from a cache.
pub struct PreviewRenderer {
    rasterizer: Arc<dyn Rasterizer>,
    cache: Mutex<PreviewCache>,
    max_pixels: u32,
}

impl PreviewRenderer {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self::with_cache(rasterizer, PreviewCache::default())
    }

    pub fn with_cache(rasterizer: Arc<dyn Rasterizer>, cache: PreviewCache) -> Self {
        Self {
            rasterizer,
            cache: Mutex::new(cache),
            max_pixels: 2_000,
        }
    }

    fn cache(&self) -> MutexGuard<'_, PreviewCache> {
        // A panic while holding the lock cannot leave the map half-updated.
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Preview of one page at [`PREVIEW_DPI`].
    pub async fn preview(&self, document: &Path, page: usize) -> Result<Arc<DynamicImage>, OcrPdfError> {
        self.preview_at(document, page, PREVIEW_DPI).await
    }

    /// Preview of one page at an explicit DPI.
    pub async fn preview_at(
        &self,
        document: &Path,
        page: usize,
        dpi: u32,
    ) -> Result<Arc<DynamicImage>, OcrPdfError> {
        let key = PreviewKey {
            document: document.to_path_buf(),
            page,
            dpi,
        };
        if let Some(hit) = self.cache().get(&key) {
            return Ok(hit);
        }

        let rasterizer = Arc::clone(&self.rasterizer);
        let path = key.document.clone();
        let settings = RenderSettings {
            dpi,
            max_pixels: self.max_pixels,
        };
        let image = tokio::task::spawn_blocking(move || rasterizer.render_page(&path, page, settings))
            .await
            .map_err(|e| OcrPdfError::Internal(format!("Preview task panicked: {}", e)))??;

        let image = Arc::new(image);
        self.cache().insert(key, Arc::clone(&image));
        Ok(image)
    }

    /// Previews for `first..=last`, at most [`MAX_PREVIEW_PAGES`] of them.
    pub async fn preview_range(
        &self,
        document: &Path,
        first: usize,
        last: usize,
    ) -> Result<Vec<(usize, Arc<DynamicImage>)>, OcrPdfError> {
        let last = last.min(first.saturating_add(MAX_PREVIEW_PAGES - 1));
        let mut previews = Vec::new();
        for page in first..=last {
            previews.push((page, self.preview(document, page).await?));
        }
        Ok(previews)
    }

    pub fn cached(&self) -> usize {
        self.cache().len()
    }

    /// Forget all cached previews.
    pub fn clear(&self) {
        self.cache().clear();
    }
}
