//! Bounded caches of rendered page bitmaps.
//!
//! Eviction is strictly by insertion order: reading an entry does not
//! protect it. The cache holding the authoritative page renders is only
//! ever filled at the configured render DPI; low-DPI previews never enter it.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use tiny_skia::Pixmap;

use crate::document::DocumentSource;
use crate::error::{RenderError, RenderResult};
use crate::raster::scale_pixmap;

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of evictions.
    pub evictions: u64,
    /// Number of insertions.
    pub inserts: u64,
}

/// A fixed-capacity map that evicts its earliest-inserted entry.
#[derive(Debug, Clone)]
pub struct FifoCache<K, V> {
    capacity: usize,
    order: VecDeque<K>,
    entries: HashMap<K, V>,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> FifoCache<K, V> {
    /// Create a cache holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            entries: HashMap::with_capacity(capacity + 1),
            stats: CacheStats::default(),
        }
    }

    /// Look up an entry. Does not affect eviction order.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let found = self.entries.get(key);
        if found.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        found
    }

    /// True if the key is cached. Does not count as a hit or miss.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert an entry, returning the key evicted to make room, if any.
    ///
    /// Replacing an existing key keeps its original position in the queue.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        self.stats.inserts += 1;
        if self.entries.insert(key.clone(), value).is_some() {
            return None;
        }
        self.order.push_back(key);
        if self.order.len() <= self.capacity {
            return None;
        }
        let evicted = self.order.pop_front()?;
        self.entries.remove(&evicted);
        self.stats.evictions += 1;
        Some(evicted)
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(value)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Hit/miss/eviction counters.
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Authoritative cache of document pages rendered at the render DPI.
#[derive(Debug, Clone)]
pub struct PageCache {
    pages: FifoCache<usize, Arc<Pixmap>>,
    render_dpi: f64,
}

impl PageCache {
    /// Create a page cache.
    #[must_use]
    pub fn new(capacity: usize, render_dpi: f64) -> Self {
        Self {
            pages: FifoCache::new(capacity),
            render_dpi,
        }
    }

    /// DPI pages are rendered at.
    #[must_use]
    pub const fn render_dpi(&self) -> f64 {
        self.render_dpi
    }

    /// Change the render DPI. Cached pages at the old DPI are dropped.
    pub fn set_render_dpi(&mut self, dpi: f64) {
        if (dpi - self.render_dpi).abs() > f64::EPSILON {
            tracing::debug!(from = self.render_dpi, to = dpi, "Render DPI changed, clearing page cache");
            self.render_dpi = dpi;
            self.clear();
        }
    }

    /// Cached page, if present.
    pub fn get(&mut self, index: usize) -> Option<Arc<Pixmap>> {
        self.pages.get(&index).cloned()
    }

    /// True if the page is cached.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.pages.contains(&index)
    }

    /// Cached page, rendering and inserting it on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the page is out of range or fails to render.
    pub fn get_or_render(
        &mut self,
        document: &dyn DocumentSource,
        index: usize,
    ) -> RenderResult<Arc<Pixmap>> {
        if let Some(page) = self.get(index) {
            return Ok(page);
        }
        let count = document.page_count();
        if index >= count {
            return Err(RenderError::PageOutOfRange { index, count });
        }
        let rendered = Arc::new(document.render_page(index, self.render_dpi)?);
        self.insert(index, Arc::clone(&rendered));
        Ok(rendered)
    }

    /// Insert an already rendered page.
    pub fn insert(&mut self, index: usize, page: Arc<Pixmap>) {
        if let Some(evicted) = self.pages.insert(index, page) {
            tracing::debug!(page = evicted, "Evicted page from cache");
        }
    }

    /// Drop every cached page.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Number of cached pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Cached page indices from oldest to newest.
    #[must_use]
    pub fn cached_pages(&self) -> Vec<usize> {
        self.pages.keys().copied().collect()
    }

    /// Neighbours of `index` that exist and are not cached yet.
    #[must_use]
    pub fn adjacent_missing(&self, index: usize, page_count: usize) -> Vec<usize> {
        [index.checked_sub(1), index.checked_add(1)]
            .into_iter()
            .flatten()
            .filter(|&n| n < page_count && !self.contains(n))
            .collect()
    }

    /// Hit/miss/eviction counters.
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.pages.stats()
    }
}

/// Render a fast low-DPI pass of a page, upscaled to the render DPI's size.
///
/// Used for display while the authoritative render is pending; the result
/// must never be inserted into a [`PageCache`].
///
/// # Errors
///
/// Returns an error if the page cannot be rendered or scaled.
pub fn render_preview(
    document: &dyn DocumentSource,
    index: usize,
    preview_dpi: f64,
    render_dpi: f64,
) -> RenderResult<Pixmap> {
    let low = document.render_page(index, preview_dpi)?;
    scale_pixmap(&low, render_dpi / preview_dpi)
}
