//! External paginated documents shown as page backgrounds.

use std::sync::Arc;

use ink_core::{PageLink, Size, TextBox};
use tiny_skia::Pixmap;

use crate::error::{RenderError, RenderResult};
use crate::raster::scale_pixmap;

/// Document units per inch (PDF points).
pub const POINTS_PER_INCH: f64 = 72.0;

/// A paginated document that can render its pages.
///
/// Implementations must be shareable across threads: pages are rendered on
/// background workers.
pub trait DocumentSource: Send + Sync {
    /// Number of pages.
    fn page_count(&self) -> usize;

    /// Native size of a page in document units, `None` when out of range.
    fn page_size(&self, index: usize) -> Option<Size>;

    /// Render a page at `dpi`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or cannot be rendered.
    fn render_page(&self, index: usize, dpi: f64) -> RenderResult<Pixmap>;

    /// Text runs on a page, in document space.
    fn text_boxes(&self, _index: usize) -> Vec<TextBox> {
        Vec::new()
    }

    /// Internal links on a page.
    fn links(&self, _index: usize) -> Vec<PageLink> {
        Vec::new()
    }
}

/// One page of an [`ImageDocument`].
#[derive(Debug, Clone)]
pub struct ImagePage {
    /// Page artwork.
    pub image: Arc<Pixmap>,
    /// Native page size in document units.
    pub size: Size,
    /// Text runs on the page.
    pub text: Vec<TextBox>,
    /// Links on the page.
    pub links: Vec<PageLink>,
}

impl ImagePage {
    /// A page whose native size is the image size at `dpi`.
    #[must_use]
    pub fn from_image(image: Pixmap, dpi: f64) -> Self {
        let scale = POINTS_PER_INCH / dpi;
        let size = Size::new(
            f64::from(image.width()) * scale,
            f64::from(image.height()) * scale,
        );
        Self {
            image: Arc::new(image),
            size,
            text: Vec::new(),
            links: Vec::new(),
        }
    }
}

/// A document made of pre-rasterised page images, rescaled on render.
#[derive(Debug, Clone, Default)]
pub struct ImageDocument {
    pages: Vec<ImagePage>,
}

impl ImageDocument {
    /// Create a document from pages.
    #[must_use]
    pub fn new(pages: Vec<ImagePage>) -> Self {
        Self { pages }
    }

    fn page(&self, index: usize) -> RenderResult<&ImagePage> {
        self.pages.get(index).ok_or(RenderError::PageOutOfRange {
            index,
            count: self.pages.len(),
        })
    }
}

impl DocumentSource for ImageDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Option<Size> {
        self.pages.get(index).map(|p| p.size)
    }

    fn render_page(&self, index: usize, dpi: f64) -> RenderResult<Pixmap> {
        let page = self.page(index)?;
        let target_width = page.size.width * dpi / POINTS_PER_INCH;
        let factor = target_width / f64::from(page.image.width());
        if (factor - 1.0).abs() < 1e-9 {
            return Ok(page.image.as_ref().clone());
        }
        scale_pixmap(&page.image, factor)
    }

    fn text_boxes(&self, index: usize) -> Vec<TextBox> {
        self.pages
            .get(index)
            .map(|p| p.text.clone())
            .unwrap_or_default()
    }

    fn links(&self, index: usize) -> Vec<PageLink> {
        self.pages
            .get(index)
            .map(|p| p.links.clone())
            .unwrap_or_default()
    }
}
