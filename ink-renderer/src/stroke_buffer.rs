//! The persistent ink raster of the active page.

use ink_core::Size;
use tiny_skia::Pixmap;

use crate::error::RenderResult;
use crate::raster::{self, blit_over, decode_image, encode_png, new_pixmap};

/// Ink raster in buffer space, allocated on first use.
///
/// The extent only ever grows: fitting to a smaller background keeps the
/// existing pixels rather than truncating them.
#[derive(Debug, Clone)]
pub struct StrokeBuffer {
    pixmap: Option<Pixmap>,
    width: u32,
    height: u32,
    edited: bool,
}

impl StrokeBuffer {
    /// Create an unallocated buffer of the given extent (at least 1×1).
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixmap: None,
            width: width.max(1),
            height: height.max(1),
            edited: false,
        }
    }

    /// Extent in buffer pixels.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Extent as a floating-point size.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::from_pixels(self.width, self.height)
    }

    /// True once pixels have been allocated.
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.pixmap.is_some()
    }

    /// The raster, if allocated.
    #[must_use]
    pub const fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// The raster, allocating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the raster cannot be allocated.
    pub fn pixmap_mut(&mut self) -> RenderResult<&mut Pixmap> {
        let pixmap = match self.pixmap.take() {
            Some(pixmap) => pixmap,
            None => {
                tracing::debug!(width = self.width, height = self.height, "Allocating stroke buffer");
                new_pixmap(self.width, self.height)?
            }
        };
        Ok(self.pixmap.insert(pixmap))
    }

    /// Whether the buffer has unsaved changes.
    #[must_use]
    pub const fn is_edited(&self) -> bool {
        self.edited
    }

    /// Flag unsaved changes. Returns true on the clean → edited transition.
    pub fn mark_edited(&mut self) -> bool {
        let first = !self.edited;
        self.edited = true;
        first
    }

    /// Clear the unsaved-changes flag.
    pub fn mark_clean(&mut self) {
        self.edited = false;
    }

    /// Grow to at least `width`×`height`, keeping existing pixels at the origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the larger raster cannot be allocated.
    pub fn fit_to(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let new_w = self.width.max(width);
        let new_h = self.height.max(height);
        if (new_w, new_h) == (self.width, self.height) {
            return Ok(());
        }
        if let Some(old) = self.pixmap.take() {
            let mut grown = new_pixmap(new_w, new_h)?;
            blit_over(&mut grown, &old, 0, 0);
            self.pixmap = Some(grown);
        }
        tracing::debug!(
            from_w = self.width,
            from_h = self.height,
            to_w = new_w,
            to_h = new_h,
            "Stroke buffer grown"
        );
        self.width = new_w;
        self.height = new_h;
        Ok(())
    }

    /// Copy of the current pixels for off-thread work.
    ///
    /// # Errors
    ///
    /// Returns an error if a blank raster has to be allocated and cannot be.
    pub fn snapshot(&self) -> RenderResult<Pixmap> {
        match &self.pixmap {
            Some(p) => Ok(p.clone()),
            None => new_pixmap(self.width, self.height),
        }
    }

    /// Premultiplied RGBA of one pixel. Unallocated buffers read as transparent.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        match &self.pixmap {
            Some(p) => raster::pixel_bytes(p, x, y),
            None if x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32 => {
                Some([0; 4])
            }
            None => None,
        }
    }

    /// Replace the contents with a decoded raster. The buffer keeps the larger
    /// of its current extent and the image's, and is marked clean.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded.
    pub fn load_png(&mut self, data: &[u8]) -> RenderResult<()> {
        let image = decode_image(data)?;
        self.replace(&image)
    }

    /// Replace the contents with an in-memory raster, marking the buffer clean.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer cannot be allocated.
    pub fn replace(&mut self, image: &Pixmap) -> RenderResult<()> {
        self.width = self.width.max(image.width());
        self.height = self.height.max(image.height());
        let mut pixmap = new_pixmap(self.width, self.height)?;
        blit_over(&mut pixmap, image, 0, 0);
        self.pixmap = Some(pixmap);
        self.edited = false;
        Ok(())
    }

    /// Encode the contents as PNG. Unallocated buffers encode as transparent.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        match &self.pixmap {
            Some(p) => encode_png(p),
            None => encode_png(&new_pixmap(self.width, self.height)?),
        }
    }

    /// Drop all pixels, keeping the extent.
    pub fn clear(&mut self) {
        self.pixmap = None;
    }
}
