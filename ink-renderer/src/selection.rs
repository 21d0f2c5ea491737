//! Lasso selection: cut a free-form region out of the ink, move it, and put
//! it back.
//!
//! ```text
//!            press outside           release (≥3 points)
//!   Idle ─────────────────▶ Lassoing ───────────────────▶ Selected
//!    ▲                         │  release (<3 points)        │   ▲
//!    │◀────────────────────────┘                             │   │ release
//!    │                                        press inside   ▼   │ (commit)
//!    │◀── press outside (paint back) ◀──────────────────── Moving
//! ```
//!
//! The lasso path is recorded in view space and converted to buffer space
//! once at closure. The floating rectangle is kept in buffer space as `f64`
//! and is the authority for placement; integer view rectangles are derived
//! from it for repainting only.

use ink_core::{polygon_contains, CoordinateTransform, IntRect, Point, Rect};
use tiny_skia::Pixmap;

use crate::error::RenderResult;
use crate::raster::{self, blit_over, copy_region};
use crate::stroke_buffer::StrokeBuffer;

/// Gap between a selection and its duplicate, in buffer pixels.
pub const DUPLICATE_GAP: f64 = 5.0;

/// Offset used when no side of the selection has room for a duplicate.
pub const DUPLICATE_FALLBACK_OFFSET: f64 = 10.0;

/// Padding added around selection repaint rectangles, in view pixels.
const REPAINT_MARGIN: f64 = 5.0;

/// Where the selection state machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// No selection.
    #[default]
    Idle,
    /// Recording a lasso path.
    Lassoing,
    /// A floating selection exists.
    Selected,
    /// The floating selection is being dragged.
    Moving,
}

/// Result of a press while the rope tool is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPress {
    /// A new lasso was started.
    Lasso,
    /// The existing selection started moving.
    Move,
    /// The press landed outside the selection, which was put back. The
    /// press is consumed; the region is the view-space repaint area.
    Cancelled(IntRect),
}

/// Result of a release while the rope tool is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRelease {
    /// The lasso closed into a floating selection.
    Selected(IntRect),
    /// The lasso was degenerate and nothing was selected.
    Discarded(IntRect),
    /// A moved selection was stamped back into the ink.
    Committed(IntRect),
    /// Nothing was in progress.
    Ignored,
}

/// Floating selection content, for compositing.
#[derive(Debug, Clone, Copy)]
pub struct FloatingView<'a> {
    /// Masked pixels, the same size as `rect`.
    pub raster: &'a Pixmap,
    /// Placement in buffer space.
    pub rect: Rect,
}

#[derive(Debug, Clone)]
struct Floating {
    raster: Pixmap,
    rect: Rect,
}

/// Lasso selection state machine.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    mode: SelectionMode,
    path: Vec<Point>,
    floating: Option<Floating>,
    last_drag: Point,
}

impl SelectionController {
    /// Create an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// True while a floating selection exists.
    #[must_use]
    pub const fn has_selection(&self) -> bool {
        self.floating.is_some()
    }

    /// True while the selection is being dragged.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.mode == SelectionMode::Moving
    }

    /// True while a lasso is being drawn.
    #[must_use]
    pub fn is_lassoing(&self) -> bool {
        self.mode == SelectionMode::Lassoing
    }

    /// Lasso points recorded so far, in view space.
    #[must_use]
    pub fn lasso_path(&self) -> &[Point] {
        &self.path
    }

    /// Floating content and its buffer-space placement.
    #[must_use]
    pub fn floating(&self) -> Option<FloatingView<'_>> {
        self.floating.as_ref().map(|f| FloatingView {
            raster: &f.raster,
            rect: f.rect,
        })
    }

    /// Floating rectangle in view space, rounded for repainting.
    #[must_use]
    pub fn view_rect(&self, transform: &CoordinateTransform) -> Option<IntRect> {
        self.floating
            .as_ref()
            .map(|f| transform.buffer_rect_to_widget(&f.rect).round())
    }

    /// Top-right corner of the selection in view space, where a context
    /// menu is anchored.
    #[must_use]
    pub fn anchor(&self, transform: &CoordinateTransform) -> Option<Point> {
        self.floating.as_ref().map(|f| {
            let r = transform.buffer_rect_to_widget(&f.rect);
            Point::new(r.right(), r.y)
        })
    }

    /// Handle a press at a view-space point.
    pub fn press(
        &mut self,
        at: Point,
        transform: &CoordinateTransform,
        buffer: &mut StrokeBuffer,
    ) -> SelectionPress {
        let buffer_at = transform.widget_to_buffer(at);
        if let Some(floating) = self.floating.as_ref() {
            if floating.rect.contains(buffer_at) {
                buffer.mark_edited();
                self.mode = SelectionMode::Moving;
                self.last_drag = buffer_at;
                tracing::debug!("Selection move started");
                return SelectionPress::Move;
            }
            let dirty = self.cancel(transform, buffer).unwrap_or_default();
            return SelectionPress::Cancelled(dirty);
        }

        self.mode = SelectionMode::Lassoing;
        self.path.clear();
        self.path.push(at);
        SelectionPress::Lasso
    }

    /// Handle pointer movement. Returns the view-space region to repaint.
    pub fn move_to(&mut self, at: Point, transform: &CoordinateTransform) -> Option<IntRect> {
        match self.mode {
            SelectionMode::Lassoing => {
                let before = Rect::bounding(&self.path);
                self.path.push(at);
                let after = Rect::bounding(&self.path)?;
                let region = before.map_or(after, |b| b.union(&after));
                Some(region.inflate(REPAINT_MARGIN).round_out())
            }
            SelectionMode::Moving => {
                let floating = self.floating.as_mut()?;
                let buffer_at = transform.widget_to_buffer(at);
                let old = transform.buffer_rect_to_widget(&floating.rect);
                floating.rect = floating.rect.translate(buffer_at - self.last_drag);
                self.last_drag = buffer_at;
                let new = transform.buffer_rect_to_widget(&floating.rect);
                Some(old.union(&new).inflate(REPAINT_MARGIN).round_out())
            }
            SelectionMode::Idle | SelectionMode::Selected => None,
        }
    }

    /// Handle a release at a view-space point.
    pub fn release(
        &mut self,
        at: Point,
        transform: &CoordinateTransform,
        buffer: &mut StrokeBuffer,
    ) -> SelectionRelease {
        match self.mode {
            SelectionMode::Lassoing => {
                if self.path.last() != Some(&at) {
                    self.path.push(at);
                }
                let region = Rect::bounding(&self.path)
                    .map(|r| r.inflate(REPAINT_MARGIN).round_out())
                    .unwrap_or_default();
                let path = std::mem::take(&mut self.path);
                match self.close_lasso(&path, transform, buffer) {
                    Ok(true) => {
                        self.mode = SelectionMode::Selected;
                        let selected = self.view_rect(transform).unwrap_or_default();
                        SelectionRelease::Selected(region.union(&selected.inflate(2)))
                    }
                    Ok(false) => {
                        self.mode = SelectionMode::Idle;
                        SelectionRelease::Discarded(region)
                    }
                    Err(e) => {
                        tracing::warn!("Selection could not be captured: {e}");
                        self.mode = SelectionMode::Idle;
                        SelectionRelease::Discarded(region)
                    }
                }
            }
            SelectionMode::Moving => self
                .commit(transform, buffer)
                .map_or(SelectionRelease::Ignored, SelectionRelease::Committed),
            SelectionMode::Idle | SelectionMode::Selected => SelectionRelease::Ignored,
        }
    }

    /// Cut the polygon out of the buffer. Returns false for degenerate lassos.
    #[allow(clippy::cast_sign_loss)]
    fn close_lasso(
        &mut self,
        path: &[Point],
        transform: &CoordinateTransform,
        buffer: &mut StrokeBuffer,
    ) -> RenderResult<bool> {
        if path.len() < 3 {
            tracing::debug!(points = path.len(), "Lasso too short, ignored");
            return Ok(false);
        }
        let polygon: Vec<Point> = path.iter().map(|&p| transform.widget_to_buffer(p)).collect();
        let Some(bounds) = Rect::bounding(&polygon) else {
            return Ok(false);
        };
        let region = bounds.round_out();
        if region.is_empty() {
            tracing::debug!("Lasso has no area, ignored");
            return Ok(false);
        }

        let source = buffer.pixmap_mut()?;
        let mut raster = copy_region(source, region)?;
        let stride = raster.width() as usize * 4;
        let source_stride = source.width() as usize * 4;
        let source_bounds = raster::bounds(source);
        let mut selected = 0usize;
        {
            let copied = raster.data_mut();
            let original = source.data_mut();
            for row in 0..region.height {
                for col in 0..region.width {
                    let (bx, by) = (region.x + col, region.y + row);
                    let offset = row as usize * stride + col as usize * 4;
                    let centre = Point::new(f64::from(bx) + 0.5, f64::from(by) + 0.5);
                    if !polygon_contains(&polygon, centre) {
                        copied[offset..offset + 4].fill(0);
                        continue;
                    }
                    selected += 1;
                    if source_bounds.contains(Point::new(f64::from(bx), f64::from(by))) {
                        let s = by as usize * source_stride + bx as usize * 4;
                        original[s..s + 4].fill(0);
                    }
                }
            }
        }

        buffer.mark_edited();
        self.floating = Some(Floating {
            raster,
            rect: region.to_rect(),
        });
        tracing::debug!(
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            pixels = selected,
            "Lasso closed"
        );
        Ok(true)
    }

    /// Stamp the floating content at its current place and return to idle.
    /// Returns the view-space region to repaint.
    pub fn commit(
        &mut self,
        transform: &CoordinateTransform,
        buffer: &mut StrokeBuffer,
    ) -> Option<IntRect> {
        let floating = self.take_floating()?;
        stamp(buffer, &floating);
        tracing::debug!("Selection committed");
        Some(repaint_for(transform, floating.rect))
    }

    /// Put the floating content back into the ink where it currently is.
    pub fn cancel(
        &mut self,
        transform: &CoordinateTransform,
        buffer: &mut StrokeBuffer,
    ) -> Option<IntRect> {
        if self.mode == SelectionMode::Lassoing {
            let region = Rect::bounding(&self.path).map(|r| r.inflate(REPAINT_MARGIN).round_out());
            self.path.clear();
            self.mode = SelectionMode::Idle;
            return region;
        }
        let floating = self.take_floating()?;
        stamp(buffer, &floating);
        tracing::debug!("Selection cancelled");
        Some(repaint_for(transform, floating.rect))
    }

    /// Discard the floating content.
    pub fn delete(
        &mut self,
        transform: &CoordinateTransform,
        buffer: &mut StrokeBuffer,
    ) -> Option<IntRect> {
        let floating = self.take_floating()?;
        buffer.mark_edited();
        tracing::debug!("Selection deleted");
        Some(repaint_for(transform, floating.rect))
    }

    /// Stamp the floating content where it is and float a copy beside it.
    ///
    /// The copy goes right of the selection, else left, below or above,
    /// whichever first fits inside the buffer; if none does it is offset
    /// diagonally. Only the original goes into the ink; the copy stays
    /// floating until it is committed, cancelled or deleted.
    pub fn duplicate(
        &mut self,
        transform: &CoordinateTransform,
        buffer: &mut StrokeBuffer,
    ) -> Option<IntRect> {
        if self.mode == SelectionMode::Moving {
            return None;
        }
        let floating = self.floating.as_mut()?;
        let original = floating.rect;
        let copy = duplicate_placement(original, buffer.size());

        stamp(buffer, floating);
        floating.rect = copy;
        self.mode = SelectionMode::Selected;
        tracing::debug!(x = copy.x, y = copy.y, "Selection duplicated");
        Some(repaint_for(transform, original.union(&copy)))
    }

    fn take_floating(&mut self) -> Option<Floating> {
        let floating = self.floating.take()?;
        self.mode = SelectionMode::Idle;
        self.path.clear();
        Some(floating)
    }
}

fn stamp(buffer: &mut StrokeBuffer, floating: &Floating) {
    let (x, y) = floating.rect.top_left().round();
    match buffer.pixmap_mut() {
        Ok(pixmap) => blit_over(pixmap, &floating.raster, x, y),
        Err(e) => tracing::warn!("Stroke buffer unavailable, selection dropped: {e}"),
    }
    buffer.mark_edited();
}

fn duplicate_placement(rect: Rect, extent: ink_core::Size) -> Rect {
    let (w, h) = (rect.width, rect.height);
    let fits = |r: &Rect| r.x >= 0.0 && r.y >= 0.0 && r.right() <= extent.width && r.bottom() <= extent.height;
    [
        rect.translate(Point::new(w + DUPLICATE_GAP, 0.0)),
        rect.translate(Point::new(-(w + DUPLICATE_GAP), 0.0)),
        rect.translate(Point::new(0.0, h + DUPLICATE_GAP)),
        rect.translate(Point::new(0.0, -(h + DUPLICATE_GAP))),
    ]
    .into_iter()
    .find(fits)
    .unwrap_or_else(|| {
        rect.translate(Point::new(DUPLICATE_FALLBACK_OFFSET, DUPLICATE_FALLBACK_OFFSET))
    })
}

fn repaint_for(transform: &CoordinateTransform, rect: Rect) -> IntRect {
    transform
        .buffer_rect_to_widget(&rect)
        .inflate(REPAINT_MARGIN)
        .round_out()
}
