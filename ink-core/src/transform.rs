//! View state and the single coordinate transform.
//!
//! Three coordinate spaces are in play:
//!
//! - **view space**: logical pixels of the on-screen widget,
//! - **buffer space**: physical pixels of the ink raster,
//! - **document space**: native units of an external paginated document.
//!
//! Every drawing, preview, selection and hit-testing path converts through
//! [`CoordinateTransform`] (and [`DocumentScale`] for document space), so the
//! zoom/pan law lives in exactly one place.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};

/// Smallest allowed zoom, in percent.
pub const MIN_ZOOM: i32 = 10;

/// Largest allowed zoom, in percent.
pub const MAX_ZOOM: i32 = 400;

/// Zoom and pan state of a canvas view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Committed zoom in percent, always within `[MIN_ZOOM, MAX_ZOOM]`.
    zoom_percent: i32,
    /// Floating zoom accumulator, diverges from `zoom_percent` only during a pinch.
    smoothed_zoom: f64,
    /// Pan offset in buffer space.
    pub pan: Point,
    /// Device pixel ratio of the display.
    pub device_pixel_ratio: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom_percent: 100,
            smoothed_zoom: 100.0,
            pan: Point::zero(),
            device_pixel_ratio: 1.0,
        }
    }
}

impl ViewState {
    /// Create a view state at 100% with no pan.
    #[must_use]
    pub fn new(device_pixel_ratio: f64) -> Self {
        Self {
            device_pixel_ratio,
            ..Self::default()
        }
    }

    /// Committed zoom in percent.
    #[must_use]
    pub const fn zoom_percent(&self) -> i32 {
        self.zoom_percent
    }

    /// Floating zoom used for rendering.
    #[must_use]
    pub const fn smoothed_zoom(&self) -> f64 {
        self.smoothed_zoom
    }

    /// Zoom as a scale factor (1.0 = 100%).
    #[must_use]
    pub fn zoom_factor(&self) -> f64 {
        self.smoothed_zoom / 100.0
    }

    /// Set the zoom, clamped to `[MIN_ZOOM, MAX_ZOOM]`. Returns the applied value.
    pub fn set_zoom(&mut self, percent: i32) -> i32 {
        let clamped = percent.clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom_percent = clamped;
        self.smoothed_zoom = f64::from(clamped);
        clamped
    }

    /// Set the floating zoom during a gesture, clamped to the zoom range.
    ///
    /// The committed percent tracks the rounded value so observers see it move.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_smoothed_zoom(&mut self, zoom: f64) -> f64 {
        let clamped = zoom.clamp(f64::from(MIN_ZOOM), f64::from(MAX_ZOOM));
        self.smoothed_zoom = clamped;
        self.zoom_percent = clamped.round() as i32;
        clamped
    }

    /// Snap the floating zoom to the committed integer percent.
    pub fn snap_zoom(&mut self) -> i32 {
        self.set_smoothed_zoom(self.smoothed_zoom);
        self.smoothed_zoom = f64::from(self.zoom_percent);
        self.zoom_percent
    }
}

/// Conversion between view space and buffer space for one frame.
///
/// Built from a [`ViewState`] plus the viewport and buffer extents. When the
/// scaled buffer is smaller than the viewport on an axis, it is centred on
/// that axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    zoom: f64,
    pan: Point,
    viewport: Size,
    canvas: Size,
}

impl CoordinateTransform {
    /// Create a transform from raw parts. `zoom` is a factor (1.0 = 100%).
    #[must_use]
    pub fn new(zoom: f64, pan: Point, viewport: Size, canvas: Size) -> Self {
        Self {
            zoom,
            pan,
            viewport,
            canvas,
        }
    }

    /// Create a transform for the current view state.
    #[must_use]
    pub fn from_view(view: &ViewState, viewport: Size, canvas: Size) -> Self {
        Self::new(view.zoom_factor(), view.pan, viewport, canvas)
    }

    /// Zoom factor.
    #[must_use]
    pub const fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Pan offset in buffer space.
    #[must_use]
    pub const fn pan(&self) -> Point {
        self.pan
    }

    /// Viewport extent in view space.
    #[must_use]
    pub const fn viewport(&self) -> Size {
        self.viewport
    }

    /// Buffer extent in buffer space.
    #[must_use]
    pub const fn canvas(&self) -> Size {
        self.canvas
    }

    /// Buffer extent after zooming, in view space.
    #[must_use]
    pub fn scaled_canvas(&self) -> Size {
        Size::new(self.canvas.width * self.zoom, self.canvas.height * self.zoom)
    }

    /// Centring offset applied per axis when the scaled buffer is narrower than the viewport.
    #[must_use]
    pub fn center_offset(&self) -> Point {
        let scaled = self.scaled_canvas();
        let axis = |scaled: f64, view: f64| {
            if scaled < view {
                (view - scaled) / 2.0
            } else {
                0.0
            }
        };
        Point::new(
            axis(scaled.width, self.viewport.width),
            axis(scaled.height, self.viewport.height),
        )
    }

    /// Map a view-space point into buffer space.
    #[must_use]
    pub fn widget_to_buffer(&self, p: Point) -> Point {
        (p - self.center_offset()) / self.zoom + self.pan
    }

    /// Map a buffer-space point into view space. Exact inverse of [`Self::widget_to_buffer`].
    #[must_use]
    pub fn buffer_to_widget(&self, p: Point) -> Point {
        (p - self.pan) * self.zoom + self.center_offset()
    }

    /// Map a view-space rectangle into buffer space.
    #[must_use]
    pub fn widget_rect_to_buffer(&self, r: &Rect) -> Rect {
        Rect::from_points(
            self.widget_to_buffer(r.top_left()),
            self.widget_to_buffer(r.bottom_right()),
        )
    }

    /// Map a buffer-space rectangle into view space.
    #[must_use]
    pub fn buffer_rect_to_widget(&self, r: &Rect) -> Rect {
        Rect::from_points(
            self.buffer_to_widget(r.top_left()),
            self.buffer_to_widget(r.bottom_right()),
        )
    }

    /// True when horizontal panning is locked because the page fits the viewport.
    #[must_use]
    pub fn pan_locked_x(&self) -> bool {
        self.scaled_canvas().width <= self.viewport.width
    }

    /// True when vertical panning is locked because the page fits the viewport.
    #[must_use]
    pub fn pan_locked_y(&self) -> bool {
        self.scaled_canvas().height <= self.viewport.height
    }

    /// Largest horizontal pan that still keeps the page's right edge in view.
    #[must_use]
    pub fn max_pan_x(&self) -> f64 {
        (self.canvas.width - self.viewport.width / self.zoom).max(0.0)
    }

    /// Apply the pan lock and horizontal bound to a candidate pan.
    ///
    /// Vertical pan is only locked, never bounded, so scrolling past the page
    /// edge can be interpreted by a collaborator as a page turn.
    #[must_use]
    pub fn constrain_pan(&self, pan: Point) -> Point {
        let x = if self.pan_locked_x() {
            0.0
        } else {
            pan.x.clamp(0.0, self.max_pan_x())
        };
        let y = if self.pan_locked_y() { 0.0 } else { pan.y };
        Point::new(x, y)
    }
}

/// Scale between a rendered page bitmap (buffer space) and its document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentScale {
    /// Page size in document units.
    pub native: Size,
    /// Size of the rendered bitmap in buffer pixels.
    pub rendered: Size,
}

impl DocumentScale {
    /// Create a document scale.
    #[must_use]
    pub const fn new(native: Size, rendered: Size) -> Self {
        Self { native, rendered }
    }

    fn factors(&self) -> (f64, f64) {
        if self.rendered.is_empty() {
            return (1.0, 1.0);
        }
        (
            self.native.width / self.rendered.width,
            self.native.height / self.rendered.height,
        )
    }

    /// Map a buffer-space point into document space.
    #[must_use]
    pub fn buffer_to_document(&self, p: Point) -> Point {
        let (sx, sy) = self.factors();
        Point::new(p.x * sx, p.y * sy)
    }

    /// Map a document-space point into buffer space.
    #[must_use]
    pub fn document_to_buffer(&self, p: Point) -> Point {
        let (sx, sy) = self.factors();
        Point::new(p.x / sx, p.y / sy)
    }

    /// Map a buffer-space rectangle into document space.
    #[must_use]
    pub fn buffer_rect_to_document(&self, r: &Rect) -> Rect {
        Rect::from_points(
            self.buffer_to_document(r.top_left()),
            self.buffer_to_document(r.bottom_right()),
        )
    }

    /// Map a document-space rectangle into buffer space.
    #[must_use]
    pub fn document_rect_to_buffer(&self, r: &Rect) -> Rect {
        Rect::from_points(
            self.document_to_buffer(r.top_left()),
            self.document_to_buffer(r.bottom_right()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn test_set_zoom_clamps() {
        let mut view = ViewState::default();
        assert_eq!(view.set_zoom(5), MIN_ZOOM);
        assert_eq!(view.set_zoom(1000), MAX_ZOOM);
        assert!((view.smoothed_zoom() - 400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_identity_at_100_percent() {
        let t = CoordinateTransform::new(
            1.0,
            Point::zero(),
            Size::new(800.0, 600.0),
            Size::new(800.0, 600.0),
        );
        assert_eq!(t.center_offset(), Point::zero());
        assert!(approx(t.widget_to_buffer(Point::new(12.0, 34.0)), Point::new(12.0, 34.0)));
    }

    #[test]
    fn test_centering_is_per_axis() {
        // 400x2000 page at 100% in 800x600: centred horizontally only.
        let t = CoordinateTransform::new(
            1.0,
            Point::zero(),
            Size::new(800.0, 600.0),
            Size::new(400.0, 2000.0),
        );
        assert_eq!(t.center_offset(), Point::new(200.0, 0.0));
        assert!(approx(t.widget_to_buffer(Point::new(200.0, 10.0)), Point::new(0.0, 10.0)));
        assert!(t.pan_locked_x());
        assert!(!t.pan_locked_y());
    }

    #[test]
    fn test_zoom_and_pan_round_trip() {
        let t = CoordinateTransform::new(
            2.5,
            Point::new(40.0, 75.5),
            Size::new(800.0, 600.0),
            Size::new(1000.0, 1000.0),
        );
        let p = Point::new(123.25, 456.75);
        let b = t.widget_to_buffer(p);
        assert!(approx(b, Point::new(123.25 / 2.5 + 40.0, 456.75 / 2.5 + 75.5)));
        assert!(approx(t.buffer_to_widget(b), p));
    }

    #[test]
    fn test_constrain_pan_bounds_x_only() {
        let t = CoordinateTransform::new(
            2.0,
            Point::zero(),
            Size::new(800.0, 600.0),
            Size::new(1000.0, 1000.0),
        );
        let pan = t.constrain_pan(Point::new(5000.0, -30.0));
        assert!((pan.x - 600.0).abs() < 1e-9);
        assert!((pan.y + 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_document_scale() {
        let scale = DocumentScale::new(Size::new(612.0, 792.0), Size::new(2448.0, 3168.0));
        let d = scale.buffer_to_document(Point::new(400.0, 800.0));
        assert!(approx(d, Point::new(100.0, 200.0)));
        assert!(approx(scale.document_to_buffer(d), Point::new(400.0, 800.0)));
    }

    #[test]
    fn test_snap_zoom_rounds() {
        let mut view = ViewState::default();
        view.set_smoothed_zoom(151.6);
        assert_eq!(view.snap_zoom(), 152);
        assert!((view.smoothed_zoom() - 152.0).abs() < f64::EPSILON);
    }
}
