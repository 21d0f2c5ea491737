//! Composites one frame of the canvas in view space.
//!
//! Layers, bottom to top:
//!
//! 1. window colour (outside the page)
//! 2. page background
//! 3. ink
//! 4. straight-line preview
//! 5. lasso path, floating selection and its border
//! 6. text-selection rectangle and highlights
//!
//! Buffer-space layers are drawn through the same buffer → view mapping the
//! input path uses, so what is drawn lines up with what was hit.

use ink_core::{CoordinateTransform, Point, Rect, Rgba, Size, StrokePhase};
use tiny_skia::{
    FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect as SkiaRect, Stroke,
    StrokeDash, Transform,
};

use crate::background::Background;
use crate::draw::{paint_segment, StraightLinePreview};
use crate::error::RenderResult;
use crate::raster::{new_pixmap, to_skia_color};
use crate::selection::FloatingView;

/// Lasso outline colour.
pub const LASSO_COLOR: Rgba = Rgba::new(0, 0, 255, 255);
/// Floating selection border colour.
pub const SELECTION_BORDER_COLOR: Rgba = Rgba::new(0, 139, 139, 255);
/// Text-selection rectangle colour.
pub const TEXT_RECT_COLOR: Rgba = Rgba::new(0, 120, 215, 255);
/// Text-selection rectangle fill.
pub const TEXT_RECT_FILL: Rgba = Rgba::new(0, 120, 215, 30);
/// Selected text highlight.
pub const TEXT_HIGHLIGHT_COLOR: Rgba = Rgba::new(255, 255, 0, 100);

/// Everything visible in one frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewLayers<'a> {
    /// View ↔ buffer mapping for the frame.
    pub transform: CoordinateTransform,
    /// Fill outside the page.
    pub window_color: Rgba,
    /// Fill of the page under a missing background.
    pub page_color: Rgba,
    /// Page background.
    pub background: &'a Background,
    /// Device pixel ratio, for pattern spacing.
    pub device_pixel_ratio: f64,
    /// The ink raster, if allocated.
    pub ink: Option<&'a Pixmap>,
    /// Uncommitted straight line.
    pub preview: Option<StraightLinePreview>,
    /// Lasso path in view space.
    pub lasso: &'a [Point],
    /// Floating selection.
    pub floating: Option<FloatingView<'a>>,
    /// Text drag rectangle in view space.
    pub text_rect: Option<Rect>,
    /// Selected text boxes in view space.
    pub highlights: &'a [Rect],
}

/// The tiny-skia transform equivalent to `transform`'s buffer → view mapping.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn buffer_to_view(transform: &CoordinateTransform) -> Transform {
    let zoom = transform.zoom();
    let offset = transform.center_offset();
    let pan = transform.pan();
    Transform::from_row(
        zoom as f32,
        0.0,
        0.0,
        zoom as f32,
        (offset.x - pan.x * zoom) as f32,
        (offset.y - pan.y * zoom) as f32,
    )
}

/// Render a frame at the viewport's size.
///
/// # Errors
///
/// Returns an error if the frame cannot be allocated.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn render_view(layers: &ViewLayers<'_>) -> RenderResult<Pixmap> {
    let viewport = layers.transform.viewport();
    let width = viewport.width.round().max(1.0) as u32;
    let height = viewport.height.round().max(1.0) as u32;
    let mut frame = new_pixmap(width, height)?;
    frame.fill(to_skia_color(layers.window_color));

    let to_view = buffer_to_view(&layers.transform);
    let page = layers.transform.canvas();

    if matches!(layers.background, Background::None) {
        fill_rect(&mut frame, Rect::new(0.0, 0.0, page.width, page.height), layers.page_color, to_view);
    }
    layers
        .background
        .paint(&mut frame, page, layers.device_pixel_ratio, to_view);

    if let Some(ink) = layers.ink {
        frame.draw_pixmap(0, 0, ink.as_ref(), &smooth(), to_view, None);
    }

    if let Some(preview) = layers.preview {
        paint_preview(&mut frame, &layers.transform, &preview, to_view);
    }

    if layers.lasso.len() > 1 {
        stroke_polyline(&mut frame, layers.lasso, LASSO_COLOR, 1.5, false);
    }

    if let Some(floating) = layers.floating {
        let at = to_view.pre_translate(floating.rect.x as f32, floating.rect.y as f32);
        frame.draw_pixmap(0, 0, floating.raster.as_ref(), &smooth(), at, None);
        let border = layers.transform.buffer_rect_to_widget(&floating.rect);
        stroke_rect(&mut frame, border, SELECTION_BORDER_COLOR, 1.5);
    }

    if let Some(rect) = layers.text_rect {
        fill_rect(&mut frame, rect, TEXT_RECT_FILL, Transform::identity());
        stroke_rect(&mut frame, rect, TEXT_RECT_COLOR, 2.0);
    }
    for highlight in layers.highlights {
        fill_rect(&mut frame, *highlight, TEXT_HIGHLIGHT_COLOR, Transform::identity());
    }

    Ok(frame)
}

/// Flatten the background and ink of a page into one raster at buffer size.
///
/// # Errors
///
/// Returns an error if the raster cannot be allocated.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn flatten_page(
    background: &Background,
    ink: Option<&Pixmap>,
    page: Size,
    page_color: Rgba,
    device_pixel_ratio: f64,
) -> RenderResult<Pixmap> {
    let mut out = new_pixmap(
        page.width.round().max(1.0) as u32,
        page.height.round().max(1.0) as u32,
    )?;
    if matches!(background, Background::None) {
        out.fill(to_skia_color(page_color));
    }
    background.paint(&mut out, page, device_pixel_ratio, Transform::identity());
    if let Some(ink) = ink {
        out.draw_pixmap(0, 0, ink.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
    }
    Ok(out)
}

fn smooth() -> PixmapPaint {
    PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    }
}

fn paint_preview(
    frame: &mut Pixmap,
    transform: &CoordinateTransform,
    preview: &StraightLinePreview,
    to_view: Transform,
) {
    let tool = preview.tool;
    paint_segment(
        frame,
        transform.widget_to_buffer(preview.start),
        transform.widget_to_buffer(preview.end),
        tool.stroke_width(preview.pressure, StrokePhase::Preview),
        tool.paint_color(StrokePhase::Preview),
        false,
        to_view,
    );
}

#[allow(clippy::cast_possible_truncation)]
fn fill_rect(frame: &mut Pixmap, rect: Rect, color: Rgba, transform: Transform) {
    let Some(r) = SkiaRect::from_xywh(rect.x as f32, rect.y as f32, rect.width as f32, rect.height as f32) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(to_skia_color(color));
    frame.fill_rect(r, &paint, transform, None);
}

fn stroke_rect(frame: &mut Pixmap, rect: Rect, color: Rgba, width: f32) {
    let corners = [
        rect.top_left(),
        Point::new(rect.right(), rect.y),
        rect.bottom_right(),
        Point::new(rect.x, rect.bottom()),
    ];
    stroke_polyline(frame, &corners, color, width, true);
}

#[allow(clippy::cast_possible_truncation)]
fn stroke_polyline(frame: &mut Pixmap, points: &[Point], color: Rgba, width: f32, close: bool) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    if close {
        pb.close();
    }
    let Some(path) = pb.finish() else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(to_skia_color(color));
    paint.anti_alias = true;
    let stroke = Stroke {
        width,
        dash: StrokeDash::new(vec![6.0, 4.0], 0.0),
        ..Stroke::default()
    };
    frame.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::pixel_bytes;
    use ink_core::{ToolState, ViewState};

    fn layers<'a>(background: &'a Background, transform: CoordinateTransform) -> ViewLayers<'a> {
        ViewLayers {
            transform,
            window_color: Rgba::rgb(0x2b, 0x2b, 0x2b),
            page_color: Rgba::WHITE,
            background,
            device_pixel_ratio: 1.0,
            ink: None,
            preview: None,
            lasso: &[],
            floating: None,
            text_rect: None,
            highlights: &[],
        }
    }

    #[test]
    fn test_small_page_is_centred_in_window_colour() {
        let view = ViewState::default();
        let t = CoordinateTransform::from_view(&view, Size::new(100.0, 100.0), Size::new(50.0, 50.0));
        let bg = Background::None;
        let frame = render_view(&layers(&bg, t)).expect("frame");
        assert_eq!(pixel_bytes(&frame, 5, 5), Some([0x2b, 0x2b, 0x2b, 255]));
        assert_eq!(pixel_bytes(&frame, 50, 50), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_ink_is_scaled_by_zoom() {
        let mut ink = new_pixmap(50, 50).expect("ink");
        ink.fill(tiny_skia::Color::from_rgba8(0, 0, 0, 255));
        let t = CoordinateTransform::new(2.0, Point::zero(), Size::new(100.0, 100.0), Size::new(50.0, 50.0));
        let bg = Background::None;
        let mut l = layers(&bg, t);
        l.ink = Some(&ink);
        let frame = render_view(&l).expect("frame");
        assert_eq!(pixel_bytes(&frame, 95, 95), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_preview_is_drawn_but_not_committed() {
        let t = CoordinateTransform::new(1.0, Point::zero(), Size::new(100.0, 100.0), Size::new(100.0, 100.0));
        let bg = Background::None;
        let mut l = layers(&bg, t);
        l.preview = Some(StraightLinePreview {
            start: Point::new(10.0, 50.0),
            end: Point::new(90.0, 50.0),
            tool: ToolState::default(),
            pressure: 1.0,
        });
        let frame = render_view(&l).expect("frame");
        assert_eq!(pixel_bytes(&frame, 50, 50), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_flatten_page_puts_ink_over_background() {
        let mut ink = new_pixmap(10, 10).expect("ink");
        ink.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 255));
        let bg = Background::SolidPattern {
            style: crate::background::PatternStyle::Plain,
            color: Rgba::WHITE,
            density: 40,
        };
        let out = flatten_page(&bg, Some(&ink), Size::new(20.0, 20.0), Rgba::WHITE, 1.0).expect("flatten");
        assert_eq!(pixel_bytes(&out, 5, 5), Some([255, 0, 0, 255]));
        assert_eq!(pixel_bytes(&out, 15, 15), Some([255, 255, 255, 255]));
    }
}
