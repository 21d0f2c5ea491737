//! Pressure-sensitive drawing and erasing into the stroke buffer.
//!
//! Pointer positions arrive in view space. Each segment is mapped into
//! buffer space through the frame's [`CoordinateTransform`], rasterised with
//! round caps and joins, and reported back as a padded view-space repaint
//! rectangle.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ink_core::{CoordinateTransform, IntRect, Point, Rect, Rgba, StrokePhase, ToolKind, ToolState};
use tiny_skia::{
    BlendMode, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform,
};

use crate::raster::to_skia_color;
use crate::stroke_buffer::StrokeBuffer;

/// What a draw operation paints into and how to get there from view space.
pub struct Surface<'a> {
    /// The ink raster.
    pub buffer: &'a mut StrokeBuffer,
    /// View ↔ buffer mapping for this frame.
    pub transform: CoordinateTransform,
    /// Device pixel ratio, used for repaint padding.
    pub device_pixel_ratio: f64,
}

/// Rasterise one segment in the target's coordinate space.
///
/// Zero-length segments become round dots. Erasing clears pixels instead of
/// painting over them.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn paint_segment(
    target: &mut Pixmap,
    a: Point,
    b: Point,
    width: f64,
    color: Rgba,
    erase: bool,
    transform: Transform,
) {
    if !(width.is_finite() && width > 0.0) {
        return;
    }
    let mut paint = Paint::default();
    paint.anti_alias = true;
    if erase {
        paint.blend_mode = BlendMode::Clear;
        paint.set_color_rgba8(0, 0, 0, 255);
    } else {
        paint.set_color(to_skia_color(color));
    }

    let (ax, ay, bx, by) = (a.x as f32, a.y as f32, b.x as f32, b.y as f32);
    let w = width as f32;
    if a == b {
        if let Some(dot) = PathBuilder::from_circle(ax, ay, w / 2.0) {
            target.fill_path(&dot, &paint, FillRule::Winding, transform, None);
        }
        return;
    }

    let mut pb = PathBuilder::new();
    pb.move_to(ax, ay);
    pb.line_to(bx, by);
    let Some(path) = pb.finish() else {
        return;
    };
    let stroke = Stroke {
        width: w,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    target.stroke_path(&path, &paint, &stroke, transform, None);
}

/// Draw or erase one segment between two view-space points.
///
/// Allocates the buffer on demand and sets its edited flag. Returns the
/// view-space repaint rectangle, padded by the tool's thickness times the
/// device pixel ratio (never less than 15 px). Allocation failures are
/// logged and yield an empty rectangle; drawing never fails.
pub fn draw_segment(
    surface: &mut Surface<'_>,
    start: Point,
    end: Point,
    pressure: f64,
    tool: &ToolState,
    phase: StrokePhase,
) -> IntRect {
    let from = surface.transform.widget_to_buffer(start);
    let to = surface.transform.widget_to_buffer(end);
    let width = tool.stroke_width(pressure, phase);

    surface.buffer.mark_edited();
    match surface.buffer.pixmap_mut() {
        Ok(pixmap) => paint_segment(
            pixmap,
            from,
            to,
            width,
            tool.paint_color(phase),
            tool.kind() == ToolKind::Eraser,
            Transform::identity(),
        ),
        Err(e) => {
            tracing::warn!("Stroke buffer unavailable, segment dropped: {e}");
            return IntRect::default();
        }
    }

    repaint_rect(start, end, tool, surface.device_pixel_ratio)
}

fn repaint_rect(start: Point, end: Point, tool: &ToolState, dpr: f64) -> IntRect {
    Rect::from_points(start, end)
        .inflate(tool.repaint_padding(dpr))
        .round_out()
}

/// A straight-line preview that has not been committed yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightLinePreview {
    /// Press position in view space.
    pub start: Point,
    /// Current pointer position in view space.
    pub end: Point,
    /// Tool the line will be committed with.
    pub tool: ToolState,
    /// Latest pressure.
    pub pressure: f64,
}

#[derive(Debug, Clone, Copy)]
struct StrokeSession {
    tool: ToolState,
    start: Point,
    last: Point,
    pressure: f64,
    preview_end: Option<Point>,
}

impl StrokeSession {
    fn previews(&self) -> bool {
        self.tool.straight_line_mode() && self.tool.kind() != ToolKind::Eraser
    }
}

/// Counts committed draw operations over a sliding one-second window.
#[derive(Debug, Clone, Default)]
pub struct ThroughputMeter {
    running: bool,
    stamps: VecDeque<Instant>,
}

impl ThroughputMeter {
    const WINDOW: Duration = Duration::from_secs(1);

    /// Start counting, discarding earlier samples.
    pub fn start(&mut self) {
        self.running = true;
        self.stamps.clear();
    }

    /// Stop counting.
    pub fn stop(&mut self) {
        self.running = false;
        self.stamps.clear();
    }

    /// Whether the meter is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Record one operation.
    pub fn record(&mut self, now: Instant) {
        if self.running {
            self.stamps.push_back(now);
        }
    }

    /// Operations recorded in the second before `now`.
    pub fn rate(&mut self, now: Instant) -> usize {
        while let Some(&front) = self.stamps.front() {
            if now.saturating_duration_since(front) > Self::WINDOW {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
        self.stamps.len()
    }
}

/// Turns a press/move/release sequence into committed segments.
///
/// The tool is captured once at press and used for the whole stroke.
#[derive(Debug, Default)]
pub struct DrawEngine {
    session: Option<StrokeSession>,
    meter: ThroughputMeter,
}

impl DrawEngine {
    /// Create an idle engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True between press and release.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.session.is_some()
    }

    /// Tool of the stroke in progress.
    #[must_use]
    pub fn active_tool(&self) -> Option<ToolState> {
        self.session.map(|s| s.tool)
    }

    /// The uncommitted straight-line preview, if any.
    #[must_use]
    pub fn preview(&self) -> Option<StraightLinePreview> {
        let session = self.session?;
        let end = session.preview_end?;
        Some(StraightLinePreview {
            start: session.start,
            end,
            tool: session.tool,
            pressure: session.pressure,
        })
    }

    /// Begin a stroke. Nothing is drawn until the pointer moves or lifts.
    pub fn press(&mut self, tool: ToolState, at: Point, pressure: f64) {
        tracing::debug!(kind = ?tool.kind(), straight = tool.straight_line_mode(), "Stroke started");
        self.session = Some(StrokeSession {
            tool,
            start: at,
            last: at,
            pressure,
            preview_end: None,
        });
    }

    /// Continue the stroke to `at`. Returns the region to repaint.
    pub fn move_to(
        &mut self,
        surface: &mut Surface<'_>,
        at: Point,
        pressure: f64,
        now: Instant,
    ) -> Option<IntRect> {
        let session = self.session.as_mut()?;
        session.pressure = pressure;

        if session.previews() {
            let old_end = session.preview_end.unwrap_or(session.last);
            session.preview_end = Some(at);
            session.last = at;
            let start = session.start;
            let tool = session.tool;
            let old = repaint_rect(start, old_end, &tool, surface.device_pixel_ratio);
            let new = repaint_rect(start, at, &tool, surface.device_pixel_ratio);
            return Some(old.union(&new));
        }

        let tool = session.tool;
        let from = if tool.straight_line_mode() {
            // Straight-line erasing commits start→current continuously.
            session.start
        } else {
            session.last
        };
        session.last = at;
        let dirty = draw_segment(surface, from, at, pressure, &tool, StrokePhase::Continuous);
        self.meter.record(now);
        Some(dirty)
    }

    /// Finish the stroke at `at`. Straight-line strokes commit exactly one final segment.
    pub fn release(
        &mut self,
        surface: &mut Surface<'_>,
        at: Point,
        pressure: f64,
        now: Instant,
    ) -> Option<IntRect> {
        let session = self.session.take()?;
        if !session.tool.straight_line_mode() {
            tracing::debug!("Stroke finished");
            return None;
        }

        let mut dirty = draw_segment(
            surface,
            session.start,
            at,
            pressure,
            &session.tool,
            StrokePhase::Final,
        );
        if let Some(end) = session.preview_end {
            dirty = dirty.union(&repaint_rect(
                session.start,
                end,
                &session.tool,
                surface.device_pixel_ratio,
            ));
        }
        self.meter.record(now);
        tracing::debug!("Straight line committed");
        Some(dirty)
    }

    /// Drop the stroke in progress without committing anything further.
    pub fn abort(&mut self) {
        self.session = None;
    }

    /// Start counting processed operations.
    pub fn start_benchmark(&mut self) {
        self.meter.start();
    }

    /// Stop counting processed operations.
    pub fn stop_benchmark(&mut self) {
        self.meter.stop();
    }

    /// Operations processed in the last second.
    pub fn processed_rate(&mut self, now: Instant) -> usize {
        self.meter.rate(now)
    }
}
