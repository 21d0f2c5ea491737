//! Drawing tools and their width/opacity laws.
//!
//! [`ToolState`] is an immutable snapshot. The interactive thread takes one
//! when a stroke begins and threads it through every segment of that stroke,
//! so a hardware eraser override applies to exactly one stroke and disappears
//! with it. [`ToolSettings`] is the mutable owner that produces snapshots.

use serde::{Deserialize, Serialize};

/// Width multiplier for the marker tool.
pub const MARKER_WIDTH_FACTOR: f64 = 8.0;

/// Width multiplier for the eraser tool.
pub const ERASER_WIDTH_FACTOR: f64 = 6.0;

/// Smallest pressure applied to final or single-shot pen segments.
pub const MIN_FINAL_PRESSURE: f64 = 0.5;

/// Smallest repaint padding around a segment, in view pixels.
pub const MIN_REPAINT_PADDING: f64 = 15.0;

/// Drawing tool kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Pressure-sensitive opaque pen.
    #[default]
    Pen,
    /// Wide translucent highlighter.
    Marker,
    /// Clears pixels instead of painting.
    Eraser,
}

/// How a segment is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokePhase {
    /// One of many segments of a freehand stroke.
    Continuous,
    /// A single committed segment (straight-line release or a tap).
    Final,
    /// A transient straight-line preview, never committed.
    Preview,
}

/// An 8-bit straight-alpha colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Create a colour.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque colour.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Same colour with a different alpha.
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Immutable tool snapshot used for one stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    kind: ToolKind,
    color: Rgba,
    base_thickness: f64,
    straight_line_mode: bool,
    rope_select_mode: bool,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            kind: ToolKind::Pen,
            color: Rgba::BLACK,
            base_thickness: 5.0,
            straight_line_mode: false,
            rope_select_mode: false,
        }
    }
}

impl ToolState {
    /// Tool kind.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        self.kind
    }

    /// Ink colour.
    #[must_use]
    pub const fn color(&self) -> Rgba {
        self.color
    }

    /// Base thickness before tool and pressure scaling.
    #[must_use]
    pub const fn base_thickness(&self) -> f64 {
        self.base_thickness
    }

    /// Whether strokes are committed as single straight segments.
    #[must_use]
    pub const fn straight_line_mode(&self) -> bool {
        self.straight_line_mode
    }

    /// Whether pointer input drives the lasso instead of drawing.
    #[must_use]
    pub const fn rope_select_mode(&self) -> bool {
        self.rope_select_mode
    }

    /// Copy with a different tool.
    #[must_use]
    pub const fn with_kind(self, kind: ToolKind) -> Self {
        Self { kind, ..self }
    }

    /// Copy with a different colour.
    #[must_use]
    pub const fn with_color(self, color: Rgba) -> Self {
        Self { color, ..self }
    }

    /// Copy with a different base thickness. Non-finite or negative values become zero.
    #[must_use]
    pub fn with_thickness(self, thickness: f64) -> Self {
        let base_thickness = if thickness.is_finite() {
            thickness.max(0.0)
        } else {
            0.0
        };
        Self {
            base_thickness,
            ..self
        }
    }

    /// Copy with straight-line mode toggled. Enabling it disables rope mode.
    #[must_use]
    pub const fn with_straight_line_mode(self, enabled: bool) -> Self {
        Self {
            straight_line_mode: enabled,
            rope_select_mode: self.rope_select_mode && !enabled,
            ..self
        }
    }

    /// Copy with rope mode toggled. Enabling it disables straight-line mode.
    #[must_use]
    pub const fn with_rope_select_mode(self, enabled: bool) -> Self {
        Self {
            rope_select_mode: enabled,
            straight_line_mode: self.straight_line_mode && !enabled,
            ..self
        }
    }

    /// Stroke width in buffer pixels for a segment drawn at `pressure`.
    #[must_use]
    pub fn stroke_width(&self, pressure: f64, phase: StrokePhase) -> f64 {
        let t = self.base_thickness;
        match self.kind {
            ToolKind::Pen => match phase {
                StrokePhase::Continuous => t * pressure,
                StrokePhase::Final | StrokePhase::Preview => t * pressure.max(MIN_FINAL_PRESSURE),
            },
            ToolKind::Marker => t * MARKER_WIDTH_FACTOR,
            ToolKind::Eraser => t * ERASER_WIDTH_FACTOR,
        }
    }

    /// Marker opacity. Single-pass segments are boosted because they are not
    /// built up by overlapping continuous segments.
    #[must_use]
    pub const fn marker_alpha(phase: StrokePhase) -> u8 {
        match phase {
            StrokePhase::Continuous => 4,
            StrokePhase::Final => 40,
            StrokePhase::Preview => 80,
        }
    }

    /// Colour a segment is painted with. Eraser colour is irrelevant because
    /// erasing clears pixels.
    #[must_use]
    pub const fn paint_color(&self, phase: StrokePhase) -> Rgba {
        match self.kind {
            ToolKind::Pen => self.color,
            ToolKind::Marker => self.color.with_alpha(Self::marker_alpha(phase)),
            ToolKind::Eraser => Rgba::TRANSPARENT,
        }
    }

    /// Repaint padding around a segment in view pixels.
    #[must_use]
    pub fn repaint_padding(&self, device_pixel_ratio: f64) -> f64 {
        let factor = match self.kind {
            ToolKind::Pen => 1.0,
            ToolKind::Marker => MARKER_WIDTH_FACTOR,
            ToolKind::Eraser => ERASER_WIDTH_FACTOR,
        };
        (self.base_thickness * factor * device_pixel_ratio).max(MIN_REPAINT_PADDING)
    }
}

/// Mutable tool configuration with per-tool thickness memory.
///
/// Switching tools restores the thickness last used with that tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    current: ToolState,
    pen_thickness: f64,
    marker_thickness: f64,
    eraser_thickness: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl ToolSettings {
    /// Create settings with every tool at `thickness`.
    #[must_use]
    pub fn new(thickness: f64) -> Self {
        Self {
            current: ToolState::default().with_thickness(thickness),
            pen_thickness: thickness,
            marker_thickness: thickness,
            eraser_thickness: thickness,
        }
    }

    /// The current snapshot.
    #[must_use]
    pub const fn current(&self) -> ToolState {
        self.current
    }

    /// Remembered thickness of a tool.
    #[must_use]
    pub const fn thickness_for(&self, kind: ToolKind) -> f64 {
        match kind {
            ToolKind::Pen => self.pen_thickness,
            ToolKind::Marker => self.marker_thickness,
            ToolKind::Eraser => self.eraser_thickness,
        }
    }

    /// Switch tool, restoring its remembered thickness.
    pub fn set_tool(&mut self, kind: ToolKind) {
        self.current = self
            .current
            .with_kind(kind)
            .with_thickness(self.thickness_for(kind));
        tracing::debug!(?kind, thickness = self.current.base_thickness(), "Tool changed");
    }

    /// Set the ink colour.
    pub fn set_color(&mut self, color: Rgba) {
        self.current = self.current.with_color(color);
    }

    /// Set the thickness of the current tool and remember it for that tool.
    pub fn set_thickness(&mut self, thickness: f64) {
        self.current = self.current.with_thickness(thickness);
        let applied = self.current.base_thickness();
        match self.current.kind() {
            ToolKind::Pen => self.pen_thickness = applied,
            ToolKind::Marker => self.marker_thickness = applied,
            ToolKind::Eraser => self.eraser_thickness = applied,
        }
    }

    /// Rescale every remembered thickness, e.g. after a zoom-dependent preference change.
    pub fn adjust_all_thicknesses(&mut self, ratio: f64) {
        if !ratio.is_finite() || ratio <= 0.0 {
            tracing::warn!(ratio, "Ignoring invalid thickness ratio");
            return;
        }
        self.pen_thickness *= ratio;
        self.marker_thickness *= ratio;
        self.eraser_thickness *= ratio;
        self.current = self
            .current
            .with_thickness(self.thickness_for(self.current.kind()));
    }

    /// Toggle straight-line mode (disables rope mode when enabled).
    pub fn set_straight_line_mode(&mut self, enabled: bool) {
        self.current = self.current.with_straight_line_mode(enabled);
    }

    /// Toggle rope mode (disables straight-line mode when enabled).
    pub fn set_rope_select_mode(&mut self, enabled: bool) {
        self.current = self.current.with_rope_select_mode(enabled);
    }

    /// Snapshot for a new stroke.
    ///
    /// With `eraser_override` (a hardware eraser tip) the snapshot becomes an
    /// eraser at the eraser's remembered thickness; the settings themselves are
    /// untouched, so the override ends with the stroke.
    #[must_use]
    pub fn stroke_snapshot(&self, eraser_override: bool) -> ToolState {
        if eraser_override {
            self.current
                .with_kind(ToolKind::Eraser)
                .with_thickness(self.eraser_thickness)
        } else {
            self.current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen(t: f64) -> ToolState {
        ToolState::default().with_thickness(t)
    }

    #[test]
    fn test_pen_width_continuous_is_linear() {
        let tool = pen(5.0);
        assert!((tool.stroke_width(0.2, StrokePhase::Continuous) - 1.0).abs() < 1e-12);
        assert!((tool.stroke_width(1.0, StrokePhase::Continuous) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_pen_width_final_has_floor() {
        let tool = pen(5.0);
        assert!((tool.stroke_width(0.2, StrokePhase::Final) - 2.5).abs() < 1e-12);
        assert!((tool.stroke_width(0.8, StrokePhase::Final) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_marker_and_eraser_ignore_pressure() {
        let marker = pen(5.0).with_kind(ToolKind::Marker);
        let eraser = pen(5.0).with_kind(ToolKind::Eraser);
        assert!((marker.stroke_width(0.1, StrokePhase::Continuous) - 40.0).abs() < 1e-12);
        assert!((eraser.stroke_width(0.1, StrokePhase::Final) - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_marker_alpha_by_phase() {
        let marker = pen(5.0).with_kind(ToolKind::Marker).with_color(Rgba::rgb(255, 0, 0));
        assert_eq!(marker.paint_color(StrokePhase::Continuous).a, 4);
        assert_eq!(marker.paint_color(StrokePhase::Final).a, 40);
        assert_eq!(marker.paint_color(StrokePhase::Preview).a, 80);
    }

    #[test]
    fn test_modes_are_mutually_exclusive() {
        let s = ToolState::default().with_straight_line_mode(true);
        let r = s.with_rope_select_mode(true);
        assert!(r.rope_select_mode());
        assert!(!r.straight_line_mode());
        let back = r.with_straight_line_mode(true);
        assert!(back.straight_line_mode());
        assert!(!back.rope_select_mode());
    }

    #[test]
    fn test_disabling_one_mode_leaves_other_alone() {
        let r = ToolState::default().with_rope_select_mode(true);
        assert!(r.with_straight_line_mode(false).rope_select_mode());
    }

    #[test]
    fn test_repaint_padding_minimum() {
        assert!((pen(2.0).repaint_padding(1.0) - MIN_REPAINT_PADDING).abs() < 1e-12);
        assert!((pen(5.0).with_kind(ToolKind::Marker).repaint_padding(2.0) - 80.0).abs() < 1e-12);
    }

    #[test]
    fn test_thickness_memory_per_tool() {
        let mut settings = ToolSettings::new(5.0);
        settings.set_thickness(3.0);
        settings.set_tool(ToolKind::Marker);
        assert!((settings.current().base_thickness() - 5.0).abs() < 1e-12);
        settings.set_thickness(9.0);
        settings.set_tool(ToolKind::Pen);
        assert!((settings.current().base_thickness() - 3.0).abs() < 1e-12);
        assert!((settings.thickness_for(ToolKind::Marker) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_adjust_all_thicknesses() {
        let mut settings = ToolSettings::new(4.0);
        settings.adjust_all_thicknesses(1.5);
        assert!((settings.current().base_thickness() - 6.0).abs() < 1e-12);
        assert!((settings.thickness_for(ToolKind::Eraser) - 6.0).abs() < 1e-12);
        settings.adjust_all_thicknesses(-1.0);
        assert!((settings.thickness_for(ToolKind::Eraser) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_eraser_override_is_snapshot_only() {
        let mut settings = ToolSettings::new(5.0);
        settings.set_tool(ToolKind::Eraser);
        settings.set_thickness(2.0);
        settings.set_tool(ToolKind::Pen);

        let snap = settings.stroke_snapshot(true);
        assert_eq!(snap.kind(), ToolKind::Eraser);
        assert!((snap.base_thickness() - 2.0).abs() < 1e-12);
        assert_eq!(settings.current().kind(), ToolKind::Pen);
        assert_eq!(settings.stroke_snapshot(false).kind(), ToolKind::Pen);
    }
}
