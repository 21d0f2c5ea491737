//! Input events consumed by the canvas and notifications it emits.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Phase of a pointer (stylus or mouse) event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// Tip down or button pressed.
    Press,
    /// Pointer moved while pressed.
    Move,
    /// Tip lifted or button released.
    Release,
}

/// The device a pointer event came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    /// Pen tip of a stylus.
    #[default]
    Stylus,
    /// Eraser end of a stylus.
    Eraser,
    /// Mouse or trackpad. Never draws.
    Mouse,
}

/// A pointer event in view space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Phase of this event.
    pub phase: PointerPhase,
    /// Position in view space.
    pub position: Point,
    /// Pressure in `[0, 1]`.
    pub pressure: f64,
    /// Originating device.
    #[serde(default)]
    pub kind: PointerKind,
}

impl PointerEvent {
    /// Create a stylus event.
    #[must_use]
    pub const fn stylus(phase: PointerPhase, position: Point, pressure: f64) -> Self {
        Self {
            phase,
            position,
            pressure,
            kind: PointerKind::Stylus,
        }
    }

    /// Same event from a different device.
    #[must_use]
    pub const fn with_kind(self, kind: PointerKind) -> Self {
        Self { kind, ..self }
    }

    /// Pressure clamped to `[0, 1]`, with non-finite values treated as full pressure.
    #[must_use]
    pub fn clamped_pressure(&self) -> f64 {
        if self.pressure.is_finite() {
            self.pressure.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Phase of a touch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    /// Touch started (finger down).
    Start,
    /// Touch moved (finger dragging).
    Move,
    /// Touch ended (last finger up).
    End,
    /// Touch cancelled (e.g., palm rejection).
    Cancel,
}

/// A single touch point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    /// Touch identifier (for multi-touch).
    pub id: u32,
    /// Position in view space.
    pub position: Point,
}

impl TouchPoint {
    /// Create a touch point.
    #[must_use]
    pub const fn new(id: u32, x: f64, y: f64) -> Self {
        Self {
            id,
            position: Point::new(x, y),
        }
    }
}

/// A touch event carrying every contact currently on the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    /// Phase of this touch event.
    pub phase: TouchPhase,
    /// All current touch points.
    pub touches: Vec<TouchPoint>,
}

impl TouchEvent {
    /// Create a new touch event.
    #[must_use]
    pub fn new(phase: TouchPhase, touches: Vec<TouchPoint>) -> Self {
        Self { phase, touches }
    }

    /// Get the primary (first) touch point.
    #[must_use]
    pub fn primary_touch(&self) -> Option<&TouchPoint> {
        self.touches.first()
    }

    /// Check if this is a multi-touch event.
    #[must_use]
    pub fn is_multi_touch(&self) -> bool {
        self.touches.len() > 1
    }
}

/// Notifications emitted by the canvas to its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CanvasEvent {
    /// The committed zoom changed.
    ZoomChanged {
        /// New zoom in percent.
        percent: i32,
    },
    /// The pan offset changed.
    PanChanged {
        /// Horizontal pan in buffer pixels.
        x: f64,
        /// Vertical pan in buffer pixels.
        y: f64,
    },
    /// All fingers lifted after a touch gesture.
    GestureEnded,
    /// A lasso selection settled; a collaborator may show its action menu.
    SelectionReady {
        /// Top-right corner of the selection in view space.
        anchor: Point,
    },
    /// Text under a text-selection rectangle.
    TextSelected {
        /// Selected text, boxes joined by spaces.
        text: String,
    },
    /// A link on the background document page was activated.
    BackgroundLinkActivated {
        /// Zero-based target page.
        page_index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_clamped() {
        let mut e = PointerEvent::stylus(PointerPhase::Move, Point::zero(), 1.7);
        assert!((e.clamped_pressure() - 1.0).abs() < f64::EPSILON);
        e.pressure = f64::NAN;
        assert!((e.clamped_pressure() - 1.0).abs() < f64::EPSILON);
        e.pressure = -0.2;
        assert!(e.clamped_pressure().abs() < f64::EPSILON);
    }

    #[test]
    fn test_canvas_event_serialization() {
        let json = serde_json::to_string(&CanvasEvent::ZoomChanged { percent: 150 })
            .expect("serialize");
        assert_eq!(json, r#"{"event":"zoom_changed","percent":150}"#);
        let back: CanvasEvent =
            serde_json::from_str(r#"{"event":"gesture_ended"}"#).expect("deserialize");
        assert_eq!(back, CanvasEvent::GestureEnded);
    }

    #[test]
    fn test_pointer_kind_defaults_to_stylus() {
        let e: PointerEvent = serde_json::from_str(
            r#"{"phase":"press","position":{"x":1.0,"y":2.0},"pressure":0.5}"#,
        )
        .expect("deserialize");
        assert_eq!(e.kind, PointerKind::Stylus);
    }
}
