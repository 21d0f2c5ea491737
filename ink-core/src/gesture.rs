//! Multi-touch pan and pinch-zoom interpretation.
//!
//! The interpreter is a state machine keyed on the number of simultaneous
//! contacts:
//!
//! | contacts | state    | effect                                        |
//! |----------|----------|-----------------------------------------------|
//! | 0        | idle     | none                                          |
//! | 1        | panning  | view delta ÷ zoom moves the buffer-space pan  |
//! | 2        | pinching | distance ratio scales the zoom about the midpoint |
//! | >2       | frozen   | input ignored until contacts drop back        |
//!
//! Whenever the contact count changes the new state is re-initialised from
//! the current positions, so adding or lifting a finger never makes the view
//! jump.

use crate::event::{CanvasEvent, TouchEvent, TouchPhase};
use crate::geometry::{Point, Size};
use crate::transform::{CoordinateTransform, ViewState};

#[derive(Debug, Clone, Copy, PartialEq)]
enum GestureState {
    Idle,
    Panning { last: Point },
    Pinching { initial_distance: f64, last_scale: f64 },
    Frozen,
}

/// Turns touch events into pan and zoom changes on a [`ViewState`].
#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    enabled: bool,
    state: GestureState,
}

impl Default for GestureInterpreter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl GestureInterpreter {
    /// Create an interpreter. Touch input is ignored until `enabled` is true.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: GestureState::Idle,
        }
    }

    /// Whether touch gestures are processed.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable touch gestures. Disabling abandons any gesture in progress.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.state = GestureState::Idle;
        }
    }

    /// True while at least one finger is down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != GestureState::Idle
    }

    /// True while more than two fingers are down.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state == GestureState::Frozen
    }

    /// Apply one touch event to `view`, returning the notifications it caused.
    pub fn process(
        &mut self,
        event: &TouchEvent,
        view: &mut ViewState,
        viewport: Size,
        canvas: Size,
    ) -> Vec<CanvasEvent> {
        if !self.enabled {
            return Vec::new();
        }

        if matches!(event.phase, TouchPhase::End | TouchPhase::Cancel) || event.touches.is_empty()
        {
            return self.finish(view);
        }

        match event.touches.as_slice() {
            [one] => self.pan(one.position, view, viewport, canvas),
            [a, b] => self.pinch(a.position, b.position, view, viewport, canvas),
            _ => {
                if self.state != GestureState::Frozen {
                    tracing::debug!(contacts = event.touches.len(), "Gesture frozen");
                }
                self.state = GestureState::Frozen;
                Vec::new()
            }
        }
    }

    fn finish(&mut self, view: &mut ViewState) -> Vec<CanvasEvent> {
        if self.state == GestureState::Idle {
            return Vec::new();
        }
        self.state = GestureState::Idle;
        let before = view.zoom_percent();
        let percent = view.snap_zoom();
        tracing::debug!(percent, "Gesture ended");

        let mut events = Vec::new();
        if percent != before {
            events.push(CanvasEvent::ZoomChanged { percent });
        }
        events.push(CanvasEvent::GestureEnded);
        events
    }

    fn pan(
        &mut self,
        position: Point,
        view: &mut ViewState,
        viewport: Size,
        canvas: Size,
    ) -> Vec<CanvasEvent> {
        let GestureState::Panning { last } = self.state else {
            self.state = GestureState::Panning { last: position };
            return Vec::new();
        };
        self.state = GestureState::Panning { last: position };

        let transform = CoordinateTransform::from_view(view, viewport, canvas);
        let delta = (position - last) / transform.zoom();
        let pan = transform.constrain_pan(view.pan - delta);
        if pan == view.pan {
            return Vec::new();
        }
        view.pan = pan;
        vec![CanvasEvent::PanChanged { x: pan.x, y: pan.y }]
    }

    fn pinch(
        &mut self,
        a: Point,
        b: Point,
        view: &mut ViewState,
        viewport: Size,
        canvas: Size,
    ) -> Vec<CanvasEvent> {
        let distance = a.distance_to(b);
        let GestureState::Pinching {
            initial_distance,
            last_scale,
        } = self.state
        else {
            self.state = GestureState::Pinching {
                initial_distance: distance,
                last_scale: 1.0,
            };
            return Vec::new();
        };
        if initial_distance <= 0.0 {
            // Fingers started on the same spot; wait for them to separate.
            self.state = GestureState::Pinching {
                initial_distance: distance,
                last_scale: 1.0,
            };
            return Vec::new();
        }

        let scale = distance / initial_distance;
        self.state = GestureState::Pinching {
            initial_distance,
            last_scale: scale,
        };

        let center = a.midpoint(b);
        let before = CoordinateTransform::from_view(view, viewport, canvas);
        let anchor = before.widget_to_buffer(center);
        let old_percent = view.zoom_percent();
        let old_pan = view.pan;

        view.set_smoothed_zoom(view.smoothed_zoom() * (scale / last_scale));

        // Solve for the pan that puts `anchor` back under `center` at the new zoom.
        let after = CoordinateTransform::new(view.zoom_factor(), Point::zero(), viewport, canvas);
        let mut pan = anchor - (center - after.center_offset()) / after.zoom();
        if after.pan_locked_x() {
            pan.x = 0.0;
        }
        if after.pan_locked_y() {
            pan.y = 0.0;
        }
        view.pan = pan;

        let mut events = Vec::new();
        if view.zoom_percent() != old_percent {
            events.push(CanvasEvent::ZoomChanged {
                percent: view.zoom_percent(),
            });
        }
        if pan != old_pan {
            events.push(CanvasEvent::PanChanged { x: pan.x, y: pan.y });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TouchPoint;

    const VIEWPORT: Size = Size::new(800.0, 600.0);
    const CANVAS: Size = Size::new(2000.0, 3000.0);

    fn touch(phase: TouchPhase, points: &[(f64, f64)]) -> TouchEvent {
        let touches = points
            .iter()
            .zip(0u32..)
            .map(|(&(x, y), id)| TouchPoint::new(id, x, y))
            .collect();
        TouchEvent::new(phase, touches)
    }

    #[test]
    fn test_disabled_ignores_touches() {
        let mut g = GestureInterpreter::new(false);
        let mut view = ViewState::default();
        g.process(&touch(TouchPhase::Start, &[(10.0, 10.0)]), &mut view, VIEWPORT, CANVAS);
        let events =
            g.process(&touch(TouchPhase::Move, &[(0.0, 0.0)]), &mut view, VIEWPORT, CANVAS);
        assert!(events.is_empty());
        assert_eq!(view.pan, Point::zero());
    }

    #[test]
    fn test_single_finger_pans_by_delta_over_zoom() {
        let mut g = GestureInterpreter::new(true);
        let mut view = ViewState::default();
        view.set_zoom(200);
        view.pan = Point::new(100.0, 100.0);
        g.process(&touch(TouchPhase::Start, &[(300.0, 300.0)]), &mut view, VIEWPORT, CANVAS);
        let events =
            g.process(&touch(TouchPhase::Move, &[(280.0, 260.0)]), &mut view, VIEWPORT, CANVAS);
        assert_eq!(view.pan, Point::new(110.0, 120.0));
        assert_eq!(events, vec![CanvasEvent::PanChanged { x: 110.0, y: 120.0 }]);
    }

    #[test]
    fn test_pan_locked_when_page_fits() {
        let mut g = GestureInterpreter::new(true);
        let mut view = ViewState::default();
        let small = Size::new(400.0, 300.0);
        g.process(&touch(TouchPhase::Start, &[(100.0, 100.0)]), &mut view, VIEWPORT, small);
        let events =
            g.process(&touch(TouchPhase::Move, &[(50.0, 20.0)]), &mut view, VIEWPORT, small);
        assert!(events.is_empty());
        assert_eq!(view.pan, Point::zero());
    }

    #[test]
    fn test_end_snaps_and_emits_gesture_ended() {
        let mut g = GestureInterpreter::new(true);
        let mut view = ViewState::default();
        g.process(
            &touch(TouchPhase::Start, &[(100.0, 100.0), (200.0, 100.0)]),
            &mut view,
            VIEWPORT,
            CANVAS,
        );
        g.process(
            &touch(TouchPhase::Move, &[(100.0, 100.0), (250.3, 100.0)]),
            &mut view,
            VIEWPORT,
            CANVAS,
        );
        let events = g.process(&touch(TouchPhase::End, &[]), &mut view, VIEWPORT, CANVAS);
        assert_eq!(events.last(), Some(&CanvasEvent::GestureEnded));
        assert!((view.smoothed_zoom() - f64::from(view.zoom_percent())).abs() < f64::EPSILON);
        assert_eq!(view.zoom_percent(), 150);
        assert!(!g.is_active());
    }

    #[test]
    fn test_end_without_gesture_is_silent() {
        let mut g = GestureInterpreter::new(true);
        let mut view = ViewState::default();
        assert!(g
            .process(&touch(TouchPhase::End, &[]), &mut view, VIEWPORT, CANVAS)
            .is_empty());
    }
}
