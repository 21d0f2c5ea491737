//! Touch Gesture Integration Tests
//!
//! Tests the gesture state machine end to end:
//! - pinch keeps the buffer point under the fingers fixed
//! - three or more fingers freeze the view
//! - the view resumes without a jump when fingers are lifted

use ink_core::{
    CanvasEvent, CoordinateTransform, GestureInterpreter, Point, Size, TouchEvent, TouchPhase,
    TouchPoint, ViewState,
};

const VIEWPORT: Size = Size::new(800.0, 600.0);
const CANVAS: Size = Size::new(2400.0, 3200.0);

fn touches(phase: TouchPhase, points: &[(f64, f64)]) -> TouchEvent {
    TouchEvent::new(
        phase,
        points
            .iter()
            .zip(0u32..)
            .map(|(&(x, y), id)| TouchPoint::new(id, x, y))
            .collect(),
    )
}

fn feed(
    gestures: &mut GestureInterpreter,
    view: &mut ViewState,
    phase: TouchPhase,
    points: &[(f64, f64)],
) -> Vec<CanvasEvent> {
    gestures.process(&touches(phase, points), view, VIEWPORT, CANVAS)
}

// ============================================================================
// Pinch Tests
// ============================================================================

#[test]
fn test_pinch_keeps_midpoint_fixed() {
    let mut gestures = GestureInterpreter::new(true);
    let mut view = ViewState::default();
    view.pan = Point::new(300.0, 400.0);

    let before = CoordinateTransform::from_view(&view, VIEWPORT, CANVAS);
    let midpoint = Point::new(400.0, 300.0);
    let anchor = before.widget_to_buffer(midpoint);

    feed(&mut gestures, &mut view, TouchPhase::Start, &[(350.0, 300.0), (450.0, 300.0)]);
    let events = feed(&mut gestures, &mut view, TouchPhase::Move, &[(300.0, 300.0), (500.0, 300.0)]);

    assert_eq!(view.zoom_percent(), 200);
    assert!(events.contains(&CanvasEvent::ZoomChanged { percent: 200 }));

    let after = CoordinateTransform::from_view(&view, VIEWPORT, CANVAS);
    let moved = after.buffer_to_widget(anchor);
    assert!((moved.x - midpoint.x).abs() < 1e-9);
    assert!((moved.y - midpoint.y).abs() < 1e-9);
}

#[test]
fn test_pinch_zoom_is_clamped() {
    let mut gestures = GestureInterpreter::new(true);
    let mut view = ViewState::default();
    feed(&mut gestures, &mut view, TouchPhase::Start, &[(390.0, 300.0), (410.0, 300.0)]);
    feed(&mut gestures, &mut view, TouchPhase::Move, &[(0.0, 300.0), (800.0, 300.0)]);
    assert_eq!(view.zoom_percent(), 400);
    feed(&mut gestures, &mut view, TouchPhase::End, &[]);
    assert_eq!(view.zoom_percent(), 400);
}

// ============================================================================
// Freeze and Resume Tests
// ============================================================================

#[test]
fn test_three_fingers_freeze_then_resume() {
    let mut gestures = GestureInterpreter::new(true);
    let mut view = ViewState::default();
    view.pan = Point::new(100.0, 100.0);

    feed(&mut gestures, &mut view, TouchPhase::Start, &[(100.0, 100.0), (200.0, 100.0)]);
    feed(
        &mut gestures,
        &mut view,
        TouchPhase::Move,
        &[(100.0, 100.0), (200.0, 100.0), (300.0, 300.0)],
    );
    assert!(gestures.is_frozen());
    let frozen = view;

    let events = feed(
        &mut gestures,
        &mut view,
        TouchPhase::Move,
        &[(10.0, 10.0), (700.0, 500.0), (50.0, 400.0)],
    );
    assert!(events.is_empty());
    assert_eq!(view, frozen);

    // Back to one finger: the first sample re-anchors, the next one pans.
    let events = feed(&mut gestures, &mut view, TouchPhase::Move, &[(300.0, 300.0)]);
    assert!(events.is_empty());
    assert_eq!(view, frozen);

    feed(&mut gestures, &mut view, TouchPhase::Move, &[(290.0, 280.0)]);
    assert_eq!(view.pan, Point::new(110.0, 120.0));
    assert!(!gestures.is_frozen());

    let events = feed(&mut gestures, &mut view, TouchPhase::End, &[]);
    assert_eq!(events, vec![CanvasEvent::GestureEnded]);
}

#[test]
fn test_reducing_to_two_fingers_starts_fresh_pinch() {
    let mut gestures = GestureInterpreter::new(true);
    let mut view = ViewState::default();
    feed(
        &mut gestures,
        &mut view,
        TouchPhase::Start,
        &[(100.0, 100.0), (200.0, 100.0), (300.0, 100.0)],
    );
    // The pinch baseline is the distance when the third finger lifts, so no zoom jump.
    let events = feed(&mut gestures, &mut view, TouchPhase::Move, &[(100.0, 100.0), (400.0, 100.0)]);
    assert!(events.is_empty());
    assert_eq!(view.zoom_percent(), 100);
}
