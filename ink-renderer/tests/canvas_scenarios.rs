//! Canvas Scenario Tests
//!
//! Drives [`InkCanvas`] the way an embedding UI would:
//! - straight pen lines land exactly where they were drawn
//! - lassoed ink moves without loss
//! - document pages are cached FIFO and stale renders are dropped
//! - edited pages survive a save and reload

use std::sync::Arc;
use std::time::Instant;

use ink_core::{
    CanvasConfig, CanvasEvent, Point, PointerEvent, PointerKind, PointerPhase, Size, ToolKind,
};
use ink_renderer::raster::{decode_image, encode_png, new_pixmap, pixel_bytes};
use ink_renderer::{
    BackgroundTasks, ImageDocument, ImagePage, InkCanvas, NotebookId, PageKey, PageStore,
    SelectionMode,
};
use tiny_skia::{Color, Paint, Rect as SkiaRect, Transform};

const BLACK: [u8; 4] = [0, 0, 0, 255];

fn config() -> CanvasConfig {
    CanvasConfig {
        blank_page_width: 800,
        blank_page_height: 600,
        ..CanvasConfig::default()
    }
}

fn inline_canvas() -> InkCanvas {
    InkCanvas::with_tasks(
        config(),
        Size::new(800.0, 600.0),
        BackgroundTasks::with_runtime(None),
    )
    .expect("canvas")
}

fn pointer(canvas: &mut InkCanvas, phase: PointerPhase, x: f64, y: f64) {
    let event = PointerEvent::stylus(phase, Point::new(x, y), 1.0);
    canvas.handle_pointer_at(&event, Instant::now());
}

fn square_png(x: f32, y: f32, side: f32) -> Vec<u8> {
    let mut pixmap = new_pixmap(800, 600).expect("pixmap");
    let mut paint = Paint::default();
    paint.set_color(Color::BLACK);
    let rect = SkiaRect::from_xywh(x, y, side, side).expect("rect");
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    encode_png(&pixmap).expect("png")
}

fn document(pages: usize) -> Arc<ImageDocument> {
    Arc::new(ImageDocument::new(
        (0..pages)
            .map(|_| ImagePage::from_image(new_pixmap(200, 100).expect("pixmap"), 288.0))
            .collect(),
    ))
}

// ============================================================================
// Drawing Tests
// ============================================================================

#[test]
fn test_straight_pen_line_is_opaque_and_marks_edited() {
    let mut canvas = inline_canvas();
    canvas.set_tool(ToolKind::Pen);
    canvas.set_thickness(5.0);
    canvas.set_straight_line_mode(true);
    assert!(!canvas.is_edited());

    pointer(&mut canvas, PointerPhase::Press, 100.0, 100.0);
    pointer(&mut canvas, PointerPhase::Move, 180.0, 140.0);
    pointer(&mut canvas, PointerPhase::Move, 250.0, 100.0);
    // Preview only; nothing committed yet.
    assert!(!canvas.is_edited());
    pointer(&mut canvas, PointerPhase::Release, 300.0, 100.0);

    assert!(canvas.is_edited());
    let buffer = canvas.buffer();
    for x in 101..=299 {
        for y in 98..=101 {
            let [_, _, _, alpha] = buffer.pixel(x, y).expect("inside buffer");
            assert!(alpha >= 250, "pixel ({x}, {y}) alpha {alpha}");
        }
    }
    assert_eq!(buffer.pixel(200, 140).map(|p| p[3]), Some(0));
    assert_eq!(buffer.pixel(200, 110).map(|p| p[3]), Some(0));
}

#[test]
fn test_freehand_stroke_follows_pointer() {
    let mut canvas = inline_canvas();
    pointer(&mut canvas, PointerPhase::Press, 50.0, 50.0);
    pointer(&mut canvas, PointerPhase::Move, 60.0, 50.0);
    pointer(&mut canvas, PointerPhase::Move, 70.0, 50.0);
    pointer(&mut canvas, PointerPhase::Release, 70.0, 50.0);

    assert!(canvas.is_edited());
    assert_eq!(canvas.buffer().pixel(65, 50), Some(BLACK));
    assert!(!canvas.is_drawing());
}

#[test]
fn test_eraser_tip_clears_ink() {
    let mut canvas = inline_canvas();
    canvas
        .load_page_raster(&square_png(100.0, 100.0, 50.0))
        .expect("load");
    let eraser = |phase, x| {
        PointerEvent::stylus(phase, Point::new(x, 125.0), 1.0).with_kind(PointerKind::Eraser)
    };
    let now = Instant::now();
    canvas.handle_pointer_at(&eraser(PointerPhase::Press, 90.0), now);
    canvas.handle_pointer_at(&eraser(PointerPhase::Move, 160.0), now);
    canvas.handle_pointer_at(&eraser(PointerPhase::Release, 160.0), now);

    assert_eq!(canvas.buffer().pixel(125, 125).map(|p| p[3]), Some(0));
    assert_eq!(canvas.buffer().pixel(125, 102), Some(BLACK));
    assert_eq!(canvas.tool().kind(), ToolKind::Pen);
}

// ============================================================================
// Selection Tests
// ============================================================================

#[test]
fn test_lasso_move_relocates_ink_exactly() {
    let mut canvas = inline_canvas();
    canvas
        .load_page_raster(&square_png(100.0, 100.0, 50.0))
        .expect("load");
    assert!(!canvas.is_edited());
    canvas.set_rope_tool_mode(true);

    pointer(&mut canvas, PointerPhase::Press, 90.0, 90.0);
    pointer(&mut canvas, PointerPhase::Move, 160.0, 90.0);
    pointer(&mut canvas, PointerPhase::Move, 160.0, 160.0);
    pointer(&mut canvas, PointerPhase::Release, 90.0, 160.0);
    assert_eq!(canvas.selection().mode(), SelectionMode::Selected);
    assert!(canvas.is_edited());

    pointer(&mut canvas, PointerPhase::Press, 120.0, 120.0);
    assert_eq!(canvas.selection().mode(), SelectionMode::Moving);
    pointer(&mut canvas, PointerPhase::Move, 140.0, 140.0);
    pointer(&mut canvas, PointerPhase::Release, 140.0, 140.0);
    assert_eq!(canvas.selection().mode(), SelectionMode::Idle);

    let buffer = canvas.buffer();
    assert_eq!(buffer.pixel(105, 105).map(|p| p[3]), Some(0));
    for y in 120..170 {
        for x in 120..170 {
            assert_eq!(buffer.pixel(x, y), Some(BLACK), "pixel ({x}, {y})");
        }
    }
    assert_eq!(buffer.pixel(171, 171).map(|p| p[3]), Some(0));
}

#[test]
fn test_selection_ready_fires_after_delay() {
    let mut canvas = inline_canvas();
    canvas
        .load_page_raster(&square_png(100.0, 100.0, 50.0))
        .expect("load");
    canvas.begin_selection();
    let start = Instant::now();
    for (phase, x, y) in [
        (PointerPhase::Press, 90.0, 90.0),
        (PointerPhase::Move, 160.0, 90.0),
        (PointerPhase::Move, 160.0, 160.0),
        (PointerPhase::Release, 90.0, 160.0),
    ] {
        canvas.handle_pointer_at(&PointerEvent::stylus(phase, Point::new(x, y), 1.0), start);
    }
    canvas.drain_events();

    canvas.tick_at(start);
    assert!(canvas.drain_events().is_empty());
    canvas.tick_at(start + canvas.config().selection_ready_delay());
    assert_eq!(
        canvas.drain_events(),
        vec![CanvasEvent::SelectionReady {
            anchor: Point::new(160.0, 90.0)
        }]
    );
}

#[test]
fn test_rope_and_straight_line_are_exclusive() {
    let mut canvas = inline_canvas();
    canvas.set_straight_line_mode(true);
    canvas.set_rope_tool_mode(true);
    assert!(canvas.tool().rope_select_mode());
    assert!(!canvas.tool().straight_line_mode());

    canvas.set_straight_line_mode(true);
    assert!(canvas.tool().straight_line_mode());
    assert!(!canvas.tool().rope_select_mode());
}

#[test]
fn test_degenerate_lasso_changes_nothing() {
    let mut canvas = inline_canvas();
    canvas
        .load_page_raster(&square_png(100.0, 100.0, 50.0))
        .expect("load");
    canvas.set_rope_tool_mode(true);
    pointer(&mut canvas, PointerPhase::Press, 90.0, 90.0);
    pointer(&mut canvas, PointerPhase::Release, 160.0, 160.0);

    assert_eq!(canvas.selection().mode(), SelectionMode::Idle);
    assert!(!canvas.is_edited());
    assert_eq!(canvas.buffer().pixel(120, 120), Some(BLACK));
}

// ============================================================================
// Page Cache Tests
// ============================================================================

#[test]
fn test_page_cache_evicts_oldest_through_canvas() {
    let mut canvas = inline_canvas();
    canvas.set_document(document(12));
    for page in 0..12 {
        assert!(canvas.load_background_document_page(page));
    }
    assert_eq!(canvas.page_cache().len(), 10);
    assert_eq!(canvas.page_cache().cached_pages(), (2..12).collect::<Vec<_>>());
}

#[test]
fn test_stale_preview_never_replaces_current_page() {
    let mut canvas = inline_canvas();
    canvas.set_document(document(4));
    canvas.request_page_preview(3);
    canvas.request_page_preview(1);
    canvas.tick_at(Instant::now());
    assert_eq!(canvas.background().document_page(), Some(1));
    assert!(canvas.page_cache().is_empty());
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_saved_page_reloads_in_new_canvas() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = PageStore::with_data_dir(dir.path()).expect("store");
    let notebook = NotebookId::generate();

    let mut canvas = InkCanvas::new(config(), Size::new(800.0, 600.0))
        .expect("canvas")
        .with_store(store.clone(), notebook);
    pointer(&mut canvas, PointerPhase::Press, 40.0, 40.0);
    pointer(&mut canvas, PointerPhase::Move, 80.0, 40.0);
    pointer(&mut canvas, PointerPhase::Release, 80.0, 40.0);

    assert!(canvas.save_current_page().expect("save"));
    assert!(!canvas.is_edited());
    assert!(!canvas.save_current_page().expect("nothing to save"));
    canvas.settle().await;
    assert_eq!(store.saved_pages(notebook).expect("list"), vec![0]);

    let mut reopened = InkCanvas::new(config(), Size::new(800.0, 600.0))
        .expect("canvas")
        .with_store(store, notebook);
    reopened.switch_page(0);
    assert_eq!(reopened.buffer().pixel(60, 40), Some(BLACK));
    assert!(!reopened.is_edited());
}

#[tokio::test]
async fn test_switch_page_saves_edits_and_starts_blank() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = PageStore::with_data_dir(dir.path()).expect("store");
    let notebook = NotebookId::generate();
    let mut canvas = InkCanvas::new(config(), Size::new(800.0, 600.0))
        .expect("canvas")
        .with_store(store.clone(), notebook);

    pointer(&mut canvas, PointerPhase::Press, 40.0, 40.0);
    pointer(&mut canvas, PointerPhase::Move, 80.0, 40.0);
    pointer(&mut canvas, PointerPhase::Release, 80.0, 40.0);
    canvas.switch_page(1);
    assert_eq!(canvas.current_page(), 1);
    assert_eq!(canvas.buffer().pixel(60, 40).map(|p| p[3]).unwrap_or(0), 0);

    canvas.switch_page(0);
    assert_eq!(canvas.buffer().pixel(60, 40), Some(BLACK));
    canvas.settle().await;
    assert_eq!(store.saved_pages(notebook).expect("list"), vec![0]);
}

#[tokio::test]
async fn test_back_to_back_saves_keep_latest_ink() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = PageStore::with_data_dir(dir.path()).expect("store");
    let notebook = NotebookId::generate();
    let mut canvas = InkCanvas::new(config(), Size::new(800.0, 600.0))
        .expect("canvas")
        .with_store(store.clone(), notebook);

    pointer(&mut canvas, PointerPhase::Press, 40.0, 40.0);
    pointer(&mut canvas, PointerPhase::Move, 80.0, 40.0);
    pointer(&mut canvas, PointerPhase::Release, 80.0, 40.0);
    assert!(canvas.save_current_page().expect("first save"));
    pointer(&mut canvas, PointerPhase::Press, 40.0, 200.0);
    pointer(&mut canvas, PointerPhase::Move, 80.0, 200.0);
    pointer(&mut canvas, PointerPhase::Release, 80.0, 200.0);
    assert!(canvas.save_current_page().expect("second save"));
    canvas.settle().await;

    let png = store
        .load(PageKey::new(notebook, 0))
        .expect("load")
        .expect("saved");
    let saved = decode_image(&png).expect("decode");
    assert_eq!(pixel_bytes(&saved, 60, 40), Some(BLACK));
    assert_eq!(pixel_bytes(&saved, 60, 200), Some(BLACK));
}
