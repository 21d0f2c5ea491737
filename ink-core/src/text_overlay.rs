//! Text selection over a document page background.
//!
//! The user drags a rectangle in view space. It is mapped through the
//! [`CoordinateTransform`] into buffer space and then through the
//! [`DocumentScale`] into document space, where it is intersected with the
//! page's text boxes. Drag updates are coalesced to a fixed cadence; the last
//! update is always processed when the pointer is released.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::throttle::CoalescingTimer;
use crate::transform::{CoordinateTransform, DocumentScale};

/// Drags shorter than this (view pixels) count as clicks and select nothing.
pub const MIN_DRAG_DISTANCE: f64 = 5.0;

/// A run of text on a document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// The text content.
    pub text: String,
    /// Bounding box in document space.
    pub bounds: Rect,
}

/// An internal link on a document page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLink {
    /// Clickable area in normalized page coordinates (`0.0..=1.0`).
    pub area: Rect,
    /// Zero-based destination page.
    pub target_page: usize,
}

/// Everything needed to map view space into document space for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentMapping {
    /// View ↔ buffer transform.
    pub transform: CoordinateTransform,
    /// Buffer ↔ document scale.
    pub scale: DocumentScale,
}

impl DocumentMapping {
    /// Map a view-space point into document space.
    #[must_use]
    pub fn widget_to_document(&self, p: Point) -> Point {
        self.scale
            .buffer_to_document(self.transform.widget_to_buffer(p))
    }

    /// Map a document-space rectangle into view space.
    #[must_use]
    pub fn document_rect_to_widget(&self, r: &Rect) -> Rect {
        self.transform
            .buffer_rect_to_widget(&self.scale.document_rect_to_buffer(r))
    }
}

/// Result of releasing the pointer in text selection mode.
#[derive(Debug, Clone, PartialEq)]
pub enum TextSelectionOutcome {
    /// Text was selected.
    Text(String),
    /// Nothing was selected, but the press landed on a link.
    Link(usize),
    /// Nothing happened.
    Nothing,
}

/// Throttled view-space text selection against a page's text boxes.
#[derive(Debug, Clone)]
pub struct TextOverlayMapper {
    boxes: Vec<TextBox>,
    links: Vec<PageLink>,
    selected: Vec<usize>,
    anchor: Option<Point>,
    current: Option<Point>,
    pending: CoalescingTimer<Point>,
}

impl TextOverlayMapper {
    /// Create a mapper that processes drag updates at most once per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            boxes: Vec::new(),
            links: Vec::new(),
            selected: Vec::new(),
            anchor: None,
            current: None,
            pending: CoalescingTimer::new(interval),
        }
    }

    /// Replace the page content. Clears any selection.
    pub fn set_page_content(&mut self, boxes: Vec<TextBox>, links: Vec<PageLink>) {
        tracing::debug!(boxes = boxes.len(), links = links.len(), "Text page content loaded");
        self.boxes = boxes;
        self.links = links;
        self.clear();
    }

    /// True if the page has any selectable text.
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.boxes.is_empty()
    }

    /// True between `begin` and `finish`.
    #[must_use]
    pub const fn is_selecting(&self) -> bool {
        self.anchor.is_some()
    }

    /// Start a drag at a view-space point.
    pub fn begin(&mut self, p: Point) {
        self.selected.clear();
        self.pending.cancel();
        self.anchor = Some(p);
        self.current = Some(p);
    }

    /// Record a drag position. It is processed on the next due [`Self::tick`].
    pub fn update(&mut self, p: Point, now: Instant) {
        if self.anchor.is_none() {
            return;
        }
        self.current = Some(p);
        self.pending.push(p, now);
    }

    /// Process the latest pending position if the cadence allows. Returns true if it did.
    pub fn tick(&mut self, now: Instant, mapping: &DocumentMapping) -> bool {
        match self.pending.poll(now) {
            Some(end) => {
                self.select_to(end, mapping);
                true
            }
            None => false,
        }
    }

    /// End the drag at `p`, processing the final rectangle synchronously.
    pub fn finish(&mut self, p: Point, mapping: &DocumentMapping) -> TextSelectionOutcome {
        let Some(anchor) = self.anchor else {
            return TextSelectionOutcome::Nothing;
        };
        self.pending.cancel();
        self.current = Some(p);
        self.select_to(p, mapping);
        self.anchor = None;
        self.current = None;

        let text = self.selected_text();
        if !text.is_empty() {
            return TextSelectionOutcome::Text(text);
        }
        match self.link_at(anchor, mapping) {
            Some(page) => TextSelectionOutcome::Link(page),
            None => TextSelectionOutcome::Nothing,
        }
    }

    /// Drop the selection and any drag in progress.
    pub fn clear(&mut self) {
        self.selected.clear();
        self.pending.cancel();
        self.anchor = None;
        self.current = None;
    }

    fn select_to(&mut self, end: Point, mapping: &DocumentMapping) {
        self.selected.clear();
        let Some(start) = self.anchor else {
            return;
        };
        if start.distance_to(end) < MIN_DRAG_DISTANCE {
            return;
        }
        let view_rect = Rect::from_points(start, end);
        let doc_rect = Rect::from_points(
            mapping.widget_to_document(view_rect.top_left()),
            mapping.widget_to_document(view_rect.bottom_right()),
        );
        self.selected = self
            .boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.bounds.intersects(&doc_rect))
            .map(|(i, _)| i)
            .collect();
    }

    /// Selected text, non-empty boxes joined with single spaces.
    #[must_use]
    pub fn selected_text(&self) -> String {
        self.selected
            .iter()
            .filter_map(|&i| self.boxes.get(i))
            .map(|b| b.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Number of selected boxes.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// The drag rectangle in view space, if dragging.
    #[must_use]
    pub fn selection_rect(&self) -> Option<Rect> {
        Some(Rect::from_points(self.anchor?, self.current?))
    }

    /// Highlight rectangles of the selected boxes in view space.
    #[must_use]
    pub fn highlight_rects(&self, mapping: &DocumentMapping) -> Vec<Rect> {
        self.selected
            .iter()
            .filter_map(|&i| self.boxes.get(i))
            .map(|b| mapping.document_rect_to_widget(&b.bounds))
            .collect()
    }

    /// Destination of the link under a view-space point.
    #[must_use]
    pub fn link_at(&self, p: Point, mapping: &DocumentMapping) -> Option<usize> {
        let native = mapping.scale.native;
        if native.is_empty() {
            return None;
        }
        let doc = mapping.widget_to_document(p);
        let normalized = Point::new(doc.x / native.width, doc.y / native.height);
        self.links
            .iter()
            .find(|link| link.area.contains(normalized))
            .map(|link| link.target_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    fn mapping() -> DocumentMapping {
        // 800x600 bitmap of a 400x300 page, shown at 100% with no pan.
        DocumentMapping {
            transform: CoordinateTransform::new(
                1.0,
                Point::zero(),
                Size::new(800.0, 600.0),
                Size::new(800.0, 600.0),
            ),
            scale: DocumentScale::new(Size::new(400.0, 300.0), Size::new(800.0, 600.0)),
        }
    }

    fn mapper() -> TextOverlayMapper {
        let mut m = TextOverlayMapper::new(Duration::from_millis(16));
        m.set_page_content(
            vec![
                TextBox {
                    text: "Hello".into(),
                    bounds: Rect::new(10.0, 10.0, 40.0, 10.0),
                },
                TextBox {
                    text: "world".into(),
                    bounds: Rect::new(60.0, 10.0, 40.0, 10.0),
                },
                TextBox {
                    text: "footer".into(),
                    bounds: Rect::new(10.0, 250.0, 60.0, 10.0),
                },
            ],
            vec![PageLink {
                area: Rect::new(0.0, 0.9, 1.0, 0.1),
                target_page: 4,
            }],
        );
        m
    }

    #[test]
    fn test_selects_intersecting_boxes_in_document_space() {
        let mut m = mapper();
        m.begin(Point::new(0.0, 0.0));
        // View (0,0)-(150,50) is document (0,0)-(75,25): hits both words.
        let outcome = m.finish(Point::new(150.0, 50.0), &mapping());
        assert_eq!(outcome, TextSelectionOutcome::Text("Hello world".into()));
    }

    #[test]
    fn test_updates_are_coalesced() {
        let mut m = mapper();
        let map = mapping();
        let start = Instant::now();
        m.begin(Point::new(0.0, 0.0));
        m.update(Point::new(60.0, 40.0), start);
        m.update(Point::new(150.0, 40.0), start + Duration::from_millis(4));
        assert!(!m.tick(start + Duration::from_millis(10), &map));
        assert_eq!(m.selected_count(), 0);
        assert!(m.tick(start + Duration::from_millis(16), &map));
        assert_eq!(m.selected_count(), 2);
    }

    #[test]
    fn test_release_supersedes_pending_update() {
        let mut m = mapper();
        let start = Instant::now();
        m.begin(Point::new(0.0, 0.0));
        m.update(Point::new(60.0, 40.0), start);
        let outcome = m.finish(Point::new(60.0, 40.0), &mapping());
        assert_eq!(outcome, TextSelectionOutcome::Text("Hello".into()));
        assert!(!m.is_selecting());
        // The queued update was superseded by the release.
        assert!(!m.tick(start + Duration::from_secs(1), &mapping()));
        assert_eq!(m.selected_count(), 1);
    }

    #[test]
    fn test_click_activates_link() {
        let mut m = mapper();
        m.begin(Point::new(400.0, 580.0));
        let outcome = m.finish(Point::new(401.0, 580.0), &mapping());
        assert_eq!(outcome, TextSelectionOutcome::Link(4));
    }

    #[test]
    fn test_highlights_map_back_to_view() {
        let mut m = mapper();
        m.begin(Point::new(0.0, 0.0));
        m.finish(Point::new(60.0, 40.0), &mapping());
        assert_eq!(
            m.highlight_rects(&mapping()),
            vec![Rect::new(20.0, 20.0, 80.0, 20.0)]
        );
    }
}
