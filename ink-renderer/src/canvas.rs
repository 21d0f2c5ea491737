//! The ink canvas façade.
//!
//! [`InkCanvas`] owns every piece of interactive state and is driven from a
//! single thread: pointer and touch input, tool and view changes, page
//! navigation and a periodic [`InkCanvas::tick_at`]. Notifications for the
//! embedding UI are queued and collected with [`InkCanvas::drain_events`].
//!
//! Failures on the interactive path (missing pages, undecodable images, full
//! disks) are logged and leave the canvas in a usable state; only the
//! explicit load/save operations report them to the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ink_core::{
    CanvasConfig, CanvasEvent, CoordinateTransform, Deadline, DocumentMapping, DocumentScale,
    GestureInterpreter, IntRect, Point, PointerEvent, PointerKind, PointerPhase, Rect, Rgba,
    Size, TextOverlayMapper, TextSelectionOutcome, ToolKind, ToolSettings,
    ToolState, TouchEvent, ViewState,
};
use tiny_skia::Pixmap;

use crate::background::{Background, PatternStyle};
use crate::compositor::{flatten_page, render_view, ViewLayers};
use crate::document::DocumentSource;
use crate::draw::{DrawEngine, Surface};
use crate::error::{RenderError, RenderResult};
use crate::page_cache::{render_preview, FifoCache, PageCache};
use crate::persist::{NotebookId, PageKey, PageStore};
use crate::raster::{blit_over, decode_image, encode_png};
use crate::selection::{SelectionController, SelectionMode, SelectionPress, SelectionRelease};
use crate::stroke_buffer::StrokeBuffer;
use crate::tasks::{BackgroundTasks, TaskOutcome, TaskResult};

/// Interactive ink canvas.
pub struct InkCanvas {
    config: CanvasConfig,
    view: ViewState,
    viewport: Size,
    tools: ToolSettings,
    buffer: StrokeBuffer,
    background: Background,
    document: Option<Arc<dyn DocumentSource>>,
    page_cache: PageCache,
    raster_cache: FifoCache<usize, Arc<Pixmap>>,
    store: Option<PageStore>,
    notebook: NotebookId,
    current_page: usize,
    generation: u64,
    save_revision: u64,
    draw: DrawEngine,
    gestures: GestureInterpreter,
    selection: SelectionController,
    text: TextOverlayMapper,
    text_selection_enabled: bool,
    tasks: BackgroundTasks,
    events: Vec<CanvasEvent>,
    selection_ready: Deadline,
    prefetch: Deadline,
}

impl fmt::Debug for InkCanvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InkCanvas")
            .field("view", &self.view)
            .field("viewport", &self.viewport)
            .field("tool", &self.tools.current())
            .field("buffer", &self.buffer.dimensions())
            .field("page", &self.current_page)
            .field("generation", &self.generation)
            .field("has_document", &self.document.is_some())
            .field("selection", &self.selection.mode())
            .finish_non_exhaustive()
    }
}

impl InkCanvas {
    /// Create a canvas showing a blank page in a viewport of the given size.
    ///
    /// Background jobs use the ambient tokio runtime if there is one and run
    /// inline otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: CanvasConfig, viewport: Size) -> RenderResult<Self> {
        Self::with_tasks(config, viewport, BackgroundTasks::new())
    }

    /// Create a canvas with an explicit background task dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_tasks(
        config: CanvasConfig,
        viewport: Size,
        tasks: BackgroundTasks,
    ) -> RenderResult<Self> {
        config.validate()?;
        let (width, height) = config.blank_page_pixels();
        tracing::debug!(width, height, "Creating ink canvas");
        Ok(Self {
            view: ViewState::new(config.device_pixel_ratio),
            viewport,
            tools: ToolSettings::new(config.default_thickness),
            buffer: StrokeBuffer::new(width, height),
            background: Background::None,
            document: None,
            page_cache: PageCache::new(config.page_cache_capacity, config.render_dpi),
            raster_cache: FifoCache::new(config.raster_cache_capacity),
            store: None,
            notebook: NotebookId::generate(),
            current_page: 0,
            generation: 0,
            save_revision: 0,
            draw: DrawEngine::new(),
            gestures: GestureInterpreter::new(config.touch_gestures_enabled),
            selection: SelectionController::new(),
            text: TextOverlayMapper::new(config.text_selection_interval()),
            text_selection_enabled: false,
            tasks,
            events: Vec::new(),
            selection_ready: Deadline::default(),
            prefetch: Deadline::default(),
            config,
        })
    }

    /// Persist pages of `notebook` into `store`.
    #[must_use]
    pub fn with_store(mut self, store: PageStore, notebook: NotebookId) -> Self {
        self.attach_store(store, notebook);
        self
    }

    /// Start persisting pages of `notebook` into `store`. Cached rasters of
    /// the previous notebook are dropped.
    pub fn attach_store(&mut self, store: PageStore, notebook: NotebookId) {
        tracing::info!(%notebook, root = %store.root().display(), "Page store attached");
        if notebook != self.notebook {
            self.raster_cache.clear();
        }
        self.store = Some(store);
        self.notebook = notebook;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// View state (zoom, pan, device pixel ratio).
    #[must_use]
    pub const fn view(&self) -> &ViewState {
        &self.view
    }

    /// Viewport size in logical pixels.
    #[must_use]
    pub const fn viewport(&self) -> Size {
        self.viewport
    }

    /// View ↔ buffer mapping for the current frame.
    #[must_use]
    pub fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::from_view(&self.view, self.viewport, self.buffer.size())
    }

    /// Current tool settings.
    #[must_use]
    pub const fn tool(&self) -> ToolState {
        self.tools.current()
    }

    /// The ink raster.
    #[must_use]
    pub const fn buffer(&self) -> &StrokeBuffer {
        &self.buffer
    }

    /// The page background.
    #[must_use]
    pub const fn background(&self) -> &Background {
        &self.background
    }

    /// The lasso selection state.
    #[must_use]
    pub const fn selection(&self) -> &SelectionController {
        &self.selection
    }

    /// Cache of rendered document pages.
    #[must_use]
    pub const fn page_cache(&self) -> &PageCache {
        &self.page_cache
    }

    /// Zero-based page being edited.
    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    /// Navigation generation; bumped whenever the shown page changes.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Notebook identifier used for persistence.
    #[must_use]
    pub const fn notebook(&self) -> NotebookId {
        self.notebook
    }

    /// Whether the page has unsaved ink changes.
    #[must_use]
    pub const fn is_edited(&self) -> bool {
        self.buffer.is_edited()
    }

    /// True while a stroke is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.draw.is_drawing()
    }

    /// Background jobs not yet applied.
    #[must_use]
    pub const fn pending_tasks(&self) -> usize {
        self.tasks.outstanding()
    }

    // -----------------------------------------------------------------------
    // Tools and modes
    // -----------------------------------------------------------------------

    /// Switch tool, restoring its remembered thickness.
    pub fn set_tool(&mut self, kind: ToolKind) {
        self.tools.set_tool(kind);
    }

    /// Set the ink colour.
    pub fn set_color(&mut self, color: Rgba) {
        self.tools.set_color(color);
    }

    /// Set the current tool's thickness.
    pub fn set_thickness(&mut self, thickness: f64) {
        self.tools.set_thickness(thickness);
    }

    /// Rescale every tool's remembered thickness.
    pub fn adjust_all_thicknesses(&mut self, ratio: f64) {
        self.tools.adjust_all_thicknesses(ratio);
    }

    /// Toggle straight-line mode. Enabling it leaves rope mode.
    pub fn set_straight_line_mode(&mut self, enabled: bool) {
        self.tools.set_straight_line_mode(enabled);
        self.leave_rope_mode_if_disabled();
    }

    /// Toggle the rope (lasso) tool. Enabling it leaves straight-line mode;
    /// disabling it puts any floating selection back.
    pub fn set_rope_tool_mode(&mut self, enabled: bool) {
        if enabled {
            self.draw.abort();
        }
        self.tools.set_rope_select_mode(enabled);
        self.leave_rope_mode_if_disabled();
    }

    fn leave_rope_mode_if_disabled(&mut self) {
        if !self.tools.current().rope_select_mode() && self.selection.mode() != SelectionMode::Idle {
            self.cancel_selection();
        }
    }

    /// Route stylus and mouse input to text selection while a document page
    /// is shown.
    pub fn set_text_selection_enabled(&mut self, enabled: bool) {
        self.text_selection_enabled = enabled;
        if !enabled {
            self.text.clear();
        }
    }

    /// Whether text selection mode is on.
    #[must_use]
    pub const fn text_selection_enabled(&self) -> bool {
        self.text_selection_enabled
    }

    /// Let touch gestures drive pan and zoom.
    pub fn set_touch_gestures_enabled(&mut self, enabled: bool) {
        self.gestures.set_enabled(enabled);
    }

    // -----------------------------------------------------------------------
    // View
    // -----------------------------------------------------------------------

    /// Committed zoom in percent.
    #[must_use]
    pub const fn zoom(&self) -> i32 {
        self.view.zoom_percent()
    }

    /// Pan offset in buffer pixels.
    #[must_use]
    pub const fn pan(&self) -> Point {
        self.view.pan
    }

    /// Set the zoom, clamped to the supported range.
    pub fn set_zoom(&mut self, percent: i32) {
        let before = self.view.zoom_percent();
        let applied = self.view.set_zoom(percent);
        if applied != before {
            self.events.push(CanvasEvent::ZoomChanged { percent: applied });
        }
        self.apply_pan(self.view.pan);
    }

    /// Set the pan offset. Axes whose page fits the viewport stay at zero.
    pub fn set_pan(&mut self, x: f64, y: f64) {
        self.apply_pan(Point::new(x, y));
    }

    fn apply_pan(&mut self, requested: Point) {
        let constrained = self.transform().constrain_pan(requested);
        if constrained != self.view.pan {
            self.view.pan = constrained;
            self.events.push(CanvasEvent::PanChanged {
                x: constrained.x,
                y: constrained.y,
            });
        }
    }

    /// Resize the viewport.
    pub fn resize_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.apply_pan(self.view.pan);
    }

    // -----------------------------------------------------------------------
    // Documents and backgrounds
    // -----------------------------------------------------------------------

    /// Attach a paginated document. Nothing is shown until a page is loaded.
    pub fn set_document(&mut self, document: Arc<dyn DocumentSource>) {
        tracing::info!(pages = document.page_count(), "Document attached");
        self.document = Some(document);
        self.page_cache.clear();
        self.generation += 1;
    }

    /// Pages in the attached document.
    #[must_use]
    pub fn document_page_count(&self) -> usize {
        self.document.as_ref().map_or(0, |d| d.page_count())
    }

    /// Show a document page as the background, rendering it through the
    /// page cache. Neighbouring pages are prefetched after a delay.
    ///
    /// A missing document or page leaves an empty background and returns
    /// false.
    pub fn load_background_document_page(&mut self, index: usize) -> bool {
        self.generation += 1;
        self.prefetch.disarm();
        let Some(document) = self.document.clone() else {
            tracing::warn!(page = index, "No document attached, background cleared");
            self.show_no_background();
            return false;
        };
        match self.page_cache.get_or_render(document.as_ref(), index) {
            Ok(bitmap) => {
                self.show_document_page(document.as_ref(), index, bitmap);
                self.prefetch
                    .arm(Instant::now(), self.config.prefetch_delay());
                true
            }
            Err(e) => {
                tracing::warn!(page = index, "Document page unavailable: {e}");
                self.show_no_background();
                false
            }
        }
    }

    /// Show a fast low-DPI render of a page while the full render is pending.
    ///
    /// Cached pages are shown immediately. Otherwise the preview is rendered
    /// in the background and shown on a later tick, unless the user has
    /// navigated elsewhere by then. Previews never enter the page cache.
    pub fn request_page_preview(&mut self, index: usize) {
        let Some(document) = self.document.clone() else {
            return;
        };
        if index >= document.page_count() {
            tracing::warn!(page = index, "Preview requested for missing page");
            return;
        }
        self.generation += 1;
        if let Some(bitmap) = self.page_cache.get(index) {
            self.show_document_page(document.as_ref(), index, bitmap);
            return;
        }
        let (preview_dpi, render_dpi) = (self.config.preview_dpi, self.config.render_dpi);
        self.tasks.spawn(self.generation, index, move || {
            render_preview(document.as_ref(), index, preview_dpi, render_dpi)
                .map(TaskResult::Preview)
        });
    }

    /// Detach the document and clear its background.
    pub fn clear_background_document(&mut self) {
        if self.document.take().is_some() {
            tracing::info!("Document detached");
        }
        self.page_cache.clear();
        self.prefetch.disarm();
        self.generation += 1;
        self.show_no_background();
    }

    /// Show a fill colour, optionally ruled, behind the ink.
    pub fn set_background_pattern(&mut self, style: PatternStyle, color: Rgba, density: u32) {
        self.text.set_page_content(Vec::new(), Vec::new());
        self.background = Background::SolidPattern {
            style,
            color,
            density,
        };
    }

    /// Show a pattern with the configured page colour and density.
    pub fn set_default_background_pattern(&mut self, style: PatternStyle) {
        self.set_background_pattern(style, self.config.page_color, self.config.background_density);
    }

    /// Show an encoded image behind the ink. The page grows to fit it.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be decoded or the page cannot grow.
    pub fn set_background_image(&mut self, data: &[u8]) -> RenderResult<()> {
        let image = decode_image(data)?;
        self.buffer.fit_to(image.width(), image.height())?;
        self.text.set_page_content(Vec::new(), Vec::new());
        self.background = Background::StaticImage(Arc::new(image));
        Ok(())
    }

    fn show_document_page(
        &mut self,
        document: &dyn DocumentSource,
        index: usize,
        bitmap: Arc<Pixmap>,
    ) {
        if let Err(e) = self.buffer.fit_to(bitmap.width(), bitmap.height()) {
            tracing::warn!("Stroke buffer could not grow to page size: {e}");
        }
        self.text
            .set_page_content(document.text_boxes(index), document.links(index));
        self.background = Background::DocumentPage { index, bitmap };
        self.apply_pan(self.view.pan);
    }

    fn show_no_background(&mut self) {
        self.text.set_page_content(Vec::new(), Vec::new());
        self.background = Background::None;
    }

    fn document_mapping(&self) -> Option<DocumentMapping> {
        let index = self.background.document_page()?;
        let native = self.document.as_ref()?.page_size(index)?;
        let (width, height) = self.background.bitmap_size()?;
        Some(DocumentMapping {
            transform: self.transform(),
            scale: DocumentScale::new(native, Size::from_pixels(width, height)),
        })
    }

    // -----------------------------------------------------------------------
    // Page rasters
    // -----------------------------------------------------------------------

    /// Replace the ink with an encoded raster. Any selection or stroke in
    /// progress is dropped and the page is marked clean.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded.
    pub fn load_page_raster(&mut self, data: &[u8]) -> RenderResult<()> {
        let image = decode_image(data)?;
        self.draw.abort();
        self.selection = SelectionController::new();
        self.buffer.replace(&image)?;
        self.raster_cache
            .insert(self.current_page, Arc::new(image));
        Ok(())
    }

    /// Encode the ink (including any floating selection) as PNG and mark the
    /// page clean.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn save_page_raster(&mut self) -> RenderResult<Vec<u8>> {
        let png = encode_png(&self.page_snapshot()?)?;
        self.buffer.mark_clean();
        Ok(png)
    }

    fn page_snapshot(&self) -> RenderResult<Pixmap> {
        let mut snapshot = self.buffer.snapshot()?;
        if let Some(floating) = self.selection.floating() {
            let (x, y) = floating.rect.top_left().round();
            blit_over(&mut snapshot, floating.raster, x, y);
        }
        Ok(snapshot)
    }

    /// Save the current page to the store in the background if it has
    /// unsaved changes. Returns whether a save was dispatched.
    ///
    /// The raster is copied at dispatch, so later edits never leak into the
    /// file. Each save carries a revision and the store never lets an older
    /// revision replace a newer one, whatever order the jobs finish in.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the page cannot be copied.
    pub fn save_current_page(&mut self) -> RenderResult<bool> {
        let store = self
            .store
            .clone()
            .ok_or_else(|| RenderError::Resource("No page store attached".to_string()))?;
        if !self.buffer.is_edited() {
            return Ok(false);
        }
        let snapshot = Arc::new(self.page_snapshot()?);
        self.raster_cache
            .insert(self.current_page, Arc::clone(&snapshot));
        self.buffer.mark_clean();

        self.save_revision += 1;
        let revision = self.save_revision;
        let key = PageKey::new(self.notebook, self.current_page);
        self.tasks.spawn(self.generation, self.current_page, move || {
            let png = encode_png(&snapshot)?;
            Ok(store
                .save_revision(key, revision, &png)?
                .map_or(TaskResult::Superseded, TaskResult::Saved))
        });
        Ok(true)
    }

    /// Export the current page with its background flattened in.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the page cannot be copied.
    pub fn export_annotated(&mut self) -> RenderResult<()> {
        let store = self
            .store
            .clone()
            .ok_or_else(|| RenderError::Resource("No page store attached".to_string()))?;
        let ink = self.page_snapshot()?;
        let flat = flatten_page(
            &self.background,
            Some(&ink),
            self.buffer.size(),
            self.config.page_color,
            self.view.device_pixel_ratio,
        )?;
        let key = PageKey::new(self.notebook, self.current_page);
        self.tasks.spawn(self.generation, self.current_page, move || {
            let png = encode_png(&flat)?;
            store.save_annotated(key, &png).map(TaskResult::Exported)
        });
        Ok(())
    }

    /// Move to another page: save the current one if edited, load the new
    /// page's ink and show its document page if a document is attached.
    pub fn switch_page(&mut self, index: usize) {
        self.draw.abort();
        if self.selection.has_selection() {
            self.commit_selection();
        } else if self.selection.is_lassoing() {
            self.cancel_selection();
        }
        if self.store.is_some() {
            if let Err(e) = self.save_current_page() {
                tracing::warn!(page = self.current_page, "Page could not be saved: {e}");
            }
        }

        tracing::info!(from = self.current_page, to = index, "Switching page");
        self.current_page = index;
        self.generation += 1;
        self.load_stored_raster(index);

        if self.document.is_some() {
            self.load_background_document_page(index);
        }
    }

    fn load_stored_raster(&mut self, index: usize) {
        if let Some(cached) = self.raster_cache.get(&index).cloned() {
            if let Err(e) = self.buffer.replace(&cached) {
                tracing::warn!(page = index, "Cached raster could not be restored: {e}");
            }
            return;
        }
        self.buffer.clear();
        self.buffer.mark_clean();
        let Some(store) = &self.store else {
            return;
        };
        let key = PageKey::new(self.notebook, index);
        let loaded = store
            .load(key)
            .and_then(|bytes| bytes.map(|b| decode_image(&b)).transpose());
        match loaded {
            Ok(Some(image)) => {
                if let Err(e) = self.buffer.replace(&image) {
                    tracing::warn!(page = index, "Stored raster could not be restored: {e}");
                    return;
                }
                self.raster_cache.insert(index, Arc::new(image));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(page = index, "Stored raster unreadable: {e}"),
        }
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Switch to the rope tool, putting back any floating selection.
    pub fn begin_selection(&mut self) {
        self.draw.abort();
        if self.selection.has_selection() {
            self.cancel_selection();
        }
        self.tools.set_rope_select_mode(true);
    }

    /// Stamp the floating selection where it is.
    pub fn commit_selection(&mut self) -> Option<IntRect> {
        let transform = self.transform();
        let was_edited = self.buffer.is_edited();
        let dirty = self.selection.commit(&transform, &mut self.buffer);
        self.note_edit(was_edited);
        dirty
    }

    /// Put the floating selection (or abandon the lasso) back.
    pub fn cancel_selection(&mut self) -> Option<IntRect> {
        let transform = self.transform();
        let was_edited = self.buffer.is_edited();
        let dirty = self.selection.cancel(&transform, &mut self.buffer);
        self.note_edit(was_edited);
        dirty
    }

    /// Discard the floating selection.
    pub fn delete_selection(&mut self) -> Option<IntRect> {
        let transform = self.transform();
        let was_edited = self.buffer.is_edited();
        let dirty = self.selection.delete(&transform, &mut self.buffer);
        self.note_edit(was_edited);
        dirty
    }

    /// Leave a copy of the floating selection in place and float it beside.
    pub fn duplicate_selection(&mut self) -> Option<IntRect> {
        let transform = self.transform();
        let was_edited = self.buffer.is_edited();
        let dirty = self.selection.duplicate(&transform, &mut self.buffer);
        self.note_edit(was_edited);
        dirty
    }

    fn note_edit(&mut self, was_edited: bool) {
        if was_edited || !self.buffer.is_edited() {
            return;
        }
        if self.raster_cache.remove(&self.current_page).is_some() {
            tracing::debug!(page = self.current_page, "Raster cache entry invalidated");
        }
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Handle a pointer event now. See [`Self::handle_pointer_at`].
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> Option<IntRect> {
        self.handle_pointer_at(event, Instant::now())
    }

    /// Handle a stylus, eraser-tip or mouse event at `now`. Returns the
    /// view-space region to repaint.
    ///
    /// Routing, first match wins: text selection (when enabled over a
    /// document page), mouse (ignored), rope tool, drawing. An eraser tip
    /// erases for the duration of its stroke whatever tool is selected.
    pub fn handle_pointer_at(&mut self, event: &PointerEvent, now: Instant) -> Option<IntRect> {
        if self.text_selection_enabled {
            if let Some(mapping) = self.document_mapping() {
                return self.handle_text_pointer(event, now, &mapping);
            }
        }
        if event.kind == PointerKind::Mouse {
            return None;
        }
        let was_edited = self.buffer.is_edited();
        let dirty = if self.tools.current().rope_select_mode() {
            self.handle_rope_pointer(event, now)
        } else {
            self.handle_draw_pointer(event, now)
        };
        self.note_edit(was_edited);
        dirty
    }

    fn handle_text_pointer(
        &mut self,
        event: &PointerEvent,
        now: Instant,
        mapping: &DocumentMapping,
    ) -> Option<IntRect> {
        match event.phase {
            PointerPhase::Press => self.text.begin(event.position),
            PointerPhase::Move => self.text.update(event.position, now),
            PointerPhase::Release => match self.text.finish(event.position, mapping) {
                TextSelectionOutcome::Text(text) => {
                    tracing::debug!(chars = text.len(), "Text selected");
                    self.events.push(CanvasEvent::TextSelected { text });
                }
                TextSelectionOutcome::Link(page_index) => {
                    tracing::debug!(page = page_index, "Background link activated");
                    self.events
                        .push(CanvasEvent::BackgroundLinkActivated { page_index });
                }
                TextSelectionOutcome::Nothing => {}
            },
        }
        Some(self.viewport_rect())
    }

    fn handle_rope_pointer(&mut self, event: &PointerEvent, now: Instant) -> Option<IntRect> {
        let transform = self.transform();
        match event.phase {
            PointerPhase::Press => {
                match self
                    .selection
                    .press(event.position, &transform, &mut self.buffer)
                {
                    SelectionPress::Cancelled(dirty) => Some(dirty),
                    SelectionPress::Lasso | SelectionPress::Move => None,
                }
            }
            PointerPhase::Move => self.selection.move_to(event.position, &transform),
            PointerPhase::Release => {
                match self
                    .selection
                    .release(event.position, &transform, &mut self.buffer)
                {
                    SelectionRelease::Selected(dirty) => {
                        self.selection_ready
                            .arm(now, self.config.selection_ready_delay());
                        Some(dirty)
                    }
                    SelectionRelease::Discarded(dirty) | SelectionRelease::Committed(dirty) => {
                        Some(dirty)
                    }
                    SelectionRelease::Ignored => None,
                }
            }
        }
    }

    fn handle_draw_pointer(&mut self, event: &PointerEvent, now: Instant) -> Option<IntRect> {
        let pressure = event.clamped_pressure();
        let transform = self.transform();
        let mut surface = Surface {
            buffer: &mut self.buffer,
            transform,
            device_pixel_ratio: self.view.device_pixel_ratio,
        };
        match event.phase {
            PointerPhase::Press => {
                let tool = self
                    .tools
                    .stroke_snapshot(event.kind == PointerKind::Eraser);
                self.draw.press(tool, event.position, pressure);
                None
            }
            PointerPhase::Move => self
                .draw
                .move_to(&mut surface, event.position, pressure, now),
            PointerPhase::Release => self
                .draw
                .release(&mut surface, event.position, pressure, now),
        }
    }

    /// Handle a touch event. Touch never draws; it only pans and zooms, and
    /// only while touch gestures are enabled.
    pub fn handle_touch(&mut self, event: &TouchEvent) {
        let canvas = self.buffer.size();
        let emitted = self
            .gestures
            .process(event, &mut self.view, self.viewport, canvas);
        self.events.extend(emitted);
    }

    // -----------------------------------------------------------------------
    // Timing and background results
    // -----------------------------------------------------------------------

    /// Run timers and apply finished background work now.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Run timers due at `now` and apply finished background work.
    pub fn tick_at(&mut self, now: Instant) {
        if let Some(mapping) = self.document_mapping() {
            self.text.tick(now, &mapping);
        }

        if self.selection_ready.fire(now)
            && self.selection.has_selection()
            && !self.selection.is_moving()
        {
            if let Some(anchor) = self.selection.anchor(&self.transform()) {
                self.events.push(CanvasEvent::SelectionReady { anchor });
            }
        }

        if self.prefetch.fire(now) {
            self.dispatch_prefetch();
        }

        for outcome in self.tasks.drain() {
            self.apply_outcome(outcome);
        }
    }

    /// Wait for every background job and apply the results.
    pub async fn settle(&mut self) {
        for outcome in self.tasks.settle().await {
            self.apply_outcome(outcome);
        }
    }

    fn dispatch_prefetch(&mut self) {
        let (Some(document), Some(index)) = (self.document.clone(), self.background.document_page())
        else {
            return;
        };
        let render_dpi = self.page_cache.render_dpi();
        for neighbour in self
            .page_cache
            .adjacent_missing(index, document.page_count())
        {
            tracing::debug!(page = neighbour, "Prefetching page");
            let document = Arc::clone(&document);
            self.tasks.spawn(self.generation, neighbour, move || {
                document
                    .render_page(neighbour, render_dpi)
                    .map(TaskResult::Prefetched)
            });
        }
    }

    fn apply_outcome(&mut self, outcome: TaskOutcome) {
        let TaskOutcome {
            generation,
            page,
            result,
        } = outcome;
        let current = generation == self.generation;
        match result {
            TaskResult::Preview(bitmap) if current => {
                if let Some(document) = self.document.clone() {
                    self.show_document_page(document.as_ref(), page, Arc::new(bitmap));
                }
            }
            TaskResult::Prefetched(bitmap) if current => {
                self.page_cache.insert(page, Arc::new(bitmap));
            }
            TaskResult::Preview(_) | TaskResult::Prefetched(_) => {
                tracing::debug!(page, generation, "Dropping stale render");
            }
            TaskResult::Saved(path) => {
                tracing::debug!(page, path = %path.display(), "Save completed");
            }
            TaskResult::Superseded => {
                tracing::debug!(page, "Save superseded by a newer one");
            }
            TaskResult::Exported(path) => {
                tracing::debug!(page, path = %path.display(), "Export completed");
            }
            TaskResult::Failed(error) => {
                tracing::warn!(page, "Background job failed: {error}");
            }
        }
    }

    /// Take the queued notifications.
    pub fn drain_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Rendering and diagnostics
    // -----------------------------------------------------------------------

    /// Composite the current frame at viewport size.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be allocated.
    pub fn render_view(&self) -> RenderResult<Pixmap> {
        let mapping = self.document_mapping();
        let highlights = mapping
            .map(|m| self.text.highlight_rects(&m))
            .unwrap_or_default();
        render_view(&ViewLayers {
            transform: self.transform(),
            window_color: self.config.window_color,
            page_color: self.config.page_color,
            background: &self.background,
            device_pixel_ratio: self.view.device_pixel_ratio,
            ink: self.buffer.pixmap(),
            preview: self.draw.preview(),
            lasso: self.selection.lasso_path(),
            floating: self.selection.floating(),
            text_rect: self.text.selection_rect(),
            highlights: &highlights,
        })
    }

    /// Start counting processed draw operations.
    pub fn start_benchmark(&mut self) {
        self.draw.start_benchmark();
    }

    /// Stop counting processed draw operations.
    pub fn stop_benchmark(&mut self) {
        self.draw.stop_benchmark();
    }

    /// Draw operations processed in the second before `now`.
    pub fn processed_rate(&mut self, now: Instant) -> usize {
        self.draw.processed_rate(now)
    }

    fn viewport_rect(&self) -> IntRect {
        Rect::new(0.0, 0.0, self.viewport.width, self.viewport.height).round_out()
    }
}
