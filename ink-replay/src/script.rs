//! Replay scripts: a JSON list of input steps applied to an [`InkCanvas`].
//!
//! ```json
//! {
//!   "viewport": { "width": 800, "height": 600 },
//!   "steps": [
//!     { "op": "thickness", "value": 5 },
//!     { "op": "straight_line", "enabled": true },
//!     { "op": "pointer", "phase": "press", "x": 100, "y": 100 },
//!     { "op": "pointer", "phase": "release", "x": 300, "y": 100 }
//!   ]
//! }
//! ```
//!
//! Time only advances through `wait` steps, so replays are deterministic.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use ink_core::{
    CanvasConfig, CanvasEvent, Point, PointerEvent, PointerKind, PointerPhase, Rgba, Size,
    ToolKind, TouchEvent, TouchPhase, TouchPoint,
};
use ink_renderer::{InkCanvas, PatternStyle};
use serde::{Deserialize, Serialize};

/// A complete replay script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Canvas configuration; defaults apply to missing fields.
    #[serde(default)]
    pub config: CanvasConfig,
    /// Viewport size in logical pixels.
    #[serde(default = "default_viewport")]
    pub viewport: Size,
    /// Steps in order.
    pub steps: Vec<Step>,
}

fn default_viewport() -> Size {
    Size::new(800.0, 600.0)
}

fn full_pressure() -> f64 {
    1.0
}

/// One input step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Stylus, eraser-tip or mouse event.
    Pointer {
        /// Event phase.
        phase: PointerPhase,
        /// View x.
        x: f64,
        /// View y.
        y: f64,
        /// Pressure in `[0, 1]`.
        #[serde(default = "full_pressure")]
        pressure: f64,
        /// Originating device.
        #[serde(default)]
        kind: PointerKind,
    },
    /// Touch event with every current contact as `[x, y]`.
    Touch {
        /// Event phase.
        phase: TouchPhase,
        /// Contacts; ids follow their order.
        points: Vec<[f64; 2]>,
    },
    /// Select a tool.
    Tool {
        /// Tool kind.
        kind: ToolKind,
    },
    /// Set the ink colour.
    Color {
        /// New colour.
        color: Rgba,
    },
    /// Set the current tool's thickness.
    Thickness {
        /// New thickness.
        value: f64,
    },
    /// Toggle straight-line mode.
    StraightLine {
        /// Whether the mode is on.
        enabled: bool,
    },
    /// Toggle the rope tool.
    Rope {
        /// Whether the mode is on.
        enabled: bool,
    },
    /// Toggle text selection.
    TextSelection {
        /// Whether the mode is on.
        enabled: bool,
    },
    /// Toggle touch gestures.
    TouchGestures {
        /// Whether gestures are on.
        enabled: bool,
    },
    /// Set the zoom.
    Zoom {
        /// Zoom in percent.
        percent: i32,
    },
    /// Set the pan offset.
    Pan {
        /// Horizontal pan.
        x: f64,
        /// Vertical pan.
        y: f64,
    },
    /// Stamp the floating selection.
    CommitSelection,
    /// Put the floating selection back.
    CancelSelection,
    /// Discard the floating selection.
    DeleteSelection,
    /// Duplicate the floating selection.
    DuplicateSelection,
    /// Show a pattern background in the page colour.
    Pattern {
        /// Ruling.
        style: PatternStyle,
    },
    /// Show an image file behind the ink.
    BackgroundImage {
        /// Image path, relative to the script.
        path: PathBuf,
    },
    /// Replace the ink with a PNG file.
    LoadRaster {
        /// PNG path, relative to the script.
        path: PathBuf,
    },
    /// Advance the replay clock and run due timers.
    Wait {
        /// Milliseconds to advance.
        ms: u64,
    },
}

impl Script {
    /// Parse a script from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a script.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Invalid replay script")
    }
}

/// Applies steps to a canvas on a virtual clock.
#[derive(Debug)]
pub struct Replayer {
    canvas: InkCanvas,
    clock: Instant,
    base_dir: PathBuf,
    events: Vec<CanvasEvent>,
}

impl Replayer {
    /// Create a canvas for `script`; relative paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(script: &Script, base_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let canvas = InkCanvas::new(script.config.clone(), script.viewport)
            .context("Failed to create canvas")?;
        Ok(Self {
            canvas,
            clock: Instant::now(),
            base_dir: base_dir.into(),
            events: Vec::new(),
        })
    }

    /// The canvas being driven.
    #[must_use]
    pub fn canvas(&self) -> &InkCanvas {
        &self.canvas
    }

    /// Mutable access to the canvas.
    pub fn canvas_mut(&mut self) -> &mut InkCanvas {
        &mut self.canvas
    }

    /// Every event emitted so far.
    #[must_use]
    pub fn events(&self) -> &[CanvasEvent] {
        &self.events
    }

    /// Apply every step in order.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first step that failed.
    pub fn run(&mut self, steps: &[Step]) -> anyhow::Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.apply(step)
                .with_context(|| format!("Step {i} ({step:?}) failed"))?;
        }
        self.canvas.tick_at(self.clock);
        self.collect_events();
        Ok(())
    }

    fn apply(&mut self, step: &Step) -> anyhow::Result<()> {
        let canvas = &mut self.canvas;
        match step {
            Step::Pointer {
                phase,
                x,
                y,
                pressure,
                kind,
            } => {
                let event =
                    PointerEvent::stylus(*phase, Point::new(*x, *y), *pressure).with_kind(*kind);
                canvas.handle_pointer_at(&event, self.clock);
            }
            Step::Touch { phase, points } => {
                let touches = points
                    .iter()
                    .zip(0u32..)
                    .map(|(&[x, y], id)| TouchPoint::new(id, x, y))
                    .collect();
                canvas.handle_touch(&TouchEvent::new(*phase, touches));
            }
            Step::Tool { kind } => canvas.set_tool(*kind),
            Step::Color { color } => canvas.set_color(*color),
            Step::Thickness { value } => canvas.set_thickness(*value),
            Step::StraightLine { enabled } => canvas.set_straight_line_mode(*enabled),
            Step::Rope { enabled } => canvas.set_rope_tool_mode(*enabled),
            Step::TextSelection { enabled } => canvas.set_text_selection_enabled(*enabled),
            Step::TouchGestures { enabled } => canvas.set_touch_gestures_enabled(*enabled),
            Step::Zoom { percent } => canvas.set_zoom(*percent),
            Step::Pan { x, y } => canvas.set_pan(*x, *y),
            Step::CommitSelection => {
                canvas.commit_selection();
            }
            Step::CancelSelection => {
                canvas.cancel_selection();
            }
            Step::DeleteSelection => {
                canvas.delete_selection();
            }
            Step::DuplicateSelection => {
                canvas.duplicate_selection();
            }
            Step::Pattern { style } => canvas.set_default_background_pattern(*style),
            Step::BackgroundImage { path } => {
                let bytes = read(&self.base_dir, path)?;
                self.canvas.set_background_image(&bytes)?;
            }
            Step::LoadRaster { path } => {
                let bytes = read(&self.base_dir, path)?;
                self.canvas.load_page_raster(&bytes)?;
            }
            Step::Wait { ms } => {
                self.clock += Duration::from_millis(*ms);
                self.canvas.tick_at(self.clock);
            }
        }
        self.collect_events();
        Ok(())
    }

    fn collect_events(&mut self) {
        for event in self.canvas.drain_events() {
            tracing::debug!(?event, "Canvas event");
            self.events.push(event);
        }
    }
}

fn read(base_dir: &Path, path: &Path) -> anyhow::Result<Vec<u8>> {
    let full = base_dir.join(path);
    std::fs::read(&full).with_context(|| format!("Failed to read {}", full.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"{
        "config": { "blank_page_width": 400, "blank_page_height": 300 },
        "viewport": { "width": 400, "height": 300 },
        "steps": [
            { "op": "thickness", "value": 5 },
            { "op": "straight_line", "enabled": true },
            { "op": "pointer", "phase": "press", "x": 50, "y": 100 },
            { "op": "pointer", "phase": "move", "x": 120, "y": 130 },
            { "op": "pointer", "phase": "release", "x": 250, "y": 100 },
            { "op": "zoom", "percent": 150 }
        ]
    }"#;

    #[test]
    fn test_parse_and_run_line_script() {
        let script = Script::from_json(LINE).expect("script");
        assert_eq!(script.steps.len(), 6);
        let mut replay = Replayer::new(&script, ".").expect("replayer");
        replay.run(&script.steps).expect("run");

        let canvas = replay.canvas();
        assert!(canvas.is_edited());
        assert_eq!(canvas.buffer().pixel(150, 100), Some([0, 0, 0, 255]));
        assert!(replay
            .events()
            .contains(&CanvasEvent::ZoomChanged { percent: 150 }));
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let err = Script::from_json(r#"{ "steps": [ { "op": "explode" } ] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_file_names_the_step() {
        let script =
            Script::from_json(r#"{ "steps": [ { "op": "load_raster", "path": "nope.png" } ] }"#)
                .expect("script");
        let dir = tempfile::tempdir().expect("tempdir");
        let mut replay = Replayer::new(&script, dir.path()).expect("replayer");
        let err = replay.run(&script.steps).expect_err("missing file");
        assert!(format!("{err:#}").contains("nope.png"));
    }

    #[test]
    fn test_wait_fires_selection_ready() {
        let script = Script::from_json(
            r#"{
            "steps": [
                { "op": "rope", "enabled": true },
                { "op": "pointer", "phase": "press", "x": 10, "y": 10 },
                { "op": "pointer", "phase": "move", "x": 60, "y": 10 },
                { "op": "pointer", "phase": "move", "x": 60, "y": 60 },
                { "op": "pointer", "phase": "release", "x": 10, "y": 60 },
                { "op": "wait", "ms": 600 }
            ]
        }"#,
        )
        .expect("script");
        let mut replay = Replayer::new(&script, ".").expect("replayer");
        replay.run(&script.steps).expect("run");
        assert!(replay
            .events()
            .iter()
            .any(|e| matches!(e, CanvasEvent::SelectionReady { .. })));
    }
}
