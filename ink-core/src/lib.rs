//! # Ink Canvas Core
//!
//! Geometry and input logic for a pannable, zoomable ink canvas.
//! Nothing in this crate touches pixels; rasterising lives in `ink-renderer`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  ink-core                   │
//! ├─────────────────────────────────────────────┤
//! │  Transform       │  Input                   │
//! │  - View state    │  - Pointer events        │
//! │  - View↔buffer   │  - Touch gestures        │
//! │  - Buffer↔doc    │  - Tool snapshots        │
//! ├─────────────────────────────────────────────┤
//! │  Text overlay    │  Config                  │
//! │  - Hit testing   │  - Defaults              │
//! │  - Coalescing    │  - Validation            │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod gesture;
pub mod text_overlay;
pub mod throttle;
pub mod tool;
pub mod transform;

pub use config::CanvasConfig;
pub use error::{CoreError, CoreResult};
pub use event::{
    CanvasEvent, PointerEvent, PointerKind, PointerPhase, TouchEvent, TouchPhase, TouchPoint,
};
pub use geometry::{polygon_contains, IntRect, Point, Rect, Size};
pub use gesture::GestureInterpreter;
pub use text_overlay::{
    DocumentMapping, PageLink, TextBox, TextOverlayMapper, TextSelectionOutcome,
};
pub use throttle::{CoalescingTimer, Deadline};
pub use tool::{Rgba, StrokePhase, ToolKind, ToolSettings, ToolState};
pub use transform::{CoordinateTransform, DocumentScale, ViewState, MAX_ZOOM, MIN_ZOOM};

/// Ink core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
