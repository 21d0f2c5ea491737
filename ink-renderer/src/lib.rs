//! # Ink Canvas Renderer
//!
//! Pixel side of the ink canvas: stroke rasterising, page backgrounds,
//! lasso selection, the document page cache, persistence and the
//! [`InkCanvas`] façade that ties them to `ink-core`'s input logic.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 InkCanvas                   │
//! ├──────────────┬──────────────┬───────────────┤
//! │ DrawEngine   │ Selection    │ PageCache     │
//! │ StrokeBuffer │ Compositor   │ PageStore     │
//! ├──────────────┴──────────────┴───────────────┤
//! │        tiny-skia rasteriser + tokio         │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod background;
pub mod canvas;
pub mod compositor;
pub mod document;
pub mod draw;
pub mod error;
pub mod page_cache;
pub mod persist;
pub mod raster;
pub mod selection;
pub mod stroke_buffer;
pub mod tasks;

pub use background::{Background, PatternStyle};
pub use canvas::InkCanvas;
pub use compositor::{flatten_page, render_view, ViewLayers};
pub use document::{DocumentSource, ImageDocument, ImagePage};
pub use draw::{draw_segment, DrawEngine, StraightLinePreview, Surface};
pub use error::{RenderError, RenderResult};
pub use page_cache::{render_preview, CacheStats, FifoCache, PageCache};
pub use persist::{NotebookId, PageKey, PageStore};
pub use selection::{SelectionController, SelectionMode};
pub use stroke_buffer::StrokeBuffer;
pub use tasks::{BackgroundTasks, TaskOutcome, TaskResult};

/// Renderer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
