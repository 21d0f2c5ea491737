//! Page backgrounds drawn beneath the ink.

use std::sync::Arc;

use ink_core::{Rgba, Size};
use serde::{Deserialize, Serialize};
use tiny_skia::{
    FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect as SkiaRect, Stroke, Transform,
};

use crate::raster::to_skia_color;

/// Colour of grid and ruled lines.
pub const PATTERN_LINE_COLOR: Rgba = Rgba::new(100, 100, 100, 100);

/// Ruling of a pattern background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStyle {
    /// Plain fill.
    #[default]
    Plain,
    /// Horizontal and vertical lines.
    Grid,
    /// Horizontal lines only.
    Lines,
}

/// What is drawn under the ink.
#[derive(Debug, Clone, Default)]
pub enum Background {
    /// Nothing; the page shows as transparent.
    #[default]
    None,
    /// A fill colour, optionally ruled.
    SolidPattern {
        /// Ruling.
        style: PatternStyle,
        /// Fill colour.
        color: Rgba,
        /// Line spacing in logical pixels.
        density: u32,
    },
    /// A fixed image.
    StaticImage(Arc<Pixmap>),
    /// A rendered page of the loaded document.
    DocumentPage {
        /// Zero-based page index.
        index: usize,
        /// Rendered page bitmap.
        bitmap: Arc<Pixmap>,
    },
}

impl Background {
    /// Bitmap backing the background, if any.
    #[must_use]
    pub fn bitmap(&self) -> Option<&Arc<Pixmap>> {
        match self {
            Self::StaticImage(bitmap) | Self::DocumentPage { bitmap, .. } => Some(bitmap),
            Self::None | Self::SolidPattern { .. } => None,
        }
    }

    /// Pixel extent of a bitmap background.
    #[must_use]
    pub fn bitmap_size(&self) -> Option<(u32, u32)> {
        self.bitmap().map(|b| (b.width(), b.height()))
    }

    /// Document page shown, if any.
    #[must_use]
    pub const fn document_page(&self) -> Option<usize> {
        match self {
            Self::DocumentPage { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Paint the background of a `page`-sized buffer into `target`.
    ///
    /// `transform` maps buffer space into the target. Pattern spacing is
    /// `density × device_pixel_ratio` buffer pixels.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn paint(
        &self,
        target: &mut Pixmap,
        page: Size,
        device_pixel_ratio: f64,
        transform: Transform,
    ) {
        match self {
            Self::None => {}
            Self::StaticImage(bitmap) | Self::DocumentPage { bitmap, .. } => {
                let bitmap: &Pixmap = bitmap;
                target.draw_pixmap(
                    0,
                    0,
                    bitmap.as_ref(),
                    &PixmapPaint {
                        quality: FilterQuality::Bilinear,
                        ..PixmapPaint::default()
                    },
                    transform,
                    None,
                );
            }
            Self::SolidPattern {
                style,
                color,
                density,
            } => {
                let (w, h) = (page.width as f32, page.height as f32);
                let mut fill = Paint::default();
                fill.set_color(to_skia_color(*color));
                if let Some(rect) = SkiaRect::from_xywh(0.0, 0.0, w, h) {
                    target.fill_rect(rect, &fill, transform, None);
                }

                let spacing = (f64::from(*density) * device_pixel_ratio.max(1.0)) as f32;
                if *style == PatternStyle::Plain || spacing < 1.0 {
                    return;
                }
                let mut pb = PathBuilder::new();
                let mut y = 0.0;
                while y < h {
                    pb.move_to(0.0, y);
                    pb.line_to(w, y);
                    y += spacing;
                }
                if *style == PatternStyle::Grid {
                    let mut x = 0.0;
                    while x < w {
                        pb.move_to(x, 0.0);
                        pb.line_to(x, h);
                        x += spacing;
                    }
                }
                if let Some(path) = pb.finish() {
                    let mut line = Paint::default();
                    line.set_color(to_skia_color(PATTERN_LINE_COLOR));
                    line.anti_alias = true;
                    let stroke = Stroke {
                        width: 1.0,
                        ..Stroke::default()
                    };
                    target.stroke_path(&path, &line, &stroke, transform, None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{new_pixmap, pixel_bytes};

    #[test]
    fn test_pattern_fills_and_rules() {
        let mut target = new_pixmap(100, 100).expect("pixmap");
        let bg = Background::SolidPattern {
            style: PatternStyle::Lines,
            color: Rgba::WHITE,
            density: 40,
        };
        bg.paint(&mut target, Size::new(100.0, 100.0), 1.0, Transform::identity());
        assert_eq!(pixel_bytes(&target, 10, 20), Some([255, 255, 255, 255]));
        // Ruled rows at y = 0, 40, 80 darken the white fill.
        let ruled = pixel_bytes(&target, 10, 40).expect("pixel");
        assert!(ruled[0] < 255);
        // Lines style has no vertical rules.
        assert_eq!(pixel_bytes(&target, 40, 20), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_grid_adds_vertical_rules() {
        let mut target = new_pixmap(100, 100).expect("pixmap");
        let bg = Background::SolidPattern {
            style: PatternStyle::Grid,
            color: Rgba::WHITE,
            density: 40,
        };
        bg.paint(&mut target, Size::new(100.0, 100.0), 1.0, Transform::identity());
        assert!(pixel_bytes(&target, 40, 20).expect("pixel")[0] < 255);
    }

    #[test]
    fn test_bitmap_accessors() {
        let bitmap = Arc::new(new_pixmap(30, 20).expect("pixmap"));
        let bg = Background::DocumentPage { index: 3, bitmap };
        assert_eq!(bg.bitmap_size(), Some((30, 20)));
        assert_eq!(bg.document_page(), Some(3));
        assert_eq!(Background::None.bitmap_size(), None);
    }
}
