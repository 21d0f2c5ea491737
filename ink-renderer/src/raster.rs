//! Raster helpers: allocation, codecs, scaling and exact pixel copies.
//!
//! Rasters are `tiny_skia::Pixmap`s, which store premultiplied RGBA. The
//! codec boundary converts to and from straight alpha because that is what
//! PNG stores. Pixel copies here work on raw bytes so that moving ink
//! around is lossless.

use image::ImageEncoder;
use ink_core::{IntRect, Rgba};
use tiny_skia::{FilterQuality, IntSize, Pixmap, PixmapPaint, Transform};

use crate::error::{RenderError, RenderResult};

/// Allocate a transparent raster.
///
/// # Errors
///
/// Returns an error if either dimension is zero or the allocation is too large.
pub fn new_pixmap(width: u32, height: u32) -> RenderResult<Pixmap> {
    Pixmap::new(width, height).ok_or_else(|| {
        RenderError::Resource(format!("Failed to allocate {width}x{height} raster"))
    })
}

/// Convert a straight-alpha colour into tiny-skia's colour type.
#[must_use]
pub fn to_skia_color(color: Rgba) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Decode PNG (or any enabled format) bytes into a premultiplied raster.
///
/// # Errors
///
/// Returns an error if the bytes cannot be decoded.
pub fn decode_image(data: &[u8]) -> RenderResult<Pixmap> {
    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Decode(format!("Failed to decode image: {e}")))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut bytes = rgba.into_raw();
    premultiply_in_place(&mut bytes);

    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| RenderError::Decode(format!("Invalid image size {width}x{height}")))?;
    Pixmap::from_vec(bytes, size)
        .ok_or_else(|| RenderError::Decode("Image data does not match its size".to_string()))
}

/// Encode a raster as PNG.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_png(pixmap: &Pixmap) -> RenderResult<Vec<u8>> {
    let mut rgba = pixmap.data().to_vec();
    demultiply_in_place(&mut rgba);

    let mut buf = std::io::Cursor::new(Vec::new());
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            &rgba,
            pixmap.width(),
            pixmap.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| RenderError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

#[allow(clippy::cast_possible_truncation)]
fn premultiply_in_place(bytes: &mut [u8]) {
    for px in bytes.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn demultiply_in_place(bytes: &mut [u8]) {
    for px in bytes.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Scale a raster by `factor` with bilinear filtering.
///
/// # Errors
///
/// Returns an error if the scaled raster cannot be allocated.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn scale_pixmap(src: &Pixmap, factor: f64) -> RenderResult<Pixmap> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(RenderError::Resource(format!("Invalid scale factor {factor}")));
    }
    let width = (f64::from(src.width()) * factor).round().max(1.0) as u32;
    let height = (f64::from(src.height()) * factor).round().max(1.0) as u32;
    let mut dst = new_pixmap(width, height)?;
    let sx = width as f32 / src.width() as f32;
    let sy = height as f32 / src.height() as f32;
    dst.draw_pixmap(
        0,
        0,
        src.as_ref(),
        &PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        },
        Transform::from_scale(sx, sy),
        None,
    );
    Ok(dst)
}

/// Copy a sub-rectangle of `src` into a new raster of exactly `rect`'s size.
///
/// Parts of `rect` outside `src` come out transparent.
///
/// # Errors
///
/// Returns an error if `rect` is empty.
#[allow(clippy::cast_sign_loss)]
pub fn copy_region(src: &Pixmap, rect: IntRect) -> RenderResult<Pixmap> {
    if rect.is_empty() {
        return Err(RenderError::Resource("Cannot copy an empty region".to_string()));
    }
    let mut dst = new_pixmap(rect.width as u32, rect.height as u32)?;
    let Some(overlap) = rect.intersection(&bounds(src)) else {
        return Ok(dst);
    };
    let row_bytes = overlap.width as usize * 4;
    let src_stride = src.width() as usize * 4;
    let dst_stride = dst.width() as usize * 4;
    let src_data = src.data();
    let dst_data = dst.data_mut();
    for y in 0..overlap.height {
        let sy = (overlap.y + y) as usize;
        let dy = (overlap.y - rect.y + y) as usize;
        let s = sy * src_stride + overlap.x as usize * 4;
        let d = dy * dst_stride + (overlap.x - rect.x) as usize * 4;
        dst_data[d..d + row_bytes].copy_from_slice(&src_data[s..s + row_bytes]);
    }
    Ok(dst)
}

/// Composite `src` over `dst` with its top-left corner at `(x, y)`.
///
/// Uses exact integer source-over on premultiplied bytes, so stamping onto
/// transparent pixels reproduces `src` byte for byte.
#[allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]
pub fn blit_over(dst: &mut Pixmap, src: &Pixmap, x: i32, y: i32) {
    let target = IntRect::new(x, y, src.width() as i32, src.height() as i32);
    let Some(overlap) = target.intersection(&bounds(dst)) else {
        return;
    };
    let src_stride = src.width() as usize * 4;
    let dst_stride = dst.width() as usize * 4;
    let src_data = src.data();
    let dst_data = dst.data_mut();
    for row in 0..overlap.height {
        let sy = (overlap.y - y + row) as usize;
        let dy = (overlap.y + row) as usize;
        for col in 0..overlap.width {
            let sx = (overlap.x - x + col) as usize;
            let dx = (overlap.x + col) as usize;
            let s = &src_data[sy * src_stride + sx * 4..][..4];
            let d = &mut dst_data[dy * dst_stride + dx * 4..][..4];
            let inv = 255 - u16::from(s[3]);
            if inv == 255 {
                continue;
            }
            for (dc, &sc) in d.iter_mut().zip(s) {
                *dc = (u16::from(sc) + (u16::from(*dc) * inv + 127) / 255) as u8;
            }
        }
    }
}

/// Bounds of a raster as an integer rectangle.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn bounds(pixmap: &Pixmap) -> IntRect {
    IntRect::new(0, 0, pixmap.width() as i32, pixmap.height() as i32)
}

/// Premultiplied RGBA bytes of one pixel, `None` when out of bounds.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn pixel_bytes(pixmap: &Pixmap, x: i32, y: i32) -> Option<[u8; 4]> {
    if x < 0 || y < 0 {
        return None;
    }
    let p = pixmap.pixel(x as u32, y as u32)?;
    Some([p.red(), p.green(), p.blue(), p.alpha()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Pixmap {
        let mut p = new_pixmap(width, height).expect("pixmap");
        for px in p.data_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        p
    }

    #[test]
    fn test_new_pixmap_rejects_zero_size() {
        assert!(new_pixmap(0, 10).is_err());
    }

    #[test]
    fn test_png_round_trip_preserves_opaque_pixels() {
        let src = filled(4, 3, [10, 20, 30, 255]);
        let png = encode_png(&src).expect("encode");
        let back = decode_image(&png).expect("decode");
        assert_eq!(back.width(), 4);
        assert_eq!(back.height(), 3);
        assert_eq!(back.data(), src.data());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_image(b"not an image"), Err(RenderError::Decode(_))));
    }

    #[test]
    fn test_copy_region_pads_outside_with_transparent() {
        let src = filled(4, 4, [0, 0, 255, 255]);
        let out = copy_region(&src, IntRect::new(2, 2, 4, 4)).expect("copy");
        assert_eq!(pixel_bytes(&out, 0, 0), Some([0, 0, 255, 255]));
        assert_eq!(pixel_bytes(&out, 3, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_blit_over_transparent_is_exact() {
        let mut dst = new_pixmap(8, 8).expect("pixmap");
        let src = filled(2, 2, [40, 20, 10, 80]);
        blit_over(&mut dst, &src, 3, 5);
        assert_eq!(pixel_bytes(&dst, 3, 5), Some([40, 20, 10, 80]));
        assert_eq!(pixel_bytes(&dst, 2, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_blit_over_clips_at_edges() {
        let mut dst = new_pixmap(4, 4).expect("pixmap");
        let src = filled(3, 3, [255, 255, 255, 255]);
        blit_over(&mut dst, &src, -2, 2);
        assert_eq!(pixel_bytes(&dst, 0, 2), Some([255, 255, 255, 255]));
        assert_eq!(pixel_bytes(&dst, 1, 2), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_scale_pixmap_dimensions() {
        let src = filled(10, 5, [0, 0, 0, 255]);
        let out = scale_pixmap(&src, 3.0).expect("scale");
        assert_eq!((out.width(), out.height()), (30, 15));
        assert!(scale_pixmap(&src, 0.0).is_err());
    }
}
