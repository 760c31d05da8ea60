use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use tracing::{debug, instrument};

use crate::config::PackerConfig;
use crate::definition::DefinitionFile;
use crate::error::{Result, SheetPackerError};
use crate::formats::PixelFormat;
use crate::io::FrameImageSource;
use crate::layout::{Layout, SpritesheetLayout, locate_sprite};
use crate::model::{Rect, SpriteBoundsRect, SpriteId};

const OUTLINE: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Blit `frame` into `canvas` at the placement's sprite rect, then duplicate the
/// frame's edge pixels outward into every margin whose edge flag is set.
///
/// The frame is clipped to the sprite rect; the duplicated edges never leave
/// the placement's margins rect.
pub fn blit_frame(frame: &RgbaImage, canvas: &mut RgbaImage, bounds: &SpriteBoundsRect) {
    let (cw, ch) = canvas.dimensions();
    let dst = bounds.sprite_rect;
    let rw = frame.width().min(dst.w);
    let rh = frame.height().min(dst.h);
    if rw == 0 || rh == 0 {
        return;
    }
    let (dx, dy) = (dst.x, dst.y);

    // main blit
    for yy in 0..rh {
        for xx in 0..rw {
            if dx + xx < cw && dy + yy < ch {
                canvas.put_pixel(dx + xx, dy + yy, *frame.get_pixel(xx, yy));
            }
        }
    }

    let left = if bounds.left_edge_pixel { bounds.left_margin } else { 0 };
    let right = if bounds.right_edge_pixel { bounds.right_margin } else { 0 };
    let top = if bounds.top_edge_pixel { bounds.top_margin } else { 0 };
    let bottom = if bounds.bottom_edge_pixel { bounds.bottom_margin } else { 0 };

    // edges
    for e in 1..=top.min(dy) {
        for xx in 0..rw {
            let p = *frame.get_pixel(xx, 0);
            put_clipped(canvas, dx + xx, dy - e, p);
        }
    }
    for e in 1..=bottom {
        for xx in 0..rw {
            let p = *frame.get_pixel(xx, rh - 1);
            put_clipped(canvas, dx + xx, dy + rh - 1 + e, p);
        }
    }
    for e in 1..=left.min(dx) {
        for yy in 0..rh {
            let p = *frame.get_pixel(0, yy);
            put_clipped(canvas, dx - e, dy + yy, p);
        }
    }
    for e in 1..=right {
        for yy in 0..rh {
            let p = *frame.get_pixel(rw - 1, yy);
            put_clipped(canvas, dx + rw - 1 + e, dy + yy, p);
        }
    }

    // corners take the nearest corner pixel
    let c00 = *frame.get_pixel(0, 0);
    let c10 = *frame.get_pixel(rw - 1, 0);
    let c01 = *frame.get_pixel(0, rh - 1);
    let c11 = *frame.get_pixel(rw - 1, rh - 1);
    for ey in 1..=top.min(dy) {
        for ex in 1..=left.min(dx) {
            put_clipped(canvas, dx - ex, dy - ey, c00);
        }
        for ex in 1..=right {
            put_clipped(canvas, dx + rw - 1 + ex, dy - ey, c10);
        }
    }
    for ey in 1..=bottom {
        for ex in 1..=left.min(dx) {
            put_clipped(canvas, dx - ex, dy + rh - 1 + ey, c01);
        }
        for ex in 1..=right {
            put_clipped(canvas, dx + rw - 1 + ex, dy + rh - 1 + ey, c11);
        }
    }
}

fn put_clipped(canvas: &mut RgbaImage, x: u32, y: u32, p: Rgba<u8>) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, p);
    }
}

/// 1px outline along the border of `rect`.
pub fn draw_outline(canvas: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    if rect.w == 0 || rect.h == 0 {
        return;
    }
    let (x2, y2) = (rect.right_ex() - 1, rect.bottom_ex() - 1);
    for x in rect.x..=x2 {
        put_clipped(canvas, x, rect.y, color);
        put_clipped(canvas, x, y2, color);
    }
    for y in rect.y..=y2 {
        put_clipped(canvas, rect.x, y, color);
        put_clipped(canvas, x2, y, color);
    }
}

/// Gives every fully transparent texel the color of a non-transparent neighbor
/// (edge neighbors first, then diagonals). Alpha stays 0, so the image looks the
/// same but filtered sampling no longer pulls in black fringes.
pub fn dither_alpha(img: &mut RgbaImage) {
    const NEIGHBORS: [(i64, i64); 8] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (1, -1), (-1, 1), (1, 1)];
    let src = img.clone();
    let (w, h) = (src.width() as i64, src.height() as i64);
    for (x, y, px) in img.enumerate_pixels_mut() {
        if px.0[3] != 0 {
            continue;
        }
        let donor = NEIGHBORS.iter().find_map(|(ox, oy)| {
            let (nx, ny) = (x as i64 + ox, y as i64 + oy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                return None;
            }
            let n = src.get_pixel(nx as u32, ny as u32);
            (n.0[3] != 0).then_some(n)
        });
        if let Some(n) = donor {
            *px = Rgba([n.0[0], n.0[1], n.0[2], 0]);
        }
    }
}

fn quantize(v: u8, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    let q = (v as u32 * max + 127) / 255;
    ((q * 255 + max / 2) / max) as u8
}

fn quantized(img: &RgbaImage, rgb_bits: [u32; 3], alpha_bits: u32) -> RgbaImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let [r, g, b, a] = px.0;
        *px = Rgba([
            quantize(r, rgb_bits[0]),
            quantize(g, rgb_bits[1]),
            quantize(b, rgb_bits[2]),
            if alpha_bits == 0 { 255 } else { quantize(a, alpha_bits) },
        ]);
    }
    out
}

/// Converts a working RGBA8888 sheet to `format` before encoding.
///
/// Lower precision formats are quantized and stored expanded back to 8 bits per
/// channel, so any encoder can write them.
pub fn convert_pixel_format(img: &RgbaImage, format: PixelFormat) -> Result<DynamicImage> {
    let out = match format {
        PixelFormat::RGBA8888 => DynamicImage::ImageRgba8(img.clone()),
        PixelFormat::RGBA5551 => DynamicImage::ImageRgba8(quantized(img, [5, 5, 5], 1)),
        PixelFormat::RGBA4444 => DynamicImage::ImageRgba8(quantized(img, [4, 4, 4], 4)),
        PixelFormat::RGB888 => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img.clone()).to_rgb8()),
        PixelFormat::RGB565 => {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(quantized(img, [5, 6, 5], 0)).to_rgb8())
        }
        PixelFormat::A8 => {
            let alpha = GrayImage::from_fn(img.width(), img.height(), |x, y| Luma([img.get_pixel(x, y).0[3]]));
            DynamicImage::ImageLuma8(alpha)
        }
        other => return Err(SheetPackerError::InvalidConfig(format!("Can't convert to '{other}'"))),
    };
    Ok(out)
}

/// Draws every frame of every definition into the sheet that holds it.
///
/// Frames missing from all sheets are skipped here; the definition writer
/// reports them.
#[instrument(skip_all, fields(sheets = sheets.len()))]
pub fn compose_sheets(
    defs: &[DefinitionFile],
    sheets: &[Layout],
    frames: &dyn FrameImageSource,
    cfg: &PackerConfig,
) -> Result<Vec<RgbaImage>> {
    let mut canvases: Vec<RgbaImage> = sheets
        .iter()
        .map(|s| {
            let (w, h) = s.rect();
            RgbaImage::new(w, h)
        })
        .collect();

    for (d, def) in defs.iter().enumerate() {
        for frame in 0..def.frame_count() {
            let Some((sheet, bounds)) = locate_sprite(sheets, SpriteId::new(d, frame)) else {
                continue;
            };
            debug!(definition = %def.filename, frame, sheet, "draw frame");
            let image = frames.load_frame(def, frame)?;
            let canvas = &mut canvases[sheet];
            blit_frame(&image, canvas, bounds);
            if cfg.debug_outlines {
                draw_outline(canvas, bounds.margins_rect, OUTLINE);
            }
        }
    }
    Ok(canvases)
}
