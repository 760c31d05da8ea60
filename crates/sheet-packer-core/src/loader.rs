//! Builds definition files from PNG sprites.
//!
//! A plain `<name>.png` is a single uncropped frame. A `<name>.png` with a
//! `<name>.pngdef` companion is a horizontal strip: the companion's first
//! integer is the frame count, and every frame is cropped to its
//! non-transparent rect. Frame images go to the processing directory as
//! `<name>/<frame>.png`, where [`ProcessedFrames`] picks them up for composing.

use image::{DynamicImage, RgbaImage, imageops};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::definition::DefinitionFile;
use crate::error::{Result, SheetPackerError};
use crate::export::encode_image;
use crate::formats::{ImageFormat, ImageQuality};
use crate::io::{FrameImageSource, OutputSink};
use crate::model::Rect;

pub const STRIP_EXTENSION: &str = "pngdef";

/// Smallest rect holding every pixel with alpha above `threshold`.
/// Fully transparent images yield `None`.
pub fn compute_trim_rect(rgba: &RgbaImage, threshold: u8) -> Option<Rect> {
    let (w, h) = rgba.dimensions();
    let opaque_col = |x: u32, y1: u32, y2: u32| (y1..=y2).any(|y| rgba.get_pixel(x, y)[3] > threshold);
    let opaque_row = |y: u32, x1: u32, x2: u32| (x1..=x2).any(|x| rgba.get_pixel(x, y)[3] > threshold);
    if w == 0 || h == 0 {
        return None;
    }
    // left
    let x1 = (0..w).find(|&x| opaque_col(x, 0, h - 1))?;
    // right
    let x2 = (x1..w).rev().find(|&x| opaque_col(x, 0, h - 1)).unwrap_or(x1);
    // top
    let y1 = (0..h).find(|&y| opaque_row(y, x1, x2)).unwrap_or(0);
    // bottom
    let y2 = (y1..h).rev().find(|&y| opaque_row(y, x1, x2)).unwrap_or(y1);
    Some(Rect::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1))
}

/// `<dir>/<basename>/<frame>.png`
pub fn frame_path(dir: &Path, basename: &str, frame: usize) -> PathBuf {
    dir.join(basename).join(format!("{frame}.png"))
}

/// Single-frame definition covering the whole image.
pub fn sprite_definition(name: &str, image: &RgbaImage) -> (DefinitionFile, Vec<RgbaImage>) {
    let (w, h) = image.dimensions();
    let def = DefinitionFile::new(format!("{name}.txt"), w, h).with_frame(Rect::new(0, 0, w, h), "");
    (def, vec![image.clone()])
}

/// Splits a horizontal strip into `frame_count` frames cropped to their
/// non-transparent rects. A fully transparent frame keeps a 1x1 crop.
pub fn strip_definition(name: &str, image: &RgbaImage, frame_count: u32) -> Result<(DefinitionFile, Vec<RgbaImage>)> {
    if frame_count == 0 {
        return Err(SheetPackerError::InvalidConfig(format!("{name}: frame count must be positive")));
    }
    let sprite_w = image.width() / frame_count;
    let sprite_h = image.height();
    if sprite_w == 0 || sprite_h == 0 {
        return Err(SheetPackerError::InvalidConfig(format!(
            "{name}: {frame_count} frames do not fit a {}x{} image",
            image.width(),
            image.height()
        )));
    }
    let mut def = DefinitionFile::new(format!("{name}.txt"), sprite_w, sprite_h);
    let mut frames = Vec::with_capacity(frame_count as usize);
    for k in 0..frame_count {
        let cell = imageops::crop_imm(image, k * sprite_w, 0, sprite_w, sprite_h).to_image();
        let crop = compute_trim_rect(&cell, 0).unwrap_or(Rect::new(0, 0, 1, 1));
        debug!(name, frame = k, ?crop, "reduced rect");
        frames.push(imageops::crop_imm(&cell, crop.x, crop.y, crop.w, crop.h).to_image());
        def = def.with_frame(crop, "");
    }
    Ok((def, frames))
}

/// Reads the frame count from `.pngdef` text: the first integer token.
pub fn parse_strip_frame_count(text: &str) -> Result<u32> {
    text.split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| SheetPackerError::Parse {
            line: 1,
            message: "expected frame count".into(),
        })
}

fn write_frames(
    def: &DefinitionFile,
    frames: &[RgbaImage],
    process_dir: &Path,
    sink: &mut dyn OutputSink,
) -> Result<()> {
    for (k, frame) in frames.iter().enumerate() {
        let bytes = encode_image(&DynamicImage::ImageRgba8(frame.clone()), ImageFormat::Png, ImageQuality::Lossless)?;
        sink.write(&frame_path(process_dir, def.basename(), k), &bytes)?;
    }
    Ok(())
}

/// Loads `png` (a strip when a `.pngdef` sits next to it) and writes its frame
/// images into `process_dir`.
#[instrument(skip(sink))]
pub fn load_png_definition(png: &Path, process_dir: &Path, sink: &mut dyn OutputSink) -> Result<DefinitionFile> {
    let name = png
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SheetPackerError::InvalidConfig(format!("bad file name: {}", png.display())))?;
    let image = image::open(png)?.to_rgba8();

    let strip = png.with_extension(STRIP_EXTENSION);
    let (def, frames) = if strip.is_file() {
        let count = parse_strip_frame_count(&std::fs::read_to_string(&strip)?)?;
        strip_definition(name, &image, count)?
    } else {
        sprite_definition(name, &image)
    };
    debug!(
        frames = def.frame_count(),
        w = def.sprite_width,
        h = def.sprite_height,
        "definition loaded"
    );
    write_frames(&def, &frames, process_dir, sink)?;
    Ok(def)
}

/// Frame images stored as `<dir>/<basename>/<frame>.png` in some sink.
#[derive(Debug, Clone)]
pub struct ProcessedFrames<S> {
    store: S,
    dir: PathBuf,
}

impl<S: OutputSink> ProcessedFrames<S> {
    pub fn new(store: S, dir: impl Into<PathBuf>) -> Self {
        Self { store, dir: dir.into() }
    }
}

impl<S: OutputSink> FrameImageSource for ProcessedFrames<S> {
    fn load_frame(&self, definition: &DefinitionFile, frame: usize) -> Result<RgbaImage> {
        let bytes = self.store.read(&frame_path(&self.dir, definition.basename(), frame))?;
        Ok(image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)?.to_rgba8())
    }
}
