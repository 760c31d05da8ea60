//! Per-GPU export key resolution.
//!
//! Each requested GPU family gets an [`ImageExportKey`] built from its flag
//! tokens and validated against a [`FormatCatalog`]. A key that fails any check
//! is left unresolved (no pixel format, no image format) and a message is added
//! to the run's [`ErrorLog`]; the other families are unaffected.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PackerConfig;
use crate::error::ErrorLog;
use crate::formats::{FormatCatalog, GpuFamily, ImageFormat, ImageQuality, PixelFormat};

/// Working format of composed sheets.
pub const WORKING_PIXEL_FORMAT: PixelFormat = PixelFormat::RGBA8888;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageExportKey {
    pub gpu: GpuFamily,
    pub pixel_format: Option<PixelFormat>,
    pub image_format: Option<ImageFormat>,
    pub quality: ImageQuality,
    /// Convert the RGBA8888 sheet to `pixel_format` before encoding.
    pub to_convert_origin: bool,
    /// Hand the written source image to a GPU compressor.
    pub to_compress_for_gpu: bool,
}

impl ImageExportKey {
    pub fn new(gpu: GpuFamily) -> Self {
        Self {
            gpu,
            pixel_format: None,
            image_format: None,
            quality: ImageQuality::default(),
            to_convert_origin: false,
            to_compress_for_gpu: false,
        }
    }

    /// Both formats known; only resolved keys may be converted or compressed.
    pub fn is_resolved(&self) -> bool {
        self.pixel_format.is_some() && self.image_format.is_some()
    }

    fn invalidate(&mut self) {
        self.pixel_format = None;
        self.image_format = None;
        self.to_convert_origin = false;
        self.to_compress_for_gpu = false;
    }

    /// Whether GPU compression of this key forces square sheets.
    pub fn needs_square(&self, catalog: &dyn FormatCatalog) -> bool {
        self.is_resolved()
            && self.to_compress_for_gpu
            && self.pixel_format.is_some_and(|pf| catalog.requires_square(pf))
    }
}

/// True if any key forces square sheets.
pub fn need_square_texture(keys: &[ImageExportKey], catalog: &dyn FormatCatalog) -> bool {
    keys.iter().any(|k| k.needs_square(catalog))
}

/// Formats parsed from one GPU flag's tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuParams {
    pub pixel_format: Option<PixelFormat>,
    pub image_format: Option<ImageFormat>,
    pub quality: Option<ImageQuality>,
}

impl GpuParams {
    fn any_read(&self) -> bool {
        self.pixel_format.is_some() || self.image_format.is_some()
    }
}

fn pixel_param_at(tokens: &[String], pos: usize, catalog: &dyn FormatCatalog) -> Option<PixelFormat> {
    tokens.get(pos).and_then(|t| catalog.pixel_format_by_name(t))
}

/// Reads `<image-format> [lossless|0..=100]` at `pos`; returns the formats and
/// the number of tokens consumed.
fn image_params_at(
    tokens: &[String],
    pos: usize,
    catalog: &dyn FormatCatalog,
) -> (Option<ImageFormat>, Option<ImageQuality>, usize) {
    let Some(format) = tokens.get(pos).and_then(|t| catalog.image_format_by_name(t)) else {
        return (None, None, 0);
    };
    let quality = tokens.get(pos + 1).and_then(|t| {
        if t.eq_ignore_ascii_case("lossless") {
            Some(ImageQuality::Lossless)
        } else {
            t.parse::<u8>()
                .ok()
                .filter(|q| *q <= 100)
                .map(ImageQuality::Lossy)
        }
    });
    let read = if quality.is_some() { 2 } else { 1 };
    (Some(format), quality, read)
}

/// Parses GPU flag tokens. The pixel format may come first or follow the image
/// format (and its optional quality).
pub fn parse_gpu_params(tokens: &[String], catalog: &dyn FormatCatalog) -> GpuParams {
    let mut pos = 0;
    let mut pixel_format = pixel_param_at(tokens, pos, catalog);
    if pixel_format.is_some() {
        pos += 1;
    }
    let (image_format, quality, read) = image_params_at(tokens, pos, catalog);
    if pixel_format.is_none() && read > 0 {
        pos += read;
        pixel_format = pixel_param_at(tokens, pos, catalog);
    }
    GpuParams {
        pixel_format,
        image_format,
        quality,
    }
}

/// Expands the requested family list into one unresolved key per family.
fn requested_keys(for_gpus: &[GpuFamily]) -> Vec<ImageExportKey> {
    let mut seen = Vec::with_capacity(for_gpus.len());
    for gpu in for_gpus {
        if !seen.contains(gpu) {
            seen.push(*gpu);
        }
    }
    seen.into_iter().map(ImageExportKey::new).collect()
}

/// Resolves one export key per requested GPU family.
pub fn resolve_export_keys(
    for_gpus: &[GpuFamily],
    cfg: &PackerConfig,
    catalog: &dyn FormatCatalog,
    errors: &mut ErrorLog,
) -> Vec<ImageExportKey> {
    let mut keys = requested_keys(for_gpus);
    for key in keys.iter_mut() {
        if let Err(message) = resolve_key(key, cfg, catalog) {
            key.invalidate();
            errors.add(message);
        }
        debug!(gpu = %key.gpu, resolved = key.is_resolved(), ?key.pixel_format, ?key.image_format, "export key");
    }
    keys
}

fn resolve_key(key: &mut ImageExportKey, cfg: &PackerConfig, catalog: &dyn FormatCatalog) -> Result<(), String> {
    if !key.gpu.is_device() {
        key.pixel_format = Some(WORKING_PIXEL_FORMAT);
        key.image_format = Some(ImageFormat::Png);
        return Ok(());
    }
    let gpu = key.gpu;

    let params = cfg
        .gpu_tokens(gpu)
        .map(|tokens| parse_gpu_params(tokens, catalog))
        .filter(GpuParams::any_read)
        .ok_or_else(|| format!("Cannot read compression options for GPU '{gpu}'"))?;
    if let Some(q) = params.quality {
        key.quality = q;
    }

    let pixel_format = params
        .pixel_format
        .ok_or_else(|| format!("Compression format was not selected for GPU '{gpu}'"))?;

    let compressed = catalog.compressed_file_format(gpu, pixel_format);
    let image_format = match params.image_format {
        None => compressed,
        Some(explicit) if explicit.is_gpu_container() && compressed != Some(explicit) => None,
        Some(explicit) => Some(explicit),
    }
    .ok_or_else(|| format!("Incorrect settings were selected for GPU '{gpu}'"))?;

    key.pixel_format = Some(pixel_format);
    key.image_format = Some(image_format);

    if image_format.is_gpu_container() {
        if !catalog.is_format_supported(gpu, pixel_format) {
            return Err(format!(
                "Compression format '{pixel_format}' is not supported for GPU '{gpu}'"
            ));
        }
        key.to_compress_for_gpu = true;
    } else {
        if !catalog.can_convert_from_rgba8888(pixel_format) {
            return Err(format!("Can't convert to '{pixel_format}'"));
        }
        key.to_convert_origin = pixel_format != WORKING_PIXEL_FORMAT;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::StandardCatalog;

    fn toks(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pixel_format_first() {
        let p = parse_gpu_params(&toks(&["RGBA4444", "webp", "80"]), &StandardCatalog);
        assert_eq!(p.pixel_format, Some(PixelFormat::RGBA4444));
        assert_eq!(p.image_format, Some(ImageFormat::Webp));
        assert_eq!(p.quality, Some(ImageQuality::Lossy(80)));
    }

    #[test]
    fn image_format_first() {
        let p = parse_gpu_params(&toks(&["jpeg", "lossless", "RGB888"]), &StandardCatalog);
        assert_eq!(p.pixel_format, Some(PixelFormat::RGB888));
        assert_eq!(p.image_format, Some(ImageFormat::Jpeg));
        assert_eq!(p.quality, Some(ImageQuality::Lossless));

        let p = parse_gpu_params(&toks(&["tga", "RGBA8888"]), &StandardCatalog);
        assert_eq!(p.pixel_format, Some(PixelFormat::RGBA8888));
        assert_eq!(p.quality, None);
    }

    #[test]
    fn out_of_range_quality_is_not_consumed() {
        let p = parse_gpu_params(&toks(&["png", "101"]), &StandardCatalog);
        assert_eq!(p.image_format, Some(ImageFormat::Png));
        assert_eq!(p.quality, None);
        assert_eq!(p.pixel_format, None);
    }
}
