use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::compositing::{convert_pixel_format, dither_alpha};
use crate::config::PackerConfig;
use crate::descriptor::{CompressionEntry, SheetDescriptor, descriptor_path, gpu_path, source_path};
use crate::error::{ErrorLog, Result, SheetPackerError};
use crate::export_keys::ImageExportKey;
use crate::formats::{ImageFormat, ImageQuality};
use crate::io::{OutputSink, TextureCompressor};

/// Encodes `img` as `format`. GPU containers are produced by a compressor and
/// cannot be encoded here.
pub fn encode_image(img: &DynamicImage, format: ImageFormat, quality: ImageQuality) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        ImageFormat::Png => img.write_to(&mut buf, image::ImageFormat::Png)?,
        ImageFormat::Tga => img.write_to(&mut buf, image::ImageFormat::Tga)?,
        ImageFormat::Jpeg => {
            let q = match quality {
                ImageQuality::Lossless => 100,
                ImageQuality::Lossy(q) => q.max(1),
            };
            let mut enc = JpegEncoder::new_with_quality(&mut buf, q);
            enc.encode_image(&img.to_rgb8())?;
        }
        ImageFormat::Webp => {
            if let ImageQuality::Lossy(q) = quality {
                debug!(quality = q, "webp is written lossless");
            }
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_to(&mut buf, image::ImageFormat::WebP)?;
        }
        ImageFormat::Pvr | ImageFormat::Dds => {
            return Err(SheetPackerError::InvalidConfig(format!(
                "{format} images are only produced by a texture compressor"
            )));
        }
    }
    Ok(buf.into_inner())
}

/// Writes one composed sheet for every resolved export key, plus its descriptor.
///
/// The origin image and compressor sources are written as `<base><ext>`.
/// Keys that need GPU compression hand that source to `compressor`; other
/// device keys are encoded straight to `<base>.<gpu><ext>`. Unresolved keys are
/// skipped. With a single resolved key the descriptor is exported for that GPU
/// alone (and a compressed key's source is deleted); otherwise the full
/// descriptor is saved.
#[instrument(skip_all, fields(base = %base.display()))]
pub fn export_sheet(
    image: &RgbaImage,
    keys: &[ImageExportKey],
    base: &Path,
    cfg: &PackerConfig,
    sink: &mut dyn OutputSink,
    compressor: &dyn TextureCompressor,
    errors: &mut ErrorLog,
) -> Result<SheetDescriptor> {
    let mut descriptor = SheetDescriptor::from_config(cfg);

    let mut dithered = image.clone();
    dither_alpha(&mut dithered);

    let mut compressed = false;
    for key in keys {
        let (Some(pixel_format), Some(image_format)) = (key.pixel_format, key.image_format) else {
            warn!(gpu = %key.gpu, "Cannot export texture {} for GPU {}", base.display(), key.gpu);
            continue;
        };
        descriptor.compression.insert(
            key.gpu,
            CompressionEntry {
                format: pixel_format,
                image_format,
                quality: key.quality,
            },
        );

        let source_format = if image_format.is_gpu_container() {
            ImageFormat::Png
        } else {
            image_format
        };
        descriptor.source_file_format = source_format;

        let for_gpu = if key.to_convert_origin {
            convert_pixel_format(&dithered, pixel_format)?
        } else {
            DynamicImage::ImageRgba8(dithered.clone())
        };
        let target = gpu_path(base, key.gpu, image_format);
        let direct = key.gpu.is_device() && !key.to_compress_for_gpu;
        let written = if direct { target.clone() } else { source_path(base, source_format) };
        sink.write(&written, &encode_image(&for_gpu, source_format, key.quality)?)?;
        debug!(gpu = %key.gpu, path = %written.display(), "image written");

        if key.to_compress_for_gpu {
            if let Err(e) = compressor.compress(&written, &target, key, cfg.convert_quality, sink) {
                errors.add(format!(
                    "Cannot compress texture {} for GPU '{}': {e}",
                    base.display(),
                    key.gpu
                ));
                continue;
            }
            info!(gpu = %key.gpu, path = %target.display(), "compressed");
            compressed = true;
        }
    }

    let resolved: Vec<&ImageExportKey> = keys.iter().filter(|k| k.is_resolved()).collect();
    let written = match resolved.as_slice() {
        [only] => {
            let single = descriptor.exported(only.gpu);
            if compressed {
                sink.remove(&source_path(base, single.source_file_format))?;
            }
            single
        }
        _ => descriptor,
    };
    sink.write(&descriptor_path(base), &written.to_bytes()?)?;
    Ok(written)
}
